use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use inbody_digits::io::INBODY_TEMPLATE_COUNT;
use inbody_digits::{
    DebugDir, DigitPipeline, GeometryNormalizer, KnnClassifier, LabelTable, RecognizerConfig,
    Rectification, annotate, load_image, load_or_train, load_template_set, save_image,
};

#[derive(Parser)]
#[command(name = "inbody-digits")]
#[command(about = "Read the digit panel of a photographed InBody report")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// TOML file with recognizer settings
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Find the document in a photo and flatten it
    Rectify {
        /// Path to input image file
        #[arg(value_name = "IMAGE")]
        image_path: PathBuf,

        /// Where to write the corrected document
        #[arg(short, long, value_name = "FILE", default_value = "output_image_with_contours.jpg")]
        output: PathBuf,

        /// Save debug outputs to directory (must be empty)
        #[arg(long, value_name = "DIR")]
        debug_out: Option<PathBuf>,
    },

    /// Recognize the digits printed on a report photo
    Recognize {
        /// Path to input image file
        #[arg(value_name = "IMAGE")]
        image_path: PathBuf,

        /// Directory holding `tem (1).png` .. `tem (44).png`
        #[arg(long, value_name = "DIR", default_value = "temp")]
        templates: PathBuf,

        /// Classifier model; trained from the templates when missing
        #[arg(long, value_name = "FILE", default_value = "knn_model.json")]
        model: PathBuf,

        /// Use template labels only, skip the classifier
        #[arg(long)]
        no_refine: bool,

        /// Rectify the photo before recognition
        #[arg(long)]
        rectify: bool,

        /// Save debug outputs to directory (must be empty)
        #[arg(long, value_name = "DIR")]
        debug_out: Option<PathBuf>,

        /// Save the panel with recognized digits boxed
        #[arg(long, value_name = "FILE")]
        annotated: Option<PathBuf>,

        /// Print the digit list as JSON only
        #[arg(long)]
        json: bool,

        /// Override the correlation threshold
        #[arg(long)]
        min_score: Option<f32>,

        /// Override the row band height used for reading order
        #[arg(long)]
        row_band: Option<u32>,

        /// Neighbour count when a new model has to be trained
        #[arg(long)]
        k: Option<usize>,
    },

    /// Train the classifier from templates and save it
    Train {
        #[arg(long, value_name = "DIR", default_value = "temp")]
        templates: PathBuf,

        #[arg(long, value_name = "FILE", default_value = "knn_model.json")]
        model: PathBuf,

        /// Neighbour count
        #[arg(long)]
        k: Option<usize>,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env = env_logger::Env::default().default_filter_or(default_level);
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .try_init();
}

fn open_debug_dir(dir: PathBuf, verbose: bool) -> anyhow::Result<Arc<DebugDir>> {
    let debug = DebugDir::new(dir)?;
    if verbose {
        println!("Debug output will be saved to: {}", debug.output_dir().display());
    }
    Ok(Arc::new(debug))
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_logging(args.verbose);

    let mut config = match &args.config {
        Some(path) => RecognizerConfig::from_toml_file(path)?,
        None => RecognizerConfig::default(),
    };

    match args.command {
        Command::Rectify {
            image_path,
            output,
            debug_out,
        } => {
            let img = load_image(&image_path)?;
            if args.verbose {
                println!("Image loaded: {}x{}\n", img.width(), img.height());
            }

            let mut normalizer = GeometryNormalizer::new().with_config(config.normalize);
            if let Some(dir) = debug_out {
                normalizer = normalizer.with_observer(open_debug_dir(dir, args.verbose)?);
            }

            let document = normalizer.rectify(&img)?;
            save_image(&document.image, &output)?;

            match document.rectification {
                Rectification::Warped { corners } => println!(
                    "Perspective corrected from corners {:?} {:?} {:?} {:?}",
                    corners.top_left, corners.top_right, corners.bottom_right, corners.bottom_left
                ),
                Rectification::Cropped { bbox } => println!(
                    "Cropped bounding box {}x{} at ({}, {})",
                    bbox.width, bbox.height, bbox.x, bbox.y
                ),
            }
            println!("Saved {}", output.display());
        }

        Command::Recognize {
            image_path,
            templates,
            model,
            no_refine,
            rectify,
            debug_out,
            annotated,
            json,
            min_score,
            row_band,
            k,
        } => {
            if let Some(min_score) = min_score {
                config.detect.min_score = min_score;
            }
            if let Some(row_band) = row_band {
                config.resolve.row_band = row_band;
            }
            if let Some(k) = k {
                config.classifier.k = k;
            }
            config.validate()?;

            let labels = LabelTable::inbody();
            let template_set = load_template_set(&templates, INBODY_TEMPLATE_COUNT)?;
            if args.verbose {
                println!("Loaded {} templates from {}", template_set.len(), templates.display());
            }

            let mut pipeline = DigitPipeline::new(template_set.clone(), labels.clone())
                .with_config(config.clone());

            if !no_refine {
                let trained = load_or_train(&model, &template_set, &labels, &config.classifier)
                    .with_context(|| format!("preparing classifier model {}", model.display()))?;
                if let Some(trained) = trained {
                    pipeline = pipeline.with_classifier(trained);
                }
            }

            if let Some(dir) = debug_out {
                pipeline = pipeline.with_observer(open_debug_dir(dir, args.verbose)?);
            }

            let img = load_image(&image_path)?;
            let recognition = if rectify {
                let (document, recognition) = pipeline.recognize_document(&img, !no_refine)?;
                if args.verbose {
                    println!("Rectification: {:?}", document.rectification);
                }
                if let Some(path) = &annotated {
                    let panel_width = pipeline.panel_width(document.image.width());
                    let panel = document.image.crop_imm(0, 0, panel_width, document.image.height());
                    save_image(&annotate(&panel, &recognition).into(), path)?;
                }
                recognition
            } else {
                let recognition = pipeline.recognize_detailed(&img, !no_refine)?;
                if let Some(path) = &annotated {
                    let panel_width = pipeline.panel_width(img.width());
                    let panel = img.crop_imm(0, 0, panel_width, img.height());
                    save_image(&annotate(&panel, &recognition).into(), path)?;
                }
                recognition
            };

            if json {
                println!("{}", serde_json::to_string(&recognition.digits())?);
                return Ok(());
            }

            println!("\n=== Digit Recognition Results ===");
            println!("Total digits: {}", recognition.digits.len());
            if recognition.digits.is_empty() {
                println!("No digits detected.");
            } else {
                for d in &recognition.digits {
                    println!(
                        "  {} at ({}, {}) - confidence: {:.3}{}",
                        d.digit,
                        d.x,
                        d.y,
                        d.confidence,
                        if d.refined { "" } else { " (template label)" }
                    );
                }
                println!("\n{}", serde_json::to_string(&recognition.digits())?);
            }
        }

        Command::Train {
            templates,
            model,
            k,
        } => {
            if let Some(k) = k {
                config.classifier.k = k;
            }
            config.validate()?;

            let template_set = load_template_set(&templates, INBODY_TEMPLATE_COUNT)?;
            let trained = KnnClassifier::new(config.classifier)
                .train(&template_set, &LabelTable::inbody())?;
            trained.persist(&model)?;
            println!(
                "Trained on {} samples (k = {}), saved {}",
                trained.sample_count(),
                trained.k(),
                model.display()
            );
        }
    }

    Ok(())
}
