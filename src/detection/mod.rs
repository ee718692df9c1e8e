pub mod classifier;
pub mod contours;
pub mod matcher;
pub mod preprocessing;
pub mod rectify;
pub mod resolver;

use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use log::{debug, info, warn};
use std::sync::Arc;

use crate::config::RecognizerConfig;
use crate::debug::DebugObserver;
use crate::error::{RecognizeError, Result};
use crate::io::TemplateSet;
use crate::labels::LabelTable;
use crate::models::{Candidate, Recognition, RecognizedDigit};
use classifier::GlyphClassifier;
use matcher::TemplateDetector;
use rectify::{GeometryNormalizer, NormalizedDocument};
use resolver::CandidateResolver;

/// Main recognition pipeline orchestrator.
///
/// Binarizes a frontal crop of the report, searches the left panel with the
/// template bank, resolves overlapping matches into reading order and
/// optionally re-labels each match with the glyph classifier.
pub struct DigitPipeline {
    templates: TemplateSet,
    labels: LabelTable,
    config: RecognizerConfig,
    classifier: Option<Arc<dyn GlyphClassifier>>,
    observer: Option<Arc<dyn DebugObserver>>,
}

impl DigitPipeline {
    pub fn new(templates: TemplateSet, labels: LabelTable) -> Self {
        Self {
            templates,
            labels,
            config: RecognizerConfig::default(),
            classifier: None,
            observer: None,
        }
    }

    pub fn with_config(mut self, config: RecognizerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_classifier(mut self, classifier: impl GlyphClassifier + 'static) -> Self {
        self.classifier = Some(Arc::new(classifier));
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn DebugObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn has_classifier(&self) -> bool {
        self.classifier.is_some()
    }

    fn emit(&self, stage: &str, image: impl FnOnce() -> DynamicImage) {
        if let Some(observer) = &self.observer {
            observer.observe(stage, &image());
        }
    }

    /// Width of the digit panel: the configured fraction of the image width
    pub fn panel_width(&self, image_width: u32) -> u32 {
        ((image_width as f32 * self.config.detect.panel_fraction) as u32).clamp(1, image_width)
    }

    /// Binarize the whole photo, then keep the left panel of both the photo
    /// and its binary version.
    pub fn split_panel(&self, photo: &DynamicImage) -> Result<(DynamicImage, GrayImage)> {
        if photo.width() == 0 || photo.height() == 0 {
            return Err(RecognizeError::EmptyImage);
        }

        let gray = preprocessing::to_grayscale(photo);
        let binary = preprocessing::binarize_inverted(&gray);

        let width = self.panel_width(photo.width());
        let panel = photo.crop_imm(0, 0, width, photo.height());
        let binary_panel =
            image::imageops::crop_imm(&binary, 0, 0, width, photo.height()).to_image();

        self.emit("panel", || panel.clone());
        self.emit("panel_binary", || DynamicImage::ImageLuma8(binary_panel.clone()));
        Ok((panel, binary_panel))
    }

    /// Template match and resolve, without any digit mapping
    pub fn detect_candidates(&self, binary_panel: &GrayImage) -> Vec<Candidate> {
        let detector = TemplateDetector::new(self.config.detect.min_score);
        let resolver = CandidateResolver::new(&self.config.resolve);
        let raw = detector.detect(binary_panel, &self.templates);
        resolver.resolve(&raw)
    }

    /// Recognized digits in reading order
    pub fn recognize(&self, photo: &DynamicImage, use_refinement: bool) -> Result<Vec<u8>> {
        Ok(self.recognize_detailed(photo, use_refinement)?.digits())
    }

    /// Recognized digits with per-digit confidence and placement
    pub fn recognize_detailed(
        &self,
        photo: &DynamicImage,
        use_refinement: bool,
    ) -> Result<Recognition> {
        let (panel, binary_panel) = self.split_panel(photo)?;
        let candidates = self.detect_candidates(&binary_panel);

        let classifier = match (&self.classifier, use_refinement) {
            (Some(classifier), true) => Some(&**classifier),
            (None, true) => {
                info!("No trained classifier, using template labels");
                None
            }
            _ => None,
        };

        let digits = match classifier {
            Some(classifier) => self.refine(&binary_panel, &candidates, classifier)?,
            None => self.label(&candidates),
        };

        for d in &digits {
            info!(
                "Digit {}: confidence={:.3}, position=({}, {})",
                d.digit, d.confidence, d.x, d.y
            );
        }

        let recognition = Recognition {
            digits,
            refinement_applied: classifier.is_some(),
        };

        self.emit("annotated", || {
            DynamicImage::ImageRgb8(annotate(&panel, &recognition))
        });
        Ok(recognition)
    }

    /// Rectify a raw photo first, then recognize the normalized document.
    pub fn recognize_document(
        &self,
        photo: &DynamicImage,
        use_refinement: bool,
    ) -> Result<(NormalizedDocument, Recognition)> {
        let mut normalizer = GeometryNormalizer::new().with_config(self.config.normalize.clone());
        if let Some(observer) = &self.observer {
            normalizer = normalizer.with_observer(observer.clone());
        }
        let document = normalizer.rectify(photo)?;
        let recognition = self.recognize_detailed(&document.image, use_refinement)?;
        Ok((document, recognition))
    }

    fn label(&self, candidates: &[Candidate]) -> Vec<RecognizedDigit> {
        candidates
            .iter()
            .filter_map(|c| match self.labels.digit(c.label) {
                Some(digit) => Some(recognized(c, digit, c.score, false)),
                None => {
                    warn!("Template {} has no label, dropping match", c.label);
                    None
                }
            })
            .collect()
    }

    /// Classify each candidate's crop. A failure on one glyph skips that glyph,
    /// except `ClassifierNotTrained`, which aborts.
    fn refine(
        &self,
        binary_panel: &GrayImage,
        candidates: &[Candidate],
        classifier: &dyn GlyphClassifier,
    ) -> Result<Vec<RecognizedDigit>> {
        debug!("Classifying {} matches", candidates.len());
        let mut digits = Vec::with_capacity(candidates.len());

        for c in candidates {
            let roi =
                image::imageops::crop_imm(binary_panel, c.x, c.y, c.width, c.height).to_image();
            if roi.width() == 0 || roi.height() == 0 {
                continue;
            }

            match classifier.predict(&roi) {
                Ok(cls) => {
                    let confidence = (c.score + cls.confidence) / 2.0;
                    digits.push(recognized(c, cls.digit, confidence, true));
                }
                Err(RecognizeError::ClassifierNotTrained) => {
                    return Err(RecognizeError::ClassifierNotTrained);
                }
                Err(e) => {
                    warn!("Classification error at ({}, {}): {}", c.x, c.y, e);
                }
            }
        }

        Ok(digits)
    }
}

fn recognized(c: &Candidate, digit: u8, confidence: f32, refined: bool) -> RecognizedDigit {
    RecognizedDigit {
        digit,
        confidence,
        x: c.x,
        y: c.y,
        width: c.width,
        height: c.height,
        template_index: c.label,
        refined,
    }
}

/// Draw a box around every recognized digit on a copy of `panel`
pub fn annotate(panel: &DynamicImage, recognition: &Recognition) -> RgbImage {
    let mut canvas = panel.to_rgb8();
    let color = Rgb([0u8, 255, 0]);

    for d in &recognition.digits {
        draw_hollow_rect_mut(
            &mut canvas,
            Rect::at(d.x as i32, d.y as i32).of_size(d.width.max(1), d.height.max(1)),
            color,
        );
        if d.width > 2 && d.height > 2 {
            draw_hollow_rect_mut(
                &mut canvas,
                Rect::at(d.x as i32 + 1, d.y as i32 + 1).of_size(d.width - 2, d.height - 2),
                color,
            );
        }
    }

    canvas
}
