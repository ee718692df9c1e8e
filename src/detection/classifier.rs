//! Nearest-neighbour digit classifier over binarized glyph crops.
//!
//! Training and prediction share one feature extractor: resize to a square
//! canvas, binarize with an inverted Otsu threshold, flatten and scale to
//! [0, 1]. The model is just the labelled feature vectors, so persisting it
//! as JSON reproduces predictions exactly.

use image::GrayImage;
use image::imageops::{FilterType, resize};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::ClassifierConfig;
use crate::detection::preprocessing;
use crate::error::{RecognizeError, Result};
use crate::io::TemplateSet;
use crate::labels::LabelTable;
use crate::models::Classification;

/// Anything that can turn a glyph crop into a digit
pub trait GlyphClassifier: Send + Sync {
    fn predict(&self, glyph: &GrayImage) -> Result<Classification>;
}

/// Feature vector of `size * size` values in [0, 1]
pub fn extract_features(glyph: &GrayImage, size: u32) -> Vec<f32> {
    let resized = resize(glyph, size, size, FilterType::Triangle);
    let binary = preprocessing::binarize_inverted(&resized);
    binary.as_raw().iter().map(|&v| v as f32 / 255.0).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Sample {
    label: u8,
    features: Vec<f32>,
}

/// Serialized form of a trained classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct KnnModel {
    k: usize,
    feature_size: u32,
    samples: Vec<Sample>,
}

/// Untrained classifier: holds parameters only
#[derive(Debug, Clone, Default)]
pub struct KnnClassifier {
    pub config: ClassifierConfig,
}

impl KnnClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Build a trained classifier from labelled templates.
    ///
    /// Each template is paired with `labels.digit(index)`; templates whose
    /// index has no label are skipped.
    pub fn train(&self, templates: &TemplateSet, labels: &LabelTable) -> Result<TrainedKnn> {
        let mut samples = Vec::with_capacity(templates.len());

        for (&index, image) in templates {
            let Some(label) = labels.digit(index) else {
                warn!("Template {} has no label, skipping", index);
                continue;
            };
            if image.width() == 0 || image.height() == 0 {
                warn!("Template {} is empty, skipping", index);
                continue;
            }
            samples.push(Sample {
                label,
                features: extract_features(image, self.config.feature_size),
            });
        }

        if samples.is_empty() {
            return Err(RecognizeError::NoTrainingData);
        }

        info!("KNN trained with {} samples", samples.len());
        Ok(TrainedKnn {
            model: KnnModel {
                k: self.config.k.max(1),
                feature_size: self.config.feature_size,
                samples,
            },
        })
    }
}

impl KnnClassifier {
    /// Always fails: only a [`TrainedKnn`] can classify.
    pub fn predict(&self, _glyph: &GrayImage) -> Result<Classification> {
        Err(RecognizeError::ClassifierNotTrained)
    }
}

/// Trained, immutable classifier
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedKnn {
    model: KnnModel,
}

impl TrainedKnn {
    pub fn k(&self) -> usize {
        self.model.k
    }

    pub fn sample_count(&self) -> usize {
        self.model.samples.len()
    }

    /// Majority digit among the k nearest samples.
    ///
    /// Neighbours are ranked by Euclidean distance, training order breaking
    /// ties. A tied vote goes to the lowest digit. Confidence is
    /// `1 / (1 + mean neighbour distance)`.
    fn classify(&self, glyph: &GrayImage) -> Classification {
        let query = extract_features(glyph, self.model.feature_size);

        let mut ranked: Vec<(f32, u8)> = self
            .model
            .samples
            .iter()
            .map(|s| (euclidean(&query, &s.features), s.label))
            .collect();
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0));
        ranked.truncate(self.model.k);

        let mut votes: BTreeMap<u8, usize> = BTreeMap::new();
        for &(_, label) in &ranked {
            *votes.entry(label).or_insert(0) += 1;
        }

        let mut digit = ranked[0].1;
        let mut best_votes = 0;
        for (&label, &count) in &votes {
            if count > best_votes {
                best_votes = count;
                digit = label;
            }
        }

        let mean_distance = ranked.iter().map(|r| r.0).sum::<f32>() / ranked.len() as f32;
        Classification {
            digit,
            confidence: 1.0 / (1.0 + mean_distance),
        }
    }

    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string(&self.model)?;
        std::fs::write(path, json).map_err(|source| RecognizeError::ModelIo {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Model saved to {}", path.display());
        Ok(())
    }

    pub fn restore(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| RecognizeError::ModelIo {
            path: path.to_path_buf(),
            source,
        })?;
        let model: KnnModel = serde_json::from_str(&json)?;
        let trained = Self::from_model(model)?;
        info!(
            "Model loaded from {} ({} samples)",
            path.display(),
            trained.sample_count()
        );
        Ok(trained)
    }

    fn from_model(model: KnnModel) -> Result<Self> {
        if model.samples.is_empty() {
            return Err(RecognizeError::NoTrainingData);
        }
        let expected = (model.feature_size * model.feature_size) as usize;
        if model.k == 0 || model.samples.iter().any(|s| s.features.len() != expected) {
            return Err(RecognizeError::ModelFormat(serde::de::Error::custom(format!(
                "expected k >= 1 and {} features per sample",
                expected
            ))));
        }
        Ok(Self { model })
    }
}

impl GlyphClassifier for TrainedKnn {
    fn predict(&self, glyph: &GrayImage) -> Result<Classification> {
        if glyph.width() == 0 || glyph.height() == 0 {
            return Err(RecognizeError::EmptyGlyph);
        }
        Ok(self.classify(glyph))
    }
}

fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Restore the model at `model_path` if present, otherwise train and save it.
///
/// Returns `Ok(None)` when there is nothing to train on, so callers can carry
/// on without refinement.
pub fn load_or_train(
    model_path: impl AsRef<Path>,
    templates: &TemplateSet,
    labels: &LabelTable,
    config: &ClassifierConfig,
) -> Result<Option<TrainedKnn>> {
    let model_path = model_path.as_ref();
    if model_path.exists() {
        return TrainedKnn::restore(model_path).map(Some);
    }

    debug!("No model at {}, training", model_path.display());
    match KnnClassifier::new(config.clone()).train(templates, labels) {
        Ok(trained) => {
            trained.persist(model_path)?;
            Ok(Some(trained))
        }
        Err(RecognizeError::NoTrainingData) => {
            warn!("KNN training failed, falling back to template matching only");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
