//! Tunable parameters for every stage of the recognizer.
//!
//! All sections carry `#[serde(default)]`, so a TOML file only needs the keys
//! it wants to override:
//!
//! ```toml
//! [detect]
//! min_score = 0.75
//!
//! [resolve]
//! row_band = 8
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{RecognizeError, Result};

/// Document normalization (blur, contrast, contour approximation)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Taps per axis of the Gaussian blur kernel; sigma is derived from it
    pub blur_kernel: u32,
    /// Tiles per axis for local histogram equalization
    pub clahe_tiles: u32,
    pub clahe_clip_limit: f32,
    /// Polygon approximation tolerance as a fraction of the contour perimeter
    pub approx_epsilon_ratio: f64,
}

impl NormalizeConfig {
    /// Sigma OpenCV picks for a given kernel size when sigma is left at 0.
    pub fn blur_sigma(&self) -> f32 {
        0.3 * ((self.blur_kernel as f32 - 1.0) * 0.5 - 1.0) + 0.8
    }
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            blur_kernel: 5,
            clahe_tiles: 8,
            clahe_clip_limit: 2.0,
            approx_epsilon_ratio: 0.02,
        }
    }
}

/// Template correlation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectConfig {
    /// A template proposes a candidate only when its best score exceeds this
    pub min_score: f32,
    /// Fraction of the image width (from the left) that holds the digit panel
    pub panel_fraction: f32,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            min_score: 0.8,
            panel_fraction: 0.4,
        }
    }
}

/// Duplicate suppression and reading order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    /// Per-axis distance below which two candidates are the same glyph
    pub proximity: u32,
    /// Height of the y bands that group glyphs into rows
    pub row_band: u32,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            proximity: 10,
            row_band: 5,
        }
    }
}

/// Nearest-neighbour glyph classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub k: usize,
    /// Side of the square canvas glyphs are resized to before flattening
    pub feature_size: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            k: 3,
            feature_size: 20,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    pub normalize: NormalizeConfig,
    pub detect: DetectConfig,
    pub resolve: ResolveConfig,
    pub classifier: ClassifierConfig,
}

impl RecognizerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| RecognizeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| RecognizeError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Reject values that would make a stage meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.normalize.blur_kernel == 0 || self.normalize.blur_kernel % 2 == 0 {
            return Err(RecognizeError::Config(
                "normalize.blur_kernel must be odd".to_string(),
            ));
        }
        let ratio = self.normalize.approx_epsilon_ratio;
        if !(ratio.is_finite() && ratio > 0.0) {
            return Err(RecognizeError::Config(
                "normalize.approx_epsilon_ratio must be a positive number".to_string(),
            ));
        }
        if self.normalize.clahe_tiles == 0 {
            return Err(RecognizeError::Config(
                "normalize.clahe_tiles must be positive".to_string(),
            ));
        }
        if !(self.detect.panel_fraction > 0.0 && self.detect.panel_fraction <= 1.0) {
            return Err(RecognizeError::Config(
                "detect.panel_fraction must be in (0, 1]".to_string(),
            ));
        }
        if self.resolve.row_band == 0 {
            return Err(RecognizeError::Config(
                "resolve.row_band must be positive".to_string(),
            ));
        }
        if self.classifier.k == 0 || self.classifier.feature_size == 0 {
            return Err(RecognizeError::Config(
                "classifier.k and classifier.feature_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
