use image::DynamicImage;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{RecognizeError, Result};

/// Receives named intermediate images while the pipeline runs.
///
/// Observers never influence recognition; failures inside an observer must be
/// handled (or ignored) by the observer itself.
pub trait DebugObserver: Send + Sync {
    fn observe(&self, stage: &str, image: &DynamicImage);
}

/// Observer that drops everything
pub struct NoopObserver;

impl DebugObserver for NoopObserver {
    fn observe(&self, _stage: &str, _image: &DynamicImage) {}
}

/// Saves each artifact as `NN_<stage>.png` in a dedicated directory
pub struct DebugDir {
    output_dir: PathBuf,
    counter: Mutex<usize>,
}

impl DebugDir {
    /// The directory must be empty or non-existent
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        let io_err = |source| RecognizeError::DebugIo {
            path: output_dir.clone(),
            source,
        };

        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir).map_err(io_err)?;
            if entries.count() > 0 {
                return Err(RecognizeError::DebugDirNotEmpty(output_dir));
            }
        } else {
            std::fs::create_dir_all(&output_dir).map_err(io_err)?;
        }

        Ok(Self {
            output_dir,
            counter: Mutex::new(0),
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn next_filename(&self, stage: &str) -> String {
        let mut counter = match self.counter.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *counter += 1;
        format!(
            "{:02}_{}.png",
            *counter,
            stage.to_lowercase().replace(' ', "_")
        )
    }
}

impl DebugObserver for DebugDir {
    fn observe(&self, stage: &str, image: &DynamicImage) {
        let filename = self.next_filename(stage);
        let path = self.output_dir.join(&filename);
        match image.save(&path) {
            Ok(()) => debug!("Debug: saved {}", filename),
            Err(e) => warn!("Failed to save debug image {}: {}", path.display(), e),
        }
    }
}
