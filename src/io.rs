use image::{DynamicImage, GrayImage, ImageReader};
use log::{debug, warn};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{RecognizeError, Result};

/// Template images keyed by zero-based catalog index
pub type TemplateSet = BTreeMap<usize, GrayImage>;

/// Number of templates in the InBody catalog
pub const INBODY_TEMPLATE_COUNT: usize = 44;

/// Load and decode an image from disk
pub fn load_image(path: impl AsRef<Path>) -> Result<DynamicImage> {
    let path = path.as_ref();
    ImageReader::open(path)
        .map_err(|e| RecognizeError::ImageDecode {
            path: path.to_path_buf(),
            source: image::ImageError::IoError(e),
        })?
        .decode()
        .map_err(|source| RecognizeError::ImageDecode {
            path: path.to_path_buf(),
            source,
        })
}

pub fn save_image(image: &DynamicImage, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    image.save(path).map_err(|source| RecognizeError::ImageEncode {
        path: path.to_path_buf(),
        source,
    })
}

/// File name of the N-th template (1-based, as the catalog numbers them)
pub fn template_file_name(number: usize) -> String {
    format!("tem ({}).png", number)
}

/// Load `tem (1).png` .. `tem (count).png` from `dir` as grayscale.
///
/// File N lands at index N - 1. Files that are missing or fail to decode are
/// skipped with a warning.
pub fn load_template_set(dir: impl AsRef<Path>, count: usize) -> Result<TemplateSet> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(RecognizeError::TemplateDir {
            path: dir.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        });
    }

    let mut templates = TemplateSet::new();
    for number in 1..=count {
        let path = dir.join(template_file_name(number));
        match load_image(&path) {
            Ok(img) => {
                templates.insert(number - 1, img.to_luma8());
            }
            Err(e) => warn!("Could not load template image: {}", e),
        }
    }

    debug!("Loaded {} of {} templates from {}", templates.len(), count, dir.display());
    Ok(templates)
}
