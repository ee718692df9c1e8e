use std::path::PathBuf;

/// Errors returned by the recognition pipeline and its collaborators.
#[derive(thiserror::Error, Debug)]
pub enum RecognizeError {
    #[error("failed to read image {}: {source}", .path.display())]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to write image {}: {source}", .path.display())]
    ImageEncode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to read template directory {}: {source}", .path.display())]
    TemplateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("image has no pixels")]
    EmptyImage,
    #[error("no document contour found")]
    NoContourFound,
    #[error("no usable training templates")]
    NoTrainingData,
    #[error("classifier is not trained")]
    ClassifierNotTrained,
    #[error("glyph region is empty")]
    EmptyGlyph,
    #[error("model file {}: {source}", .path.display())]
    ModelIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed model: {0}")]
    ModelFormat(#[from] serde_json::Error),
    #[error("debug directory {}: {source}", .path.display())]
    DebugIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("debug directory is not empty: {}", .0.display())]
    DebugDirNotEmpty(PathBuf),
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, RecognizeError>;
