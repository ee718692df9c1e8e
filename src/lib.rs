pub mod config;
pub mod debug;
pub mod detection;
pub mod error;
pub mod io;
pub mod labels;
pub mod models;

pub use config::RecognizerConfig;
pub use debug::{DebugDir, DebugObserver, NoopObserver};
pub use detection::classifier::{GlyphClassifier, KnnClassifier, TrainedKnn, load_or_train};
pub use detection::matcher::TemplateDetector;
pub use detection::rectify::{GeometryNormalizer, NormalizedDocument};
pub use detection::resolver::CandidateResolver;
pub use detection::{DigitPipeline, annotate};
pub use error::{RecognizeError, Result};
pub use io::{TemplateSet, load_image, load_template_set, save_image};
pub use labels::LabelTable;
pub use models::{
    BoundingBox, Candidate, Classification, Contour, QuadCorners, Recognition, RecognizedDigit,
    Rectification,
};
