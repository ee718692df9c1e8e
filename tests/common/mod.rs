#![allow(dead_code)]

mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from inbody_digits for tests
pub use inbody_digits::{
    Candidate, CandidateResolver, DigitPipeline, GlyphClassifier, KnnClassifier, LabelTable,
    RecognizeError, TemplateDetector, TemplateSet, TrainedKnn,
};
