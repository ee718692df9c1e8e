mod common;
use common::*;

use image::{DynamicImage, GrayImage};
use inbody_digits::config::ClassifierConfig;
use inbody_digits::{
    Classification, DebugDir, NoopObserver, Recognition, RecognizedDigit, RecognizerConfig,
    annotate,
};
use std::sync::Arc;

const PRINTED: [(u8, u32, u32); 3] = [(2, 20, 100), (9, 60, 100), (0, 100, 100)];

fn report() -> DynamicImage {
    printed_panel(400, 200, &PRINTED)
}

fn pipeline() -> DigitPipeline {
    DigitPipeline::new(template_set(&[2, 9, 0]), LabelTable::new(vec![2, 9, 0]))
}

fn trained_knn() -> TrainedKnn {
    KnnClassifier::new(ClassifierConfig {
        k: 1,
        ..Default::default()
    })
    .train(&template_set(&[2, 9, 0]), &LabelTable::new(vec![2, 9, 0]))
    .expect("training data")
}

struct FailingClassifier;

impl GlyphClassifier for FailingClassifier {
    fn predict(&self, _glyph: &GrayImage) -> inbody_digits::Result<Classification> {
        Err(RecognizeError::EmptyGlyph)
    }
}

#[test]
fn test_recognize_with_template_labels() -> anyhow::Result<()> {
    let digits = pipeline().recognize(&report(), false)?;
    assert_eq!(digits, vec![2, 9, 0]);
    Ok(())
}

#[test]
fn test_recognize_detailed_reports_positions() -> anyhow::Result<()> {
    let recognition = pipeline().recognize_detailed(&report(), false)?;

    assert!(!recognition.refinement_applied);
    let positions: Vec<(u32, u32)> = recognition.digits.iter().map(|d| (d.x, d.y)).collect();
    assert_eq!(positions, vec![(20, 100), (60, 100), (100, 100)]);
    for d in &recognition.digits {
        assert!(!d.refined);
        assert!(d.confidence > 0.99);
        assert_eq!((d.width, d.height), (GLYPH_W, GLYPH_H));
    }
    Ok(())
}

#[test]
fn test_recognize_with_classifier_refinement() -> anyhow::Result<()> {
    let pipeline = pipeline().with_classifier(trained_knn());
    assert!(pipeline.has_classifier());

    let recognition = pipeline.recognize_detailed(&report(), true)?;

    assert!(recognition.refinement_applied);
    assert_eq!(recognition.digits(), vec![2, 9, 0]);
    assert!(recognition.digits.iter().all(|d| d.refined));
    assert!(recognition.confidences().iter().all(|&c| c > 0.99));
    Ok(())
}

#[test]
fn test_refinement_requested_without_classifier() -> anyhow::Result<()> {
    let recognition = pipeline().recognize_detailed(&report(), true)?;

    assert!(!recognition.refinement_applied);
    assert_eq!(recognition.digits(), vec![2, 9, 0]);
    Ok(())
}

#[test]
fn test_refinement_disabled_ignores_classifier() -> anyhow::Result<()> {
    let pipeline = pipeline().with_classifier(FailingClassifier);
    assert_eq!(pipeline.recognize(&report(), false)?, vec![2, 9, 0]);
    Ok(())
}

#[test]
fn test_classification_errors_skip_candidates() -> anyhow::Result<()> {
    let pipeline = pipeline().with_classifier(FailingClassifier);

    let recognition = pipeline.recognize_detailed(&report(), true)?;

    assert!(recognition.refinement_applied);
    assert!(recognition.digits.is_empty());
    Ok(())
}

/// Stands in for a classifier whose model was never loaded
struct UntrainedClassifier;

impl GlyphClassifier for UntrainedClassifier {
    fn predict(&self, _glyph: &GrayImage) -> inbody_digits::Result<Classification> {
        Err(RecognizeError::ClassifierNotTrained)
    }
}

#[test]
fn test_untrained_classifier_aborts_recognition() {
    let pipeline = pipeline().with_classifier(UntrainedClassifier);

    let result = pipeline.recognize(&report(), true);
    assert!(matches!(result, Err(RecognizeError::ClassifierNotTrained)));
}

#[test]
fn test_untrained_classifier_unused_without_refinement() -> anyhow::Result<()> {
    let pipeline = pipeline().with_classifier(UntrainedClassifier);
    assert_eq!(pipeline.recognize(&report(), false)?, vec![2, 9, 0]);
    Ok(())
}

#[test]
fn test_unlabelled_template_is_dropped() -> anyhow::Result<()> {
    let pipeline = DigitPipeline::new(template_set(&[2, 9, 0]), LabelTable::new(vec![2, 9]));
    assert_eq!(pipeline.recognize(&report(), false)?, vec![2, 9]);
    Ok(())
}

#[test]
fn test_digits_outside_panel_are_ignored() -> anyhow::Result<()> {
    // The third glyph sits right of the 40% panel boundary
    let photo = printed_panel(400, 200, &[(2, 20, 100), (9, 60, 100), (0, 300, 100)]);
    assert_eq!(pipeline().recognize(&photo, false)?, vec![2, 9]);
    Ok(())
}

#[test]
fn test_blank_report_yields_nothing() -> anyhow::Result<()> {
    let blank = printed_panel(400, 200, &[]);
    assert!(pipeline().recognize(&blank, false)?.is_empty());
    Ok(())
}

#[test]
fn test_stricter_threshold_from_config() -> anyhow::Result<()> {
    let mut config = RecognizerConfig::default();
    config.detect.min_score = 1.0;

    // Scores can reach 1.0 but never exceed it
    let digits = pipeline().with_config(config).recognize(&report(), false)?;
    assert!(digits.is_empty());
    Ok(())
}

#[test]
fn test_empty_image_is_rejected() {
    let result = pipeline().recognize(&DynamicImage::new_rgb8(0, 0), false);
    assert!(matches!(result, Err(RecognizeError::EmptyImage)));
}

#[test]
fn test_panel_width() {
    let pipeline = pipeline();
    assert_eq!(pipeline.panel_width(400), 160);
    assert_eq!(pipeline.panel_width(1), 1);
}

#[test]
fn test_debug_dir_receives_stages() -> anyhow::Result<()> {
    let root = tempfile::TempDir::new()?;
    let debug = root.path().join("debug");

    let pipeline = pipeline().with_observer(Arc::new(DebugDir::new(&debug)?));
    pipeline.recognize(&report(), false)?;

    for name in ["01_panel.png", "02_panel_binary.png", "03_annotated.png"] {
        assert!(debug.join(name).exists(), "missing {}", name);
    }
    Ok(())
}

#[test]
fn test_observer_does_not_change_result() -> anyhow::Result<()> {
    let observed = pipeline().with_observer(Arc::new(NoopObserver));
    assert_eq!(observed.recognize(&report(), false)?, pipeline().recognize(&report(), false)?);
    Ok(())
}

#[test]
fn test_debug_dir_must_be_empty() -> anyhow::Result<()> {
    let root = tempfile::TempDir::new()?;
    std::fs::write(root.path().join("leftover.png"), b"")?;

    let result = DebugDir::new(root.path());
    assert!(matches!(result, Err(RecognizeError::DebugDirNotEmpty(_))));
    Ok(())
}

#[test]
fn test_recognize_document_rectifies_first() -> anyhow::Result<()> {
    let photo = photo_with_polygon(320, 240, &[(60, 40), (250, 55), (240, 200), (50, 190)]);

    let (document, recognition) = pipeline().recognize_document(&photo, false)?;

    assert!(document.rectification.is_warped());
    assert!(recognition.digits.is_empty());
    Ok(())
}

#[test]
fn test_annotate_boxes_digits() {
    let panel = printed_panel(160, 200, &PRINTED);
    let recognition = Recognition {
        digits: vec![RecognizedDigit {
            digit: 2,
            confidence: 1.0,
            x: 20,
            y: 100,
            width: GLYPH_W,
            height: GLYPH_H,
            template_index: 0,
            refined: false,
        }],
        refinement_applied: false,
    };

    let canvas = annotate(&panel, &recognition);

    assert_eq!(canvas.dimensions(), (160, 200));
    assert_eq!(canvas.get_pixel(20, 100).0, [0, 255, 0]);
    assert_eq!(canvas.get_pixel(21, 101).0, [0, 255, 0]);
    assert_eq!(canvas.get_pixel(5, 5).0, [255, 255, 255]);
}
