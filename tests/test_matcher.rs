mod common;
use common::*;

use image::{GrayImage, Luma};
use inbody_digits::detection::matcher::best_match;

#[test]
fn test_single_template_found_at_its_position() {
    let template = glyph(4);
    let region = region_with(&template, 200, 150, 50, 50);
    let mut templates = TemplateSet::new();
    templates.insert(7, template);

    let candidates = TemplateDetector::new(0.8).detect(&region, &templates);

    assert_eq!(candidates.len(), 1);
    let c = candidates[0];
    assert_eq!(c.label, 7);
    assert!(c.score > 0.8, "score {}", c.score);
    assert!(c.x.abs_diff(50) <= 2 && c.y.abs_diff(50) <= 2, "at ({}, {})", c.x, c.y);
    assert_eq!((c.width, c.height), (GLYPH_W, GLYPH_H));
}

#[test]
fn test_exact_match_scores_one() {
    let template = glyph(2);
    let region = region_with(&template, 120, 90, 33, 21);

    let peak = best_match(&region, &template).expect("template fits");
    assert!((peak.score - 1.0).abs() < 1e-4, "score {}", peak.score);
    assert_eq!((peak.x, peak.y), (33, 21));
}

#[test]
fn test_each_template_proposes_its_own_best() {
    let mut region = GrayImage::new(200, 100);
    image::imageops::overlay(&mut region, &glyph(2), 20, 30);
    image::imageops::overlay(&mut region, &glyph(7), 120, 30);

    let templates = template_set(&[2, 7]);
    let candidates = TemplateDetector::new(0.8).detect(&region, &templates);

    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].label, 0);
    assert_eq!(candidates[0].position(), (20, 30));
    assert_eq!(candidates[1].label, 1);
    assert_eq!(candidates[1].position(), (120, 30));
}

#[test]
fn test_threshold_is_strict() {
    let template = glyph(8);
    let region = region_with(&template, 100, 80, 10, 10);
    let mut templates = TemplateSet::new();
    templates.insert(0, template);

    assert!(TemplateDetector::new(1.5).detect(&region, &templates).is_empty());
}

#[test]
fn test_oversized_template_is_skipped() {
    let region = GrayImage::new(20, 30);
    let mut templates = TemplateSet::new();
    templates.insert(0, glyph(1));

    assert!(best_match(&region, &glyph(1)).is_none());
    assert!(TemplateDetector::default().detect(&region, &templates).is_empty());
}

#[test]
fn test_flat_region_scores_zero() {
    let region = GrayImage::new(60, 60);
    let peak = best_match(&region, &glyph(3)).expect("template fits");

    assert_eq!(peak.score, 0.0);
    assert_eq!((peak.x, peak.y), (0, 0));
}

#[test]
fn test_absent_digit_is_not_proposed() {
    // Only a "1" on the page; an "8" template shares two segments at best
    let region = region_with(&glyph(1), 120, 80, 40, 20);
    let mut templates = TemplateSet::new();
    templates.insert(0, glyph(8));

    assert!(TemplateDetector::new(0.8).detect(&region, &templates).is_empty());
}

/// Plain zero-mean NCC at one placement
fn reference_score(image: &GrayImage, template: &GrayImage, x: u32, y: u32) -> f64 {
    let n = (template.width() * template.height()) as f64;
    let window: Vec<f64> = template
        .enumerate_pixels()
        .map(|(tx, ty, _)| image.get_pixel(x + tx, y + ty)[0] as f64)
        .collect();
    let tvals: Vec<f64> = template.pixels().map(|p| p[0] as f64).collect();
    let w_mean = window.iter().sum::<f64>() / n;
    let t_mean = tvals.iter().sum::<f64>() / n;

    let mut cross = 0.0;
    let mut w_norm = 0.0;
    let mut t_norm = 0.0;
    for (w, t) in window.iter().zip(&tvals) {
        cross += (w - w_mean) * (t - t_mean);
        w_norm += (w - w_mean).powi(2);
        t_norm += (t - t_mean).powi(2);
    }
    if w_norm * t_norm <= 0.0 {
        return 0.0;
    }
    cross / (w_norm * t_norm).sqrt()
}

#[test]
fn test_best_match_agrees_with_direct_correlation() {
    // Textured gray region: every window has variance
    let region = GrayImage::from_fn(48, 40, |x, y| {
        Luma([((x * 37 + y * 91 + x * y) % 251) as u8])
    });
    let template = image::imageops::crop_imm(&region, 17, 9, 12, 14).to_image();

    let peak = best_match(&region, &template).expect("template fits");

    let mut expected = (f64::MIN, 0, 0);
    for y in 0..=(region.height() - template.height()) {
        for x in 0..=(region.width() - template.width()) {
            let score = reference_score(&region, &template, x, y);
            if score > expected.0 {
                expected = (score, x, y);
            }
        }
    }

    assert_eq!((peak.x, peak.y), (expected.1, expected.2));
    assert_eq!((peak.x, peak.y), (17, 9));
    assert!((peak.score as f64 - expected.0).abs() < 1e-4);
}

#[test]
fn test_dark_ink_on_light_page() {
    // Black strokes on white: the template's zero pixels carry the shape
    let mut ink = glyph(7);
    image::imageops::invert(&mut ink);
    let mut page = GrayImage::from_pixel(100, 80, Luma([255]));
    image::imageops::overlay(&mut page, &ink, 30, 20);

    let peak = best_match(&page, &ink).expect("template fits");

    assert_eq!((peak.x, peak.y), (30, 20));
    assert!(peak.score > 0.999, "score {}", peak.score);
}
