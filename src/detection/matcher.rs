use image::GrayImage;
use log::{debug, warn};
use rayon::prelude::*;

use crate::io::TemplateSet;
use crate::models::Candidate;

const FLAT_EPS: f64 = 1e-9;

/// Best placement of one template inside an image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchPeak {
    pub score: f32,
    pub x: u32,
    pub y: u32,
}

/// Summed-area tables for pixel values and squared pixel values
struct WindowSums {
    width: usize,
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
}

impl WindowSums {
    fn new(image: &GrayImage) -> Self {
        let (w, h) = (image.width() as usize, image.height() as usize);
        let stride = w + 1;
        let mut sum = vec![0.0; stride * (h + 1)];
        let mut sum_sq = vec![0.0; stride * (h + 1)];
        let raw = image.as_raw();

        for y in 0..h {
            let mut row = 0.0;
            let mut row_sq = 0.0;
            for x in 0..w {
                let v = raw[y * w + x] as f64;
                row += v;
                row_sq += v * v;
                sum[(y + 1) * stride + x + 1] = sum[y * stride + x + 1] + row;
                sum_sq[(y + 1) * stride + x + 1] = sum_sq[y * stride + x + 1] + row_sq;
            }
        }

        Self {
            width: stride,
            sum,
            sum_sq,
        }
    }

    fn window(&self, x: usize, y: usize, w: usize, h: usize) -> (f64, f64) {
        let s = self.width;
        let at = |t: &[f64]| {
            t[(y + h) * s + x + w] - t[y * s + x + w] - t[(y + h) * s + x] + t[y * s + x]
        };
        (at(&self.sum), at(&self.sum_sq))
    }
}

/// Zero-mean normalized cross-correlation of `template` over every placement
/// inside `image`, reduced to the global maximum.
///
/// Scores lie in [-1, 1]. A flat window (or flat template) scores 0. On ties
/// the first placement in row-major order wins. Returns `None` when the
/// template does not fit.
pub fn best_match(image: &GrayImage, template: &GrayImage) -> Option<MatchPeak> {
    let (iw, ih) = (image.width() as usize, image.height() as usize);
    let (tw, th) = (template.width() as usize, template.height() as usize);
    if tw == 0 || th == 0 || tw > iw || th > ih {
        return None;
    }

    let n = (tw * th) as f64;
    let t_sum: f64 = template.pixels().map(|p| p[0] as f64).sum();
    let t_mean = t_sum / n;
    let t_norm: f64 = template
        .pixels()
        .map(|p| (p[0] as f64 - t_mean).powi(2))
        .sum();

    // sum(I * (T - mean)) = sum(I * T) - mean * sum(I); only non-zero template
    // pixels contribute to the first term.
    let t_taps: Vec<(usize, usize, f64)> = template
        .enumerate_pixels()
        .filter(|(_, _, p)| p[0] != 0)
        .map(|(x, y, p)| (y as usize, x as usize, p[0] as f64))
        .collect();

    let sums = WindowSums::new(image);
    let raw = image.as_raw();
    let mut best: Option<MatchPeak> = None;

    for y in 0..=(ih - th) {
        for x in 0..=(iw - tw) {
            let (s, s_sq) = sums.window(x, y, tw, th);
            let variance = s_sq - s * s / n;
            let denom = (t_norm * variance.max(0.0)).sqrt();

            let score = if denom > FLAT_EPS {
                let dot: f64 = t_taps
                    .iter()
                    .map(|&(ty, tx, t)| raw[(y + ty) * iw + x + tx] as f64 * t)
                    .sum();
                ((dot - t_mean * s) / denom) as f32
            } else {
                0.0
            };

            if best.is_none_or(|b| score > b.score) {
                best = Some(MatchPeak {
                    score,
                    x: x as u32,
                    y: y as u32,
                });
            }
        }
    }

    best
}

/// Proposes one candidate per template at that template's best placement
pub struct TemplateDetector {
    pub min_score: f32,
}

impl TemplateDetector {
    pub fn new(min_score: f32) -> Self {
        Self { min_score }
    }

    /// Correlate every template against `region`.
    ///
    /// Templates larger than the region are skipped. A template yields a
    /// candidate labelled with its catalog index when its peak score is
    /// strictly above `min_score`. Output follows catalog index order and is
    /// neither deduplicated nor mapped to digits.
    pub fn detect(&self, region: &GrayImage, templates: &TemplateSet) -> Vec<Candidate> {
        let entries: Vec<_> = templates.iter().collect();

        let candidates: Vec<Candidate> = entries
            .par_iter()
            .filter_map(|&(&index, template)| {
                let peak = match best_match(region, template) {
                    Some(peak) => peak,
                    None => {
                        warn!(
                            "Template {} ({}x{}) does not fit search region {}x{}",
                            index,
                            template.width(),
                            template.height(),
                            region.width(),
                            region.height()
                        );
                        return None;
                    }
                };

                if peak.score > self.min_score {
                    Some(Candidate {
                        label: index,
                        score: peak.score,
                        x: peak.x,
                        y: peak.y,
                        width: template.width(),
                        height: template.height(),
                    })
                } else {
                    None
                }
            })
            .collect();

        debug!(
            "{} of {} templates matched above {:.2}",
            candidates.len(),
            templates.len(),
            self.min_score
        );
        candidates
    }
}

impl Default for TemplateDetector {
    fn default() -> Self {
        Self::new(0.8)
    }
}
