//! Document normalization: locate the report in a photo and flatten it.
//!
//! The photo is blurred, converted to gray, contrast-equalized per tile and
//! binarized with an inverted Otsu threshold. The largest external contour is
//! approximated by a polygon; a four-vertex result is perspective-warped to
//! an upright rectangle, anything else falls back to a bounding-box crop.

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use imageproc::geometry::approximate_polygon_dp;
use imageproc::point::Point;
use log::{debug, info};
use std::sync::Arc;

use crate::config::NormalizeConfig;
use crate::debug::DebugObserver;
use crate::detection::{contours, preprocessing};
use crate::error::{RecognizeError, Result};
use crate::models::{BoundingBox, Contour, QuadCorners, Rectification};

/// A normalized document and the path that produced it
#[derive(Debug, Clone)]
pub struct NormalizedDocument {
    pub image: DynamicImage,
    pub rectification: Rectification,
}

/// Order four points as top-left, top-right, bottom-right, bottom-left.
///
/// Top-left has the smallest x + y and bottom-right the largest. Top-right has
/// the smallest y - x and bottom-left the largest. The first point wins ties,
/// so the result depends only on coordinates for any non-degenerate quad.
pub fn order_points(pts: &[Point<i32>; 4]) -> QuadCorners {
    let sum = |p: &Point<i32>| p.x + p.y;
    let diff = |p: &Point<i32>| p.y - p.x;

    let pick = |key: &dyn Fn(&Point<i32>) -> i32, want_max: bool| -> (i32, i32) {
        let mut best = pts[0];
        for p in &pts[1..] {
            let better = if want_max {
                key(p) > key(&best)
            } else {
                key(p) < key(&best)
            };
            if better {
                best = *p;
            }
        }
        (best.x, best.y)
    };

    QuadCorners {
        top_left: pick(&sum, false),
        top_right: pick(&diff, false),
        bottom_right: pick(&sum, true),
        bottom_left: pick(&diff, true),
    }
}

/// Approximate the contour as a polygon; `Some` only for exactly four vertices
pub fn approximate_quad(contour: &Contour, epsilon_ratio: f64) -> Option<[Point<i32>; 4]> {
    let epsilon = epsilon_ratio * contour.perimeter();
    if !(epsilon.is_finite() && epsilon > 0.0) {
        return None;
    }
    let approx = approximate_closed_polygon(&contour.points, epsilon);
    debug!("Contour approximated with {} vertices", approx.len());
    <[Point<i32>; 4]>::try_from(approx).ok()
}

/// Douglas-Peucker over a closed curve.
///
/// The curve is cut at the two points farthest apart (the farthest point from
/// the start, then the farthest point from that one) and each half is
/// simplified as an open curve. Both cut points are always kept.
pub fn approximate_closed_polygon(points: &[Point<i32>], epsilon: f64) -> Vec<Point<i32>> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let farthest_from = |origin: Point<i32>| -> usize {
        let mut best = 0;
        let mut best_dist = -1i64;
        for (i, p) in points.iter().enumerate() {
            let dx = (p.x - origin.x) as i64;
            let dy = (p.y - origin.y) as i64;
            let dist = dx * dx + dy * dy;
            if dist > best_dist {
                best_dist = dist;
                best = i;
            }
        }
        best
    };

    let a = farthest_from(points[0]);
    let b = farthest_from(points[a]);
    let (start, end) = (a.min(b), a.max(b));
    if start == end {
        return vec![points[start]];
    }

    let wrapped: Vec<Point<i32>> = points[end..]
        .iter()
        .chain(&points[..=start])
        .copied()
        .collect();

    let mut polygon = approximate_polygon_dp(&points[start..=end], epsilon, false);
    // points[end] opens the second half
    polygon.pop();
    polygon.extend(approximate_polygon_dp(&wrapped, epsilon, false));
    // and points[start] closes it
    polygon.pop();
    polygon
}

fn distance(a: (i32, i32), b: (i32, i32)) -> f64 {
    let dx = (a.0 - b.0) as f64;
    let dy = (a.1 - b.1) as f64;
    (dx * dx + dy * dy).sqrt()
}

/// Size of the upright rectangle the quad is warped to: the longer of each
/// pair of opposite edges, truncated.
pub fn target_size(corners: &QuadCorners) -> (u32, u32) {
    let width_bottom = distance(corners.bottom_right, corners.bottom_left) as u32;
    let width_top = distance(corners.top_right, corners.top_left) as u32;
    let height_right = distance(corners.top_right, corners.bottom_right) as u32;
    let height_left = distance(corners.top_left, corners.bottom_left) as u32;

    (width_bottom.max(width_top), height_right.max(height_left))
}

/// Projection taking the quad onto `[0, 0] - [width - 1, height - 1]`
pub fn perspective_projection(
    corners: &QuadCorners,
    width: u32,
    height: u32,
) -> Option<Projection> {
    let w = width as f32 - 1.0;
    let h = height as f32 - 1.0;
    let dst = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];
    Projection::from_control_points(corners.to_f32(), dst)
}

/// Perspective-correct the quad region of `image`.
///
/// Returns `None` when the quad collapses to a zero-sized rectangle or the
/// corners are degenerate.
pub fn warp_quad(image: &DynamicImage, corners: &QuadCorners) -> Option<DynamicImage> {
    let (width, height) = target_size(corners);
    if width == 0 || height == 0 {
        return None;
    }
    let projection = perspective_projection(corners, width, height)?;

    let warped = match image {
        DynamicImage::ImageLuma8(gray) => {
            let mut out = GrayImage::new(width, height);
            warp_into(gray, &projection, Interpolation::Bilinear, Luma([0]), &mut out);
            DynamicImage::ImageLuma8(out)
        }
        other => {
            let mut out = RgbImage::new(width, height);
            warp_into(
                &other.to_rgb8(),
                &projection,
                Interpolation::Bilinear,
                Rgb([0, 0, 0]),
                &mut out,
            );
            DynamicImage::ImageRgb8(out)
        }
    };

    Some(warped)
}

/// Crop `bbox` out of `image`, clamped to the image bounds
pub fn crop_bbox(image: &DynamicImage, bbox: &BoundingBox) -> DynamicImage {
    let x = bbox.x.min(image.width().saturating_sub(1));
    let y = bbox.y.min(image.height().saturating_sub(1));
    let width = bbox.width.min(image.width() - x).max(1);
    let height = bbox.height.min(image.height() - y).max(1);
    image.crop_imm(x, y, width, height)
}

/// Finds and flattens the document region of a photo
pub struct GeometryNormalizer {
    pub config: NormalizeConfig,
    observer: Option<Arc<dyn DebugObserver>>,
}

impl GeometryNormalizer {
    pub fn new() -> Self {
        Self {
            config: NormalizeConfig::default(),
            observer: None,
        }
    }

    pub fn with_config(mut self, config: NormalizeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn DebugObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    fn emit(&self, stage: &str, image: impl FnOnce() -> DynamicImage) {
        if let Some(observer) = &self.observer {
            observer.observe(stage, &image());
        }
    }

    /// Blur, gray, equalize and binarize; the document ends up white
    pub fn binarize(&self, photo: &DynamicImage) -> GrayImage {
        self.emit("original", || photo.clone());

        let denoised =
            preprocessing::denoise(photo, self.config.blur_kernel, self.config.blur_sigma());
        self.emit("denoised", || denoised.clone());

        let gray = preprocessing::to_grayscale(&denoised);
        self.emit("gray", || DynamicImage::ImageLuma8(gray.clone()));

        let enhanced = preprocessing::enhance_contrast(
            &gray,
            self.config.clahe_tiles,
            self.config.clahe_clip_limit,
        );
        self.emit("enhanced", || DynamicImage::ImageLuma8(enhanced.clone()));

        let binary = preprocessing::binarize_inverted(&enhanced);
        self.emit("binary", || DynamicImage::ImageLuma8(binary.clone()));

        binary
    }

    /// Largest external contour of the binarized photo
    pub fn find_document_contour(&self, binary: &GrayImage) -> Result<Contour> {
        let all = contours::find_external_contours(binary);
        debug!("Found {} external contours", all.len());
        contours::largest_contour(all).ok_or(RecognizeError::NoContourFound)
    }

    /// Rectify the document in `photo`, or crop its bounding box when the
    /// outline is not a quadrilateral.
    pub fn rectify(&self, photo: &DynamicImage) -> Result<NormalizedDocument> {
        let binary = self.binarize(photo);
        let contour = self.find_document_contour(&binary)?;
        debug!(
            "Largest contour: {} points, area {:.0}",
            contour.points.len(),
            contour.area
        );

        let warped = approximate_quad(&contour, self.config.approx_epsilon_ratio).and_then(|quad| {
            let corners = order_points(&quad);
            warp_quad(photo, &corners).map(|image| (image, corners))
        });

        let document = match warped {
            Some((image, corners)) => {
                info!("Applied perspective correction ({}x{})", image.width(), image.height());
                NormalizedDocument {
                    image,
                    rectification: Rectification::Warped { corners },
                }
            }
            None => {
                let bbox = contour.bounding_rect();
                info!(
                    "Outline is not a quadrilateral, cropping bounding box {}x{} at ({}, {})",
                    bbox.width, bbox.height, bbox.x, bbox.y
                );
                NormalizedDocument {
                    image: crop_bbox(photo, &bbox),
                    rectification: Rectification::Cropped { bbox },
                }
            }
        };

        self.emit("rectified", || document.image.clone());
        Ok(document)
    }
}

impl Default for GeometryNormalizer {
    fn default() -> Self {
        Self::new()
    }
}
