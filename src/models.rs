use imageproc::geometry::arc_length;
use imageproc::point::Point;
use serde::Serialize;

/// Axis-aligned rectangle in image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Closed outer boundary of a foreground region in a binary image
#[derive(Debug, Clone)]
pub struct Contour {
    pub points: Vec<Point<i32>>,
    pub area: f64,
}

impl Contour {
    pub fn perimeter(&self) -> f64 {
        arc_length(&self.points, true)
    }

    /// Minimal upright rectangle enclosing every point (inclusive of both ends).
    pub fn bounding_rect(&self) -> BoundingBox {
        let mut min_x = i32::MAX;
        let mut min_y = i32::MAX;
        let mut max_x = i32::MIN;
        let mut max_y = i32::MIN;

        for p in &self.points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }

        if self.points.is_empty() {
            return BoundingBox { x: 0, y: 0, width: 0, height: 0 };
        }

        BoundingBox {
            x: min_x.max(0) as u32,
            y: min_y.max(0) as u32,
            width: (max_x - min_x + 1) as u32,
            height: (max_y - min_y + 1) as u32,
        }
    }
}

/// Document corners in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuadCorners {
    pub top_left: (i32, i32),
    pub top_right: (i32, i32),
    pub bottom_right: (i32, i32),
    pub bottom_left: (i32, i32),
}

impl QuadCorners {
    /// Corners as floats, in TL, TR, BR, BL order.
    pub fn to_f32(&self) -> [(f32, f32); 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
        .map(|(x, y)| (x as f32, y as f32))
    }
}

/// Which path the normalizer took for a photo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Rectification {
    /// Four corners were found and perspective-corrected
    Warped { corners: QuadCorners },
    /// The contour was not a quadrilateral; its bounding box was cropped
    Cropped { bbox: BoundingBox },
}

impl Rectification {
    pub fn is_warped(&self) -> bool {
        matches!(self, Rectification::Warped { .. })
    }
}

/// A template's best match, before deduplication
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Candidate {
    /// Catalog index of the template (not yet a digit)
    pub label: usize,
    pub score: f32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Candidate {
    pub fn position(&self) -> (u32, u32) {
        (self.x, self.y)
    }

    /// Independent per-axis test: both |dx| and |dy| below `threshold`.
    pub fn is_close(&self, other: &Candidate, threshold: u32) -> bool {
        self.x.abs_diff(other.x) < threshold && self.y.abs_diff(other.y) < threshold
    }
}

/// Output of the glyph classifier for one region
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Classification {
    pub digit: u8,
    pub confidence: f32,
}

/// A digit in the final reading-order output
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RecognizedDigit {
    pub digit: u8,
    pub confidence: f32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub template_index: usize,
    /// True when the classifier supplied the digit
    pub refined: bool,
}

/// Result of a recognition run, with diagnostics
#[derive(Debug, Clone, Default, Serialize)]
pub struct Recognition {
    pub digits: Vec<RecognizedDigit>,
    pub refinement_applied: bool,
}

impl Recognition {
    /// The recognized digit sequence in reading order.
    pub fn digits(&self) -> Vec<u8> {
        self.digits.iter().map(|d| d.digit).collect()
    }

    pub fn confidences(&self) -> Vec<f32> {
        self.digits.iter().map(|d| d.confidence).collect()
    }
}
