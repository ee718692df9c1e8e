use image::GrayImage;
use imageproc::contours::{BorderType, find_contours};
use imageproc::geometry::contour_area;

use crate::models::Contour;

/// Outer borders of foreground regions that are not nested inside another region
pub fn find_external_contours(binary: &GrayImage) -> Vec<Contour> {
    find_contours::<i32>(binary)
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .map(|c| {
            let area = contour_area(&c.points).abs();
            Contour {
                points: c.points,
                area,
            }
        })
        .collect()
}

/// The external contour enclosing the largest area.
///
/// Contours with zero area never win, so an image of isolated pixels or
/// lines yields `None`.
pub fn largest_contour(contours: Vec<Contour>) -> Option<Contour> {
    let mut best: Option<Contour> = None;
    let mut max_area = 0.0;

    for contour in contours {
        if contour.area > max_area {
            max_area = contour.area;
            best = Some(contour);
        }
    }

    best
}
