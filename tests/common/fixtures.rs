use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_polygon_mut};
use imageproc::point::Point;
use imageproc::rect::Rect;

use inbody_digits::TemplateSet;

/// Glyph canvas size
pub const GLYPH_W: u32 = 24;
pub const GLYPH_H: u32 = 40;

// Seven-segment layout on the glyph canvas: (x, y, w, h)
const SEG_A: (i32, i32, u32, u32) = (5, 3, 14, 4);
const SEG_B: (i32, i32, u32, u32) = (17, 5, 4, 15);
const SEG_C: (i32, i32, u32, u32) = (17, 21, 4, 15);
const SEG_D: (i32, i32, u32, u32) = (5, 33, 14, 4);
const SEG_E: (i32, i32, u32, u32) = (3, 21, 4, 15);
const SEG_F: (i32, i32, u32, u32) = (3, 5, 4, 15);
const SEG_G: (i32, i32, u32, u32) = (5, 18, 14, 4);

fn segments(digit: u8) -> Vec<(i32, i32, u32, u32)> {
    match digit {
        0 => vec![SEG_A, SEG_B, SEG_C, SEG_D, SEG_E, SEG_F],
        1 => vec![SEG_B, SEG_C],
        2 => vec![SEG_A, SEG_B, SEG_D, SEG_E, SEG_G],
        3 => vec![SEG_A, SEG_B, SEG_C, SEG_D, SEG_G],
        4 => vec![SEG_B, SEG_C, SEG_F, SEG_G],
        5 => vec![SEG_A, SEG_C, SEG_D, SEG_F, SEG_G],
        6 => vec![SEG_A, SEG_C, SEG_D, SEG_E, SEG_F, SEG_G],
        7 => vec![SEG_A, SEG_B, SEG_C],
        8 => vec![SEG_A, SEG_B, SEG_C, SEG_D, SEG_E, SEG_F, SEG_G],
        9 => vec![SEG_A, SEG_B, SEG_C, SEG_D, SEG_F, SEG_G],
        _ => panic!("not a digit: {}", digit),
    }
}

/// Seven-segment digit, white strokes on black, like a binarized template
pub fn glyph(digit: u8) -> GrayImage {
    glyph_shifted(digit, 0, 0)
}

/// Same glyph with every stroke moved by (dx, dy) inside the canvas
pub fn glyph_shifted(digit: u8, dx: i32, dy: i32) -> GrayImage {
    let mut img = GrayImage::new(GLYPH_W, GLYPH_H);
    for (x, y, w, h) in segments(digit) {
        draw_filled_rect_mut(&mut img, Rect::at(x + dx, y + dy).of_size(w, h), Luma([255u8]));
    }
    img
}

/// Templates keyed 0.. in the order given
pub fn template_set(digits: &[u8]) -> TemplateSet {
    digits
        .iter()
        .enumerate()
        .map(|(index, &d)| (index, glyph(d)))
        .collect()
}

/// Black region with `template` pasted at (x, y)
pub fn region_with(template: &GrayImage, width: u32, height: u32, x: i64, y: i64) -> GrayImage {
    let mut region = GrayImage::new(width, height);
    image::imageops::overlay(&mut region, template, x, y);
    region
}

/// White printed page with dark digits at the given top-left positions
pub fn printed_panel(width: u32, height: u32, digits: &[(u8, u32, u32)]) -> DynamicImage {
    let mut page = RgbImage::from_pixel(width, height, Rgb([255u8, 255, 255]));
    for &(digit, px, py) in digits {
        let g = glyph(digit);
        for (x, y, p) in g.enumerate_pixels() {
            if p[0] > 0 {
                page.put_pixel(px + x, py + y, Rgb([0, 0, 0]));
            }
        }
    }
    DynamicImage::ImageRgb8(page)
}

/// Light background photo with a dark filled polygon
pub fn photo_with_polygon(width: u32, height: u32, corners: &[(i32, i32)]) -> DynamicImage {
    let mut photo = RgbImage::from_pixel(width, height, Rgb([220u8, 220, 220]));
    let points: Vec<Point<i32>> = corners.iter().map(|&(x, y)| Point::new(x, y)).collect();
    draw_polygon_mut(&mut photo, &points, Rgb([40u8, 40, 40]));
    DynamicImage::ImageRgb8(photo)
}

pub fn candidate(label: usize, score: f32, x: u32, y: u32) -> inbody_digits::Candidate {
    inbody_digits::Candidate {
        label,
        score,
        x,
        y,
        width: GLYPH_W,
        height: GLYPH_H,
    }
}
