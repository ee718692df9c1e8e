use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::{ThresholdType, otsu_level, threshold};
use imageproc::filter::separable_filter_equal;

/// Convert image to grayscale
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    img.to_luma8()
}

/// Normalized 1-D Gaussian with `size` taps centred on the middle tap
pub fn gaussian_kernel(size: u32, sigma: f32) -> Vec<f32> {
    let half = (size / 2) as f32;
    let weights: Vec<f32> = (0..size)
        .map(|i| {
            let d = i as f32 - half;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let total: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

/// Separable `kernel_size` x `kernel_size` Gaussian blur; color stays color
pub fn denoise(img: &DynamicImage, kernel_size: u32, sigma: f32) -> DynamicImage {
    let kernel = gaussian_kernel(kernel_size.max(1), sigma);
    match img {
        DynamicImage::ImageLuma8(gray) => {
            DynamicImage::ImageLuma8(separable_filter_equal(gray, &kernel))
        }
        other => DynamicImage::ImageRgb8(separable_filter_equal(&other.to_rgb8(), &kernel)),
    }
}

/// Global Otsu threshold, inverted: dark pixels become 255, light pixels 0
pub fn binarize_inverted(gray: &GrayImage) -> GrayImage {
    let level = otsu_level(gray);
    threshold(gray, level, ThresholdType::BinaryInverted)
}

/// Contrast-limited adaptive histogram equalization.
///
/// The image is split into `tiles` x `tiles` regions, each gets a clipped
/// histogram-equalization lookup table, and every pixel is mapped through a
/// bilinear blend of the four nearest tile tables.
pub fn enhance_contrast(gray: &GrayImage, tiles: u32, clip_limit: f32) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return gray.clone();
    }

    let tile_w = width.div_ceil(tiles.clamp(1, width));
    let tile_h = height.div_ceil(tiles.clamp(1, height));
    let tiles_x = width.div_ceil(tile_w);
    let tiles_y = height.div_ceil(tile_h);

    let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);
            luts.push(tile_lut(gray, (x0, y0, x1, y1), clip_limit));
        }
    }

    let lut_at = |tx: i64, ty: i64, v: usize| -> f32 {
        let tx = tx.clamp(0, tiles_x as i64 - 1) as u32;
        let ty = ty.clamp(0, tiles_y as i64 - 1) as u32;
        luts[(ty * tiles_x + tx) as usize][v] as f32
    };

    let mut out = GrayImage::new(width, height);
    for (x, y, pixel) in gray.enumerate_pixels() {
        let v = pixel[0] as usize;

        let gx = (x as f32 + 0.5) / tile_w as f32 - 0.5;
        let gy = (y as f32 + 0.5) / tile_h as f32 - 0.5;
        let tx0 = gx.floor() as i64;
        let ty0 = gy.floor() as i64;
        let fx = gx - tx0 as f32;
        let fy = gy - ty0 as f32;

        let top = (1.0 - fx) * lut_at(tx0, ty0, v) + fx * lut_at(tx0 + 1, ty0, v);
        let bottom = (1.0 - fx) * lut_at(tx0, ty0 + 1, v) + fx * lut_at(tx0 + 1, ty0 + 1, v);
        let value = (1.0 - fy) * top + fy * bottom;

        out.put_pixel(x, y, Luma([value.round().clamp(0.0, 255.0) as u8]));
    }

    out
}

fn tile_lut(
    gray: &GrayImage,
    (x0, y0, x1, y1): (u32, u32, u32, u32),
    clip_limit: f32,
) -> [u8; 256] {
    let mut hist = [0u32; 256];
    for y in y0..y1 {
        for x in x0..x1 {
            hist[gray.get_pixel(x, y)[0] as usize] += 1;
        }
    }
    let area = (x1 - x0) * (y1 - y0);

    if clip_limit > 0.0 {
        let limit = ((clip_limit * area as f32 / 256.0) as u32).max(1);
        let mut excess = 0u32;
        for h in hist.iter_mut() {
            if *h > limit {
                excess += *h - limit;
                *h = limit;
            }
        }

        let bonus = excess / 256;
        let residual = (excess % 256) as usize;
        for h in hist.iter_mut() {
            *h += bonus;
        }
        if residual > 0 {
            let step = (256 / residual).max(1);
            for i in (0..256).step_by(step).take(residual) {
                hist[i] += 1;
            }
        }
    }

    let scale = 255.0 / area.max(1) as f32;
    let mut lut = [0u8; 256];
    let mut sum = 0u32;
    for (i, h) in hist.iter().enumerate() {
        sum += h;
        lut[i] = (sum as f32 * scale).round().min(255.0) as u8;
    }
    lut
}
