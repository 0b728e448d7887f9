use image::{DynamicImage, Rgb, RgbImage};

use crate::errors::{DeskPilotError, DeskPilotResult};

pub const MEDIAN_RADIUS: u32 = 1;
pub const CONTRAST_FACTOR: f32 = 1.2;
pub const SHARPNESS_FACTOR: f32 = 1.1;

/// Decode an encoded screenshot (PNG/JPEG/…). Failure is fatal for the cycle.
pub fn decode(bytes: &[u8]) -> DeskPilotResult<DynamicImage> {
    image::load_from_memory(bytes).map_err(|e| DeskPilotError::ImageLoad(format!("decode: {e}")))
}

pub fn load(path: &std::path::Path) -> DeskPilotResult<DynamicImage> {
    image::open(path)
        .map_err(|e| DeskPilotError::ImageLoad(format!("{}: {e}", path.display())))
}

/// Run the full enhancement chain. Output has the input's dimensions.
pub fn enhance(image: &DynamicImage) -> RgbImage {
    let rgb = image.to_rgb8();
    let denoised = imageproc::filter::median_filter(&rgb, MEDIAN_RADIUS, MEDIAN_RADIUS);
    let contrasted = enhance_contrast(&denoised, CONTRAST_FACTOR);
    let sharpened = enhance_sharpness(&contrasted, SHARPNESS_FACTOR);
    tracing::debug!(
        width = sharpened.width(),
        height = sharpened.height(),
        "image enhanced"
    );
    sharpened
}

/// ITU-R 601 luma, integer form.
fn luma(p: &Rgb<u8>) -> u32 {
    (p[0] as u32 * 299 + p[1] as u32 * 587 + p[2] as u32 * 114) / 1000
}

fn blend(degenerate: f32, value: f32, factor: f32) -> u8 {
    (degenerate + factor * (value - degenerate)).round().clamp(0.0, 255.0) as u8
}

/// Push every channel away from the image's mean luminance by `factor`.
pub fn enhance_contrast(image: &RgbImage, factor: f32) -> RgbImage {
    let count = (image.width() as u64 * image.height() as u64).max(1);
    let sum: u64 = image.pixels().map(|p| luma(p) as u64).sum();
    let mean = ((sum as f64 / count as f64) + 0.5).floor() as f32;

    let mut out = image.clone();
    for p in out.pixels_mut() {
        for c in 0..3 {
            p[c] = blend(mean, p[c] as f32, factor);
        }
    }
    out
}

/// Blend against a 3×3 smoothed copy (centre weight 5, neighbours 1).
/// Border pixels have no full neighbourhood and stay as they are.
pub fn enhance_sharpness(image: &RgbImage, factor: f32) -> RgbImage {
    let (w, h) = image.dimensions();
    let mut out = image.clone();
    if w < 3 || h < 3 {
        return out;
    }

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let mut acc = [0u32; 3];
            for dy in 0..3u32 {
                for dx in 0..3u32 {
                    let weight = if dx == 1 && dy == 1 { 5 } else { 1 };
                    let p = image.get_pixel(x + dx - 1, y + dy - 1);
                    for c in 0..3 {
                        acc[c] += p[c] as u32 * weight;
                    }
                }
            }
            let src = image.get_pixel(x, y);
            let dst = out.get_pixel_mut(x, y);
            for c in 0..3 {
                let smooth = (acc[c] as f32 / 13.0).round();
                dst[c] = blend(smooth, src[c] as f32, factor);
            }
        }
    }
    out
}
