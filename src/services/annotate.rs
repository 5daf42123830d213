use image::{DynamicImage, Rgb, RgbImage};

use crate::models::detection::Detection;

const PALETTE: [[u8; 3]; 8] = [
    [255, 56, 56],
    [255, 157, 151],
    [255, 112, 31],
    [255, 178, 29],
    [207, 210, 49],
    [72, 249, 10],
    [26, 147, 52],
    [0, 212, 187],
];

/// Stable box color per class label.
fn color_for(label: &str) -> Rgb<u8> {
    let hash = label
        .bytes()
        .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
    Rgb(PALETTE[hash % PALETTE.len()])
}

/// Pixel bounds `(x0, y0, x1, y1)` of a normalized center/size box, clamped
/// to the image.
fn pixel_bounds(detection: &Detection, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    if width == 0 || height == 0 {
        return None;
    }
    let (w, h) = (width as f32, height as f32);
    let clamp_x = |v: f32| (v.max(0.0).min(w - 1.0)) as u32;
    let clamp_y = |v: f32| (v.max(0.0).min(h - 1.0)) as u32;

    let x0 = clamp_x((detection.x - detection.w / 2.0) * w);
    let x1 = clamp_x((detection.x + detection.w / 2.0) * w);
    let y0 = clamp_y((detection.y - detection.h / 2.0) * h);
    let y1 = clamp_y((detection.y + detection.h / 2.0) * h);
    Some((x0, y0, x1, y1))
}

/// Copy of `image` with an outline drawn around every detection.
pub fn draw_detections(image: &DynamicImage, detections: &[Detection]) -> RgbImage {
    let mut canvas = image.to_rgb8();
    let (width, height) = canvas.dimensions();
    let thickness = (width.min(height) / 200).max(2);

    for detection in detections {
        let Some((x0, y0, x1, y1)) = pixel_bounds(detection, width, height) else {
            continue;
        };
        let color = color_for(&detection.class_label);

        for t in 0..thickness {
            let top = (y0 + t).min(y1);
            let bottom = y1.saturating_sub(t).max(y0);
            for x in x0..=x1 {
                canvas.put_pixel(x, top, color);
                canvas.put_pixel(x, bottom, color);
            }

            let left = (x0 + t).min(x1);
            let right = x1.saturating_sub(t).max(x0);
            for y in y0..=y1 {
                canvas.put_pixel(left, y, color);
                canvas.put_pixel(right, y, color);
            }
        }
    }
    canvas
}
