//! Image preprocessing ahead of recognition.
//!
//! Steps, in order:
//!
//! 1. grayscale
//! 2. contrast ×2 around the mean intensity
//! 3. 3×3 median filter against speckle
//! 4. Otsu binarisation followed by a second 3×3 median pass
//! 5. skew estimate from the minimum-area rectangle around the ink
//! 6. bicubic rotation about the centre with edge replication
//!
//! The whole chain is best-effort: an empty image or a panic inside any
//! step hands back the original page untouched.

use crate::pipeline::StepOutcome;
use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::filter::median_filter;
use imageproc::geometry::min_area_rect;
use imageproc::point::Point;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, instrument, warn};

/// Contrast gain applied around the mean intensity.
pub const CONTRAST_FACTOR: f32 = 2.0;

/// Rotations smaller than this (degrees) are not worth resampling the page.
const MIN_ROTATION_DEG: f64 = 0.01;

/// Run the full preprocessing chain on one page.
///
/// On success the result is a binarised, deskewed `Luma8` image with the
/// same dimensions as the input.
#[instrument(skip_all, fields(width = img.width(), height = img.height()))]
pub fn preprocess(img: &DynamicImage) -> StepOutcome<DynamicImage> {
    if img.width() == 0 || img.height() == 0 {
        return StepOutcome::degraded(img.clone(), "empty image");
    }

    match catch_unwind(AssertUnwindSafe(|| preprocess_gray(img))) {
        Ok(processed) => StepOutcome::Done(DynamicImage::ImageLuma8(processed)),
        Err(_) => {
            warn!("preprocessing panicked, using the original page");
            StepOutcome::degraded(img.clone(), "preprocessing panicked")
        }
    }
}

fn preprocess_gray(img: &DynamicImage) -> GrayImage {
    let gray = img.to_luma8();
    let enhanced = enhance_contrast(&gray, CONTRAST_FACTOR);
    let denoised = median_filter(&enhanced, 1, 1);
    let binary = median_filter(&binarize_otsu(&denoised), 1, 1);

    match estimate_skew(&binary) {
        Some(angle) if angle.abs() >= MIN_ROTATION_DEG => {
            debug!("deskewing by {angle:.2}°");
            rotate_bicubic(&binary, angle)
        }
        Some(_) => binary,
        None => {
            debug!("no ink found, skipping deskew");
            binary
        }
    }
}

// ── Contrast ─────────────────────────────────────────────────────────────────

/// Push every pixel away from the rounded mean by `factor`.
pub fn enhance_contrast(gray: &GrayImage, factor: f32) -> GrayImage {
    let n = gray.as_raw().len().max(1) as u64;
    let sum: u64 = gray.as_raw().iter().map(|&v| v as u64).sum();
    let mean = (sum as f64 / n as f64).round() as f32;

    let mut out = gray.clone();
    for p in out.pixels_mut() {
        let v = mean + factor * (p[0] as f32 - mean);
        p[0] = v.round().clamp(0.0, 255.0) as u8;
    }
    out
}

// ── Binarisation ─────────────────────────────────────────────────────────────

/// Otsu threshold: strictly above the level becomes white, the rest black.
pub fn binarize_otsu(gray: &GrayImage) -> GrayImage {
    let level = otsu_level(gray);
    debug!("otsu level {level}");
    let mut out = gray.clone();
    for p in out.pixels_mut() {
        p[0] = if p[0] > level { 255 } else { 0 };
    }
    out
}

// ── Skew ─────────────────────────────────────────────────────────────────────

/// Map a minimum-area-rectangle angle in [-90, 0) to a correction in
/// (-45, 45].
pub fn normalize_angle(raw: f64) -> f64 {
    if raw < -45.0 {
        -(90.0 + raw)
    } else {
        -raw
    }
}

/// Estimate the rotation (degrees, clockwise on screen) that straightens the
/// ink in a binary image, or `None` when there is no ink to measure.
pub fn estimate_skew(binary: &GrayImage) -> Option<f64> {
    let points = ink_outline(binary);
    if points.len() < 3 {
        return None;
    }

    let rect = min_area_rect(&points);
    let (dx, dy) = rect
        .iter()
        .zip(rect.iter().cycle().skip(1))
        .map(|(a, b)| ((b.x - a.x) as f64, (b.y - a.y) as f64))
        .find(|(dx, dy)| *dx != 0.0 || *dy != 0.0)?;

    let theta = dy.atan2(dx).to_degrees();
    let raw = theta.rem_euclid(90.0) - 90.0;
    Some(normalize_angle(raw))
}

/// Leftmost and rightmost ink pixel of every row. Their convex hull is the
/// hull of all ink, at a fraction of the point count.
fn ink_outline(binary: &GrayImage) -> Vec<Point<i32>> {
    let mut points = Vec::new();
    if binary.width() == 0 {
        return points;
    }
    for (y, row) in binary.as_raw().chunks(binary.width() as usize).enumerate() {
        let first = row.iter().position(|&v| v < 255);
        let last = row.iter().rposition(|&v| v < 255);
        if let (Some(l), Some(r)) = (first, last) {
            points.push(Point::new(l as i32, y as i32));
            if r != l {
                points.push(Point::new(r as i32, y as i32));
            }
        }
    }
    points
}

// ── Rotation ─────────────────────────────────────────────────────────────────

/// Rotate `img` by `angle_deg` (clockwise on screen) about its centre,
/// keeping its dimensions. Samples outside the source replicate the edge.
pub fn rotate_bicubic(img: &GrayImage, angle_deg: f64) -> GrayImage {
    let (w, h) = img.dimensions();
    let cx = (w / 2) as f64;
    let cy = (h / 2) as f64;
    let (sin, cos) = angle_deg.to_radians().sin_cos();

    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        let dy = y as f64 - cy;
        for x in 0..w {
            let dx = x as f64 - cx;
            // inverse map: rotate the destination offset back by -angle
            let sx = cos * dx + sin * dy + cx;
            let sy = -sin * dx + cos * dy + cy;
            out.put_pixel(x, y, Luma([sample_bicubic(img, sx, sy)]));
        }
    }
    out
}

fn cubic_weight(t: f64) -> f64 {
    const A: f64 = -0.75;
    let t = t.abs();
    if t <= 1.0 {
        ((A + 2.0) * t - (A + 3.0)) * t * t + 1.0
    } else if t < 2.0 {
        ((A * t - 5.0 * A) * t + 8.0 * A) * t - 4.0 * A
    } else {
        0.0
    }
}

fn sample_bicubic(img: &GrayImage, x: f64, y: f64) -> u8 {
    let (w, h) = img.dimensions();
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    let mut acc = 0.0;
    for j in -1..=2i64 {
        let wy = cubic_weight(j as f64 - fy);
        let sy = (y0 as i64 + j).clamp(0, h as i64 - 1) as u32;
        for i in -1..=2i64 {
            let wx = cubic_weight(i as f64 - fx);
            let sx = (x0 as i64 + i).clamp(0, w as i64 - 1) as u32;
            acc += wx * wy * img.get_pixel(sx, sy)[0] as f64;
        }
    }
    acc.round().clamp(0.0, 255.0) as u8
}
