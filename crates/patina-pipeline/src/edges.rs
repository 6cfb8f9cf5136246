//! Canny edge detection.
//!
//! Sobel gradients are taken directly on the input (no pre-blur) and
//! combined with the L1 norm `|gx| + |gy|`. Non-maximum suppression
//! quantizes the gradient direction into four bins, and hysteresis
//! grows strong edges through 8-connected weak ones. Thresholds are
//! strict: a pixel must exceed `low` to be a candidate and exceed
//! `high` to seed an edge.
//!
//! `imageproc::edges::canny` blurs internally and its hysteresis walks
//! off the image border, so the detector is implemented here.

use image::{GrayImage, Luma};
use imageproc::gradients::{horizontal_sobel, vertical_sobel};

/// `tan(22.5 deg)`.
const TAN_22_5: f32 = 0.414_213_57;
/// `tan(67.5 deg)`.
const TAN_67_5: f32 = 2.414_213_6;

/// Detect edges, returning a binary map (255 = edge).
///
/// `low` is clamped to at most `high`.
#[must_use = "returns the binary edge map"]
pub fn canny(image: &GrayImage, low: f32, high: f32) -> GrayImage {
    let low = low.min(high);
    let (w, h) = image.dimensions();
    let gx = horizontal_sobel(image);
    let gy = vertical_sobel(image);

    let magnitude: Vec<f32> = gx
        .iter()
        .zip(gy.iter())
        .map(|(a, b)| f32::from(a.unsigned_abs()) + f32::from(b.unsigned_abs()))
        .collect();
    let mag = |x: i64, y: i64| -> f32 {
        if x < 0 || y < 0 || x >= i64::from(w) || y >= i64::from(h) {
            return 0.0;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let idx = (y as usize) * (w as usize) + x as usize;
        magnitude[idx]
    };

    // 0 = suppressed, 1 = weak candidate, 2 = strong seed.
    let mut class = vec![0u8; magnitude.len()];
    for y in 0..h {
        for x in 0..w {
            let idx = (y * w + x) as usize;
            let m = magnitude[idx];
            if m <= low {
                continue;
            }
            let ax = f32::from(gx.get_pixel(x, y).0[0]);
            let ay = f32::from(gy.get_pixel(x, y).0[0]);
            let (xi, yi) = (i64::from(x), i64::from(y));
            let is_max = if ay.abs() < ax.abs() * TAN_22_5 {
                m > mag(xi - 1, yi) && m >= mag(xi + 1, yi)
            } else if ay.abs() > ax.abs() * TAN_67_5 {
                m > mag(xi, yi - 1) && m >= mag(xi, yi + 1)
            } else {
                let s = if (ax < 0.0) == (ay < 0.0) { 1 } else { -1 };
                m > mag(xi - s, yi - 1) && m > mag(xi + s, yi + 1)
            };
            if is_max {
                class[idx] = if m > high { 2 } else { 1 };
            }
        }
    }

    let mut out = GrayImage::new(w, h);
    let mut stack = Vec::new();
    for y in 0..h {
        for x in 0..w {
            let idx = (y * w + x) as usize;
            if class[idx] != 2 || out.get_pixel(x, y).0[0] != 0 {
                continue;
            }
            out.put_pixel(x, y, Luma([255]));
            stack.push((x, y));
            while let Some((cx, cy)) = stack.pop() {
                for dy in -1i64..=1 {
                    for dx in -1i64..=1 {
                        let nx = i64::from(cx) + dx;
                        let ny = i64::from(cy) + dy;
                        if nx < 0 || ny < 0 || nx >= i64::from(w) || ny >= i64::from(h) {
                            continue;
                        }
                        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                        let (nx, ny) = (nx as u32, ny as u32);
                        let nidx = (ny * w + nx) as usize;
                        if class[nidx] > 0 && out.get_pixel(nx, ny).0[0] == 0 {
                            out.put_pixel(nx, ny, Luma([255]));
                            stack.push((nx, ny));
                        }
                    }
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge_count(edges: &GrayImage) -> u32 {
        edges.pixels().map(|p| u32::from(p.0[0] > 0)).sum()
    }

    #[test]
    fn output_dimensions_match_input() {
        let img = GrayImage::new(17, 31);
        let edges = canny(&img, 50.0, 150.0);
        assert_eq!(edges.dimensions(), (17, 31));
    }

    #[test]
    fn uniform_image_has_no_edges() {
        let img = GrayImage::from_pixel(20, 20, Luma([128]));
        assert_eq!(edge_count(&canny(&img, 50.0, 150.0)), 0);
    }

    #[test]
    fn vertical_step_gives_thin_vertical_edge() {
        let img = GrayImage::from_fn(20, 20, |x, _| Luma([if x < 10 { 0 } else { 255 }]));
        let edges = canny(&img, 50.0, 150.0);
        for y in 0..20 {
            let row: u32 = (0..20).map(|x| u32::from(edges.get_pixel(x, y).0[0] > 0)).sum();
            assert_eq!(row, 1, "row {y} should hold exactly one edge pixel");
        }
    }

    #[test]
    fn edge_at_border_does_not_panic() {
        let img = GrayImage::from_fn(10, 10, |x, _| Luma([if x == 0 { 0 } else { 255 }]));
        let edges = canny(&img, 1.0, 2.0);
        assert!(edge_count(&edges) > 0);
    }

    #[test]
    fn faint_step_below_low_threshold_is_ignored() {
        let img = GrayImage::from_fn(20, 20, |x, _| Luma([if x < 10 { 100 } else { 108 }]));
        // L1 Sobel response of an 8-level step is 32.
        assert_eq!(edge_count(&canny(&img, 50.0, 150.0)), 0);
    }

    #[test]
    fn weak_edges_need_a_strong_neighbor() {
        // Step of 20 levels: Sobel L1 response 80, between the thresholds.
        let img = GrayImage::from_fn(20, 20, |x, _| Luma([if x < 10 { 100 } else { 120 }]));
        assert_eq!(edge_count(&canny(&img, 50.0, 150.0)), 0);
        assert!(edge_count(&canny(&img, 50.0, 70.0)) > 0);
    }
}
