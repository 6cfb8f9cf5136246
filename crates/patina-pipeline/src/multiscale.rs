//! Structural similarity at several resolutions.
//!
//! Each scale resizes both images independently, so the samples are
//! computed in parallel and collected in the requested order.

use image::RgbImage;
use rayon::prelude::*;

use crate::grayscale::to_gray;
use crate::normalize::resize_to;
use crate::ssim::ssim;
use crate::types::{Dimensions, ScaleSample};

/// Dimensions of a `dimensions` image resized by `scale` (truncated,
/// at least one pixel per axis).
#[must_use]
pub fn scaled_dimensions(dimensions: Dimensions, scale: f64) -> Dimensions {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let scale_axis = |v: u32| ((f64::from(v) * scale) as u32).max(1);
    Dimensions {
        width: scale_axis(dimensions.width),
        height: scale_axis(dimensions.height),
    }
}

/// Mean SSIM of the pair at one scale, clamped to `[0, 1]`.
#[must_use]
pub fn similarity_at(before: &RgbImage, after: &RgbImage, scale: f64) -> f64 {
    let target = scaled_dimensions(Dimensions::of(before), scale);
    let a = to_gray(&resize_to(before, target));
    let b = to_gray(&resize_to(after, target));
    ssim(&a, &b).mean().clamp(0.0, 1.0)
}

/// One [`ScaleSample`] per entry of `scales`, in the same order.
///
/// `scales` must already be validated to lie in `(0, 1]`.
#[must_use]
pub fn multiscale_similarity(before: &RgbImage, after: &RgbImage, scales: &[f64]) -> Vec<ScaleSample> {
    scales
        .par_iter()
        .map(|&scale| ScaleSample {
            scale,
            similarity: similarity_at(before, after, scale),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn pattern(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            let v = u8::try_from((x * 5 + y * 9) % 256).unwrap_or(0);
            Rgb([v, v / 2, 255 - v])
        })
    }

    #[test]
    fn scaled_dimensions_truncate() {
        let d = Dimensions {
            width: 801,
            height: 601,
        };
        assert_eq!(
            scaled_dimensions(d, 0.5),
            Dimensions {
                width: 400,
                height: 300
            }
        );
    }

    #[test]
    fn tiny_scale_keeps_one_pixel() {
        let d = Dimensions {
            width: 3,
            height: 2,
        };
        assert_eq!(
            scaled_dimensions(d, 0.1),
            Dimensions {
                width: 1,
                height: 1
            }
        );
    }

    #[test]
    fn identical_pair_is_one_at_every_scale() {
        let img = pattern(80, 60);
        let samples = multiscale_similarity(&img, &img, &[1.0, 0.5, 0.25]);
        assert_eq!(samples.len(), 3);
        for s in &samples {
            assert!((s.similarity - 1.0).abs() < f64::EPSILON, "{s:?}");
        }
    }

    #[test]
    fn order_follows_request() {
        let a = pattern(64, 64);
        let b = RgbImage::from_pixel(64, 64, Rgb([10, 10, 10]));
        let scales = [0.25, 1.0, 0.5];
        let samples = multiscale_similarity(&a, &b, &scales);
        let got: Vec<f64> = samples.iter().map(|s| s.scale).collect();
        assert_eq!(got, scales);
        assert!(samples.iter().all(|s| (0.0..=1.0).contains(&s.similarity)));
    }
}
