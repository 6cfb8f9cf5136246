//! Rust and corrosion classification.
//!
//! A pixel is corroded when its color falls in one of three HSV bands
//! (orange-brown, dark brown, reddish) or when the local high-pass
//! texture response exceeds a fixed level. The color bands use the
//! 8-bit HSV convention of [`crate::grayscale::hsv`].

use image::{GrayImage, Luma, Rgb, RgbImage};

use crate::filter::{HIGH_PASS_8, convolve_3x3_saturating};
use crate::grayscale::{hsv, to_gray};
use crate::types::BoundingBox;

/// Inclusive HSV box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HsvRange {
    /// Lower `[h, s, v]` bound.
    pub lower: [u8; 3],
    /// Upper `[h, s, v]` bound.
    pub upper: [u8; 3],
}

impl HsvRange {
    /// Whether an HSV triple lies inside the box.
    #[must_use]
    pub fn contains(&self, value: [u8; 3]) -> bool {
        (0..3).all(|i| self.lower[i] <= value[i] && value[i] <= self.upper[i])
    }
}

/// Corrosion color bands: orange-brown, dark brown, reddish.
pub const CORROSION_RANGES: [HsvRange; 3] = [
    HsvRange {
        lower: [5, 50, 50],
        upper: [25, 255, 255],
    },
    HsvRange {
        lower: [0, 30, 30],
        upper: [15, 150, 150],
    },
    HsvRange {
        lower: [0, 100, 50],
        upper: [10, 255, 200],
    },
];

/// High-pass response above which a pixel counts as rough texture.
pub const TEXTURE_THRESHOLD: u8 = 50;

/// Whether an RGB pixel has a corrosion color.
#[must_use]
pub fn is_corrosion_color(pixel: Rgb<u8>) -> bool {
    let value = hsv(pixel);
    CORROSION_RANGES.iter().any(|range| range.contains(value))
}

/// Binary corrosion mask (255 = corroded) of an RGB image.
#[must_use = "returns the corrosion mask"]
pub fn corrosion_mask(image: &RgbImage) -> GrayImage {
    let texture = convolve_3x3_saturating(&to_gray(image), &HIGH_PASS_8);
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let rough = texture.get_pixel(x, y).0[0] > TEXTURE_THRESHOLD;
        let hit = rough || is_corrosion_color(*image.get_pixel(x, y));
        Luma([if hit { 255 } else { 0 }])
    })
}

/// Fraction of corroded pixels, in `[0, 1]`.
///
/// An empty image has no corrosion.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn corrosion_ratio(image: &RgbImage) -> f64 {
    let total = u64::from(image.width()) * u64::from(image.height());
    if total == 0 {
        return 0.0;
    }
    crate::morphology::count_set(&corrosion_mask(image)) as f64 / total as f64
}

/// Corrosion ratio of the `bbox` crop of `image`.
///
/// The crop is analyzed on its own, so texture at the crop edge is
/// mirrored from inside the crop.
#[must_use]
pub fn corrosion_ratio_in(image: &RgbImage, bbox: BoundingBox) -> f64 {
    let crop = image::imageops::crop_imm(image, bbox.x, bbox.y, bbox.w, bbox.h).to_image();
    corrosion_ratio(&crop)
}
