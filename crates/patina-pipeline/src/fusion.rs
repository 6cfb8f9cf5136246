//! Fusion of several change signals into one binary mask.
//!
//! Three signals are OR-ed together:
//!
//! 1. the absolute grayscale difference above a fixed level,
//! 2. an adaptive threshold of that difference against its own
//!    Gaussian-weighted local mean,
//! 3. any structural dissimilarity (non-zero `1 - SSIM` after 8-bit
//!    quantization).
//!
//! The union is closed and then opened with a 5x5 ellipse.

use image::{GrayImage, Luma};

use crate::config::CompareConfig;
use crate::filter::window_sigma;
use crate::morphology::{StructuringElement, close, count_set, open};

/// Side of the elliptical cleanup element.
const CLEANUP_ELEMENT: u32 = 5;

/// The fused mask and how many pixels each signal flagged.
#[derive(Debug, Clone, PartialEq)]
pub struct Fusion {
    /// Cleaned binary change mask (255 = changed).
    pub mask: GrayImage,
    /// Pixels above the absolute difference threshold.
    pub absolute_pixels: u64,
    /// Pixels flagged by the adaptive threshold.
    pub adaptive_pixels: u64,
    /// Pixels with non-zero structural dissimilarity.
    pub structural_pixels: u64,
    /// Set pixels of the union before cleanup.
    pub raw_pixels: u64,
}

impl Fusion {
    /// Set pixels of the cleaned mask.
    #[must_use]
    pub fn changed_pixels(&self) -> u64 {
        count_set(&self.mask)
    }
}

/// Per-pixel absolute difference of two equally sized images.
#[must_use = "returns the difference image"]
pub fn absolute_difference(a: &GrayImage, b: &GrayImage) -> GrayImage {
    GrayImage::from_fn(a.width(), a.height(), |x, y| {
        Luma([a.get_pixel(x, y).0[0].abs_diff(b.get_pixel(x, y).0[0])])
    })
}

/// Binary mask of pixels strictly above `threshold`.
#[must_use = "returns the binary mask"]
pub fn threshold_above(image: &GrayImage, threshold: u8) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([if image.get_pixel(x, y).0[0] > threshold { 255 } else { 0 }])
    })
}

/// Binary mask of pixels exceeding their Gaussian-weighted local mean
/// by more than `offset`.
///
/// A constant image (in particular an all-zero difference) flags
/// nothing.
#[must_use = "returns the binary mask"]
pub fn adaptive_threshold(image: &GrayImage, block: u32, offset: f64) -> GrayImage {
    let local_mean = imageproc::filter::gaussian_blur_f32(image, window_sigma(block));
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let v = f64::from(image.get_pixel(x, y).0[0]);
        let mean = f64::from(local_mean.get_pixel(x, y).0[0]);
        Luma([if v > mean + offset { 255 } else { 0 }])
    })
}

/// Binary mask of non-zero pixels.
#[must_use = "returns the binary mask"]
pub fn nonzero(image: &GrayImage) -> GrayImage {
    threshold_above(image, 0)
}

fn union(masks: &[&GrayImage]) -> GrayImage {
    let (w, h) = masks.first().map_or((0, 0), |m| m.dimensions());
    GrayImage::from_fn(w, h, |x, y| {
        let hit = masks.iter().any(|m| m.get_pixel(x, y).0[0] > 0);
        Luma([if hit { 255 } else { 0 }])
    })
}

/// Fuse the change signals of a grayscale pair.
///
/// `dissimilarity` is the 8-bit `1 - SSIM` map of the same pair.
#[must_use]
pub fn fuse(
    before: &GrayImage,
    after: &GrayImage,
    dissimilarity: &GrayImage,
    config: &CompareConfig,
) -> Fusion {
    let diff = absolute_difference(before, after);
    let absolute = threshold_above(&diff, config.diff_threshold);
    let adaptive = adaptive_threshold(&diff, config.adaptive_block, config.adaptive_offset);
    let structural = nonzero(dissimilarity);

    let raw = union(&[&absolute, &adaptive, &structural]);
    let element = StructuringElement::ellipse(CLEANUP_ELEMENT);
    let mask = open(&close(&raw, &element), &element);

    Fusion {
        absolute_pixels: count_set(&absolute),
        adaptive_pixels: count_set(&adaptive),
        structural_pixels: count_set(&structural),
        raw_pixels: count_set(&raw),
        mask,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssim::ssim;

    fn fuse_pair(before: &GrayImage, after: &GrayImage) -> Fusion {
        let dissim = ssim(before, after).dissimilarity();
        fuse(before, after, &dissim, &CompareConfig::default())
    }

    #[test]
    fn identical_images_fuse_to_empty_mask() {
        let img = GrayImage::from_fn(60, 40, |x, y| Luma([u8::try_from((x * 3 + y * 5) % 256).unwrap_or(0)]));
        let fusion = fuse_pair(&img, &img);
        assert_eq!(fusion.raw_pixels, 0);
        assert_eq!(fusion.changed_pixels(), 0);
    }

    #[test]
    fn painted_block_is_detected() {
        let before = GrayImage::from_pixel(80, 80, Luma([120]));
        let mut after = before.clone();
        for y in 20..50 {
            for x in 30..60 {
                after.put_pixel(x, y, Luma([220]));
            }
        }
        let fusion = fuse_pair(&before, &after);
        assert!(fusion.absolute_pixels >= 900);
        assert_eq!(fusion.mask.get_pixel(45, 35).0[0], 255);
        assert_eq!(fusion.mask.get_pixel(2, 2).0[0], 0);
    }

    #[test]
    fn small_speck_is_cleaned_away() {
        let before = GrayImage::from_pixel(60, 60, Luma([120]));
        let mut after = before.clone();
        after.put_pixel(30, 30, Luma([121]));
        let fusion = fuse_pair(&before, &after);
        assert_eq!(fusion.absolute_pixels, 0);
        assert_eq!(fusion.changed_pixels(), 0);
    }

    #[test]
    fn adaptive_threshold_flags_local_peaks_only() {
        let mut img = GrayImage::new(21, 21);
        img.put_pixel(10, 10, Luma([100]));
        let mask = adaptive_threshold(&img, 11, 2.0);
        assert_eq!(mask.get_pixel(10, 10).0[0], 255);
        assert_eq!(mask.get_pixel(0, 0).0[0], 0);
        assert_eq!(count_set(&adaptive_threshold(&GrayImage::new(9, 9), 11, 2.0)), 0);
    }

    #[test]
    fn threshold_is_strict() {
        let img = GrayImage::from_fn(3, 1, |x, _| Luma([[29, 30, 31][x as usize]]));
        let mask = threshold_above(&img, 30);
        assert_eq!(mask.as_raw(), &vec![0, 0, 255]);
    }
}
