//! Crack and surface-damage detection.
//!
//! Cracks are counted as straight edge segments: Canny edges fed to the
//! probabilistic Hough detector. Damage is the fraction of dark spots
//! left after a small opening removes isolated dark pixels.

use image::{GrayImage, Luma};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::config::CrackConfig;
use crate::edges::canny;
use crate::hough::{LineSegment, detect_segments};
use crate::morphology::{count_set, open_square};

/// Seed for the order in which edge pixels are visited.
const SEGMENT_ORDER_SEED: u64 = 0x6372_6163_6b73;

/// Straight crack-like segments in a grayscale image.
#[must_use]
pub fn crack_segments(gray: &GrayImage, config: &CrackConfig) -> Vec<LineSegment> {
    let edges = canny(gray, config.canny_low, config.canny_high);
    let mut rng = StdRng::seed_from_u64(SEGMENT_ORDER_SEED);
    detect_segments(&edges, config, &mut rng)
}

/// Binary mask of dark spots surviving the opening (255 = damaged).
#[must_use = "returns the damage mask"]
pub fn damage_mask(gray: &GrayImage, config: &CrackConfig) -> GrayImage {
    let dark = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        Luma([if gray.get_pixel(x, y).0[0] <= config.dark_threshold { 255 } else { 0 }])
    });
    open_square(&dark, config.opening_iterations)
}

/// Fraction of damaged pixels, in `[0, 1]`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn damage_ratio(gray: &GrayImage, config: &CrackConfig) -> f64 {
    let total = u64::from(gray.width()) * u64::from(gray.height());
    if total == 0 {
        return 0.0;
    }
    count_set(&damage_mask(gray, config)) as f64 / total as f64
}
