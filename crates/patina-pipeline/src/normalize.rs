//! Size normalization of the before/after pair.
//!
//! The "before" image is downscaled so its width does not exceed the
//! working ceiling, preserving aspect ratio. The "after" image is then
//! force-fit to exactly the same dimensions (its own aspect ratio is
//! not preserved), so every later stage can compare pixel for pixel.

use image::imageops::FilterType;
use image::RgbImage;

use crate::types::Dimensions;

/// Resampling filter used for every resize in the engine (bilinear).
pub(crate) const RESIZE_FILTER: FilterType = FilterType::Triangle;

/// Working dimensions for a "before" image of `dimensions`.
///
/// Widths above `max_width` are scaled down to `max_width` and the
/// height follows proportionally (truncated, at least one pixel).
#[must_use]
pub fn working_dimensions(dimensions: Dimensions, max_width: u32) -> Dimensions {
    if dimensions.width <= max_width {
        return dimensions;
    }
    let scale = f64::from(max_width) / f64::from(dimensions.width);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let height = (f64::from(dimensions.height) * scale) as u32;
    Dimensions {
        width: max_width,
        height: height.max(1),
    }
}

/// Resize `image` to exactly `target`, returning a copy when it is
/// already that size.
#[must_use = "returns the resized image"]
pub fn resize_to(image: &RgbImage, target: Dimensions) -> RgbImage {
    if image.dimensions() == (target.width, target.height) {
        return image.clone();
    }
    image::imageops::resize(image, target.width, target.height, RESIZE_FILTER)
}

/// Normalize a before/after pair to shared working dimensions.
///
/// Returns the normalized `(before, after)` images; both have the
/// dimensions given by [`working_dimensions`] of the "before" image.
#[must_use = "returns the normalized image pair"]
pub fn normalize_pair(before: &RgbImage, after: &RgbImage, max_width: u32) -> (RgbImage, RgbImage) {
    let target = working_dimensions(Dimensions::of(before), max_width);
    (resize_to(before, target), resize_to(after, target))
}
