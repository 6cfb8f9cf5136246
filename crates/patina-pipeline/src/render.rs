//! Raster artifacts of a comparison.
//!
//! All artifacts are built in memory; writing them is left to the
//! caller. None of them feeds back into the numeric results.

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use imageproc::rect::Rect;

use crate::colormap::Colormap;
use crate::filter::window_sigma;
use crate::grayscale::to_gray;
use crate::types::BoundingBox;

/// Box outline color on the annotated image.
pub const ANNOTATION_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// The five rendered artifacts.
#[derive(Debug, Clone)]
pub struct Artifacts {
    /// Aligned "after" image with every change region outlined.
    pub annotated: RgbImage,
    /// Gradient-magnitude heatmap of the "before" image.
    pub before_heatmap: RgbImage,
    /// Structural dissimilarity heatmap.
    pub heatmap: RgbImage,
    /// Fused change mask visualization.
    pub diff_mask: RgbImage,
    /// "Before" and aligned "after" side by side.
    pub comparison: RgbImage,
}

/// Outline `boxes` on a copy of `image`, two pixels wide.
///
/// Each outline runs from `(x, y)` to `(x + w, y + h)` inclusive and is
/// clipped to the image.
#[must_use = "returns the annotated image"]
pub fn annotate(image: &RgbImage, boxes: &[BoundingBox]) -> RgbImage {
    let mut out = image.clone();
    for bbox in boxes {
        let x = i32::try_from(bbox.x).unwrap_or(i32::MAX);
        let y = i32::try_from(bbox.y).unwrap_or(i32::MAX);
        draw_hollow_rect_mut(&mut out, Rect::at(x, y).of_size(bbox.w + 1, bbox.h + 1), ANNOTATION_COLOR);
        if bbox.w > 1 && bbox.h > 1 {
            draw_hollow_rect_mut(
                &mut out,
                Rect::at(x + 1, y + 1).of_size(bbox.w - 1, bbox.h - 1),
                ANNOTATION_COLOR,
            );
        }
    }
    out
}

/// Sobel gradient magnitude of the smoothed grayscale image, min-max
/// normalized to `0..=255`.
#[must_use = "returns the gradient magnitude image"]
pub fn gradient_magnitude(image: &RgbImage) -> GrayImage {
    let gray = imageproc::filter::gaussian_blur_f32(&to_gray(image), window_sigma(5));
    let gx = horizontal_sobel(&gray);
    let gy = vertical_sobel(&gray);
    let magnitude: Vec<f32> = gx
        .iter()
        .zip(gy.iter())
        .map(|(a, b)| f32::from(*a).hypot(f32::from(*b)))
        .collect();
    let (min, max) = magnitude
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    let range = max - min;
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let v = magnitude[(y * image.width() + x) as usize];
        let scaled = if range > 0.0 { (v - min) / range * 255.0 } else { 0.0 };
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let scaled = scaled.round().clamp(0.0, 255.0) as u8;
        Luma([scaled])
    })
}

/// Turbo-colored structure heatmap of `image`.
#[must_use = "returns the heatmap"]
pub fn structure_heatmap(image: &RgbImage) -> RgbImage {
    Colormap::Turbo.apply(&gradient_magnitude(image))
}

/// Concatenate two equally tall images horizontally.
#[must_use = "returns the concatenated image"]
pub fn side_by_side(left: &RgbImage, right: &RgbImage) -> RgbImage {
    let height = left.height().max(right.height());
    let mut out = RgbImage::new(left.width() + right.width(), height);
    image::imageops::replace(&mut out, left, 0, 0);
    image::imageops::replace(&mut out, right, i64::from(left.width()), 0);
    out
}

/// Render every artifact.
#[must_use]
pub fn render(
    before: &RgbImage,
    aligned: &RgbImage,
    dissimilarity: &GrayImage,
    mask: &GrayImage,
    boxes: &[BoundingBox],
) -> Artifacts {
    Artifacts {
        annotated: annotate(aligned, boxes),
        before_heatmap: structure_heatmap(before),
        heatmap: Colormap::Jet.apply(dissimilarity),
        diff_mask: Colormap::Hot.apply(mask),
        comparison: side_by_side(before, aligned),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotation_draws_two_pixel_outline() {
        let img = RgbImage::from_pixel(50, 50, Rgb([0, 0, 0]));
        let bbox = BoundingBox {
            x: 10,
            y: 10,
            w: 20,
            h: 10,
        };
        let out = annotate(&img, &[bbox]);
        assert_eq!(*out.get_pixel(10, 10), ANNOTATION_COLOR);
        assert_eq!(*out.get_pixel(11, 15), ANNOTATION_COLOR);
        assert_eq!(*out.get_pixel(30, 20), ANNOTATION_COLOR);
        assert_eq!(*out.get_pixel(20, 15), Rgb([0, 0, 0]));
        assert_eq!(*out.get_pixel(12, 15), Rgb([0, 0, 0]));
    }

    #[test]
    fn annotation_is_clipped_at_frame_edge() {
        let img = RgbImage::new(20, 20);
        let bbox = BoundingBox {
            x: 0,
            y: 0,
            w: 20,
            h: 20,
        };
        let out = annotate(&img, &[bbox]);
        assert_eq!(*out.get_pixel(0, 19), ANNOTATION_COLOR);
        assert_eq!(out.dimensions(), (20, 20));
    }

    #[test]
    fn flat_image_has_flat_structure() {
        let img = RgbImage::from_pixel(30, 20, Rgb([90, 90, 90]));
        assert!(gradient_magnitude(&img).pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn gradient_peaks_at_step() {
        let img = RgbImage::from_fn(40, 10, |x, _| if x < 20 { Rgb([0, 0, 0]) } else { Rgb([255, 255, 255]) });
        let mag = gradient_magnitude(&img);
        assert!(mag.get_pixel(19, 5).0[0] > 200);
        assert_eq!(mag.get_pixel(2, 5).0[0], 0);
    }

    #[test]
    fn side_by_side_places_both_images() {
        let left = RgbImage::from_pixel(10, 5, Rgb([1, 2, 3]));
        let right = RgbImage::from_pixel(7, 5, Rgb([4, 5, 6]));
        let out = side_by_side(&left, &right);
        assert_eq!(out.dimensions(), (17, 5));
        assert_eq!(*out.get_pixel(9, 4), Rgb([1, 2, 3]));
        assert_eq!(*out.get_pixel(10, 0), Rgb([4, 5, 6]));
    }

    #[test]
    fn render_sizes() {
        let a = RgbImage::new(12, 8);
        let gray = GrayImage::new(12, 8);
        let artifacts = render(&a, &a, &gray, &gray, &[]);
        assert_eq!(artifacts.annotated.dimensions(), (12, 8));
        assert_eq!(artifacts.before_heatmap.dimensions(), (12, 8));
        assert_eq!(artifacts.heatmap.dimensions(), (12, 8));
        assert_eq!(artifacts.diff_mask.dimensions(), (12, 8));
        assert_eq!(artifacts.comparison.dimensions(), (24, 8));
    }
}
