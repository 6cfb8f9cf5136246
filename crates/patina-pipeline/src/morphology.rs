//! Binary morphology on 0/255 masks.
//!
//! Square structuring elements delegate to
//! [`imageproc::morphology`] (Chebyshev-distance erode/dilate). The
//! elliptical element used to clean the fused difference mask has no
//! `imageproc` equivalent and is applied here directly. In both cases
//! pixels outside the image never influence the result.

use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;

/// A binary structuring element, stored as offsets from its anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuringElement {
    offsets: Vec<(i32, i32)>,
}

impl StructuringElement {
    /// Elliptical element inscribed in a `size x size` square.
    ///
    /// For `size = 5` this is the familiar disk with the four corner
    /// pairs removed:
    ///
    /// ```text
    /// . . # . .
    /// # # # # #
    /// # # # # #
    /// # # # # #
    /// . . # . .
    /// ```
    #[must_use]
    pub fn ellipse(size: u32) -> Self {
        let size = i32::try_from(size.max(1)).unwrap_or(i32::MAX);
        let r = size / 2;
        let mut offsets = Vec::new();
        let inv_r2 = if r > 0 { 1.0 / f64::from(r * r) } else { 0.0 };
        for dy in -r..=r {
            let t = f64::from(r * r - dy * dy).max(0.0);
            // Half-width of the row, measured against the column radius.
            #[allow(clippy::cast_possible_truncation)]
            let half = if inv_r2 > 0.0 {
                (f64::from(r) * (t * inv_r2).sqrt()).round() as i32
            } else {
                0
            };
            for dx in -half..=half {
                offsets.push((dx, dy));
            }
        }
        Self { offsets }
    }

    /// Number of cells in the element.
    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Whether the element is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Whether `(dx, dy)` is part of the element.
    #[must_use]
    pub fn contains(&self, dx: i32, dy: i32) -> bool {
        self.offsets.contains(&(dx, dy))
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn is_set(mask: &GrayImage, x: i64, y: i64) -> Option<bool> {
    let (w, h) = mask.dimensions();
    if x < 0 || y < 0 || x >= i64::from(w) || y >= i64::from(h) {
        return None;
    }
    Some(mask.get_pixel(x as u32, y as u32).0[0] > 0)
}

/// Dilate: a pixel is set if any in-bounds neighbor under the element is set.
#[must_use = "returns the dilated mask"]
pub fn dilate(mask: &GrayImage, element: &StructuringElement) -> GrayImage {
    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        let hit = element.offsets.iter().any(|&(dx, dy)| {
            is_set(mask, i64::from(x) + i64::from(dx), i64::from(y) + i64::from(dy))
                .unwrap_or(false)
        });
        Luma([if hit { 255 } else { 0 }])
    })
}

/// Erode: a pixel stays set only if every in-bounds neighbor under the
/// element is set.
#[must_use = "returns the eroded mask"]
pub fn erode(mask: &GrayImage, element: &StructuringElement) -> GrayImage {
    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        let keep = element.offsets.iter().all(|&(dx, dy)| {
            is_set(mask, i64::from(x) + i64::from(dx), i64::from(y) + i64::from(dy))
                .unwrap_or(true)
        });
        Luma([if keep { 255 } else { 0 }])
    })
}

/// Closing (dilate then erode): fills gaps narrower than the element.
#[must_use = "returns the closed mask"]
pub fn close(mask: &GrayImage, element: &StructuringElement) -> GrayImage {
    erode(&dilate(mask, element), element)
}

/// Opening (erode then dilate): removes specks smaller than the element.
#[must_use = "returns the opened mask"]
pub fn open(mask: &GrayImage, element: &StructuringElement) -> GrayImage {
    dilate(&erode(mask, element), element)
}

/// Opening with a 3x3 square element applied `iterations` times in
/// each direction.
///
/// `iterations` erosions by a 3x3 square equal one erosion by a
/// `(2k+1)`-square, which is what Chebyshev distance `k` gives.
#[must_use = "returns the opened mask"]
pub fn open_square(mask: &GrayImage, iterations: u8) -> GrayImage {
    if iterations == 0 {
        return mask.clone();
    }
    imageproc::morphology::open(mask, Norm::LInf, iterations)
}

/// Count the set (non-zero) pixels of a mask.
#[must_use]
pub fn count_set(mask: &GrayImage) -> u64 {
    mask.pixels().map(|p| u64::from(p.0[0] > 0)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_mask(size: u32, x0: u32, y0: u32, side: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            let inside = (x0..x0 + side).contains(&x) && (y0..y0 + side).contains(&y);
            Luma([if inside { 255 } else { 0 }])
        })
    }

    #[test]
    fn ellipse_5_matches_reference_shape() {
        let e = StructuringElement::ellipse(5);
        assert_eq!(e.len(), 17);
        assert!(e.contains(0, -2));
        assert!(!e.contains(-1, -2));
        assert!(e.contains(-2, -1));
        assert!(e.contains(2, 1));
        assert!(e.contains(0, 2));
        assert!(!e.contains(2, 2));
    }

    #[test]
    fn ellipse_1_is_single_cell() {
        let e = StructuringElement::ellipse(1);
        assert_eq!(e.len(), 1);
        assert!(e.contains(0, 0));
    }

    #[test]
    fn open_removes_small_speck() {
        let mut mask = GrayImage::new(20, 20);
        mask.put_pixel(10, 10, Luma([255]));
        mask.put_pixel(11, 10, Luma([255]));
        let opened = open(&mask, &StructuringElement::ellipse(5));
        assert_eq!(count_set(&opened), 0);
    }

    #[test]
    fn open_keeps_large_block() {
        let mask = square_mask(30, 5, 5, 15);
        let opened = open(&mask, &StructuringElement::ellipse(5));
        // Only the four corners are rounded off.
        assert_eq!(opened.get_pixel(12, 12).0[0], 255);
        assert_eq!(opened.get_pixel(5, 12).0[0], 255);
        assert_eq!(opened.get_pixel(5, 5).0[0], 0);
        assert!(count_set(&opened) >= count_set(&mask) - 16);
    }

    #[test]
    fn close_fills_one_pixel_gap() {
        let mut mask = square_mask(30, 5, 5, 20);
        for y in 5..25 {
            mask.put_pixel(15, y, Luma([0]));
        }
        let closed = close(&mask, &StructuringElement::ellipse(5));
        assert_eq!(closed.get_pixel(15, 15).0[0], 255);
    }

    #[test]
    fn erosion_ignores_image_border() {
        let mask = GrayImage::from_pixel(6, 6, Luma([255]));
        let eroded = erode(&mask, &StructuringElement::ellipse(5));
        assert_eq!(count_set(&eroded), 36);
    }

    #[test]
    fn open_square_removes_thin_line() {
        let mut mask = square_mask(30, 5, 5, 12);
        for x in 0..30 {
            mask.put_pixel(x, 25, Luma([255]));
        }
        let opened = open_square(&mask, 2);
        assert_eq!(opened.get_pixel(20, 25).0[0], 0);
        assert_eq!(opened.get_pixel(10, 10).0[0], 255);
    }

    #[test]
    fn open_square_zero_iterations_is_identity() {
        let mask = square_mask(10, 2, 2, 1);
        assert_eq!(open_square(&mask, 0), mask);
    }
}
