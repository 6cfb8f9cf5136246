//! Change regions: external contours of the fused change mask.
//!
//! Contours come from Suzuki-Abe border following
//! (`imageproc::contours::find_contours`). Only outermost borders are
//! kept, so a region with holes is still a single region. The mask is
//! traced inside a one-pixel zero frame, since the tracer only starts an
//! outer border after a background pixel and would otherwise miss
//! regions touching the left edge. Region area
//! is the polygon area enclosed by the traced border pixels, and
//! regions below the noise floor are dropped.

use image::GrayImage;
use imageproc::contours::{BorderType, Contour, find_contours};
use imageproc::point::Point;

use crate::types::BoundingBox;

/// One connected change region surviving the noise filter.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRegion {
    /// Axis-aligned box around the border pixels.
    pub bbox: BoundingBox,
    /// Enclosed polygon area in pixels.
    pub area: f64,
}

/// Outermost borders of the set regions of `mask`, in tracing order.
///
/// Points are in `mask` coordinates.
#[must_use]
pub fn external_contours(mask: &GrayImage) -> Vec<Contour<u32>> {
    let (width, height) = mask.dimensions();
    let mut framed = GrayImage::new(width + 2, height + 2);
    image::imageops::replace(&mut framed, mask, 1, 1);
    find_contours::<u32>(&framed)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|mut c| {
            for p in &mut c.points {
                p.x = p.x.saturating_sub(1).min(width.saturating_sub(1));
                p.y = p.y.saturating_sub(1).min(height.saturating_sub(1));
            }
            c
        })
        .collect()
}

/// Shoelace area of the closed polygon through `points`.
#[must_use]
pub fn polygon_area(points: &[Point<u32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: f64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| f64::from(a.x) * f64::from(b.y) - f64::from(b.x) * f64::from(a.y))
        .sum();
    twice.abs() / 2.0
}

/// Regions of `mask` whose area is at least `noise_floor`, in tracing
/// order.
#[must_use]
pub fn extract_regions(mask: &GrayImage, noise_floor: f64) -> Vec<ChangeRegion> {
    regions_of(&external_contours(mask), noise_floor)
}

/// Regions of already traced `contours` whose area is at least
/// `noise_floor`.
#[must_use]
pub fn regions_of(contours: &[Contour<u32>], noise_floor: f64) -> Vec<ChangeRegion> {
    contours
        .iter()
        .filter_map(|c| {
            let area = polygon_area(&c.points);
            if area < noise_floor {
                return None;
            }
            let bbox = BoundingBox::enclosing(&c.points)?;
            Some(ChangeRegion { bbox, area })
        })
        .collect()
}
