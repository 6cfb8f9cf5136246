//! Spatial zones and significance classification of change regions.
//!
//! The frame is split into a 3x3 grid of equal thirds. Each change
//! region becomes its own [`Zone`] (identified by a [`ZoneId`]) and is
//! labeled with the grid cell holding its bounding-box center. Labels
//! are attributes, not keys: several zones may share one.

use std::fmt;

use image::RgbImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::contour::ChangeRegion;
use crate::corrosion::corrosion_ratio_in;
use crate::types::{BoundingBox, Dimensions};

/// Index of a zone in the result's zone list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(pub usize);

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Vertical third of the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vertical {
    /// Upper third.
    Top,
    /// Middle third.
    Middle,
    /// Lower third.
    Bottom,
}

impl Vertical {
    /// Coarse equipment part associated with this third.
    #[must_use]
    pub const fn part_name(self) -> &'static str {
        match self {
            Self::Top => "upper assembly",
            Self::Middle => "core body",
            Self::Bottom => "base / mounting area",
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Middle => "middle",
            Self::Bottom => "bottom",
        }
    }
}

/// Horizontal third of the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Horizontal {
    /// Left third.
    Left,
    /// Center third.
    Center,
    /// Right third.
    Right,
}

impl Horizontal {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
        }
    }
}

/// One of the nine grid cells, displayed as `"<vertical>-<horizontal>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ZoneLabel {
    /// Row of the cell.
    pub vertical: Vertical,
    /// Column of the cell.
    pub horizontal: Horizontal,
}

impl ZoneLabel {
    /// Grid cell containing the point `(x, y)` of a frame of `dimensions`.
    #[must_use]
    pub fn locate(x: f64, y: f64, dimensions: Dimensions) -> Self {
        let (w, h) = (f64::from(dimensions.width), f64::from(dimensions.height));
        let horizontal = if x < w / 3.0 {
            Horizontal::Left
        } else if x < 2.0 * w / 3.0 {
            Horizontal::Center
        } else {
            Horizontal::Right
        };
        let vertical = if y < h / 3.0 {
            Vertical::Top
        } else if y < 2.0 * h / 3.0 {
            Vertical::Middle
        } else {
            Vertical::Bottom
        };
        Self {
            vertical,
            horizontal,
        }
    }

    /// Part name derived from the vertical third.
    #[must_use]
    pub const fn part_name(self) -> &'static str {
        self.vertical.part_name()
    }
}

impl fmt::Display for ZoneLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.vertical.as_str(), self.horizontal.as_str())
    }
}

impl Serialize for ZoneLabel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ZoneLabel {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let (v, h) = s
            .split_once('-')
            .ok_or_else(|| serde::de::Error::custom(format!("invalid zone label {s:?}")))?;
        let vertical = match v {
            "top" => Vertical::Top,
            "middle" => Vertical::Middle,
            "bottom" => Vertical::Bottom,
            _ => return Err(serde::de::Error::custom(format!("invalid vertical third {v:?}"))),
        };
        let horizontal = match h {
            "left" => Horizontal::Left,
            "center" => Horizontal::Center,
            "right" => Horizontal::Right,
            _ => return Err(serde::de::Error::custom(format!("invalid horizontal third {h:?}"))),
        };
        Ok(Self {
            vertical,
            horizontal,
        })
    }
}

/// Importance of a change region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Significance {
    /// Small, isolated change.
    Minor,
    /// Noticeable change worth a follow-up.
    Moderate,
    /// Large change or marked corrosion growth.
    Critical,
}

impl fmt::Display for Significance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Minor => "MINOR",
            Self::Moderate => "MODERATE",
            Self::Critical => "CRITICAL",
        })
    }
}

/// Severity on a 0-10 scale: ten times the area percentage, rounded to
/// two decimals and saturating at 10.
#[must_use]
pub fn severity(area_percent: f64) -> f64 {
    ((area_percent * 10.0 * 100.0).round() / 100.0).min(10.0)
}

/// Classify a region. First match wins:
///
/// - `CRITICAL`: `area_percent > 5` and `severity > 7`, or
///   `rust_delta_pct > 10`
/// - `MODERATE`: `area_percent > 2`, `severity > 4`, or
///   `rust_delta_pct > 5`
/// - `MINOR` otherwise
///
/// `rust_delta_pct` is the global corrosion change in percentage points.
#[must_use]
pub fn classify(area_percent: f64, severity: f64, rust_delta_pct: f64) -> Significance {
    if (area_percent > 5.0 && severity > 7.0) || rust_delta_pct > 10.0 {
        Significance::Critical
    } else if area_percent > 2.0 || severity > 4.0 || rust_delta_pct > 5.0 {
        Significance::Moderate
    } else {
        Significance::Minor
    }
}

/// A classified change region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    /// Position in the zone list.
    pub id: ZoneId,
    /// Grid cell of the bounding-box center (not unique).
    pub label: ZoneLabel,
    /// Bounding box in working-image pixels.
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    /// Enclosed contour area in pixels.
    pub area_pixels: f64,
    /// Area as a percentage of the frame.
    pub area_percent: f64,
    /// 0-10 severity.
    pub severity: f64,
    /// Corrosion percentage inside the box, before.
    pub rust_before: f64,
    /// Corrosion percentage inside the box, after.
    pub rust_after: f64,
    /// `rust_after - rust_before`.
    pub rust_change: f64,
    /// Part name of the label's vertical third.
    pub part_name: String,
    /// Classification.
    pub significance: Significance,
}

/// Turn change regions into zones, in region order.
///
/// Local corrosion is measured on the bounding-box crops of `before`
/// and `after`; regions are processed in parallel.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn build_zones(
    regions: &[ChangeRegion],
    before: &RgbImage,
    after: &RgbImage,
    rust_delta_pct: f64,
) -> Vec<Zone> {
    let dimensions = Dimensions::of(before);
    let total = dimensions.pixel_count() as f64;
    regions
        .par_iter()
        .enumerate()
        .map(|(i, region)| {
            let (cx, cy) = region.bbox.center();
            let label = ZoneLabel::locate(cx, cy, dimensions);
            let area_percent = region.area / total * 100.0;
            let severity = severity(area_percent);
            let rust_before = corrosion_ratio_in(before, region.bbox) * 100.0;
            let rust_after = corrosion_ratio_in(after, region.bbox) * 100.0;
            Zone {
                id: ZoneId(i),
                label,
                bbox: region.bbox,
                area_pixels: region.area,
                area_percent,
                severity,
                rust_before,
                rust_after,
                rust_change: rust_after - rust_before,
                part_name: label.part_name().to_string(),
                significance: classify(area_percent, severity, rust_delta_pct),
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::Rgb;

    const FRAME: Dimensions = Dimensions {
        width: 300,
        height: 300,
    };

    #[test]
    fn labels_follow_thirds() {
        assert_eq!(ZoneLabel::locate(50.0, 50.0, FRAME).to_string(), "top-left");
        assert_eq!(ZoneLabel::locate(150.0, 150.0, FRAME).to_string(), "middle-center");
        assert_eq!(ZoneLabel::locate(299.0, 250.0, FRAME).to_string(), "bottom-right");
        // Boundaries belong to the next third.
        assert_eq!(ZoneLabel::locate(100.0, 0.0, FRAME).to_string(), "top-center");
        assert_eq!(ZoneLabel::locate(0.0, 200.0, FRAME).to_string(), "bottom-left");
    }

    #[test]
    fn part_names_follow_vertical_third() {
        assert_eq!(ZoneLabel::locate(10.0, 10.0, FRAME).part_name(), "upper assembly");
        assert_eq!(ZoneLabel::locate(290.0, 150.0, FRAME).part_name(), "core body");
        assert_eq!(ZoneLabel::locate(150.0, 290.0, FRAME).part_name(), "base / mounting area");
    }

    #[test]
    fn severity_is_monotonic_and_saturates() {
        assert!((severity(0.0)).abs() < f64::EPSILON);
        assert!((severity(0.123_45) - 1.23).abs() < 1e-12);
        assert!((severity(10.0) - 10.0).abs() < f64::EPSILON);
        assert!((severity(55.0) - 10.0).abs() < f64::EPSILON);
        let mut last = 0.0;
        for i in 0..200 {
            let s = severity(f64::from(i) * 0.07);
            assert!(s >= last);
            last = s;
        }
    }

    #[test]
    fn classification_priority() {
        assert_eq!(classify(6.0, 8.0, 0.0), Significance::Critical);
        assert_eq!(classify(3.0, 2.0, 0.0), Significance::Moderate);
        assert_eq!(classify(1.0, 1.0, 1.0), Significance::Minor);
        assert_eq!(classify(0.1, 0.1, 10.5), Significance::Critical);
        assert_eq!(classify(0.1, 0.1, 6.0), Significance::Moderate);
        assert_eq!(classify(6.0, 5.0, 0.0), Significance::Moderate);
        assert_eq!(classify(0.5, 4.5, -20.0), Significance::Moderate);
    }

    #[test]
    fn significance_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Significance::Critical).unwrap(), "\"CRITICAL\"");
        assert_eq!(Significance::Minor.to_string(), "MINOR");
    }

    #[test]
    fn label_serde_uses_display_form() {
        let label = ZoneLabel::locate(150.0, 10.0, FRAME);
        let json = serde_json::to_string(&label).unwrap();
        assert_eq!(json, "\"top-center\"");
        let back: ZoneLabel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, label);
        assert!(serde_json::from_str::<ZoneLabel>("\"left-top\"").is_err());
    }

    #[test]
    fn zones_keep_every_region_with_shared_labels() {
        let before = RgbImage::from_pixel(300, 300, Rgb([200, 200, 200]));
        let mut after = before.clone();
        for y in 10..40 {
            for x in 10..40 {
                after.put_pixel(x, y, Rgb([180, 90, 30]));
            }
        }
        let regions = vec![
            ChangeRegion {
                bbox: BoundingBox { x: 10, y: 10, w: 30, h: 30 },
                area: 841.0,
            },
            ChangeRegion {
                bbox: BoundingBox { x: 60, y: 50, w: 20, h: 30 },
                area: 551.0,
            },
        ];
        let zones = build_zones(&regions, &before, &after, 0.0);
        assert_eq!(zones.len(), 2);
        assert_eq!(zones[0].id, ZoneId(0));
        assert_eq!(zones[1].id, ZoneId(1));
        assert_eq!(zones[0].label, zones[1].label);
        assert!((zones[0].rust_after - 100.0).abs() < 1e-9);
        assert!(zones[0].rust_before.abs() < 1e-9);
        assert!(zones[0].rust_change > 99.0);
        assert!(zones.iter().all(|z| z.area_percent < 100.0));
        assert!(zones.iter().all(|z| z.bbox.w > 0 && z.bbox.h > 0 && z.bbox.fits_within(FRAME)));
    }
}
