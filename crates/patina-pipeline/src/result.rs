//! The structured outcome of a comparison.
//!
//! [`Analysis`] holds every numeric result. [`ComparisonResult`] pairs
//! it with the paths of the written artifacts and serializes to the
//! flat, UI-compatible record with stable field names.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::metrics::ConditionMetrics;
use crate::types::{BoundingBox, Dimensions, ScaleSample};
use crate::zone::{Zone, ZoneLabel};

/// Numeric results of one comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    /// Global SSIM of the equalized grayscale pair, in `[0, 1]`.
    pub similarity: f64,
    /// `(1 - similarity) * 100`.
    pub change_percent: f64,
    /// Number of change regions above the noise floor.
    pub regions: usize,
    /// Condition of the "before" image.
    pub before: ConditionMetrics,
    /// Condition of the aligned "after" image.
    pub after: ConditionMetrics,
    /// One sample per requested scale, in request order.
    pub multiscale: Vec<ScaleSample>,
    /// Every change region, in contour order.
    pub zones: Vec<Zone>,
    /// Whether the "after" image was warped onto the "before" frame.
    pub alignment_success: bool,
    /// Size of the working images.
    pub dimensions: Dimensions,
}

impl Analysis {
    /// Corrosion change in percentage points (signed).
    #[must_use]
    pub fn rust_delta_pct(&self) -> f64 {
        self.after.corrosion_pct() - self.before.corrosion_pct()
    }

    /// `after - before` brightness.
    #[must_use]
    pub fn brightness_delta(&self) -> f64 {
        self.after.brightness - self.before.brightness
    }

    /// `after - before` contrast.
    #[must_use]
    pub fn contrast_delta(&self) -> f64 {
        self.after.contrast - self.before.contrast
    }

    /// `after - before` sharpness.
    #[must_use]
    pub fn sharpness_delta(&self) -> f64 {
        self.after.sharpness - self.before.sharpness
    }

    /// `after - before` crack count.
    #[must_use]
    pub fn crack_delta(&self) -> i64 {
        i64::from(self.after.crack_count) - i64::from(self.before.crack_count)
    }

    /// Dark-spot change in percentage points (signed).
    #[must_use]
    pub fn damage_delta_pct(&self) -> f64 {
        self.after.damage_pct() - self.before.damage_pct()
    }

    /// Distinct zone labels, sorted.
    #[must_use]
    pub fn zone_labels(&self) -> Vec<ZoneLabel> {
        let mut labels: Vec<ZoneLabel> = self.zones.iter().map(|z| z.label).collect();
        labels.sort_unstable();
        labels.dedup();
        labels
    }

    /// Zones carrying `label`, in contour order.
    pub fn zones_labeled(&self, label: ZoneLabel) -> impl Iterator<Item = &Zone> {
        self.zones.iter().filter(move |z| z.label == label)
    }
}

/// Where the artifacts of a comparison were written.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArtifactPaths {
    /// Annotated "after" image (the output path itself).
    pub annotated_path: PathBuf,
    /// Dissimilarity heatmap.
    pub heatmap_path: PathBuf,
    /// Structure heatmap of the "before" image.
    pub before_heatmap_path: PathBuf,
    /// Fused change mask.
    pub diff_mask_path: PathBuf,
    /// Side-by-side image.
    pub comparison_path: PathBuf,
}

/// An analysis together with its written artifacts.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonResult {
    /// Numeric results.
    pub analysis: Analysis,
    /// Artifact locations.
    pub artifacts: ArtifactPaths,
}

/// Flat record with the stable field names consumed by front ends.
#[derive(Serialize)]
struct Record<'a> {
    similarity: f64,
    change_percent: f64,
    regions: usize,
    before_brightness: f64,
    after_brightness: f64,
    before_rust_pct: f64,
    after_rust_pct: f64,
    rust_delta_pct: f64,
    zones: Vec<ZoneLabel>,
    zone_severity: BTreeMap<ZoneLabel, f64>,
    zone_parts: BTreeMap<ZoneLabel, &'a str>,
    zone_boxes: BTreeMap<ZoneLabel, BoundingBox>,
    alignment_success: bool,
    multiscale_similarity: &'a [ScaleSample],
    contrast_delta: f64,
    sharpness_delta: f64,
    crack_delta: i64,
    heatmap_path: &'a PathBuf,
    before_heatmap_path: &'a PathBuf,
    diff_mask_path: &'a PathBuf,
    comparison_path: &'a PathBuf,
    zone_details: &'a [Zone],
    annotated_path: &'a PathBuf,
    before_cracks: u32,
    after_cracks: u32,
    brightness_delta: f64,
    before_damage_pct: f64,
    after_damage_pct: f64,
    damage_delta_pct: f64,
}

impl<'a> From<&'a ComparisonResult> for Record<'a> {
    fn from(result: &'a ComparisonResult) -> Self {
        let a = &result.analysis;
        let p = &result.artifacts;
        // Later zones overwrite earlier ones sharing a label.
        let mut zone_severity = BTreeMap::new();
        let mut zone_parts = BTreeMap::new();
        let mut zone_boxes = BTreeMap::new();
        for zone in &a.zones {
            zone_severity.insert(zone.label, zone.severity);
            zone_parts.insert(zone.label, zone.part_name.as_str());
            zone_boxes.insert(zone.label, zone.bbox);
        }
        Self {
            similarity: a.similarity,
            change_percent: a.change_percent,
            regions: a.regions,
            before_brightness: a.before.brightness,
            after_brightness: a.after.brightness,
            before_rust_pct: a.before.corrosion_pct(),
            after_rust_pct: a.after.corrosion_pct(),
            rust_delta_pct: a.rust_delta_pct(),
            zones: a.zone_labels(),
            zone_severity,
            zone_parts,
            zone_boxes,
            alignment_success: a.alignment_success,
            multiscale_similarity: &a.multiscale,
            contrast_delta: a.contrast_delta(),
            sharpness_delta: a.sharpness_delta(),
            crack_delta: a.crack_delta(),
            heatmap_path: &p.heatmap_path,
            before_heatmap_path: &p.before_heatmap_path,
            diff_mask_path: &p.diff_mask_path,
            comparison_path: &p.comparison_path,
            zone_details: &a.zones,
            annotated_path: &p.annotated_path,
            before_cracks: a.before.crack_count,
            after_cracks: a.after.crack_count,
            brightness_delta: a.brightness_delta(),
            before_damage_pct: a.before.damage_pct(),
            after_damage_pct: a.after.damage_pct(),
            damage_delta_pct: a.damage_delta_pct(),
        }
    }
}

impl Serialize for ComparisonResult {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Record::from(self).serialize(serializer)
    }
}
