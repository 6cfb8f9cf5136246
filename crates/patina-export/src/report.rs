//! Report-builder JSON: image metrics, zones, and the object label diff.
//!
//! This is the compact record handed to a report generator. It carries
//! one zone entry per detected region (not per label), so two regions
//! in the same third of the frame are both reported.

use std::collections::BTreeSet;

use patina_pipeline::objects::compare_labels;
use patina_pipeline::{Analysis, BoundingBox, ZoneLabel};
use serde::{Deserialize, Serialize};

/// Headline numbers of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetrics {
    /// Global similarity in `[0, 1]`.
    pub similarity: f64,
    /// Global change percentage.
    pub change_percent: f64,
    /// Number of change regions.
    pub regions: usize,
    /// Corrosion change in percentage points.
    pub rust_delta_pct: f64,
    /// Mean brightness of the "before" image.
    pub before_brightness: f64,
    /// Mean brightness of the "after" image.
    pub after_brightness: f64,
}

/// One zone of the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportZone {
    /// Grid label, e.g. `"top-left"`.
    pub zone: ZoneLabel,
    /// 0-10 severity.
    pub severity: f64,
    /// Part name.
    pub part: String,
    /// Bounding box.
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
}

/// Object labels of both images and their difference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSummary {
    /// Labels found in the "before" image, sorted.
    pub before: Vec<String>,
    /// Labels found in the "after" image, sorted.
    pub after: Vec<String>,
    /// Labels only in the "after" image.
    pub added: Vec<String>,
    /// Labels only in the "before" image.
    pub removed: Vec<String>,
}

impl ObjectSummary {
    /// Summarize two label sets.
    #[must_use]
    pub fn from_labels(before: &BTreeSet<String>, after: &BTreeSet<String>) -> Self {
        let diff = compare_labels(before, after);
        Self {
            before: before.iter().cloned().collect(),
            after: after.iter().cloned().collect(),
            added: diff.added,
            removed: diff.removed,
        }
    }
}

/// The report-builder record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Headline numbers.
    pub image_metrics: ImageMetrics,
    /// One entry per change region, in region order.
    pub zones: Vec<ReportZone>,
    /// Object labels; empty when no detector was run.
    pub objects: ObjectSummary,
}

/// Build the report for `analysis`.
#[must_use]
pub fn build_report(analysis: &Analysis, objects: ObjectSummary) -> Report {
    Report {
        image_metrics: ImageMetrics {
            similarity: analysis.similarity,
            change_percent: analysis.change_percent,
            regions: analysis.regions,
            rust_delta_pct: analysis.rust_delta_pct(),
            before_brightness: analysis.before.brightness,
            after_brightness: analysis.after.brightness,
        },
        zones: analysis
            .zones
            .iter()
            .map(|z| ReportZone {
                zone: z.label,
                severity: z.severity,
                part: z.part_name.clone(),
                bbox: z.bbox,
            })
            .collect(),
        objects,
    }
}
