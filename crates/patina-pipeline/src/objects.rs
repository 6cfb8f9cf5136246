//! Object label sets of the two images.
//!
//! Detection itself is an injected capability: the engine never loads
//! a model. It only filters, normalizes, and diffs the labels a
//! [`LabelDetector`] reports.

use std::collections::BTreeSet;

use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Detections below this confidence are ignored.
pub const MIN_CONFIDENCE: f32 = 0.6;

/// One detected object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Detector class name.
    pub label: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
}

/// Something that can find labeled objects in an image.
pub trait LabelDetector {
    /// Detect objects in `image`.
    fn detect(&self, image: &RgbImage) -> Vec<Detection>;
}

/// Map generic detector classes onto the equipment vocabulary.
#[must_use]
pub fn normalize_label(label: &str) -> &str {
    match label {
        "car" | "truck" | "bus" | "bench" | "chair" => "machine_part",
        other => other,
    }
}

/// Confident, normalized, deduplicated labels of `detections`.
#[must_use]
pub fn confident_labels(detections: &[Detection]) -> BTreeSet<String> {
    detections
        .iter()
        .filter(|d| d.confidence >= MIN_CONFIDENCE)
        .map(|d| normalize_label(&d.label).to_string())
        .collect()
}

/// Run `detector` on `image` and return its label set.
pub fn detect_labels(detector: &impl LabelDetector, image: &RgbImage) -> BTreeSet<String> {
    confident_labels(&detector.detect(image))
}

/// Labels that appeared and disappeared between two images.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelDiff {
    /// Present after but not before, sorted.
    pub added: Vec<String>,
    /// Present before but not after, sorted.
    pub removed: Vec<String>,
}

/// Set difference of two label sets.
#[must_use]
pub fn compare_labels(before: &BTreeSet<String>, after: &BTreeSet<String>) -> LabelDiff {
    LabelDiff {
        added: after.difference(before).cloned().collect(),
        removed: before.difference(after).cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<Detection>);

    impl LabelDetector for Fixed {
        fn detect(&self, _image: &RgbImage) -> Vec<Detection> {
            self.0.clone()
        }
    }

    fn det(label: &str, confidence: f32) -> Detection {
        Detection {
            label: label.to_string(),
            confidence,
        }
    }

    fn set(labels: &[&str]) -> BTreeSet<String> {
        labels.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn vehicles_and_furniture_become_machine_parts() {
        assert_eq!(normalize_label("truck"), "machine_part");
        assert_eq!(normalize_label("chair"), "machine_part");
        assert_eq!(normalize_label("person"), "person");
    }

    #[test]
    fn low_confidence_detections_are_dropped() {
        let detector = Fixed(vec![det("bus", 0.9), det("car", 0.7), det("dog", 0.59), det("pipe", 0.6)]);
        let labels = detect_labels(&detector, &RgbImage::new(1, 1));
        assert_eq!(labels, set(&["machine_part", "pipe"]));
    }

    #[test]
    fn diff_is_sorted_set_difference() {
        let diff = compare_labels(&set(&["valve", "gauge", "pipe"]), &set(&["pipe", "wire", "bolt"]));
        assert_eq!(diff.added, ["bolt", "wire"]);
        assert_eq!(diff.removed, ["gauge", "valve"]);
    }

    #[test]
    fn identical_sets_have_empty_diff() {
        let labels = set(&["pipe"]);
        assert_eq!(compare_labels(&labels, &labels), LabelDiff::default());
    }
}
