//! Integration test: run a synthetic before/after pair through the
//! engine and check every export format.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use image::Rgb;
use imageproc::drawing::draw_filled_circle_mut;
use patina_export::{ObjectSummary, build_report, text_summary, to_json_value};
use patina_pipeline::{ArtifactPaths, CompareConfig, ComparisonResult, RgbImage};

fn plate() -> RgbImage {
    RgbImage::from_fn(300, 240, |x, y| {
        let v = u8::try_from(160 + (x / 15 + y / 20) % 20).unwrap();
        Rgb([v, v, v])
    })
}

fn result() -> ComparisonResult {
    let before = plate();
    let mut after = before.clone();
    draw_filled_circle_mut(&mut after, (60, 50), 28, Rgb([175, 85, 25]));
    draw_filled_circle_mut(&mut after, (230, 190), 22, Rgb([20, 20, 20]));
    let config = CompareConfig {
        enable_alignment: false,
        ..CompareConfig::default()
    };
    let comparison = patina_pipeline::compare_images(before, after, &config).expect("comparison should succeed");
    let (analysis, _artifacts) = comparison.into_parts();
    ComparisonResult {
        analysis,
        artifacts: ArtifactPaths {
            annotated_path: "site/pump.jpg".into(),
            heatmap_path: "site/pump_heatmap.jpg".into(),
            before_heatmap_path: "site/pump_before_heatmap.jpg".into(),
            diff_mask_path: "site/pump_diff_mask.jpg".into(),
            comparison_path: "site/pump_comparison.jpg".into(),
        },
    }
}

#[test]
fn ui_record_is_consistent_with_analysis() {
    let result = result();
    let json = to_json_value(&result).unwrap();
    let a = &result.analysis;

    assert_eq!(json["regions"], a.regions);
    assert_eq!(json["zone_details"].as_array().unwrap().len(), a.zones.len());
    assert_eq!(json["zones"].as_array().unwrap().len(), a.zone_labels().len());
    assert_eq!(json["multiscale_similarity"].as_array().unwrap().len(), 3);
    assert_eq!(json["alignment_success"], false);
    assert_eq!(json["diff_mask_path"], "site/pump_diff_mask.jpg");
    let delta = json["rust_delta_pct"].as_f64().unwrap();
    assert!(delta > 0.0);
    let before = json["before_rust_pct"].as_f64().unwrap();
    let after = json["after_rust_pct"].as_f64().unwrap();
    assert!((after - before - delta).abs() < 1e-9);
}

#[test]
fn report_has_one_zone_per_region() {
    let result = result();
    let report = build_report(&result.analysis, ObjectSummary::default());
    assert_eq!(report.zones.len(), result.analysis.regions);
    assert!(report.zones.iter().any(|z| z.zone.to_string() == "top-left"));
    let json = serde_json::to_value(&report).unwrap();
    assert!(json["zones"][0]["box"]["w"].as_u64().unwrap() > 0);
    assert_eq!(json["objects"]["added"], serde_json::json!([]));
}

#[test]
fn text_summary_covers_every_section() {
    let summary = text_summary(&result());
    for heading in ["COMPARISON SUMMARY", "ZONE ANALYSIS", "MULTI-SCALE ANALYSIS", "OUTPUT FILES"] {
        assert!(summary.contains(heading), "missing {heading}");
    }
    assert!(summary.contains("TOP-LEFT"));
    assert!(summary.contains("Scale 100%:"));
    assert!(summary.contains("site/pump_heatmap.jpg"));
    assert!(summary.contains("Image Alignment:         failed"));
}
