//! Console text summary of a comparison.
//!
//! Pure function with no I/O: it returns a `String` for the caller to
//! print.

use std::fmt::Write;

use patina_pipeline::ComparisonResult;

const RULE_WIDTH: usize = 70;

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "{}", "=".repeat(RULE_WIDTH));
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{}", "=".repeat(RULE_WIDTH));
}

/// Render `result` as the multi-section console report.
///
/// Sections: headline numbers, condition changes, one block per zone,
/// the multi-scale table, and the artifact paths.
#[must_use]
pub fn text_summary(result: &ComparisonResult) -> String {
    let a = &result.analysis;
    let p = &result.artifacts;
    let mut out = String::new();

    section(&mut out, "COMPARISON SUMMARY");
    let _ = writeln!(out, "Overall Similarity:      {:.2}%", a.similarity * 100.0);
    let _ = writeln!(out, "Overall Change:          {:.2}%", a.change_percent);
    let _ = writeln!(out, "Changed Regions:         {}", a.regions);
    let _ = writeln!(
        out,
        "Image Alignment:         {}",
        if a.alignment_success { "success" } else { "failed" },
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "Rust Change:             {:+.2}%", a.rust_delta_pct());
    let _ = writeln!(out, "  Before:                {:.2}%", a.before.corrosion_pct());
    let _ = writeln!(out, "  After:                 {:.2}%", a.after.corrosion_pct());
    let _ = writeln!(out);
    let _ = writeln!(out, "Crack Detection:");
    let _ = writeln!(out, "  Before:                {} cracks", a.before.crack_count);
    let _ = writeln!(out, "  After:                 {} cracks", a.after.crack_count);
    let _ = writeln!(out, "  New Cracks:            {}", a.crack_delta());
    let _ = writeln!(out);
    let _ = writeln!(out, "Dark Spot Change:        {:+.2}%", a.damage_delta_pct());
    let _ = writeln!(out, "Brightness Change:       {:+.2}", a.brightness_delta());
    let _ = writeln!(out, "Contrast Change:         {:+.2}", a.contrast_delta());
    let _ = writeln!(out, "Sharpness Change:        {:+.2}", a.sharpness_delta());
    let _ = writeln!(out);

    if !a.zones.is_empty() {
        section(&mut out, "ZONE ANALYSIS");
        for zone in &a.zones {
            let _ = writeln!(
                out,
                "\n{} {} ({}):",
                zone.label.to_string().to_uppercase(),
                zone.id,
                zone.part_name,
            );
            let _ = writeln!(out, "  Significance:          {}", zone.significance);
            let _ = writeln!(out, "  Severity:              {}/10", zone.severity);
            let _ = writeln!(out, "  Area Coverage:         {:.2}%", zone.area_percent);
            let _ = writeln!(out, "  Rust Change:           {:+.1}%", zone.rust_change);
            let _ = writeln!(
                out,
                "  Location:              x={}, y={}",
                zone.bbox.x, zone.bbox.y,
            );
        }
        let _ = writeln!(out);
    }

    section(&mut out, "MULTI-SCALE ANALYSIS");
    for sample in &a.multiscale {
        let label = format!("Scale {:.0}%:", sample.scale * 100.0);
        let _ = writeln!(out, "{label:<25}{:.4}", sample.similarity);
    }
    let _ = writeln!(out);

    section(&mut out, "OUTPUT FILES");
    for (name, path) in [
        ("Annotated Image:", &p.annotated_path),
        ("Change Heatmap:", &p.heatmap_path),
        ("Difference Mask:", &p.diff_mask_path),
        ("Structure Map:", &p.before_heatmap_path),
        ("Side-by-Side:", &p.comparison_path),
    ] {
        let _ = writeln!(out, "{name:<25}{}", path.display());
    }

    out
}
