//! Pipeline diagnostics: timing and stage-specific metrics.
//!
//! The engine never reads the system time itself. Callers that want
//! timings pass a [`Clock`]; [`NoClock`] records zero durations, which
//! keeps runs comparable in tests.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::Dimensions;

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of monotonic timestamps.
pub trait Clock {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

/// A clock that never advances.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoClock;

impl Clock for NoClock {
    fn now(&self) -> Duration {
        Duration::ZERO
    }
}

/// Run `f` and return its output with the time it took on `clock`.
pub fn timed<T>(clock: &impl Clock, f: impl FnOnce() -> T) -> (T, Duration) {
    let start = clock.now();
    let out = f();
    (out, clock.now().saturating_sub(start))
}

/// Diagnostics collected from a single comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Decoding and resizing to the working size.
    pub normalize: StageDiagnostics,
    /// Feature alignment.
    pub align: StageDiagnostics,
    /// Per-image condition metrics.
    pub condition: StageDiagnostics,
    /// Multi-scale similarity.
    pub multiscale: StageDiagnostics,
    /// SSIM and difference fusion.
    pub fusion: StageDiagnostics,
    /// Contour extraction and zone classification.
    pub zones: StageDiagnostics,
    /// Artifact rendering.
    pub render: StageDiagnostics,
    /// Sum of the stage durations (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics (counts, sizes, etc.).
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Decode and resize metrics.
    Normalize {
        /// Size of the "before" input in bytes.
        before_bytes: usize,
        /// Size of the "after" input in bytes.
        after_bytes: usize,
        /// Decoded "before" dimensions.
        source: Dimensions,
        /// Working dimensions shared by both images.
        working: Dimensions,
    },
    /// Alignment metrics.
    Align {
        /// Whether alignment was attempted.
        enabled: bool,
        /// Whether the image was warped.
        success: bool,
        /// Ratio-test matches (0 when skipped or failed early).
        matches: usize,
        /// RANSAC inliers.
        inliers: usize,
    },
    /// Condition metric extraction.
    Condition {
        /// Crack segments before.
        before_cracks: u32,
        /// Crack segments after.
        after_cracks: u32,
        /// Corrosion change in percentage points.
        rust_delta_pct: f64,
    },
    /// Multi-scale similarity.
    MultiScale {
        /// Number of scales evaluated.
        scale_count: usize,
        /// Lowest similarity across scales.
        min_similarity: f64,
    },
    /// Difference fusion.
    Fusion {
        /// Global similarity.
        similarity: f64,
        /// Pixels over the absolute difference threshold.
        absolute_pixels: u64,
        /// Pixels over the adaptive threshold.
        adaptive_pixels: u64,
        /// Pixels with nonzero dissimilarity.
        structural_pixels: u64,
        /// Pixels set after morphological cleanup.
        mask_pixels: u64,
        /// Total pixel count.
        total_pixels: u64,
    },
    /// Zone extraction.
    Zones {
        /// External contours found.
        contour_count: usize,
        /// Contours above the noise floor.
        region_count: usize,
        /// Distinct zone labels.
        label_count: usize,
    },
    /// Artifact rendering.
    Render {
        /// Number of boxes drawn on the annotated image.
        boxes: usize,
    },
}

impl PipelineDiagnostics {
    fn stages(&self) -> [(&'static str, &StageDiagnostics); 7] {
        [
            ("Normalize", &self.normalize),
            ("Align", &self.align),
            ("Condition", &self.condition),
            ("Multi-scale", &self.multiscale),
            ("Fusion", &self.fusion),
            ("Zones", &self.zones),
            ("Render", &self.render),
        ]
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Comparison Diagnostics Report\n{}", "=".repeat(60)));
        if let StageMetrics::Normalize { working, .. } = &self.normalize.metrics {
            lines.push(format!(
                "Working size: {}x{} ({} pixels)",
                working.width,
                working.height,
                working.pixel_count(),
            ));
        }
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<16} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<16} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Normalize {
            before_bytes,
            after_bytes,
            source,
            working,
        } => format!(
            "{before_bytes}+{after_bytes} bytes, {}x{} -> {}x{}",
            source.width, source.height, working.width, working.height,
        ),
        StageMetrics::Align {
            enabled: false, ..
        } => "skipped".to_string(),
        StageMetrics::Align {
            success,
            matches,
            inliers,
            ..
        } => format!(
            "{} matches={matches} inliers={inliers}",
            if *success { "aligned" } else { "fallback" },
        ),
        StageMetrics::Condition {
            before_cracks,
            after_cracks,
            rust_delta_pct,
        } => format!("cracks {before_cracks}->{after_cracks} rust {rust_delta_pct:+.2}%"),
        StageMetrics::MultiScale {
            scale_count,
            min_similarity,
        } => format!("{scale_count} scales, min={min_similarity:.4}"),
        StageMetrics::Fusion {
            similarity,
            absolute_pixels,
            adaptive_pixels,
            structural_pixels,
            mask_pixels,
            total_pixels,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixels > 0 {
                *mask_pixels as f64 / *total_pixels as f64 * 100.0
            } else {
                0.0
            };
            format!(
                "ssim={similarity:.4} abs={absolute_pixels} adapt={adaptive_pixels} struct={structural_pixels} mask={mask_pixels} ({density:.1}%)",
            )
        }
        StageMetrics::Zones {
            contour_count,
            region_count,
            label_count,
        } => format!("{contour_count} contours, {region_count} regions in {label_count} zones"),
        StageMetrics::Render { boxes } => format!("{boxes} boxes"),
    }
}
