//! Batch summary over many before/after pairs.

use std::fmt::{self, Write};
use std::path::PathBuf;

use patina_pipeline::Analysis;
use serde::{Deserialize, Serialize};

use crate::ExportError;

/// Coarse change level of one pair, from its global change percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeLevel {
    /// Change above 20 %.
    Critical,
    /// Change above 10 %.
    Moderate,
    /// Everything else.
    Minimal,
}

impl ChangeLevel {
    /// Level for a change percentage.
    #[must_use]
    pub fn of(change_percent: f64) -> Self {
        if change_percent > 20.0 {
            Self::Critical
        } else if change_percent > 10.0 {
            Self::Moderate
        } else {
            Self::Minimal
        }
    }
}

impl fmt::Display for ChangeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Critical => "CRITICAL",
            Self::Moderate => "MODERATE",
            Self::Minimal => "MINIMAL",
        })
    }
}

/// Headline numbers of one completed pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairMetrics {
    /// Global similarity.
    pub similarity: f64,
    /// Global change percentage.
    pub change_percent: f64,
    /// Corrosion change in percentage points.
    pub rust_delta_pct: f64,
    /// Crack count change.
    pub crack_delta: i64,
    /// Number of change regions.
    pub regions: usize,
}

impl From<&Analysis> for PairMetrics {
    fn from(a: &Analysis) -> Self {
        Self {
            similarity: a.similarity,
            change_percent: a.change_percent,
            rust_delta_pct: a.rust_delta_pct(),
            crack_delta: a.crack_delta(),
            regions: a.regions,
        }
    }
}

/// Outcome of one pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PairStatus {
    /// The comparison ran.
    Completed {
        /// Change level.
        level: ChangeLevel,
        /// Headline numbers.
        metrics: PairMetrics,
    },
    /// The comparison failed; the batch continued.
    Failed {
        /// Error message.
        error: String,
    },
}

/// One processed pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairRecord {
    /// 1-based position in the batch.
    pub pair_id: usize,
    /// File stem shared by both images.
    pub pair_name: String,
    /// "Before" image path.
    pub before: PathBuf,
    /// "After" image path.
    pub after: PathBuf,
    /// Directory holding this pair's artifacts.
    pub output_dir: PathBuf,
    /// What happened.
    #[serde(flatten)]
    pub status: PairStatus,
}

impl PairRecord {
    /// Record a completed comparison.
    #[must_use]
    pub fn completed(
        pair_id: usize,
        pair_name: String,
        paths: (PathBuf, PathBuf, PathBuf),
        analysis: &Analysis,
    ) -> Self {
        let metrics = PairMetrics::from(analysis);
        let (before, after, output_dir) = paths;
        Self {
            pair_id,
            pair_name,
            before,
            after,
            output_dir,
            status: PairStatus::Completed {
                level: ChangeLevel::of(metrics.change_percent),
                metrics,
            },
        }
    }

    /// Record a failed comparison.
    #[must_use]
    pub fn failed(pair_id: usize, pair_name: String, paths: (PathBuf, PathBuf, PathBuf), error: String) -> Self {
        let (before, after, output_dir) = paths;
        Self {
            pair_id,
            pair_name,
            before,
            after,
            output_dir,
            status: PairStatus::Failed { error },
        }
    }
}

/// Aggregate statistics of a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStatistics {
    /// Pairs attempted.
    pub total_pairs: usize,
    /// Pairs compared.
    pub successful: usize,
    /// Pairs that failed.
    pub failed: usize,
    /// Completed pairs at [`ChangeLevel::Critical`].
    pub critical_changes: usize,
    /// Completed pairs at [`ChangeLevel::Moderate`].
    pub moderate_changes: usize,
    /// Completed pairs at [`ChangeLevel::Minimal`].
    pub minimal_changes: usize,
    /// Mean change percentage over completed pairs.
    pub avg_change_percent: f64,
    /// Mean corrosion change over completed pairs.
    pub avg_rust_delta: f64,
    /// Sum of positive crack deltas.
    pub total_new_cracks: i64,
}

/// Statistics plus every pair record, written as `batch_summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Aggregates.
    pub statistics: BatchStatistics,
    /// Per-pair records, in batch order.
    pub results: Vec<PairRecord>,
}

impl BatchSummary {
    /// Pretty-printed JSON of the whole summary.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Console report of the batch.
    #[must_use]
    pub fn report(&self) -> String {
        let s = &self.statistics;
        let mut out = String::new();
        let _ = writeln!(out, "{}", "=".repeat(80));
        let _ = writeln!(out, "BATCH PROCESSING COMPLETE");
        let _ = writeln!(out, "{}", "=".repeat(80));
        let _ = writeln!(out, "Total Pairs:         {}", s.total_pairs);
        let _ = writeln!(out, "Successful:          {}", s.successful);
        let _ = writeln!(out, "Failed:              {}", s.failed);
        let _ = writeln!(out, "Critical Changes:    {}", s.critical_changes);
        let _ = writeln!(out, "Moderate Changes:    {}", s.moderate_changes);
        let _ = writeln!(out, "Minimal Changes:     {}", s.minimal_changes);
        let _ = writeln!(out, "Average Change:      {:.2}%", s.avg_change_percent);
        let _ = writeln!(out, "Average Rust Change: {:+.2}%", s.avg_rust_delta);
        let _ = writeln!(out, "Total New Cracks:    {}", s.total_new_cracks);
        for record in &self.results {
            let line = match &record.status {
                PairStatus::Completed { level, metrics } => format!(
                    "{level:<9} change {:.2}% rust {:+.2}% cracks {:+} regions {}",
                    metrics.change_percent, metrics.rust_delta_pct, metrics.crack_delta, metrics.regions,
                ),
                PairStatus::Failed { error } => format!("FAILED    {error}"),
            };
            let _ = writeln!(out, "{:03} {:<24} {line}", record.pair_id, record.pair_name);
        }
        out
    }
}

/// Aggregate `records` into a [`BatchSummary`].
#[must_use]
pub fn summarize(records: Vec<PairRecord>) -> BatchSummary {
    let mut stats = BatchStatistics {
        total_pairs: records.len(),
        ..BatchStatistics::default()
    };
    for record in &records {
        match &record.status {
            PairStatus::Completed { level, metrics } => {
                stats.successful += 1;
                match level {
                    ChangeLevel::Critical => stats.critical_changes += 1,
                    ChangeLevel::Moderate => stats.moderate_changes += 1,
                    ChangeLevel::Minimal => stats.minimal_changes += 1,
                }
                stats.avg_change_percent += metrics.change_percent;
                stats.avg_rust_delta += metrics.rust_delta_pct;
                stats.total_new_cracks += metrics.crack_delta.max(0);
            }
            PairStatus::Failed { .. } => stats.failed += 1,
        }
    }
    if stats.successful > 0 {
        #[allow(clippy::cast_precision_loss)]
        let n = stats.successful as f64;
        stats.avg_change_percent /= n;
        stats.avg_rust_delta /= n;
    }
    BatchSummary {
        statistics: stats,
        results: records,
    }
}
