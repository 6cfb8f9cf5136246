//! patina-export: Pure serializers for comparison results (sans-IO)
//!
//! Turns a [`ComparisonResult`](patina_pipeline::ComparisonResult) into
//! the formats consumers read: the flat UI record, the report-builder
//! JSON, a console text summary, and the batch summary.

pub mod batch;
pub mod record;
pub mod report;
pub mod summary;

pub use batch::{BatchStatistics, BatchSummary, ChangeLevel, PairMetrics, PairRecord, PairStatus, summarize};
pub use record::{to_json, to_json_value};
pub use report::{ObjectSummary, Report, build_report};
pub use summary::text_summary;

/// Errors produced while serializing.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// JSON serialization failed.
    #[error("failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),
}
