//! End-to-end comparison of two files on disk.

use std::path::Path;
use std::time::{Duration, Instant};

use patina_pipeline::{Clock, CompareConfig, Comparison, ComparisonResult, PipelineDiagnostics};

use crate::{IoError, artifact_paths, read_image, write_artifacts};

/// [`Clock`] backed by [`std::time::Instant`].
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    origin: Instant,
}

impl StdClock {
    /// A clock whose origin is now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Compare the images at `before` and `after`, writing the annotated
/// image to `out` and the other artifacts beside it.
///
/// Nothing is written unless the comparison succeeds.
///
/// # Errors
///
/// Returns [`IoError::InvalidOutputPath`] before reading anything if
/// `out` cannot name the artifacts, [`IoError::Read`] if an input is
/// unreadable, [`IoError::Pipeline`] if the engine rejects the inputs
/// or the configuration, and [`IoError::Write`] or [`IoError::Encode`]
/// if an artifact cannot be written.
pub fn compare_files(
    before: &Path,
    after: &Path,
    out: &Path,
    config: &CompareConfig,
) -> Result<ComparisonResult, IoError> {
    let paths = artifact_paths(out)?;
    let comparison = patina_pipeline::compare(&read_image(before)?, &read_image(after)?, config)?;
    finish(comparison, paths)
}

/// Like [`compare_files`], also returning per-stage diagnostics timed
/// on `clock`.
///
/// # Errors
///
/// Same as [`compare_files`].
pub fn compare_files_with_diagnostics(
    before: &Path,
    after: &Path,
    out: &Path,
    config: &CompareConfig,
    clock: &impl Clock,
) -> Result<(ComparisonResult, PipelineDiagnostics), IoError> {
    let paths = artifact_paths(out)?;
    let (comparison, diagnostics) = patina_pipeline::compare_with_diagnostics(
        &read_image(before)?,
        &read_image(after)?,
        config,
        clock,
    )?;
    Ok((finish(comparison, paths)?, diagnostics))
}

fn finish(
    comparison: Comparison,
    paths: patina_pipeline::ArtifactPaths,
) -> Result<ComparisonResult, IoError> {
    let (analysis, artifacts) = comparison.into_parts();
    write_artifacts(&artifacts, &paths)?;
    tracing::info!(
        similarity = analysis.similarity,
        change_percent = analysis.change_percent,
        regions = analysis.regions,
        alignment_success = analysis.alignment_success,
        "comparison complete",
    );
    Ok(ComparisonResult {
        analysis,
        artifacts: paths,
    })
}
