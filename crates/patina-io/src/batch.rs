//! Directory-level batch runs.
//!
//! Before and after photographs are paired by identical file name. Each
//! pair gets its own numbered output directory; a failing pair is
//! recorded and the batch moves on.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use patina_export::{BatchSummary, PairRecord, summarize, to_json};
use patina_pipeline::CompareConfig;

use crate::{IoError, compare_files};

/// Name of the summary written into the batch output directory.
pub const SUMMARY_FILE_NAME: &str = "batch_summary.json";

/// Name of the per-pair JSON record.
pub const RESULT_FILE_NAME: &str = "results.json";

/// A before/after pair sharing a file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePair {
    /// File stem shared by both images.
    pub name: String,
    /// "Before" image.
    pub before: PathBuf,
    /// "After" image.
    pub after: PathBuf,
}

fn has_extension(path: &Path, ext: Option<&str>) -> bool {
    ext.is_none_or(|want| {
        path.extension()
            .and_then(OsStr::to_str)
            .is_some_and(|have| have.eq_ignore_ascii_case(want.trim_start_matches('.')))
    })
}

/// Pair every file in `before_dir` with the same-named file in
/// `after_dir`, sorted by file name.
///
/// When `ext` is given only files with that extension (case-insensitive)
/// are considered. Files without a counterpart are skipped with a
/// warning.
///
/// # Errors
///
/// Returns [`IoError::Read`] if `before_dir` cannot be listed.
pub fn find_pairs(before_dir: &Path, after_dir: &Path, ext: Option<&str>) -> Result<Vec<ImagePair>, IoError> {
    let read_err = |source| IoError::Read {
        path: before_dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in std::fs::read_dir(before_dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        if path.is_file() && has_extension(&path, ext) {
            files.push(path);
        }
    }
    files.sort();

    let mut pairs = Vec::with_capacity(files.len());
    for before in files {
        let Some(file_name) = before.file_name() else {
            continue;
        };
        let after = after_dir.join(file_name);
        if !after.is_file() {
            tracing::warn!(file = %file_name.to_string_lossy(), "no matching after image");
            continue;
        }
        let name = before
            .file_stem()
            .map_or_else(String::new, |s| s.to_string_lossy().into_owned());
        pairs.push(ImagePair { name, before, after });
    }
    Ok(pairs)
}

fn run_pair(pair_id: usize, pair: ImagePair, out_dir: &Path, config: &CompareConfig) -> PairRecord {
    let pair_dir = out_dir.join(format!("{pair_id:03}_{}", pair.name));
    let ext = pair.before.extension().and_then(OsStr::to_str).unwrap_or("png");
    let out = pair_dir.join(format!("annotated.{ext}"));
    let paths = (pair.before.clone(), pair.after.clone(), pair_dir.clone());

    let outcome = compare_files(&pair.before, &pair.after, &out, config).and_then(|result| {
        let path = pair_dir.join(RESULT_FILE_NAME);
        std::fs::write(&path, to_json(&result)?).map_err(|source| IoError::Write { path, source })?;
        Ok(result)
    });
    match outcome {
        Ok(result) => {
            tracing::info!(
                pair_id,
                pair = %pair.name,
                change_percent = result.analysis.change_percent,
                regions = result.analysis.regions,
                "pair complete",
            );
            PairRecord::completed(pair_id, pair.name, paths, &result.analysis)
        }
        Err(e) => {
            tracing::error!(pair_id, pair = %pair.name, error = %e, "pair failed");
            PairRecord::failed(pair_id, pair.name, paths, e.to_string())
        }
    }
}

/// Compare every pair found by [`find_pairs`], writing artifacts under
/// `out_dir/<NNN>_<stem>/` and the summary to
/// `out_dir/batch_summary.json`.
///
/// Pairs are numbered from 1 in file-name order.
///
/// # Errors
///
/// Returns an error only for batch-level failures: `before_dir` cannot
/// be listed, `out_dir` cannot be created, or the summary cannot be
/// written. Per-pair failures are recorded in the summary.
pub fn run_batch(
    before_dir: &Path,
    after_dir: &Path,
    out_dir: &Path,
    ext: Option<&str>,
    config: &CompareConfig,
) -> Result<BatchSummary, IoError> {
    let pairs = find_pairs(before_dir, after_dir, ext)?;
    std::fs::create_dir_all(out_dir).map_err(|source| IoError::Write {
        path: out_dir.to_path_buf(),
        source,
    })?;
    tracing::info!(pairs = pairs.len(), out_dir = %out_dir.display(), "batch started");

    let records = pairs
        .into_iter()
        .enumerate()
        .map(|(i, pair)| run_pair(i + 1, pair, out_dir, config))
        .collect();
    let summary = summarize(records);

    let path = out_dir.join(SUMMARY_FILE_NAME);
    let json = summary.to_json()?;
    std::fs::write(&path, json).map_err(|source| IoError::Write { path, source })?;
    tracing::info!(
        successful = summary.statistics.successful,
        failed = summary.statistics.failed,
        "batch complete",
    );
    Ok(summary)
}
