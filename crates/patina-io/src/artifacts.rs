//! Artifact file naming and writing.
//!
//! The annotated image is written to the requested output path itself;
//! the other four rasters sit next to it, named by inserting a suffix
//! before the extension: `site/pump.jpg` gives `site/pump_heatmap.jpg`,
//! `site/pump_before_heatmap.jpg`, `site/pump_diff_mask.jpg` and
//! `site/pump_comparison.jpg`.

use std::path::{Path, PathBuf};

use patina_pipeline::{ArtifactPaths, Artifacts, RgbImage};

use crate::IoError;

/// Suffix of the structural dissimilarity heatmap.
pub const HEATMAP_SUFFIX: &str = "_heatmap";
/// Suffix of the "before" gradient heatmap.
pub const BEFORE_HEATMAP_SUFFIX: &str = "_before_heatmap";
/// Suffix of the fused change mask.
pub const DIFF_MASK_SUFFIX: &str = "_diff_mask";
/// Suffix of the side-by-side image.
pub const COMPARISON_SUFFIX: &str = "_comparison";

/// Derive every artifact path from the annotated image path `out`.
///
/// # Errors
///
/// Returns [`IoError::InvalidOutputPath`] if `out` has no file stem or
/// no extension.
pub fn artifact_paths(out: &Path) -> Result<ArtifactPaths, IoError> {
    let invalid = || IoError::InvalidOutputPath(out.to_path_buf());
    let stem = out.file_stem().and_then(|s| s.to_str()).ok_or_else(invalid)?;
    let ext = out.extension().and_then(|s| s.to_str()).ok_or_else(invalid)?;
    let sibling = |suffix: &str| out.with_file_name(format!("{stem}{suffix}.{ext}"));
    Ok(ArtifactPaths {
        annotated_path: out.to_path_buf(),
        heatmap_path: sibling(HEATMAP_SUFFIX),
        before_heatmap_path: sibling(BEFORE_HEATMAP_SUFFIX),
        diff_mask_path: sibling(DIFF_MASK_SUFFIX),
        comparison_path: sibling(COMPARISON_SUFFIX),
    })
}

fn save(image: &RgbImage, path: &Path) -> Result<(), IoError> {
    image.save(path).map_err(|source| match source {
        image::ImageError::IoError(source) => IoError::Write {
            path: path.to_path_buf(),
            source,
        },
        source => IoError::Encode {
            path: path.to_path_buf(),
            source,
        },
    })?;
    tracing::info!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        "wrote artifact",
    );
    Ok(())
}

/// Write the five rasters of `artifacts` to `paths`.
///
/// The parent directory of the annotated image is created if missing.
/// The encoding of each file follows its extension.
///
/// # Errors
///
/// Returns [`IoError::Write`] if a directory or file cannot be created
/// and [`IoError::Encode`] if the extension names no supported format.
pub fn write_artifacts(artifacts: &Artifacts, paths: &ArtifactPaths) -> Result<(), IoError> {
    if let Some(parent) = paths.annotated_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| IoError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let outputs: [(&RgbImage, &PathBuf); 5] = [
        (&artifacts.annotated, &paths.annotated_path),
        (&artifacts.heatmap, &paths.heatmap_path),
        (&artifacts.before_heatmap, &paths.before_heatmap_path),
        (&artifacts.diff_mask, &paths.diff_mask_path),
        (&artifacts.comparison, &paths.comparison_path),
    ];
    for (image, path) in outputs {
        save(image, path)?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn suffixes_go_before_the_extension() {
        let paths = artifact_paths(Path::new("site/pump.v2.jpg")).unwrap();
        assert_eq!(paths.annotated_path, Path::new("site/pump.v2.jpg"));
        assert_eq!(paths.heatmap_path, Path::new("site/pump.v2_heatmap.jpg"));
        assert_eq!(paths.before_heatmap_path, Path::new("site/pump.v2_before_heatmap.jpg"));
        assert_eq!(paths.diff_mask_path, Path::new("site/pump.v2_diff_mask.jpg"));
        assert_eq!(paths.comparison_path, Path::new("site/pump.v2_comparison.jpg"));
    }

    #[test]
    fn bare_file_name_stays_relative() {
        let paths = artifact_paths(Path::new("out.png")).unwrap();
        assert_eq!(paths.heatmap_path, Path::new("out_heatmap.png"));
    }

    #[test]
    fn missing_extension_is_rejected() {
        assert!(matches!(
            artifact_paths(Path::new("site/pump")),
            Err(IoError::InvalidOutputPath(_))
        ));
        assert!(matches!(
            artifact_paths(Path::new("")),
            Err(IoError::InvalidOutputPath(_))
        ));
    }
}
