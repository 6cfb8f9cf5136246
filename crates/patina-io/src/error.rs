//! Errors of the filesystem layer.

use std::path::PathBuf;

use patina_export::ExportError;
use patina_pipeline::PipelineError;

/// Errors that can occur while reading inputs or writing outputs.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// An input file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// Path being read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// An output file or directory could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// Path being written.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A raster artifact could not be encoded.
    #[error("failed to encode {}: {source}", path.display())]
    Encode {
        /// Path being written.
        path: PathBuf,
        /// Underlying error.
        source: image::ImageError,
    },

    /// The comparison itself failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// The output path has no file name or no extension to derive
    /// artifact names from.
    #[error("output path {} needs a file name with an extension", .0.display())]
    InvalidOutputPath(PathBuf),

    /// A JSON record could not be serialized.
    #[error(transparent)]
    Serialize(#[from] ExportError),
}
