//! patina-io: Filesystem layer for the patina comparison engine.
//!
//! Loads before/after photographs by path, runs the engine, writes the
//! five raster artifacts next to the requested output path, and drives
//! directory-level batch runs. All side effects of the workspace live
//! here; `patina-pipeline` and `patina-export` stay pure.

pub mod artifacts;
pub mod batch;
pub mod compare;
pub mod error;
pub mod load;

pub use artifacts::{artifact_paths, write_artifacts};
pub use batch::{ImagePair, SUMMARY_FILE_NAME, find_pairs, run_batch};
pub use compare::{StdClock, compare_files, compare_files_with_diagnostics};
pub use error::IoError;
pub use load::read_image;
