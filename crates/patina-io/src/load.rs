//! Reading input photographs.

use std::path::Path;

use crate::IoError;

/// Read the encoded bytes of the image at `path`.
///
/// Decoding is left to the engine so that a corrupt file surfaces as
/// [`PipelineError::ImageLoad`](patina_pipeline::PipelineError::ImageLoad).
///
/// # Errors
///
/// Returns [`IoError::Read`] if the file cannot be read.
pub fn read_image(path: &Path) -> Result<Vec<u8>, IoError> {
    let bytes = std::fs::read(path).map_err(|source| IoError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "read image");
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_a_read_error() {
        let path = std::env::temp_dir().join("patina-io-load-missing").join("nope.jpg");
        let err = read_image(&path);
        assert!(matches!(err, Err(IoError::Read { path: p, .. }) if p == path));
    }
}
