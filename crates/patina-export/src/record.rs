//! The flat UI-compatible JSON record.

use patina_pipeline::ComparisonResult;

use crate::ExportError;

/// Serialize `result` as pretty-printed JSON with the stable field
/// names.
///
/// # Errors
///
/// Returns [`ExportError::Json`] if serialization fails.
pub fn to_json(result: &ComparisonResult) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(result)?)
}

/// Serialize `result` into a JSON value.
///
/// # Errors
///
/// Returns [`ExportError::Json`] if serialization fails.
pub fn to_json_value(result: &ComparisonResult) -> Result<serde_json::Value, ExportError> {
    Ok(serde_json::to_value(result)?)
}
