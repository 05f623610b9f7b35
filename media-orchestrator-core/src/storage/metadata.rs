use std::fs;
use std::path::{Path, PathBuf};

use crate::models::error::MediaError;
use crate::models::recording_result::RecordingMetadata;

/// `recording_1_…wav` → `recording_1_…metadata.json`
pub fn sidecar_path(recording_path: &Path) -> PathBuf {
    recording_path.with_extension("metadata.json")
}

/// Write take metadata as a JSON sidecar next to the recording.
pub fn write_metadata(
    metadata: &RecordingMetadata,
    recording_path: &Path,
) -> Result<PathBuf, MediaError> {
    let metadata_path = sidecar_path(recording_path);
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| MediaError::Storage(format!("failed to serialize metadata: {}", e)))?;
    fs::write(&metadata_path, json)
        .map_err(|e| MediaError::Storage(format!("failed to write metadata: {}", e)))?;
    Ok(metadata_path)
}

/// Read take metadata from its JSON sidecar.
pub fn read_metadata(recording_path: &Path) -> Result<RecordingMetadata, MediaError> {
    let json = fs::read_to_string(sidecar_path(recording_path))
        .map_err(|e| MediaError::Storage(format!("failed to read metadata: {}", e)))?;
    serde_json::from_str(&json)
        .map_err(|e| MediaError::Storage(format!("failed to parse metadata: {}", e)))
}
