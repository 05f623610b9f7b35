use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::audio_models::CaptureFormat;

/// A finished take as registered in the recording catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingResult {
    pub file_path: PathBuf,
    pub take: u64,
    pub duration_secs: f64,
    pub payload_bytes: u64,
    pub checksum: String,
    pub metadata: RecordingMetadata,
}

/// Metadata describing a take, serializable for the JSON sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub take: u64,
    pub duration_secs: f64,
    pub file_path: String,
    pub checksum: String,
    pub created_at: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub frame_count: u64,
}

impl RecordingMetadata {
    pub fn new(
        take: u64,
        format: &CaptureFormat,
        duration_secs: f64,
        file_path: &str,
        checksum: &str,
        frame_count: u64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            take,
            duration_secs,
            file_path: file_path.to_string(),
            checksum: checksum.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            sample_rate: format.sample_rate,
            channels: format.channels,
            bits_per_sample: format.bits_per_sample,
            frame_count,
        }
    }
}
