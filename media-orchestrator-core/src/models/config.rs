use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::audio_models::CaptureFormat;
use super::error::MediaError;

/// Configuration for a [`MediaOrchestrator`](crate::MediaOrchestrator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Format of recorded takes (default: 44.1 kHz mono PCM16).
    pub capture: CaptureFormat,

    /// Directory where takes are written (default: a per-process temp dir).
    pub output_directory: PathBuf,

    /// Pause the capture hardware when a take stops (default: true).
    ///
    /// With `false` the device keeps streaming between takes and frames are
    /// discarded by the retention flag alone.
    pub pause_on_stop: bool,

    /// Capacity of the frame broadcast channel (default: 256 frames).
    pub frame_channel_capacity: usize,

    /// Write a `<take>.metadata.json` sidecar next to each take (default: false).
    pub write_metadata_sidecar: bool,

    /// Volume applied to unmuted video playback, 0.0–1.0 (default: 1.0).
    pub video_full_volume: f32,
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.capture.sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        if ![1, 2].contains(&self.capture.channels) {
            return Err(format!("unsupported channel count: {}", self.capture.channels));
        }
        if self.capture.bits_per_sample != 16 {
            return Err(format!(
                "unsupported bit depth: {}",
                self.capture.bits_per_sample
            ));
        }
        if self.frame_channel_capacity == 0 {
            return Err("frame channel capacity must be positive".into());
        }
        if !(0.0..=1.0).contains(&self.video_full_volume) {
            return Err(format!(
                "video volume out of range: {}",
                self.video_full_volume
            ));
        }
        Ok(())
    }

    /// Load a JSON config; missing fields fall back to defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, MediaError> {
        let json = fs::read_to_string(path)
            .map_err(|e| MediaError::ConfigurationFailed(format!("failed to read config: {}", e)))?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| {
                MediaError::ConfigurationFailed(format!("failed to parse config: {}", e))
            })?;
        config.validate().map_err(MediaError::ConfigurationFailed)?;
        Ok(config)
    }

    /// The default per-process temp location for takes.
    pub fn default_output_directory() -> PathBuf {
        std::env::temp_dir().join(format!("media-orchestrator-{}", std::process::id()))
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            capture: CaptureFormat::default(),
            output_directory: Self::default_output_directory(),
            pause_on_stop: true,
            frame_channel_capacity: 256,
            write_metadata_sidecar: false,
            video_full_volume: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = OrchestratorConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.pause_on_stop);
        assert!(config
            .output_directory
            .to_string_lossy()
            .contains("media-orchestrator-"));
    }

    #[test]
    fn rejects_unsupported_formats() {
        let mut config = OrchestratorConfig::default();
        config.capture.bits_per_sample = 24;
        assert!(config.validate().is_err());

        let mut config = OrchestratorConfig::default();
        config.capture.channels = 6;
        assert!(config.validate().is_err());

        let mut config = OrchestratorConfig::default();
        config.frame_channel_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = OrchestratorConfig::default();
        config.video_full_volume = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("media.json");
        fs::write(
            &path,
            r#"{ "pause_on_stop": false, "capture": { "sample_rate": 48000 } }"#,
        )
        .unwrap();

        let config = OrchestratorConfig::from_json_file(&path).unwrap();
        assert!(!config.pause_on_stop);
        assert_eq!(config.capture.sample_rate, 48000);
        assert_eq!(config.capture.channels, 1);
        assert_eq!(config.frame_channel_capacity, 256);
    }

    #[test]
    fn invalid_json_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("media.json");
        fs::write(&path, r#"{ "capture": { "bits_per_sample": 8 } }"#).unwrap();

        let err = OrchestratorConfig::from_json_file(&path).unwrap_err();
        assert!(matches!(err, MediaError::ConfigurationFailed(_)));
    }
}
