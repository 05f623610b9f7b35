//! # media-orchestrator-cpal
//!
//! Cross-platform audio backend for media-orchestrator, built on `cpal`.
//!
//! Provides:
//! - `CpalMicCapture` / `CpalCaptureFactory`: keep-alive microphone stream
//! - `CpalAudioOutput` / `CpalOutputFactory`: WAV playback from files or HTTP
//! - `CpalPermissionProvider`: microphone access probe
//! - `HostSessionConfigurator`: host readiness check run before any stream opens
//! - `DeviceEnumerator`: input and output device listing
//!
//! Video decoding is not provided here; supply a `VideoDecoderFactory` from
//! the embedding application.
//!
//! ## Usage
//! ```ignore
//! use media_orchestrator_core::{MediaOrchestrator, OrchestratorConfig};
//!
//! let backend = media_orchestrator_cpal::default_backend(video_factory);
//! let mut orchestrator = MediaOrchestrator::new(backend, OrchestratorConfig::default());
//! orchestrator.initialize().await?;
//! let latency = orchestrator.start_recording().await?;
//! ```

pub mod cpal_mic;
pub mod cpal_output;
pub mod device_enumerator;
pub mod error;
pub mod host_session;
pub mod permissions;

use std::sync::Arc;

use media_orchestrator_core::{MediaBackend, VideoDecoderFactory};

pub use cpal_mic::{CpalCaptureFactory, CpalMicCapture};
pub use cpal_output::{decode_wav, CpalAudioOutput, CpalOutputFactory, DecodedAudio};
pub use device_enumerator::DeviceEnumerator;
pub use error::BackendError;
pub use host_session::HostSessionConfigurator;
pub use permissions::CpalPermissionProvider;

#[cfg(test)]
pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Collaborators for the default input and output devices.
pub fn default_backend(video: Arc<dyn VideoDecoderFactory>) -> MediaBackend {
    MediaBackend {
        session: Arc::new(HostSessionConfigurator::new()),
        permissions: Arc::new(CpalPermissionProvider::new()),
        capture: Arc::new(CpalCaptureFactory::new()),
        audio_output: Arc::new(CpalOutputFactory::new()),
        video,
    }
}
