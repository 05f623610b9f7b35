//! # media-orchestrator-core
//!
//! Platform-agnostic media orchestration with keep-alive microphone capture.
//!
//! The microphone stream is opened once during initialization and parked
//! paused. Starting a take only resumes the stream and raises a retention
//! flag, so the device startup cost is paid once per process instead of once
//! per take. Audio and video playback run beside it, and the orchestrator
//! enforces that starting one activity pauses the others.
//!
//! Platform backends (see `media-orchestrator-cpal`) implement the traits in
//! [`traits`] and are handed to [`MediaOrchestrator`] through a
//! [`MediaBackend`].
//!
//! ## Architecture
//!
//! ```text
//! media-orchestrator-core (this crate)
//! ├── traits/       ← CaptureDevice, PermissionProvider, SessionConfigurator,
//! │                   AudioOutput, VideoHandle, MediaDelegate
//! ├── models/       ← MediaError, OrchestratorState, OrchestratorConfig,
//! │                   AudioFrame, MediaSource, etc.
//! ├── processing/   ← input conversion, WAV header generation and parsing
//! ├── capture/      ← CaptureStream (long-lived mic handle + frame broadcast)
//! ├── session/      ← RecordingSession, AudioPlaybackSession,
//! │                   VideoPlaybackSession, MediaOrchestrator
//! └── storage/      ← WAV take writer, metadata sidecar
//! ```

pub mod capture;
pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

#[cfg(test)]
mod testing;

// Re-export key types at crate root for convenience.
pub use capture::stream::{CaptureStream, FrameSubscription};
pub use models::audio_models::{
    AudioFrame, CaptureDeviceInfo, CaptureDiagnostics, CaptureFormat, MediaSource,
};
pub use models::config::OrchestratorConfig;
pub use models::error::{MediaError, MediaResult};
pub use models::recording_result::{RecordingMetadata, RecordingResult};
pub use models::state::{CaptureStreamState, OrchestratorState};
pub use processing::converter::InputConverter;
pub use session::audio_playback::AudioPlaybackSession;
pub use session::orchestrator::{MediaBackend, MediaOrchestrator};
pub use session::recording::RecordingSession;
pub use session::video_playback::VideoPlaybackSession;
pub use storage::take_writer::TakeWriter;
pub use traits::capture_device::{CaptureDevice, CaptureDeviceFactory, FrameCallback};
pub use traits::media_delegate::MediaDelegate;
pub use traits::platform::{PermissionProvider, SessionConfigurator};
pub use traits::playback::{AudioOutput, AudioOutputFactory, VideoDecoderFactory, VideoHandle};
