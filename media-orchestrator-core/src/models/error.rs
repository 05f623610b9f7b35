use thiserror::Error;

/// Errors surfaced by the capture stream, the playback sessions and the
/// orchestrator.
///
/// "No active capture" is deliberately absent: stopping without a take is an
/// `Ok(None)`, not a failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("orchestrator not initialized")]
    NotInitialized,

    #[error("orchestrator already initialized")]
    AlreadyInitialized,

    #[error("capture permission denied")]
    PermissionDenied,

    #[error("capture device not available")]
    DeviceNotAvailable,

    #[error("device error: {0}")]
    Device(String),

    #[error("source error: {0}")]
    Source(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("session configuration failed: {0}")]
    SessionConfiguration(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("a capture is already in progress")]
    CaptureInProgress,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl MediaError {
    /// Permission and hardware-handle failures.
    pub fn is_device_error(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied | Self::DeviceNotAvailable | Self::Device(_)
        )
    }

    /// Bad URL, unreachable resource or malformed media.
    pub fn is_media_error(&self) -> bool {
        matches!(self, Self::Source(_) | Self::Decode(_))
    }
}

pub type MediaResult<T> = Result<T, MediaError>;
