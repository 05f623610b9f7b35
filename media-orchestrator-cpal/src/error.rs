use media_orchestrator_core::MediaError;
use thiserror::Error;

/// Failures raised inside the cpal backend before they cross into the core.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no audio device named {0}")]
    NoDevice(String),

    #[error("failed to enumerate devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to query device config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("failed to pause stream: {0}")]
    PauseStream(#[from] cpal::PauseStreamError),

    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("stream thread is gone")]
    StreamThreadGone,

    #[error("failed to spawn stream thread: {0}")]
    Spawn(std::io::Error),

    #[error("failed to read media: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to fetch media: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid wav data: {0}")]
    Wav(#[from] hound::Error),
}

impl From<BackendError> for MediaError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NoDevice(_) => MediaError::DeviceNotAvailable,
            BackendError::Io(_) | BackendError::Http(_) | BackendError::Wav(_) => {
                MediaError::Source(err.to_string())
            }
            BackendError::Devices(_)
            | BackendError::DefaultConfig(_)
            | BackendError::BuildStream(_)
            | BackendError::PlayStream(_)
            | BackendError::PauseStream(_)
            | BackendError::UnsupportedFormat(_)
            | BackendError::StreamThreadGone
            | BackendError::Spawn(_) => MediaError::Device(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_device_maps_to_device_not_available() {
        let err: MediaError = BackendError::NoDevice("USB Mic".into()).into();
        assert_eq!(err, MediaError::DeviceNotAvailable);
        assert!(err.is_device_error());
    }

    #[test]
    fn unreadable_media_maps_to_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: MediaError = BackendError::Io(io).into();
        assert!(err.is_media_error());
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn stream_failures_map_to_device() {
        let err: MediaError = BackendError::StreamThreadGone.into();
        assert_eq!(err, MediaError::Device("stream thread is gone".into()));
    }
}
