use std::time::Duration;

use async_trait::async_trait;

use crate::models::audio_models::MediaSource;
use crate::models::error::MediaResult;

/// A reusable audio output handle.
///
/// One handle plays one source at a time; `load` replaces whatever was
/// loaded before.
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Fetch and prepare `source`. Failures are `MediaError::Source`.
    async fn load(&mut self, source: &MediaSource) -> MediaResult<()>;

    /// Start or continue playback. Resolves once the output is playing.
    async fn play(&mut self) -> MediaResult<()>;

    async fn pause(&mut self) -> MediaResult<()>;

    /// Halt playback and rewind.
    async fn stop(&mut self) -> MediaResult<()>;

    async fn set_volume(&mut self, level: f32) -> MediaResult<()>;

    fn is_playing(&self) -> bool;

    async fn dispose(&mut self) -> MediaResult<()>;
}

#[async_trait]
pub trait AudioOutputFactory: Send + Sync {
    async fn create(&self) -> MediaResult<Box<dyn AudioOutput>>;
}

/// A video decoding handle bound to a single source.
#[async_trait]
pub trait VideoHandle: Send + Sync {
    /// Open the source and prepare decoding. Failures are `MediaError::Decode`.
    async fn initialize(&mut self) -> MediaResult<()>;

    async fn play(&mut self) -> MediaResult<()>;

    async fn pause(&mut self) -> MediaResult<()>;

    async fn seek(&mut self, position: Duration) -> MediaResult<()>;

    async fn set_volume(&mut self, level: f32) -> MediaResult<()>;

    fn is_playing(&self) -> bool;

    async fn dispose(&mut self) -> MediaResult<()>;
}

pub trait VideoDecoderFactory: Send + Sync {
    /// Build an uninitialized handle for `source`.
    fn create(&self, source: &MediaSource) -> Box<dyn VideoHandle>;
}
