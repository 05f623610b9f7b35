use std::sync::Arc;
use std::time::Duration;

use crate::models::audio_models::MediaSource;
use crate::models::error::{MediaError, MediaResult};
use crate::traits::playback::{VideoDecoderFactory, VideoHandle};

/// Owns at most one video handle, bound to the source it was created for.
///
/// Playing the loaded source again reuses the handle. Playing a different
/// source disposes the old handle before the new one is created.
pub struct VideoPlaybackSession {
    factory: Arc<dyn VideoDecoderFactory>,
    full_volume: f32,
    initialized: bool,
    handle: Option<Box<dyn VideoHandle>>,
    current: Option<MediaSource>,
    volume: f32,
    handles_created: usize,
}

impl VideoPlaybackSession {
    pub fn new(factory: Arc<dyn VideoDecoderFactory>, full_volume: f32) -> Self {
        let full_volume = full_volume.clamp(0.0, 1.0);
        Self {
            factory,
            full_volume,
            initialized: false,
            handle: None,
            current: None,
            volume: full_volume,
            handles_created: 0,
        }
    }

    pub async fn initialize(&mut self) -> MediaResult<()> {
        self.initialized = true;
        Ok(())
    }

    /// Play `source` from the start, muted or at full volume.
    pub async fn play(&mut self, source: &MediaSource, muted: bool) -> MediaResult<()> {
        if !self.initialized {
            return Err(MediaError::NotInitialized);
        }

        if self.current.as_ref() != Some(source) {
            self.release_handle().await;

            let mut handle = self.factory.create(source);
            self.handles_created += 1;
            if let Err(e) = handle.initialize().await {
                log::error!("failed to open video {}: {}", source, e);
                if let Err(dispose_err) = handle.dispose().await {
                    log::warn!("failed to dispose rejected video handle: {}", dispose_err);
                }
                return Err(e);
            }
            log::info!("video handle created for {}", source);
            self.handle = Some(handle);
            self.current = Some(source.clone());
        }

        let volume = if muted { 0.0 } else { self.full_volume };
        let handle = self.handle.as_mut().ok_or(MediaError::NotInitialized)?;
        handle.set_volume(volume).await?;
        handle.seek(Duration::ZERO).await?;
        handle.play().await?;
        self.volume = volume;
        Ok(())
    }

    async fn release_handle(&mut self) {
        self.current = None;
        if let Some(mut old) = self.handle.take() {
            if let Err(e) = old.dispose().await {
                log::warn!("failed to dispose video handle: {}", e);
            }
        }
    }

    /// No-op without a handle.
    pub async fn pause(&mut self) -> MediaResult<()> {
        match self.handle.as_mut() {
            Some(handle) => handle.pause().await,
            None => Ok(()),
        }
    }

    /// No-op without a handle.
    pub async fn resume(&mut self) -> MediaResult<()> {
        match self.handle.as_mut() {
            Some(handle) => handle.play().await,
            None => Ok(()),
        }
    }

    /// Pause and rewind. No-op without a handle.
    pub async fn stop(&mut self) -> MediaResult<()> {
        let Some(handle) = self.handle.as_mut() else {
            return Ok(());
        };
        handle.pause().await?;
        handle.seek(Duration::ZERO).await
    }

    /// Set the volume, clamped to 0.0–1.0, on the live handle if any.
    pub async fn set_volume(&mut self, level: f32) -> MediaResult<()> {
        let level = level.clamp(0.0, 1.0);
        if let Some(handle) = self.handle.as_mut() {
            handle.set_volume(level).await?;
        }
        self.volume = level;
        Ok(())
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_playing(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| h.is_playing())
    }

    pub fn current_source(&self) -> Option<&MediaSource> {
        self.current.as_ref()
    }

    /// Number of handles this session has created.
    pub fn handles_created(&self) -> usize {
        self.handles_created
    }

    pub async fn dispose(&mut self) -> MediaResult<()> {
        self.initialized = false;
        self.current = None;
        match self.handle.take() {
            Some(mut handle) => handle.dispose().await,
            None => Ok(()),
        }
    }
}
