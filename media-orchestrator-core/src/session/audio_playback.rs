use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use crate::models::audio_models::MediaSource;
use crate::models::error::{MediaError, MediaResult};
use crate::traits::playback::{AudioOutput, AudioOutputFactory};

type SharedOutput = Arc<AsyncMutex<Box<dyn AudioOutput>>>;

/// Owns the single reusable audio output handle.
///
/// The handle is shared with the auto-stop timer, which is why it sits behind
/// an async mutex. Each new playback bumps a generation counter so a timer
/// armed for an earlier source never stops a later one.
pub struct AudioPlaybackSession {
    factory: Arc<dyn AudioOutputFactory>,
    output: Option<SharedOutput>,
    current: Option<MediaSource>,
    generation: Arc<AtomicU64>,
    auto_stop: Option<JoinHandle<()>>,
}

impl AudioPlaybackSession {
    pub fn new(factory: Arc<dyn AudioOutputFactory>) -> Self {
        Self {
            factory,
            output: None,
            current: None,
            generation: Arc::new(AtomicU64::new(0)),
            auto_stop: None,
        }
    }

    pub async fn initialize(&mut self) -> MediaResult<()> {
        if self.output.is_some() {
            return Ok(());
        }
        let output = self.factory.create().await?;
        self.output = Some(Arc::new(AsyncMutex::new(output)));
        log::debug!("audio output ready");
        Ok(())
    }

    /// Play a remote (or local) source and stop it after `max_duration`.
    ///
    /// `on_started` receives the load-plus-start latency once the output is
    /// playing.
    pub async fn play_from_url<F>(
        &mut self,
        url: &str,
        max_duration: Duration,
        on_started: F,
    ) -> MediaResult<()>
    where
        F: FnOnce(Duration) + Send,
    {
        let source = MediaSource::parse(url);
        let latency = self.load_and_play(&source).await?;
        on_started(latency);
        self.arm_auto_stop(max_duration);
        Ok(())
    }

    /// Play a local file until it ends or is stopped.
    pub async fn play_from_file(&mut self, path: &Path) -> MediaResult<()> {
        let source = MediaSource::File(path.to_path_buf());
        self.load_and_play(&source).await?;
        Ok(())
    }

    async fn load_and_play(&mut self, source: &MediaSource) -> MediaResult<Duration> {
        let output = self.output.clone().ok_or(MediaError::NotInitialized)?;
        self.cancel_auto_stop();

        let started = Instant::now();
        let mut out = output.lock().await;
        if self.current.take().is_some() {
            out.stop().await?;
        }
        out.load(source).await?;
        out.play().await?;
        let latency = started.elapsed();
        drop(out);

        self.current = Some(source.clone());
        log::info!(
            "playing {} (started in {:.1} ms)",
            source,
            latency.as_secs_f64() * 1000.0
        );
        Ok(latency)
    }

    fn arm_auto_stop(&mut self, after: Duration) {
        let Some(output) = self.output.clone() else {
            return;
        };
        let generation = Arc::clone(&self.generation);
        let armed_for = generation.load(Ordering::SeqCst);

        self.auto_stop = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if generation.load(Ordering::SeqCst) != armed_for {
                return;
            }
            let mut out = output.lock().await;
            match out.stop().await {
                Ok(()) => log::debug!("audio auto-stopped after {:?}", after),
                Err(e) => log::warn!("audio auto-stop failed: {}", e),
            }
        }));
    }

    fn cancel_auto_stop(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(timer) = self.auto_stop.take() {
            timer.abort();
        }
    }

    fn loaded(&self) -> Option<SharedOutput> {
        self.current.as_ref()?;
        self.output.clone()
    }

    /// Halt playback. No-op if nothing is loaded.
    pub async fn stop(&mut self) -> MediaResult<()> {
        let Some(output) = self.loaded() else {
            return Ok(());
        };
        self.cancel_auto_stop();
        let result = output.lock().await.stop().await;
        result
    }

    /// No-op if nothing is loaded.
    pub async fn pause(&mut self) -> MediaResult<()> {
        let Some(output) = self.loaded() else {
            return Ok(());
        };
        let result = output.lock().await.pause().await;
        result
    }

    /// No-op if nothing is loaded.
    pub async fn resume(&mut self) -> MediaResult<()> {
        let Some(output) = self.loaded() else {
            return Ok(());
        };
        let result = output.lock().await.play().await;
        result
    }

    pub async fn set_volume(&mut self, level: f32) -> MediaResult<()> {
        let output = self.output.clone().ok_or(MediaError::NotInitialized)?;
        let result = output.lock().await.set_volume(level.clamp(0.0, 1.0)).await;
        result
    }

    pub async fn is_playing(&self) -> bool {
        match &self.output {
            Some(output) => output.lock().await.is_playing(),
            None => false,
        }
    }

    pub fn current_source(&self) -> Option<&MediaSource> {
        self.current.as_ref()
    }

    pub async fn dispose(&mut self) -> MediaResult<()> {
        self.cancel_auto_stop();
        self.current = None;
        let Some(output) = self.output.take() else {
            return Ok(());
        };
        let result = output.lock().await.dispose().await;
        result
    }
}
