use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::models::audio_models::{CaptureDiagnostics, MediaSource};
use crate::models::config::OrchestratorConfig;
use crate::models::error::{MediaError, MediaResult};
use crate::models::recording_result::RecordingResult;
use crate::models::state::OrchestratorState;
use crate::session::audio_playback::AudioPlaybackSession;
use crate::session::recording::RecordingSession;
use crate::session::video_playback::VideoPlaybackSession;
use crate::traits::capture_device::CaptureDeviceFactory;
use crate::traits::media_delegate::MediaDelegate;
use crate::traits::platform::{PermissionProvider, SessionConfigurator};
use crate::traits::playback::{AudioOutputFactory, VideoDecoderFactory};

/// Platform collaborators handed to the orchestrator at construction.
#[derive(Clone)]
pub struct MediaBackend {
    pub session: Arc<dyn SessionConfigurator>,
    pub permissions: Arc<dyn PermissionProvider>,
    pub capture: Arc<dyn CaptureDeviceFactory>,
    pub audio_output: Arc<dyn AudioOutputFactory>,
    pub video: Arc<dyn VideoDecoderFactory>,
}

struct Sessions {
    recording: RecordingSession,
    audio: AudioPlaybackSession,
    video: VideoPlaybackSession,
}

/// Coordinates recording, audio playback and video playback.
///
/// The orchestrator is the only component that crosses sessions. It enforces
/// media exclusion: video pauses audio, recording pauses both.
///
/// ```text
/// initialize:  session.configure() ──→ ┬─ recording.initialize()  (opens mic, parks paused)
///                                      ├─ audio.initialize()
///                                      └─ video.initialize()
/// ```
pub struct MediaOrchestrator {
    backend: MediaBackend,
    config: OrchestratorConfig,
    state: OrchestratorState,
    sessions: Option<Sessions>,
    delegate: Option<Arc<dyn MediaDelegate>>,
}

impl MediaOrchestrator {
    pub fn new(backend: MediaBackend, config: OrchestratorConfig) -> Self {
        Self {
            backend,
            config,
            state: OrchestratorState::Uninitialized,
            sessions: None,
            delegate: None,
        }
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn MediaDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    fn set_state(&mut self, state: OrchestratorState) {
        if self.state == state {
            return;
        }
        log::debug!("orchestrator state {:?} -> {:?}", self.state, state);
        self.state = state;
        if let Some(delegate) = &self.delegate {
            delegate.on_state_changed(state);
        }
    }

    fn report<T>(&self, result: MediaResult<T>) -> MediaResult<T> {
        if let Err(e) = &result {
            log::error!("media operation failed: {}", e);
            if let Some(delegate) = &self.delegate {
                delegate.on_error(e);
            }
        }
        result
    }

    fn ready(&mut self) -> MediaResult<&mut Sessions> {
        if !self.state.is_ready() {
            return Err(MediaError::NotInitialized);
        }
        self.sessions.as_mut().ok_or(MediaError::NotInitialized)
    }

    /// Configure the platform session, then bring up all three sessions
    /// concurrently. On failure nothing is retained and the orchestrator
    /// stays uninitialized.
    pub async fn initialize(&mut self) -> MediaResult<()> {
        if self.state.is_ready() {
            return self.report(Err(MediaError::AlreadyInitialized));
        }
        if let Err(reason) = self.config.validate() {
            return self.report(Err(MediaError::ConfigurationFailed(reason)));
        }

        self.set_state(OrchestratorState::Initializing);
        match self.bring_up().await {
            Ok(sessions) => {
                if let Some(latency) = sessions.recording.open_latency() {
                    log::info!(
                        "media orchestrator ready (capture cold open {:.1} ms)",
                        latency.as_secs_f64() * 1000.0
                    );
                }
                self.sessions = Some(sessions);
                self.set_state(OrchestratorState::Ready);
                Ok(())
            }
            Err(e) => {
                self.set_state(OrchestratorState::Uninitialized);
                self.report(Err(e))
            }
        }
    }

    async fn bring_up(&self) -> MediaResult<Sessions> {
        self.backend.session.configure().await?;

        let mut sessions = Sessions {
            recording: RecordingSession::new(
                self.config.clone(),
                Arc::clone(&self.backend.capture),
                Arc::clone(&self.backend.permissions),
            ),
            audio: AudioPlaybackSession::new(Arc::clone(&self.backend.audio_output)),
            video: VideoPlaybackSession::new(
                Arc::clone(&self.backend.video),
                self.config.video_full_volume,
            ),
        };

        let started = tokio::try_join!(
            sessions.recording.initialize(),
            sessions.audio.initialize(),
            sessions.video.initialize(),
        );
        if let Err(e) = started {
            let (recording, audio, video) = tokio::join!(
                sessions.recording.dispose(),
                sessions.audio.dispose(),
                sessions.video.dispose(),
            );
            let session = self.backend.session.dispose().await;
            for cleanup in [recording, audio, video, session] {
                if let Err(cleanup_err) = cleanup {
                    log::warn!("cleanup after failed initialize: {}", cleanup_err);
                }
            }
            return Err(e);
        }
        Ok(sessions)
    }

    /// Play a URL (or path), stopping it after `max_duration`. Video and
    /// recording are left alone.
    pub async fn play_audio_url<F>(
        &mut self,
        url: &str,
        max_duration: Duration,
        on_started: F,
    ) -> MediaResult<()>
    where
        F: FnOnce(Duration) + Send,
    {
        let result: MediaResult<()> = async {
            let sessions = self.ready()?;
            sessions.audio.play_from_url(url, max_duration, on_started).await
        }
        .await;
        self.report(result)
    }

    pub async fn play_audio_file(&mut self, path: impl AsRef<Path>) -> MediaResult<()> {
        let result: MediaResult<()> = async {
            let sessions = self.ready()?;
            sessions.audio.play_from_file(path.as_ref()).await
        }
        .await;
        self.report(result)
    }

    /// Pause audio, then play `url` on the video session.
    pub async fn play_video(&mut self, url: &str, muted: bool) -> MediaResult<()> {
        let source = MediaSource::parse(url);
        let result: MediaResult<()> = async {
            let sessions = self.ready()?;
            sessions.audio.pause().await?;
            sessions.video.play(&source, muted).await
        }
        .await;
        self.report(result)
    }

    /// Pause audio and video, then start a take. Returns the resume latency.
    pub async fn start_recording(&mut self) -> MediaResult<Duration> {
        let result: MediaResult<Duration> = async {
            let sessions = self.ready()?;
            sessions.audio.pause().await?;
            sessions.video.pause().await?;
            sessions.recording.start_capture()
        }
        .await;
        self.report(result)
    }

    /// Finish the active take. Paused playback is not resumed.
    pub async fn stop_recording(&mut self) -> MediaResult<Option<RecordingResult>> {
        let result: MediaResult<Option<RecordingResult>> = async {
            let sessions = self.ready()?;
            sessions.recording.stop_capture().await
        }
        .await;

        if let (Ok(Some(take)), Some(delegate)) = (&result, &self.delegate) {
            delegate.on_take_finished(take);
        }
        self.report(result)
    }

    /// Stop audio and video together. An active take keeps recording.
    pub async fn stop_all(&mut self) -> MediaResult<()> {
        let result: MediaResult<()> = async {
            let sessions = self.ready()?;
            let (audio, video) = tokio::join!(sessions.audio.stop(), sessions.video.stop());
            audio.and(video)
        }
        .await;
        self.report(result)
    }

    /// Release every handle and return to uninitialized. Safe to call at any
    /// time, including before `initialize`.
    pub async fn dispose(&mut self) {
        let Some(mut sessions) = self.sessions.take() else {
            self.set_state(OrchestratorState::Uninitialized);
            return;
        };

        let (recording, audio, video, session) = tokio::join!(
            sessions.recording.dispose(),
            sessions.audio.dispose(),
            sessions.video.dispose(),
            self.backend.session.dispose(),
        );
        self.set_state(OrchestratorState::Uninitialized);

        for result in [recording, audio, video, session] {
            if let Err(e) = result {
                log::warn!("dispose: {}", e);
                if let Some(delegate) = &self.delegate {
                    delegate.on_error(&e);
                }
            }
        }
        log::info!("media orchestrator disposed");
    }

    pub async fn pause_audio(&mut self) -> MediaResult<()> {
        let result: MediaResult<()> = async { self.ready()?.audio.pause().await }.await;
        self.report(result)
    }

    pub async fn resume_audio(&mut self) -> MediaResult<()> {
        let result: MediaResult<()> = async { self.ready()?.audio.resume().await }.await;
        self.report(result)
    }

    pub async fn stop_audio(&mut self) -> MediaResult<()> {
        let result: MediaResult<()> = async { self.ready()?.audio.stop().await }.await;
        self.report(result)
    }

    pub async fn pause_video(&mut self) -> MediaResult<()> {
        let result: MediaResult<()> = async { self.ready()?.video.pause().await }.await;
        self.report(result)
    }

    /// Continue video from where it was paused. Audio is paused first.
    pub async fn resume_video(&mut self) -> MediaResult<()> {
        let result: MediaResult<()> = async {
            let sessions = self.ready()?;
            sessions.audio.pause().await?;
            sessions.video.resume().await
        }
        .await;
        self.report(result)
    }

    pub async fn stop_video(&mut self) -> MediaResult<()> {
        let result: MediaResult<()> = async { self.ready()?.video.stop().await }.await;
        self.report(result)
    }

    pub async fn set_video_volume(&mut self, level: f32) -> MediaResult<()> {
        let result: MediaResult<()> = async { self.ready()?.video.set_volume(level).await }.await;
        self.report(result)
    }

    pub async fn is_audio_playing(&self) -> bool {
        match &self.sessions {
            Some(sessions) => sessions.audio.is_playing().await,
            None => false,
        }
    }

    pub fn is_video_playing(&self) -> bool {
        self.sessions.as_ref().is_some_and(|s| s.video.is_playing())
    }

    pub fn is_recording(&self) -> bool {
        self.sessions.as_ref().is_some_and(|s| s.recording.is_capturing())
    }

    pub fn current_audio_source(&self) -> Option<&MediaSource> {
        self.sessions.as_ref()?.audio.current_source()
    }

    pub fn current_video_source(&self) -> Option<&MediaSource> {
        self.sessions.as_ref()?.video.current_source()
    }

    /// Takes saved since `initialize`, oldest first.
    pub fn recordings(&self) -> &[RecordingResult] {
        match &self.sessions {
            Some(sessions) => sessions.recording.recordings(),
            None => &[],
        }
    }

    pub fn latest_recording(&self) -> Option<&RecordingResult> {
        self.sessions.as_ref()?.recording.latest_recording()
    }

    pub fn diagnostics(&self) -> Option<CaptureDiagnostics> {
        self.sessions.as_ref().map(|s| s.recording.diagnostics())
    }

    /// How long `initialize` spent opening the capture device.
    pub fn cold_open_latency(&self) -> Option<Duration> {
        self.sessions.as_ref()?.recording.open_latency()
    }

    /// Handles the video session has created since `initialize`.
    pub fn video_handles_created(&self) -> usize {
        self.sessions.as_ref().map_or(0, |s| s.video.handles_created())
    }
}
