//! In-memory collaborators for unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::models::audio_models::{CaptureDeviceInfo, CaptureFormat, MediaSource};
use crate::models::error::{MediaError, MediaResult};
use crate::traits::capture_device::{CaptureDevice, CaptureDeviceFactory, FrameCallback};
use crate::traits::platform::{PermissionProvider, SessionConfigurator};
use crate::traits::playback::{AudioOutput, AudioOutputFactory, VideoDecoderFactory, VideoHandle};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Yield to background tasks until `done` holds, failing after two seconds.
pub async fn wait_until(mut done: impl FnMut() -> bool) {
    let polled = tokio::time::timeout(Duration::from_secs(2), async {
        while !done() {
            tokio::task::yield_now().await;
        }
    })
    .await;
    assert!(polled.is_ok(), "condition not reached in time");
}

/// Ordered record of collaborator calls shared between fakes.
#[derive(Default)]
pub struct EventLog {
    events: Mutex<Vec<String>>,
}

impl EventLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.events.lock().iter().position(|e| e == event)
    }
}

// --- capture -------------------------------------------------------------

/// Observable state of the fake hardware; the test drives the callback.
#[derive(Default)]
pub struct DeviceProbe {
    callback: Mutex<Option<FrameCallback>>,
    running: AtomicBool,
    paused: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
    pauses: AtomicUsize,
    resumes: AtomicUsize,
}

impl DeviceProbe {
    /// Deliver a driver buffer. Returns false if the hardware is not streaming.
    pub fn emit(&self, samples: &[f32], sample_rate: u32, channels: u16) -> bool {
        if !self.running.load(Ordering::SeqCst) || self.paused.load(Ordering::SeqCst) {
            return false;
        }
        let callback = self.callback.lock().clone();
        match callback {
            Some(cb) => {
                cb(samples, sample_rate, channels);
                true
            }
            None => false,
        }
    }

    /// Deliver `frames` mono samples of a constant value at 44.1 kHz.
    pub fn emit_constant(&self, value: f32, frames: usize) -> bool {
        self.emit(&vec![value; frames], 44100, 1)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn pauses(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }

    pub fn resumes(&self) -> usize {
        self.resumes.load(Ordering::SeqCst)
    }
}

struct FakeCaptureDevice {
    probe: Arc<DeviceProbe>,
    open_delay: Duration,
    stop_delay: Duration,
}

impl CaptureDevice for FakeCaptureDevice {
    fn start(&mut self, callback: FrameCallback) -> MediaResult<()> {
        if !self.open_delay.is_zero() {
            std::thread::sleep(self.open_delay);
        }
        *self.probe.callback.lock() = Some(callback);
        self.probe.paused.store(false, Ordering::SeqCst);
        self.probe.running.store(true, Ordering::SeqCst);
        self.probe.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&mut self) -> MediaResult<()> {
        self.probe.paused.store(true, Ordering::SeqCst);
        self.probe.pauses.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn resume(&mut self) -> MediaResult<()> {
        self.probe.paused.store(false, Ordering::SeqCst);
        self.probe.resumes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) -> MediaResult<()> {
        if !self.stop_delay.is_zero() {
            std::thread::sleep(self.stop_delay);
        }
        self.probe.running.store(false, Ordering::SeqCst);
        *self.probe.callback.lock() = None;
        self.probe.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn device_info(&self) -> CaptureDeviceInfo {
        CaptureDeviceInfo {
            id: "fake-mic".into(),
            name: "Fake Microphone".into(),
            is_default: true,
        }
    }
}

pub struct FakeCaptureFactory {
    available: bool,
    open_delay: Duration,
    stop_delay: Duration,
    created: AtomicUsize,
    probe: Arc<DeviceProbe>,
    log: Option<Arc<EventLog>>,
}

impl FakeCaptureFactory {
    pub fn new() -> Arc<Self> {
        Self::build(true, Duration::ZERO, Duration::ZERO, None)
    }

    pub fn unavailable() -> Arc<Self> {
        Self::build(false, Duration::ZERO, Duration::ZERO, None)
    }

    /// Simulates a driver that takes `delay` to acquire the device.
    pub fn with_open_delay(delay: Duration) -> Arc<Self> {
        Self::build(true, delay, Duration::ZERO, None)
    }

    pub fn with_log(log: Arc<EventLog>) -> Arc<Self> {
        Self::build(true, Duration::ZERO, Duration::ZERO, Some(log))
    }

    /// Device whose `stop` blocks the calling thread for `delay`.
    pub fn with_stop_delay(delay: Duration) -> Arc<Self> {
        Self::build(true, Duration::ZERO, delay, None)
    }

    fn build(
        available: bool,
        open_delay: Duration,
        stop_delay: Duration,
        log: Option<Arc<EventLog>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            available,
            open_delay,
            stop_delay,
            created: AtomicUsize::new(0),
            probe: Arc::new(DeviceProbe::default()),
            log,
        })
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn probe(&self) -> Arc<DeviceProbe> {
        Arc::clone(&self.probe)
    }
}

impl Drop for FakeCaptureDevice {
    fn drop(&mut self) {
        self.probe.running.store(false, Ordering::SeqCst);
        *self.probe.callback.lock() = None;
    }
}

impl CaptureDeviceFactory for FakeCaptureFactory {
    fn is_available(&self) -> bool {
        self.available
    }

    fn create(&self, _format: &CaptureFormat) -> MediaResult<Box<dyn CaptureDevice>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.log {
            log.push("capture:create");
        }
        Ok(Box::new(FakeCaptureDevice {
            probe: Arc::clone(&self.probe),
            open_delay: self.open_delay,
            stop_delay: self.stop_delay,
        }))
    }
}

pub struct FakePermissions {
    granted: bool,
}

impl FakePermissions {
    pub fn new(granted: bool) -> Self {
        Self { granted }
    }
}

#[async_trait]
impl PermissionProvider for FakePermissions {
    async fn has_capture_permission(&self) -> bool {
        self.granted
    }
}

// --- session configuration -----------------------------------------------

pub struct FakeSessionConfig {
    log: Arc<EventLog>,
    fail: bool,
    delay: Duration,
    configured: AtomicUsize,
    disposed: AtomicUsize,
}

impl FakeSessionConfig {
    pub fn new(log: Arc<EventLog>) -> Arc<Self> {
        Self::build(log, false, Duration::ZERO)
    }

    pub fn failing(log: Arc<EventLog>) -> Arc<Self> {
        Self::build(log, true, Duration::ZERO)
    }

    /// Configuration that suspends for `delay` before completing.
    pub fn slow(log: Arc<EventLog>, delay: Duration) -> Arc<Self> {
        Self::build(log, false, delay)
    }

    fn build(log: Arc<EventLog>, fail: bool, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            log,
            fail,
            delay,
            configured: AtomicUsize::new(0),
            disposed: AtomicUsize::new(0),
        })
    }

    pub fn configured(&self) -> usize {
        self.configured.load(Ordering::SeqCst)
    }

    pub fn disposed(&self) -> usize {
        self.disposed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionConfigurator for FakeSessionConfig {
    async fn configure(&self) -> MediaResult<()> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(MediaError::SessionConfiguration("route unavailable".into()));
        }
        self.configured.fetch_add(1, Ordering::SeqCst);
        self.log.push("session:configured");
        Ok(())
    }

    async fn dispose(&self) -> MediaResult<()> {
        self.disposed.fetch_add(1, Ordering::SeqCst);
        self.log.push("session:disposed");
        Ok(())
    }
}

// --- audio output --------------------------------------------------------

#[derive(Default)]
pub struct AudioProbe {
    loaded: Mutex<Option<MediaSource>>,
    failing: Mutex<Vec<MediaSource>>,
    playing: AtomicBool,
    loads: AtomicUsize,
    stops: AtomicUsize,
    pauses: AtomicUsize,
    disposed: AtomicBool,
    volume: Mutex<f32>,
}

impl AudioProbe {
    pub fn fail_loads_for(&self, source: MediaSource) {
        self.failing.lock().push(source);
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    pub fn loaded(&self) -> Option<MediaSource> {
        self.loaded.lock().clone()
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn pauses(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn volume(&self) -> f32 {
        *self.volume.lock()
    }
}

struct FakeAudioOutput {
    probe: Arc<AudioProbe>,
}

#[async_trait]
impl AudioOutput for FakeAudioOutput {
    async fn load(&mut self, source: &MediaSource) -> MediaResult<()> {
        self.probe.loads.fetch_add(1, Ordering::SeqCst);
        if self.probe.failing.lock().contains(source) {
            return Err(MediaError::Source(format!("unreachable: {}", source)));
        }
        // Loading suspends like a real fetch would.
        tokio::task::yield_now().await;
        self.probe.playing.store(false, Ordering::SeqCst);
        *self.probe.loaded.lock() = Some(source.clone());
        Ok(())
    }

    async fn play(&mut self) -> MediaResult<()> {
        if self.probe.loaded.lock().is_none() {
            return Err(MediaError::Source("nothing loaded".into()));
        }
        self.probe.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn pause(&mut self) -> MediaResult<()> {
        self.probe.pauses.fetch_add(1, Ordering::SeqCst);
        self.probe.playing.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&mut self) -> MediaResult<()> {
        self.probe.stops.fetch_add(1, Ordering::SeqCst);
        self.probe.playing.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn set_volume(&mut self, level: f32) -> MediaResult<()> {
        *self.probe.volume.lock() = level;
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.probe.is_playing()
    }

    async fn dispose(&mut self) -> MediaResult<()> {
        self.probe.playing.store(false, Ordering::SeqCst);
        self.probe.disposed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeAudioFactory {
    probe: Arc<AudioProbe>,
    fail_create: bool,
}

impl FakeAudioFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            probe: Arc::new(AudioProbe::default()),
            fail_create: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            probe: Arc::new(AudioProbe::default()),
            fail_create: true,
        })
    }

    pub fn probe(&self) -> Arc<AudioProbe> {
        Arc::clone(&self.probe)
    }
}

#[async_trait]
impl AudioOutputFactory for FakeAudioFactory {
    async fn create(&self) -> MediaResult<Box<dyn AudioOutput>> {
        if self.fail_create {
            return Err(MediaError::Device("no output route".into()));
        }
        Ok(Box::new(FakeAudioOutput {
            probe: Arc::clone(&self.probe),
        }))
    }
}

// --- video ---------------------------------------------------------------

pub struct VideoProbe {
    pub source: MediaSource,
    playing: AtomicBool,
    initialized: AtomicBool,
    disposed: AtomicBool,
    volume: Mutex<f32>,
    position: Mutex<Duration>,
    seeks: AtomicUsize,
}

impl VideoProbe {
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn volume(&self) -> f32 {
        *self.volume.lock()
    }

    pub fn position(&self) -> Duration {
        *self.position.lock()
    }

    pub fn seeks(&self) -> usize {
        self.seeks.load(Ordering::SeqCst)
    }
}

struct FakeVideoHandle {
    probe: Arc<VideoProbe>,
    fail_init: bool,
    log: Arc<EventLog>,
}

#[async_trait]
impl VideoHandle for FakeVideoHandle {
    async fn initialize(&mut self) -> MediaResult<()> {
        tokio::task::yield_now().await;
        if self.fail_init {
            return Err(MediaError::Decode(format!("malformed media: {}", self.probe.source)));
        }
        self.probe.initialized.store(true, Ordering::SeqCst);
        self.log.push(format!("video:init:{}", self.probe.source));
        Ok(())
    }

    async fn play(&mut self) -> MediaResult<()> {
        self.probe.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn pause(&mut self) -> MediaResult<()> {
        self.probe.playing.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn seek(&mut self, position: Duration) -> MediaResult<()> {
        *self.probe.position.lock() = position;
        self.probe.seeks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn set_volume(&mut self, level: f32) -> MediaResult<()> {
        *self.probe.volume.lock() = level;
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.probe.is_playing()
    }

    async fn dispose(&mut self) -> MediaResult<()> {
        self.probe.playing.store(false, Ordering::SeqCst);
        self.probe.disposed.store(true, Ordering::SeqCst);
        self.log.push(format!("video:dispose:{}", self.probe.source));
        Ok(())
    }
}

pub struct FakeVideoFactory {
    log: Arc<EventLog>,
    handles: Mutex<Vec<Arc<VideoProbe>>>,
    failing: Mutex<Vec<MediaSource>>,
}

impl FakeVideoFactory {
    pub fn new(log: Arc<EventLog>) -> Arc<Self> {
        Arc::new(Self {
            log,
            handles: Mutex::new(Vec::new()),
            failing: Mutex::new(Vec::new()),
        })
    }

    pub fn fail_init_for(&self, source: MediaSource) {
        self.failing.lock().push(source);
    }

    pub fn created(&self) -> usize {
        self.handles.lock().len()
    }

    /// Handles created and not yet disposed.
    pub fn live(&self) -> usize {
        self.handles.lock().iter().filter(|h| !h.is_disposed()).count()
    }

    pub fn latest(&self) -> Option<Arc<VideoProbe>> {
        self.handles.lock().last().cloned()
    }
}

impl VideoDecoderFactory for FakeVideoFactory {
    fn create(&self, source: &MediaSource) -> Box<dyn VideoHandle> {
        let probe = Arc::new(VideoProbe {
            source: source.clone(),
            playing: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            volume: Mutex::new(1.0),
            position: Mutex::new(Duration::ZERO),
            seeks: AtomicUsize::new(0),
        });
        self.handles.lock().push(Arc::clone(&probe));
        self.log.push(format!("video:create:{}", source));
        Box::new(FakeVideoHandle {
            probe,
            fail_init: self.failing.lock().contains(source),
            log: Arc::clone(&self.log),
        })
    }
}
