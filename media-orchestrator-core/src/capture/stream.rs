use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::models::audio_models::{AudioFrame, CaptureDeviceInfo, CaptureDiagnostics, CaptureFormat};
use crate::models::error::{MediaError, MediaResult};
use crate::models::state::CaptureStreamState;
use crate::processing::converter::InputConverter;
use crate::traits::capture_device::{CaptureDevice, CaptureDeviceFactory, FrameCallback};
use crate::traits::platform::PermissionProvider;

/// Sender slot shared with the driver callback. Emptying it ends the frame
/// sequence even if the device keeps the callback alive.
type FrameSender = Arc<Mutex<Option<broadcast::Sender<AudioFrame>>>>;

/// Long-lived microphone stream for the keep-alive pattern.
///
/// The device handle is acquired once by [`open`](Self::open) and held until
/// [`close`](Self::close). Between takes it is only paused, so
/// [`resume`](Self::resume) never pays the device startup cost.
///
/// ```text
/// [driver thread] → FrameCallback → InputConverter → broadcast ─┬→ FrameSubscription
///                                                               └→ FrameSubscription
/// ```
pub struct CaptureStream {
    factory: Arc<dyn CaptureDeviceFactory>,
    permissions: Arc<dyn PermissionProvider>,
    format: CaptureFormat,
    channel_capacity: usize,
    device: Option<Box<dyn CaptureDevice>>,
    state: CaptureStreamState,
    sender: FrameSender,
    diagnostics: Arc<Mutex<CaptureDiagnostics>>,
    next_sequence: Arc<AtomicU64>,
    open_latency: Option<Duration>,
}

impl CaptureStream {
    pub fn new(
        factory: Arc<dyn CaptureDeviceFactory>,
        permissions: Arc<dyn PermissionProvider>,
        format: CaptureFormat,
        channel_capacity: usize,
        diagnostics: Arc<Mutex<CaptureDiagnostics>>,
    ) -> Self {
        Self {
            factory,
            permissions,
            format,
            channel_capacity,
            device: None,
            state: CaptureStreamState::Uninitialized,
            sender: Arc::new(Mutex::new(None)),
            diagnostics,
            next_sequence: Arc::new(AtomicU64::new(0)),
            open_latency: None,
        }
    }

    pub fn state(&self) -> CaptureStreamState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    /// Time the last `open()` spent acquiring and starting the device.
    pub fn open_latency(&self) -> Option<Duration> {
        self.open_latency
    }

    /// Sequence number the next delivered frame will carry.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence.load(Ordering::SeqCst)
    }

    pub fn device_info(&self) -> Option<CaptureDeviceInfo> {
        self.device.as_ref().map(|d| d.device_info())
    }

    /// Acquire the device, start the frame sequence, and park it paused.
    pub async fn open(&mut self) -> MediaResult<()> {
        if self.device.is_some() {
            log::warn!("capture stream already open; ignoring open()");
            return Ok(());
        }

        if !self.permissions.has_capture_permission().await {
            return Err(MediaError::PermissionDenied);
        }
        if !self.factory.is_available() {
            return Err(MediaError::DeviceNotAvailable);
        }

        let (tx, _) = broadcast::channel(self.channel_capacity);
        *self.sender.lock() = Some(tx);
        self.next_sequence = Arc::new(AtomicU64::new(0));

        let callback = frame_callback(
            Arc::clone(&self.sender),
            Arc::clone(&self.next_sequence),
            InputConverter::new(self.format),
            Arc::clone(&self.diagnostics),
            Instant::now(),
        );

        let started = Instant::now();
        let factory = Arc::clone(&self.factory);
        let format = self.format;
        let opened = tokio::task::spawn_blocking(move || -> MediaResult<Box<dyn CaptureDevice>> {
            let mut device = factory.create(&format)?;
            device.start(callback)?;
            if let Err(e) = device.pause() {
                let _ = device.stop();
                return Err(e);
            }
            Ok(device)
        })
        .await
        .map_err(|e| MediaError::Unknown(format!("capture open task failed: {}", e)))
        .and_then(|result| result);

        let device = match opened {
            Ok(device) => device,
            Err(e) => {
                *self.sender.lock() = None;
                return Err(e);
            }
        };

        let latency = started.elapsed();
        log::info!(
            "capture stream open on '{}' in {:.1} ms",
            device.device_info().name,
            latency.as_secs_f64() * 1000.0
        );

        self.device = Some(device);
        self.open_latency = Some(latency);
        self.state = CaptureStreamState::Paused;
        Ok(())
    }

    /// Suspend hardware streaming. No-op without a handle.
    pub fn pause(&mut self) -> MediaResult<()> {
        let Some(device) = self.device.as_mut() else {
            return Ok(());
        };
        if self.state == CaptureStreamState::Paused {
            return Ok(());
        }
        device.pause()?;
        self.state = CaptureStreamState::Paused;
        Ok(())
    }

    /// Resume hardware streaming on the held handle. No-op without a handle.
    pub fn resume(&mut self) -> MediaResult<()> {
        let Some(device) = self.device.as_mut() else {
            return Ok(());
        };
        if self.state == CaptureStreamState::Active {
            return Ok(());
        }
        device.resume()?;
        self.state = CaptureStreamState::Active;
        Ok(())
    }

    /// Subscribe to the frame sequence. Subscribing does not touch the device.
    pub fn frames(&self) -> MediaResult<FrameSubscription> {
        let sender = self.sender.lock();
        let tx = sender.as_ref().ok_or(MediaError::NotInitialized)?;
        Ok(FrameSubscription {
            rx: tx.subscribe(),
            diagnostics: Arc::clone(&self.diagnostics),
        })
    }

    /// Stop streaming, release the handle and end every subscription.
    ///
    /// Device teardown can block on the driver, so it runs on the blocking
    /// pool like [`open`](Self::open).
    pub async fn close(&mut self) -> MediaResult<()> {
        *self.sender.lock() = None;
        let Some(mut device) = self.device.take() else {
            return Ok(());
        };
        self.state = CaptureStreamState::Disposed;
        tokio::task::spawn_blocking(move || device.stop())
            .await
            .map_err(|e| MediaError::Unknown(format!("capture close task failed: {}", e)))??;
        log::info!("capture stream closed");
        Ok(())
    }
}

fn frame_callback(
    sender: FrameSender,
    sequence: Arc<AtomicU64>,
    converter: InputConverter,
    diagnostics: Arc<Mutex<CaptureDiagnostics>>,
    opened_at: Instant,
) -> FrameCallback {
    let converter = Mutex::new(converter);
    Arc::new(move |samples: &[f32], sample_rate: u32, channels: u16| {
        if samples.is_empty() {
            return;
        }
        let (converted, pcm) = converter.lock().convert(samples, sample_rate, channels);
        if pcm.is_empty() {
            return;
        }

        let frame = AudioFrame {
            sequence: sequence.fetch_add(1, Ordering::SeqCst),
            timestamp: opened_at.elapsed(),
            rms: InputConverter::rms_level(&converted),
            peak: InputConverter::peak_level(&converted),
            pcm: pcm.into(),
        };

        {
            let mut d = diagnostics.lock();
            d.frames_delivered += 1;
            d.samples_delivered += converted.len() as u64;
        }

        if let Some(tx) = sender.lock().as_ref() {
            // Err only means nobody is subscribed right now.
            let _ = tx.send(frame);
        }
    })
}

/// One consumer's view of the frame sequence.
pub struct FrameSubscription {
    rx: broadcast::Receiver<AudioFrame>,
    diagnostics: Arc<Mutex<CaptureDiagnostics>>,
}

impl FrameSubscription {
    /// Next frame in delivery order, or `None` once the stream is closed.
    pub async fn next(&mut self) -> Option<AudioFrame> {
        loop {
            match self.rx.recv().await {
                Ok(frame) => return Some(frame),
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("frame subscriber lagged; {} frames skipped", skipped);
                    self.diagnostics.lock().frames_lagged += skipped;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeCaptureFactory, FakePermissions};

    fn stream_with(factory: Arc<FakeCaptureFactory>, granted: bool) -> CaptureStream {
        CaptureStream::new(
            factory,
            Arc::new(FakePermissions::new(granted)),
            CaptureFormat::default(),
            64,
            Arc::new(Mutex::new(CaptureDiagnostics::default())),
        )
    }

    #[tokio::test]
    async fn open_parks_the_stream_paused() {
        let factory = FakeCaptureFactory::new();
        let mut stream = stream_with(Arc::clone(&factory), true);

        stream.open().await.unwrap();

        assert_eq!(stream.state(), CaptureStreamState::Paused);
        assert!(stream.open_latency().is_some());
        let probe = factory.probe();
        assert_eq!(probe.starts(), 1);
        assert!(probe.is_paused());
    }

    #[tokio::test]
    async fn open_twice_keeps_the_first_handle() {
        let factory = FakeCaptureFactory::new();
        let mut stream = stream_with(Arc::clone(&factory), true);

        stream.open().await.unwrap();
        stream.open().await.unwrap();

        assert_eq!(factory.created(), 1);
    }

    #[tokio::test]
    async fn open_without_permission_is_a_device_error() {
        let factory = FakeCaptureFactory::new();
        let mut stream = stream_with(Arc::clone(&factory), false);

        let err = stream.open().await.unwrap_err();

        assert_eq!(err, MediaError::PermissionDenied);
        assert!(err.is_device_error());
        assert_eq!(factory.created(), 0);
        assert_eq!(stream.state(), CaptureStreamState::Uninitialized);
    }

    #[tokio::test]
    async fn open_with_missing_device_fails() {
        let factory = FakeCaptureFactory::unavailable();
        let mut stream = stream_with(factory, true);

        assert_eq!(stream.open().await.unwrap_err(), MediaError::DeviceNotAvailable);
        assert!(stream.frames().is_err());
    }

    #[tokio::test]
    async fn pause_and_resume_never_reacquire_the_device() {
        let factory = FakeCaptureFactory::new();
        let mut stream = stream_with(Arc::clone(&factory), true);
        stream.open().await.unwrap();

        for _ in 0..3 {
            stream.resume().unwrap();
            assert_eq!(stream.state(), CaptureStreamState::Active);
            stream.pause().unwrap();
            assert_eq!(stream.state(), CaptureStreamState::Paused);
        }

        assert_eq!(factory.created(), 1);
        assert_eq!(factory.probe().starts(), 1);
        assert_eq!(factory.probe().stops(), 0);
    }

    #[tokio::test]
    async fn pause_and_resume_without_handle_are_noops() {
        let mut stream = stream_with(FakeCaptureFactory::new(), true);
        assert!(stream.pause().is_ok());
        assert!(stream.resume().is_ok());
        assert_eq!(stream.state(), CaptureStreamState::Uninitialized);
    }

    #[tokio::test]
    async fn frames_arrive_converted_and_in_order() {
        let factory = FakeCaptureFactory::new();
        let mut stream = stream_with(Arc::clone(&factory), true);
        stream.open().await.unwrap();
        stream.resume().unwrap();
        let mut frames = stream.frames().unwrap();

        let probe = factory.probe();
        assert!(probe.emit(&[0.5; 441], 44100, 1));
        assert!(probe.emit(&[0.25; 882], 44100, 2));

        let first = frames.next().await.unwrap();
        let second = frames.next().await.unwrap();
        assert_eq!(first.sequence, 0);
        assert_eq!(second.sequence, 1);
        assert_eq!(first.byte_len(), 441 * 2);
        assert_eq!(second.byte_len(), 441 * 2);
        assert!((first.peak - 0.5).abs() < 1e-6);
        assert!(second.timestamp >= first.timestamp);
        assert_eq!(stream.next_sequence(), 2);
    }

    #[tokio::test]
    async fn close_ends_the_sequence_and_releases_the_handle() {
        let factory = FakeCaptureFactory::new();
        let mut stream = stream_with(Arc::clone(&factory), true);
        stream.open().await.unwrap();
        let mut frames = stream.frames().unwrap();

        stream.close().await.unwrap();

        assert!(frames.next().await.is_none());
        assert_eq!(stream.state(), CaptureStreamState::Disposed);
        assert_eq!(factory.probe().stops(), 1);
        assert!(stream.frames().is_err());

        assert!(!factory.probe().emit(&[0.1; 64], 44100, 1));
    }

    #[tokio::test]
    async fn slow_device_teardown_leaves_the_runtime_free() {
        let factory = FakeCaptureFactory::with_stop_delay(Duration::from_millis(150));
        let mut stream = stream_with(Arc::clone(&factory), true);
        stream.open().await.unwrap();

        let started = Instant::now();
        let (closed, ticked_after) = tokio::join!(stream.close(), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            started.elapsed()
        });

        closed.unwrap();
        assert!(ticked_after < Duration::from_millis(120));
        assert_eq!(factory.probe().stops(), 1);
        assert_eq!(stream.state(), CaptureStreamState::Disposed);
    }

    #[tokio::test]
    async fn reopen_after_close_starts_a_new_sequence() {
        let factory = FakeCaptureFactory::new();
        let mut stream = stream_with(Arc::clone(&factory), true);
        stream.open().await.unwrap();
        stream.close().await.unwrap();

        stream.open().await.unwrap();
        stream.resume().unwrap();
        let mut frames = stream.frames().unwrap();
        assert!(factory.probe().emit(&[0.1; 64], 44100, 1));

        assert_eq!(frames.next().await.unwrap().sequence, 0);
        assert_eq!(factory.created(), 2);
        assert_eq!(stream.state(), CaptureStreamState::Active);
    }

    #[tokio::test]
    async fn paused_hardware_delivers_nothing() {
        let factory = FakeCaptureFactory::new();
        let mut stream = stream_with(Arc::clone(&factory), true);
        stream.open().await.unwrap();

        assert!(!factory.probe().emit(&[0.1; 64], 44100, 1));
        assert_eq!(stream.diagnostics.lock().frames_delivered, 0);
    }
}
