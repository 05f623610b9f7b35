use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::capture::stream::{CaptureStream, FrameSubscription};
use crate::models::audio_models::{AudioFrame, CaptureDiagnostics};
use crate::models::config::OrchestratorConfig;
use crate::models::error::{MediaError, MediaResult};
use crate::models::recording_result::{RecordingMetadata, RecordingResult};
use crate::models::state::CaptureStreamState;
use crate::storage::metadata;
use crate::storage::take_writer::TakeWriter;
use crate::traits::capture_device::CaptureDeviceFactory;
use crate::traits::platform::PermissionProvider;

/// Upper bound on how long stop waits for the retention task to catch up
/// with frames the driver delivered before the flag dropped.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Take state shared with the retention task. The flag and the chunks sit
/// behind one lock so a new take can never see a previous take's frames.
#[derive(Default)]
struct TakeBuffer {
    capturing: bool,
    take: u64,
    /// Frames with a lower sequence were delivered before this take began.
    first_sequence: u64,
    /// Set while a stopped take drains; frames from here on belong to no take.
    end_sequence: Option<u64>,
    chunks: Vec<AudioFrame>,
    started_at: Option<Instant>,
}

impl TakeBuffer {
    fn accepts(&self, sequence: u64) -> bool {
        if sequence < self.first_sequence {
            return false;
        }
        match self.end_sequence {
            Some(end) => sequence < end,
            None => self.capturing,
        }
    }
}

/// Keep-alive recorder built on a [`CaptureStream`].
///
/// The stream is opened once in [`initialize`](Self::initialize). A
/// background task drains the frame sequence and keeps a frame only while a
/// take is active, so starting a take is a resume plus a flag flip.
pub struct RecordingSession {
    config: OrchestratorConfig,
    stream: CaptureStream,
    buffer: Arc<Mutex<TakeBuffer>>,
    diagnostics: Arc<Mutex<CaptureDiagnostics>>,
    retention: Option<JoinHandle<()>>,
    /// One past the highest sequence the retention task has consumed.
    consumed: watch::Receiver<u64>,
    take_counter: u64,
    recordings: Vec<RecordingResult>,
}

impl RecordingSession {
    pub fn new(
        config: OrchestratorConfig,
        factory: Arc<dyn CaptureDeviceFactory>,
        permissions: Arc<dyn PermissionProvider>,
    ) -> Self {
        let diagnostics = Arc::new(Mutex::new(CaptureDiagnostics::default()));
        let stream = CaptureStream::new(
            factory,
            permissions,
            config.capture,
            config.frame_channel_capacity,
            Arc::clone(&diagnostics),
        );
        Self {
            config,
            stream,
            buffer: Arc::new(Mutex::new(TakeBuffer::default())),
            diagnostics,
            retention: None,
            consumed: watch::channel(0).1,
            take_counter: 0,
            recordings: Vec::new(),
        }
    }

    /// Open the capture stream (parked paused) and start the retention task.
    pub async fn initialize(&mut self) -> MediaResult<()> {
        if self.retention.is_some() {
            log::warn!("recording session already initialized");
            return Ok(());
        }

        self.stream.open().await?;
        let frames = match self.stream.frames() {
            Ok(frames) => frames,
            Err(e) => {
                let _ = self.stream.close().await;
                return Err(e);
            }
        };

        let (consumed_tx, consumed_rx) = watch::channel(self.stream.next_sequence());
        self.consumed = consumed_rx;
        self.retention = Some(tokio::spawn(retain_frames(
            frames,
            Arc::clone(&self.buffer),
            Arc::clone(&self.diagnostics),
            consumed_tx,
        )));
        Ok(())
    }

    /// Begin a take. Returns the time spent resuming the stream and raising
    /// the capture flag.
    pub fn start_capture(&mut self) -> MediaResult<Duration> {
        if !self.stream.is_open() {
            return Err(MediaError::NotInitialized);
        }
        if self.buffer.lock().capturing {
            return Err(MediaError::CaptureInProgress);
        }

        let take = self.take_counter + 1;
        let started = Instant::now();
        let first_sequence = self.stream.next_sequence();
        self.stream.resume()?;
        {
            let mut buffer = self.buffer.lock();
            buffer.chunks.clear();
            buffer.take = take;
            buffer.first_sequence = first_sequence;
            buffer.end_sequence = None;
            buffer.started_at = Some(started);
            buffer.capturing = true;
        }
        let latency = started.elapsed();

        self.take_counter = take;
        log::info!(
            "take {} started in {:.3} ms",
            take,
            latency.as_secs_f64() * 1000.0
        );
        Ok(latency)
    }

    /// End the active take and write it to disk.
    ///
    /// Every frame the driver delivered before this call is part of the take,
    /// including frames the retention task has not read yet. Frames delivered
    /// afterwards are not.
    ///
    /// `Ok(None)` when no take was active or the take captured nothing.
    pub async fn stop_capture(&mut self) -> MediaResult<Option<RecordingResult>> {
        let (take, end) = {
            let mut buffer = self.buffer.lock();
            if !buffer.capturing {
                log::warn!("stop requested with no capture in progress");
                return Ok(None);
            }
            let end = self.stream.next_sequence();
            buffer.capturing = false;
            buffer.end_sequence = Some(end);
            (buffer.take, end)
        };

        if self.config.pause_on_stop {
            if let Err(e) = self.stream.pause() {
                log::error!("failed to pause capture stream after take {}: {}", take, e);
            }
        }

        self.drain_until(end, take).await;
        let (chunks, started_at) = {
            let mut buffer = self.buffer.lock();
            buffer.end_sequence = None;
            (std::mem::take(&mut buffer.chunks), buffer.started_at.take())
        };

        if chunks.is_empty() {
            log::warn!("take {} captured no audio; no file written", take);
            return Ok(None);
        }

        let result = self.write_take(take, chunks).await?;
        if let Some(started_at) = started_at {
            log::info!(
                "take {} saved to {} ({:.2}s of audio, {:.2}s wall clock)",
                take,
                result.file_path.display(),
                result.duration_secs,
                started_at.elapsed().as_secs_f64()
            );
        }
        self.recordings.push(result.clone());
        Ok(Some(result))
    }

    /// Wait until the retention task has consumed every frame below `end`.
    async fn drain_until(&self, end: u64, take: u64) {
        let mut consumed = self.consumed.clone();
        let drained = matches!(
            tokio::time::timeout(DRAIN_TIMEOUT, consumed.wait_for(|&seen| seen >= end)).await,
            Ok(Ok(_))
        );
        if !drained {
            log::warn!(
                "take {}: frame queue did not drain up to sequence {}; saving what arrived",
                take,
                end
            );
        }
    }

    async fn write_take(
        &mut self,
        take: u64,
        chunks: Vec<AudioFrame>,
    ) -> MediaResult<RecordingResult> {
        let format = self.config.capture;
        let frame_count = chunks.len() as u64;
        let file_path = self.config.output_directory.join(TakeWriter::file_name(
            take,
            chrono::Utc::now().timestamp_millis(),
        ));

        let writer = TakeWriter::new(file_path.clone(), format);
        let written = tokio::task::spawn_blocking(move || {
            let mut payload = Vec::with_capacity(chunks.iter().map(AudioFrame::byte_len).sum());
            for chunk in &chunks {
                payload.extend_from_slice(&chunk.pcm);
            }
            writer.write(&payload)
        })
        .await
        .map_err(|e| MediaError::Unknown(format!("take writer task failed: {}", e)))??;

        let duration_secs = format.duration_of(written.payload_bytes).as_secs_f64();
        let meta = RecordingMetadata::new(
            take,
            &format,
            duration_secs,
            &file_path.to_string_lossy(),
            &written.checksum,
            frame_count,
        );

        if self.config.write_metadata_sidecar {
            metadata::write_metadata(&meta, &file_path)?;
        }

        {
            let mut d = self.diagnostics.lock();
            d.takes_completed += 1;
            d.bytes_written += written.file_size;
        }

        Ok(RecordingResult {
            file_path,
            take,
            duration_secs,
            payload_bytes: written.payload_bytes,
            checksum: written.checksum,
            metadata: meta,
        })
    }

    /// Close the stream and drop any in-flight take.
    pub async fn dispose(&mut self) -> MediaResult<()> {
        {
            let mut buffer = self.buffer.lock();
            buffer.capturing = false;
            buffer.end_sequence = None;
            buffer.chunks.clear();
        }

        let closed = self.stream.close().await;
        if let Some(task) = self.retention.take() {
            // Closing the stream ends the subscription, which ends the task.
            if let Err(e) = task.await {
                log::warn!("retention task ended abnormally: {}", e);
            }
        }
        self.recordings.clear();
        closed
    }

    pub fn is_capturing(&self) -> bool {
        self.buffer.lock().capturing
    }

    /// Number of takes started so far.
    pub fn take_count(&self) -> u64 {
        self.take_counter
    }

    /// Saved takes in creation order.
    pub fn recordings(&self) -> &[RecordingResult] {
        &self.recordings
    }

    pub fn latest_recording(&self) -> Option<&RecordingResult> {
        self.recordings.last()
    }

    pub fn output_directory(&self) -> &Path {
        &self.config.output_directory
    }

    pub fn diagnostics(&self) -> CaptureDiagnostics {
        self.diagnostics.lock().clone()
    }

    pub fn stream_state(&self) -> CaptureStreamState {
        self.stream.state()
    }

    /// Cold-open time of the capture stream.
    pub fn open_latency(&self) -> Option<Duration> {
        self.stream.open_latency()
    }
}

async fn retain_frames(
    mut frames: FrameSubscription,
    buffer: Arc<Mutex<TakeBuffer>>,
    diagnostics: Arc<Mutex<CaptureDiagnostics>>,
    consumed: watch::Sender<u64>,
) {
    while let Some(frame) = frames.next().await {
        let sequence = frame.sequence;
        let retained = {
            let mut buffer = buffer.lock();
            if buffer.accepts(sequence) {
                buffer.chunks.push(frame);
                true
            } else {
                false
            }
        };
        {
            let mut d = diagnostics.lock();
            if retained {
                d.frames_retained += 1;
            } else {
                d.frames_discarded += 1;
            }
        }
        consumed.send_if_modified(|seen| {
            let advanced = sequence + 1 > *seen;
            if advanced {
                *seen = sequence + 1;
            }
            advanced
        });
    }
    log::debug!("capture frame sequence ended");
}
