//! WAV audio output on cpal.
//!
//! Sources are fetched whole (local file or HTTP), decoded with `hound`, and
//! rendered by a persistent output stream that lives on its own
//! `cpal-audio-output` thread. The stream runs for the lifetime of the
//! output; a `playing` flag decides whether it renders audio or silence.

use std::io::Cursor;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};
use parking_lot::Mutex;
use tokio::sync::oneshot;

use media_orchestrator_core::{
    AudioOutput, AudioOutputFactory, MediaError, MediaResult, MediaSource,
};

use crate::device_enumerator::find_output_device;
use crate::error::BackendError;

/// A fully decoded source, interleaved f32.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedAudio {
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    /// Sample for output channel `ch` of `out_channels` at source frame `index`.
    fn sample_for(&self, index: usize, ch: usize, out_channels: usize) -> f32 {
        let channels = self.channels as usize;
        let frame = &self.samples[index * channels..(index + 1) * channels];
        if out_channels == 1 && channels > 1 {
            frame.iter().sum::<f32>() / channels as f32
        } else {
            frame[ch.min(channels - 1)]
        }
    }
}

/// Decode a WAV file held in memory. Integer formats are scaled to [-1, 1].
pub fn decode_wav(bytes: &[u8]) -> Result<DecodedAudio, BackendError> {
    let reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

/// What the render callback reads on every buffer.
#[derive(Debug)]
struct PlaybackState {
    audio: Option<Arc<DecodedAudio>>,
    /// Position in source frames; fractional when the rates differ.
    cursor: f64,
    playing: bool,
    volume: f32,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            audio: None,
            cursor: 0.0,
            playing: false,
            volume: 1.0,
        }
    }
}

impl PlaybackState {
    fn at_end(&self) -> bool {
        self.audio
            .as_ref()
            .map_or(true, |a| self.cursor as usize >= a.frame_count())
    }
}

/// Fill one interleaved output buffer and advance the cursor.
///
/// Writes silence while not playing. Clears `playing` once the source runs
/// out. Rate conversion is nearest-sample.
fn render(state: &mut PlaybackState, out: &mut [f32], out_channels: usize, out_rate: u32) {
    out.fill(0.0);
    if !state.playing || out_channels == 0 || out_rate == 0 {
        return;
    }
    let Some(audio) = state.audio.clone() else {
        state.playing = false;
        return;
    };

    let frames = audio.frame_count();
    let step = audio.sample_rate as f64 / out_rate as f64;
    for frame in out.chunks_mut(out_channels) {
        let index = state.cursor as usize;
        if index >= frames {
            break;
        }
        for (ch, sample) in frame.iter_mut().enumerate() {
            *sample = audio.sample_for(index, ch, out_channels) * state.volume;
        }
        state.cursor += step;
    }

    if state.at_end() {
        state.playing = false;
    }
}

struct OutputThread {
    // Dropping the sender ends the thread and releases the stream.
    shutdown: mpsc::Sender<()>,
    handle: thread::JoinHandle<()>,
}

/// Audio output on the default (or a named) cpal output device.
pub struct CpalAudioOutput {
    device_name: Option<String>,
    http: reqwest::Client,
    state: Arc<Mutex<PlaybackState>>,
    stream: Option<OutputThread>,
}

impl CpalAudioOutput {
    pub fn new(device_name: Option<String>, http: reqwest::Client) -> Self {
        Self {
            device_name,
            http,
            state: Arc::new(Mutex::new(PlaybackState::default())),
            stream: None,
        }
    }

    async fn fetch(&self, source: &MediaSource) -> Result<Vec<u8>, BackendError> {
        match source {
            MediaSource::Url(url) => {
                let response = self.http.get(url).send().await?.error_for_status()?;
                Ok(response.bytes().await?.to_vec())
            }
            MediaSource::File(path) => Ok(tokio::fs::read(path).await?),
        }
    }

    async fn ensure_stream(&mut self) -> MediaResult<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let (shutdown, shutdown_rx) = mpsc::channel::<()>();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), BackendError>>();
        let state = Arc::clone(&self.state);
        let device_name = self.device_name.clone();

        let handle = thread::Builder::new()
            .name("cpal-audio-output".into())
            .spawn(move || run_output(device_name, state, shutdown_rx, ready_tx))
            .map_err(BackendError::Spawn)?;

        match ready_rx.await {
            Ok(Ok(())) => {
                self.stream = Some(OutputThread { shutdown, handle });
                Ok(())
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(BackendError::StreamThreadGone.into()),
        }
    }
}

#[async_trait]
impl AudioOutput for CpalAudioOutput {
    async fn load(&mut self, source: &MediaSource) -> MediaResult<()> {
        let bytes = self.fetch(source).await?;
        let decoded = tokio::task::spawn_blocking(move || decode_wav(&bytes))
            .await
            .map_err(|e| MediaError::Unknown(format!("decode task failed: {}", e)))??;

        log::debug!(
            "loaded {}: {} frames at {} Hz, {} ch",
            source,
            decoded.frame_count(),
            decoded.sample_rate,
            decoded.channels
        );

        let mut state = self.state.lock();
        state.audio = Some(Arc::new(decoded));
        state.cursor = 0.0;
        state.playing = false;
        Ok(())
    }

    async fn play(&mut self) -> MediaResult<()> {
        if self.state.lock().audio.is_none() {
            return Err(MediaError::Source("no audio loaded".into()));
        }
        self.ensure_stream().await?;

        let mut state = self.state.lock();
        if state.at_end() {
            state.cursor = 0.0;
        }
        state.playing = true;
        Ok(())
    }

    async fn pause(&mut self) -> MediaResult<()> {
        self.state.lock().playing = false;
        Ok(())
    }

    async fn stop(&mut self) -> MediaResult<()> {
        let mut state = self.state.lock();
        state.playing = false;
        state.cursor = 0.0;
        Ok(())
    }

    async fn set_volume(&mut self, level: f32) -> MediaResult<()> {
        self.state.lock().volume = level.clamp(0.0, 1.0);
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    async fn dispose(&mut self) -> MediaResult<()> {
        {
            let mut state = self.state.lock();
            state.playing = false;
            state.audio = None;
        }
        if let Some(stream) = self.stream.take() {
            let OutputThread { shutdown, handle } = stream;
            drop(shutdown);
            tokio::task::spawn_blocking(move || handle.join())
                .await
                .map_err(|e| MediaError::Unknown(format!("output shutdown failed: {}", e)))?
                .map_err(|_| MediaError::Device("output thread panicked".into()))?;
        }
        Ok(())
    }
}

fn run_output(
    device_name: Option<String>,
    state: Arc<Mutex<PlaybackState>>,
    shutdown: mpsc::Receiver<()>,
    ready: oneshot::Sender<Result<(), BackendError>>,
) {
    let stream = match open_output(device_name.as_deref(), state) {
        Ok(stream) => match stream.play() {
            Ok(()) => stream,
            Err(e) => {
                let _ = ready.send(Err(e.into()));
                return;
            }
        },
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    // Blocks until the output is disposed or dropped.
    let _ = shutdown.recv();
    drop(stream);
    log::debug!("audio output stream released");
}

fn open_output(
    device_name: Option<&str>,
    state: Arc<Mutex<PlaybackState>>,
) -> Result<cpal::Stream, BackendError> {
    let host = cpal::default_host();
    let device = find_output_device(&host, device_name)?;
    let supported = device.default_output_config()?;
    let config: cpal::StreamConfig = supported.config();

    log::info!(
        "audio output on '{}' at {} Hz, {} ch",
        device.name().unwrap_or_else(|_| "Unknown Output".into()),
        config.sample_rate.0,
        config.channels
    );

    match supported.sample_format() {
        SampleFormat::F32 => build_output::<f32>(&device, &config, state),
        SampleFormat::I16 => build_output::<i16>(&device, &config, state),
        SampleFormat::I32 => build_output::<i32>(&device, &config, state),
        SampleFormat::U16 => build_output::<u16>(&device, &config, state),
        other => Err(BackendError::UnsupportedFormat(format!("{:?}", other))),
    }
}

fn build_output<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    state: Arc<Mutex<PlaybackState>>,
) -> Result<cpal::Stream, BackendError>
where
    T: SizedSample + FromSample<f32> + Send + 'static,
{
    let channels = config.channels as usize;
    let sample_rate = config.sample_rate.0;
    let mut scratch: Vec<f32> = Vec::new();

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            scratch.resize(data.len(), 0.0);
            render(&mut state.lock(), &mut scratch, channels, sample_rate);
            for (out, &sample) in data.iter_mut().zip(scratch.iter()) {
                *out = T::from_sample(sample);
            }
        },
        |err| log::error!("audio output stream error: {}", err),
        None,
    )?;
    Ok(stream)
}

/// Creates [`CpalAudioOutput`] handles sharing one HTTP client.
pub struct CpalOutputFactory {
    device_name: Option<String>,
    http: reqwest::Client,
}

impl Default for CpalOutputFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl CpalOutputFactory {
    /// Use the host's default output device.
    pub fn new() -> Self {
        Self {
            device_name: None,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_device(name: impl Into<String>) -> Self {
        Self {
            device_name: Some(name.into()),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AudioOutputFactory for CpalOutputFactory {
    async fn create(&self) -> MediaResult<Box<dyn AudioOutput>> {
        let device_name = self.device_name.clone();
        tokio::task::spawn_blocking(move || {
            find_output_device(&cpal::default_host(), device_name.as_deref()).map(|_| ())
        })
        .await
        .map_err(|e| MediaError::Unknown(format!("output probe failed: {}", e)))??;

        Ok(Box::new(CpalAudioOutput::new(
            self.device_name.clone(),
            self.http.clone(),
        )))
    }
}
