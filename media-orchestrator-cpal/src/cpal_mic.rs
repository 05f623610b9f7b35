//! Keep-alive microphone capture on cpal.
//!
//! A `cpal::Stream` cannot leave the thread that built it, so each capture
//! owns a dedicated `cpal-mic-stream` thread. The thread builds and plays
//! the input stream, then serves pause/resume/stop commands until told to
//! stop or until the capture is dropped. Every command is acknowledged, so
//! `pause()` returning `Ok` means the hardware has actually paused.

use std::sync::mpsc;
use std::thread;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};

use media_orchestrator_core::{
    CaptureDevice, CaptureDeviceFactory, CaptureDeviceInfo, CaptureFormat, FrameCallback,
    MediaError, MediaResult,
};

use crate::device_enumerator::find_input_device;
use crate::error::BackendError;

enum Command {
    Pause,
    Resume,
    Stop,
}

struct Control {
    command: Command,
    ack: mpsc::Sender<Result<(), BackendError>>,
}

/// Microphone capture through the default cpal host.
pub struct CpalMicCapture {
    device_name: Option<String>,
    info: CaptureDeviceInfo,
    commands: Option<mpsc::Sender<Control>>,
    stream_thread: Option<thread::JoinHandle<()>>,
}

impl CpalMicCapture {
    /// Capture from the host's default input device.
    pub fn default_device() -> Self {
        Self::with_device(None)
    }

    /// Capture from the input device with this name, or the default for `None`.
    pub fn with_device(device_name: Option<String>) -> Self {
        let info = CaptureDeviceInfo {
            id: device_name.clone().unwrap_or_else(|| "default-mic".into()),
            name: device_name.clone().unwrap_or_else(|| "Default Microphone".into()),
            is_default: device_name.is_none(),
        };
        Self {
            device_name,
            info,
            commands: None,
            stream_thread: None,
        }
    }

    fn request(&self, command: Command) -> MediaResult<()> {
        let commands = self
            .commands
            .as_ref()
            .ok_or_else(|| MediaError::Device("microphone stream not started".into()))?;
        let (ack, acked) = mpsc::channel();
        commands
            .send(Control { command, ack })
            .map_err(|_| BackendError::StreamThreadGone)?;
        acked.recv().map_err(|_| BackendError::StreamThreadGone)??;
        Ok(())
    }
}

impl CaptureDevice for CpalMicCapture {
    fn start(&mut self, callback: FrameCallback) -> MediaResult<()> {
        if self.stream_thread.is_some() {
            return Err(MediaError::Device("microphone stream already running".into()));
        }

        let (commands, command_rx) = mpsc::channel::<Control>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<CaptureDeviceInfo, BackendError>>();
        let device_name = self.device_name.clone();

        let handle = thread::Builder::new()
            .name("cpal-mic-stream".into())
            .spawn(move || run_stream(device_name, callback, command_rx, ready_tx))
            .map_err(BackendError::Spawn)?;

        match ready_rx.recv() {
            Ok(Ok(info)) => {
                log::info!("microphone stream running on '{}'", info.name);
                self.info = info;
                self.commands = Some(commands);
                self.stream_thread = Some(handle);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e.into())
            }
            Err(_) => {
                let _ = handle.join();
                Err(BackendError::StreamThreadGone.into())
            }
        }
    }

    fn pause(&mut self) -> MediaResult<()> {
        self.request(Command::Pause)
    }

    fn resume(&mut self) -> MediaResult<()> {
        self.request(Command::Resume)
    }

    fn stop(&mut self) -> MediaResult<()> {
        if self.commands.is_none() {
            return Ok(());
        }
        let result = self.request(Command::Stop);
        self.commands = None;
        if let Some(handle) = self.stream_thread.take() {
            let _ = handle.join();
        }
        result
    }

    fn device_info(&self) -> CaptureDeviceInfo {
        self.info.clone()
    }
}

fn run_stream(
    device_name: Option<String>,
    callback: FrameCallback,
    commands: mpsc::Receiver<Control>,
    ready: mpsc::Sender<Result<CaptureDeviceInfo, BackendError>>,
) {
    let stream = match open_input(device_name.as_deref(), callback) {
        Ok((stream, info)) => match stream.play() {
            Ok(()) => {
                let _ = ready.send(Ok(info));
                stream
            }
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

    // A closed channel means the capture was dropped without stop().
    let mut stop_ack = None;
    while let Ok(control) = commands.recv() {
        let result = match control.command {
            Command::Pause => stream.pause().map_err(BackendError::from),
            Command::Resume => stream.play().map_err(BackendError::from),
            Command::Stop => {
                stop_ack = Some(control.ack);
                break;
            }
        };
        let _ = control.ack.send(result);
    }

    drop(stream);
    log::debug!("microphone stream released");
    if let Some(ack) = stop_ack {
        let _ = ack.send(Ok(()));
    }
}

fn open_input(
    device_name: Option<&str>,
    callback: FrameCallback,
) -> Result<(cpal::Stream, CaptureDeviceInfo), BackendError> {
    let host = cpal::default_host();
    let device = find_input_device(&host, device_name)?;
    let name = device.name().unwrap_or_else(|_| "Unknown Microphone".into());

    let supported = device.default_input_config()?;
    let config: cpal::StreamConfig = supported.config();
    log::debug!(
        "microphone '{}' native format: {} Hz, {} ch, {:?}",
        name,
        config.sample_rate.0,
        config.channels,
        supported.sample_format()
    );

    let stream = match supported.sample_format() {
        SampleFormat::F32 => build_input::<f32>(&device, &config, callback)?,
        SampleFormat::I16 => build_input::<i16>(&device, &config, callback)?,
        SampleFormat::I32 => build_input::<i32>(&device, &config, callback)?,
        SampleFormat::U16 => build_input::<u16>(&device, &config, callback)?,
        other => return Err(BackendError::UnsupportedFormat(format!("{:?}", other))),
    };

    let info = CaptureDeviceInfo {
        id: name.clone(),
        is_default: device_name.is_none(),
        name,
    };
    Ok((stream, info))
}

fn build_input<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    callback: FrameCallback,
) -> Result<cpal::Stream, BackendError>
where
    T: SizedSample + Send + 'static,
    f32: FromSample<T>,
{
    let sample_rate = config.sample_rate.0;
    let channels = config.channels;
    let mut scratch: Vec<f32> = Vec::new();

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            to_f32(data, &mut scratch);
            callback(&scratch, sample_rate, channels);
        },
        |err| log::error!("microphone stream error: {}", err),
        None,
    )?;
    Ok(stream)
}

/// Convert a native driver buffer to f32, reusing `out`.
fn to_f32<T>(data: &[T], out: &mut Vec<f32>)
where
    T: Sample,
    f32: FromSample<T>,
{
    out.clear();
    out.extend(data.iter().map(|&s| f32::from_sample(s)));
}

/// Builds [`CpalMicCapture`] handles for the capture stream.
pub struct CpalCaptureFactory {
    device_name: Option<String>,
}

impl Default for CpalCaptureFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl CpalCaptureFactory {
    /// Use the host's default input device.
    pub fn new() -> Self {
        Self { device_name: None }
    }

    pub fn with_device(name: impl Into<String>) -> Self {
        Self {
            device_name: Some(name.into()),
        }
    }
}

impl CaptureDeviceFactory for CpalCaptureFactory {
    fn is_available(&self) -> bool {
        find_input_device(&cpal::default_host(), self.device_name.as_deref()).is_ok()
    }

    fn create(&self, format: &CaptureFormat) -> MediaResult<Box<dyn CaptureDevice>> {
        log::debug!(
            "creating microphone capture; frames converted to {} Hz, {} ch",
            format.sample_rate,
            format.channels
        );
        Ok(Box::new(CpalMicCapture::with_device(self.device_name.clone())))
    }
}
