use std::sync::Arc;

use crate::models::audio_models::{CaptureDeviceInfo, CaptureFormat};
use crate::models::error::MediaResult;

/// Callback invoked by the driver whenever a buffer is available.
///
/// Parameters:
/// - `samples`: Interleaved f32 samples at the device's native layout.
/// - `sample_rate`: The rate the device is actually running at.
/// - `channels`: Number of interleaved channels.
///
/// Runs on the driver's own thread, concurrently with the async runtime.
pub type FrameCallback = Arc<dyn Fn(&[f32], u32, u16) + Send + Sync + 'static>;

/// One long-lived hardware capture handle.
///
/// Implemented by `CpalMicCapture` in the cpal backend and by fakes in tests.
pub trait CaptureDevice: Send + Sync {
    /// Acquire the hardware and begin delivering buffers via `callback`.
    fn start(&mut self, callback: FrameCallback) -> MediaResult<()>;

    /// Suspend hardware streaming without releasing the handle.
    fn pause(&mut self) -> MediaResult<()>;

    /// Resume a paused stream. Must not reacquire the device.
    fn resume(&mut self) -> MediaResult<()>;

    /// Stop streaming and release the handle.
    fn stop(&mut self) -> MediaResult<()>;

    fn device_info(&self) -> CaptureDeviceInfo;
}

/// Creates capture handles for the capture stream.
pub trait CaptureDeviceFactory: Send + Sync {
    /// Whether a capture device is currently present.
    fn is_available(&self) -> bool;

    /// Build an unstarted handle that will deliver audio for `format`.
    fn create(&self, format: &CaptureFormat) -> MediaResult<Box<dyn CaptureDevice>>;
}
