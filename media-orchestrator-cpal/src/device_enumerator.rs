//! Audio device enumeration through the default cpal host.
//!
//! cpal identifies devices by name, so the name doubles as the device id.

use cpal::traits::{DeviceTrait, HostTrait};

use media_orchestrator_core::CaptureDeviceInfo;

use crate::error::BackendError;

/// Lists input and output devices on the default host.
pub struct DeviceEnumerator {
    host: cpal::Host,
}

impl Default for DeviceEnumerator {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceEnumerator {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    /// Name of the host API in use (ALSA, CoreAudio, WASAPI, ...).
    pub fn host_name(&self) -> &'static str {
        self.host.id().name()
    }

    /// List capture (microphone) devices.
    pub fn list_capture_devices(&self) -> Result<Vec<CaptureDeviceInfo>, BackendError> {
        let default_name = self.default_capture_device_name();
        let devices = self
            .host
            .input_devices()?
            .filter_map(|device| device.name().ok())
            .map(|name| device_info(name, default_name.as_deref()))
            .collect();
        Ok(devices)
    }

    /// List render (speaker/headphone) devices.
    pub fn list_render_devices(&self) -> Result<Vec<CaptureDeviceInfo>, BackendError> {
        let default_name = self
            .host
            .default_output_device()
            .and_then(|d| d.name().ok());
        let devices = self
            .host
            .output_devices()?
            .filter_map(|device| device.name().ok())
            .map(|name| device_info(name, default_name.as_deref()))
            .collect();
        Ok(devices)
    }

    pub fn default_capture_device_name(&self) -> Option<String> {
        self.host.default_input_device().and_then(|d| d.name().ok())
    }
}

fn device_info(name: String, default_name: Option<&str>) -> CaptureDeviceInfo {
    CaptureDeviceInfo {
        id: name.clone(),
        is_default: default_name == Some(name.as_str()),
        name,
    }
}

/// Resolve an input device by name, or the host default for `None`.
pub(crate) fn find_input_device(
    host: &cpal::Host,
    name: Option<&str>,
) -> Result<cpal::Device, BackendError> {
    match name {
        None => host
            .default_input_device()
            .ok_or_else(|| BackendError::NoDevice("default input".into())),
        Some(wanted) => host
            .input_devices()?
            .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or_else(|| BackendError::NoDevice(wanted.to_string())),
    }
}

/// Resolve an output device by name, or the host default for `None`.
pub(crate) fn find_output_device(
    host: &cpal::Host,
    name: Option<&str>,
) -> Result<cpal::Device, BackendError> {
    match name {
        None => host
            .default_output_device()
            .ok_or_else(|| BackendError::NoDevice("default output".into())),
        Some(wanted) => host
            .output_devices()?
            .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or_else(|| BackendError::NoDevice(wanted.to_string())),
    }
}
