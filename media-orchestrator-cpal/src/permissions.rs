//! Desktop microphone access check.
//!
//! Desktop hosts have no consent API that cpal can reach. A denied or
//! disabled microphone shows up as a missing default input device or as a
//! device that refuses to report its configuration, so that is what the
//! probe checks.

use async_trait::async_trait;
use cpal::traits::DeviceTrait;

use media_orchestrator_core::PermissionProvider;

use crate::device_enumerator::find_input_device;
use crate::error::BackendError;

/// Probes whether the configured input device can be opened.
pub struct CpalPermissionProvider {
    device_name: Option<String>,
}

impl Default for CpalPermissionProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CpalPermissionProvider {
    pub fn new() -> Self {
        Self { device_name: None }
    }

    pub fn with_device(name: impl Into<String>) -> Self {
        Self {
            device_name: Some(name.into()),
        }
    }
}

#[async_trait]
impl PermissionProvider for CpalPermissionProvider {
    async fn has_capture_permission(&self) -> bool {
        let device_name = self.device_name.clone();
        let probe =
            tokio::task::spawn_blocking(move || check_microphone_access(device_name.as_deref()))
                .await;
        match probe {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                log::warn!("microphone access unavailable: {}", e);
                false
            }
            Err(e) => {
                log::warn!("microphone access probe failed: {}", e);
                false
            }
        }
    }
}

/// Blocking probe: the device exists and reports an input configuration.
pub fn check_microphone_access(device_name: Option<&str>) -> Result<(), BackendError> {
    let device = find_input_device(&cpal::default_host(), device_name)?;
    device.default_input_config()?;
    Ok(())
}
