//! Audio session setup for desktop hosts.
//!
//! Desktop hosts have no session category or route to negotiate, so
//! configuring means making sure the host can serve both directions before
//! any stream opens.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use media_orchestrator_core::{MediaError, MediaResult, SessionConfigurator};

use crate::device_enumerator::DeviceEnumerator;

#[derive(Default)]
pub struct HostSessionConfigurator {
    configured: AtomicBool,
}

impl HostSessionConfigurator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_configured(&self) -> bool {
        self.configured.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionConfigurator for HostSessionConfigurator {
    async fn configure(&self) -> MediaResult<()> {
        if self.is_configured() {
            return Ok(());
        }

        let report = tokio::task::spawn_blocking(|| {
            let devices = DeviceEnumerator::new();
            (
                devices.host_name(),
                devices.default_capture_device_name(),
                devices.list_render_devices().map(|d| d.len()).unwrap_or(0),
            )
        })
        .await
        .map_err(|e| MediaError::SessionConfiguration(format!("host probe failed: {}", e)))?;

        let (host, input, outputs) = report;
        if outputs == 0 {
            return Err(MediaError::SessionConfiguration(format!(
                "{} host has no output devices",
                host
            )));
        }

        log::info!(
            "audio session configured on {} (input: {}, {} output device(s))",
            host,
            input.as_deref().unwrap_or("none"),
            outputs
        );
        self.configured.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn dispose(&self) -> MediaResult<()> {
        self.configured.store(false, Ordering::SeqCst);
        Ok(())
    }
}
