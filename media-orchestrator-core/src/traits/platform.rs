use async_trait::async_trait;

use crate::models::error::MediaResult;

/// Answers whether the process may open the microphone.
#[async_trait]
pub trait PermissionProvider: Send + Sync {
    async fn has_capture_permission(&self) -> bool;
}

/// Platform audio-session setup (category, route).
///
/// `configure` must complete before any stream opens and may be called more
/// than once.
#[async_trait]
pub trait SessionConfigurator: Send + Sync {
    async fn configure(&self) -> MediaResult<()>;

    async fn dispose(&self) -> MediaResult<()>;
}
