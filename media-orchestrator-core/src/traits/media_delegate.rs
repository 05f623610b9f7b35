use crate::models::error::MediaError;
use crate::models::recording_result::RecordingResult;
use crate::models::state::OrchestratorState;

/// Event delegate for orchestrator notifications.
///
/// Called from whichever task drives the orchestrator. Implementations should
/// marshal to a UI thread if needed.
pub trait MediaDelegate: Send + Sync {
    /// Called when the orchestrator state changes.
    fn on_state_changed(&self, state: OrchestratorState);

    /// Called when a take has been written and added to the catalog.
    fn on_take_finished(&self, result: &RecordingResult);

    /// Called when an orchestrator operation fails. The error is still
    /// returned to the caller.
    fn on_error(&self, error: &MediaError);
}
