/// Orchestrator lifecycle.
///
/// ```text
/// uninitialized → initializing → ready
///       ↑               │          │
///       └── (failure) ──┘          │
///       └──────── dispose ─────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Uninitialized,
    Initializing,
    Ready,
}

impl OrchestratorState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Capture stream lifecycle.
///
/// ```text
/// uninitialized → paused ↔ active
///                    ↓        ↓
///                   disposed ←┘
/// ```
///
/// `disposed` is only left through a fresh `open()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStreamState {
    Uninitialized,
    Paused,
    Active,
    Disposed,
}

impl CaptureStreamState {
    /// Whether the device handle is held.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Paused | Self::Active)
    }
}
