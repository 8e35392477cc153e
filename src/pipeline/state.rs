use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

/// Lifecycle of one boomerang job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PipelineState {
    #[default]
    Idle,
    Decoding,
    Encoding,
    Completed,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Decoding | Self::Encoding)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Decoding => "decoding",
            Self::Encoding => "encoding",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Moves a running job through its states.
///
/// Dropping the guard while the job is still in flight (a panic in a stage,
/// an aborted task) marks the job `Failed` so the coordinator is never stuck.
pub(crate) struct StateGuard {
    state: Arc<watch::Sender<PipelineState>>,
}

impl StateGuard {
    pub(crate) fn new(state: Arc<watch::Sender<PipelineState>>) -> Self {
        Self { state }
    }

    pub(crate) fn set(&self, next: PipelineState) {
        let previous = self.state.send_replace(next);
        debug!("Pipeline state {} -> {}", previous, next);
    }
}

impl Drop for StateGuard {
    fn drop(&mut self) {
        if self.state.borrow().is_in_flight() {
            self.set(PipelineState::Failed);
        }
    }
}
