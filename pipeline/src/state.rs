//! Generation state machine and the per-call context that carries it.

use easel_engine::ProgressSink;
use std::fmt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// Where a generation call currently is.
///
/// ```text
/// Idle -> Validating -> Resolving -> Generating -> Streaming -> Generating ...
///              |             |            |             |
///              +-------------+------------+-------------+--> Failed | Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerationState {
    Idle,
    Validating,
    Resolving,
    Generating,
    /// A batch or realtime result was handed to the caller
    Streaming,
    Cancelled,
    Failed,
}

impl GenerationState {
    pub fn can_transition_to(self, next: GenerationState) -> bool {
        use GenerationState::*;
        matches!(
            (self, next),
            (Idle, Validating)
                | (Idle, Cancelled)
                | (Validating, Resolving)
                | (Validating, Failed)
                | (Validating, Cancelled)
                | (Resolving, Generating)
                | (Resolving, Failed)
                | (Resolving, Cancelled)
                | (Generating, Streaming)
                | (Generating, Idle)
                | (Generating, Failed)
                | (Generating, Cancelled)
                | (Streaming, Generating)
                | (Streaming, Validating)
                | (Streaming, Idle)
                | (Streaming, Failed)
                | (Streaming, Cancelled)
                | (Failed, Validating)
                | (Failed, Idle)
                | (Failed, Cancelled)
        )
    }

    /// Cancelled is final; a token cannot be reset
    pub fn is_terminal(self) -> bool {
        self == GenerationState::Cancelled
    }
}

impl fmt::Display for GenerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Per-call handle: cancellation, progress and observable state.
///
/// Create one per generation call (or per batch/realtime session) and keep a
/// clone of the token to cancel from elsewhere.
pub struct GenerationContext {
    id: Uuid,
    cancel: CancellationToken,
    progress: ProgressSink,
    state: watch::Sender<GenerationState>,
}

impl Default for GenerationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationContext {
    pub fn new() -> Self {
        let (state, _) = watch::channel(GenerationState::Idle);
        Self {
            id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
            progress: ProgressSink::noop(),
            state,
        }
    }

    pub fn with_progress(mut self, progress: ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn state(&self) -> GenerationState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<GenerationState> {
        self.state.subscribe()
    }

    /// Progress sink handed to the engine; drops events once cancelled
    pub(crate) fn engine_progress(&self) -> ProgressSink {
        self.progress.until_cancelled(self.cancel.clone())
    }

    pub(crate) fn transition(&self, next: GenerationState) {
        let current = self.state();
        if current == next {
            return;
        }
        if !current.can_transition_to(next) {
            warn!("[{}] Ignoring invalid state transition {} -> {}", self.id, current, next);
            return;
        }
        debug!("[{}] {} -> {}", self.id, current, next);
        self.state.send_replace(next);
    }
}
