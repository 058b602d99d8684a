//! Orchestrator states and per-invocation context.

use std::fmt;

use tracing::trace;
use uuid::Uuid;

use crate::mutation::Mutation;

/// Position of one invocation in the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SagaState {
    #[default]
    Idle,
    Starting,
    Deciding,
    Skipped,
    Preparing,
    Calling,
    Completing,
    DispatchDeciding,
    DispatchSkipped,
    Dispatching,
    Finishing,
    ErrorHandling,
    Cancelling,
    Done,
}

impl SagaState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::Idle => "idle",
            SagaState::Starting => "starting",
            SagaState::Deciding => "deciding",
            SagaState::Skipped => "skipped",
            SagaState::Preparing => "preparing",
            SagaState::Calling => "calling",
            SagaState::Completing => "completing",
            SagaState::DispatchDeciding => "dispatch_deciding",
            SagaState::DispatchSkipped => "dispatch_skipped",
            SagaState::Dispatching => "dispatching",
            SagaState::Finishing => "finishing",
            SagaState::ErrorHandling => "error_handling",
            SagaState::Cancelling => "cancelling",
            SagaState::Done => "done",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaState::Done)
    }

    pub(crate) fn transition(&mut self, next: SagaState) {
        trace!(from = self.as_str(), to = next.as_str(), "Saga state transition");
        *self = next;
    }
}

impl fmt::Display for SagaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State owned by exactly one invocation and dropped when it ends.
///
/// The flags decide which compensations are owed if the invocation fails or
/// is cancelled. Fields are written directly so that a borrowed `result` or
/// `request` can coexist with flag updates.
pub(crate) struct Invocation<M: Mutation> {
    pub(crate) id: Uuid,
    pub(crate) state: SagaState,
    pub(crate) request: Option<M::Request>,
    pub(crate) result: Option<M::Output>,
    /// Set when the remote call is issued, before awaiting it; cleared if
    /// the call fails.
    pub(crate) remote_call_issued: bool,
    pub(crate) local_apply_issued: bool,
    pub(crate) terminal_reached: bool,
    /// At most one compensate action per invocation.
    pub(crate) compensate_emitted: bool,
}

impl<M: Mutation> Invocation<M> {
    pub(crate) fn new(id: Uuid) -> Self {
        Self {
            id,
            state: SagaState::Idle,
            request: None,
            result: None,
            remote_call_issued: false,
            local_apply_issued: false,
            terminal_reached: false,
            compensate_emitted: false,
        }
    }

    pub(crate) fn finish(&mut self) {
        self.state.transition(SagaState::Done);
        self.terminal_reached = true;
    }
}
