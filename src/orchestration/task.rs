//! Handle to a spawned invocation.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::SagaOutcome;
use crate::bus::Emission;
use crate::error::Result;

/// A running invocation.
///
/// Dropping the handle does not cancel the invocation; call [`cancel`]
/// to run the cancellation unwind.
///
/// [`cancel`]: SagaTask::cancel
pub struct SagaTask<A> {
    id: Uuid,
    token: CancellationToken,
    handle: JoinHandle<Result<SagaOutcome>>,
    actions: Option<mpsc::UnboundedReceiver<Emission<A>>>,
}

impl<A> SagaTask<A> {
    pub(crate) fn new(
        id: Uuid,
        token: CancellationToken,
        handle: JoinHandle<Result<SagaOutcome>>,
        actions: mpsc::UnboundedReceiver<Emission<A>>,
    ) -> Self {
        Self {
            id,
            token,
            handle,
            actions: Some(actions),
        }
    }

    /// Invocation id, also recorded on the `saga.run` span.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Deliver the cancellation signal. A no-op once the invocation is done.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Token driving this invocation's cancellation, for hosts that layer
    /// their own policies (timeouts, parent shutdown) on top.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stream of emitted actions. Returns `None` after the first call.
    ///
    /// The stream ends when the invocation finishes.
    pub fn take_actions(&mut self) -> Option<UnboundedReceiverStream<Emission<A>>> {
        self.actions.take().map(UnboundedReceiverStream::new)
    }

    /// Wait for the invocation to end.
    ///
    /// Errors only come from the cancellation unwind or a panicked task;
    /// normal-path failures are absorbed and reported as
    /// [`SagaOutcome::Failed`].
    pub async fn join(self) -> Result<SagaOutcome> {
        self.handle.await?
    }

    /// Wait for the invocation and gather every emission it produced.
    ///
    /// Emissions already consumed through [`take_actions`] are not repeated.
    ///
    /// [`take_actions`]: SagaTask::take_actions
    pub async fn collect(mut self) -> Result<(SagaOutcome, Vec<Emission<A>>)> {
        let receiver = self.actions.take();
        let outcome = self.join().await?;

        let mut emissions = Vec::new();
        if let Some(mut receiver) = receiver {
            while let Ok(emission) = receiver.try_recv() {
                emissions.push(emission);
            }
        }
        Ok((outcome, emissions))
    }
}
