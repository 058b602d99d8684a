//! Adapter contracts consumed by the orchestrator.
//!
//! The orchestrator owns none of these concerns. Callers plug in:
//! - `RemoteCall`: the transport performing (and undoing) the mutation
//! - `LocalActions`: constructors for the local apply / compensate actions
//! - `RequestLifecycle`: bookkeeping around the remote request

use async_trait::async_trait;

use crate::error::Result;
use crate::mutation::Mutation;

/// Transport performing the remote mutation.
#[async_trait]
pub trait RemoteCall<M: Mutation>: Send + Sync {
    /// Perform the mutation. Failure routes the invocation to the error path.
    async fn dispatch(&self, entity: &M::Entity, options: &M::Options) -> Result<M::Output>;

    /// Best-effort undo of a dispatch, used only by the cancellation unwind.
    ///
    /// `result` is `None` when the call was still in flight when cancelled.
    async fn compensate(&self, entity: &M::Entity, result: Option<&M::Output>) -> Result<()>;
}

/// Constructors for the observable local actions.
pub trait LocalActions<M: Mutation>: Send + Sync {
    /// Action representing "this entity's state changed".
    fn apply_action(&self, result: &M::Output) -> Result<M::Action>;

    /// Action undoing a previously applied one.
    fn compensate_action(&self, id: M::Id) -> Result<M::Action>;
}

/// Request bookkeeping around the remote call.
#[async_trait]
pub trait RequestLifecycle<M: Mutation>: Send + Sync {
    /// Called just before the remote call; the handle is kept for the invocation.
    async fn create(&self, entity: &M::Entity) -> Result<M::Request>;

    async fn complete(&self, request: &M::Request) -> Result<()>;

    /// `request` is `None` when the failure happened before creation.
    async fn error(&self, request: Option<&M::Request>) -> Result<()>;

    /// Only called once the remote call was issued, so the handle exists.
    async fn cancel(&self, request: &M::Request) -> Result<()>;
}

/// Lifecycle for callers that keep no request records.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLifecycle;

#[async_trait]
impl<M> RequestLifecycle<M> for NoopLifecycle
where
    M: Mutation,
    M::Request: Default,
{
    async fn create(&self, _entity: &M::Entity) -> Result<M::Request> {
        Ok(M::Request::default())
    }

    async fn complete(&self, _request: &M::Request) -> Result<()> {
        Ok(())
    }

    async fn error(&self, _request: Option<&M::Request>) -> Result<()> {
        Ok(())
    }

    async fn cancel(&self, _request: &M::Request) -> Result<()> {
        Ok(())
    }
}
