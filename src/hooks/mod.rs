//! Lifecycle hooks invoked by the orchestrator.
//!
//! Every hook is optional: the default bodies are no-ops, and the two
//! predicates default to `true`. Implementors override only what they need.
//! A hook returning `Err` is treated exactly like an adapter failure.

use async_trait::async_trait;

use crate::error::{Result, SagaError};
use crate::mutation::Mutation;

/// Hook set for one kind of mutation.
///
/// Invocation order on the success path:
/// `on_start`, `should_perform_remote_call`, `before_remote_call`,
/// (remote call), `after_remote_call`, `should_apply_local_action`,
/// `before_apply_local_action`, (apply action emitted),
/// `after_apply_local_action`, `on_finish`.
#[async_trait]
pub trait SagaHooks<M: Mutation>: Send + Sync {
    /// First hook of every invocation.
    async fn on_start(&self, _entity: &M::Entity) -> Result<()> {
        Ok(())
    }

    /// Runs after the remote call was approved, before the request is created.
    async fn before_remote_call(&self, _entity: &M::Entity) -> Result<()> {
        Ok(())
    }

    /// Returning `false` skips straight to `on_finish`.
    async fn should_perform_remote_call(&self, _entity: &M::Entity) -> Result<bool> {
        Ok(true)
    }

    async fn after_remote_call(&self, _result: &M::Output, _entity: &M::Entity) -> Result<()> {
        Ok(())
    }

    async fn before_apply_local_action(
        &self,
        _result: &M::Output,
        _entity: &M::Entity,
    ) -> Result<()> {
        Ok(())
    }

    /// Returning `false` skips the apply action and its surrounding hooks.
    async fn should_apply_local_action(
        &self,
        _result: &M::Output,
        _entity: &M::Entity,
    ) -> Result<bool> {
        Ok(true)
    }

    async fn after_apply_local_action(
        &self,
        _applied: &M::Action,
        _result: &M::Output,
        _entity: &M::Entity,
    ) -> Result<()> {
        Ok(())
    }

    /// Last hook of a successful or skipped invocation.
    async fn on_finish(&self, _entity: &M::Entity) -> Result<()> {
        Ok(())
    }

    /// Receives the failure that routed the invocation to the error path.
    async fn on_error(&self, _error: &SagaError) -> Result<()> {
        Ok(())
    }

    /// Last step of the cancellation unwind.
    async fn on_cancel(&self, _entity: &M::Entity) -> Result<()> {
        Ok(())
    }
}

/// Hook set with every default in place.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl<M: Mutation> SagaHooks<M> for NoopHooks {}
