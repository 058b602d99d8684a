//! Entity mutation orchestration.
//!
//! `EntitySaga` drives one remote mutation and the local action representing
//! it through a fixed state machine:
//!
//! `Starting -> Deciding -> {Skipped | Preparing -> Calling -> Completing ->
//! DispatchDeciding -> {DispatchSkipped | Dispatching}} -> Finishing -> Done`
//!
//! Any failure on that path is routed once to `ErrorHandling`, which
//! compensates the local action if it was emitted. External cancellation
//! interrupts either path at its current suspension point and runs the
//! `Cancelling` unwind, which also compensates the remote side when the
//! remote call was issued.
//!
//! - `state`: state enum and per-invocation context
//! - `task`: handle to a spawned invocation

pub mod state;
pub mod task;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::adapters::{LocalActions, RemoteCall, RequestLifecycle};
use crate::bus::{ActionBus, Emission, Emitter};
use crate::config::{SagaSettings, DEFAULT_SAGA_NAME};
use crate::error::{Result, SagaError};
use crate::hooks::SagaHooks;
use crate::identity::{DefaultIdentityResolver, IdentityResolver};
use crate::mutation::Mutation;

pub use state::SagaState;
pub use task::SagaTask;

use state::Invocation;

/// How an invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaOutcome {
    /// Remote call done; `applied` is false when the local action was vetoed.
    Completed { applied: bool },
    /// `should_perform_remote_call` returned false.
    Skipped,
    /// A hook or adapter failed and the error path ran.
    Failed,
    /// The cancellation unwind ran to completion.
    Cancelled,
}

/// Optional configuration for an `EntitySaga`.
pub struct SagaOptions<M: Mutation> {
    /// Overrides the default identity policy.
    pub resolve_identifier: Option<Arc<dyn IdentityResolver<M>>>,
    /// Name recorded on invocation spans.
    pub name: String,
    /// Host bus receiving every emission in addition to the task stream.
    pub bus: Option<Arc<dyn ActionBus<M::Action>>>,
    /// Cancel invocations that run longer than this.
    pub timeout: Option<Duration>,
}

impl<M: Mutation> Default for SagaOptions<M> {
    fn default() -> Self {
        Self {
            resolve_identifier: None,
            name: DEFAULT_SAGA_NAME.to_string(),
            bus: None,
            timeout: None,
        }
    }
}

impl<M: Mutation> SagaOptions<M> {
    pub fn from_settings(settings: &SagaSettings) -> Self {
        Self {
            name: settings.name.clone(),
            timeout: settings.timeout(),
            ..Self::default()
        }
    }

    pub fn resolve_identifier(mut self, resolver: Arc<dyn IdentityResolver<M>>) -> Self {
        self.resolve_identifier = Some(resolver);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn bus(mut self, bus: Arc<dyn ActionBus<M::Action>>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Build an orchestrator for one kind of mutation.
///
/// The returned saga holds no per-invocation state and can start any
/// number of concurrent invocations.
pub fn run_entity_mutation<M: Mutation>(
    remote: Arc<dyn RemoteCall<M>>,
    actions: Arc<dyn LocalActions<M>>,
    lifecycle: Arc<dyn RequestLifecycle<M>>,
    hooks: Arc<dyn SagaHooks<M>>,
    options: SagaOptions<M>,
) -> EntitySaga<M> {
    let resolver: Arc<dyn IdentityResolver<M>> = match options.resolve_identifier {
        Some(resolver) => resolver,
        None => Arc::new(DefaultIdentityResolver::<M>::new()),
    };

    EntitySaga {
        name: options.name,
        remote,
        actions,
        lifecycle,
        hooks,
        resolver,
        bus: options.bus,
        timeout: options.timeout,
    }
}

/// Orchestrator for one kind of entity mutation.
pub struct EntitySaga<M: Mutation> {
    name: String,
    remote: Arc<dyn RemoteCall<M>>,
    actions: Arc<dyn LocalActions<M>>,
    lifecycle: Arc<dyn RequestLifecycle<M>>,
    hooks: Arc<dyn SagaHooks<M>>,
    resolver: Arc<dyn IdentityResolver<M>>,
    bus: Option<Arc<dyn ActionBus<M::Action>>>,
    timeout: Option<Duration>,
}

impl<M: Mutation> Clone for EntitySaga<M> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            remote: self.remote.clone(),
            actions: self.actions.clone(),
            lifecycle: self.lifecycle.clone(),
            hooks: self.hooks.clone(),
            resolver: self.resolver.clone(),
            bus: self.bus.clone(),
            timeout: self.timeout,
        }
    }
}

impl<M: Mutation> EntitySaga<M> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start one invocation on the tokio runtime.
    pub fn spawn(&self, entity: M::Entity, options: M::Options) -> SagaTask<M::Action> {
        let id = Uuid::new_v4();
        let token = CancellationToken::new();
        let (sender, receiver) = mpsc::unbounded_channel();

        let saga = self.clone();
        let run_token = token.clone();
        let handle = tokio::spawn(async move {
            saga.run_invocation(id, entity, options, run_token, sender)
                .await
        });

        SagaTask::new(id, token, handle, receiver)
    }

    /// Run one invocation on the caller's task.
    ///
    /// Emissions are sent on `actions`; cancelling `cancel` runs the
    /// cancellation unwind.
    pub async fn run(
        &self,
        entity: M::Entity,
        options: M::Options,
        cancel: CancellationToken,
        actions: mpsc::UnboundedSender<Emission<M::Action>>,
    ) -> Result<SagaOutcome> {
        self.run_invocation(Uuid::new_v4(), entity, options, cancel, actions)
            .await
    }

    #[tracing::instrument(name = "saga.run", skip_all, fields(saga = %self.name, invocation_id = %id))]
    async fn run_invocation(
        &self,
        id: Uuid,
        entity: M::Entity,
        options: M::Options,
        cancel: CancellationToken,
        actions: mpsc::UnboundedSender<Emission<M::Action>>,
    ) -> Result<SagaOutcome> {
        let emitter = Emitter::new(actions, self.bus.clone());
        let mut invocation = Invocation::<M>::new(id);

        let finished = {
            let drive = self.drive(&mut invocation, &entity, &options, &emitter);
            tokio::select! {
                biased;
                _ = self.cancelled(&cancel) => None,
                outcome = drive => Some(outcome),
            }
        };

        let outcome = match finished {
            Some(outcome) => outcome,
            None => {
                self.unwind(&mut invocation, &entity, &emitter).await?;
                SagaOutcome::Cancelled
            }
        };

        debug_assert!(invocation.terminal_reached && invocation.state.is_terminal());
        debug!(
            invocation_id = %invocation.id,
            state = invocation.state.as_str(),
            ?outcome,
            "Invocation ended"
        );
        Ok(outcome)
    }

    /// Resolves once the invocation must unwind: external cancellation or
    /// the configured timeout.
    async fn cancelled(&self, cancel: &CancellationToken) {
        match self.timeout {
            Some(timeout) => {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(timeout) => {
                        warn!(?timeout, "Saga timed out, cancelling");
                        cancel.cancel();
                    }
                }
            }
            None => cancel.cancelled().await,
        }
    }

    /// Normal path, then the error path if anything on it failed.
    async fn drive(
        &self,
        invocation: &mut Invocation<M>,
        entity: &M::Entity,
        options: &M::Options,
        emitter: &Emitter<M::Action>,
    ) -> SagaOutcome {
        let outcome = match self.forward(invocation, entity, options, emitter).await {
            Ok(outcome) => outcome,
            Err(error) => {
                self.recover(invocation, entity, error, emitter).await;
                SagaOutcome::Failed
            }
        };
        invocation.finish();
        outcome
    }

    async fn forward(
        &self,
        invocation: &mut Invocation<M>,
        entity: &M::Entity,
        options: &M::Options,
        emitter: &Emitter<M::Action>,
    ) -> Result<SagaOutcome> {
        invocation.state.transition(SagaState::Starting);
        self.hooks.on_start(entity).await?;

        invocation.state.transition(SagaState::Deciding);
        if !self.hooks.should_perform_remote_call(entity).await? {
            invocation.state.transition(SagaState::Skipped);
            info!("Remote call vetoed, finishing");
            self.finish(invocation, entity).await?;
            return Ok(SagaOutcome::Skipped);
        }

        invocation.state.transition(SagaState::Preparing);
        self.hooks.before_remote_call(entity).await?;
        let request = self.lifecycle.create(entity).await?;
        let request = &*invocation.request.insert(request);

        invocation.state.transition(SagaState::Calling);
        invocation.remote_call_issued = true;
        debug!("Issuing remote call");
        let result = match self.remote.dispatch(entity, options).await {
            Ok(result) => result,
            Err(e) => {
                // A failed call left nothing on the remote side to undo.
                invocation.remote_call_issued = false;
                return Err(e);
            }
        };
        let result = &*invocation.result.insert(result);
        debug!("Remote call completed");

        invocation.state.transition(SagaState::Completing);
        self.lifecycle.complete(request).await?;
        self.hooks.after_remote_call(result, entity).await?;

        invocation.state.transition(SagaState::DispatchDeciding);
        if !self.hooks.should_apply_local_action(result, entity).await? {
            invocation.state.transition(SagaState::DispatchSkipped);
            info!("Local action vetoed");
            self.finish(invocation, entity).await?;
            return Ok(SagaOutcome::Completed { applied: false });
        }

        invocation.state.transition(SagaState::Dispatching);
        self.hooks.before_apply_local_action(result, entity).await?;
        let action = self.actions.apply_action(result)?;
        emitter.emit(Emission::Apply(action.clone()));
        invocation.local_apply_issued = true;
        self.hooks
            .after_apply_local_action(&action, result, entity)
            .await?;

        self.finish(invocation, entity).await?;
        Ok(SagaOutcome::Completed { applied: true })
    }

    async fn finish(&self, invocation: &mut Invocation<M>, entity: &M::Entity) -> Result<()> {
        invocation.state.transition(SagaState::Finishing);
        self.hooks.on_finish(entity).await?;
        info!("Saga finished");
        Ok(())
    }

    /// Error path. Every step runs even if an earlier one fails; nothing
    /// escapes to the caller.
    async fn recover(
        &self,
        invocation: &mut Invocation<M>,
        entity: &M::Entity,
        failure: SagaError,
        emitter: &Emitter<M::Action>,
    ) {
        warn!(
            state = invocation.state.as_str(),
            error = %failure,
            "Saga failed, running error path"
        );
        invocation.state.transition(SagaState::ErrorHandling);

        if let Err(e) = self.hooks.on_error(&failure).await {
            error!(error = %e, "on_error hook failed");
        }

        if let Err(e) = self.lifecycle.error(invocation.request.as_ref()).await {
            error!(error = %e, "Request lifecycle error step failed");
        }

        if invocation.local_apply_issued {
            let id = self.resolver.resolve(entity, invocation.result.as_ref());
            match self.actions.compensate_action(id) {
                Ok(action) => {
                    emitter.emit(Emission::Compensate(action));
                    invocation.compensate_emitted = true;
                }
                Err(e) => {
                    error!(error = %e, "Failed to build compensate action");
                }
            }
        }
    }

    /// Cancellation unwind. Runs to completion once started; failures
    /// propagate to the host.
    async fn unwind(
        &self,
        invocation: &mut Invocation<M>,
        entity: &M::Entity,
        emitter: &Emitter<M::Action>,
    ) -> Result<()> {
        info!(
            state = invocation.state.as_str(),
            remote_call_issued = invocation.remote_call_issued,
            local_apply_issued = invocation.local_apply_issued,
            "Saga cancelled, unwinding"
        );
        invocation.state.transition(SagaState::Cancelling);

        let id = self.resolver.resolve(entity, invocation.result.as_ref());
        let action = self.actions.compensate_action(id)?;

        if invocation.remote_call_issued {
            if let Some(request) = invocation.request.as_ref() {
                self.lifecycle.cancel(request).await?;
            }
            debug!("Compensating remote call");
            self.remote
                .compensate(entity, invocation.result.as_ref())
                .await?;
        }

        if invocation.compensate_emitted {
            debug!("Compensate action already emitted by error path");
        } else {
            emitter.emit(Emission::Compensate(action));
            invocation.compensate_emitted = true;
        }

        self.hooks.on_cancel(entity).await?;
        invocation.finish();
        Ok(())
    }
}
