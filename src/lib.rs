//! Entity Saga - remote mutation orchestration
//!
//! Runs one remote entity mutation together with the local action that
//! represents it, with an error path that compensates the local action and
//! a cancellation unwind that also compensates the remote side.
//!
//! Callers supply three adapters (`RemoteCall`, `LocalActions`,
//! `RequestLifecycle`) and optional `SagaHooks`, then start invocations from
//! the `EntitySaga` returned by [`run_entity_mutation`].

pub mod adapters;
pub mod bus;
pub mod config;
pub mod error;
pub mod hooks;
pub mod identity;
pub mod mutation;
pub mod orchestration;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use adapters::{LocalActions, NoopLifecycle, RemoteCall, RequestLifecycle};
pub use bus::{ActionBus, ChannelActionBus, Emission};
pub use config::Config;
pub use error::{Result, SagaError};
pub use hooks::{NoopHooks, SagaHooks};
pub use identity::{DefaultIdentityResolver, IdentityResolver};
pub use mutation::Mutation;
pub use orchestration::{
    run_entity_mutation, EntitySaga, SagaOptions, SagaOutcome, SagaState, SagaTask,
};
pub use tokio_util::sync::CancellationToken;
