//! Observable local actions.
//!
//! This module contains:
//! - `Emission`: an apply or compensate action emitted by an invocation
//! - `ActionBus` trait: host-side fan-out of emissions
//! - Implementations: in-process broadcast channel, Mock

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

pub mod channel;
pub mod mock;

pub use channel::ChannelActionBus;
pub use mock::MockActionBus;

/// A local action observed by downstream consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emission<A> {
    /// The entity's new state should be applied.
    Apply(A),
    /// A previously applied action should be undone.
    Compensate(A),
}

impl<A> Emission<A> {
    pub fn action(&self) -> &A {
        match self {
            Emission::Apply(action) | Emission::Compensate(action) => action,
        }
    }

    pub fn into_action(self) -> A {
        match self {
            Emission::Apply(action) | Emission::Compensate(action) => action,
        }
    }

    pub fn is_apply(&self) -> bool {
        matches!(self, Emission::Apply(_))
    }

    pub fn is_compensate(&self) -> bool {
        matches!(self, Emission::Compensate(_))
    }

    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Emission::Apply(_) => "apply",
            Emission::Compensate(_) => "compensate",
        }
    }
}

/// Host action bus (store dispatcher, event stream, ...).
///
/// Publishing cannot fail: an emission is a fact about the invocation, and
/// a bus with no listeners simply drops it.
pub trait ActionBus<A>: Send + Sync {
    fn publish(&self, emission: Arc<Emission<A>>);
}

/// Delivers emissions of one invocation to its task stream and, if
/// configured, the shared host bus.
pub(crate) struct Emitter<A> {
    sender: mpsc::UnboundedSender<Emission<A>>,
    bus: Option<Arc<dyn ActionBus<A>>>,
}

impl<A: Clone> Emitter<A> {
    pub(crate) fn new(
        sender: mpsc::UnboundedSender<Emission<A>>,
        bus: Option<Arc<dyn ActionBus<A>>>,
    ) -> Self {
        Self { sender, bus }
    }

    pub(crate) fn emit(&self, emission: Emission<A>) {
        debug!(kind = emission.kind(), "Emitting local action");
        if let Some(bus) = &self.bus {
            bus.publish(Arc::new(emission.clone()));
        }
        // A dropped task stream only means nobody is watching this invocation.
        let _ = self.sender.send(emission);
    }
}
