//! In-memory channel-based action bus.
//!
//! Uses a tokio broadcast channel for pub/sub within a single process.
//! Every subscriber sees every emission, in publish order.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info};

use super::{ActionBus, Emission};
use crate::config::BusSettings;

/// Default channel capacity for broadcast.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Action bus backed by a tokio broadcast channel.
///
/// Slow subscribers that fall more than `capacity` emissions behind observe
/// `RecvError::Lagged` and miss the overwritten ones.
pub struct ChannelActionBus<A> {
    sender: broadcast::Sender<Arc<Emission<A>>>,
}

impl<A: Send + Sync + 'static> ChannelActionBus<A> {
    /// Create a new channel bus. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);

        info!(capacity, "Channel action bus initialized");

        Self { sender }
    }

    pub fn from_settings(settings: &BusSettings) -> Self {
        Self::new(settings.capacity)
    }

    /// Receive every emission published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Emission<A>>> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<A: Send + Sync + 'static> Default for ChannelActionBus<A> {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl<A: Send + Sync + 'static> ActionBus<A> for ChannelActionBus<A> {
    fn publish(&self, emission: Arc<Emission<A>>) {
        let kind = emission.kind();
        // Send to channel (ignore error if no receivers)
        match self.sender.send(emission) {
            Ok(receiver_count) => {
                debug!(kind, receivers = receiver_count, "Published emission to channel");
            }
            Err(_) => {
                debug!(kind, "No subscribers for emission");
            }
        }
    }
}

#[cfg(test)]
mod tests;
