//! Mock action bus implementation for testing.

use std::sync::{Arc, Mutex, MutexGuard};

use super::{ActionBus, Emission};

/// Mock action bus that records every emission.
pub struct MockActionBus<A> {
    published: Mutex<Vec<Emission<A>>>,
}

impl<A: Clone> MockActionBus<A> {
    pub fn new() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
        }
    }

    fn published(&self) -> MutexGuard<'_, Vec<Emission<A>>> {
        self.published.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn published_count(&self) -> usize {
        self.published().len()
    }

    pub fn take_published(&self) -> Vec<Emission<A>> {
        std::mem::take(&mut *self.published())
    }
}

impl<A: Clone> Default for MockActionBus<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Clone + Send + Sync> ActionBus<A> for MockActionBus<A> {
    fn publish(&self, emission: Arc<Emission<A>>) {
        self.published().push((*emission).clone());
    }
}
