//! Supersession of in-flight optimization runs.
//!
//! When a traveler's itinerary changes while a run is still resolving travel
//! times, the new run cancels the old one so it stops using provider capacity.
//! Delaying the first run (debounce) is left to the caller.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

struct RunEntry {
    token: CancellationToken,
    generation: u64,
}

/// Thread-safe registry of the latest run per key (user, itinerary, ...).
#[derive(Clone, Default)]
pub struct RunRegistry {
    runs: Arc<Mutex<HashMap<String, RunEntry>>>,
    next_generation: Arc<AtomicU64>,
}

/// Keeps a run registered; unregisters on drop unless already superseded.
pub struct RunGuard {
    key: String,
    generation: u64,
    token: CancellationToken,
    registry: RunRegistry,
}

impl RunGuard {
    /// Token to pass to the planner for this run.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_superseded(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut runs = self.registry.runs.lock();
        if runs
            .get(&self.key)
            .is_some_and(|entry| entry.generation == self.generation)
        {
            runs.remove(&self.key);
        }
    }
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a run for `key`, cancelling any earlier run for the same key.
    pub fn begin(&self, key: impl Into<String>) -> RunGuard {
        let key = key.into();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let token = CancellationToken::new();

        let previous = self.runs.lock().insert(
            key.clone(),
            RunEntry {
                token: token.clone(),
                generation,
            },
        );
        if let Some(previous) = previous {
            debug!("Superseding optimization run for {}", key);
            previous.token.cancel();
        }

        RunGuard {
            key,
            generation,
            token,
            registry: self.clone(),
        }
    }

    /// Cancel the current run for `key`. Returns whether one was running.
    pub fn cancel(&self, key: &str) -> bool {
        match self.runs.lock().remove(key) {
            Some(entry) => {
                entry.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, key: &str) -> bool {
        self.runs.lock().contains_key(key)
    }
}
