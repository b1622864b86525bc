//! Shared travel time cache with time-based expiry.
//!
//! Keys are unordered location pairs: `(a, b)` and `(b, a)` share one slot.
//! When a provider reports different times per direction, directional slots
//! are written as well and win over the shared slot on lookup.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::model::LocationId;

/// Default time-to-live for cached travel times.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Where a travel time came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelTimeSource {
    Api,
    Estimate,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TravelTimeEntry {
    pub minutes: f64,
    pub computed_at: Instant,
    pub source: TravelTimeSource,
}

impl TravelTimeEntry {
    fn is_plausible(&self) -> bool {
        self.minutes.is_finite() && self.minutes >= 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PairKey {
    /// Normalized so the smaller id comes first.
    Shared(LocationId, LocationId),
    Directed(LocationId, LocationId),
}

impl PairKey {
    fn shared(a: &LocationId, b: &LocationId) -> Self {
        if a <= b {
            PairKey::Shared(a.clone(), b.clone())
        } else {
            PairKey::Shared(b.clone(), a.clone())
        }
    }

    fn directed(from: &LocationId, to: &LocationId) -> Self {
        PairKey::Directed(from.clone(), to.clone())
    }
}

/// Thread-safe travel time cache, shared across optimization runs via `Arc`.
#[derive(Debug)]
pub struct TravelTimeCache {
    entries: RwLock<HashMap<PairKey, TravelTimeEntry>>,
    ttl: Duration,
}

impl Default for TravelTimeCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl TravelTimeCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Travel time from `from` to `to`, if cached and fresh.
    pub fn get(&self, from: &LocationId, to: &LocationId) -> Option<TravelTimeEntry> {
        let now = Instant::now();
        let directed = PairKey::directed(from, to);
        let shared = PairKey::shared(from, to);

        let mut corrupt = Vec::new();
        let found = {
            let entries = self.entries.read();
            let mut found = None;
            for key in [&directed, &shared] {
                let Some(entry) = entries.get(key) else {
                    continue;
                };
                if !entry.is_plausible() {
                    corrupt.push(key.clone());
                    continue;
                }
                if now.duration_since(entry.computed_at) > self.ttl {
                    continue;
                }
                found = Some(*entry);
                break;
            }
            found
        };

        if !corrupt.is_empty() {
            self.discard_implausible(corrupt, from, to);
        }

        found
    }

    /// Remove keys that still hold implausible values under the write lock.
    fn discard_implausible(&self, keys: Vec<PairKey>, from: &LocationId, to: &LocationId) {
        let mut entries = self.entries.write();
        for key in keys {
            // A valid value may have been stored since the read lock was released.
            if !entries.get(&key).is_some_and(|entry| !entry.is_plausible()) {
                continue;
            }
            if let Some(entry) = entries.remove(&key) {
                warn!(
                    "Discarding implausible cached travel time {} min for {} -> {}",
                    entry.minutes, from, to
                );
            }
        }
    }

    /// Store a travel time valid in both directions.
    pub fn put(&self, a: &LocationId, b: &LocationId, minutes: f64, source: TravelTimeSource) {
        self.insert(PairKey::shared(a, b), minutes, source);
    }

    /// Store a travel time for one direction only.
    pub fn put_directed(
        &self,
        from: &LocationId,
        to: &LocationId,
        minutes: f64,
        source: TravelTimeSource,
    ) {
        self.insert(PairKey::directed(from, to), minutes, source);
    }

    fn insert(&self, key: PairKey, minutes: f64, source: TravelTimeSource) {
        let entry = TravelTimeEntry {
            minutes,
            computed_at: Instant::now(),
            source,
        };
        self.entries.write().insert(key, entry);
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| now.duration_since(entry.computed_at) <= self.ttl);
        let removed = before - entries.len();
        if removed > 0 {
            debug!("Evicted {} expired travel times", removed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
