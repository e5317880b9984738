// =============================================================================
// TTL Cache — memoized computations with single-flight misses
// =============================================================================
//
// Wraps an expensive per-key computation (aggregate stats, trust scores) in a
// bounded-lifetime memo. Each key owns its own slot mutex, held across the
// compute: concurrent callers hitting the same cold key run ONE computation
// while the rest wait and reuse the result. Different keys never contend.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

struct Slot<V> {
    value: Option<(Instant, V)>,
}

impl<V> Default for Slot<V> {
    fn default() -> Self {
        Self { value: None }
    }
}

/// Time-bounded memo of per-key computations.
pub struct TtlCache<V> {
    ttl: Duration,
    slots: Mutex<HashMap<String, Arc<Mutex<Slot<V>>>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached value for `key` if fresh, otherwise run `compute`
    /// and cache its result.
    ///
    /// The slot lock is held across the compute, which is what serializes
    /// concurrent misses for the same key.
    pub fn get_or_compute(&self, key: &str, compute: impl FnOnce() -> V) -> V {
        let slot = {
            let mut slots = self.slots.lock();
            slots.entry(key.to_string()).or_default().clone()
        };

        let mut slot = slot.lock();
        if let Some((cached_at, value)) = &slot.value {
            if cached_at.elapsed() < self.ttl {
                return value.clone();
            }
        }

        let value = compute();
        slot.value = Some((Instant::now(), value.clone()));
        value
    }

    /// Peek without computing; `None` on a miss or a stale entry.
    pub fn get_if_fresh(&self, key: &str) -> Option<V> {
        let slot = self.slots.lock().get(key).cloned()?;
        let slot = slot.lock();
        match &slot.value {
            Some((cached_at, value)) if cached_at.elapsed() < self.ttl => Some(value.clone()),
            _ => None,
        }
    }

    /// Drop one key's cached value.
    pub fn invalidate(&self, key: &str) {
        self.slots.lock().remove(key);
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.slots.lock().clear();
    }
}
