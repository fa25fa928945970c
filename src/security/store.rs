//! Window counter storage.
//!
//! The rate limiter only ever calls [`CounterStore::hit`], which must
//! perform read, reset, increment and write as one atomic step per key.
//! An external store would implement it with an atomic
//! increment-with-expiry primitive.
//!
//! Counters are partitioned by [`ThrottleKey`], which pairs the client
//! identity with the matched route, so quotas are per client per route.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

use crate::security::identity::ClientIdentity;

/// Scope used when a request matched no route.
pub const UNMATCHED_SCOPE: &str = "*";

/// Counter partition: one window per client *and* matched route template.
///
/// A client therefore holds a separate quota on every route; the limit
/// caps requests per route per window, not across the whole service.
/// Requests that matched no route share the [`UNMATCHED_SCOPE`] window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThrottleKey {
    pub identity: ClientIdentity,
    pub scope: String,
}

impl ThrottleKey {
    pub fn new(identity: ClientIdentity, route: Option<&str>) -> Self {
        Self {
            identity,
            scope: route.unwrap_or(UNMATCHED_SCOPE).to_string(),
        }
    }
}

/// Counter state after a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    /// Requests counted in the current window, including this one.
    pub count: u64,
    /// Time left until the window resets.
    pub resets_in: Duration,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("counter store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Count one request against `key` in a window of length `ttl`.
    async fn hit(&self, key: &ThrottleKey, ttl: Duration) -> Result<Hit, StoreError>;

    /// Drop counters whose window has elapsed. Returns how many were removed.
    async fn sweep(&self) -> Result<usize, StoreError>;

    /// Number of live counters.
    async fn tracked_keys(&self) -> Result<usize, StoreError>;
}

#[derive(Debug, Clone, Copy)]
struct WindowCounter {
    count: u64,
    window_start: Instant,
    ttl: Duration,
}

impl WindowCounter {
    fn expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.window_start) >= self.ttl
    }
}

/// In-process store on a sharded concurrent map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    counters: DashMap<ThrottleKey, WindowCounter>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// [`CounterStore::hit`] at an explicit instant.
    pub fn hit_at(&self, key: &ThrottleKey, ttl: Duration, now: Instant) -> Hit {
        // The entry guard holds the shard lock for the whole update.
        let mut entry = self
            .counters
            .entry(key.clone())
            .or_insert(WindowCounter {
                count: 0,
                window_start: now,
                ttl,
            });
        let counter = entry.value_mut();
        counter.ttl = ttl;

        if counter.expired(now) {
            counter.count = 0;
            counter.window_start = now;
        }
        counter.count += 1;

        Hit {
            count: counter.count,
            resets_in: (counter.window_start + ttl).saturating_duration_since(now),
        }
    }

    /// [`CounterStore::sweep`] at an explicit instant.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let before = self.counters.len();
        self.counters.retain(|_, counter| !counter.expired(now));
        before.saturating_sub(self.counters.len())
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn hit(&self, key: &ThrottleKey, ttl: Duration) -> Result<Hit, StoreError> {
        Ok(self.hit_at(key, ttl, Instant::now()))
    }

    async fn sweep(&self) -> Result<usize, StoreError> {
        Ok(self.sweep_at(Instant::now()))
    }

    async fn tracked_keys(&self) -> Result<usize, StoreError> {
        Ok(self.len())
    }
}
