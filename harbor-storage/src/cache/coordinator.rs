//! Single-flight registry of in-progress fetch pipelines.
//!
//! At most one pipeline runs per key. Callers that arrive while it runs
//! join its shared future instead of starting another fetch, and all of
//! them observe the same outcome.

use std::collections::HashMap;

use futures_util::future::{BoxFuture, Shared};
use harbor_core::{AssetRef, CacheKey};

/// Outcome of a pipeline as seen by every joined caller.
pub type FetchOutcome<A> = Option<AssetRef<A>>;

/// Awaitable handle shared by every caller of one pipeline.
pub type SharedFetch<A> = Shared<BoxFuture<'static, FetchOutcome<A>>>;

/// Identifies one pipeline run, so a finished run only retires itself.
pub type FlightId = u64;

struct PendingFetch<A> {
    flight_id: FlightId,
    fetch: SharedFetch<A>,
}

/// Map from key to the pipeline currently fetching it.
///
/// Like `MemoryTier`, this has no lock of its own and lives inside the
/// orchestrator's state mutex.
pub struct FetchCoordinator<A> {
    pending: HashMap<CacheKey, PendingFetch<A>>,
    next_flight_id: FlightId,
}

impl<A> Default for FetchCoordinator<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> FetchCoordinator<A> {
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
            next_flight_id: 0,
        }
    }

    /// Allocate the id for a pipeline about to be registered.
    pub fn next_flight_id(&mut self) -> FlightId {
        self.next_flight_id = self.next_flight_id.wrapping_add(1);
        self.next_flight_id
    }

    /// The running pipeline for `key`, if any.
    pub fn join(&self, key: &CacheKey) -> Option<SharedFetch<A>> {
        self.pending.get(key).map(|pending| pending.fetch.clone())
    }

    /// Make a freshly started pipeline discoverable to concurrent callers.
    ///
    /// Callers must check [`join`](Self::join) first under the same lock; a
    /// registration that replaces a live one would break single-flight.
    pub fn register(&mut self, key: CacheKey, flight_id: FlightId, fetch: SharedFetch<A>) {
        let previous = self.pending.insert(key, PendingFetch { flight_id, fetch });
        debug_assert!(previous.is_none(), "pipeline registered twice for one key");
    }

    /// Remove the registration for `key` if it still belongs to `flight_id`.
    ///
    /// Returns whether an entry was removed. A pipeline whose registration
    /// was cleared (disposal) and replaced by a newer one leaves the newer
    /// one alone.
    pub fn retire(&mut self, key: &CacheKey, flight_id: FlightId) -> bool {
        match self.pending.get(key) {
            Some(pending) if pending.flight_id == flight_id => {
                self.pending.remove(key);
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self, key: &CacheKey) -> bool {
        self.pending.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Forget every registration. Running pipelines are not aborted.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
