//! Response cache and in-flight request table.
//!
//! Both are owned by a single client and shared across tasks, so each sits behind its own mutex.
//! Neither lock is ever held across an await point.

use crate::{ApiError, ApiResponse};
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

struct CacheEntry {
    response: ApiResponse,
    captured_at: Instant,
    /// The TTL the entry was stored with. Only used to prune; lookups bring their own.
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.captured_at.elapsed() < ttl
    }
}

#[derive(Default)]
pub(crate) struct ResponseCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl ResponseCache {
    /// The cached response for `key`, if it was captured less than `ttl` ago.
    ///
    /// A stale entry is dropped on the way out.
    pub(crate) fn get(&self, key: &str, ttl: Duration) -> Option<ApiResponse> {
        let mut entries = self.entries.lock();
        let entry = entries.get(key)?;
        if entry.is_fresh(ttl) {
            return Some(entry.response.clone());
        }
        entries.remove(key);
        None
    }

    /// Stores `response` under `key`, pruning every entry that outlived its own TTL.
    pub(crate) fn insert(&self, key: String, response: ApiResponse, ttl: Duration) {
        let mut entries = self.entries.lock();
        entries.retain(|_, entry| entry.is_fresh(entry.ttl));
        entries.insert(
            key,
            CacheEntry {
                response,
                captured_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Drops everything, or only keys containing `target`.
    pub(crate) fn invalidate(&self, target: Option<&str>) {
        let mut entries = self.entries.lock();
        match target {
            None => entries.clear(),
            Some(target) => entries.retain(|key, _| !key.contains(target)),
        }
    }
}

pub(crate) type SharedResponse = Shared<BoxFuture<'static, Result<ApiResponse, ApiError>>>;

/// Requests that are currently on the wire, keyed like the cache.
#[derive(Default)]
pub(crate) struct InFlight {
    pending: Mutex<HashMap<String, (u64, SharedResponse)>>,
    next_id: AtomicU64,
}

/// Whether the caller started the request or joined one already running.
pub(crate) enum Slot<'a> {
    Leader(SharedResponse, PendingGuard<'a>),
    Follower(SharedResponse),
}

impl InFlight {
    /// Joins the request running under `key`, or starts one with `start`.
    pub(crate) fn join_or_start(
        &self,
        key: &str,
        start: impl FnOnce() -> BoxFuture<'static, Result<ApiResponse, ApiError>>,
    ) -> Slot<'_> {
        let mut pending = self.pending.lock();
        if let Some((_, shared)) = pending.get(key) {
            return Slot::Follower(shared.clone());
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let shared = futures::FutureExt::shared(start());
        pending.insert(key.to_string(), (id, shared.clone()));
        Slot::Leader(
            shared,
            PendingGuard {
                in_flight: self,
                key: key.to_string(),
                id,
            },
        )
    }

    pub(crate) fn clear(&self) {
        self.pending.lock().clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.pending.lock().len()
    }
}

#[cfg(test)]
impl ResponseCache {
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Removes the leader's entry when dropped, whether the request succeeded, failed, or the leader
/// itself was cancelled.
pub(crate) struct PendingGuard<'a> {
    in_flight: &'a InFlight,
    key: String,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut pending = self.in_flight.pending.lock();
        // The entry may have been cleared and replaced by a newer request in the meantime.
        if pending.get(&self.key).is_some_and(|(id, _)| *id == self.id) {
            pending.remove(&self.key);
        }
    }
}
