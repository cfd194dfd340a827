// src/ancestry/cache.rs

use revtag::{validate_parent_list_bounded, RevisionTag};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use super::pending::{PendingLookup, RequestThrottle};
use super::{snapshot, AncestryConfig, Parents};
use crate::error::{AncestryError, Result};
use crate::services::{ParentRequester, RevisionStorage};

struct State {
    known: HashMap<RevisionTag, Parents>,
    pending: HashMap<RevisionTag, PendingLookup>,
    throttle: RequestThrottle,
}

impl State {
    fn new(retry_interval: Duration) -> Self {
        let mut known = HashMap::new();
        known.insert(RevisionTag::blank(), Parents::from(Vec::new()));
        Self {
            known,
            pending: HashMap::new(),
            throttle: RequestThrottle::new(retry_interval),
        }
    }
}

/// One per archive. Shared (behind an `Arc`) by every search running against that archive.
///
/// All state sits behind a single mutex, and registering a waiter happens under the same
/// lock as the "already known?" re-check, so a response delivered concurrently is never
/// missed. The lock is never held across an `.await` or a collaborator call.
pub struct AncestryCache {
    storage: Arc<dyn RevisionStorage>,
    swarm: Arc<dyn ParentRequester>,
    config: AncestryConfig,
    state: Mutex<State>,
    next_waiter: AtomicU64,
}

impl AncestryCache {
    pub fn new(
        storage: Arc<dyn RevisionStorage>,
        swarm: Arc<dyn ParentRequester>,
        config: AncestryConfig,
    ) -> Self {
        let state = Mutex::new(State::new(config.retry_interval));
        Self {
            storage,
            swarm,
            config,
            state,
            next_waiter: AtomicU64::new(0),
        }
    }

    /// Like [`AncestryCache::new`], then warm the ancestry set from the configured snapshot,
    /// falling back to a rescan of local storage when the snapshot is missing or unusable.
    pub fn open(
        storage: Arc<dyn RevisionStorage>,
        swarm: Arc<dyn ParentRequester>,
        config: AncestryConfig,
    ) -> Self {
        let cache = Self::new(storage, swarm, config);
        let Some(path) = cache.config.snapshot_path.clone() else {
            return cache;
        };

        if path.exists() {
            match cache.load_snapshot() {
                Ok(loaded) => {
                    info!(path = ?path, loaded, "ancestry snapshot loaded");
                    return cache;
                }
                Err(err) => warn!(path = ?path, error = %err, "ancestry snapshot unusable; rescanning"),
            }
        } else {
            info!(path = ?path, "no ancestry snapshot; rescanning local revisions");
        }
        let found = cache.rescan_local();
        info!(found, "ancestry set rebuilt from local storage");
        cache
    }

    pub fn config(&self) -> &AncestryConfig {
        &self.config
    }

    pub fn default_lookup_timeout(&self) -> Option<Duration> {
        self.config.lookup_timeout
    }

    pub fn storage(&self) -> &Arc<dyn RevisionStorage> {
        &self.storage
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of memoized entries (the blank tag included).
    pub fn len(&self) -> usize {
        self.lock().known.len()
    }

    /// True when nothing besides the blank tag is memoized.
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    /// Number of tags with at least one waiter.
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn has_parents_for_tag(&self, tag: &RevisionTag) -> bool {
        self.parents_for_tag_nonblocking(tag).is_some()
    }

    /// Cache or local storage only; never asks peers.
    pub fn parents_for_tag_nonblocking(&self, tag: &RevisionTag) -> Option<Parents> {
        if let Some(parents) = self.lock().known.get(tag) {
            return Some(parents.clone());
        }
        self.load_local(tag)
    }

    /// Parents of `tag` with the configured default timeout.
    pub async fn parents_for_tag(&self, tag: &RevisionTag) -> Result<Parents> {
        self.parents_for_tag_with_timeout(tag, self.config.lookup_timeout)
            .await
    }

    /// Parents of `tag`, asking peers if needed and waiting at most `timeout` (`None` waits
    /// forever). A timeout affects only this caller; other waiters on the same tag keep
    /// waiting on their own deadlines.
    pub async fn parents_for_tag_with_timeout(
        &self,
        tag: &RevisionTag,
        timeout: Option<Duration>,
    ) -> Result<Parents> {
        if let Some(parents) = self.parents_for_tag_nonblocking(tag) {
            return Ok(parents);
        }

        let id = self.next_waiter.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        let send_request = {
            let mut state = self.lock();
            if let Some(parents) = state.known.get(tag) {
                return Ok(parents.clone());
            }
            state.pending.entry(*tag).or_default().push(id, tx);
            let now = Instant::now();
            let send = state.throttle.should_request(tag, now);
            if send {
                state.throttle.mark_requested(*tag, now);
            }
            send
        };
        let _guard = WaiterGuard { cache: self, tag: *tag, id };

        if send_request {
            debug!(tag = %tag, priority = self.config.request_priority, "requesting parents from peers");
            self.swarm.request_parents(tag, self.config.request_priority);
        } else {
            trace!(tag = %tag, "parent request throttled; waiting on earlier request");
        }

        let delivered = match timeout {
            Some(limit) => tokio::time::timeout(limit, rx).await.ok(),
            None => Some(rx.await),
        };
        match delivered {
            Some(Ok(parents)) => Ok(parents),
            Some(Err(_)) => {
                debug!(tag = %tag, "parent lookup abandoned");
                Err(AncestryError::NotFound { tag: *tag })
            }
            None => {
                debug!(tag = %tag, ?timeout, "parent lookup timed out");
                Err(AncestryError::NotFound { tag: *tag })
            }
        }
    }

    /// Insert parents produced locally (e.g. by the layer that just committed `tag`).
    pub fn add_parents_for_tag(&self, tag: &RevisionTag, parents: Vec<RevisionTag>) -> Result<Parents> {
        validate_parent_list_bounded(tag, &parents, self.config.max_parents)?;
        Ok(self.insert(*tag, parents))
    }

    /// Network response path. An invalid list is logged and dropped; the cache and any
    /// waiters are left exactly as they were.
    pub fn receive_parents(&self, tag: &RevisionTag, parents: Vec<RevisionTag>) -> Result<()> {
        if let Err(err) = validate_parent_list_bounded(tag, &parents, self.config.max_parents) {
            warn!(tag = %tag, error = %err, "discarding parent list from peer");
            return Err(err.into());
        }
        self.insert(*tag, parents);
        Ok(())
    }

    /// Forget everything memoized. Current waiters observe "not found".
    pub fn clear(&self) {
        let dropped = {
            let mut state = self.lock();
            let dropped = std::mem::take(&mut state.pending);
            *state = State::new(self.config.retry_interval);
            dropped
        };
        debug!(waiters = dropped.len(), "ancestry cache cleared");
    }

    /// Read, validate and memoize the parents of a locally stored revision.
    fn load_local(&self, tag: &RevisionTag) -> Option<Parents> {
        if !self.storage.has_local_content(tag) {
            return None;
        }
        let declared = match self.storage.read_declared_parents(tag) {
            Ok(declared) => declared,
            Err(err) => {
                warn!(tag = %tag, error = %err, "unable to read local parent list");
                return None;
            }
        };
        if let Err(err) = validate_parent_list_bounded(tag, &declared, self.config.max_parents) {
            warn!(tag = %tag, error = %err, "local parent list failed validation");
            return None;
        }
        Some(self.insert(*tag, declared))
    }

    /// Memoize an already validated list and wake everyone waiting on it. The first list
    /// inserted for a tag wins.
    fn insert(&self, tag: RevisionTag, parents: Vec<RevisionTag>) -> Parents {
        let (parents, waiting) = {
            let mut state = self.lock();
            let parents = state
                .known
                .entry(tag)
                .or_insert_with(|| Parents::from(parents))
                .clone();
            state.throttle.forget(&tag);
            (parents, state.pending.remove(&tag))
        };

        if let Some(lookup) = waiting {
            trace!(tag = %tag, waiters = lookup.waiters.len(), "waking parent waiters");
            for waiter in lookup.waiters {
                let _ = waiter.tx.send(parents.clone());
            }
        }
        parents
    }

    /// Persist the ancestry set to the configured snapshot path. Returns the record count.
    pub fn save_snapshot(&self) -> anyhow::Result<usize> {
        let Some(path) = self.config.snapshot_path.as_deref() else {
            anyhow::bail!("ancestry persistence is disabled");
        };
        let entries: Vec<(RevisionTag, Parents)> = {
            let state = self.lock();
            state
                .known
                .iter()
                .filter(|(tag, _)| !tag.is_blank())
                .map(|(tag, parents)| (*tag, parents.clone()))
                .collect()
        };
        snapshot::write_file(path, entries.iter().map(|(tag, parents)| (tag, &parents[..])))?;
        debug!(path = ?path, records = entries.len(), "ancestry snapshot written");
        Ok(entries.len())
    }

    /// Merge the configured snapshot into the ancestry set. Records that fail validation are
    /// skipped. Returns the number accepted.
    pub fn load_snapshot(&self) -> anyhow::Result<usize> {
        let Some(path) = self.config.snapshot_path.as_deref() else {
            anyhow::bail!("ancestry persistence is disabled");
        };
        let mut accepted = 0;
        for (tag, parents) in snapshot::read_file(path)? {
            match self.add_parents_for_tag(&tag, parents) {
                Ok(_) => accepted += 1,
                Err(err) => warn!(tag = %tag, error = %err, "skipping invalid snapshot record"),
            }
        }
        Ok(accepted)
    }

    /// Memoize every locally stored revision. Returns how many were accepted.
    pub fn rescan_local(&self) -> usize {
        self.storage
            .local_revisions()
            .iter()
            .filter(|tag| self.load_local(tag).is_some())
            .count()
    }
}

impl std::fmt::Debug for AncestryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("AncestryCache")
            .field("known", &state.known.len())
            .field("pending", &state.pending.len())
            .field("config", &self.config)
            .finish()
    }
}

/// Deregisters a waiter when its lookup ends for any reason (delivery, timeout, or the
/// caller's future being dropped).
struct WaiterGuard<'a> {
    cache: &'a AncestryCache,
    tag: RevisionTag,
    id: u64,
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.cache.lock();
        if let Some(lookup) = state.pending.get_mut(&self.tag) {
            if lookup.remove(self.id) {
                state.pending.remove(&self.tag);
            }
        }
    }
}
