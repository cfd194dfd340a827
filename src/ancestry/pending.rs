//! Waiters and request throttling for tags whose parents are not known yet.

use revtag::RevisionTag;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::debug;

use super::Parents;

/// Upper bound on remembered request timestamps before stale ones are swept.
const MAX_TRACKED_REQUESTS: usize = 16_384;

/// One caller blocked on a tag's parents.
#[derive(Debug)]
pub(super) struct Waiter {
    pub(super) id: u64,
    pub(super) tx: oneshot::Sender<Parents>,
}

/// Everyone currently waiting on one tag.
#[derive(Debug, Default)]
pub(super) struct PendingLookup {
    pub(super) waiters: Vec<Waiter>,
}

impl PendingLookup {
    pub(super) fn push(&mut self, id: u64, tx: oneshot::Sender<Parents>) {
        self.waiters.push(Waiter { id, tx });
    }

    /// Drop waiter `id`. Returns true once nobody is left.
    pub(super) fn remove(&mut self, id: u64) -> bool {
        self.waiters.retain(|w| w.id != id);
        self.waiters.is_empty()
    }
}

/// Last network request per tag.
///
/// Kept apart from the waiter lists: a tag whose waiters all timed out is still not
/// re-requested until the retry interval has passed.
#[derive(Debug)]
pub(super) struct RequestThrottle {
    retry_interval: Duration,
    requested: HashMap<RevisionTag, Instant>,
}

impl RequestThrottle {
    pub(super) fn new(retry_interval: Duration) -> Self {
        Self {
            retry_interval,
            requested: HashMap::new(),
        }
    }

    /// True if no request for `tag` went out within the retry interval.
    pub(super) fn should_request(&self, tag: &RevisionTag, now: Instant) -> bool {
        match self.requested.get(tag) {
            Some(at) => now.duration_since(*at) >= self.retry_interval,
            None => true,
        }
    }

    pub(super) fn mark_requested(&mut self, tag: RevisionTag, now: Instant) {
        if self.requested.len() >= MAX_TRACKED_REQUESTS {
            self.cleanup(now);
        }
        self.requested.insert(tag, now);
    }

    /// The tag resolved; future lookups never reach the network.
    pub(super) fn forget(&mut self, tag: &RevisionTag) {
        self.requested.remove(tag);
    }

    /// Drop timestamps older than the retry interval; they no longer throttle anything.
    fn cleanup(&mut self, now: Instant) {
        let before = self.requested.len();
        let interval = self.retry_interval;
        self.requested
            .retain(|_, at| now.duration_since(*at) < interval);
        debug!(
            removed = before - self.requested.len(),
            remaining = self.requested.len(),
            "swept stale request timestamps"
        );
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.requested.len()
    }
}
