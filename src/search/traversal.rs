// src/search/traversal.rs

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use revtag::RevisionTag;
use std::collections::{BTreeMap, HashSet};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, trace, Instrument};
use uuid::Uuid;

use super::Visitor;
use crate::ancestry::{AncestryCache, Parents};
use crate::error::Result;

type Lookup = BoxFuture<'static, (RevisionTag, Result<Parents>)>;

/// How a search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The visitor asked to stop.
    Stopped,
    /// Nothing left to expand above the gate.
    Exhausted,
    Cancelled,
}

/// Outcome of draining in-flight lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Drain {
    /// No lookups left in flight; held work may remain below the gate.
    Idle,
    Stopped,
    Cancelled,
}

/// A lazily expanding ancestor search.
///
/// Each reachable tag is looked up at most once. Tags below `min_height` are held in
/// per-height wait-lists until the gate is lowered to their height. A standalone traversal
/// treats the gate as a floor: anything still held when the last lookup returns is simply
/// never expanded.
pub struct Traversal {
    cache: Arc<AncestryCache>,
    lookup_timeout: Option<Duration>,
    search_id: Uuid,
    cancel: CancellationToken,
    min_height: u64,
    seen: HashSet<RevisionTag>,
    queried: HashSet<RevisionTag>,
    pending: HashSet<RevisionTag>,
    held: BTreeMap<u64, Vec<RevisionTag>>,
    in_flight: FuturesUnordered<Lookup>,
    missing: Vec<RevisionTag>,
    completion: Option<Completion>,
}

impl Traversal {
    pub fn new(cache: Arc<AncestryCache>) -> Self {
        Self::with_cancel(cache, CancellationToken::new())
    }

    /// A traversal that stops early once `cancel` fires.
    pub fn with_cancel(cache: Arc<AncestryCache>, cancel: CancellationToken) -> Self {
        Self::build(cache, cancel, Uuid::new_v4())
    }

    pub(crate) fn build(cache: Arc<AncestryCache>, cancel: CancellationToken, search_id: Uuid) -> Self {
        let lookup_timeout = cache.default_lookup_timeout();
        Self {
            cache,
            lookup_timeout,
            search_id,
            cancel,
            min_height: 0,
            seen: HashSet::new(),
            queried: HashSet::new(),
            pending: HashSet::new(),
            held: BTreeMap::new(),
            in_flight: FuturesUnordered::new(),
            missing: Vec::new(),
            completion: None,
        }
    }

    /// Per-lookup deadline for this search (`None` waits forever).
    pub fn with_lookup_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    pub fn search_id(&self) -> Uuid {
        self.search_id
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn min_height(&self) -> u64 {
        self.min_height
    }

    /// Tags whose parents could not be resolved, in the order they failed.
    pub fn missing(&self) -> &[RevisionTag] {
        &self.missing
    }

    pub fn is_complete(&self) -> bool {
        self.completion.is_some()
    }

    /// Tags with a lookup currently in flight.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Queue `tag` for expansion. Already queried tags are ignored.
    pub fn traverse_from(&mut self, tag: RevisionTag) {
        if self.completion.is_some() || !self.queried.insert(tag) {
            return;
        }
        if tag.height() < self.min_height {
            trace!(tag = %tag, gate = self.min_height, "holding tag below gate");
            self.held.entry(tag.height()).or_default().push(tag);
        } else {
            self.start_lookup(tag);
        }
    }

    /// Start from every branch tip known to local storage.
    pub fn traverse_from_branch_tips(&mut self) {
        for tip in self.cache.storage().branch_tips() {
            self.traverse_from(tip);
        }
    }

    /// Move the gate. Lowering it releases every held tag at or above `height`, tallest tier
    /// first and in arrival order within a tier.
    pub fn set_min_height(&mut self, height: u64) {
        self.min_height = height;
        let released = self.held.split_off(&height);
        for (_, tags) in released.into_iter().rev() {
            for tag in tags {
                self.start_lookup(tag);
            }
        }
    }

    pub fn has_queued_at_height(&self, height: u64) -> bool {
        self.held.contains_key(&height)
    }

    /// Tallest height with held work, if any.
    pub fn next_held_height(&self) -> Option<u64> {
        self.held.keys().next_back().copied()
    }

    fn start_lookup(&mut self, tag: RevisionTag) {
        self.pending.insert(tag);
        let cache = self.cache.clone();
        let timeout = self.lookup_timeout;
        self.in_flight.push(
            async move {
                let outcome = cache.parents_for_tag_with_timeout(&tag, timeout).await;
                (tag, outcome)
            }
            .boxed(),
        );
    }

    /// Run until the visitor stops, the token fires, or nothing is left above the gate.
    pub async fn run<V: Visitor + ?Sized>(&mut self, visitor: &mut V) -> Completion {
        if let Some(done) = self.completion {
            return done;
        }
        let span = debug_span!("traversal", search_id = %self.search_id);
        async {
            let completion = match self.drain(visitor).await {
                Drain::Idle => Completion::Exhausted,
                Drain::Stopped => Completion::Stopped,
                Drain::Cancelled => Completion::Cancelled,
            };
            self.finish(visitor, completion);
            debug!(?completion, missing = self.missing.len(), "traversal finished");
            completion
        }
        .instrument(span)
        .await
    }

    /// Process lookups until none are in flight.
    pub(crate) async fn drain<V: Visitor + ?Sized>(&mut self, visitor: &mut V) -> Drain {
        if self.completion.is_some() {
            return Drain::Stopped;
        }
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                next = self.in_flight.next() => Some(next),
            };
            let (tag, outcome) = match next {
                None => return Drain::Cancelled,
                Some(None) => return Drain::Idle,
                Some(Some(resolved)) => resolved,
            };
            self.pending.remove(&tag);

            match outcome {
                Ok(parents) => {
                    if self.deliver(tag, &parents, visitor).is_break() {
                        return Drain::Stopped;
                    }
                }
                Err(err) => {
                    debug!(tag = %tag, error = %err, "ancestor lookup failed");
                    self.missing.push(tag);
                    visitor.not_found(&tag, &err);
                }
            }
        }
    }

    fn deliver<V: Visitor + ?Sized>(
        &mut self,
        tag: RevisionTag,
        parents: &[RevisionTag],
        visitor: &mut V,
    ) -> ControlFlow<()> {
        if self.seen.insert(tag) {
            visitor.encountered(&tag)?;
        }
        for parent in parents {
            if self.seen.insert(*parent) {
                visitor.encountered(parent)?;
            }
        }
        for parent in parents {
            self.traverse_from(*parent);
        }
        ControlFlow::Continue(())
    }

    /// Conclude the search: drop outstanding lookups and held work and report `finished`
    /// once. Later calls are no-ops.
    pub(crate) fn finish<V: Visitor + ?Sized>(&mut self, visitor: &mut V, completion: Completion) {
        if self.completion.is_some() {
            return;
        }
        self.completion = Some(completion);
        self.in_flight = FuturesUnordered::new();
        self.pending.clear();
        self.held.clear();
        visitor.finished();
    }
}

impl std::fmt::Debug for Traversal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Traversal")
            .field("search_id", &self.search_id)
            .field("min_height", &self.min_height)
            .field("seen", &self.seen.len())
            .field("pending", &self.pending.len())
            .field("held", &self.held.len())
            .field("completion", &self.completion)
            .finish()
    }
}
