// src/search/parallel.rs

use futures::future::join_all;
use revtag::RevisionTag;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, trace, Instrument};
use uuid::Uuid;

use super::traversal::{Completion, Drain, Traversal};
use super::{Tier, TierVisitor, Visitor};
use crate::ancestry::AncestryCache;
use crate::error::AncestryError;

/// How a lock-step search ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParallelCompletion {
    /// The tier visitor asked to stop.
    Stopped,
    /// Every origin ran out of ancestors.
    Exhausted,
    /// Some origin could not resolve the parents of this tag.
    NotFound(RevisionTag),
    Cancelled,
}

/// What one origin has found so far, bucketed by height.
#[derive(Debug, Default)]
struct TierAccumulator {
    by_height: BTreeMap<u64, BTreeSet<RevisionTag>>,
    missing: Option<RevisionTag>,
}

impl Visitor for TierAccumulator {
    fn encountered(&mut self, tag: &RevisionTag) -> ControlFlow<()> {
        self.by_height.entry(tag.height()).or_default().insert(*tag);
        ControlFlow::Continue(())
    }

    fn not_found(&mut self, tag: &RevisionTag, _error: &AncestryError) {
        self.missing.get_or_insert(*tag);
    }
}

#[derive(Debug)]
struct Lane {
    origin: RevisionTag,
    traversal: Traversal,
    found: TierAccumulator,
}

/// One [`Traversal`] per origin, advanced one height tier at a time.
///
/// Each round lowers every lane's gate to the tallest height any lane still holds work at,
/// drains all lanes, and only then hands the completed tier to the visitor. Tiers in which
/// no lane holds work are skipped.
pub struct ParallelTraversal {
    lanes: Vec<Lane>,
    cancel: CancellationToken,
    search_id: Uuid,
    completion: Option<ParallelCompletion>,
}

impl ParallelTraversal {
    pub fn new(cache: Arc<AncestryCache>, origins: impl IntoIterator<Item = RevisionTag>) -> Self {
        Self::with_cancel(cache, origins, CancellationToken::new())
    }

    /// Cancelling `cancel` cancels every lane.
    pub fn with_cancel(
        cache: Arc<AncestryCache>,
        origins: impl IntoIterator<Item = RevisionTag>,
        cancel: CancellationToken,
    ) -> Self {
        let origins: BTreeSet<RevisionTag> = origins.into_iter().collect();
        let search_id = Uuid::new_v4();
        let gate = origins
            .iter()
            .map(|tag| tag.height())
            .max()
            .unwrap_or(0)
            .saturating_add(1);

        let lanes = origins
            .into_iter()
            .map(|origin| {
                let mut traversal = Traversal::build(cache.clone(), cancel.child_token(), search_id);
                traversal.set_min_height(gate);
                traversal.traverse_from(origin);
                Lane {
                    origin,
                    traversal,
                    found: TierAccumulator::default(),
                }
            })
            .collect();

        Self {
            lanes,
            cancel,
            search_id,
            completion: None,
        }
    }

    /// Per-lookup deadline for every lane.
    pub fn with_lookup_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lanes = self
            .lanes
            .into_iter()
            .map(|mut lane| {
                lane.traversal = lane.traversal.with_lookup_timeout(timeout);
                lane
            })
            .collect();
        self
    }

    pub fn search_id(&self) -> Uuid {
        self.search_id
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Distinct origins, in tag order.
    pub fn origins(&self) -> Vec<RevisionTag> {
        self.lanes.iter().map(|lane| lane.origin).collect()
    }

    pub async fn run<V: TierVisitor + ?Sized>(&mut self, visitor: &mut V) -> ParallelCompletion {
        if let Some(done) = &self.completion {
            return done.clone();
        }
        let span = debug_span!("parallel_traversal", search_id = %self.search_id, origins = self.lanes.len());
        async {
            let completion = self.rounds(visitor).await;
            for lane in &mut self.lanes {
                let lane_completion = match completion {
                    ParallelCompletion::Cancelled => Completion::Cancelled,
                    ParallelCompletion::Exhausted => Completion::Exhausted,
                    _ => Completion::Stopped,
                };
                lane.traversal.finish(&mut lane.found, lane_completion);
            }
            debug!(?completion, "parallel traversal finished");
            self.completion = Some(completion.clone());
            completion
        }
        .instrument(span)
        .await
    }

    async fn rounds<V: TierVisitor + ?Sized>(&mut self, visitor: &mut V) -> ParallelCompletion {
        loop {
            let Some(height) = self
                .lanes
                .iter()
                .filter_map(|lane| lane.traversal.next_held_height())
                .max()
            else {
                return ParallelCompletion::Exhausted;
            };

            for lane in &mut self.lanes {
                lane.traversal.set_min_height(height);
            }
            let drained = join_all(
                self.lanes
                    .iter_mut()
                    .map(|lane| lane.traversal.drain(&mut lane.found)),
            )
            .await;

            if drained.contains(&Drain::Cancelled) {
                return ParallelCompletion::Cancelled;
            }
            if let Some(tag) = self.lanes.iter().find_map(|lane| lane.found.missing) {
                return ParallelCompletion::NotFound(tag);
            }

            let tier: Tier = self
                .lanes
                .iter_mut()
                .map(|lane| {
                    let at_height = lane.found.by_height.remove(&height).unwrap_or_default();
                    (lane.origin, at_height)
                })
                .collect();
            trace!(height, "tier complete");
            if visitor.found(height, &tier).is_break() {
                return ParallelCompletion::Stopped;
            }
        }
    }
}

impl std::fmt::Debug for ParallelTraversal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelTraversal")
            .field("search_id", &self.search_id)
            .field("lanes", &self.lanes)
            .field("completion", &self.completion)
            .finish()
    }
}
