use futures::stream::{FuturesUnordered, StreamExt};
use revtag::RevisionTag;
use std::ops::ControlFlow;
use tracing::trace;

use super::RevisionTree;
use crate::error::{AncestryError, Result};
use crate::search::{Completion, Traversal};

impl RevisionTree {
    /// Is `possible_ancestor` equal to `tag` or reachable from it through parent links?
    ///
    /// The blank tag is an ancestor of everything.
    pub async fn descendent_of(&self, tag: RevisionTag, possible_ancestor: RevisionTag) -> Result<bool> {
        if possible_ancestor.is_blank() || tag == possible_ancestor {
            return Ok(true);
        }
        if tag.height() <= possible_ancestor.height() {
            return Ok(false);
        }

        // The ancestor is reported when its child resolves; nothing at or below its height
        // needs expanding.
        let mut search = Traversal::new(self.cache.clone());
        search.set_min_height(possible_ancestor.height().saturating_add(1));
        search.traverse_from(tag);
        let mut visitor = |seen: &RevisionTag| {
            if *seen == possible_ancestor {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        };

        match search.run(&mut visitor).await {
            Completion::Stopped => Ok(true),
            Completion::Cancelled => Err(AncestryError::Cancelled),
            Completion::Exhausted => match search.missing().first() {
                Some(missing) => Err(AncestryError::SearchFailed { tag: *missing }),
                None => Ok(false),
            },
        }
    }

    /// Does `new_tag` make `existing` redundant?
    ///
    /// True if `new_tag` descends from `existing`, or if `existing` is a merge and `new_tag`
    /// descends from every one of its parents.
    pub async fn superceded_by(&self, new_tag: RevisionTag, existing: RevisionTag) -> Result<bool> {
        if new_tag == existing || new_tag.height() < existing.height() {
            return Ok(false);
        }
        if self.descendent_of(new_tag, existing).await? {
            return Ok(true);
        }

        let parents = self
            .cache
            .parents_for_tag(&existing)
            .await
            .map_err(|err| err.into_search_failure(existing))?;
        if parents.len() <= 1 {
            return Ok(false);
        }
        self.descends_from_all(new_tag, &parents).await
    }

    /// Is `tag` already covered by some local branch tip, either by descent or because some
    /// tip descends from every parent of the merge `tag`? A tag that is itself a tip counts.
    pub async fn is_superceded(&self, tag: RevisionTag) -> Result<bool> {
        let tips = self.cache.storage().branch_tips();

        let mut checks: FuturesUnordered<_> = tips.iter().map(|tip| self.descendent_of(*tip, tag)).collect();
        while let Some(outcome) = checks.next().await {
            if outcome? {
                return Ok(true);
            }
        }
        drop(checks);

        let parents = self
            .cache
            .parents_for_tag(&tag)
            .await
            .map_err(|err| err.into_search_failure(tag))?;
        if parents.len() <= 1 {
            return Ok(false);
        }

        let mut supermerges: FuturesUnordered<_> = tips
            .iter()
            .map(|tip| self.descends_from_all(*tip, &parents))
            .collect();
        while let Some(outcome) = supermerges.next().await {
            if outcome? {
                trace!(tag = %tag, "superseded by a merge of all its parents");
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// `tag` descends from each of `ancestors`. Stops at the first that it does not.
    pub(super) async fn descends_from_all(&self, tag: RevisionTag, ancestors: &[RevisionTag]) -> Result<bool> {
        let mut checks: FuturesUnordered<_> = ancestors
            .iter()
            .map(|ancestor| self.descendent_of(tag, *ancestor))
            .collect();
        while let Some(outcome) = checks.next().await {
            if !outcome? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
