// src/graph/mod.rs
//! RevisionTree: the questions higher layers ask about revision history.
//!
//! Every entry point resolves to exactly one outcome. Lookup failures surface as
//! [`AncestryError::SearchFailed`](crate::error::AncestryError::SearchFailed); "no common
//! history" is the blank tag, not an error.

mod common;
mod descent;
mod sets;

use revtag::RevisionTag;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::ancestry::{AncestryCache, Parents};
use crate::error::Result;
use crate::search::Traversal;

#[derive(Debug, Clone)]
pub struct RevisionTree {
    cache: Arc<AncestryCache>,
}

impl RevisionTree {
    pub fn new(cache: Arc<AncestryCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<AncestryCache> {
        &self.cache
    }

    pub fn default_lookup_timeout(&self) -> Option<Duration> {
        self.cache.default_lookup_timeout()
    }

    pub async fn parents_for_tag(&self, tag: &RevisionTag) -> Result<Parents> {
        self.cache.parents_for_tag(tag).await
    }

    /// A revision reachable from the branch tips whose hex form starts with `prefix`.
    pub async fn tag_with_prefix(&self, prefix: &str) -> Option<RevisionTag> {
        let prefix = prefix.trim().to_ascii_lowercase();
        if prefix.is_empty() {
            return None;
        }
        if let Some(tip) = self
            .cache
            .storage()
            .branch_tips()
            .into_iter()
            .find(|tip| tip.matches_prefix(&prefix))
        {
            return Some(tip);
        }

        let mut found = None;
        let mut search = Traversal::new(self.cache.clone());
        search.traverse_from_branch_tips();
        let mut visitor = |tag: &RevisionTag| {
            if tag.matches_prefix(&prefix) {
                found = Some(*tag);
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        };
        let completion = search.run(&mut visitor).await;
        debug!(prefix = %prefix, ?completion, "prefix search finished");
        found
    }

    async fn lookup(&self, tag: RevisionTag) -> (RevisionTag, Result<Parents>) {
        (tag, self.cache.parents_for_tag(&tag).await)
    }
}
