use revtag::RevisionTag;
use std::collections::{BTreeSet, HashMap};
use std::ops::ControlFlow;
use tracing::debug;

use super::RevisionTree;
use crate::error::{AncestryError, Result};
use crate::search::{ParallelCompletion, ParallelTraversal, Tier};

impl RevisionTree {
    /// The latest revision that every tag in `tags` descends from (or is).
    ///
    /// No shared history yields the blank tag. Empty input yields the blank tag; a single
    /// distinct tag yields itself.
    pub async fn common_ancestor(&self, tags: impl IntoIterator<Item = RevisionTag>) -> Result<RevisionTag> {
        let origins: BTreeSet<RevisionTag> = tags.into_iter().collect();
        if origins.len() <= 1 {
            return Ok(origins.into_iter().next().unwrap_or_else(RevisionTag::blank));
        }

        let needed = origins.len();
        let mut answer = None;
        let mut on_tier = |height: u64, tier: &Tier| {
            let mut counts: HashMap<RevisionTag, usize> = HashMap::new();
            for ancestors in tier.values() {
                for ancestor in ancestors {
                    *counts.entry(*ancestor).or_default() += 1;
                }
            }
            match counts
                .into_iter()
                .filter(|(_, count)| *count == needed)
                .map(|(tag, _)| tag)
                .max()
            {
                Some(common) => {
                    debug!(height, common = %common, "common ancestor found");
                    answer = Some(common);
                    ControlFlow::Break(())
                }
                None => ControlFlow::Continue(()),
            }
        };

        let mut search = ParallelTraversal::new(self.cache.clone(), origins);
        match search.run(&mut on_tier).await {
            ParallelCompletion::Stopped | ParallelCompletion::Exhausted => {
                Ok(answer.unwrap_or_else(RevisionTag::blank))
            }
            ParallelCompletion::NotFound(tag) => Err(AncestryError::SearchFailed { tag }),
            ParallelCompletion::Cancelled => Err(AncestryError::Cancelled),
        }
    }
}
