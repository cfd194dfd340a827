use futures::stream::{FuturesUnordered, StreamExt};
use revtag::RevisionTag;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

use super::RevisionTree;
use crate::error::Result;

impl RevisionTree {
    /// Drop every tag that is an ancestor of another tag in the set.
    ///
    /// All pairs are checked concurrently and the result is produced only once every check
    /// has finished. If any check failed, the first failure is returned instead.
    pub async fn minimal_set(&self, tags: impl IntoIterator<Item = RevisionTag>) -> Result<BTreeSet<RevisionTag>> {
        let candidates: BTreeSet<RevisionTag> = tags.into_iter().collect();

        let mut checks = FuturesUnordered::new();
        for &lower in &candidates {
            for &upper in &candidates {
                if upper.height() > lower.height() {
                    checks.push(async move { (lower, self.descendent_of(upper, lower).await) });
                }
            }
        }

        let mut redundant = HashSet::new();
        let mut failure = None;
        while let Some((lower, outcome)) = checks.next().await {
            match outcome {
                Ok(true) => {
                    redundant.insert(lower);
                }
                Ok(false) => {}
                Err(err) => {
                    failure.get_or_insert(err);
                }
            }
        }
        if let Some(err) = failure {
            return Err(err);
        }

        debug!(input = candidates.len(), removed = redundant.len(), "minimal set computed");
        Ok(candidates
            .into_iter()
            .filter(|tag| !redundant.contains(tag))
            .collect())
    }

    /// Flatten `tags` to non-merge revisions: a tag with at most one parent is a base, a
    /// merge is replaced by the bases of its parents, recursively.
    pub async fn canonical_bases(&self, tags: impl IntoIterator<Item = RevisionTag>) -> Result<BTreeSet<RevisionTag>> {
        let mut bases = BTreeSet::new();
        let mut visited = HashSet::new();
        let mut lookups = FuturesUnordered::new();
        for tag in tags {
            if visited.insert(tag) {
                lookups.push(self.lookup(tag));
            }
        }

        while let Some((tag, outcome)) = lookups.next().await {
            let parents = outcome.map_err(|err| err.into_search_failure(tag))?;
            if parents.len() <= 1 {
                bases.insert(tag);
                continue;
            }
            for parent in parents.iter() {
                if visited.insert(*parent) {
                    lookups.push(self.lookup(*parent));
                }
            }
        }
        Ok(bases)
    }
}
