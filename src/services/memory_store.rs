//! services/memory_store.rs
//!
//! Thread-safe in-memory revision store. Keeps the declared parent list of each revision and
//! the set of branch tips, nothing else.

use revtag::{ContentHash, RevisionTag};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::RevisionStorage;

#[derive(Debug, Default)]
struct Inner {
    revisions: HashMap<RevisionTag, Vec<RevisionTag>>,
    tips: Vec<RevisionTag>,
}

#[derive(Debug, Default)]
pub struct MemoryRevisionStore {
    inner: RwLock<Inner>,
}

impl MemoryRevisionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a revision with whatever parent list it declares (valid or not).
    pub fn insert(&self, tag: RevisionTag, declared_parents: Vec<RevisionTag>) {
        self.write().revisions.insert(tag, declared_parents);
    }

    /// Create a revision on top of `parents` and make it a branch tip in their place.
    pub fn commit(&self, content: &[u8], parents: &[RevisionTag]) -> RevisionTag {
        let tag = RevisionTag::commit(ContentHash::of(content), parents);
        let mut inner = self.write();
        inner.revisions.insert(tag, parents.to_vec());
        inner.tips.retain(|tip| !parents.contains(tip));
        if !inner.tips.contains(&tag) {
            inner.tips.push(tag);
        }
        tag
    }

    pub fn remove(&self, tag: &RevisionTag) -> Option<Vec<RevisionTag>> {
        let mut inner = self.write();
        inner.tips.retain(|tip| tip != tag);
        inner.revisions.remove(tag)
    }

    pub fn set_branch_tips(&self, tips: Vec<RevisionTag>) {
        self.write().tips = tips;
    }

    pub fn len(&self) -> usize {
        self.read().revisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RevisionStorage for MemoryRevisionStore {
    fn has_local_content(&self, tag: &RevisionTag) -> bool {
        self.read().revisions.contains_key(tag)
    }

    fn read_declared_parents(&self, tag: &RevisionTag) -> anyhow::Result<Vec<RevisionTag>> {
        self.read()
            .revisions
            .get(tag)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("revision {tag} is not stored locally"))
    }

    fn local_revisions(&self) -> Vec<RevisionTag> {
        self.read().revisions.keys().copied().collect()
    }

    fn branch_tips(&self) -> Vec<RevisionTag> {
        self.read().tips.clone()
    }
}
