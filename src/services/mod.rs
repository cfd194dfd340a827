// src/services/mod.rs
//! Collaborators the ancestry engine consumes: local revision storage and the peer swarm.
//! The engine only ever talks to them through the two traits below.

pub mod dir_store;    // content-addressed directory store (CLI)
pub mod memory_store; // in-memory store (tests, embedding)
pub mod swarm;        // offline and channel-backed request sinks

use revtag::RevisionTag;

/// Local storage of revision content, as far as ancestry is concerned.
pub trait RevisionStorage: Send + Sync {
    /// Is the revision's content available without asking peers?
    fn has_local_content(&self, tag: &RevisionTag) -> bool;

    /// The parent list recorded inside the locally stored revision.
    /// Unvalidated: the cache checks it against the tag before believing it.
    fn read_declared_parents(&self, tag: &RevisionTag) -> anyhow::Result<Vec<RevisionTag>>;

    /// Every locally stored revision; used to rebuild the cache when no snapshot is usable.
    fn local_revisions(&self) -> Vec<RevisionTag> {
        Vec::new()
    }

    /// Current branch tips known locally.
    fn branch_tips(&self) -> Vec<RevisionTag>;
}

/// Fire-and-forget request to peers for the parents of a revision.
/// Answers come back through `AncestryCache::receive_parents`.
pub trait ParentRequester: Send + Sync {
    fn request_parents(&self, tag: &RevisionTag, priority: i32);
}

pub use dir_store::DirRevisionStore;
pub use memory_store::MemoryRevisionStore;
pub use swarm::{ChannelSwarm, OfflineSwarm, ParentRequest};
