// src/ancestry/mod.rs
//! Memoized "parents of tag X" lookups.
//!
//! Answers come from (in order) the in-memory ancestry set, local storage, and finally the
//! peer swarm. Every parent list is checked against its tag's commitment before it is kept.

mod cache;
mod pending;
pub mod snapshot;

use revtag::RevisionTag;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub use cache::AncestryCache;

/// A tag's parents, shared between the cache and every waiter that asked for them.
pub type Parents = Arc<[RevisionTag]>;

/// Runtime settings for an [`AncestryCache`]. Built from `CoreConfig::ancestry_config` or
/// directly in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AncestryConfig {
    /// Minimum spacing between two network requests for the same tag.
    pub retry_interval: Duration,
    /// Default per-lookup deadline; `None` waits forever.
    pub lookup_timeout: Option<Duration>,
    pub request_priority: i32,
    pub max_parents: usize,
    /// Where the ancestry set is persisted; `None` disables persistence.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for AncestryConfig {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_millis(1_000),
            lookup_timeout: Some(Duration::from_millis(30_000)),
            request_priority: 101,
            max_parents: 64,
            snapshot_path: None,
        }
    }
}
