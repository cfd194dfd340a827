// Shared fixtures: DAG builders over an in-memory store and a simulated peer.
#![allow(dead_code)]

use revtag::{ContentHash, RevisionTag};
use revtree::ancestry::{AncestryCache, AncestryConfig};
use revtree::graph::RevisionTree;
use revtree::services::{ChannelSwarm, MemoryRevisionStore, OfflineSwarm, ParentRequest, RevisionStorage};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const LOOKUP_TIMEOUT: Duration = Duration::from_millis(200);

pub fn test_config() -> AncestryConfig {
    AncestryConfig {
        retry_interval: Duration::from_millis(1_000),
        lookup_timeout: Some(LOOKUP_TIMEOUT),
        request_priority: 101,
        max_parents: 8,
        snapshot_path: None,
    }
}

/// Builds revisions into a `MemoryRevisionStore`; tips follow commits.
#[derive(Clone, Default)]
pub struct Dag {
    pub store: Arc<MemoryRevisionStore>,
}

impl Dag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self, name: &str) -> RevisionTag {
        self.store.commit(name.as_bytes(), &[])
    }

    pub fn commit(&self, name: &str, parent: RevisionTag) -> RevisionTag {
        self.store.commit(name.as_bytes(), &[parent])
    }

    pub fn merge(&self, name: &str, parents: &[RevisionTag]) -> RevisionTag {
        self.store.commit(name.as_bytes(), parents)
    }

    pub fn parents(&self, tag: &RevisionTag) -> Vec<RevisionTag> {
        self.store.read_declared_parents(tag).unwrap_or_default()
    }

    /// Every tag reachable from `tag` through parent links, `tag` included.
    pub fn ancestors_or_self(&self, tag: RevisionTag) -> HashSet<RevisionTag> {
        let mut seen = HashSet::from([tag]);
        let mut queue = VecDeque::from([tag]);
        while let Some(next) = queue.pop_front() {
            for parent in self.parents(&next) {
                if seen.insert(parent) {
                    queue.push_back(parent);
                }
            }
        }
        seen
    }
}

/// A tag that exists in the graph (its children commit to it) but is stored nowhere.
pub fn detached(name: &str, parents: &[RevisionTag]) -> RevisionTag {
    RevisionTag::commit(ContentHash::of(name.as_bytes()), parents)
}

pub fn local_cache(store: Arc<MemoryRevisionStore>) -> Arc<AncestryCache> {
    Arc::new(AncestryCache::new(store, Arc::new(OfflineSwarm), test_config()))
}

pub fn local_tree(dag: &Dag) -> RevisionTree {
    RevisionTree::new(local_cache(dag.store.clone()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerBehavior {
    Honest,
    Delayed(Duration),
    /// Answers with a parent list that does not match the tag's commitment.
    Corrupt,
    Silent,
}

pub struct Peer {
    pub requests: Arc<AtomicUsize>,
    pub handle: JoinHandle<()>,
}

impl Peer {
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

/// A cache with an empty local store whose requests are answered from `remote`.
pub fn remote_cache(
    remote: Arc<MemoryRevisionStore>,
    behavior: PeerBehavior,
    config: AncestryConfig,
) -> (Arc<AncestryCache>, Peer) {
    let (swarm, rx) = ChannelSwarm::new();
    let cache = Arc::new(AncestryCache::new(
        Arc::new(MemoryRevisionStore::new()),
        Arc::new(swarm),
        config,
    ));
    let peer = spawn_peer(cache.clone(), remote, rx, behavior);
    (cache, peer)
}

pub fn spawn_peer(
    cache: Arc<AncestryCache>,
    remote: Arc<MemoryRevisionStore>,
    mut rx: mpsc::UnboundedReceiver<ParentRequest>,
    behavior: PeerBehavior,
) -> Peer {
    let requests = Arc::new(AtomicUsize::new(0));
    let counter = requests.clone();
    let handle = tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            counter.fetch_add(1, Ordering::SeqCst);
            let Ok(mut parents) = remote.read_declared_parents(&request.tag) else {
                continue;
            };
            match behavior {
                PeerBehavior::Silent => continue,
                PeerBehavior::Corrupt => {
                    parents.push(detached("forged", &[]));
                }
                PeerBehavior::Honest | PeerBehavior::Delayed(_) => {}
            }
            let cache = cache.clone();
            tokio::spawn(async move {
                if let PeerBehavior::Delayed(delay) = behavior {
                    tokio::time::sleep(delay).await;
                }
                let _ = cache.receive_parents(&request.tag, parents);
            });
        }
    });
    Peer { requests, handle }
}
