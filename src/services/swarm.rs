// src/services/swarm.rs

use revtag::RevisionTag;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::ParentRequester;

/// No peers: requests are logged and dropped, so lookups for non-local tags time out.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineSwarm;

impl ParentRequester for OfflineSwarm {
    fn request_parents(&self, tag: &RevisionTag, priority: i32) {
        debug!(tag = %tag, priority, "offline: dropping parent request");
    }
}

/// A request for the parents of `tag`, as handed to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentRequest {
    pub tag: RevisionTag,
    pub priority: i32,
}

/// Forwards requests into a channel; the transport on the other end answers them through
/// `AncestryCache::receive_parents`.
#[derive(Debug, Clone)]
pub struct ChannelSwarm {
    tx: mpsc::UnboundedSender<ParentRequest>,
}

impl ChannelSwarm {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ParentRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ParentRequester for ChannelSwarm {
    fn request_parents(&self, tag: &RevisionTag, priority: i32) {
        trace!(tag = %tag, priority, "forwarding parent request");
        if self.tx.send(ParentRequest { tag: *tag, priority }).is_err() {
            debug!(tag = %tag, "swarm receiver dropped; parent request lost");
        }
    }
}
