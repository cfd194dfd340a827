use thiserror::Error;

use crate::tag::RevisionTag;

/// Failures while decoding a tag or checking a parent list against it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagError {
    /// The recomputed commitment over the supplied parents does not match the tag.
    /// This is the integrity failure: the parent list is forged or corrupt.
    #[error("parent commitment for {tag} does not match; expected {expected:016x} got {actual:016x}")]
    ParentCommitmentMismatch {
        tag: RevisionTag,
        expected: u64,
        actual: u64,
    },

    #[error("tag {tag} has height {height}, but its parents imply height {implied}")]
    HeightMismatch {
        tag: RevisionTag,
        height: u64,
        implied: u64,
    },

    #[error("tag {tag} has a parent at the maximum height")]
    HeightOverflow { tag: RevisionTag },

    #[error("tag {tag} lists {count} parents (max {max})")]
    TooManyParents {
        tag: RevisionTag,
        count: usize,
        max: usize,
    },

    #[error("serialized revision tag must be {expected} bytes, got {len}")]
    MalformedTag { len: usize, expected: usize },

    #[error("invalid hex in revision tag: {0:?}")]
    InvalidHex(String),
}
