// src/error.rs

use revtag::{RevisionTag, TagError};
use thiserror::Error;

/// Outcome of a failed ancestry lookup or graph query.
///
/// "No common ancestor" is not an error: it is a successful answer of the blank tag.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AncestryError {
    /// A parent list failed the commitment check and was discarded.
    #[error("integrity check failed: {0}")]
    Integrity(#[from] TagError),

    /// Nobody supplied the parents of `tag` before the lookup timed out.
    #[error("parents of {tag} not found before timeout")]
    NotFound { tag: RevisionTag },

    /// A search could not reach a conclusion because `tag` could not be resolved.
    #[error("search failed: unable to resolve parents of {tag}")]
    SearchFailed { tag: RevisionTag },

    #[error("search cancelled")]
    Cancelled,
}

impl AncestryError {
    /// Lift a per-tag lookup failure into a search-level failure for the caller.
    pub(crate) fn into_search_failure(self, tag: RevisionTag) -> Self {
        match self {
            AncestryError::NotFound { tag } => AncestryError::SearchFailed { tag },
            AncestryError::Integrity(_) => AncestryError::SearchFailed { tag },
            other => other,
        }
    }
}

pub type Result<T, E = AncestryError> = std::result::Result<T, E>;
