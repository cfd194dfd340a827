//! Parent commitments.
//!
//! A tag's `parent_commitment` is the first 8 bytes (big endian) of a blake3 derive-key hash
//! over the serialized parents, sorted by the tag total order and concatenated. Checking a
//! parent list against it is the only thing standing between the ancestry cache and a peer
//! that lies about history, so every parent list must pass [`validate_parent_list`] before it
//! is believed.

use crate::error::TagError;
use crate::tag::RevisionTag;

const COMMITMENT_CONTEXT: &str = "revtag 2024-06-01 parent list commitment v1";

/// Commitment over `parents`; independent of the order they are given in.
pub fn parent_commitment(parents: &[RevisionTag]) -> u64 {
    let mut sorted: Vec<&RevisionTag> = parents.iter().collect();
    sorted.sort();

    let mut hasher = blake3::Hasher::new_derive_key(COMMITMENT_CONTEXT);
    for parent in sorted {
        hasher.update(&parent.to_bytes());
    }
    let digest = hasher.finalize();

    let mut head = [0u8; 8];
    head.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_be_bytes(head)
}

/// Height a tag with these parents must carry, or `None` if a parent already sits at the
/// maximum height.
pub fn implied_height(parents: &[RevisionTag]) -> Option<u64> {
    parents
        .iter()
        .map(|p| p.height().checked_add(1))
        .try_fold(0, |tallest, next| next.map(|h| tallest.max(h)))
}

/// Check that `parents` is exactly the parent set `tag` committed to.
///
/// Also rejects lists whose heights are inconsistent with the tag: a tag sits one above its
/// tallest parent, and a parentless tag sits at height 0.
pub fn validate_parent_list(tag: &RevisionTag, parents: &[RevisionTag]) -> Result<(), TagError> {
    let actual = parent_commitment(parents);
    if actual != tag.parent_commitment() {
        return Err(TagError::ParentCommitmentMismatch {
            tag: *tag,
            expected: tag.parent_commitment(),
            actual,
        });
    }

    let implied = implied_height(parents).ok_or(TagError::HeightOverflow { tag: *tag })?;
    if implied != tag.height() {
        return Err(TagError::HeightMismatch {
            tag: *tag,
            height: tag.height(),
            implied,
        });
    }

    Ok(())
}

/// [`validate_parent_list`] with an upper bound on the parent count.
pub fn validate_parent_list_bounded(
    tag: &RevisionTag,
    parents: &[RevisionTag],
    max_parents: usize,
) -> Result<(), TagError> {
    if parents.len() > max_parents {
        return Err(TagError::TooManyParents {
            tag: *tag,
            count: parents.len(),
            max: max_parents,
        });
    }
    validate_parent_list(tag, parents)
}
