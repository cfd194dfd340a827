//! Revision tags: the immutable identifiers the ancestry engine reasons about.
//!
//! A [`RevisionTag`] names one committed snapshot by its content hash, its height in the
//! revision DAG and a short commitment to its parent set. This crate owns the tag's byte
//! layout, its total order and the parent-commitment check; it does no I/O.

pub mod commitment;
pub mod error;
pub mod tag;

pub use commitment::{implied_height, parent_commitment, validate_parent_list, validate_parent_list_bounded};
pub use error::TagError;
pub use tag::{ContentHash, RevisionTag, CONTENT_HASH_LEN, TAG_LEN};
