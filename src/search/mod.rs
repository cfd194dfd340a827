// src/search/mod.rs
//! Ancestor searches over a partially materialized revision DAG.
//!
//! [`Traversal`] walks backwards from one or more tags, one lookup per reachable revision,
//! holding anything below its height gate. [`ParallelTraversal`] runs one traversal per
//! origin and moves their gates together so every origin finishes a height tier before any
//! of them starts the next one down.

mod parallel;
mod traversal;

use revtag::RevisionTag;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::ControlFlow;

use crate::error::AncestryError;

pub use parallel::{ParallelCompletion, ParallelTraversal};
pub use traversal::{Completion, Traversal};

/// Receives the tags a [`Traversal`] reaches.
pub trait Visitor: Send {
    /// Called once per distinct tag; `Break` ends the search.
    fn encountered(&mut self, tag: &RevisionTag) -> ControlFlow<()>;

    /// The parents of `tag` could not be resolved. The search carries on elsewhere.
    fn not_found(&mut self, _tag: &RevisionTag, _error: &AncestryError) {}

    /// Called exactly once, when the search concludes for any reason.
    fn finished(&mut self) {}
}

impl<F> Visitor for F
where
    F: FnMut(&RevisionTag) -> ControlFlow<()> + Send,
{
    fn encountered(&mut self, tag: &RevisionTag) -> ControlFlow<()> {
        self(tag)
    }
}

/// Ancestors discovered at one height, keyed by the origin they were reached from.
pub type Tier = BTreeMap<RevisionTag, BTreeSet<RevisionTag>>;

/// Receives whole tiers from a [`ParallelTraversal`], tallest first.
pub trait TierVisitor: Send {
    fn found(&mut self, height: u64, tier: &Tier) -> ControlFlow<()>;
}

impl<F> TierVisitor for F
where
    F: FnMut(u64, &Tier) -> ControlFlow<()> + Send,
{
    fn found(&mut self, height: u64, tier: &Tier) -> ControlFlow<()> {
        self(height, tier)
    }
}
