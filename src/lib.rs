//! revtree: asynchronous revision-ancestry resolution.
//!
//! Answers parent, descent, common-ancestor and supersession questions about a revision DAG
//! that is only partly stored locally. Missing edges are requested from peers, waited on
//! with a deadline, and checked against each revision's parent commitment before use.

pub mod ancestry;
pub mod commands;
pub mod config;
pub mod error;
pub mod graph;
pub mod search;
pub mod services;
pub mod utils;

pub use ancestry::{AncestryCache, AncestryConfig, Parents};
pub use error::{AncestryError, Result};
pub use graph::RevisionTree;
pub use revtag::{ContentHash, RevisionTag};
pub use search::{Completion, ParallelCompletion, ParallelTraversal, Tier, TierVisitor, Traversal, Visitor};
