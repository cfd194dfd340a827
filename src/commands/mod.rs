// src/commands/mod.rs
pub mod init;
mod api;

pub use api::{CommitReport, Commands, TagSummary};

pub use init::{ensure_initialized, InitReport};
