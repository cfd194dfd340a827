// src/utils/mod.rs
pub mod fsutil;
pub mod logging;
