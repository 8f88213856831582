//! Meshbench Core Library
//!
//! This crate provides the runtime performance-tracking engine for the
//! meshbench middleware benchmark: per-entity online latency statistics,
//! late/too-late classification, system-wide aggregation, and a background
//! sampler for host resource consumption.

pub mod error;
pub mod monitor;
pub mod stats;
pub mod timing;

pub use error::{Error, Result};
