//! Adsight Common Utilities
//!
//! Shared infrastructure for all Adsight crates:
//! - Error types and result aliases
//! - Analysis configuration (thresholds, cache sizing, worker pool)
//! - Tracing/logging initialization

pub mod config;
pub mod error;
pub mod logging;

pub use config::*;
pub use error::*;
