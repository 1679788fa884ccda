//! Adsight Analysis Core
//!
//! Turns per-frame detector output into scored ad appearances:
//! - **Validation:** drop boxes that fail geometry, confidence, or class rules
//! - **Grouping:** build candidate tracks (greedy IoU or density clustering)
//! - **Merging:** stitch adjacent tracks across short gaps
//! - **Quality:** measure size, position, and contrast; score each track
//!
//! Apart from the [`frame_cache::FrameCache`], which pulls pixels from a
//! caller-supplied [`frame_cache::FrameSource`], this crate does no I/O.

pub mod frame_cache;
pub mod grouping;
pub mod merge;
pub mod pipeline;
pub mod quality;
pub mod spatial_index;
pub mod validator;

pub use frame_cache::{FrameCache, FrameSource, FrameUnavailable};
pub use grouping::{GroupingEngine, GroupingStrategy};
pub use pipeline::AdAnalysisPipeline;
pub use quality::QualityAnalyzer;
