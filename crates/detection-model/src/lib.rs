//! Adsight Detection Model
//!
//! Defines the data contracts shared by the analysis engine and its callers:
//! - **Geometry:** integer bounding boxes, IoU, and resolution rescaling
//! - **Detections:** the detector's per-frame output and video metadata
//! - **Tracks:** temporally ordered groups of detections with an envelope box
//! - **Report:** per-track metrics, quality scores, and event records
//!
//! Boxes carry no coordinate-space tag. A single computation must never mix
//! detection-resolution and analysis-resolution boxes; use [`BoxScaler`] to
//! move between the two.

pub mod bbox;
pub mod detection;
pub mod report;
pub mod track;

pub use bbox::*;
pub use detection::*;
pub use report::*;
pub use track::*;
