//! Detection validation: geometry, size, confidence, and class filters.

use std::collections::BTreeMap;
use std::fmt;

use adsight_common::config::ValidationConfig;
use adsight_detection_model::detection::RawDetection;
use serde::Serialize;

/// The first rule a detection broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    /// Negative origin, non-positive size, or edges past `i32::MAX`.
    Geometry,
    /// Extends past the frame edge (strict bounds only).
    OutOfBounds,
    /// Smaller than `min_size_ratio` of the frame.
    TooSmallRatio,
    /// Area outside `[min_area, max_area]`.
    AreaOutOfRange,
    LowConfidence,
    ClassNotAllowed,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Geometry => "invalid geometry",
            Self::OutOfBounds => "outside frame bounds",
            Self::TooSmallRatio => "below minimum size ratio",
            Self::AreaOutOfRange => "area out of range",
            Self::LowConfidence => "low confidence",
            Self::ClassNotAllowed => "class not allowed",
        })
    }
}

/// Check every rule, returning the first one that fails.
pub fn check(
    detection: &RawDetection,
    frame_width: u32,
    frame_height: u32,
    config: &ValidationConfig,
) -> Result<(), Rejection> {
    let bbox = &detection.bbox;
    if bbox.x < 0
        || bbox.y < 0
        || bbox.width <= 0
        || bbox.height <= 0
        || !bbox.edges_representable()
    {
        return Err(Rejection::Geometry);
    }
    if config.strict_bounds
        && (bbox.right() as i64 > frame_width as i64 || bbox.bottom() as i64 > frame_height as i64)
    {
        return Err(Rejection::OutOfBounds);
    }

    let area = bbox.area();
    let frame_area = frame_width as f64 * frame_height as f64;
    let size_ratio = if frame_area > 0.0 {
        area as f64 / frame_area
    } else {
        0.0
    };
    if size_ratio < config.min_size_ratio {
        return Err(Rejection::TooSmallRatio);
    }
    if area < config.min_area || area > config.max_area {
        return Err(Rejection::AreaOutOfRange);
    }
    if detection.confidence < config.min_confidence {
        return Err(Rejection::LowConfidence);
    }
    if !config.allowed_classes.contains(&detection.class_id) {
        return Err(Rejection::ClassNotAllowed);
    }
    Ok(())
}

/// Pure validity predicate.
pub fn is_valid(
    detection: &RawDetection,
    frame_width: u32,
    frame_height: u32,
    config: &ValidationConfig,
) -> bool {
    check(detection, frame_width, frame_height, config).is_ok()
}

/// Accept/reject tallies for one video.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationSummary {
    pub accepted: usize,
    pub rejected: BTreeMap<Rejection, usize>,
}

impl ValidationSummary {
    pub fn total(&self) -> usize {
        self.accepted + self.rejected_total()
    }

    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }
}

/// Keep the valid detections, in input order, and tally the rest.
pub fn filter_valid(
    detections: &[RawDetection],
    frame_width: u32,
    frame_height: u32,
    config: &ValidationConfig,
) -> (Vec<RawDetection>, ValidationSummary) {
    let mut summary = ValidationSummary::default();
    let mut valid = Vec::with_capacity(detections.len());

    for detection in detections {
        match check(detection, frame_width, frame_height, config) {
            Ok(()) => {
                summary.accepted += 1;
                valid.push(*detection);
            }
            Err(reason) => {
                tracing::trace!(
                    frame = detection.frame_index,
                    ?reason,
                    "Rejected detection {:?}",
                    detection.bbox
                );
                *summary.rejected.entry(reason).or_default() += 1;
            }
        }
    }

    (valid, summary)
}
