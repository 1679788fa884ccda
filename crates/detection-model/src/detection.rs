//! Detector output: per-frame records and video metadata.
//!
//! The detector writes a JSON array with one entry per video. Older files use
//! `frame_id`/`ads` and omit confidence or class; both spellings are accepted.

use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;

/// Zero-based frame index within a video.
pub type FrameIndex = u64;

/// One detector box, localized to one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub frame_index: FrameIndex,
    pub bbox: BoundingBox,
    pub confidence: f64,
    pub class_id: i64,
}

/// Video-level metadata the analysis needs alongside the detections.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoMeta {
    pub frame_rate: f64,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl VideoMeta {
    pub fn new(frame_rate: f64, frame_width: u32, frame_height: u32) -> Self {
        Self {
            frame_rate,
            frame_width,
            frame_height,
        }
    }

    /// Seconds covered by an inclusive frame span.
    pub fn span_secs(&self, first: FrameIndex, last: FrameIndex) -> f64 {
        if self.frame_rate <= 0.0 || last < first {
            return 0.0;
        }
        (last - first + 1) as f64 / self.frame_rate
    }

    /// Timestamp of a frame in seconds.
    pub fn frame_secs(&self, frame_index: FrameIndex) -> f64 {
        if self.frame_rate <= 0.0 {
            return 0.0;
        }
        frame_index as f64 / self.frame_rate
    }
}

/// A single detector box as it appears in the detections file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEntry {
    /// Placement kind written by some detector versions (e.g. "direct").
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    pub bbox: BoundingBox,

    #[serde(default = "default_confidence")]
    pub confidence: f64,

    #[serde(default = "default_class_id")]
    pub class_id: i64,
}

fn default_confidence() -> f64 {
    1.0
}

fn default_class_id() -> i64 {
    -1
}

/// All detections of one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    #[serde(alias = "frame_id")]
    pub frame_index: FrameIndex,

    #[serde(alias = "ads", default)]
    pub detections: Vec<DetectionEntry>,
}

/// Detector output for one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoDetections {
    #[serde(default)]
    pub video_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_width: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_height: Option<u32>,

    pub frames: Vec<FrameRecord>,
}

impl VideoDetections {
    /// Metadata, if the file carries all of it.
    pub fn meta(&self) -> Option<VideoMeta> {
        Some(VideoMeta::new(
            self.frame_rate?,
            self.frame_width?,
            self.frame_height?,
        ))
    }

    /// Flatten into detections, in file order.
    pub fn raw_detections(&self) -> Vec<RawDetection> {
        self.frames
            .iter()
            .flat_map(|frame| {
                frame.detections.iter().map(move |entry| RawDetection {
                    frame_index: frame.frame_index,
                    bbox: entry.bbox,
                    confidence: entry.confidence,
                    class_id: entry.class_id,
                })
            })
            .collect()
    }

    /// Total number of boxes across all frames.
    pub fn detection_count(&self) -> usize {
        self.frames.iter().map(|f| f.detections.len()).sum()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DetectionFile {
    Many(Vec<VideoDetections>),
    One(VideoDetections),
}

/// Parse a detections file holding either an array of videos or a single video.
pub fn parse_detection_file(json: &str) -> Result<Vec<VideoDetections>, serde_json::Error> {
    Ok(match serde_json::from_str(json)? {
        DetectionFile::Many(videos) => videos,
        DetectionFile::One(video) => vec![video],
    })
}
