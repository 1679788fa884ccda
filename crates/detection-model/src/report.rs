//! Per-track metrics, quality scores, and the final event records.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;
use crate::detection::FrameIndex;

/// Where the envelope sits relative to the frame center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionLabel {
    Center,
    Periphery,
    /// The sampling region was empty; nothing was measured.
    Undetermined,
}

impl fmt::Display for PositionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Center => "center",
            Self::Periphery => "periphery",
            Self::Undetermined => "undetermined",
        })
    }
}

/// Display metrics measured on one track's sample frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdMetrics {
    /// Envelope area over frame area, in `[0, 1]`.
    pub size_norm: f64,
    /// 1.0 when centered, 0.0 otherwise.
    pub position_score: f64,
    pub position: PositionLabel,
    /// Michelson contrast of the sampled region, in `[0, 1]`.
    pub contrast_norm: f64,
}

impl AdMetrics {
    /// Neutral metrics for a track whose region could not be sampled.
    pub const UNDETERMINED: AdMetrics = AdMetrics {
        size_norm: 0.0,
        position_score: 0.0,
        position: PositionLabel::Undetermined,
        contrast_norm: 0.0,
    };
}

/// Coarse quality bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLabel {
    Low,
    Medium,
    High,
}

impl QualityLabel {
    /// Bucket a score: below 0.5 is low, below 0.75 medium, else high.
    pub fn from_score(score: f64) -> Self {
        if score < 0.5 {
            Self::Low
        } else if score < 0.75 {
            Self::Medium
        } else {
            Self::High
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            Self::Low => "Increase size, contrast, or duration.",
            Self::Medium => "Recenter the placement or improve contrast.",
            Self::High => "Parameters are optimal; keep the current placement.",
        }
    }
}

impl fmt::Display for QualityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        })
    }
}

/// Weighted quality score with its label and advice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdQuality {
    pub score: f64,
    pub label: QualityLabel,
    pub recommendation: String,
}

/// One surviving ad appearance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdEventRecord {
    /// Index of the track after merging.
    pub track_id: usize,
    pub first_frame: FrameIndex,
    pub last_frame: FrameIndex,
    pub detections: usize,
    /// Envelope in detection-resolution coordinates.
    pub envelope: BoundingBox,
    pub position: PositionLabel,
    pub size_fraction: f64,
    pub contrast: f64,
    pub duration_secs: f64,
    pub quality: AdQuality,
}

impl fmt::Display for AdEventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Ad appearance #{} (frames {}-{}):",
            self.track_id, self.first_frame, self.last_frame
        )?;
        writeln!(f, "  - Position: {}", self.position)?;
        writeln!(f, "  - Size: {:.2}% of frame", self.size_fraction * 100.0)?;
        writeln!(f, "  - Contrast: {:.2}", self.contrast)?;
        writeln!(f, "  - Duration: {:.1} s", self.duration_secs)?;
        writeln!(
            f,
            "  - Quality: {} (score: {:.2})",
            self.quality.label, self.quality.score
        )?;
        writeln!(f, "  - Recommendation: {}", self.quality.recommendation)
    }
}

/// All events found in one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdReport {
    pub video_id: String,
    /// RFC 3339 creation time.
    pub generated_at: String,
    pub events: Vec<AdEventRecord>,
}

impl AdReport {
    pub fn new(video_id: impl Into<String>, events: Vec<AdEventRecord>) -> Self {
        Self {
            video_id: video_id.into(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            events,
        }
    }

    /// Plain-text rendering: a title line, then one block per event.
    pub fn to_text(&self) -> String {
        let mut out = format!("Ad display quality report: {}\n", self.video_id);
        out.push_str(&format!("Generated: {}\n\n", self.generated_at));
        if self.events.is_empty() {
            out.push_str("No ad appearances found.\n");
            return out;
        }
        let blocks: Vec<String> = self.events.iter().map(|e| e.to_string()).collect();
        out.push_str(&blocks.join("\n"));
        out
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
