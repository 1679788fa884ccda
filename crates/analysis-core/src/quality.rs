//! Display-quality measurement and scoring for one track.
//!
//! Metrics mix two coordinate spaces on purpose: size and position use the
//! envelope at detection resolution, while contrast samples pixels from the
//! cached analysis-resolution frame with the envelope rescaled to match.

use adsight_common::config::{PositionPolicy, QualityConfig};
use adsight_detection_model::bbox::BoundingBox;
use adsight_detection_model::report::{AdMetrics, AdQuality, PositionLabel, QualityLabel};
use image::{imageops, RgbImage};

/// Keeps the contrast ratio finite on pure black regions.
const CONTRAST_EPSILON: f64 = 1e-6;

/// Regions thinner than this fall back to the unpadded envelope.
const MIN_REGION_SIDE: i32 = 2;

const SIZE_WEIGHT: f64 = 0.3;
const POSITION_WEIGHT: f64 = 0.3;
const CONTRAST_WEIGHT: f64 = 0.2;
const DURATION_WEIGHT: f64 = 0.2;

pub struct QualityAnalyzer {
    config: QualityConfig,
}

impl QualityAnalyzer {
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(QualityConfig::default())
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// Whether a track lasts long enough to be a real appearance.
    pub fn meets_min_duration(&self, duration_secs: f64) -> bool {
        duration_secs >= self.config.min_duration_secs
    }

    /// Measure one track.
    ///
    /// `envelope` is in detection resolution (`frame_width` x `frame_height`);
    /// `sample_bbox` is the same box rescaled into `frame`'s resolution.
    pub fn analyze(
        &self,
        frame: &RgbImage,
        envelope: &BoundingBox,
        sample_bbox: &BoundingBox,
        frame_width: u32,
        frame_height: u32,
    ) -> AdMetrics {
        let Some(region) = self.sample_region(sample_bbox, frame.width(), frame.height()) else {
            tracing::warn!("Empty sampling region for envelope {:?}", envelope);
            return AdMetrics::UNDETERMINED;
        };

        let frame_area = frame_width as f64 * frame_height as f64;
        let size_norm = if frame_area > 0.0 {
            (envelope.area() as f64 / frame_area).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let centered = self.is_centered(envelope, frame_width, frame_height);
        let (position_score, position) = if centered {
            (1.0, PositionLabel::Center)
        } else {
            (0.0, PositionLabel::Periphery)
        };

        AdMetrics {
            size_norm,
            position_score,
            position,
            contrast_norm: region_contrast(frame, &region),
        }
    }

    /// Padded region clipped to the frame, or the bare box when padding
    /// degenerates, or `None` when nothing is left.
    pub fn sample_region(&self, bbox: &BoundingBox, width: u32, height: u32) -> Option<BoundingBox> {
        let padded = bbox.padded(self.config.padding).clipped(width, height);
        if padded.width >= MIN_REGION_SIDE && padded.height >= MIN_REGION_SIDE {
            return Some(padded);
        }
        let bare = bbox.clipped(width, height);
        (!bare.is_empty()).then_some(bare)
    }

    fn is_centered(&self, envelope: &BoundingBox, frame_width: u32, frame_height: u32) -> bool {
        let (cx, cy) = envelope.center();
        let tolerance = self.config.center_tolerance;
        let within = |c: f64, extent: u32| {
            let extent = extent as f64;
            (c - extent / 2.0).abs() < tolerance * extent
        };

        match self.config.position_policy {
            PositionPolicy::Horizontal => within(cx, frame_width),
            PositionPolicy::BothAxes => within(cx, frame_width) && within(cy, frame_height),
        }
    }

    /// Weighted score, label, and recommendation.
    pub fn evaluate_quality(&self, metrics: &AdMetrics, duration_secs: f64) -> AdQuality {
        let duration_norm = (duration_secs / self.config.full_duration_secs).clamp(0.0, 1.0);
        let score = SIZE_WEIGHT * metrics.size_norm
            + POSITION_WEIGHT * metrics.position_score
            + CONTRAST_WEIGHT * metrics.contrast_norm
            + DURATION_WEIGHT * duration_norm;
        let label = QualityLabel::from_score(score);

        AdQuality {
            score,
            label,
            recommendation: label.recommendation().to_string(),
        }
    }
}

/// Michelson contrast of the luminance inside `region`, in `[0, 1]`.
///
/// `region` must already be clipped to the frame.
pub fn region_contrast(frame: &RgbImage, region: &BoundingBox) -> f64 {
    if region.is_empty() {
        return 0.0;
    }
    let patch = imageops::crop_imm(
        frame,
        region.x as u32,
        region.y as u32,
        region.width as u32,
        region.height as u32,
    )
    .to_image();
    let luma = imageops::grayscale(&patch);

    let (min, max) = luma
        .pixels()
        .map(|p| p.0[0])
        .fold((u8::MAX, u8::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if max <= min {
        return 0.0;
    }

    let (min, max) = (min as f64, max as f64);
    ((max - min) / (max + min + CONTRAST_EPSILON)).clamp(0.0, 1.0)
}
