//! Grouping engine: valid detections in, candidate tracks out.
//!
//! Two strategies implement [`GroupingStrategy`]:
//! - [`GreedyIouGrouping`]: walk detections in order and attach each one to
//!   the track of an earlier, nearby detection it overlaps. Never discards a
//!   valid detection.
//! - [`DensityGrouping`]: DBSCAN over normalized `(time, center_x, center_y)`.
//!   Detections that do not fall into a dense cluster are dropped as noise.
//!
//! The strategy is picked once per engine; they are never mixed.

mod density;
mod greedy;

pub use density::DensityGrouping;
pub use greedy::GreedyIouGrouping;

use adsight_common::config::{GroupingConfig, GroupingStrategyKind};
use adsight_detection_model::detection::{RawDetection, VideoMeta};
use adsight_detection_model::track::Track;

/// A way of turning detections into candidate tracks.
pub trait GroupingStrategy: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Group detections, already subsampled and sorted by frame index.
    fn group(
        &self,
        detections: &[RawDetection],
        meta: &VideoMeta,
        config: &GroupingConfig,
    ) -> Vec<Track>;
}

/// Instantiate the configured strategy.
pub fn strategy_for(kind: GroupingStrategyKind) -> Box<dyn GroupingStrategy> {
    match kind {
        GroupingStrategyKind::Greedy => Box::new(GreedyIouGrouping),
        GroupingStrategyKind::Density => Box::new(DensityGrouping),
    }
}

/// Keep every `frame_skip`-th frame and stable-sort by frame index.
///
/// Sorting makes the result independent of how frames were interleaved in
/// the input, as long as detections within a frame keep their order.
pub fn subsample(detections: &[RawDetection], frame_skip: u64) -> Vec<RawDetection> {
    let stride = frame_skip.max(1);
    let mut kept: Vec<RawDetection> = detections
        .iter()
        .filter(|d| d.frame_index % stride == 0)
        .copied()
        .collect();
    kept.sort_by_key(|d| d.frame_index);
    kept
}

/// Subsampling plus a strategy, bound to one grouping configuration.
pub struct GroupingEngine {
    strategy: Box<dyn GroupingStrategy>,
    config: GroupingConfig,
}

impl GroupingEngine {
    pub fn new(config: GroupingConfig) -> Self {
        Self {
            strategy: strategy_for(config.strategy),
            config,
        }
    }

    /// Use a custom strategy instead of the configured one.
    pub fn with_strategy(config: GroupingConfig, strategy: Box<dyn GroupingStrategy>) -> Self {
        Self { strategy, config }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn config(&self) -> &GroupingConfig {
        &self.config
    }

    /// Group valid detections into candidate tracks.
    pub fn group(&self, detections: &[RawDetection], meta: &VideoMeta) -> Vec<Track> {
        let sampled = subsample(detections, self.config.frame_skip);
        tracing::debug!(
            strategy = self.strategy.name(),
            "Grouping {} of {} detections (frame_skip={})",
            sampled.len(),
            detections.len(),
            self.config.frame_skip
        );
        if sampled.is_empty() {
            return vec![];
        }
        self.strategy.group(&sampled, meta, &self.config)
    }
}
