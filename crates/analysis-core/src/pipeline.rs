//! Session orchestration.
//!
//! validate -> group -> merge -> evaluate each track on a bounded worker pool.
//! Evaluation results keep track order; tracks that are too short or whose
//! sample frame cannot be decoded are dropped.

use std::sync::Arc;

use adsight_common::config::AnalysisConfig;
use adsight_common::error::{AdsightError, AdsightResult};
use adsight_detection_model::detection::{RawDetection, VideoDetections, VideoMeta};
use adsight_detection_model::report::{AdEventRecord, AdReport};
use adsight_detection_model::track::Track;
use rayon::prelude::*;

use crate::frame_cache::{FrameCache, FrameSource};
use crate::grouping::{GroupingEngine, GroupingStrategy};
use crate::merge::merge_tracks;
use crate::quality::QualityAnalyzer;
use crate::validator::{filter_valid, ValidationSummary};

pub struct AdAnalysisPipeline {
    config: AnalysisConfig,
    grouping: GroupingEngine,
    analyzer: QualityAnalyzer,
}

impl AdAnalysisPipeline {
    /// Build a pipeline, rejecting configurations that cannot run.
    pub fn new(config: AnalysisConfig) -> AdsightResult<Self> {
        config.validate()?;
        let grouping = GroupingEngine::new(config.grouping.clone());
        let analyzer = QualityAnalyzer::new(config.quality.clone());
        Ok(Self {
            config,
            grouping,
            analyzer,
        })
    }

    /// Replace the grouping strategy picked from the configuration.
    pub fn with_strategy(mut self, strategy: Box<dyn GroupingStrategy>) -> Self {
        self.grouping = GroupingEngine::with_strategy(self.config.grouping.clone(), strategy);
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn strategy_name(&self) -> &'static str {
        self.grouping.strategy_name()
    }

    /// Validate the detections without grouping them.
    pub fn validate(
        &self,
        detections: &[RawDetection],
        meta: &VideoMeta,
    ) -> (Vec<RawDetection>, ValidationSummary) {
        filter_valid(
            detections,
            meta.frame_width,
            meta.frame_height,
            &self.config.validation,
        )
    }

    /// Validate, group and merge. Returns merged tracks ordered by first frame.
    pub fn build_tracks(
        &self,
        detections: &[RawDetection],
        meta: &VideoMeta,
    ) -> AdsightResult<Vec<Track>> {
        check_meta(meta)?;

        let (valid, summary) = self.validate(detections, meta);
        tracing::info!(
            "Validated detections: {} accepted, {} rejected",
            summary.accepted,
            summary.rejected_total()
        );
        for (reason, count) in &summary.rejected {
            tracing::debug!("  {}: {}", reason, count);
        }
        if valid.is_empty() {
            return Err(AdsightError::NoValidDetections {
                total: summary.total(),
            });
        }

        let tracks = self.grouping.group(&valid, meta);
        tracing::info!(
            "Grouped into {} candidate tracks ({} strategy)",
            tracks.len(),
            self.grouping.strategy_name()
        );

        let merged = merge_tracks(tracks, meta, &self.config.merge);
        tracing::info!("{} tracks after merging", merged.len());
        Ok(merged)
    }

    /// Run one analysis session and return the surviving events in track order.
    pub fn run(
        &self,
        detections: &[RawDetection],
        meta: &VideoMeta,
        source: Arc<dyn FrameSource>,
    ) -> AdsightResult<Vec<AdEventRecord>> {
        check_meta(meta)?;
        if source.frame_count() == 0 {
            return Err(AdsightError::input("frame source has no frames"));
        }
        let native = source.dimensions();
        if native != (meta.frame_width, meta.frame_height) {
            tracing::info!(
                "Frame source is {}x{}, detections are {}x{}; both map to the analysis resolution",
                native.0,
                native.1,
                meta.frame_width,
                meta.frame_height
            );
        }

        let tracks = self.build_tracks(detections, meta)?;

        let cache = FrameCache::new(
            source,
            (meta.frame_width, meta.frame_height),
            &self.config.cache,
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers.max(1))
            .thread_name(|i| format!("adsight-worker-{i}"))
            .build()
            .map_err(|e| AdsightError::processing(format!("failed to start worker pool: {e}")))?;

        let evaluated: Vec<Option<AdEventRecord>> = pool.install(|| {
            tracks
                .par_iter()
                .enumerate()
                .map(|(track_id, track)| self.evaluate_track(track_id, track, meta, &cache))
                .collect()
        });

        let events: Vec<AdEventRecord> = evaluated.into_iter().flatten().collect();
        tracing::info!(
            "Evaluated {} of {} tracks ({} frame decodes)",
            events.len(),
            tracks.len(),
            cache.decode_count()
        );
        Ok(events)
    }

    /// Run a session over one parsed detections entry.
    ///
    /// `meta` overrides whatever metadata the entry carries.
    pub fn analyze_video(
        &self,
        video: &VideoDetections,
        meta: Option<VideoMeta>,
        source: Arc<dyn FrameSource>,
    ) -> AdsightResult<AdReport> {
        let meta = meta.or_else(|| video.meta()).ok_or_else(|| {
            AdsightError::input(format!(
                "video '{}' has no frame rate or frame size",
                video.video_id
            ))
        })?;
        tracing::info!(
            "Analyzing video '{}' ({} detections, {:.2} fps, {}x{})",
            video.video_id,
            video.detection_count(),
            meta.frame_rate,
            meta.frame_width,
            meta.frame_height
        );

        let events = self.run(&video.raw_detections(), &meta, source)?;
        Ok(AdReport::new(video.video_id.clone(), events))
    }

    fn evaluate_track(
        &self,
        track_id: usize,
        track: &Track,
        meta: &VideoMeta,
        cache: &FrameCache,
    ) -> Option<AdEventRecord> {
        let duration_secs = track.duration_secs(meta);
        if !self.analyzer.meets_min_duration(duration_secs) {
            tracing::debug!(
                "Dropping track {} ({:.3} s is below the minimum duration)",
                track_id,
                duration_secs
            );
            return None;
        }

        let sample_frame = track.first_frame();
        let frame = match cache.get_frame(sample_frame) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!("Skipping track {}: {}", track_id, err);
                return None;
            }
        };

        let envelope = track.envelope();
        let metrics = self.analyzer.analyze(
            &frame,
            &envelope,
            &cache.scale_bbox(&envelope),
            meta.frame_width,
            meta.frame_height,
        );
        let quality = self.analyzer.evaluate_quality(&metrics, duration_secs);
        tracing::debug!(
            "Track {} (frames {}-{}): score {:.3}, {}",
            track_id,
            track.first_frame(),
            track.last_frame(),
            quality.score,
            quality.label
        );

        Some(AdEventRecord {
            track_id,
            first_frame: track.first_frame(),
            last_frame: track.last_frame(),
            detections: track.len(),
            envelope,
            position: metrics.position,
            size_fraction: metrics.size_norm,
            contrast: metrics.contrast_norm,
            duration_secs,
            quality,
        })
    }
}

fn check_meta(meta: &VideoMeta) -> AdsightResult<()> {
    if !meta.frame_rate.is_finite() || meta.frame_rate <= 0.0 {
        return Err(AdsightError::input(format!(
            "invalid frame rate: {}",
            meta.frame_rate
        )));
    }
    if meta.frame_width == 0 || meta.frame_height == 0 {
        return Err(AdsightError::input(format!(
            "invalid frame size: {}x{}",
            meta.frame_width, meta.frame_height
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use adsight_common::config::GroupingStrategyKind;
    use adsight_detection_model::bbox::BoundingBox;
    use adsight_detection_model::report::PositionLabel;
    use image::RgbImage;

    struct BlankSource;

    impl FrameSource for BlankSource {
        fn frame_count(&self) -> u64 {
            90
        }

        fn dimensions(&self) -> (u32, u32) {
            (640, 360)
        }

        fn decode(&self, _frame_index: u64) -> anyhow::Result<RgbImage> {
            Ok(RgbImage::new(640, 360))
        }
    }

    fn det(frame_index: u64, confidence: f64) -> RawDetection {
        RawDetection {
            frame_index,
            bbox: BoundingBox::new(250, 100, 140, 120),
            confidence,
            class_id: 0,
        }
    }

    fn meta() -> VideoMeta {
        VideoMeta::new(30.0, 640, 360)
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = AnalysisConfig::default();
        config.grouping.frame_skip = 0;
        assert!(matches!(
            AdAnalysisPipeline::new(config),
            Err(AdsightError::Config { .. })
        ));
    }

    #[test]
    fn test_strategy_follows_config() {
        let mut config = AnalysisConfig::default();
        assert_eq!(AdAnalysisPipeline::new(config.clone()).unwrap().strategy_name(), "density");
        config.grouping.strategy = GroupingStrategyKind::Greedy;
        assert_eq!(AdAnalysisPipeline::new(config).unwrap().strategy_name(), "greedy");
    }

    #[test]
    fn test_no_valid_detections_is_an_error() {
        let pipeline = AdAnalysisPipeline::new(AnalysisConfig::default()).unwrap();
        let detections: Vec<RawDetection> = (0..5).map(|i| det(i * 5, 0.2)).collect();
        let err = pipeline.build_tracks(&detections, &meta()).unwrap_err();
        assert!(matches!(err, AdsightError::NoValidDetections { total: 5 }));
    }

    #[test]
    fn test_zero_frame_rate_is_an_input_error() {
        let pipeline = AdAnalysisPipeline::new(AnalysisConfig::default()).unwrap();
        let detections = vec![det(0, 0.9)];
        let err = pipeline
            .run(&detections, &VideoMeta::new(0.0, 640, 360), Arc::new(BlankSource))
            .unwrap_err();
        assert!(matches!(err, AdsightError::Input { .. }));
        assert!(err.is_session_fatal());
    }

    #[test]
    fn test_out_of_range_sample_frame_drops_track() {
        let mut config = AnalysisConfig::default();
        config.grouping.strategy = GroupingStrategyKind::Greedy;
        let pipeline = AdAnalysisPipeline::new(config).unwrap();
        // BlankSource only has 90 frames.
        let detections: Vec<RawDetection> = (20..25).map(|i| det(i * 5, 0.9)).collect();
        let events = pipeline.run(&detections, &meta(), Arc::new(BlankSource)).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_boxes_near_coordinate_limit_do_not_panic() {
        let pipeline = AdAnalysisPipeline::new(AnalysisConfig::default()).unwrap();
        let off_frame = |x: i32| -> Vec<RawDetection> {
            (0..18)
                .map(|i| RawDetection {
                    bbox: BoundingBox::new(x, 100, 1000, 100),
                    ..det(i * 5, 0.9)
                })
                .collect()
        };

        // Right edge still fits in i32: accepted, sampled region is empty.
        let events = pipeline
            .run(&off_frame(2_147_482_000), &meta(), Arc::new(BlankSource))
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].position, PositionLabel::Undetermined);

        // Right edge past i32::MAX: rejected as invalid geometry.
        let err = pipeline
            .run(&off_frame(2_147_483_000), &meta(), Arc::new(BlankSource))
            .unwrap_err();
        assert!(matches!(err, AdsightError::NoValidDetections { total: 18 }));
    }

    #[test]
    fn test_analyze_video_needs_metadata() {
        let pipeline = AdAnalysisPipeline::new(AnalysisConfig::default()).unwrap();
        let video = VideoDetections {
            video_id: "clip".to_string(),
            frame_rate: None,
            frame_width: Some(640),
            frame_height: Some(360),
            frames: vec![],
        };
        let err = pipeline
            .analyze_video(&video, None, Arc::new(BlankSource))
            .unwrap_err();
        assert!(matches!(err, AdsightError::Input { .. }));
    }
}
