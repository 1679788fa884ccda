use std::path::PathBuf;
use std::sync::Arc;

use adsight_analysis_core::frame_cache::FrameSource;
use adsight_analysis_core::pipeline::AdAnalysisPipeline;
use adsight_common::config::{AnalysisConfig, GroupingStrategyKind};
use adsight_common::error::AdsightError;
use adsight_detection_model::bbox::BoundingBox;
use adsight_detection_model::detection::{
    parse_detection_file, RawDetection, VideoDetections, VideoMeta,
};
use adsight_detection_model::report::{PositionLabel, QualityLabel};
use image::{Rgb, RgbImage};

/// Dark frames with a bright rectangle where the ad sits.
struct PatchSource {
    frames: u64,
    size: (u32, u32),
    patch: BoundingBox,
}

impl FrameSource for PatchSource {
    fn frame_count(&self) -> u64 {
        self.frames
    }

    fn dimensions(&self) -> (u32, u32) {
        self.size
    }

    fn decode(&self, _frame_index: u64) -> anyhow::Result<RgbImage> {
        let patch = self.patch;
        Ok(RgbImage::from_fn(self.size.0, self.size.1, |x, y| {
            let (x, y) = (x as i32, y as i32);
            if x >= patch.x && x < patch.right() && y >= patch.y && y < patch.bottom() {
                Rgb([220, 220, 220])
            } else {
                Rgb([40, 40, 40])
            }
        }))
    }
}

fn load_fixture_video() -> VideoDetections {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("fixtures")
        .join("synthetic-video")
        .join("detections.json");

    let content = std::fs::read_to_string(path).expect("fixture detections should be readable");
    let mut videos = parse_detection_file(&content).expect("fixture detections should parse");
    assert_eq!(videos.len(), 1);
    videos.remove(0)
}

fn fixture_source() -> Arc<dyn FrameSource> {
    Arc::new(PatchSource {
        frames: 90,
        size: (640, 360),
        patch: BoundingBox::new(250, 100, 140, 120),
    })
}

fn config_with(strategy: GroupingStrategyKind) -> AnalysisConfig {
    let mut config = AnalysisConfig::default();
    config.grouping.strategy = strategy;
    config
}

#[test]
fn steady_ad_yields_one_centered_event() {
    let video = load_fixture_video();
    let pipeline = AdAnalysisPipeline::new(AnalysisConfig::default()).unwrap();
    let report = pipeline
        .analyze_video(&video, None, fixture_source())
        .unwrap();

    assert_eq!(report.video_id, "synthetic-video");
    assert_eq!(report.events.len(), 1);

    let event = &report.events[0];
    assert_eq!(event.first_frame, 0);
    assert_eq!(event.last_frame, 85);
    assert_eq!(event.detections, 18);
    assert_eq!(event.envelope, BoundingBox::new(250, 100, 140, 120));
    assert!((event.duration_secs - 86.0 / 30.0).abs() < 1e-9);
    assert!((event.size_fraction - 0.0729).abs() < 1e-3);
    assert_eq!(event.position, PositionLabel::Center);
    assert!(event.contrast > 0.6);
    assert!(event.quality.label >= QualityLabel::Medium);

    let text = report.to_text();
    assert!(text.contains("Ad appearance #0 (frames 0-85):"));
    assert!(text.contains("Position: center"));
}

#[test]
fn both_strategies_agree_on_fixture() {
    let video = load_fixture_video();
    let meta = video.meta().unwrap();
    let detections = video.raw_detections();

    let density = AdAnalysisPipeline::new(config_with(GroupingStrategyKind::Density)).unwrap();
    let greedy = AdAnalysisPipeline::new(config_with(GroupingStrategyKind::Greedy)).unwrap();

    let a = density.run(&detections, &meta, fixture_source()).unwrap();
    let b = greedy.run(&detections, &meta, fixture_source()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn fixture_distractors_are_rejected() {
    let video = load_fixture_video();
    let meta = video.meta().unwrap();
    let pipeline = AdAnalysisPipeline::new(AnalysisConfig::default()).unwrap();

    let (valid, summary) = pipeline.validate(&video.raw_detections(), &meta);
    assert_eq!(valid.len(), 18);
    assert_eq!(summary.rejected_total(), 3);
    assert_eq!(summary.total(), video.detection_count());
}

#[test]
fn high_resolution_detections_sample_the_right_pixels() {
    // Same scene at 3x: detections in 1920x1080, frames cached at 640x360.
    let patch = BoundingBox::new(750, 300, 420, 360);
    let detections: Vec<RawDetection> = (0..18)
        .map(|i| RawDetection {
            frame_index: i * 5,
            bbox: patch,
            confidence: 0.9,
            class_id: 0,
        })
        .collect();
    let source = Arc::new(PatchSource {
        frames: 90,
        size: (1920, 1080),
        patch,
    });

    let pipeline = AdAnalysisPipeline::new(AnalysisConfig::default()).unwrap();
    let events = pipeline
        .run(&detections, &VideoMeta::new(30.0, 1920, 1080), source)
        .unwrap();

    assert_eq!(events.len(), 1);
    assert!((events[0].size_fraction - 0.0729).abs() < 1e-3);
    assert!(events[0].contrast > 0.6);
}

#[test]
fn frame_source_smaller_than_detection_resolution() {
    // Detections in 1920x1080, frames delivered at 960x540.
    let detections: Vec<RawDetection> = (0..18)
        .map(|i| RawDetection {
            frame_index: i * 5,
            bbox: BoundingBox::new(750, 300, 420, 360),
            confidence: 0.9,
            class_id: 0,
        })
        .collect();
    let source = Arc::new(PatchSource {
        frames: 90,
        size: (960, 540),
        patch: BoundingBox::new(375, 150, 210, 180),
    });

    let pipeline = AdAnalysisPipeline::new(AnalysisConfig::default()).unwrap();
    let events = pipeline
        .run(&detections, &VideoMeta::new(30.0, 1920, 1080), source)
        .unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].envelope, BoundingBox::new(750, 300, 420, 360));
    assert!((events[0].size_fraction - 0.0729).abs() < 1e-3);
    assert!(events[0].contrast > 0.6);
}

#[test]
fn single_frame_track_is_too_short() {
    let pipeline = AdAnalysisPipeline::new(config_with(GroupingStrategyKind::Greedy)).unwrap();
    let detections = vec![RawDetection {
        frame_index: 10,
        bbox: BoundingBox::new(250, 100, 140, 120),
        confidence: 0.9,
        class_id: 0,
    }];

    let tracks = pipeline
        .build_tracks(&detections, &VideoMeta::new(30.0, 640, 360))
        .unwrap();
    assert_eq!(tracks.len(), 1);

    let events = pipeline
        .run(&detections, &VideoMeta::new(30.0, 640, 360), fixture_source())
        .unwrap();
    assert!(events.is_empty());
}

#[test]
fn strict_thresholds_leave_nothing_to_analyze() {
    let video = load_fixture_video();
    let mut config = AnalysisConfig::default();
    config.validation.min_confidence = 0.99;
    let pipeline = AdAnalysisPipeline::new(config).unwrap();

    let err = pipeline
        .analyze_video(&video, None, fixture_source())
        .unwrap_err();
    assert!(matches!(err, AdsightError::NoValidDetections { total: 21 }));
}

#[test]
fn empty_frame_source_is_an_input_error() {
    let video = load_fixture_video();
    let pipeline = AdAnalysisPipeline::new(AnalysisConfig::default()).unwrap();
    let source = Arc::new(PatchSource {
        frames: 0,
        size: (640, 360),
        patch: BoundingBox::new(0, 0, 1, 1),
    });

    let err = pipeline.analyze_video(&video, None, source).unwrap_err();
    assert!(matches!(err, AdsightError::Input { .. }));
}
