//! Score ad appearances in one video.

use std::path::PathBuf;
use std::sync::Arc;

use adsight_analysis_core::frame_cache::FrameSource;
use adsight_analysis_core::pipeline::AdAnalysisPipeline;
use adsight_common::config::AnalysisConfig;
use adsight_detection_model::detection::{VideoDetections, VideoMeta};

use crate::frames::ImageSequenceSource;

pub struct AnalyzeArgs {
    pub detections: PathBuf,
    pub frames: PathBuf,
    pub output: Option<PathBuf>,
    pub json: bool,
    pub video_id: Option<String>,
    pub frame_rate: Option<f64>,
    pub config: AnalysisConfig,
}

pub fn run(args: AnalyzeArgs) -> anyhow::Result<()> {
    let videos = super::load_detections(&args.detections)?;
    let video = select_video(videos, args.video_id.as_deref())?;

    let source = ImageSequenceSource::open(&args.frames)?;
    tracing::info!(
        "Loaded {} frames ({}x{}) from {}",
        source.frame_count(),
        source.dimensions().0,
        source.dimensions().1,
        args.frames.display()
    );

    let meta = resolve_meta(&video, args.frame_rate, source.dimensions())?;

    let pipeline = AdAnalysisPipeline::new(args.config)
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;
    let report = pipeline
        .analyze_video(&video, Some(meta), Arc::new(source))
        .map_err(|e| anyhow::anyhow!("Analysis failed: {e}"))?;

    let rendered = if args.json {
        report.to_json()?
    } else {
        report.to_text()
    };

    match args.output {
        Some(path) => {
            std::fs::write(&path, rendered)
                .map_err(|e| anyhow::anyhow!("Failed to write {}: {e}", path.display()))?;
            println!(
                "Report with {} ad appearance(s) saved to: {}",
                report.events.len(),
                path.display()
            );
        }
        None => println!("{rendered}"),
    }

    Ok(())
}

fn select_video(
    videos: Vec<VideoDetections>,
    video_id: Option<&str>,
) -> anyhow::Result<VideoDetections> {
    match video_id {
        Some(id) => videos
            .into_iter()
            .find(|v| v.video_id == id)
            .ok_or_else(|| anyhow::anyhow!("No video with id '{id}' in detections file")),
        None => {
            if videos.len() > 1 {
                tracing::warn!(
                    "Detections file holds {} videos; analyzing the first. Use --video-id to pick another.",
                    videos.len()
                );
            }
            videos
                .into_iter()
                .next()
                .ok_or_else(|| anyhow::anyhow!("Detections file holds no videos"))
        }
    }
}

/// Metadata from the file, with the frame rate flag taking precedence and the
/// frame directory filling in a missing frame size.
fn resolve_meta(
    video: &VideoDetections,
    frame_rate: Option<f64>,
    source_size: (u32, u32),
) -> anyhow::Result<VideoMeta> {
    let frame_rate = frame_rate.or(video.frame_rate).ok_or_else(|| {
        anyhow::anyhow!("No frame rate in detections file; pass --frame-rate")
    })?;
    let frame_width = video.frame_width.unwrap_or(source_size.0);
    let frame_height = video.frame_height.unwrap_or(source_size.1);
    Ok(VideoMeta::new(frame_rate, frame_width, frame_height))
}
