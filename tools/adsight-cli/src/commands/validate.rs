//! Validate a detections file and report what the validator would drop.

use std::path::PathBuf;

use adsight_analysis_core::validator::filter_valid;
use adsight_common::config::AnalysisConfig;

pub fn run(path: PathBuf, json: bool, config: &AnalysisConfig) -> anyhow::Result<()> {
    let videos = super::load_detections(&path)?;

    let mut summaries = Vec::with_capacity(videos.len());
    for video in &videos {
        let Some(meta) = video.meta() else {
            if !json {
                println!("Video '{}':", video.video_id);
                println!("  Missing frame rate or frame size; cannot validate boxes.");
            }
            continue;
        };

        let (_, summary) = filter_valid(
            &video.raw_detections(),
            meta.frame_width,
            meta.frame_height,
            &config.validation,
        );

        if !json {
            println!("Video '{}':", video.video_id);
            println!("  Resolution: {}x{}", meta.frame_width, meta.frame_height);
            println!("  FPS: {}", meta.frame_rate);
            println!("  Frames with detections: {}", video.frames.len());
            println!(
                "  Detections: {} ({} accepted, {} rejected)",
                summary.total(),
                summary.accepted,
                summary.rejected_total()
            );
            for (reason, count) in &summary.rejected {
                println!("    - {reason}: {count}");
            }
        }
        summaries.push(serde_json::json!({
            "video_id": video.video_id,
            "summary": summary,
        }));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else if summaries.len() == videos.len() {
        println!("\nDetections file is valid.");
    } else {
        println!(
            "\n{} video(s) lack metadata; pass it on the command line when analyzing.",
            videos.len() - summaries.len()
        );
    }

    Ok(())
}
