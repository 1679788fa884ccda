pub mod analyze;
pub mod init_config;
pub mod validate;

use std::path::Path;

use adsight_detection_model::detection::{parse_detection_file, VideoDetections};

/// Read and parse a detections file.
pub fn load_detections(path: &Path) -> anyhow::Result<Vec<VideoDetections>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))?;
    let videos = parse_detection_file(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse {}: {e}", path.display()))?;
    if videos.is_empty() {
        anyhow::bail!("{} contains no videos", path.display());
    }
    Ok(videos)
}
