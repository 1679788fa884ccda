//! Frame source backed by a directory of still images.

use std::path::{Path, PathBuf};

use adsight_analysis_core::frame_cache::FrameSource;
use image::RgbImage;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// One image file per frame, ordered by file name.
pub struct ImageSequenceSource {
    files: Vec<PathBuf>,
    dimensions: (u32, u32),
}

impl ImageSequenceSource {
    pub fn open(dir: &Path) -> anyhow::Result<Self> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| anyhow::anyhow!("Failed to read frame directory {}: {e}", dir.display()))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if path.is_file() && is_image {
                files.push(path);
            }
        }
        files.sort();

        let first = files
            .first()
            .ok_or_else(|| anyhow::anyhow!("No frame images found in {}", dir.display()))?;
        let dimensions = image::image_dimensions(first)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", first.display()))?;

        Ok(Self { files, dimensions })
    }
}

impl FrameSource for ImageSequenceSource {
    fn frame_count(&self) -> u64 {
        self.files.len() as u64
    }

    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    fn decode(&self, frame_index: u64) -> anyhow::Result<RgbImage> {
        let path = usize::try_from(frame_index)
            .ok()
            .and_then(|i| self.files.get(i))
            .ok_or_else(|| anyhow::anyhow!("no image for frame {frame_index}"))?;
        let frame = image::open(path)
            .map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))?
            .to_rgb8();
        if frame.dimensions() != self.dimensions {
            tracing::warn!(
                "{} is {}x{}, expected {}x{}",
                path.display(),
                frame.width(),
                frame.height(),
                self.dimensions.0,
                self.dimensions.1
            );
        }
        Ok(frame)
    }
}
