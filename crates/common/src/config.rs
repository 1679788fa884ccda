//! Application and analysis configuration.
//!
//! Every threshold the analysis uses lives here and is passed explicitly into
//! the engine, so two sessions with different tuning can run side by side.
//! All structs deserialize with `#[serde(default)]`, so a config file only
//! needs the fields it wants to change.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AdsightError, AdsightResult};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Analysis thresholds and resource limits.
    pub analysis: AnalysisConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Everything one "analyze this video" session is tuned by.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub validation: ValidationConfig,
    pub grouping: GroupingConfig,
    pub merge: MergeConfig,
    pub quality: QualityConfig,
    pub cache: CacheConfig,

    /// Size of the per-track evaluation worker pool.
    pub workers: usize,
}

/// Detection validator thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Minimum box area as a fraction of the frame area.
    pub min_size_ratio: f64,

    /// Minimum absolute box area (pixels, detection resolution).
    pub min_area: i64,

    /// Maximum absolute box area (pixels, detection resolution).
    pub max_area: i64,

    /// Minimum detector confidence.
    pub min_confidence: f64,

    /// Detector class ids that count as ads.
    pub allowed_classes: Vec<i64>,

    /// Also reject boxes that extend past the right or bottom frame edge.
    pub strict_bounds: bool,
}

/// Which grouping algorithm turns detections into candidate tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingStrategyKind {
    /// Greedy IoU matching with spatial-index pruning.
    Greedy,
    /// DBSCAN over normalized (time, center_x, center_y).
    #[default]
    Density,
}

/// Grouping engine parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupingConfig {
    pub strategy: GroupingStrategyKind,

    /// Only frames with `frame_index % frame_skip == 0` are grouped.
    pub frame_skip: u64,

    /// IoU a detection must exceed against a grouped detection to join its track.
    pub iou_threshold: f64,

    /// Spatial-index lookup radius around a detection center (pixels).
    pub search_radius: f64,

    /// DBSCAN neighborhood radius in z-score units.
    pub eps: f64,

    /// DBSCAN core-point threshold, counting the point itself.
    pub min_samples: usize,
}

/// Merge pass parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Envelope IoU two adjacent tracks must exceed to merge.
    pub merge_iou_threshold: f64,

    /// Largest gap between tracks (seconds) that still counts as continuous.
    pub max_time_gap_secs: f64,
}

/// Which axes the centered-position check looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionPolicy {
    #[default]
    Horizontal,
    BothAxes,
}

/// Quality analyzer parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Tracks shorter than this (seconds) are treated as detection noise.
    pub min_duration_secs: f64,

    /// Sampling-region padding per side, as a fraction of the box size.
    pub padding: f64,

    /// Half-width of the "centered" band, as a fraction of the frame dimension.
    pub center_tolerance: f64,

    pub position_policy: PositionPolicy,

    /// Duration at which the duration term saturates (seconds).
    pub full_duration_secs: f64,
}

/// Frame cache sizing and analysis resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of resident decoded frames.
    pub capacity: usize,

    pub analysis_width: u32,
    pub analysis_height: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "adsight=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Include thread ids in text output; useful when tracing the worker pool.
    pub thread_ids: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            validation: ValidationConfig::default(),
            grouping: GroupingConfig::default(),
            merge: MergeConfig::default(),
            quality: QualityConfig::default(),
            cache: CacheConfig::default(),
            workers: 4,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_size_ratio: 0.003,
            min_area: 2_000,
            max_area: 200_000,
            min_confidence: 0.7,
            allowed_classes: vec![0],
            strict_bounds: false,
        }
    }
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            strategy: GroupingStrategyKind::default(),
            frame_skip: 5,
            iou_threshold: 0.2,
            search_radius: 200.0,
            eps: 0.5,
            min_samples: 3,
        }
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            merge_iou_threshold: 0.15,
            max_time_gap_secs: 4.0,
        }
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_duration_secs: 0.05,
            padding: 0.2,
            center_tolerance: 0.2,
            position_policy: PositionPolicy::default(),
            full_duration_secs: 3.0,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 64,
            analysis_width: 640,
            analysis_height: 360,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            thread_ids: false,
        }
    }
}

impl AnalysisConfig {
    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> AdsightResult<()> {
        let v = &self.validation;
        if v.min_area > v.max_area {
            return Err(AdsightError::config(format!(
                "min_area ({}) exceeds max_area ({})",
                v.min_area, v.max_area
            )));
        }
        if !(0.0..=1.0).contains(&v.min_confidence) {
            return Err(AdsightError::config(format!(
                "min_confidence must be within [0, 1], got {}",
                v.min_confidence
            )));
        }
        if v.allowed_classes.is_empty() {
            return Err(AdsightError::config("allowed_classes is empty"));
        }

        let g = &self.grouping;
        if g.frame_skip == 0 {
            return Err(AdsightError::config("frame_skip must be at least 1"));
        }
        check_unit("iou_threshold", g.iou_threshold)?;
        if g.search_radius <= 0.0 {
            return Err(AdsightError::config("search_radius must be positive"));
        }
        if g.eps <= 0.0 {
            return Err(AdsightError::config("eps must be positive"));
        }
        if g.min_samples == 0 {
            return Err(AdsightError::config("min_samples must be at least 1"));
        }

        check_unit("merge_iou_threshold", self.merge.merge_iou_threshold)?;
        if self.merge.max_time_gap_secs < 0.0 {
            return Err(AdsightError::config("max_time_gap_secs must not be negative"));
        }

        let q = &self.quality;
        if q.padding < 0.0 || q.center_tolerance < 0.0 {
            return Err(AdsightError::config(
                "padding and center_tolerance must not be negative",
            ));
        }
        if q.full_duration_secs <= 0.0 {
            return Err(AdsightError::config("full_duration_secs must be positive"));
        }

        if self.cache.capacity == 0 {
            return Err(AdsightError::config("cache capacity must be at least 1"));
        }
        if self.cache.analysis_width == 0 || self.cache.analysis_height == 0 {
            return Err(AdsightError::config("analysis resolution must be non-zero"));
        }
        if self.workers == 0 {
            return Err(AdsightError::config("workers must be at least 1"));
        }
        Ok(())
    }
}

fn check_unit(name: &str, value: f64) -> AdsightResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(AdsightError::config(format!(
            "{name} must be within [0, 1], got {value}"
        )))
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load config from an explicit path, propagating read and parse errors.
    pub fn load_from(path: &Path) -> AdsightResult<Self> {
        if !path.exists() {
            return Err(AdsightError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save config to the given path, or the standard location when `None`.
    pub fn save(&self, path: Option<&Path>) -> AdsightResult<PathBuf> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(config_file_path);
        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, json)?;
        Ok(config_path)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("adsight").join("config.json")
}
