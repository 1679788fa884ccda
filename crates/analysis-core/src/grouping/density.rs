//! Density-based grouping: DBSCAN over normalized time and position.
//!
//! Each detection becomes `(seconds, center_x, center_y)`, z-scored per axis
//! across the video so time and pixels are comparable. Flicker and short
//! occlusions leave gaps that strict per-detection IoU matching cannot bridge;
//! a dense cluster does.

use std::collections::VecDeque;

use adsight_common::config::GroupingConfig;
use adsight_detection_model::detection::{RawDetection, VideoMeta};
use adsight_detection_model::track::{Track, TrackMember};

use super::GroupingStrategy;

#[derive(Debug, Clone, Copy, Default)]
pub struct DensityGrouping;

impl GroupingStrategy for DensityGrouping {
    fn name(&self) -> &'static str {
        "density"
    }

    fn group(
        &self,
        detections: &[RawDetection],
        meta: &VideoMeta,
        config: &GroupingConfig,
    ) -> Vec<Track> {
        let features = normalized_features(detections, meta);
        let labels = dbscan(&features, config.eps, config.min_samples);

        let cluster_count = labels.iter().flatten().max().map_or(0, |max| max + 1);
        let mut clusters: Vec<Vec<TrackMember>> = vec![vec![]; cluster_count];
        let mut noise = 0usize;
        for (detection, label) in detections.iter().zip(&labels) {
            match label {
                Some(cluster) => clusters[*cluster].push(TrackMember::from(detection)),
                None => noise += 1,
            }
        }

        tracing::debug!(
            "Density grouping found {} clusters, discarded {} noise detections",
            cluster_count,
            noise
        );
        clusters.into_iter().filter_map(Track::from_members).collect()
    }
}

/// `(time_secs, center_x, center_y)` per detection, z-scored per column.
pub fn normalized_features(detections: &[RawDetection], meta: &VideoMeta) -> Vec<[f64; 3]> {
    let mut features: Vec<[f64; 3]> = detections
        .iter()
        .map(|d| {
            let (cx, cy) = d.bbox.center();
            [meta.frame_secs(d.frame_index), cx, cy]
        })
        .collect();

    if features.is_empty() {
        return features;
    }

    let n = features.len() as f64;
    for axis in 0..3 {
        let mean = features.iter().map(|f| f[axis]).sum::<f64>() / n;
        let variance = features
            .iter()
            .map(|f| (f[axis] - mean).powi(2))
            .sum::<f64>()
            / n;
        let std = variance.sqrt();
        for f in &mut features {
            // A constant axis carries no information; park it at zero.
            f[axis] = if std > 1e-12 {
                (f[axis] - mean) / std
            } else {
                0.0
            };
        }
    }
    features
}

/// Cluster label per point; `None` is noise.
///
/// A point is a core point when at least `min_samples` points, itself
/// included, lie within `eps`. Clusters are numbered in discovery order.
pub fn dbscan(points: &[[f64; 3]], eps: f64, min_samples: usize) -> Vec<Option<usize>> {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Unvisited,
        Noise,
        Clustered(usize),
    }

    let eps_sq = eps * eps;
    let neighbors = |p: usize| -> Vec<usize> {
        points
            .iter()
            .enumerate()
            .filter(|(_, q)| squared_distance(&points[p], q) <= eps_sq)
            .map(|(i, _)| i)
            .collect()
    };

    let mut states = vec![State::Unvisited; points.len()];
    let mut next_cluster = 0usize;

    for p in 0..points.len() {
        if states[p] != State::Unvisited {
            continue;
        }
        let seeds = neighbors(p);
        if seeds.len() < min_samples {
            states[p] = State::Noise;
            continue;
        }

        let cluster = next_cluster;
        next_cluster += 1;
        states[p] = State::Clustered(cluster);

        let mut queue: VecDeque<usize> = seeds.into_iter().filter(|&q| q != p).collect();
        while let Some(q) = queue.pop_front() {
            match states[q] {
                State::Clustered(_) => continue,
                // Border point: joins the cluster but does not expand it.
                State::Noise => states[q] = State::Clustered(cluster),
                State::Unvisited => {
                    states[q] = State::Clustered(cluster);
                    let reachable = neighbors(q);
                    if reachable.len() >= min_samples {
                        queue.extend(
                            reachable
                                .into_iter()
                                .filter(|&r| !matches!(states[r], State::Clustered(_))),
                        );
                    }
                }
            }
        }
    }

    states
        .into_iter()
        .map(|state| match state {
            State::Clustered(cluster) => Some(cluster),
            State::Unvisited | State::Noise => None,
        })
        .collect()
}

fn squared_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}
