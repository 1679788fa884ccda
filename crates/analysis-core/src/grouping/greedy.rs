//! Greedy IoU grouping with spatial-index pruning.

use adsight_common::config::GroupingConfig;
use adsight_detection_model::detection::{RawDetection, VideoMeta};
use adsight_detection_model::track::{Track, TrackMember};

use super::GroupingStrategy;
use crate::spatial_index::SpatialGrid;

/// Attach each detection to the track of the first earlier detection within
/// `search_radius` whose IoU exceeds `iou_threshold`; otherwise open a track.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyIouGrouping;

impl GroupingStrategy for GreedyIouGrouping {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn group(
        &self,
        detections: &[RawDetection],
        _meta: &VideoMeta,
        config: &GroupingConfig,
    ) -> Vec<Track> {
        let centers = detections.iter().map(|d| d.bbox.center()).collect();
        let index = SpatialGrid::new(centers, config.search_radius);

        let mut tracks: Vec<Track> = vec![];
        // Track id of every detection processed so far.
        let mut assignment: Vec<usize> = Vec::with_capacity(detections.len());

        for (i, detection) in detections.iter().enumerate() {
            let matched = index
                .within_radius(detection.bbox.center(), config.search_radius)
                .into_iter()
                .take_while(|&j| j < i)
                .find(|&j| detection.bbox.iou(&detections[j].bbox) > config.iou_threshold)
                .map(|j| assignment[j]);

            match matched {
                Some(track_id) => {
                    tracks[track_id].push(TrackMember::from(detection));
                    assignment.push(track_id);
                }
                None => {
                    assignment.push(tracks.len());
                    tracks.push(Track::new(TrackMember::from(detection)));
                }
            }
        }

        tracing::debug!(
            "Greedy grouping formed {} tracks from {} detections",
            tracks.len(),
            detections.len()
        );
        tracks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adsight_detection_model::bbox::BoundingBox;

    fn det(frame_index: u64, x: i32, y: i32) -> RawDetection {
        RawDetection {
            frame_index,
            bbox: BoundingBox::new(x, y, 100, 80),
            confidence: 0.9,
            class_id: 0,
        }
    }

    fn group(detections: &[RawDetection]) -> Vec<Track> {
        GreedyIouGrouping.group(
            detections,
            &VideoMeta::new(30.0, 640, 360),
            &GroupingConfig::default(),
        )
    }

    #[test]
    fn test_drifting_box_stays_in_one_track() {
        let detections: Vec<RawDetection> =
            (0..10).map(|i| det(i * 5, 100 + i as i32 * 8, 100)).collect();
        let tracks = group(&detections);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].len(), 10);
    }

    #[test]
    fn test_far_apart_boxes_form_separate_tracks() {
        let detections = vec![det(0, 0, 0), det(0, 500, 250), det(5, 2, 2), det(5, 498, 252)];
        let tracks = group(&detections);
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].members()[1].frame_index, 5);
        assert_eq!(tracks[1].envelope().x, 500);
    }

    #[test]
    fn test_low_overlap_starts_new_track() {
        // Shifted by 80 of 100 px: IoU = 20*80 / (2*8000 - 1600) ~ 0.11.
        let detections = vec![det(0, 100, 100), det(5, 180, 100)];
        assert_eq!(group(&detections).len(), 2);
    }

    #[test]
    fn test_never_discards_valid_detections() {
        let detections = vec![det(0, 0, 0), det(5, 300, 0), det(10, 0, 200), det(15, 500, 250)];
        let tracks = group(&detections);
        let members: usize = tracks.iter().map(Track::len).sum();
        assert_eq!(members, detections.len());
    }
}
