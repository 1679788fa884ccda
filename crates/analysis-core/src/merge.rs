//! Merge pass: stitch chronologically adjacent tracks across short gaps.
//!
//! A single left-to-right fold, not a transitive closure: once a track has
//! been folded into its predecessor it is never compared against later ones.

use adsight_common::config::MergeConfig;
use adsight_detection_model::detection::VideoMeta;
use adsight_detection_model::track::Track;

/// Merge `tracks` and return them ordered by first frame.
///
/// A track joins the most recently accepted one when the frame gap between
/// them is at most `frame_rate * max_time_gap_secs` and their envelopes'
/// IoU exceeds `merge_iou_threshold`.
pub fn merge_tracks(mut tracks: Vec<Track>, meta: &VideoMeta, config: &MergeConfig) -> Vec<Track> {
    tracks.sort_by_key(Track::first_frame);
    let max_gap_frames = meta.frame_rate * config.max_time_gap_secs;
    let candidates = tracks.len();

    let mut merged: Vec<Track> = Vec::with_capacity(tracks.len());
    for track in tracks {
        if let Some(accepted) = merged.last_mut() {
            let gap = track.first_frame() as f64 - accepted.last_frame() as f64;
            let overlap = accepted.envelope().iou(&track.envelope());
            if gap <= max_gap_frames && overlap > config.merge_iou_threshold {
                tracing::trace!(
                    "Merging track at frames {}-{} into {}-{} (gap={}, iou={:.3})",
                    track.first_frame(),
                    track.last_frame(),
                    accepted.first_frame(),
                    accepted.last_frame(),
                    gap,
                    overlap
                );
                accepted.absorb(track);
                continue;
            }
        }
        merged.push(track);
    }

    tracing::debug!("Merged {} candidate tracks into {}", candidates, merged.len());
    merged
}
