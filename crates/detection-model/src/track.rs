//! Tracks: groups of detections believed to be one continuous ad appearance.

use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;
use crate::detection::{FrameIndex, RawDetection, VideoMeta};

/// One detection inside a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMember {
    pub frame_index: FrameIndex,
    pub bbox: BoundingBox,
}

impl From<&RawDetection> for TrackMember {
    fn from(detection: &RawDetection) -> Self {
        Self {
            frame_index: detection.frame_index,
            bbox: detection.bbox,
        }
    }
}

/// A non-empty, growing set of detections with a representative envelope.
///
/// The envelope is the largest-area member, not the union of all members, so
/// a single stray box cannot inflate it. It is recomputed from scratch after
/// every membership change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Track {
    envelope: BoundingBox,
    members: Vec<TrackMember>,
}

/// Largest-area box among `members`; the earliest wins ties.
pub fn envelope_of(members: &[TrackMember]) -> Option<BoundingBox> {
    let mut best: Option<&TrackMember> = None;
    for member in members {
        match best {
            Some(current) if current.bbox.area() >= member.bbox.area() => {}
            _ => best = Some(member),
        }
    }
    best.map(|m| m.bbox)
}

impl Track {
    /// Start a single-member track.
    pub fn new(first: TrackMember) -> Self {
        Self {
            envelope: first.bbox,
            members: vec![first],
        }
    }

    /// Build a track from members in the given order. `None` if empty.
    pub fn from_members(members: Vec<TrackMember>) -> Option<Self> {
        let envelope = envelope_of(&members)?;
        Some(Self { envelope, members })
    }

    pub fn envelope(&self) -> BoundingBox {
        self.envelope
    }

    pub fn members(&self) -> &[TrackMember] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Append a member.
    pub fn push(&mut self, member: TrackMember) {
        self.members.push(member);
        self.refresh_envelope();
    }

    /// Take over every member of `other`.
    pub fn absorb(&mut self, other: Track) {
        self.members.extend(other.members);
        self.refresh_envelope();
    }

    fn refresh_envelope(&mut self) {
        if let Some(envelope) = envelope_of(&self.members) {
            self.envelope = envelope;
        }
    }

    /// Earliest member frame.
    pub fn first_frame(&self) -> FrameIndex {
        self.members
            .iter()
            .map(|m| m.frame_index)
            .min()
            .unwrap_or_default()
    }

    /// Latest member frame.
    pub fn last_frame(&self) -> FrameIndex {
        self.members
            .iter()
            .map(|m| m.frame_index)
            .max()
            .unwrap_or_default()
    }

    /// Inclusive frame span divided by the frame rate.
    pub fn duration_secs(&self, meta: &VideoMeta) -> f64 {
        meta.span_secs(self.first_frame(), self.last_frame())
    }
}
