//! A chain of tracklets and detections describing one object's motion.

use crate::ids::{DetectionIndex, TrackletIndex};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Two sets: the component tracklet indices and the component detection
/// indices that make up one candidate (or accepted) track.
///
/// Equality and ordering are induced by the detection-index set first,
/// then the tracklet-index set.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Track {
    pub tracklets: BTreeSet<TrackletIndex>,
    pub detections: BTreeSet<DetectionIndex>,
}

impl Track {
    pub fn new() -> Self {
        Track {
            tracklets: BTreeSet::new(),
            detections: BTreeSet::new(),
        }
    }

    pub fn from_parts(tracklets: BTreeSet<TrackletIndex>, detections: BTreeSet<DetectionIndex>) -> Self {
        Track { tracklets, detections }
    }

    pub fn tracklet_count(&self) -> usize {
        self.tracklets.len()
    }

    pub fn detection_count(&self) -> usize {
        self.detections.len()
    }
}

impl Default for Track {
    fn default() -> Self {
        Track::new()
    }
}

impl Ord for Track {
    fn cmp(&self, other: &Self) -> Ordering {
        self.detections
            .cmp(&other.detections)
            .then_with(|| self.tracklets.cmp(&other.tracklets))
    }
}

impl PartialOrd for Track {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(dets: &[usize], tracklets: &[usize]) -> Track {
        Track::from_parts(tracklets.iter().copied().collect(), dets.iter().copied().collect())
    }

    #[test]
    fn equality_ignores_construction_order() {
        let a = track(&[1, 2, 3], &[0, 1]);
        let b = track(&[3, 2, 1], &[1, 0]);
        assert_eq!(a, b);
    }

    #[test]
    fn ordering_prefers_detections_then_tracklets() {
        let a = track(&[1, 2], &[5]);
        let b = track(&[1, 3], &[0]);
        assert!(a < b, "detection sets differ, {{1,2}} < {{1,3}}");

        let c = track(&[1, 2], &[0]);
        let d = track(&[1, 2], &[5]);
        assert!(c < d, "same detections, tracklet sets break the tie");
    }
}
