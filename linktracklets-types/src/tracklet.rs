//! A short chain of detections believed to be the same object.

use crate::ids::DetectionIndex;

/// A tracklet: a handful of detection indices plus the sky-plane velocity
/// fit through them. The velocity fields start at zero and are filled in
/// once, by `linktracklets_core::quadfit`, before the tracklet is indexed
/// into a `TrackletTree`; after that point they are treated as read-only.
///
/// Invariant: `detections.len() >= 2` and the referenced detections span at
/// least two distinct times.
#[derive(Debug, Clone, PartialEq)]
pub struct Tracklet {
    pub detections: Vec<DetectionIndex>,
    /// Fitted RA velocity, degrees/day.
    pub v_ra: f64,
    /// Fitted Dec velocity, degrees/day.
    pub v_dec: f64,
}

impl Tracklet {
    pub fn new(detections: Vec<DetectionIndex>) -> Self {
        Tracklet {
            detections,
            v_ra: 0.0,
            v_dec: 0.0,
        }
    }

    pub fn set_velocity(&mut self, v_ra: f64, v_dec: f64) {
        self.v_ra = v_ra;
        self.v_dec = v_dec;
    }
}
