//! Ids used throughout the linker.
//!
//! `DetectionId` is the externally-visible identifier carried in input and
//! output files (an arbitrary integer assigned upstream, e.g. by a MITI
//! exporter). `DetectionIndex`/`TrackletIndex` are plain `usize` offsets
//! into the in-memory `Vec<Detection>`/`Vec<Tracklet>` built at load time,
//! a bare index rather than a bitpacked address since there is no address
//! space pressure to justify packing here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A detection's externally-visible id, as found in the MITI input file.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DetectionId(pub i64);

impl From<i64> for DetectionId {
    fn from(v: i64) -> Self {
        DetectionId(v)
    }
}

impl From<DetectionId> for i64 {
    fn from(v: DetectionId) -> Self {
        v.0
    }
}

impl fmt::Display for DetectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of a `Detection` within the run's detection table.
pub type DetectionIndex = usize;

/// Index of a `Tracklet` within the run's tracklet table.
pub type TrackletIndex = usize;

/// A distinct observation time, numbered in time order starting at 0.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ImageId(pub u32);

impl From<u32> for ImageId {
    fn from(v: u32) -> Self {
        ImageId(v)
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
