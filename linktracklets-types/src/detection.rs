//! A single measured sky position at a single time.

use crate::ids::DetectionId;
use serde::{Deserialize, Serialize};

/// An immutable detection record: an id, an observation time in days (MJD),
/// and a sky position in degrees. RA wraps on `[0, 360)`; Dec is Euclidean
/// on `[-90, 90]`. Created at load time and never mutated afterward.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub id: DetectionId,
    /// Observation time, in days (Modified Julian Date).
    pub mjd: f64,
    /// Right ascension in degrees, `[0, 360)`.
    pub ra: f64,
    /// Declination in degrees, `[-90, 90]`.
    pub dec: f64,
}

impl Detection {
    pub fn new(id: DetectionId, mjd: f64, ra: f64, dec: f64) -> Self {
        Detection { id, mjd, ra, dec }
    }

    /// The calendar-night bucket this detection falls in, used for the
    /// minimum-distinct-nights check. A night is the integer floor of the MJD.
    pub fn night(&self) -> i64 {
        self.mjd.floor() as i64
    }
}
