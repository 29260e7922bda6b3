//! Foundational data types for the tracklet-to-track linker: ids, the
//! `Detection`/`Tracklet`/`Track` records, and the shared error taxonomy.
//! Kept dependency-light so both `linktracklets-core` and
//! `linktracklets-cli` can depend on it without pulling in the algorithmic
//! machinery.

mod detection;
mod error;
mod ids;
mod track;
mod tracklet;

pub use detection::Detection;
pub use error::{LinkError, LinkResult};
pub use ids::{DetectionId, DetectionIndex, ImageId, TrackletIndex};
pub use track::Track;
pub use tracklet::Tracklet;
