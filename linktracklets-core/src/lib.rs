//! The variable-tree tracklet-to-track linking algorithm: 4-D partition
//! trees over tracklets, a bounded-acceleration reachability predicate, and
//! the recursive dual-endpoint search that emits candidate tracks.

pub mod builder;
pub mod cache;
pub mod driver;
pub mod error;
pub mod geomath;
pub mod quadfit;
pub mod reachability;
pub mod recursion;
pub mod store;
pub mod tree;

pub use builder::{build_tracks, TrackBuildConfig};
pub use cache::{Bounds, CacheKey, ProjectionCache};
pub use driver::{timeout_error, Driver, DriverConfig, PairOutcome};
pub use error::Timeout;
pub use reachability::{axes_overlap, expand_to, reachable, MotionConfig};
pub use recursion::{link, LinkContext, NodeRef, RecursionConfig};
pub use store::TrackStore;
pub use tree::{LeafEntry, Point4, TrackletTree, TrackletTreeNode};
