//! Command-line flags, one per configurable threshold in the linking run.

use clap::Parser;
use std::path::PathBuf;

/// Links tracklets into multi-night tracks under a bounded-acceleration
/// quadratic motion model.
#[derive(Debug, Parser)]
#[command(name = "linktracklets", version, about)]
pub struct Cli {
    /// Path to the MITI-style detections file.
    #[arg(short = 'd', long = "detections")]
    pub detections: PathBuf,

    /// Path to the tracklets file (one tracklet per line, detection ids).
    #[arg(short = 't', long = "tracklets")]
    pub tracklets: PathBuf,

    /// Path to write the track output file.
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    /// Positional error epsilon-p, degrees.
    #[arg(short = 'e', long = "eps-p", default_value_t = 0.002)]
    pub eps_p: f64,

    /// Velocity error epsilon-v, degrees/day.
    #[arg(short = 'v', long = "eps-v", default_value_t = 0.002)]
    pub eps_v: f64,

    /// Max Dec acceleration magnitude, degrees/day^2.
    #[arg(short = 'D', long = "accel-dec-max", default_value_t = 0.02)]
    pub accel_dec_max: f64,

    /// Max RA acceleration magnitude, degrees/day^2.
    #[arg(short = 'R', long = "accel-ra-max", default_value_t = 0.02)]
    pub accel_ra_max: f64,

    /// Only consider endpoint pairs whose first image time is at or before this MJD.
    #[arg(short = 'F', long = "latest-first-endpoint-time")]
    pub latest_first_endpoint_time: Option<f64>,

    /// Only consider endpoint pairs whose last image time is at or after this MJD.
    #[arg(short = 'L', long = "earliest-last-endpoint-time")]
    pub earliest_last_endpoint_time: Option<f64>,

    /// Minimum distinct calendar nights a track's detections must span.
    #[arg(short = 'u', long = "min-unique-nights", default_value_t = 3)]
    pub min_unique_nights: usize,

    /// Minimum distinct detections a track must contain.
    #[arg(short = 's', long = "min-detections", default_value_t = 6)]
    pub min_detections_per_track: usize,

    /// Maximum number of points held at a tree leaf.
    #[arg(short = 'n', long = "leaf-size", default_value_t = 16)]
    pub leaf_size: usize,

    /// Run endpoint pairs sequentially instead of task-parallel.
    #[arg(long = "sequential", default_value_t = false)]
    pub sequential: bool,
}
