mod cli;
mod io;

use clap::Parser;
use cli::Cli;
use linktracklets_core::{Driver, DriverConfig};
use linktracklets_types::LinkError;
use log::{error, info};
use std::fs::File;
use std::process::ExitCode;

/// Not exposed on the command line; tuned once here rather than per-run.
const MIN_ENDPOINT_SEPARATION_DAYS: f64 = 2.0;
const MIN_SUPPORT_TO_ENDPOINT_SEPARATION_DAYS: f64 = 0.5;
const MIN_SUPPORT_TRACKLETS: usize = 1;
const QUAD_ERR_DEG: f64 = 0.005;
const CACHE_CAPACITY: usize = 1024;
const ITERATIONS_TILL_SPLIT: u32 = 0;

fn main() -> ExitCode {
    env_logger::Builder::from_default_env().format_timestamp_secs().init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            match err {
                LinkError::BadInput(_) | LinkError::InvalidConfig(_) => ExitCode::from(1),
                LinkError::InternalInvariant(_) => ExitCode::from(2),
            }
        }
    }
}

fn run(cli: &Cli) -> Result<(), LinkError> {
    let detections_file = File::open(&cli.detections).map_err(|e| LinkError::BadInput(format!("opening {}: {}", cli.detections.display(), e)))?;
    let detections = io::read_detections(detections_file)?;
    info!("loaded {} detection(s)", detections.len());

    let tracklets_file = File::open(&cli.tracklets).map_err(|e| LinkError::BadInput(format!("opening {}: {}", cli.tracklets.display(), e)))?;
    let tracklets = io::read_tracklets(tracklets_file, &detections)?;
    info!("loaded {} tracklet(s)", tracklets.len());

    let config = DriverConfig {
        eps_p: cli.eps_p,
        eps_v: cli.eps_v,
        accel_dec_max: cli.accel_dec_max,
        accel_ra_max: cli.accel_ra_max,
        quad_err: QUAD_ERR_DEG,
        min_endpoint_separation: MIN_ENDPOINT_SEPARATION_DAYS,
        min_support_to_endpoint_separation: MIN_SUPPORT_TO_ENDPOINT_SEPARATION_DAYS,
        min_support_tracklets: MIN_SUPPORT_TRACKLETS,
        min_detections_per_track: cli.min_detections_per_track,
        min_unique_nights: cli.min_unique_nights,
        max_leaf_size: cli.leaf_size,
        iterations_till_split: ITERATIONS_TILL_SPLIT,
        cache_capacity: CACHE_CAPACITY,
        latest_first_endpoint_time: cli.latest_first_endpoint_time,
        earliest_last_endpoint_time: cli.earliest_last_endpoint_time,
        pair_timeout: None,
    };

    let driver = Driver::new(detections.clone(), tracklets, config)?;

    #[cfg(feature = "parallel")]
    let tracks = if cli.sequential { driver.run()? } else { driver.run_parallel()? };
    #[cfg(not(feature = "parallel"))]
    let tracks = driver.run()?;

    info!("emitted {} track(s)", tracks.len());

    let output_file = File::create(&cli.output).map_err(|e| LinkError::InternalInvariant(format!("creating {}: {}", cli.output.display(), e)))?;
    io::write_tracks(output_file, &tracks, &detections)?;

    Ok(())
}
