use anyhow::Result;
use clap::Args;
use rayon::prelude::*;
use mosaicprep_core::job::build_job_list;
use mosaicprep_core::pipeline::{
    build_background_job, solve_all_astrometry, subtract_job, write_image_lists,
};
use tracing::error;

use super::{load_catalog, load_config, load_logs, ConfigOpt};
use crate::summary::print_config_summary;

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigOpt,

    /// Process job units concurrently instead of sequentially. Job units
    /// share nothing mutable, so this is safe; an external dispatcher
    /// running one process per `--job` remains the scalable option.
    #[arg(long)]
    pub parallel: bool,
}

pub fn run(args: &RunArgs) -> Result<()> {
    let config = load_config(&args.config.config)?;
    print_config_summary(&config);

    let (frames, aors) = load_logs(&config)?;
    let catalog = load_catalog(&config)?;
    let jobs = build_job_list(&frames, &aors);

    println!("Solving astrometric offsets...");
    let offsets = solve_all_astrometry(&frames, &catalog, &config)?;

    println!("Building background templates...");
    let backgrounds_failed: usize = if args.parallel {
        jobs.par_iter()
            .map(|job| match build_background_job(job, &frames, &config) {
                Ok(_) => 0,
                Err(e) => {
                    error!(aor = job.aor, channel = job.channel, error = %e, "background build failed");
                    1
                }
            })
            .sum()
    } else {
        jobs.iter()
            .map(|job| match build_background_job(job, &frames, &config) {
                Ok(_) => 0,
                Err(e) => {
                    error!(aor = job.aor, channel = job.channel, error = %e, "background build failed");
                    1
                }
            })
            .sum()
    };

    println!("Subtracting backgrounds...");
    let subtract_failed: usize = if args.parallel {
        jobs.par_iter()
            .map(|job| match subtract_job(job, &frames, &offsets, &config) {
                Ok(_) => 0,
                Err(e) => {
                    error!(aor = job.aor, channel = job.channel, error = %e, "subtraction failed");
                    1
                }
            })
            .sum()
    } else {
        jobs.iter()
            .map(|job| match subtract_job(job, &frames, &offsets, &config) {
                Ok(_) => 0,
                Err(e) => {
                    error!(aor = job.aor, channel = job.channel, error = %e, "subtraction failed");
                    1
                }
            })
            .sum()
    };

    write_image_lists(&frames, &config)?;

    let failed = backgrounds_failed + subtract_failed;
    if failed > 0 {
        println!(
            "Pipeline finished with {} failed stage runs across {} job units; \
             check the log and re-run the affected jobs",
            failed,
            jobs.len()
        );
    } else {
        println!("Pipeline finished: {} job units calibrated", jobs.len());
    }
    Ok(())
}
