use anyhow::Result;
use clap::Args;
use mosaicprep_core::job::{build_exposure_groups, build_job_list};

use super::{load_config, load_logs, ConfigOpt};

#[derive(Args)]
pub struct JoblistArgs {
    #[command(flatten)]
    pub config: ConfigOpt,

    /// Also list the astrometry exposure groups
    #[arg(long)]
    pub groups: bool,
}

pub fn run(args: &JoblistArgs) -> Result<()> {
    let config = load_config(&args.config.config)?;
    let (frames, aors) = load_logs(&config)?;

    let jobs = build_job_list(&frames, &aors);
    println!("{} job units ({} frames total):", jobs.len(), frames.len());
    println!("{:>5}  {:>10}  {:>7}  {:>5}  {:>7}", "Job", "AOR", "Channel", "HDR", "Frames");
    println!("{}", "-".repeat(42));
    for (i, job) in jobs.iter().enumerate() {
        println!(
            "{:>5}  {:>10}  {:>7}  {:>5}  {:>7}",
            i,
            job.aor,
            job.channel,
            if job.hdr { "yes" } else { "no" },
            job.n_frames
        );
    }

    if args.groups {
        let groups = build_exposure_groups(&frames);
        println!("\n{} exposure groups:", groups.len());
        println!("{:>5}  {:>10}  {:>10}  {:>7}", "Group", "AOR", "Exposure", "Frames");
        println!("{}", "-".repeat(38));
        for (i, group) in groups.iter().enumerate() {
            println!(
                "{:>5}  {:>10}  {:>10}  {:>7}",
                i, group.aor, group.exposure_id, group.n_frames
            );
        }
    }

    Ok(())
}
