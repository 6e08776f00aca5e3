use anyhow::Result;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use mosaicprep_core::job::build_job_list;
use mosaicprep_core::pipeline::build_background_job;
use tracing::error;

use super::{load_config, load_logs, ConfigOpt};

#[derive(Args)]
pub struct BackgroundsArgs {
    #[command(flatten)]
    pub config: ConfigOpt,

    /// Process a single job unit (index from `joblist`); default is all
    #[arg(long)]
    pub job: Option<usize>,
}

pub fn run(args: &BackgroundsArgs) -> Result<()> {
    let config = load_config(&args.config.config)?;
    let (frames, aors) = load_logs(&config)?;
    let jobs = build_job_list(&frames, &aors);

    if let Some(index) = args.job {
        let job = jobs
            .get(index)
            .ok_or_else(|| anyhow::anyhow!("job {} out of range ({})", index, jobs.len()))?;
        let models = build_background_job(job, &frames, &config)?;
        println!(
            "AOR {} ch {}: wrote {} repeat-group template pairs",
            job.aor,
            job.channel,
            models.len()
        );
        return Ok(());
    }

    let pb = ProgressBar::new(jobs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("Backgrounds [{bar:40}] {pos}/{len}")?
            .progress_chars("=> "),
    );

    let mut failed = 0usize;
    for job in &jobs {
        if let Err(e) = build_background_job(job, &frames, &config) {
            error!(aor = job.aor, channel = job.channel, error = %e, "background build failed");
            failed += 1;
        }
        pb.inc(1);
    }
    pb.finish();

    println!("Built backgrounds for {} of {} job units", jobs.len() - failed, jobs.len());
    Ok(())
}
