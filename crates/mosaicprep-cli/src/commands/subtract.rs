use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use mosaicprep_core::astrom::AstrometricOffset;
use mosaicprep_core::io::table;
use mosaicprep_core::job::build_job_list;
use mosaicprep_core::pipeline::{offsets_path, subtract_job, write_image_lists};
use tracing::error;

use super::{load_config, load_logs, ConfigOpt};

#[derive(Args)]
pub struct SubtractArgs {
    #[command(flatten)]
    pub config: ConfigOpt,

    /// Process a single job unit (index from `joblist`); default is all
    #[arg(long)]
    pub job: Option<usize>,
}

pub fn run(args: &SubtractArgs) -> Result<()> {
    let config = load_config(&args.config.config)?;
    let (frames, aors) = load_logs(&config)?;
    let jobs = build_job_list(&frames, &aors);

    let offsets: Vec<AstrometricOffset> = table::read_records(&offsets_path(&config))
        .with_context(|| "offset table not found; run solve-astrometry first")?;

    if let Some(index) = args.job {
        let job = jobs
            .get(index)
            .ok_or_else(|| anyhow::anyhow!("job {} out of range ({})", index, jobs.len()))?;
        let summary = subtract_job(job, &frames, &offsets, &config)?;
        println!(
            "AOR {} ch {}: {} frames written, {} skipped",
            job.aor, job.channel, summary.written, summary.skipped
        );
        return Ok(());
    }

    let pb = ProgressBar::new(jobs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("Subtracting [{bar:40}] {pos}/{len}")?
            .progress_chars("=> "),
    );

    let mut written = 0usize;
    let mut skipped = 0usize;
    let mut failed = 0usize;
    for job in &jobs {
        match subtract_job(job, &frames, &offsets, &config) {
            Ok(summary) => {
                written += summary.written;
                skipped += summary.skipped;
            }
            Err(e) => {
                error!(aor = job.aor, channel = job.channel, error = %e, "subtraction failed");
                failed += 1;
            }
        }
        pb.inc(1);
    }
    pb.finish();

    write_image_lists(&frames, &config)?;
    println!(
        "Subtraction done: {} frames written, {} skipped, {} job units failed",
        written, skipped, failed
    );
    Ok(())
}
