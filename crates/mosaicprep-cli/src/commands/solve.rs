use anyhow::Result;
use clap::Args;
use mosaicprep_core::job::build_exposure_groups;
use mosaicprep_core::pipeline::{offsets_path, solve_all_astrometry, solve_astrometry_group};

use super::{load_catalog, load_config, load_logs, ConfigOpt};

#[derive(Args)]
pub struct SolveArgs {
    #[command(flatten)]
    pub config: ConfigOpt,

    /// Solve a single exposure group (index from `joblist --groups`) and
    /// print the result without writing the offset table
    #[arg(long)]
    pub group: Option<usize>,
}

pub fn run(args: &SolveArgs) -> Result<()> {
    let config = load_config(&args.config.config)?;
    let (frames, _aors) = load_logs(&config)?;
    let catalog = load_catalog(&config)?;
    let groups = build_exposure_groups(&frames);

    if let Some(index) = args.group {
        let group = groups
            .get(index)
            .ok_or_else(|| anyhow::anyhow!("group {} out of range ({})", index, groups.len()))?;
        let offset = solve_astrometry_group(group, &frames, &catalog, &config)?;
        println!(
            "AOR {} exposure {}: dRA = {:.3}\" +/- {:.3}\", dDEC = {:.3}\" +/- {:.3}\" ({} stars)",
            offset.aor,
            offset.exposure_id,
            offset.d_ra * 3600.0,
            offset.err_ra * 3600.0,
            offset.d_dec * 3600.0,
            offset.err_dec * 3600.0,
            offset.n_stars
        );
        return Ok(());
    }

    let offsets = solve_all_astrometry(&frames, &catalog, &config)?;
    println!(
        "Solved {} of {} exposure groups; offsets written to {}",
        offsets.len(),
        groups.len(),
        offsets_path(&config).display()
    );
    Ok(())
}
