pub mod config;
pub mod joblist;
pub mod solve;
pub mod backgrounds;
pub mod subtract;
pub mod run;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use mosaicprep_core::catalog::ReferenceCatalog;
use mosaicprep_core::config::PipelineConfig;
use mosaicprep_core::frame::{AorLog, FrameLog};

/// Default configuration file name, next to the data.
pub const DEFAULT_CONFIG: &str = "mosaicprep.toml";

pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    PipelineConfig::load(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

pub fn load_logs(config: &PipelineConfig) -> Result<(FrameLog, AorLog)> {
    let frames = FrameLog::load(&config.layout.frame_log)
        .with_context(|| format!("Failed to load frame log {}", config.layout.frame_log.display()))?;
    let aors = AorLog::load(&config.layout.aor_log)
        .with_context(|| format!("Failed to load AOR log {}", config.layout.aor_log.display()))?;
    Ok((frames, aors))
}

pub fn load_catalog(config: &PipelineConfig) -> Result<ReferenceCatalog> {
    ReferenceCatalog::load(
        &config.layout.catalog,
        config.astrometry.reference_epoch_mjd,
    )
    .with_context(|| format!("Failed to load catalog {}", config.layout.catalog.display()))
}

/// Shared `--config` argument.
#[derive(clap::Args)]
pub struct ConfigOpt {
    /// Pipeline configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,
}
