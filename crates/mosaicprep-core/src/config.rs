use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PrepError, Result};

/// Full pipeline configuration.
///
/// Every tunable the calibration stages read lives here and is passed by
/// reference into the components; there is no ambient parameter state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub layout: LayoutConfig,
    #[serde(default)]
    pub astrometry: AstrometryConfig,
    #[serde(default)]
    pub background: BackgroundConfig,
    #[serde(default)]
    pub subtraction: SubtractionConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PrepError::MissingFile(path.to_path_buf())
            } else {
                PrepError::Io(e)
            }
        })?;
        toml::from_str(&text).map_err(|e| PrepError::Config(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text =
            toml::to_string_pretty(self).map_err(|e| PrepError::Config(e.to_string()))?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            layout: LayoutConfig::default(),
            astrometry: AstrometryConfig::default(),
            background: BackgroundConfig::default(),
            subtraction: SubtractionConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

/// Where inputs and products live on shared storage.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Frame log table (one record per raw exposure).
    pub frame_log: PathBuf,
    /// Observation (AOR) property table.
    pub aor_log: PathBuf,
    /// Pre-fetched astrometric reference catalog.
    pub catalog: PathBuf,
    /// Directory for per-group products (templates, offsets, lists).
    pub output_dir: PathBuf,
    /// Directory for per-job scratch areas.
    pub scratch_dir: PathBuf,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            frame_log: PathBuf::from("frames.jsonl"),
            aor_log: PathBuf::from("aors.jsonl"),
            catalog: PathBuf::from("catalog.jsonl"),
            output_dir: PathBuf::from("output"),
            scratch_dir: PathBuf::from("output/tmp"),
        }
    }
}

/// What to do for an exposure group whose offset solve has no survivors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OffsetFallback {
    /// Skip the group; its frames keep their nominal pointing and are
    /// excluded from subtraction until re-run.
    Skip,
    /// Record a zero offset flagged as unverified.
    ZeroOffset,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AstrometryConfig {
    /// Maximum star/source separation to accept a match (arcsec).
    pub match_radius_arcsec: f64,
    /// Coarse radius around the frame pointing for catalog candidates (deg).
    pub search_radius_deg: f64,
    /// Coarse radius for the bright-star list fed to the fitter (deg).
    pub bright_search_radius_deg: f64,
    /// Reference epoch of the catalog positions (MJD; 57205.875 = J2015.5).
    pub reference_epoch_mjd: f64,
    /// Policy when no matches survive clipping.
    pub fallback: OffsetFallback,
}

impl Default for AstrometryConfig {
    fn default() -> Self {
        Self {
            match_radius_arcsec: 5.0,
            search_radius_deg: 0.0675,
            bright_search_radius_deg: 0.123,
            reference_epoch_mjd: 57205.875,
            fallback: OffsetFallback::Skip,
        }
    }
}

/// Which template variant the subtractor uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackgroundKind {
    Average,
    Median,
}

impl BackgroundKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Average => "average",
            Self::Median => "median",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackgroundConfig {
    /// Clip threshold above the median, in robust-scale units. Positive
    /// outliers are real sources and are clipped harder.
    pub clip_sigma_pos: f32,
    /// Clip threshold below the median, in robust-scale units.
    pub clip_sigma_neg: f32,
    /// Object-mask dilation iterations before stacking.
    pub n_dilation: usize,
    /// Inter-frame delay marking a new sky position (seconds).
    pub frame_delay_threshold_s: f64,
    /// Template variant consumed by the subtractor.
    pub kind: BackgroundKind,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            clip_sigma_pos: 3.0,
            clip_sigma_neg: 5.0,
            n_dilation: 2,
            frame_delay_threshold_s: 6.0,
            kind: BackgroundKind::Average,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubtractionConfig {
    /// Symmetric object-clip threshold for the residual-level measurement.
    pub clip_sigma: f32,
    /// Object-mask dilation iterations for the residual-level measurement.
    pub n_dilation: usize,
}

impl Default for SubtractionConfig {
    fn default() -> Self {
        Self {
            clip_sigma: 3.0,
            n_dilation: 3,
        }
    }
}

/// External binaries this core prepares inputs for. The commands are built
/// with a typed argument list (`tools::ToolCommand`), never a shell string.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Point-source fitter executable.
    pub detector: PathBuf,
    /// Mosaic/coaddition executable.
    pub mosaicker: PathBuf,
    /// Padding added around the mosaic footprint, passed to the mosaicker.
    pub mosaic_edge_pixels: u32,
    /// Kill an external tool after this many seconds.
    pub timeout_s: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            detector: PathBuf::from("starfit"),
            mosaicker: PathBuf::from("mosaic"),
            mosaic_edge_pixels: 12,
            timeout_s: 3600,
        }
    }
}
