use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::io::table;

/// One raw detector exposure, as recorded in the frame log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FrameRecord {
    /// Stable exposure identifier.
    pub dce: u64,
    /// Path of the raw image container.
    pub filename: PathBuf,
    /// Observation time (modified Julian date).
    pub mjd: f64,
    /// Nominal pointing (deg).
    pub ra: f64,
    pub dec: f64,
    /// Owning observation request.
    pub aor: u64,
    /// Sub-exposure identifier; one astrometric offset is solved per
    /// (aor, exposure_id).
    pub exposure_id: u64,
    /// Detector channel within the observation.
    pub channel: u32,
    /// Exposure time (s).
    pub exptime: f64,
    /// Delay since the previous frame (s); long delays mark a new sky
    /// position.
    pub frame_delay: f64,
}

/// Derived-image roles in the per-frame processing chain. Each role is
/// addressable by a deterministic name transform from the raw name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageRole {
    Raw,
    Uncertainty,
    Mask,
    FirstFrameCorrected,
    StarSubtracted,
    StarMask,
    BackgroundSubtracted,
    ScaledUncertainty,
    Detections,
    AstroCheck,
}

impl ImageRole {
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Uncertainty => "unc",
            Self::Mask => "mask",
            Self::FirstFrameCorrected => "ffc",
            Self::StarSubtracted => "starsub",
            Self::StarMask => "starmask",
            Self::BackgroundSubtracted => "sub",
            Self::ScaledUncertainty => "subunc",
            Self::Detections => "stars",
            Self::AstroCheck => "astrocheck",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mask | Self::StarMask => "msk",
            Self::Detections | Self::AstroCheck => "jsonl",
            _ => "img",
        }
    }
}

impl FrameRecord {
    /// Path of a derived image for this frame: the raw `_raw.img` tail is
    /// replaced by the role's suffix and extension.
    pub fn derived_path(&self, role: ImageRole) -> PathBuf {
        derive_name(&self.filename, role)
    }

    /// Identifier string used in logs and error messages.
    pub fn label(&self) -> String {
        format!("aor {} ch {} dce {}", self.aor, self.channel, self.dce)
    }
}

fn derive_name(raw: &Path, role: ImageRole) -> PathBuf {
    let name = raw.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    let base = name
        .strip_suffix("_raw.img")
        .unwrap_or_else(|| name.rsplit_once('.').map(|(b, _)| b).unwrap_or(name));
    let derived = format!("{}_{}.{}", base, role.suffix(), role.extension());
    raw.with_file_name(derived)
}

/// The frame log: every raw exposure the pipeline knows about.
#[derive(Clone, Debug, Default)]
pub struct FrameLog {
    records: Vec<FrameRecord>,
}

impl FrameLog {
    pub fn new(records: Vec<FrameRecord>) -> Self {
        Self { records }
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::new(table::read_records(path)?))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        table::write_records(path, &self.records)
    }

    pub fn records(&self) -> &[FrameRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Frames of one (AOR, channel) job unit, in log order.
    pub fn select_job(&self, aor: u64, channel: u32) -> Vec<&FrameRecord> {
        self.records
            .iter()
            .filter(|f| f.aor == aor && f.channel == channel)
            .collect()
    }

    /// Frames of one exposure group, spanning all channels.
    pub fn select_exposure_group(&self, aor: u64, exposure_id: u64) -> Vec<&FrameRecord> {
        self.records
            .iter()
            .filter(|f| f.aor == aor && f.exposure_id == exposure_id)
            .collect()
    }

    /// Sorted, deduplicated AOR ids.
    pub fn aors(&self) -> Vec<u64> {
        let mut aors: Vec<u64> = self.records.iter().map(|f| f.aor).collect();
        aors.sort_unstable();
        aors.dedup();
        aors
    }
}

/// Per-observation acquisition properties.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AorRecord {
    pub aor: u64,
    /// High-dynamic-range mode: each position is observed at several
    /// exposure times.
    pub hdr: bool,
    pub num_channels: u32,
}

#[derive(Clone, Debug, Default)]
pub struct AorLog {
    records: Vec<AorRecord>,
}

impl AorLog {
    pub fn new(records: Vec<AorRecord>) -> Self {
        Self { records }
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::new(table::read_records(path)?))
    }

    pub fn records(&self) -> &[AorRecord] {
        &self.records
    }

    pub fn get(&self, aor: u64) -> Option<&AorRecord> {
        self.records.iter().find(|r| r.aor == aor)
    }

    /// HDR flag for an AOR; unknown observations are treated as standard
    /// mode.
    pub fn is_hdr(&self, aor: u64) -> bool {
        self.get(aor).map(|r| r.hdr).unwrap_or(false)
    }
}
