use serde::{Deserialize, Serialize};

use crate::frame::{AorLog, FrameLog};

/// One (observation, channel) unit of work. Every frame belongs to exactly
/// one job unit; job units share nothing mutable and can run on separate
/// worker processes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobUnit {
    pub aor: u64,
    pub channel: u32,
    pub hdr: bool,
    pub n_frames: usize,
}

/// Derive the job list from the frame log, one entry per (AOR, channel)
/// with at least one frame, in AOR then channel order.
pub fn build_job_list(log: &FrameLog, aors: &AorLog) -> Vec<JobUnit> {
    let mut jobs = Vec::new();
    for aor in log.aors() {
        let hdr = aors.is_hdr(aor);
        let mut channels: Vec<u32> = log
            .records()
            .iter()
            .filter(|f| f.aor == aor)
            .map(|f| f.channel)
            .collect();
        channels.sort_unstable();
        channels.dedup();

        for channel in channels {
            let n_frames = log.select_job(aor, channel).len();
            jobs.push(JobUnit {
                aor,
                channel,
                hdr,
                n_frames,
            });
        }
    }
    jobs
}

/// One astrometric solve unit: all frames sharing an (AOR, exposure id),
/// spanning every channel observed at that pointing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExposureGroup {
    pub aor: u64,
    pub exposure_id: u64,
    pub n_frames: usize,
}

/// Derive the exposure-group list from the frame log.
pub fn build_exposure_groups(log: &FrameLog) -> Vec<ExposureGroup> {
    let mut keys: Vec<(u64, u64)> = log
        .records()
        .iter()
        .map(|f| (f.aor, f.exposure_id))
        .collect();
    keys.sort_unstable();
    keys.dedup();

    keys.into_iter()
        .map(|(aor, exposure_id)| ExposureGroup {
            aor,
            exposure_id,
            n_frames: log.select_exposure_group(aor, exposure_id).len(),
        })
        .collect()
}
