use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::frame::FrameRecord;

/// Per-frame repeat assignment, persisted for the subtractor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RepeatAssignment {
    pub dce: u64,
    pub repeat_index: usize,
}

/// How one job unit's frames partition into repeat groups.
///
/// Frames at one sky position are consecutive in the log, so frame `i`
/// belongs to repeat `i mod n_repeats` and sky position `i div n_repeats`.
#[derive(Clone, Debug)]
pub struct RepeatPlan {
    pub n_repeats: usize,
    pub frames_per_repeat: usize,
    pub assignments: Vec<RepeatAssignment>,
}

impl RepeatPlan {
    /// Derive the partition for one job unit.
    ///
    /// HDR acquisition observes each position at several exposure times, so
    /// the repeat count is the number of distinct exposure times. Standard
    /// acquisition repeats the same exposure; each new position starts with
    /// a long inter-frame delay, so the repeat count is the frame count
    /// divided by the number of long delays.
    pub fn derive(frames: &[&FrameRecord], hdr: bool, delay_threshold_s: f64) -> Self {
        let total = frames.len();

        let n_repeats = if hdr {
            let mut exptimes: Vec<u64> = frames.iter().map(|f| f.exptime.to_bits()).collect();
            exptimes.sort_unstable();
            exptimes.dedup();
            exptimes.len().max(1)
        } else {
            let long_delays = frames
                .iter()
                .filter(|f| f.frame_delay > delay_threshold_s)
                .count();
            if long_delays == 0 {
                if total > 1 {
                    warn!(
                        total_frames = total,
                        "no long inter-frame delays; assuming a single repeat group"
                    );
                }
                1
            } else {
                (total / long_delays).max(1)
            }
        };

        let frames_per_repeat = (total / n_repeats).max(1);
        if total != n_repeats * frames_per_repeat {
            warn!(
                total_frames = total,
                n_repeats,
                frames_per_repeat,
                "frame count does not reconcile with the repeat partition; \
                 continuing with the inferred grouping"
            );
        }

        let assignments = frames
            .iter()
            .enumerate()
            .map(|(i, f)| RepeatAssignment {
                dce: f.dce,
                repeat_index: i % n_repeats,
            })
            .collect();

        Self {
            n_repeats,
            frames_per_repeat,
            assignments,
        }
    }

    /// Repeat index for a frame, if it was part of the build set.
    pub fn repeat_for(&self, dce: u64) -> Option<usize> {
        self.assignments
            .iter()
            .find(|a| a.dce == dce)
            .map(|a| a.repeat_index)
    }

    /// Indices (into the build frame list) belonging to one repeat group.
    pub fn group_members(&self, repeat_index: usize) -> Vec<usize> {
        self.assignments
            .iter()
            .enumerate()
            .filter(|(_, a)| a.repeat_index == repeat_index)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Frames the background builder stacks.
///
/// In standard mode the short leading exposures are dropped: only frames
/// at the normal (longest) exposure time contribute. The dropped frames
/// fall back to repeat 0 at subtraction time.
pub fn select_build_frames<'a>(frames: &[&'a FrameRecord], hdr: bool) -> Vec<&'a FrameRecord> {
    if hdr {
        return frames.to_vec();
    }
    let normal = frames
        .iter()
        .map(|f| f.exptime)
        .fold(f64::MIN, f64::max);
    frames
        .iter()
        .filter(|f| f.exptime == normal)
        .copied()
        .collect()
}
