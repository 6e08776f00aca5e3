mod common;

use std::path::Path;

use common::frame_record;
use mosaicprep_core::background::repeats::{select_build_frames, RepeatPlan};
use mosaicprep_core::frame::FrameRecord;

fn frames_with(exptimes_delays: &[(f64, f64)]) -> Vec<FrameRecord> {
    exptimes_delays
        .iter()
        .enumerate()
        .map(|(i, &(exptime, delay))| {
            frame_record(
                Path::new("/data"),
                &format!("f{}", i),
                i as u64,
                1,
                0,
                1,
                57000.0,
                150.0,
                2.0,
                exptime,
                delay,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// HDR partition: one repeat per distinct exposure time
// ---------------------------------------------------------------------------

#[test]
fn test_hdr_repeats_from_exposure_times() {
    // Short/long pairs at 3 positions.
    let frames = frames_with(&[
        (0.6, 10.0),
        (12.0, 2.0),
        (0.6, 10.0),
        (12.0, 2.0),
        (0.6, 10.0),
        (12.0, 2.0),
    ]);
    let refs: Vec<&FrameRecord> = frames.iter().collect();
    let plan = RepeatPlan::derive(&refs, true, 6.0);

    assert_eq!(plan.n_repeats, 2);
    assert_eq!(plan.frames_per_repeat, 3);
    // Frames alternate repeat slots.
    assert_eq!(plan.repeat_for(0), Some(0));
    assert_eq!(plan.repeat_for(1), Some(1));
    assert_eq!(plan.repeat_for(2), Some(0));
}

// ---------------------------------------------------------------------------
// Standard partition: inferred from long inter-frame delays
// ---------------------------------------------------------------------------

#[test]
fn test_standard_repeats_from_delays() {
    // 2 positions x 3 repeats; each position opens with a long slew delay.
    let frames = frames_with(&[
        (12.0, 30.0),
        (12.0, 2.0),
        (12.0, 2.0),
        (12.0, 30.0),
        (12.0, 2.0),
        (12.0, 2.0),
    ]);
    let refs: Vec<&FrameRecord> = frames.iter().collect();
    let plan = RepeatPlan::derive(&refs, false, 6.0);

    assert_eq!(plan.n_repeats, 3);
    assert_eq!(plan.frames_per_repeat, 2);
    assert_eq!(plan.group_members(0), vec![0, 3]);
    assert_eq!(plan.group_members(2), vec![2, 5]);
}

#[test]
fn test_no_long_delays_means_single_group() {
    let frames = frames_with(&[(12.0, 2.0), (12.0, 2.0), (12.0, 2.0)]);
    let refs: Vec<&FrameRecord> = frames.iter().collect();
    let plan = RepeatPlan::derive(&refs, false, 6.0);

    assert_eq!(plan.n_repeats, 1);
    assert_eq!(plan.frames_per_repeat, 3);
}

#[test]
fn test_partition_mismatch_is_not_fatal() {
    // 5 frames with 2 long delays: 5/2 = 2 repeats, 5 != 2*2. The plan is
    // still produced (a warning is logged) and every frame keeps an
    // assignment.
    let frames = frames_with(&[
        (12.0, 30.0),
        (12.0, 2.0),
        (12.0, 30.0),
        (12.0, 2.0),
        (12.0, 2.0),
    ]);
    let refs: Vec<&FrameRecord> = frames.iter().collect();
    let plan = RepeatPlan::derive(&refs, false, 6.0);

    assert_eq!(plan.n_repeats, 2);
    assert_eq!(plan.assignments.len(), 5);
    assert_eq!(plan.repeat_for(4), Some(0));
}

#[test]
fn test_unknown_dce_has_no_assignment() {
    let frames = frames_with(&[(12.0, 30.0), (12.0, 2.0)]);
    let refs: Vec<&FrameRecord> = frames.iter().collect();
    let plan = RepeatPlan::derive(&refs, false, 6.0);
    assert_eq!(plan.repeat_for(999), None);
}

// ---------------------------------------------------------------------------
// Build-frame selection
// ---------------------------------------------------------------------------

#[test]
fn test_standard_mode_drops_short_exposures() {
    let frames = frames_with(&[(0.6, 10.0), (0.6, 2.0), (12.0, 10.0), (12.0, 2.0)]);
    let refs: Vec<&FrameRecord> = frames.iter().collect();

    let build = select_build_frames(&refs, false);
    assert_eq!(build.len(), 2);
    assert!(build.iter().all(|f| f.exptime == 12.0));

    // HDR keeps everything.
    let build_hdr = select_build_frames(&refs, true);
    assert_eq!(build_hdr.len(), 4);
}
