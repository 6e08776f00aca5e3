mod common;

use common::{frame_record, textured_image, write_frame_inputs};
use tempfile::TempDir;

use mosaicprep_core::astrom::xmatch::DetectedSource;
use mosaicprep_core::catalog::{ReferenceCatalog, ReferenceStar};
use mosaicprep_core::config::PipelineConfig;
use mosaicprep_core::frame::{AorLog, AorRecord, FrameLog, FrameRecord, ImageRole};
use mosaicprep_core::io::image::read_image;
use mosaicprep_core::io::table;
use mosaicprep_core::job::{build_exposure_groups, build_job_list};
use mosaicprep_core::pipeline::{
    build_background_job, solve_all_astrometry, subtract_job, template_path,
};

const H: usize = 16;
const W: usize = 16;
const EPOCH: f64 = 57205.875;
const ARCSEC: f64 = 1.0 / 3600.0;

const FIELD_RA: f64 = 150.0;
const FIELD_DEC: f64 = 2.0;

/// Injected pointing error: the detections sit at catalog - offset, so the
/// solver must recover exactly this offset.
const TRUE_D_RA: f64 = 1.0 * ARCSEC;
const TRUE_D_DEC: f64 = -0.5 * ARCSEC;

fn test_config(dir: &TempDir) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.layout.frame_log = dir.path().join("frames.jsonl");
    config.layout.aor_log = dir.path().join("aors.jsonl");
    config.layout.catalog = dir.path().join("catalog.jsonl");
    config.layout.output_dir = dir.path().join("output");
    config.layout.scratch_dir = dir.path().join("output/tmp");
    config
}

fn reference_star(id: u64, ra: f64, dec: f64) -> ReferenceStar {
    ReferenceStar {
        id,
        ra,
        dec,
        ra_error: 1.0,
        dec_error: 1.0,
        pm_ra: None,
        pm_dec: None,
        pm_ra_error: None,
        pm_dec_error: None,
        parallax: None,
        flux: Some(1000.0),
    }
}

/// 2 sky positions x 2 repeats: positions open with a long slew delay.
/// Observed at the catalog epoch so proper motion is a no-op here.
fn build_frames(dir: &TempDir) -> Vec<FrameRecord> {
    let delays = [30.0, 2.0, 30.0, 2.0];
    (0..4)
        .map(|i| {
            frame_record(
                dir.path(),
                &format!("frame{:03}", i),
                100 + i as u64,
                1,
                (i / 2) as u64,
                1,
                EPOCH,
                FIELD_RA,
                FIELD_DEC,
                12.0,
                delays[i],
            )
        })
        .collect()
}

fn write_detections(record: &FrameRecord, stars: &[ReferenceStar]) {
    let detections: Vec<DetectedSource> = stars
        .iter()
        .map(|s| DetectedSource {
            ra: s.ra - TRUE_D_RA,
            dec: s.dec - TRUE_D_DEC,
            delta_ra: 1e-5,
            delta_dec: 1e-5,
            flux: 500.0,
            delta_flux: 5.0,
            status: 1,
        })
        .collect();
    table::write_records(&record.derived_path(ImageRole::Detections), &detections).unwrap();
}

#[test]
fn test_full_calibration_of_one_job_unit() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    std::fs::create_dir_all(&config.layout.output_dir).unwrap();

    // --- stage the inputs -------------------------------------------------
    let records = build_frames(&dir);
    let frames = FrameLog::new(records.clone());
    let aors = AorLog::new(vec![AorRecord {
        aor: 1,
        hdr: false,
        num_channels: 1,
    }]);

    let stars: Vec<ReferenceStar> = (0..8)
        .map(|i| {
            reference_star(
                i,
                FIELD_RA + (i as f64 - 3.5) * 20.0 * ARCSEC,
                FIELD_DEC + (i as f64 - 3.5) * 15.0 * ARCSEC,
            )
        })
        .collect();
    let catalog = ReferenceCatalog::new(EPOCH, stars.clone());

    // One frame carries a single bright outlier pixel that must never
    // reach its repeat group's stack.
    for (i, record) in records.iter().enumerate() {
        let mut image = textured_image(H, W, 5.0);
        if i == 0 {
            image[[3, 3]] = 1000.0;
        }
        write_frame_inputs(record, &image, 1.0);
        write_detections(record, &stars);
    }

    // --- astrometry track -------------------------------------------------
    let groups = build_exposure_groups(&frames);
    assert_eq!(groups.len(), 2);

    let offsets = solve_all_astrometry(&frames, &catalog, &config).unwrap();
    assert_eq!(offsets.len(), 2);
    for offset in &offsets {
        assert!(offset.verified);
        assert!((offset.d_ra - TRUE_D_RA).abs() < 0.01 * ARCSEC);
        assert!((offset.d_dec - TRUE_D_DEC).abs() < 0.01 * ARCSEC);
        assert!(offset.n_stars > 0);
    }

    // --- background track -------------------------------------------------
    let jobs = build_job_list(&frames, &aors);
    assert_eq!(jobs.len(), 1);
    let job = &jobs[0];

    let models = build_background_job(job, &frames, &config).unwrap();
    // 2 long delays over 4 frames: 2 repeats x 2 frames.
    assert_eq!(models.len(), 2);

    // Frame 0 (repeat 0) had the hot pixel; frame 2 is the other member of
    // repeat 0. The stacked value at [3,3] must come from frame 2 alone,
    // i.e. stay at the quiet background level instead of ~500.
    let rep0 = &models[0];
    assert!(
        rep0.average[[3, 3]].abs() < 1.0,
        "outlier leaked into the average stack: {}",
        rep0.average[[3, 3]]
    );
    assert!(
        rep0.median[[3, 3]].abs() < 1.0,
        "outlier leaked into the median stack: {}",
        rep0.median[[3, 3]]
    );
    // And it matches the co-located value of the quiet repeat partner's
    // normalized level, which the other repeat group also sits at.
    let rep1 = &models[1];
    assert!((rep0.average[[3, 3]] - rep1.average[[3, 3]]).abs() < 0.05);

    // Templates were persisted for the subtractor.
    for model in &models {
        for kind in [
            mosaicprep_core::config::BackgroundKind::Average,
            mosaicprep_core::config::BackgroundKind::Median,
        ] {
            let path = template_path(&config, kind, job.aor, model.repeat_index, job.channel);
            assert!(path.exists(), "missing template {}", path.display());
        }
    }

    // --- subtraction ------------------------------------------------------
    let summary = subtract_job(job, &frames, &offsets, &config).unwrap();
    assert_eq!(summary.written, 4);
    assert_eq!(summary.skipped, 0);

    for record in &records {
        let sub = read_image(&record.derived_path(ImageRole::BackgroundSubtracted)).unwrap();
        let unc = read_image(&record.derived_path(ImageRole::ScaledUncertainty)).unwrap();

        // Pointing metadata carries the solved correction.
        assert!((sub.header.crval1 - (FIELD_RA + TRUE_D_RA)).abs() < 1e-9);
        assert!((sub.header.crval2 - (FIELD_DEC + TRUE_D_DEC)).abs() < 1e-9);
        assert_eq!(sub.header.crval1, unc.header.crval1);

        // Residual background level is gone.
        let masked = mosaicprep_core::buffer::MaskedImage::from_data(sub.data.clone());
        assert!(masked.median().unwrap().abs() < 0.05);
    }
}

#[test]
fn test_unmapped_frames_fall_back_to_first_repeat() {
    // Standard-mode job where two leading short exposures are dropped from
    // the background build; at subtraction time they default to repeat 0
    // and still come out calibrated.
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    std::fs::create_dir_all(&config.layout.output_dir).unwrap();

    let mut records = Vec::new();
    let exposures: [(f64, f64); 4] = [(0.6, 30.0), (12.0, 2.0), (0.6, 30.0), (12.0, 2.0)];
    for (i, (exptime, delay)) in exposures.iter().enumerate() {
        records.push(frame_record(
            dir.path(),
            &format!("frame{:03}", i),
            200 + i as u64,
            2,
            0,
            1,
            EPOCH,
            FIELD_RA,
            FIELD_DEC,
            *exptime,
            *delay,
        ));
    }
    let frames = FrameLog::new(records.clone());
    let aors = AorLog::new(vec![AorRecord {
        aor: 2,
        hdr: false,
        num_channels: 1,
    }]);

    let stars = vec![reference_star(1, FIELD_RA, FIELD_DEC)];
    let catalog = ReferenceCatalog::new(EPOCH, stars.clone());
    for record in &records {
        write_frame_inputs(record, &textured_image(H, W, 7.0), 1.0);
        write_detections(record, &stars);
    }

    let offsets = solve_all_astrometry(&frames, &catalog, &config).unwrap();
    let jobs = build_job_list(&frames, &aors);
    let job = &jobs[0];

    // Only the two normal exposures build the background: one repeat group.
    let models = build_background_job(job, &frames, &config).unwrap();
    assert_eq!(models.len(), 1);

    // All four frames subtract; the short ones via the repeat-0 fallback.
    let summary = subtract_job(job, &frames, &offsets, &config).unwrap();
    assert_eq!(summary.written, 4);
}
