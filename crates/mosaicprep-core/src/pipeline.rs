//! Per-stage orchestration for one job unit: the astrometry track
//! (propagate, match, solve) and the background track (partition, stack,
//! subtract). Stages persist their products to durable storage; the next
//! stage reads them back, so re-runs are idempotent overwrites.

use std::io::Write;
use std::path::PathBuf;

use tracing::{error, info, warn};

use crate::astrom::offset::solve_offset;
use crate::astrom::propagate::{elapsed_years, propagate_catalog};
use crate::astrom::xmatch::{match_frame, restrict_to_field, DetectedSource, MatchedResidual};
use crate::astrom::AstrometricOffset;
use crate::background::builder::{build_backgrounds, prepare_frame, BackgroundModel};
use crate::background::repeats::{select_build_frames, RepeatAssignment, RepeatPlan};
use crate::background::subtract::subtract_frame;
use crate::catalog::ReferenceCatalog;
use crate::config::{BackgroundKind, OffsetFallback, PipelineConfig};
use crate::error::{PrepError, Result};
use crate::frame::{FrameLog, FrameRecord, ImageRole};
use crate::io::{image, preview, table};
use crate::job::{build_exposure_groups, ExposureGroup, JobUnit};
use crate::scratch::ScratchDir;

/// Path of the run-wide astrometric offset table.
pub fn offsets_path(cfg: &PipelineConfig) -> PathBuf {
    cfg.layout.output_dir.join("astrometry_offsets.jsonl")
}

/// Path of one job unit's repeat-assignment table.
pub fn repeat_table_path(cfg: &PipelineConfig, aor: u64, channel: u32) -> PathBuf {
    cfg.layout
        .output_dir
        .join(format!("repeats.{}.ch.{}.jsonl", aor, channel))
}

/// Path of one background template image.
pub fn template_path(
    cfg: &PipelineConfig,
    kind: BackgroundKind,
    aor: u64,
    repeat_index: usize,
    channel: u32,
) -> PathBuf {
    cfg.layout.output_dir.join(format!(
        "{}.{}.{}.ch.{}.img",
        kind.label(),
        aor,
        repeat_index,
        channel
    ))
}

fn mean_mjd(frames: &[&FrameRecord]) -> f64 {
    frames.iter().map(|f| f.mjd).sum::<f64>() / frames.len() as f64
}

/// Solve the pointing correction for one exposure group by pooling matched
/// residuals across all of its frames (every channel at that pointing).
pub fn solve_astrometry_group(
    group: &ExposureGroup,
    log: &FrameLog,
    catalog: &ReferenceCatalog,
    cfg: &PipelineConfig,
) -> Result<AstrometricOffset> {
    let frames = log.select_exposure_group(group.aor, group.exposure_id);
    if frames.is_empty() {
        return Err(PrepError::EmptySequence);
    }

    let mjd = mean_mjd(&frames);
    let dt_years = elapsed_years(mjd, catalog.epoch_mjd);
    let propagated = propagate_catalog(catalog, mjd);

    let mut residuals: Vec<MatchedResidual> = Vec::new();
    for frame in &frames {
        let detections: Vec<DetectedSource> =
            table::read_records(&frame.derived_path(ImageRole::Detections))?;
        let field = restrict_to_field(
            &propagated,
            frame.ra,
            frame.dec,
            cfg.astrometry.search_radius_deg,
        );
        residuals.extend(match_frame(
            &detections,
            &field,
            catalog,
            dt_years,
            cfg.astrometry.match_radius_arcsec,
        ));
    }

    match solve_offset(&residuals, group.aor, group.exposure_id) {
        Ok(offset) => {
            info!(
                aor = group.aor,
                exposure_id = group.exposure_id,
                n_stars = offset.n_stars,
                d_ra_arcsec = offset.d_ra * 3600.0,
                d_dec_arcsec = offset.d_dec * 3600.0,
                "solved astrometric offset"
            );
            Ok(offset)
        }
        Err(PrepError::InsufficientMatches { aor, exposure_id })
            if cfg.astrometry.fallback == OffsetFallback::ZeroOffset =>
        {
            warn!(
                aor,
                exposure_id, "no surviving matches; recording unverified zero offset"
            );
            Ok(AstrometricOffset::unverified_zero(aor, exposure_id))
        }
        Err(e) => Err(e),
    }
}

/// Solve every exposure group and persist the offset table. A failed group
/// is logged and skipped; it never aborts its siblings.
pub fn solve_all_astrometry(
    log: &FrameLog,
    catalog: &ReferenceCatalog,
    cfg: &PipelineConfig,
) -> Result<Vec<AstrometricOffset>> {
    let groups = build_exposure_groups(log);
    let mut offsets = Vec::with_capacity(groups.len());

    for group in &groups {
        match solve_astrometry_group(group, log, catalog, cfg) {
            Ok(offset) => offsets.push(offset),
            Err(e) => {
                error!(
                    aor = group.aor,
                    exposure_id = group.exposure_id,
                    error = %e,
                    "astrometry solve failed; group skipped"
                );
            }
        }
    }

    std::fs::create_dir_all(&cfg.layout.output_dir)?;
    table::write_records(&offsets_path(cfg), &offsets)?;
    Ok(offsets)
}

/// Build and persist the background templates for one job unit: the
/// repeat partition, both template variants per repeat group, PNG
/// quick-looks, and the repeat-assignment table for the subtractor.
pub fn build_background_job(
    job: &JobUnit,
    log: &FrameLog,
    cfg: &PipelineConfig,
) -> Result<Vec<BackgroundModel>> {
    let frames = log.select_job(job.aor, job.channel);
    if frames.is_empty() {
        return Err(PrepError::EmptySequence);
    }

    let build = select_build_frames(&frames, job.hdr);
    let plan = RepeatPlan::derive(&build, job.hdr, cfg.background.frame_delay_threshold_s);
    info!(
        aor = job.aor,
        channel = job.channel,
        hdr = job.hdr,
        n_frames = build.len(),
        n_repeats = plan.n_repeats,
        frames_per_repeat = plan.frames_per_repeat,
        "building background templates"
    );

    let mut prepared = Vec::with_capacity(build.len());
    for frame in &build {
        let img = image::read_image(&frame.derived_path(ImageRole::StarSubtracted))?;
        let noise = image::read_image(&frame.derived_path(ImageRole::Uncertainty))?;
        let bad = image::read_mask(&frame.derived_path(ImageRole::StarMask))?;

        if noise.data.dim() != img.data.dim() || bad.dim() != img.data.dim() {
            return Err(PrepError::InvalidImage(format!(
                "{}: image, noise, and mask dimensions disagree",
                frame.label()
            )));
        }

        prepared.push(prepare_frame(img.data, &noise.data, &bad, &cfg.background));
    }

    let models = build_backgrounds(&prepared, &plan, &cfg.background)?;

    std::fs::create_dir_all(&cfg.layout.output_dir)?;
    std::fs::create_dir_all(&cfg.layout.scratch_dir)?;
    table::write_records(&repeat_table_path(cfg, job.aor, job.channel), &plan.assignments)?;

    // Templates land in scratch first and move into place whole, so a
    // crashed job never leaves a half-written template; the scratch area
    // survives for inspection on failure.
    let mut scratch = ScratchDir::create(
        &cfg.layout.scratch_dir,
        &format!("bg-{}-{}", job.aor, job.channel),
    )?;
    let persisted = persist_templates(&scratch, &models, job, cfg);
    if persisted.is_err() {
        scratch.keep();
    }
    persisted?;

    Ok(models)
}

fn persist_templates(
    scratch: &ScratchDir,
    models: &[BackgroundModel],
    job: &JobUnit,
    cfg: &PipelineConfig,
) -> Result<()> {
    for model in models {
        let (h, w) = model.average.dim();
        let header = image::ImageHeader {
            width: w as u32,
            height: h as u32,
            mjd: 0.0,
            exptime: 0.0,
            frame_delay: 0.0,
            crval1: 0.0,
            crval2: 0.0,
        };

        for (kind, data) in [
            (BackgroundKind::Average, &model.average),
            (BackgroundKind::Median, &model.median),
        ] {
            let target = template_path(cfg, kind, job.aor, model.repeat_index, job.channel);
            let staged = scratch
                .path()
                .join(target.file_name().expect("template path has a file name"));
            image::write_image(&staged, &header, data)?;
            std::fs::rename(&staged, &target)?;
            preview::save_preview(data, &target.with_extension("png"))?;
        }
    }
    Ok(())
}

/// Outcome counts for one job unit's subtraction pass.
#[derive(Clone, Copy, Debug, Default)]
pub struct SubtractSummary {
    pub written: usize,
    pub skipped: usize,
}

/// Subtract the matched background template from every frame of one job
/// unit, apply the group's pointing correction, and rescale the noise.
///
/// A missing upstream file aborts the whole job unit; a per-frame negative
/// variance is logged with the frame identifier and skips only that frame.
pub fn subtract_job(
    job: &JobUnit,
    log: &FrameLog,
    offsets: &[AstrometricOffset],
    cfg: &PipelineConfig,
) -> Result<SubtractSummary> {
    let frames = log.select_job(job.aor, job.channel);
    if frames.is_empty() {
        return Err(PrepError::EmptySequence);
    }

    let assignments: Vec<RepeatAssignment> =
        table::read_records(&repeat_table_path(cfg, job.aor, job.channel))?;
    let n_repeats = assignments
        .iter()
        .map(|a| a.repeat_index + 1)
        .max()
        .unwrap_or(1);

    let mut templates = Vec::with_capacity(n_repeats);
    for repeat_index in 0..n_repeats {
        let path = template_path(cfg, cfg.background.kind, job.aor, repeat_index, job.channel);
        templates.push(image::read_image(&path)?.data);
    }

    let mut summary = SubtractSummary::default();
    for frame in &frames {
        let Some(offset) = offsets
            .iter()
            .find(|o| o.aor == frame.aor && o.exposure_id == frame.exposure_id)
        else {
            warn!(
                frame = %frame.label(),
                exposure_id = frame.exposure_id,
                "no astrometric offset for this exposure group; frame skipped"
            );
            summary.skipped += 1;
            continue;
        };

        let repeat_index = match assignments.iter().find(|a| a.dce == frame.dce) {
            Some(a) if a.repeat_index < templates.len() => a.repeat_index,
            _ => {
                warn!(
                    frame = %frame.label(),
                    "no repeat assignment for frame; defaulting to repeat 0"
                );
                0
            }
        };

        let img = image::read_image(&frame.derived_path(ImageRole::StarSubtracted))?;
        let noise = image::read_image(&frame.derived_path(ImageRole::Uncertainty))?;
        let bad = image::read_mask(&frame.derived_path(ImageRole::StarMask))?;

        let result = subtract_frame(
            &img.data,
            &noise.data,
            &bad,
            &templates[repeat_index],
            &cfg.subtraction,
            &frame.label(),
        );
        let subtracted = match result {
            Ok(s) => s,
            Err(e @ PrepError::NegativeVariance { .. }) => {
                error!(frame = %frame.label(), error = %e, "frame skipped");
                summary.skipped += 1;
                continue;
            }
            Err(e) => return Err(e),
        };

        // The solved correction is additive on the reference-pixel sky
        // coordinates; both outputs carry the corrected pointing.
        let mut header = img.header.clone();
        header.crval1 += offset.d_ra;
        header.crval2 += offset.d_dec;

        image::write_image(
            &frame.derived_path(ImageRole::BackgroundSubtracted),
            &header,
            &subtracted.image,
        )?;
        image::write_image(
            &frame.derived_path(ImageRole::ScaledUncertainty),
            &header,
            &subtracted.noise,
        )?;
        summary.written += 1;
    }

    info!(
        aor = job.aor,
        channel = job.channel,
        written = summary.written,
        skipped = summary.skipped,
        "background subtraction finished"
    );
    Ok(summary)
}

/// Write the per-channel image lists the external mosaicker consumes:
/// one line per calibrated frame, for the image, noise, and mask roles.
pub fn write_image_lists(log: &FrameLog, cfg: &PipelineConfig) -> Result<()> {
    let mut channels: Vec<u32> = log.records().iter().map(|f| f.channel).collect();
    channels.sort_unstable();
    channels.dedup();

    std::fs::create_dir_all(&cfg.layout.output_dir)?;
    for channel in channels {
        for role in [
            ImageRole::BackgroundSubtracted,
            ImageRole::ScaledUncertainty,
            ImageRole::StarMask,
        ] {
            let path = cfg
                .layout
                .output_dir
                .join(format!("ch{}.{}.lst", channel, role.suffix()));
            let mut out = std::io::BufWriter::new(std::fs::File::create(&path)?);
            for frame in log.records().iter().filter(|f| f.channel == channel) {
                writeln!(out, "{}", frame.derived_path(role).display())?;
            }
            out.flush()?;
        }
    }
    Ok(())
}
