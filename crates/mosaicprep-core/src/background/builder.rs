use ndarray::Array2;
use rayon::prelude::*;

use crate::buffer::MaskedImage;
use crate::config::BackgroundConfig;
use crate::error::{PrepError, Result};
use crate::mask::{clip_mask, dilate_n};
use crate::stats::{median_f32, robust_scale_f32};

use super::repeats::RepeatPlan;

/// Minimum pixel count (h*w) to use row-level parallelism in the stack.
const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// One frame ready for stacking: masked, source-clipped, level-normalized,
/// with its per-pixel inverse variance.
#[derive(Clone, Debug)]
pub struct PreparedFrame {
    pub image: MaskedImage,
    pub ivar: Array2<f32>,
}

/// The clipped stack products for one repeat group.
#[derive(Clone, Debug)]
pub struct BackgroundModel {
    pub repeat_index: usize,
    /// Inverse-variance weighted mean template.
    pub average: Array2<f32>,
    /// Plain median template; more robust where outliers survive.
    pub median: Array2<f32>,
}

/// Per-frame preprocessing before stacking.
///
/// Non-finite pixels are invalid from the start. Sources are masked with
/// the asymmetric clip about the robust median, the mask is dilated to
/// cover source wings, the external bad-pixel mask is unioned in, and the
/// frame's own median is subtracted so frames stack at a common level.
pub fn prepare_frame(
    image: Array2<f32>,
    noise: &Array2<f32>,
    bad_pixels: &Array2<bool>,
    cfg: &BackgroundConfig,
) -> PreparedFrame {
    let mut masked = MaskedImage::from_data(image);

    if let (Some(med), Some(scale)) = (masked.median(), masked.robust_scale()) {
        // Zero scale means a degenerate flat frame; nothing to clip.
        if scale > 0.0 {
            let objects = clip_mask(
                masked.data(),
                masked.valid(),
                med,
                scale,
                cfg.clip_sigma_pos,
                cfg.clip_sigma_neg,
            );
            let objects = dilate_n(&objects, cfg.n_dilation);
            masked.invalidate_where(&objects);
        }
    }

    masked.invalidate_where(bad_pixels);

    if let Some(level) = masked.median() {
        masked.sub_scalar(level);
    }

    let ivar = noise.mapv(|n| {
        if n.is_finite() && n > 0.0 {
            1.0 / (n * n)
        } else {
            0.0
        }
    });

    PreparedFrame {
        image: masked,
        ivar,
    }
}

/// Stack one repeat group's prepared frames into the two template variants.
///
/// Two passes per pixel: the first takes the masked median and MAD scale
/// across the group and rejects samples outside the asymmetric clip band;
/// the second computes the inverse-variance weighted mean and the plain
/// median over the survivors. Pixels with no surviving sample fill with 0.
pub fn stack_group(frames: &[&PreparedFrame], cfg: &BackgroundConfig) -> (Array2<f32>, Array2<f32>) {
    let (h, w) = frames[0].image.dim();

    let stack_row = |row: usize| -> (Vec<f32>, Vec<f32>) {
        let n = frames.len();
        let mut avg_row = vec![0.0f32; w];
        let mut med_row = vec![0.0f32; w];
        let mut samples: Vec<f32> = Vec::with_capacity(n);
        let mut kept: Vec<(f32, f32)> = Vec::with_capacity(n);

        for col in 0..w {
            samples.clear();
            for frame in frames {
                if let Some(v) = frame.image.get(row, col) {
                    samples.push(v);
                }
            }
            if samples.is_empty() {
                continue;
            }

            let med = median_f32(&mut samples.clone());
            let scale = robust_scale_f32(&mut samples.clone());
            let hi = med + cfg.clip_sigma_pos * scale;
            let lo = med - cfg.clip_sigma_neg * scale;

            kept.clear();
            for frame in frames {
                if let Some(v) = frame.image.get(row, col) {
                    if v < hi && v > lo || scale == 0.0 {
                        kept.push((v, frame.ivar[[row, col]]));
                    }
                }
            }
            if kept.is_empty() {
                continue;
            }

            let weight_sum: f32 = kept.iter().map(|(_, iv)| iv).sum();
            if weight_sum > 0.0 {
                avg_row[col] =
                    kept.iter().map(|(v, iv)| v * iv).sum::<f32>() / weight_sum;
            }

            let mut values: Vec<f32> = kept.iter().map(|(v, _)| *v).collect();
            med_row[col] = median_f32(&mut values);
        }

        (avg_row, med_row)
    };

    let rows: Vec<(Vec<f32>, Vec<f32>)> = if h * w >= PARALLEL_PIXEL_THRESHOLD {
        (0..h).into_par_iter().map(stack_row).collect()
    } else {
        (0..h).map(stack_row).collect()
    };

    let mut average = Array2::<f32>::zeros((h, w));
    let mut median = Array2::<f32>::zeros((h, w));
    for (row, (avg_row, med_row)) in rows.into_iter().enumerate() {
        for col in 0..w {
            average[[row, col]] = avg_row[col];
            median[[row, col]] = med_row[col];
        }
    }

    (average, median)
}

/// Build every repeat group's background templates for one job unit.
pub fn build_backgrounds(
    prepared: &[PreparedFrame],
    plan: &RepeatPlan,
    cfg: &BackgroundConfig,
) -> Result<Vec<BackgroundModel>> {
    if prepared.is_empty() {
        return Err(PrepError::EmptySequence);
    }

    let mut models = Vec::with_capacity(plan.n_repeats);
    for repeat_index in 0..plan.n_repeats {
        let members = plan.group_members(repeat_index);
        let group: Vec<&PreparedFrame> = members
            .into_iter()
            .filter(|&i| i < prepared.len())
            .map(|i| &prepared[i])
            .collect();
        if group.is_empty() {
            return Err(PrepError::EmptySequence);
        }

        let (average, median) = stack_group(&group, cfg);
        models.push(BackgroundModel {
            repeat_index,
            average,
            median,
        });
    }

    Ok(models)
}
