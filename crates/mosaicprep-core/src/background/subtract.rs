use ndarray::Array2;

use crate::buffer::MaskedImage;
use crate::config::SubtractionConfig;
use crate::error::{PrepError, Result};
use crate::mask::{clip_mask, dilate_n};

/// A fully calibrated frame: background-subtracted image and
/// pedestal-corrected noise map.
#[derive(Clone, Debug)]
pub struct SubtractedFrame {
    pub image: Array2<f32>,
    pub noise: Array2<f32>,
    /// Scalar residual level removed after the template subtraction.
    pub residual_median: f32,
    /// Additive variance bias removed from the noise map.
    pub pedestal: f64,
}

/// Subtract a repeat-group template from one frame and rescale its noise.
///
/// After the template is removed, the remaining flat offset is measured
/// over a source-clipped background mask and subtracted as a scalar. The
/// noise map's variance over that same mask is compared with the image's
/// robust scale squared; the difference is an additive pedestal introduced
/// upstream in the uncertainty propagation, and is removed under the root.
/// A negative radicand is a hard failure, never clamped: a clamped noise
/// map would silently understate the uncertainty.
pub fn subtract_frame(
    image: &Array2<f32>,
    noise: &Array2<f32>,
    bad_pixels: &Array2<bool>,
    template: &Array2<f32>,
    cfg: &SubtractionConfig,
    frame_label: &str,
) -> Result<SubtractedFrame> {
    let mut masked = MaskedImage::from_data(image.clone());
    masked.sub_image(template);
    masked.invalidate_where(bad_pixels);

    // First stats pass, then clip and dilate to push sources out of the
    // background estimate. Zero scale means there is no structure to clip.
    if let (Some(med), Some(scale)) = (masked.median(), masked.robust_scale()) {
        if scale > 0.0 {
            let objects = clip_mask(
                masked.data(),
                masked.valid(),
                med,
                scale,
                cfg.clip_sigma,
                cfg.clip_sigma,
            );
            let objects = dilate_n(&objects, cfg.n_dilation);
            masked.invalidate_where(&objects);
        }
    }

    let residual_median = masked.median().unwrap_or(0.0);
    let scale = masked.robust_scale().unwrap_or(0.0);

    // The output image keeps its raw invalid pixels; only the template and
    // the scalar level come off.
    let out_image = image - template - residual_median;

    // Empirical noise variance over the clean background mask.
    let mut var_sum = 0.0f64;
    let mut var_count = 0usize;
    let (h, w) = noise.dim();
    for row in 0..h {
        for col in 0..w {
            let n = noise[[row, col]];
            if masked.is_valid(row, col) && n.is_finite() {
                var_sum += (n as f64) * (n as f64);
                var_count += 1;
            }
        }
    }
    let mean_var = if var_count > 0 {
        var_sum / var_count as f64
    } else {
        0.0
    };
    let pedestal = mean_var - (scale as f64) * (scale as f64);

    let mut out_noise = Array2::<f32>::zeros((h, w));
    for row in 0..h {
        for col in 0..w {
            let n = noise[[row, col]];
            if !n.is_finite() {
                out_noise[[row, col]] = n;
                continue;
            }
            let corrected = (n as f64) * (n as f64) - pedestal;
            if corrected < 0.0 {
                return Err(PrepError::NegativeVariance {
                    frame: frame_label.to_string(),
                });
            }
            out_noise[[row, col]] = corrected.sqrt() as f32;
        }
    }

    Ok(SubtractedFrame {
        image: out_image,
        noise: out_noise,
        residual_median,
        pedestal,
    })
}
