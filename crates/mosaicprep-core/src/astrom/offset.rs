use serde::{Deserialize, Serialize};

use crate::error::{PrepError, Result};
use crate::stats::{median_f64, stddev_f64};

use super::xmatch::MatchedResidual;

/// Outlier cut: pairs farther than this many combined sigmas from the
/// median offset are rejected.
const CLIP_SIGMA: f64 = 3.0;

/// The solved pointing correction for one exposure group.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AstrometricOffset {
    pub aor: u64,
    pub exposure_id: u64,
    /// Additive correction to the reference-pixel sky coordinates (deg).
    pub d_ra: f64,
    pub d_dec: f64,
    /// Standard errors of the medians (deg).
    pub err_ra: f64,
    pub err_dec: f64,
    /// Stars surviving the outlier cut.
    pub n_stars: usize,
    /// False only for a configured zero-offset fallback.
    pub verified: bool,
}

impl AstrometricOffset {
    /// Zero-offset fallback for a group with no surviving matches,
    /// flagged unverified.
    pub fn unverified_zero(aor: u64, exposure_id: u64) -> Self {
        Self {
            aor,
            exposure_id,
            d_ra: 0.0,
            d_dec: 0.0,
            err_ra: 0.0,
            err_dec: 0.0,
            n_stars: 0,
            verified: false,
        }
    }
}

/// Solve one exposure group's pointing correction from its pooled matched
/// residuals.
///
/// Median offset and sample scatter over the full set, a 3-sigma Euclidean
/// cut about the medians, then the median and scatter of the survivors.
/// The median (not an inverse-variance mean) is deliberate: heavy-tailed
/// mismatches would drag a weighted mean.
pub fn solve_offset(
    residuals: &[MatchedResidual],
    aor: u64,
    exposure_id: u64,
) -> Result<AstrometricOffset> {
    if residuals.is_empty() {
        return Err(PrepError::InsufficientMatches { aor, exposure_id });
    }

    let d_ra: Vec<f64> = residuals.iter().map(|r| r.d_ra).collect();
    let d_dec: Vec<f64> = residuals.iter().map(|r| r.d_dec).collect();

    let med_ra = median_f64(&mut d_ra.clone());
    let med_dec = median_f64(&mut d_dec.clone());
    let sig_ra = stddev_f64(&d_ra);
    let sig_dec = stddev_f64(&d_dec);

    // Euclidean distance from the median pair, against the combined scatter.
    let limit = CLIP_SIGMA * (sig_ra * sig_ra + sig_dec * sig_dec).sqrt();
    let survivors: Vec<&MatchedResidual> = residuals
        .iter()
        .filter(|r| {
            let dr = r.d_ra - med_ra;
            let dd = r.d_dec - med_dec;
            (dr * dr + dd * dd).sqrt() < limit || limit == 0.0
        })
        .collect();

    let n = survivors.len();
    if n == 0 {
        return Err(PrepError::InsufficientMatches { aor, exposure_id });
    }

    let mut kept_ra: Vec<f64> = survivors.iter().map(|r| r.d_ra).collect();
    let mut kept_dec: Vec<f64> = survivors.iter().map(|r| r.d_dec).collect();

    let sig_ra = stddev_f64(&kept_ra);
    let sig_dec = stddev_f64(&kept_dec);
    let sqrt_n = (n as f64).sqrt();

    Ok(AstrometricOffset {
        aor,
        exposure_id,
        d_ra: median_f64(&mut kept_ra),
        d_dec: median_f64(&mut kept_dec),
        err_ra: sig_ra / sqrt_n,
        err_dec: sig_dec / sqrt_n,
        n_stars: n,
        verified: true,
    })
}
