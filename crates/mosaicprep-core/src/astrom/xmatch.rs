use serde::{Deserialize, Serialize};

use crate::catalog::ReferenceCatalog;

use super::propagate::{position_errors_deg, PropagatedStar};

/// One row of the external point-source fitter's output table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetectedSource {
    /// Fitted position (deg).
    pub ra: f64,
    pub dec: f64,
    /// Fitted position uncertainties (deg).
    pub delta_ra: f64,
    pub delta_dec: f64,
    pub flux: f64,
    pub delta_flux: f64,
    /// Fit status; 0 means the fit failed and the row is ignored.
    pub status: i32,
}

/// One accepted (catalog star, detected source) pair: the residual
/// offset and the combined variance of both position measurements.
#[derive(Clone, Debug)]
pub struct MatchedResidual {
    /// catalog - measured (deg).
    pub d_ra: f64,
    pub d_dec: f64,
    /// catalog error^2 + measurement error^2 (deg^2).
    pub var_ra: f64,
    pub var_dec: f64,
}

/// Angular separation between two sky positions, in degrees (haversine).
pub fn angular_separation_deg(ra1: f64, dec1: f64, ra2: f64, dec2: f64) -> f64 {
    let (ra1, dec1) = (ra1.to_radians(), dec1.to_radians());
    let (ra2, dec2) = (ra2.to_radians(), dec2.to_radians());
    let sin_ddec = ((dec2 - dec1) / 2.0).sin();
    let sin_dra = ((ra2 - ra1) / 2.0).sin();
    let h = sin_ddec * sin_ddec + dec1.cos() * dec2.cos() * sin_dra * sin_dra;
    (2.0 * h.sqrt().asin()).to_degrees()
}

/// Keep only the propagated stars within `radius_deg` of a frame pointing,
/// bounding the per-frame candidate set.
pub fn restrict_to_field(
    stars: &[PropagatedStar],
    ra: f64,
    dec: f64,
    radius_deg: f64,
) -> Vec<PropagatedStar> {
    stars
        .iter()
        .filter(|s| angular_separation_deg(s.ra, s.dec, ra, dec) < radius_deg)
        .cloned()
        .collect()
}

/// Cross-match one frame's detections against the propagated catalog.
///
/// For each source with a valid fit status, the nearest star by angular
/// separation is taken; the pair is accepted only within the match radius.
/// Sources with no star in range are dropped silently.
pub fn match_frame(
    sources: &[DetectedSource],
    field_stars: &[PropagatedStar],
    catalog: &ReferenceCatalog,
    dt_years: f64,
    match_radius_arcsec: f64,
) -> Vec<MatchedResidual> {
    let radius_deg = match_radius_arcsec / 3600.0;
    let mut residuals = Vec::new();

    for source in sources {
        if source.status == 0 {
            continue;
        }

        let nearest = field_stars
            .iter()
            .map(|star| {
                let sep = angular_separation_deg(star.ra, star.dec, source.ra, source.dec);
                (star, sep)
            })
            .min_by(|a, b| a.1.total_cmp(&b.1));

        let Some((star, separation)) = nearest else {
            continue;
        };
        if separation > radius_deg {
            continue;
        }

        let reference = &catalog.stars[star.index];
        let (ra_err, dec_err) = position_errors_deg(reference, dt_years);

        residuals.push(MatchedResidual {
            d_ra: star.ra - source.ra,
            d_dec: star.dec - source.dec,
            var_ra: ra_err * ra_err + source.delta_ra * source.delta_ra,
            var_dec: dec_err * dec_err + source.delta_dec * source.delta_dec,
        });
    }

    residuals
}
