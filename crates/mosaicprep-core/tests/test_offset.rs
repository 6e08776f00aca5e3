use mosaicprep_core::astrom::solve_offset;
use mosaicprep_core::astrom::xmatch::MatchedResidual;
use mosaicprep_core::error::PrepError;

fn residual(d_ra: f64, d_dec: f64) -> MatchedResidual {
    MatchedResidual {
        d_ra,
        d_dec,
        var_ra: 1e-10,
        var_dec: 1e-10,
    }
}

const ARCSEC: f64 = 1.0 / 3600.0;

#[test]
fn test_recovers_tight_offset() {
    // Residuals scattered tightly around (1", -0.5").
    let scatter = [-0.05, -0.02, 0.0, 0.01, 0.03, 0.06, -0.04, 0.02];
    let residuals: Vec<MatchedResidual> = scatter
        .iter()
        .map(|s| residual((1.0 + s) * ARCSEC, (-0.5 + s) * ARCSEC))
        .collect();

    let offset = solve_offset(&residuals, 7, 3).unwrap();
    assert_eq!(offset.aor, 7);
    assert_eq!(offset.exposure_id, 3);
    assert_eq!(offset.n_stars, residuals.len());
    assert!(offset.verified);
    assert!((offset.d_ra - 1.0 * ARCSEC).abs() < 0.1 * ARCSEC);
    assert!((offset.d_dec + 0.5 * ARCSEC).abs() < 0.1 * ARCSEC);
}

#[test]
fn test_extreme_outlier_is_clipped() {
    // 20 tight inliers; one wild mismatch whose Euclidean distance from
    // the median exceeds three combined sigmas even though the outlier
    // itself inflates the pre-clip scatter.
    let mut residuals: Vec<MatchedResidual> = (0..20)
        .map(|i| {
            let s = 0.01 * (i as f64 - 9.5) / 9.5;
            residual((1.0 + s) * ARCSEC, (-0.5 + s) * ARCSEC)
        })
        .collect();
    residuals.push(residual(60.0 * ARCSEC, 60.0 * ARCSEC));
    let total = residuals.len();

    let offset = solve_offset(&residuals, 1, 1).unwrap();
    assert_eq!(offset.n_stars, total - 1);
    assert!((offset.d_ra - 1.0 * ARCSEC).abs() < 0.05 * ARCSEC);
    assert!((offset.d_dec + 0.5 * ARCSEC).abs() < 0.05 * ARCSEC);
    // Standard error reflects only the inlier scatter.
    assert!(offset.err_ra < 0.05 * ARCSEC);
}

#[test]
fn test_identical_residuals_survive() {
    // Zero scatter must not clip everything away.
    let residuals = vec![residual(2.0 * ARCSEC, ARCSEC); 5];
    let offset = solve_offset(&residuals, 1, 1).unwrap();
    assert_eq!(offset.n_stars, 5);
    assert!((offset.d_ra - 2.0 * ARCSEC).abs() < 1e-12);
    assert_eq!(offset.err_ra, 0.0);
}

#[test]
fn test_empty_input_is_insufficient_matches() {
    let result = solve_offset(&[], 42, 9);
    match result {
        Err(PrepError::InsufficientMatches { aor, exposure_id }) => {
            assert_eq!(aor, 42);
            assert_eq!(exposure_id, 9);
        }
        other => panic!("expected InsufficientMatches, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_never_returns_nan() {
    let residuals = vec![residual(0.0, 0.0), residual(1e-9, -1e-9)];
    let offset = solve_offset(&residuals, 1, 1).unwrap();
    assert!(offset.d_ra.is_finite());
    assert!(offset.d_dec.is_finite());
    assert!(offset.err_ra.is_finite());
    assert!(offset.err_dec.is_finite());
}
