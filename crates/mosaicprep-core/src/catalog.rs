use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::io::table;

/// Parallax placeholder for stars with no measured parallax. Keeps the
/// epoch propagation numerically defined without moving the star.
pub const PARALLAX_FLOOR_MAS: f64 = 1e-8;

/// One reference-catalog source at the catalog reference epoch.
///
/// Positions are degrees; uncertainties and parallax are milliarcseconds;
/// proper motions are mas/yr with the RA component already including the
/// cos(Dec) factor, as delivered by the catalog service.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReferenceStar {
    pub id: u64,
    pub ra: f64,
    pub dec: f64,
    pub ra_error: f64,
    pub dec_error: f64,
    pub pm_ra: Option<f64>,
    pub pm_dec: Option<f64>,
    pub pm_ra_error: Option<f64>,
    pub pm_dec_error: Option<f64>,
    pub parallax: Option<f64>,
    pub flux: Option<f64>,
}

impl ReferenceStar {
    pub fn pm_ra_or_zero(&self) -> f64 {
        self.pm_ra.unwrap_or(0.0)
    }

    pub fn pm_dec_or_zero(&self) -> f64 {
        self.pm_dec.unwrap_or(0.0)
    }

    pub fn pm_ra_error_or_zero(&self) -> f64 {
        self.pm_ra_error.unwrap_or(0.0)
    }

    pub fn pm_dec_error_or_zero(&self) -> f64 {
        self.pm_dec_error.unwrap_or(0.0)
    }

    pub fn parallax_or_floor(&self) -> f64 {
        self.parallax.unwrap_or(PARALLAX_FLOOR_MAS)
    }
}

/// The read-only reference catalog, loaded once and passed by reference
/// into every job.
#[derive(Clone, Debug)]
pub struct ReferenceCatalog {
    /// Epoch of the catalog positions (MJD).
    pub epoch_mjd: f64,
    pub stars: Vec<ReferenceStar>,
}

impl ReferenceCatalog {
    pub fn new(epoch_mjd: f64, stars: Vec<ReferenceStar>) -> Self {
        Self { epoch_mjd, stars }
    }

    pub fn load(path: &Path, epoch_mjd: f64) -> Result<Self> {
        Ok(Self::new(epoch_mjd, table::read_records(path)?))
    }

    pub fn len(&self) -> usize {
        self.stars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stars.is_empty()
    }
}
