use ndarray::Array2;

use crate::stats;

/// A float image with an explicit per-pixel validity plane.
///
/// Invalid elements never participate in statistics or arithmetic and stay
/// invalid through every operation; arithmetic never manufactures NaNs into
/// valid pixels. Non-finite input values are invalid from construction.
#[derive(Clone, Debug)]
pub struct MaskedImage {
    data: Array2<f32>,
    valid: Array2<bool>,
}

impl MaskedImage {
    /// Wrap a pixel buffer, marking non-finite elements invalid.
    pub fn from_data(data: Array2<f32>) -> Self {
        let valid = data.mapv(|v| v.is_finite());
        Self { data, valid }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn data(&self) -> &Array2<f32> {
        &self.data
    }

    pub fn valid(&self) -> &Array2<bool> {
        &self.valid
    }

    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        self.valid[[row, col]]
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if self.valid[[row, col]] {
            Some(self.data[[row, col]])
        } else {
            None
        }
    }

    pub fn count_valid(&self) -> usize {
        self.valid.iter().filter(|&&v| v).count()
    }

    /// Mark every pixel flagged in `mask` invalid (union with the current
    /// invalid set).
    pub fn invalidate_where(&mut self, mask: &Array2<bool>) {
        for (v, &m) in self.valid.iter_mut().zip(mask.iter()) {
            if m {
                *v = false;
            }
        }
    }

    /// All valid pixel values, in row-major order.
    pub fn valid_values(&self) -> Vec<f32> {
        self.data
            .iter()
            .zip(self.valid.iter())
            .filter_map(|(&d, &v)| if v { Some(d) } else { None })
            .collect()
    }

    /// Median over valid pixels; `None` when nothing is valid.
    pub fn median(&self) -> Option<f32> {
        let mut values = self.valid_values();
        if values.is_empty() {
            None
        } else {
            Some(stats::median_f32(&mut values))
        }
    }

    /// MAD-derived robust scale over valid pixels.
    pub fn robust_scale(&self) -> Option<f32> {
        let mut values = self.valid_values();
        if values.is_empty() {
            None
        } else {
            Some(stats::robust_scale_f32(&mut values))
        }
    }

    /// Subtract a scalar from every valid pixel.
    pub fn sub_scalar(&mut self, value: f32) {
        for (d, &v) in self.data.iter_mut().zip(self.valid.iter()) {
            if v {
                *d -= value;
            }
        }
    }

    /// Subtract a plain template image element-wise from valid pixels.
    /// Non-finite template elements invalidate the pixel instead of
    /// poisoning it.
    pub fn sub_image(&mut self, template: &Array2<f32>) {
        for ((d, v), &t) in self
            .data
            .iter_mut()
            .zip(self.valid.iter_mut())
            .zip(template.iter())
        {
            if *v {
                if t.is_finite() {
                    *d -= t;
                } else {
                    *v = false;
                }
            }
        }
    }
}
