use std::path::Path;

use image::{GrayImage, ImageFormat, Luma};
use ndarray::Array2;

use crate::error::Result;

/// Save an 8-bit PNG quick-look of a template, stretched between the 1st
/// and 99th percentile of the finite pixels.
pub fn save_preview(data: &Array2<f32>, path: &Path) -> Result<()> {
    let mut finite: Vec<f32> = data.iter().copied().filter(|v| v.is_finite()).collect();
    let (lo, hi) = if finite.is_empty() {
        (0.0, 1.0)
    } else {
        finite.sort_unstable_by(|a, b| a.total_cmp(b));
        let lo = finite[finite.len() / 100];
        let hi = finite[finite.len() - 1 - finite.len() / 100];
        if hi > lo {
            (lo, hi)
        } else {
            (lo, lo + 1.0)
        }
    };

    let (h, w) = data.dim();
    let mut img = GrayImage::new(w as u32, h as u32);
    for row in 0..h {
        for col in 0..w {
            let v = data[[row, col]];
            let scaled = if v.is_finite() {
                ((v - lo) / (hi - lo)).clamp(0.0, 1.0)
            } else {
                0.0
            };
            img.put_pixel(col as u32, row as u32, Luma([(scaled * 255.0) as u8]));
        }
    }

    img.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}
