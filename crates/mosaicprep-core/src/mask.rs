use ndarray::Array2;

/// Binary dilation: a pixel becomes true if ANY pixel in its 3x3
/// neighborhood is true.
pub fn dilate(mask: &Array2<bool>) -> Array2<bool> {
    let (h, w) = mask.dim();
    let mut result = Array2::from_elem((h, w), false);

    for row in 0..h {
        for col in 0..w {
            let mut any_true = false;
            for dr in -1..=1_i32 {
                for dc in -1..=1_i32 {
                    let nr = row as i32 + dr;
                    let nc = col as i32 + dc;
                    if nr >= 0
                        && nr < h as i32
                        && nc >= 0
                        && nc < w as i32
                        && mask[[nr as usize, nc as usize]]
                    {
                        any_true = true;
                        break;
                    }
                }
                if any_true {
                    break;
                }
            }
            result[[row, col]] = any_true;
        }
    }

    result
}

/// Dilate `n` times, growing exclusion zones around flagged sources.
pub fn dilate_n(mask: &Array2<bool>, n: usize) -> Array2<bool> {
    let mut result = mask.clone();
    for _ in 0..n {
        result = dilate(&result);
    }
    result
}

/// Flag pixels outside [median - sigma_neg*scale, median + sigma_pos*scale].
///
/// Asymmetric thresholds: bright (positive) outliers are real sources and
/// get the tighter cut; negative holes the looser one. Pixels already
/// invalid in `valid` are never flagged here.
pub fn clip_mask(
    data: &Array2<f32>,
    valid: &Array2<bool>,
    median: f32,
    scale: f32,
    sigma_pos: f32,
    sigma_neg: f32,
) -> Array2<bool> {
    let hi = median + sigma_pos * scale;
    let lo = median - sigma_neg * scale;
    let (h, w) = data.dim();
    let mut mask = Array2::from_elem((h, w), false);
    for row in 0..h {
        for col in 0..w {
            if valid[[row, col]] {
                let v = data[[row, col]];
                if v >= hi || v <= lo {
                    mask[[row, col]] = true;
                }
            }
        }
    }
    mask
}
