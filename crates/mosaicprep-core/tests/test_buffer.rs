use ndarray::Array2;

use mosaicprep_core::buffer::MaskedImage;
use mosaicprep_core::mask::{clip_mask, dilate, dilate_n};

// ---------------------------------------------------------------------------
// MaskedImage: explicit validity propagation
// ---------------------------------------------------------------------------

#[test]
fn test_non_finite_values_invalid_from_construction() {
    let mut data = Array2::from_elem((4, 4), 1.0f32);
    data[[0, 0]] = f32::NAN;
    data[[1, 2]] = f32::INFINITY;

    let img = MaskedImage::from_data(data);
    assert!(!img.is_valid(0, 0));
    assert!(!img.is_valid(1, 2));
    assert!(img.is_valid(3, 3));
    assert_eq!(img.count_valid(), 14);
}

#[test]
fn test_stats_ignore_invalid_pixels() {
    let mut data = Array2::from_elem((3, 3), 2.0f32);
    data[[0, 0]] = f32::NAN;
    data[[2, 2]] = 1000.0;

    let mut img = MaskedImage::from_data(data);
    let mut hot = Array2::from_elem((3, 3), false);
    hot[[2, 2]] = true;
    img.invalidate_where(&hot);

    assert_eq!(img.count_valid(), 7);
    assert_eq!(img.median(), Some(2.0));
    assert_eq!(img.robust_scale(), Some(0.0));
}

#[test]
fn test_sub_scalar_leaves_invalid_untouched() {
    let mut data = Array2::from_elem((2, 2), 5.0f32);
    data[[0, 0]] = f32::NAN;
    let mut img = MaskedImage::from_data(data);

    img.sub_scalar(5.0);
    assert_eq!(img.get(1, 1), Some(0.0));
    assert_eq!(img.get(0, 0), None);
    // The stored NaN never turned into a number.
    assert!(img.data()[[0, 0]].is_nan());
}

#[test]
fn test_sub_image_with_nan_template_invalidates() {
    let img_data = Array2::from_elem((2, 2), 5.0f32);
    let mut template = Array2::from_elem((2, 2), 1.0f32);
    template[[0, 1]] = f32::NAN;

    let mut img = MaskedImage::from_data(img_data);
    img.sub_image(&template);

    // Valid template elements subtract; the NaN one invalidates instead of
    // poisoning.
    assert_eq!(img.get(0, 0), Some(4.0));
    assert_eq!(img.get(0, 1), None);
}

#[test]
fn test_fully_invalid_has_no_stats() {
    let data = Array2::from_elem((2, 2), f32::NAN);
    let img = MaskedImage::from_data(data);
    assert_eq!(img.median(), None);
    assert_eq!(img.robust_scale(), None);
    assert!(img.valid_values().is_empty());
}

// ---------------------------------------------------------------------------
// dilation and clip masks
// ---------------------------------------------------------------------------

#[test]
fn test_dilate_grows_by_one() {
    let mut mask = Array2::from_elem((7, 7), false);
    mask[[3, 3]] = true;

    let grown = dilate(&mask);
    assert!(grown[[2, 2]]);
    assert!(grown[[3, 4]]);
    assert!(!grown[[3, 5]]);
    assert!(!grown[[0, 0]]);
}

#[test]
fn test_dilate_n_grows_by_n() {
    let mut mask = Array2::from_elem((9, 9), false);
    mask[[4, 4]] = true;

    let grown = dilate_n(&mask, 3);
    assert!(grown[[4, 7]]);
    assert!(!grown[[4, 8]]);
    assert!(grown[[1, 1]]);
}

#[test]
fn test_dilate_zero_is_identity() {
    let mut mask = Array2::from_elem((5, 5), false);
    mask[[2, 2]] = true;
    assert_eq!(dilate_n(&mask, 0), mask);
}

#[test]
fn test_clip_mask_is_asymmetric() {
    let mut data = Array2::from_elem((3, 3), 0.0f32);
    data[[0, 0]] = 4.0; // beyond +3 sigma
    data[[0, 1]] = -4.0; // within -5 sigma
    data[[0, 2]] = -6.0; // beyond -5 sigma
    let valid = Array2::from_elem((3, 3), true);

    let mask = clip_mask(&data, &valid, 0.0, 1.0, 3.0, 5.0);
    assert!(mask[[0, 0]]);
    assert!(!mask[[0, 1]]);
    assert!(mask[[0, 2]]);
    assert!(!mask[[1, 1]]);
}

#[test]
fn test_clip_mask_skips_invalid_pixels() {
    let mut data = Array2::from_elem((2, 2), 100.0f32);
    data[[0, 0]] = 0.0;
    let mut valid = Array2::from_elem((2, 2), true);
    valid[[1, 1]] = false;

    let mask = clip_mask(&data, &valid, 0.0, 1.0, 3.0, 3.0);
    assert!(mask[[0, 1]]);
    // Already-invalid pixels are not re-flagged here.
    assert!(!mask[[1, 1]]);
}
