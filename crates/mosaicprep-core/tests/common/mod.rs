#![allow(dead_code)]

use std::path::Path;

use ndarray::Array2;

use mosaicprep_core::frame::FrameRecord;
use mosaicprep_core::io::image::{write_image, write_mask, ImageHeader};

/// A gently textured background at `level`: values cycle through three
/// steps of 0.01 so robust statistics never degenerate to a zero scale.
pub fn textured_image(h: usize, w: usize, level: f32) -> Array2<f32> {
    let mut data = Array2::<f32>::zeros((h, w));
    for row in 0..h {
        for col in 0..w {
            data[[row, col]] = level + 0.01 * ((row + col) % 3) as f32;
        }
    }
    data
}

/// A frame record whose raw image lives at `dir/{name}_raw.img`.
pub fn frame_record(
    dir: &Path,
    name: &str,
    dce: u64,
    aor: u64,
    exposure_id: u64,
    channel: u32,
    mjd: f64,
    ra: f64,
    dec: f64,
    exptime: f64,
    frame_delay: f64,
) -> FrameRecord {
    FrameRecord {
        dce,
        filename: dir.join(format!("{}_raw.img", name)),
        mjd,
        ra,
        dec,
        aor,
        exposure_id,
        channel,
        exptime,
        frame_delay,
    }
}

/// Header matching a frame record's metadata.
pub fn header_for(record: &FrameRecord, h: usize, w: usize) -> ImageHeader {
    ImageHeader {
        width: w as u32,
        height: h as u32,
        mjd: record.mjd,
        exptime: record.exptime,
        frame_delay: record.frame_delay,
        crval1: record.ra,
        crval2: record.dec,
    }
}

/// Write the upstream inputs the background track reads for one frame:
/// star-subtracted image, uncertainty map, and star mask.
pub fn write_frame_inputs(
    record: &FrameRecord,
    image: &Array2<f32>,
    noise_level: f32,
) {
    use mosaicprep_core::frame::ImageRole;

    let (h, w) = image.dim();
    let header = header_for(record, h, w);

    write_image(&record.derived_path(ImageRole::StarSubtracted), &header, image)
        .expect("write star-subtracted image");
    write_image(
        &record.derived_path(ImageRole::Uncertainty),
        &header,
        &Array2::from_elem((h, w), noise_level),
    )
    .expect("write uncertainty image");
    write_mask(
        &record.derived_path(ImageRole::StarMask),
        &Array2::from_elem((h, w), false),
    )
    .expect("write star mask");
}
