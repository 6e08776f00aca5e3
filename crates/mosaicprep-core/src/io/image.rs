use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use memmap2::Mmap;
use ndarray::Array2;

use crate::error::{PrepError, Result};

const IMAGE_MAGIC: &[u8; 4] = b"MPIM";
const MASK_MAGIC: &[u8; 4] = b"MPMK";
const FORMAT_VERSION: u32 = 1;
const HEADER_SIZE: usize = 4 + 4 + 4 + 4 + 8 * 5;

/// Header of the binary image container: dimensions plus the frame
/// metadata the mosaicker needs (timing and reference-pixel pointing).
#[derive(Clone, Debug, PartialEq)]
pub struct ImageHeader {
    pub width: u32,
    pub height: u32,
    /// Observation time (MJD).
    pub mjd: f64,
    /// Exposure time (s).
    pub exptime: f64,
    /// Delay since the previous frame (s).
    pub frame_delay: f64,
    /// Reference-pixel sky coordinates (deg). The astrometric correction
    /// is applied here.
    pub crval1: f64,
    pub crval2: f64,
}

/// A loaded image container.
#[derive(Clone, Debug)]
pub struct ImageFile {
    pub header: ImageHeader,
    pub data: Array2<f32>,
}

fn open_mapped(path: &Path) -> Result<Mmap> {
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            PrepError::MissingFile(path.to_path_buf())
        } else {
            PrepError::Io(e)
        }
    })?;
    Ok(unsafe { Mmap::map(&file)? })
}

fn parse_header(buf: &[u8], magic: &[u8; 4], path: &Path) -> Result<ImageHeader> {
    if buf.len() < HEADER_SIZE {
        return Err(PrepError::InvalidImage(format!(
            "{}: file too small for header",
            path.display()
        )));
    }
    if &buf[0..4] != magic {
        return Err(PrepError::InvalidImage(format!(
            "{}: bad magic",
            path.display()
        )));
    }

    let mut cursor = std::io::Cursor::new(&buf[4..]);
    let version = cursor.read_u32::<LittleEndian>()?;
    if version != FORMAT_VERSION {
        return Err(PrepError::InvalidImage(format!(
            "{}: unsupported version {}",
            path.display(),
            version
        )));
    }
    let width = cursor.read_u32::<LittleEndian>()?;
    let height = cursor.read_u32::<LittleEndian>()?;
    let mjd = cursor.read_f64::<LittleEndian>()?;
    let exptime = cursor.read_f64::<LittleEndian>()?;
    let frame_delay = cursor.read_f64::<LittleEndian>()?;
    let crval1 = cursor.read_f64::<LittleEndian>()?;
    let crval2 = cursor.read_f64::<LittleEndian>()?;

    if width == 0 || height == 0 {
        return Err(PrepError::InvalidDimensions { width, height });
    }

    Ok(ImageHeader {
        width,
        height,
        mjd,
        exptime,
        frame_delay,
        crval1,
        crval2,
    })
}

fn write_header<W: Write>(out: &mut W, magic: &[u8; 4], header: &ImageHeader) -> Result<()> {
    out.write_all(magic)?;
    out.write_u32::<LittleEndian>(FORMAT_VERSION)?;
    out.write_u32::<LittleEndian>(header.width)?;
    out.write_u32::<LittleEndian>(header.height)?;
    out.write_f64::<LittleEndian>(header.mjd)?;
    out.write_f64::<LittleEndian>(header.exptime)?;
    out.write_f64::<LittleEndian>(header.frame_delay)?;
    out.write_f64::<LittleEndian>(header.crval1)?;
    out.write_f64::<LittleEndian>(header.crval2)?;
    Ok(())
}

/// Read a float image container (memory-mapped).
pub fn read_image(path: &Path) -> Result<ImageFile> {
    let mmap = open_mapped(path)?;
    let header = parse_header(&mmap, IMAGE_MAGIC, path)?;

    let h = header.height as usize;
    let w = header.width as usize;
    let expected = HEADER_SIZE + h * w * 4;
    if mmap.len() < expected {
        return Err(PrepError::InvalidImage(format!(
            "{}: truncated payload, expected {} bytes, got {}",
            path.display(),
            expected,
            mmap.len()
        )));
    }

    let mut data = Array2::<f32>::zeros((h, w));
    let payload = &mmap[HEADER_SIZE..expected];
    for row in 0..h {
        for col in 0..w {
            let idx = (row * w + col) * 4;
            let bytes = [
                payload[idx],
                payload[idx + 1],
                payload[idx + 2],
                payload[idx + 3],
            ];
            data[[row, col]] = f32::from_le_bytes(bytes);
        }
    }

    Ok(ImageFile { header, data })
}

/// Write a float image container, overwriting any existing file.
pub fn write_image(path: &Path, header: &ImageHeader, data: &Array2<f32>) -> Result<()> {
    let (h, w) = data.dim();
    debug_assert_eq!((h, w), (header.height as usize, header.width as usize));

    let mut out = BufWriter::new(File::create(path)?);
    write_header(&mut out, IMAGE_MAGIC, header)?;
    for value in data.iter() {
        out.write_f32::<LittleEndian>(*value)?;
    }
    out.flush()?;
    Ok(())
}

/// Read a mask container; nonzero means bad.
pub fn read_mask(path: &Path) -> Result<Array2<bool>> {
    let mmap = open_mapped(path)?;
    let header = parse_header(&mmap, MASK_MAGIC, path)?;

    let h = header.height as usize;
    let w = header.width as usize;
    let expected = HEADER_SIZE + h * w * 2;
    if mmap.len() < expected {
        return Err(PrepError::InvalidImage(format!(
            "{}: truncated payload, expected {} bytes, got {}",
            path.display(),
            expected,
            mmap.len()
        )));
    }

    let mut mask = Array2::from_elem((h, w), false);
    let payload = &mmap[HEADER_SIZE..expected];
    for row in 0..h {
        for col in 0..w {
            let idx = (row * w + col) * 2;
            let value = u16::from_le_bytes([payload[idx], payload[idx + 1]]);
            mask[[row, col]] = value != 0;
        }
    }

    Ok(mask)
}

/// Write a mask container; flagged pixels store 1.
pub fn write_mask(path: &Path, mask: &Array2<bool>) -> Result<()> {
    let (h, w) = mask.dim();
    let header = ImageHeader {
        width: w as u32,
        height: h as u32,
        mjd: 0.0,
        exptime: 0.0,
        frame_delay: 0.0,
        crval1: 0.0,
        crval2: 0.0,
    };

    let mut out = BufWriter::new(File::create(path)?);
    write_header(&mut out, MASK_MAGIC, &header)?;
    for &flagged in mask.iter() {
        out.write_u16::<LittleEndian>(u16::from(flagged))?;
    }
    out.flush()?;
    Ok(())
}
