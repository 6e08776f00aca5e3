use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrepError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid image file: {0}")]
    InvalidImage(String),

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Empty frame sequence")]
    EmptySequence,

    #[error("Missing expected file: {0}")]
    MissingFile(PathBuf),

    #[error("No surviving star matches for AOR {aor} exposure {exposure_id}")]
    InsufficientMatches { aor: u64, exposure_id: u64 },

    #[error("Negative variance after pedestal removal in {frame}")]
    NegativeVariance { frame: String },

    #[error("Record table error in {path}: {message}")]
    Table { path: PathBuf, message: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("External tool `{program}` failed: {message}")]
    Tool { program: String, message: String },

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, PrepError>;
