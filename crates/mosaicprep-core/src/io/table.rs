use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{PrepError, Result};

/// Read a JSON-lines record table, one serde value per line.
pub fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            PrepError::MissingFile(path.to_path_buf())
        } else {
            PrepError::Io(e)
        }
    })?;

    let mut records = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| PrepError::Table {
            path: path.to_path_buf(),
            message: format!("line {}: {}", line_no + 1, e),
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Write a JSON-lines record table, overwriting any existing file.
pub fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for record in records {
        let line = serde_json::to_string(record).map_err(|e| PrepError::Table {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        writeln!(out, "{}", line)?;
    }
    out.flush()?;
    Ok(())
}
