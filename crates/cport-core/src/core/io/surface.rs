use crate::core::models::structure::Exposure;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Relative accessibility (percent) that both the main chain and the side chain must reach
/// for a residue to count as exposed.
pub const DEFAULT_SURFACE_CUTOFF: f64 = 15.0;

#[derive(Debug, Error)]
pub enum SurfaceLoadError {
    #[error("CSV parsing error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Invalid accessibility value '{value}' for residue {residue} in '{path}'")]
    InvalidValue {
        path: String,
        residue: isize,
        value: String,
    },
}

#[derive(Debug, Deserialize)]
struct SurfaceRecord {
    residue: isize,
    relative_mainchain: String,
    relative_sidechain: String,
}

fn parse_accessibility(value: &str) -> Result<Option<f64>, ()> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("n/a") || trimmed.eq_ignore_ascii_case("na") {
        return Ok(None);
    }
    trimmed.parse().map(Some).map_err(|_| ())
}

/// Classifies one residue from its relative accessibilities. Any missing value yields
/// `Unknown`; it is never guessed as exposed or buried.
pub fn classify(mainchain: Option<f64>, sidechain: Option<f64>, cutoff: f64) -> Exposure {
    match (mainchain, sidechain) {
        (Some(m), Some(s)) if m >= cutoff && s >= cutoff => Exposure::Exposed,
        (Some(_), Some(_)) => Exposure::Buried,
        _ => Exposure::Unknown,
    }
}

/// Reads per-residue exposure from a `residue,relative_mainchain,relative_sidechain` CSV.
pub fn read_surface(path: &Path, cutoff: f64) -> Result<HashMap<isize, Exposure>, SurfaceLoadError> {
    let reader = csv::Reader::from_path(path).map_err(|e| SurfaceLoadError::Csv {
        path: path.to_string_lossy().to_string(),
        source: e,
    })?;
    read_records(reader, &path.to_string_lossy(), cutoff)
}

pub fn read_surface_from(
    input: impl Read,
    cutoff: f64,
) -> Result<HashMap<isize, Exposure>, SurfaceLoadError> {
    read_records(csv::Reader::from_reader(input), "<reader>", cutoff)
}

fn read_records<R: Read>(
    mut reader: csv::Reader<R>,
    origin: &str,
    cutoff: f64,
) -> Result<HashMap<isize, Exposure>, SurfaceLoadError> {
    let mut exposures = HashMap::new();
    for result in reader.deserialize::<SurfaceRecord>() {
        let record = result.map_err(|e| SurfaceLoadError::Csv {
            path: origin.to_string(),
            source: e,
        })?;
        let parse = |value: &str| {
            parse_accessibility(value).map_err(|_| SurfaceLoadError::InvalidValue {
                path: origin.to_string(),
                residue: record.residue,
                value: value.to_string(),
            })
        };
        let mainchain = parse(&record.relative_mainchain)?;
        let sidechain = parse(&record.relative_sidechain)?;
        exposures.insert(record.residue, classify(mainchain, sidechain, cutoff));
    }
    Ok(exposures)
}
