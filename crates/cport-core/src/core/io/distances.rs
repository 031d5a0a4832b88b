use crate::core::models::structure::DistanceTable;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DistanceLoadError {
    #[error("CSV parsing error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Negative or non-finite distance {distance} between residues {a} and {b} in '{path}'")]
    InvalidDistance {
        path: String,
        a: isize,
        b: isize,
        distance: f64,
    },
}

#[derive(Debug, Deserialize)]
struct DistanceRecord {
    residue_a: isize,
    residue_b: isize,
    distance: f64,
}

/// Reads a sparse `residue_a,residue_b,distance` table produced by an external geometry tool.
pub fn read_distances(path: &Path) -> Result<DistanceTable, DistanceLoadError> {
    let reader = csv::Reader::from_path(path).map_err(|e| DistanceLoadError::Csv {
        path: path.to_string_lossy().to_string(),
        source: e,
    })?;
    read_records(reader, &path.to_string_lossy())
}

pub fn read_distances_from(input: impl Read) -> Result<DistanceTable, DistanceLoadError> {
    read_records(csv::Reader::from_reader(input), "<reader>")
}

fn read_records<R: Read>(
    mut reader: csv::Reader<R>,
    origin: &str,
) -> Result<DistanceTable, DistanceLoadError> {
    let mut table = DistanceTable::new();
    for result in reader.deserialize::<DistanceRecord>() {
        let record = result.map_err(|e| DistanceLoadError::Csv {
            path: origin.to_string(),
            source: e,
        })?;
        if !record.distance.is_finite() || record.distance < 0.0 {
            return Err(DistanceLoadError::InvalidDistance {
                path: origin.to_string(),
                a: record.residue_a,
                b: record.residue_b,
                distance: record.distance,
            });
        }
        table.insert(record.residue_a, record.residue_b, record.distance);
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_distances_builds_symmetric_table() {
        let input = "residue_a,residue_b,distance\n10,12,4.2\n12,10,3.9\n11,13,9.0\n";
        let table = read_distances_from(input.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(10, 12), Some(3.9));
        assert_eq!(table.get(13, 11), Some(9.0));
    }

    #[test]
    fn read_distances_rejects_negative_values() {
        let input = "residue_a,residue_b,distance\n1,2,-0.5\n";
        assert!(matches!(
            read_distances_from(input.as_bytes()),
            Err(DistanceLoadError::InvalidDistance { a: 1, b: 2, .. })
        ));
    }

    #[test]
    fn read_distances_rejects_malformed_rows() {
        let input = "residue_a,residue_b,distance\n1,two,3.0\n";
        assert!(matches!(
            read_distances_from(input.as_bytes()),
            Err(DistanceLoadError::Csv { .. })
        ));
    }
}
