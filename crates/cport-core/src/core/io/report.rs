use crate::core::models::consensus::{Classification, ConsensusAnnotation};
use crate::core::models::prediction::ResidueScore;
use std::io::{Read, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid score '{value}' for residue {residue}")]
    InvalidScore { residue: String, value: String },
}

/// Writes one row per residue: a column per predictor, a proximity column and the consensus.
/// Cells hold `+` (active), `-` (passive) or nothing (neutral).
pub fn write_consensus_table(
    annotation: &ConsensusAnnotation,
    writer: impl Write,
) -> Result<(), ReportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    let predictors: Vec<_> = annotation.predictors().collect();

    let mut header = vec!["residue".to_string()];
    header.extend(predictors.iter().map(|p| p.display_name().to_string()));
    header.push("proximity".to_string());
    header.push("consensus".to_string());
    csv_writer.write_record(&header)?;

    for (residue, class) in annotation.iter() {
        let mut row = Vec::with_capacity(header.len());
        row.push(residue.to_string());
        for &predictor in &predictors {
            row.push(annotation.vote(predictor, residue).marker().to_string());
        }
        let proximity = if annotation.is_proximity_passive(residue) {
            Classification::Passive.marker()
        } else {
            ""
        };
        row.push(proximity.to_string());
        row.push(class.marker().to_string());
        csv_writer.write_record(&row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Writes raw per-residue scores as `residue,score`; missing scores are left empty.
pub fn write_scores(scores: &[ResidueScore], writer: impl Write) -> Result<(), ReportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(["residue", "score"])?;
    for entry in scores {
        let score = entry.score.map(|s| s.to_string()).unwrap_or_default();
        csv_writer.write_record([entry.residue.to_string(), score])?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Reads scores written by [`write_scores`]. Empty, `NA` and `N/A` cells become `None`.
pub fn read_scores(reader: impl Read) -> Result<Vec<ResidueScore>, ReportError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut scores = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let residue_str = record.get(0).unwrap_or("").trim();
        let score_str = record.get(1).unwrap_or("").trim();
        let residue = residue_str
            .parse::<isize>()
            .map_err(|_| ReportError::InvalidScore {
                residue: residue_str.to_string(),
                value: score_str.to_string(),
            })?;
        let score = match score_str {
            "" => None,
            s if s.eq_ignore_ascii_case("na") || s.eq_ignore_ascii_case("n/a") => None,
            s => Some(s.parse::<f64>().map_err(|_| ReportError::InvalidScore {
                residue: residue_str.to_string(),
                value: s.to_string(),
            })?),
        };
        scores.push(ResidueScore::new(residue, score));
    }
    Ok(scores)
}
