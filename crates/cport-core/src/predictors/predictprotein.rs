use super::http::{self, PREDICTPROTEIN_API, PREDICTPROTEIN_URL};
use super::sequence_residue;
use crate::core::models::prediction::{PredictionResult, ResidueScore};
use crate::core::models::predictor::PredictorKind;
use crate::core::models::structure::StructureContext;
use crate::engine::backend::{PollStatus, PredictorBackend, ResultLocation, SubmissionHandle};
use crate::engine::error::{ParseError, PollError, SubmissionError};
use reqwest::{Client, Url};
use std::io::{Cursor, Read};
use tracing::debug;
use zip::ZipArchive;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const RESULT_EXTENSION: &str = ".prona";
/// Preamble rows of the `.prona` file before the per-residue table.
const HEADER_ROWS: usize = 11;
const CLASS_COLUMN: usize = 3;

/// PredictProtein labels every residue of a sequence as protein-binding or not. Results are
/// served as a zip archive once the job has been computed.
#[derive(Debug, Clone)]
pub struct PredictProteinBackend {
    client: Client,
    residues: Vec<isize>,
}

impl PredictProteinBackend {
    pub fn new(client: Client, context: &StructureContext) -> Self {
        Self {
            client,
            residues: context.residue_numbers().collect(),
        }
    }
}

impl PredictorBackend for PredictProteinBackend {
    fn predictor(&self) -> PredictorKind {
        PredictorKind::PredictProtein
    }

    async fn submit(&self, context: &StructureContext) -> Result<SubmissionHandle, SubmissionError> {
        let sequence = context.sequence();
        if sequence.chars().all(|c| c == 'X') {
            return Err(SubmissionError::MissingInput(
                "PredictProtein requires a chain of known amino acids",
            ));
        }
        let fetch_url = fetch_url(&sequence)?;
        debug!(%fetch_url, residues = context.residues().len(), "Submitting sequence to PredictProtein");

        self.client
            .post(PREDICTPROTEIN_API)
            .form(&[("sequence", sequence.as_str())])
            .send()
            .await?
            .error_for_status()?;
        Ok(SubmissionHandle(fetch_url))
    }

    async fn poll(&self, handle: &SubmissionHandle) -> Result<PollStatus, PollError> {
        let response = self.client.get(&handle.0).send().await?;
        if !response.status().is_success() {
            return Ok(PollStatus::Pending);
        }
        let body = response.bytes().await?;
        Ok(poll_status(&handle.0, &body))
    }

    async fn fetch_and_parse(&self, location: &ResultLocation) -> Result<PredictionResult, ParseError> {
        let bytes = self
            .client
            .get(&location.0)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        let text = extract_prona(&bytes)?;
        Ok(PredictionResult::new(
            PredictorKind::PredictProtein,
            parse_prona(&text, &self.residues)?,
        ))
    }
}

fn fetch_url(sequence: &str) -> Result<String, SubmissionError> {
    Url::parse_with_params(PREDICTPROTEIN_API, &[("sequence", sequence)])
        .map(String::from)
        .map_err(|e| SubmissionError::Rejected(format!("invalid PredictProtein URL: {}", e)))
}

/// The fetch endpoint answers with the archive itself once the job is done; a status page
/// may instead link to it.
fn poll_status(fetch_url: &str, body: &[u8]) -> PollStatus {
    if body.starts_with(ZIP_MAGIC) {
        return PollStatus::Ready(ResultLocation(fetch_url.to_string()));
    }
    let page = String::from_utf8_lossy(body);
    match http::links(&page).into_iter().find(|l| l.ends_with(".zip")) {
        Some(link) => PollStatus::Ready(ResultLocation(http::resolve(PREDICTPROTEIN_URL, &link))),
        None => PollStatus::Pending,
    }
}

/// Text of the first `.prona` entry of the result archive.
fn extract_prona(bytes: &[u8]) -> Result<String, ParseError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ParseError::UnexpectedFormat(format!("result archive: {}", e)))?;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| ParseError::UnexpectedFormat(format!("result archive entry: {}", e)))?;
        if entry.name().ends_with(RESULT_EXTENSION) {
            let mut text = String::new();
            entry.read_to_string(&mut text).map_err(ParseError::Read)?;
            return Ok(text);
        }
    }
    Err(ParseError::UnexpectedFormat(format!(
        "result archive has no {} file",
        RESULT_EXTENSION
    )))
}

/// Parses the per-residue binding table. The first column is a `<residue>_<position>` label,
/// the fourth the predicted class; class 1 means protein binding. Scores are stored as 1.0
/// for binding residues, 0.0 for every other class and `None` for `NA`.
pub fn parse_prona(text: &str, residues: &[isize]) -> Result<Vec<ResidueScore>, ParseError> {
    let mut scores = Vec::new();
    for (i, line) in text.lines().enumerate().skip(HEADER_ROWS) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        let line_number = i + 1;
        if fields.len() <= CLASS_COLUMN {
            return Err(ParseError::Malformed {
                line: line_number,
                message: format!("expected {} columns", CLASS_COLUMN + 1),
            });
        }
        let position = fields[0]
            .rsplit('_')
            .next()
            .and_then(|p| p.parse::<usize>().ok())
            .ok_or_else(|| ParseError::Malformed {
                line: line_number,
                message: format!("invalid residue label '{}'", fields[0]),
            })?;
        let residue = sequence_residue(residues, position, line_number)?;

        let raw = fields[CLASS_COLUMN];
        let class = if raw.eq_ignore_ascii_case("na") {
            None
        } else {
            let value = raw.parse::<f64>().map_err(|_| ParseError::Malformed {
                line: line_number,
                message: format!("invalid class '{}'", raw),
            })?;
            Some(if value == 1.0 { 1.0 } else { 0.0 })
        };
        scores.push(ResidueScore::new(residue, class));
    }
    if scores.is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(scores)
}
