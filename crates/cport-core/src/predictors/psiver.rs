use super::http::{self, PSIVER_URL};
use super::sequence_residue;
use crate::core::models::prediction::{PredictionResult, ResidueScore};
use crate::core::models::predictor::PredictorKind;
use crate::core::models::structure::StructureContext;
use crate::engine::backend::{PollStatus, PredictorBackend, ResultLocation, SubmissionHandle};
use crate::engine::error::{ParseError, PollError, SubmissionError};
use flate2::read::GzDecoder;
use reqwest::Client;
use std::io::Read;
use tracing::debug;

const RESULT_MARKER: &str = "All the results are available now.";
const WAIT_LINK_PATTERN: &str = r#"href="(.*)"</script"#;
/// Preamble rows of the result file before the per-residue table.
const HEADER_ROWS: usize = 15;
const SCORE_COLUMN: usize = 4;

/// PSIVER predicts from sequence alone; the chain is submitted as FASTA and results come
/// back indexed by sequence position.
#[derive(Debug, Clone)]
pub struct PsiverBackend {
    client: Client,
    residues: Vec<isize>,
}

impl PsiverBackend {
    pub fn new(client: Client, context: &StructureContext) -> Self {
        Self {
            client,
            residues: context.residue_numbers().collect(),
        }
    }
}

impl PredictorBackend for PsiverBackend {
    fn predictor(&self) -> PredictorKind {
        PredictorKind::Psiver
    }

    async fn submit(&self, context: &StructureContext) -> Result<SubmissionHandle, SubmissionError> {
        let fasta = context.to_fasta();
        let form_page = http::get_text(&self.client, PSIVER_URL).await?;
        let action = http::form_action(&form_page)
            .map(|a| http::resolve(PSIVER_URL, &a))
            .unwrap_or_else(|| PSIVER_URL.to_string());
        debug!(%action, residues = context.residues().len(), "Submitting sequence to PSIVER");

        let response = self
            .client
            .post(&action)
            .form(&[("fasta_seq", fasta.as_str())])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        http::capture_first(WAIT_LINK_PATTERN, &response)
            .map(|link| SubmissionHandle(http::resolve(&action, &link)))
            .ok_or_else(|| {
                SubmissionError::Rejected("PSIVER did not return a job page".to_string())
            })
    }

    async fn poll(&self, handle: &SubmissionHandle) -> Result<PollStatus, PollError> {
        let page = http::get_text(&self.client, &handle.0).await?;
        Ok(poll_status(&handle.0, &page))
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
        let text = decompress(&bytes)?;
        Ok(PredictionResult::new(
            PredictorKind::Psiver,
            parse_scores(&text, &self.residues)?,
        ))
    }
}

fn poll_status(page_url: &str, page: &str) -> PollStatus {
    if !page.contains(RESULT_MARKER) {
        return PollStatus::Pending;
    }
    match http::links(page).into_iter().find(|l| l.ends_with(".gz")) {
        Some(link) => PollStatus::Ready(ResultLocation(http::resolve(page_url, &link))),
        None => PollStatus::Failed("finished job page has no result archive".to_string()),
    }
}

fn decompress(bytes: &[u8]) -> Result<String, ParseError> {
    let mut text = String::new();
    GzDecoder::new(bytes)
        .read_to_string(&mut text)
        .map_err(ParseError::Read)?;
    Ok(text)
}

/// Parses the decompressed PSIVER result. Only rows tagged `PRED` carry residue scores;
/// the trailer length varies between jobs and is ignored.
///
/// The second column is the 1-based position in the submitted sequence. It is mapped back to
/// the PDB residue number through `residues`, the chain's residue numbers in sequence order.
pub fn parse_scores(text: &str, residues: &[isize]) -> Result<Vec<ResidueScore>, ParseError> {
    let mut scores = Vec::new();
    for (i, line) in text.lines().enumerate().skip(HEADER_ROWS) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.first() != Some(&"PRED") {
            continue;
        }
        let line_number = i + 1;
        if fields.len() <= SCORE_COLUMN {
            return Err(ParseError::Malformed {
                line: line_number,
                message: format!("expected {} columns", SCORE_COLUMN + 1),
            });
        }
        let position = fields[1].parse::<usize>().map_err(|_| ParseError::Malformed {
            line: line_number,
            message: format!("invalid sequence position '{}'", fields[1]),
        })?;
        let residue = sequence_residue(residues, position, line_number)?;
        let raw = fields[SCORE_COLUMN];
        let score = if raw.eq_ignore_ascii_case("na") {
            None
        } else {
            Some(raw.parse::<f64>().map_err(|_| ParseError::Malformed {
                line: line_number,
                message: format!("invalid score '{}'", raw),
            })?)
        };
        scores.push(ResidueScore::new(residue, score));
    }
    if scores.is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(scores)
}
