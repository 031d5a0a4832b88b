use super::http::{self, PREDUS2_RESULTS_URL, PREDUS2_URL};
use crate::core::models::prediction::{PredictionResult, ResidueScore};
use crate::core::models::predictor::PredictorKind;
use crate::core::models::structure::StructureContext;
use crate::engine::backend::{PollStatus, PredictorBackend, ResultLocation, SubmissionHandle};
use crate::engine::error::{ParseError, PollError, SubmissionError};
use reqwest::Client;
use tracing::debug;

const RESULT_MARKER: &str = "PredUs2.0 result file:";
const RESULT_PAGE_PATTERN: &str = r#"Result page:.*?\n.*?href="(.*?)">Click to access results"#;

/// PredUs2 looks structures up in the PDB archive, so it only accepts a PDB code and a chain.
#[derive(Debug, Clone)]
pub struct Predus2Backend {
    client: Client,
    pdb_code: Option<String>,
    chain_id: char,
}

impl Predus2Backend {
    pub fn new(client: Client, context: &StructureContext) -> Self {
        Self {
            client,
            pdb_code: context.pdb_code().map(str::to_ascii_lowercase),
            chain_id: context.chain_id(),
        }
    }

    fn result_url(&self, pdb_code: &str) -> String {
        format!(
            "{}{}_{}.pd2.txt",
            PREDUS2_RESULTS_URL,
            pdb_code,
            self.chain_id.to_ascii_uppercase()
        )
    }
}

impl PredictorBackend for Predus2Backend {
    fn predictor(&self) -> PredictorKind {
        PredictorKind::Predus2
    }

    async fn submit(&self, _context: &StructureContext) -> Result<SubmissionHandle, SubmissionError> {
        let pdb_code = self
            .pdb_code
            .as_deref()
            .ok_or(SubmissionError::MissingInput("PredUs2 requires a PDB identifier"))?;

        let form_page = http::get_text(&self.client, PREDUS2_URL).await?;
        let action = http::form_action(&form_page)
            .map(|a| http::resolve(PREDUS2_URL, &a))
            .unwrap_or_else(|| PREDUS2_URL.to_string());
        debug!(%action, pdb_code, "Submitting to PredUs2");

        let chain = self.chain_id.to_string();
        let response = self
            .client
            .post(&action)
            .form(&[("pdbid", pdb_code), ("chain", chain.as_str())])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        extract_result_page(&response)
            .map(|page| SubmissionHandle(http::resolve(&action, &page)))
            .ok_or_else(|| {
                SubmissionError::Rejected("no result page link in the PredUs2 response".to_string())
            })
    }

    async fn poll(&self, handle: &SubmissionHandle) -> Result<PollStatus, PollError> {
        let page = http::get_text(&self.client, &handle.0).await?;
        if !page.contains(RESULT_MARKER) {
            return Ok(PollStatus::Pending);
        }
        match self.pdb_code.as_deref() {
            Some(code) => Ok(PollStatus::Ready(ResultLocation(self.result_url(code)))),
            None => Ok(PollStatus::Failed("job has no PDB identifier".to_string())),
        }
    }

    async fn fetch_and_parse(&self, location: &ResultLocation) -> Result<PredictionResult, ParseError> {
        let text = http::get_text(&self.client, &location.0).await?;
        Ok(PredictionResult::new(PredictorKind::Predus2, parse_scores(&text)?))
    }
}

fn extract_result_page(page: &str) -> Option<String> {
    http::capture_first(RESULT_PAGE_PATTERN, page)
}

/// Parses the whitespace separated `Residue Score` table PredUs2 returns. The first line is
/// the header.
pub fn parse_scores(text: &str) -> Result<Vec<ResidueScore>, ParseError> {
    let mut scores = Vec::new();
    for (i, line) in text.lines().enumerate().skip(1) {
        let mut fields = line.split_whitespace();
        let (Some(residue), Some(score)) = (fields.next(), fields.next()) else {
            if line.trim().is_empty() {
                continue;
            }
            return Err(ParseError::Malformed {
                line: i + 1,
                message: format!("expected 'residue score', found '{}'", line.trim()),
            });
        };
        let residue = residue.parse::<isize>().map_err(|_| ParseError::Malformed {
            line: i + 1,
            message: format!("invalid residue number '{}'", residue),
        })?;
        let score = if score.eq_ignore_ascii_case("na") {
            None
        } else {
            Some(score.parse::<f64>().map_err(|_| ParseError::Malformed {
                line: i + 1,
                message: format!("invalid score '{}'", score),
            })?)
        };
        scores.push(ResidueScore::new(residue, score));
    }
    if scores.is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(scores)
}
