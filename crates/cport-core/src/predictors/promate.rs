use super::http::{self, PROMATE_URL};
use crate::core::io::pdb::PdbStructure;
use crate::core::models::prediction::{PredictionResult, ResidueScore};
use crate::core::models::predictor::PredictorKind;
use crate::core::models::structure::StructureContext;
use crate::engine::backend::{PollStatus, PredictorBackend, ResultLocation, SubmissionHandle};
use crate::engine::error::{ParseError, PollError, SubmissionError};
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use tracing::debug;

const RESULT_FILE: &str = "BSFout.AA.full.pdb";

/// ProMate receives the structure itself and returns it with per-atom interface
/// likelihoods in the B-factor column.
#[derive(Debug, Clone)]
pub struct ProMateBackend {
    client: Client,
    chain_id: char,
}

impl ProMateBackend {
    pub fn new(client: Client, context: &StructureContext) -> Self {
        Self {
            client,
            chain_id: context.chain_id(),
        }
    }
}

impl PredictorBackend for ProMateBackend {
    fn predictor(&self) -> PredictorKind {
        PredictorKind::ProMate
    }

    async fn submit(&self, context: &StructureContext) -> Result<SubmissionHandle, SubmissionError> {
        if context.source().is_empty() {
            return Err(SubmissionError::MissingInput("ProMate requires the structure file"));
        }
        let upload = Part::text(context.source().to_string())
            .file_name(format!("{}.pdb", context.structure_id()))
            .mime_str("text/plain")?;
        let form = Form::new()
            .part("fileup", upload)
            .text("pdbId", "dmmy")
            .text("chain", self.chain_id.to_string())
            .text("scConf", "1")
            .text("sc_init", "0")
            .text("outFormat", "cbOutAAFull");

        let response = self
            .client
            .post(PROMATE_URL)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;
        let final_url = response.url().to_string();
        let body = response.text().await?;

        if !body.contains("href") {
            return Err(SubmissionError::Rejected(
                "ProMate did not accept the structure".to_string(),
            ));
        }
        let results = format!("{}/{}", http::parent_url(&final_url), RESULT_FILE);
        debug!(%results, "ProMate job accepted");
        Ok(SubmissionHandle(results))
    }

    async fn poll(&self, handle: &SubmissionHandle) -> Result<PollStatus, PollError> {
        let response = self.client.get(&handle.0).send().await?;
        if !response.status().is_success() {
            return Ok(PollStatus::Pending);
        }
        let body = response.text().await?;
        if body.lines().any(|l| l.starts_with("ATOM")) {
            Ok(PollStatus::Ready(ResultLocation(handle.0.clone())))
        } else {
            Ok(PollStatus::Pending)
        }
    }

    async fn fetch_and_parse(&self, location: &ResultLocation) -> Result<PredictionResult, ParseError> {
        let text = http::get_text(&self.client, &location.0).await?;
        parse_structure(text, self.chain_id)
    }
}

/// Reads per-residue scores from the B-factors of the returned structure, keeping the
/// highest value over each residue's atoms. The structure is kept for the annotated output.
pub fn parse_structure(text: String, chain_id: char) -> Result<PredictionResult, ParseError> {
    let structure =
        PdbStructure::parse(text).map_err(|e| ParseError::UnexpectedFormat(e.to_string()))?;
    let scores: Vec<ResidueScore> = structure
        .residue_b_factors(chain_id)
        .into_iter()
        .map(|(residue, score)| ResidueScore::new(residue, score))
        .collect();
    if scores.is_empty() {
        return Err(ParseError::UnexpectedFormat(format!(
            "returned structure has no chain '{}'",
            chain_id
        )));
    }
    Ok(PredictionResult::new(PredictorKind::ProMate, scores).with_structure(structure.text().to_string()))
}
