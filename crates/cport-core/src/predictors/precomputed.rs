use crate::core::io::report::{self, ReportError};
use crate::core::models::prediction::PredictionResult;
use crate::core::models::predictor::PredictorKind;
use crate::core::models::structure::StructureContext;
use crate::engine::backend::{PollStatus, PredictorBackend, ResultLocation, SubmissionHandle};
use crate::engine::error::{ParseError, PollError, SubmissionError};
use std::path::PathBuf;

/// Replays a `residue,score` table saved by an earlier run instead of contacting a server.
#[derive(Debug, Clone)]
pub struct PrecomputedBackend {
    predictor: PredictorKind,
    path: PathBuf,
}

impl PrecomputedBackend {
    pub fn new(predictor: PredictorKind, path: PathBuf) -> Self {
        Self { predictor, path }
    }
}

impl PredictorBackend for PrecomputedBackend {
    fn predictor(&self) -> PredictorKind {
        self.predictor
    }

    async fn submit(&self, _context: &StructureContext) -> Result<SubmissionHandle, SubmissionError> {
        if !self.path.is_file() {
            return Err(SubmissionError::Rejected(format!(
                "precomputed scores '{}' not found",
                self.path.display()
            )));
        }
        Ok(SubmissionHandle(self.path.to_string_lossy().to_string()))
    }

    async fn poll(&self, handle: &SubmissionHandle) -> Result<PollStatus, PollError> {
        Ok(PollStatus::Ready(ResultLocation(handle.0.clone())))
    }

    async fn fetch_and_parse(&self, location: &ResultLocation) -> Result<PredictionResult, ParseError> {
        let bytes = tokio::fs::read(&location.0).await.map_err(ParseError::Read)?;
        let scores = report::read_scores(bytes.as_slice()).map_err(|e| match e {
            ReportError::Io(io) => ParseError::Read(io),
            other => ParseError::UnexpectedFormat(other.to_string()),
        })?;
        if scores.is_empty() {
            return Err(ParseError::Empty);
        }
        Ok(PredictionResult::new(self.predictor, scores))
    }
}
