use thiserror::Error;

use super::config::ConfigError;
use super::job::JobStage;
use super::threshold::ThresholdTableError;
use crate::core::io::distances::DistanceLoadError;
use crate::core::io::pdb::PdbError;
use crate::core::io::report::ReportError;
use crate::core::io::surface::SurfaceLoadError;
use crate::core::models::predictor::PredictorKind;
use crate::core::models::structure::StructureError;
use std::time::Duration;

/// The remote service refused the query outright. Never retried.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Request rejected by the server: {0}")]
    Rejected(String),

    #[error("Required input is missing: {0}")]
    MissingInput(&'static str),

    #[error("Network error during submission: {0}")]
    Transport(#[from] reqwest::Error),
}

/// A single poll could not be completed. Treated as "not yet ready".
#[derive(Debug, Error)]
pub enum PollError {
    #[error("Network error while polling: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected status page: {0}")]
    UnexpectedPage(String),
}

/// Results were fetched but are not in the expected shape.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Network error while fetching results: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to read result data: {0}")]
    Read(#[source] std::io::Error),

    #[error("Result set is empty")]
    Empty,

    #[error("Malformed result on line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error("Unexpected result format: {0}")]
    UnexpectedFormat(String),
}

/// Terminal failure of one predictor job. Contained at the job level; the run continues
/// with the remaining predictors.
#[derive(Debug, Error)]
pub enum JobFailure {
    #[error("Rejected at submission: {0}")]
    Submission(#[source] SubmissionError),

    /// `waited` is the time slept between the polls, `interval * (attempts - 1)`.
    #[error("Server not responding after {attempts} polls ({waited:?})")]
    PollTimeout { attempts: u32, waited: Duration },

    #[error("Server reported the job as failed: {0}")]
    RemoteFailed(String),

    #[error("Could not parse results: {0}")]
    Parse(#[source] ParseError),

    #[error("Worker task aborted: {0}")]
    Crashed(String),
}

impl JobFailure {
    /// Lifecycle stage in which the failure occurred.
    pub fn stage(&self) -> Option<JobStage> {
        match self {
            JobFailure::Submission(_) => Some(JobStage::Submitting),
            JobFailure::PollTimeout { .. } | JobFailure::RemoteFailed(_) => Some(JobStage::Polling),
            JobFailure::Parse(_) => Some(JobStage::Fetching),
            JobFailure::Crashed(_) => None,
        }
    }
}

fn describe_failures(failures: &[(PredictorKind, String)]) -> String {
    failures
        .iter()
        .map(|(p, reason)| format!("{}: {}", p, reason))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("No predictors available: every configured predictor failed ({})", describe_failures(.failures))]
    NoPredictorsAvailable {
        failures: Vec<(PredictorKind, String)>,
    },

    #[error("No surface exposure data for chain {chain_id}: residues of unknown exposure cannot vote")]
    MissingSurface { chain_id: char },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid structure: {0}")]
    Structure(#[from] StructureError),

    #[error("Structure file error: {0}")]
    Pdb(#[from] PdbError),

    #[error("Surface data error: {0}")]
    Surface(#[from] SurfaceLoadError),

    #[error("Distance data error: {0}")]
    Distances(#[from] DistanceLoadError),

    #[error("Threshold table error: {0}")]
    Thresholds(#[from] ThresholdTableError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}
