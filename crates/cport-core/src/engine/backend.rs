use super::error::{ParseError, PollError, SubmissionError};
use crate::core::models::prediction::PredictionResult;
use crate::core::models::predictor::PredictorKind;
use crate::core::models::structure::StructureContext;
use std::fmt;
use std::future::Future;

/// Opaque token returned by a backend at submission, used to poll for completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionHandle(pub String);

/// Opaque token identifying where finished results can be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultLocation(pub String);

impl fmt::Display for SubmissionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ResultLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    Pending,
    Ready(ResultLocation),
    Failed(String),
}

/// The capability contract every predictor backend fulfils.
///
/// A backend only knows how to talk to its service. Retry budgets, sleeping and failure
/// containment belong to [`JobRunner`](super::job::JobRunner).
pub trait PredictorBackend: Send + Sync {
    fn predictor(&self) -> PredictorKind;

    fn submit(
        &self,
        context: &StructureContext,
    ) -> impl Future<Output = Result<SubmissionHandle, SubmissionError>> + Send;

    /// Must not sleep; one call is one attempt.
    fn poll(
        &self,
        handle: &SubmissionHandle,
    ) -> impl Future<Output = Result<PollStatus, PollError>> + Send;

    fn fetch_and_parse(
        &self,
        location: &ResultLocation,
    ) -> impl Future<Output = Result<PredictionResult, ParseError>> + Send;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::core::models::prediction::ResidueScore;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Clone)]
    pub(crate) enum Script {
        RejectSubmission,
        /// Pending for the given number of polls, then ready.
        ReadyAfter(u32),
        NeverReady,
        RemoteFailure,
        Malformed,
        Panic,
    }

    /// Backend with scripted responses for engine tests.
    pub(crate) struct ScriptedBackend {
        pub predictor: PredictorKind,
        pub script: Script,
        pub scores: Vec<ResidueScore>,
        pub polls: AtomicU32,
    }

    impl ScriptedBackend {
        pub fn new(predictor: PredictorKind, script: Script) -> Self {
            Self {
                predictor,
                script,
                scores: vec![ResidueScore::new(1, Some(0.9))],
                polls: AtomicU32::new(0),
            }
        }

        pub fn with_scores(mut self, scores: Vec<ResidueScore>) -> Self {
            self.scores = scores;
            self
        }
    }

    impl PredictorBackend for ScriptedBackend {
        fn predictor(&self) -> PredictorKind {
            self.predictor
        }

        async fn submit(
            &self,
            _context: &StructureContext,
        ) -> Result<SubmissionHandle, SubmissionError> {
            match self.script {
                Script::RejectSubmission => {
                    Err(SubmissionError::Rejected("invalid chain".to_string()))
                }
                Script::Panic => panic!("backend exploded"),
                _ => Ok(SubmissionHandle(format!("job-{}", self.predictor.key()))),
            }
        }

        async fn poll(&self, _handle: &SubmissionHandle) -> Result<PollStatus, PollError> {
            let seen = self.polls.fetch_add(1, Ordering::SeqCst);
            match self.script {
                Script::ReadyAfter(n) if seen >= n => {
                    Ok(PollStatus::Ready(ResultLocation("results".to_string())))
                }
                Script::RemoteFailure => Ok(PollStatus::Failed("queue crashed".to_string())),
                Script::Malformed => Ok(PollStatus::Ready(ResultLocation("garbage".to_string()))),
                _ => Ok(PollStatus::Pending),
            }
        }

        async fn fetch_and_parse(
            &self,
            location: &ResultLocation,
        ) -> Result<PredictionResult, ParseError> {
            if location.0 == "garbage" {
                return Err(ParseError::Malformed {
                    line: 1,
                    message: "not a score table".to_string(),
                });
            }
            Ok(PredictionResult::new(self.predictor, self.scores.clone()))
        }
    }
}
