use super::backend::{PollStatus, PredictorBackend, ResultLocation, SubmissionHandle};
use super::error::{JobFailure, ParseError, PollError};
use super::progress::{Progress, ProgressReporter};
use crate::core::models::prediction::{PredictionResult, ResidueOutOfRange};
use crate::core::models::predictor::{PollPolicy, PredictorKind};
use crate::core::models::structure::StructureContext;
use std::fmt;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Submitting,
    Polling,
    Fetching,
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStage::Submitting => "submitting",
            JobStage::Polling => "polling",
            JobStage::Fetching => "fetching",
        };
        f.write_str(name)
    }
}

/// Lifecycle of one predictor job. Every transition happens in [`JobRunner::step`].
#[derive(Debug)]
pub enum JobState {
    Submitting,
    Polling {
        handle: SubmissionHandle,
        remaining: u32,
    },
    Fetching {
        location: ResultLocation,
    },
    Done(Result<PredictionResult, JobFailure>),
}

impl JobState {
    pub fn stage(&self) -> Option<JobStage> {
        match self {
            JobState::Submitting => Some(JobStage::Submitting),
            JobState::Polling { .. } => Some(JobStage::Polling),
            JobState::Fetching { .. } => Some(JobStage::Fetching),
            JobState::Done(_) => None,
        }
    }
}

/// Terminal record of one job. Exactly one is produced per configured backend.
#[derive(Debug)]
pub struct JobOutcome {
    pub predictor: PredictorKind,
    pub result: Result<PredictionResult, JobFailure>,
    /// Number of poll attempts made.
    pub polls: u32,
    /// Residues reported by the backend that are not part of the target chain.
    pub dropped: Vec<ResidueOutOfRange>,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Drives a single backend through submit, poll and fetch under a bounded retry budget.
///
/// No failure escapes as a panic or an `Err`: everything ends up in the [`JobOutcome`].
pub struct JobRunner<B> {
    backend: B,
    policy: PollPolicy,
    reporter: ProgressReporter,
    polls: u32,
    dropped: Vec<ResidueOutOfRange>,
}

impl<B: PredictorBackend> JobRunner<B> {
    pub fn new(backend: B, policy: PollPolicy) -> Self {
        Self {
            backend,
            policy,
            reporter: ProgressReporter::new(),
            polls: 0,
            dropped: Vec::new(),
        }
    }

    pub fn with_reporter(mut self, reporter: ProgressReporter) -> Self {
        self.reporter = reporter;
        self
    }

    #[instrument(skip_all, name = "job", fields(backend = %self.backend.predictor()))]
    pub async fn run(mut self, context: &StructureContext) -> JobOutcome {
        let predictor = self.backend.predictor();
        info!(
            "Starting job (poll every {:?}, at most {} polls)",
            self.policy.interval, self.policy.retries
        );
        self.reporter.report(Progress::JobStarted { predictor });
        self.enter(JobStage::Submitting);

        let mut state = JobState::Submitting;
        let result = loop {
            match self.step(state, context).await {
                JobState::Done(result) => break result,
                next => state = next,
            }
        };

        match &result {
            Ok(prediction) => info!(
                polls = self.polls,
                residues = prediction.scores.len(),
                "Job finished successfully"
            ),
            Err(failure) => error!(
                stage = %failure.stage().map_or("-".to_string(), |s| s.to_string()),
                polls = self.polls,
                "Job failed: {}",
                failure
            ),
        }
        self.reporter.report(Progress::JobFinished {
            predictor,
            success: result.is_ok(),
        });

        JobOutcome {
            predictor,
            result,
            polls: self.polls,
            dropped: self.dropped,
        }
    }

    /// Performs exactly one transition of the state machine.
    pub async fn step(&mut self, state: JobState, context: &StructureContext) -> JobState {
        match state {
            JobState::Submitting => match self.backend.submit(context).await {
                Ok(handle) => {
                    debug!(%handle, "Submission accepted");
                    self.enter(JobStage::Polling);
                    JobState::Polling {
                        handle,
                        remaining: self.policy.retries,
                    }
                }
                Err(e) => {
                    warn!(stage = %JobStage::Submitting, "Submission rejected: {}", e);
                    JobState::Done(Err(JobFailure::Submission(e)))
                }
            },
            JobState::Polling { handle, remaining } => {
                self.polls += 1;
                match self.backend.poll(&handle).await {
                    Ok(PollStatus::Ready(location)) => {
                        debug!(%location, polls = self.polls, "Results ready");
                        self.enter(JobStage::Fetching);
                        JobState::Fetching { location }
                    }
                    Ok(PollStatus::Failed(reason)) => {
                        warn!(stage = %JobStage::Polling, polls = self.polls, "Server reported failure: {}", reason);
                        JobState::Done(Err(JobFailure::RemoteFailed(reason)))
                    }
                    Ok(PollStatus::Pending) => self.wait(handle, remaining).await,
                    Err(e) => {
                        self.log_transient(&e);
                        self.wait(handle, remaining).await
                    }
                }
            }
            JobState::Fetching { location } => {
                match self.backend.fetch_and_parse(&location).await {
                    Ok(result) => self.finish(result, context),
                    Err(e) => {
                        warn!(stage = %JobStage::Fetching, "Could not parse results: {}", e);
                        JobState::Done(Err(JobFailure::Parse(e)))
                    }
                }
            }
            done @ JobState::Done(_) => done,
        }
    }

    async fn wait(&mut self, handle: SubmissionHandle, remaining: u32) -> JobState {
        let remaining = remaining.saturating_sub(1);
        if remaining == 0 {
            // One sleep separates consecutive polls.
            let waited = self.policy.interval * self.polls.saturating_sub(1);
            warn!(
                stage = %JobStage::Polling,
                polls = self.polls,
                "Server not responding, giving up after {:?}",
                waited
            );
            return JobState::Done(Err(JobFailure::PollTimeout {
                attempts: self.polls,
                waited,
            }));
        }
        debug!(remaining, "Results not ready, waiting {:?}", self.policy.interval);
        self.reporter.report(Progress::PollPending {
            predictor: self.backend.predictor(),
            remaining,
        });
        tokio::time::sleep(self.policy.interval).await;
        JobState::Polling { handle, remaining }
    }

    fn finish(&mut self, mut result: PredictionResult, context: &StructureContext) -> JobState {
        let predictor = self.backend.predictor();
        if result.predictor != predictor {
            warn!(
                reported = %result.predictor,
                "Backend labelled its result with another predictor, relabelling"
            );
            result.predictor = predictor;
        }

        let dropped = result.retain_known(context);
        for record in &dropped {
            warn!(residue = record.residue, "{}", record);
        }
        self.dropped = dropped;

        if result.scores.is_empty() {
            warn!(stage = %JobStage::Fetching, "No residue of the target chain in the results");
            return JobState::Done(Err(JobFailure::Parse(ParseError::Empty)));
        }
        JobState::Done(Ok(result))
    }

    fn enter(&self, stage: JobStage) {
        self.reporter.report(Progress::StageEntered {
            predictor: self.backend.predictor(),
            stage,
        });
    }

    fn log_transient(&self, error: &PollError) {
        warn!(
            stage = %JobStage::Polling,
            polls = self.polls,
            "Poll attempt failed, will retry: {}",
            error
        );
    }
}
