use super::backend::PredictorBackend;
use super::error::{EngineError, JobFailure};
use super::job::{JobOutcome, JobRunner};
use super::progress::ProgressReporter;
use crate::core::models::prediction::PredictionResult;
use crate::core::models::predictor::{PollPolicy, PredictorKind};
use crate::core::models::structure::StructureContext;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Outcomes of one run, one per configured backend, in configuration order.
#[derive(Debug)]
pub struct PredictionSet {
    outcomes: Vec<JobOutcome>,
}

impl PredictionSet {
    pub fn outcomes(&self) -> &[JobOutcome] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn successes(&self) -> impl Iterator<Item = &PredictionResult> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (PredictorKind, &JobFailure)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.predictor, e)))
    }

    /// Splits the set into successful results and failures. Fails with
    /// [`EngineError::NoPredictorsAvailable`] when nothing succeeded.
    pub fn into_results(
        self,
    ) -> Result<(Vec<PredictionResult>, Vec<(PredictorKind, JobFailure)>), EngineError> {
        let mut results = Vec::new();
        let mut failures = Vec::new();
        for outcome in self.outcomes {
            match outcome.result {
                Ok(result) => results.push(result),
                Err(failure) => failures.push((outcome.predictor, failure)),
            }
        }
        if results.is_empty() {
            return Err(EngineError::NoPredictorsAvailable {
                failures: failures
                    .iter()
                    .map(|(p, f)| (*p, f.to_string()))
                    .collect(),
            });
        }
        Ok((results, failures))
    }
}

/// Runs one [`JobRunner`] per backend concurrently and waits for all of them.
///
/// Workers share nothing but the read-only context. Each one owns the slot of its index in
/// the outcome list, so one backend's failure never cancels another's job.
#[derive(Debug, Clone, Default)]
pub struct Orchestrator {
    reporter: ProgressReporter,
}

impl Orchestrator {
    pub fn new(reporter: ProgressReporter) -> Self {
        Self { reporter }
    }

    #[instrument(skip_all, name = "orchestrator", fields(jobs = jobs.len()))]
    pub async fn run<B>(
        &self,
        jobs: Vec<(B, PollPolicy)>,
        context: Arc<StructureContext>,
    ) -> PredictionSet
    where
        B: PredictorBackend + 'static,
    {
        let mut handles = Vec::with_capacity(jobs.len());
        for (backend, policy) in jobs {
            let predictor = backend.predictor();
            let runner = JobRunner::new(backend, policy).with_reporter(self.reporter.clone());
            let context = Arc::clone(&context);
            let handle = tokio::spawn(async move { runner.run(&context).await });
            handles.push((predictor, handle));
        }
        info!("Dispatched {} predictor job(s)", handles.len());

        let mut outcomes = Vec::with_capacity(handles.len());
        for (predictor, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(join_error) => {
                    error!(backend = %predictor, "Worker task aborted: {}", join_error);
                    JobOutcome {
                        predictor,
                        result: Err(JobFailure::Crashed(join_error.to_string())),
                        polls: 0,
                        dropped: Vec::new(),
                    }
                }
            };
            outcomes.push(outcome);
        }

        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        info!(
            "{} of {} predictor(s) returned results",
            succeeded,
            outcomes.len()
        );
        PredictionSet { outcomes }
    }
}
