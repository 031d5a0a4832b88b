use super::job::JobStage;
use crate::core::models::predictor::PredictorKind;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum Progress {
    PhaseStart { name: &'static str },
    PhaseFinish,

    JobStarted { predictor: PredictorKind },
    StageEntered { predictor: PredictorKind, stage: JobStage },
    PollPending { predictor: PredictorKind, remaining: u32 },
    JobFinished { predictor: PredictorKind, success: bool },

    Message(String),
}

pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;

/// Fan-out sink for progress events. Cloned into every predictor task, so the callback must
/// tolerate concurrent calls.
#[derive(Clone, Default)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}
