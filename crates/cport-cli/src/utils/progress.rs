use cport::core::models::predictor::PredictorKind;
use cport::engine::progress::{Progress, ProgressCallback};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const SPINNER_TICK_MS: u64 = 80;

#[derive(Default)]
struct BarState {
    phase: Option<&'static str>,
    jobs: HashMap<PredictorKind, ProgressBar>,
}

/// Renders engine progress as one spinner per running predictor.
#[derive(Clone)]
pub struct CliProgressHandler {
    mp: MultiProgress,
    state: Arc<Mutex<BarState>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    fn with_draw_target(target: ProgressDrawTarget) -> Self {
        Self {
            mp: MultiProgress::with_draw_target(target),
            state: Arc::new(Mutex::new(BarState::default())),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback {
        let mp = self.mp.clone();
        let state = Arc::clone(&self.state);

        Arc::new(move |progress: Progress| {
            let Ok(mut state) = state.lock() else {
                warn!("Progress state mutex was poisoned. Cannot update progress.");
                return;
            };

            match progress {
                Progress::PhaseStart { name } => {
                    state.phase = Some(name);
                }
                Progress::PhaseFinish => {
                    if let Some(name) = state.phase.take() {
                        mp.println(format!("✓ {}", name)).ok();
                    }
                }
                Progress::JobStarted { predictor } => {
                    let pb = mp.add(ProgressBar::new_spinner());
                    pb.set_style(Self::spinner_style());
                    pb.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
                    pb.set_message(format!("{}: starting", predictor));
                    if let Some(old) = state.jobs.insert(predictor, pb) {
                        old.finish_and_clear();
                    }
                }
                Progress::StageEntered { predictor, stage } => {
                    if let Some(pb) = state.jobs.get(&predictor) {
                        pb.set_message(format!("{}: {}", predictor, stage));
                    }
                }
                Progress::PollPending {
                    predictor,
                    remaining,
                } => {
                    if let Some(pb) = state.jobs.get(&predictor) {
                        pb.set_message(format!(
                            "{}: waiting for results ({} attempt(s) left)",
                            predictor, remaining
                        ));
                    }
                }
                Progress::JobFinished { predictor, success } => {
                    if let Some(pb) = state.jobs.get(&predictor) {
                        pb.disable_steady_tick();
                        if success {
                            pb.finish_with_message(format!("✓ {}", predictor));
                        } else {
                            pb.finish_with_message(format!("✗ {} failed", predictor));
                        }
                    }
                }
                Progress::Message(msg) => {
                    mp.println(format!("  {}", msg)).ok();
                }
            }
        })
    }

    /// Stops every spinner that is still ticking.
    pub fn finish(&self) {
        if let Ok(state) = self.state.lock() {
            for pb in state.jobs.values().filter(|pb| !pb.is_finished()) {
                pb.abandon();
            }
        }
    }

    pub fn download_bar(&self) -> ProgressBar {
        let pb = self.mp.add(ProgressBar::new(0));
        pb.set_style(Self::download_style());
        pb
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} [{elapsed}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn download_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cport::engine::job::JobStage;
    use std::thread;

    fn hidden() -> CliProgressHandler {
        CliProgressHandler::with_draw_target(ProgressDrawTarget::hidden())
    }

    fn message(handler: &CliProgressHandler, predictor: PredictorKind) -> String {
        handler.state.lock().unwrap().jobs[&predictor].message()
    }

    #[test]
    fn handler_initializes_in_a_clean_state() {
        let handler = hidden();
        let state = handler.state.lock().unwrap();
        assert!(state.phase.is_none());
        assert!(state.jobs.is_empty());
    }

    #[test]
    fn callback_tracks_each_predictor_separately() {
        let handler = hidden();
        let callback = handler.get_callback();

        callback(Progress::PhaseStart { name: "Prediction" });
        callback(Progress::JobStarted {
            predictor: PredictorKind::Psiver,
        });
        callback(Progress::JobStarted {
            predictor: PredictorKind::ProMate,
        });
        callback(Progress::StageEntered {
            predictor: PredictorKind::Psiver,
            stage: JobStage::Polling,
        });
        assert_eq!(message(&handler, PredictorKind::Psiver), "PSIVER: polling");
        assert_eq!(message(&handler, PredictorKind::ProMate), "ProMate: starting");

        callback(Progress::PollPending {
            predictor: PredictorKind::Psiver,
            remaining: 4,
        });
        assert_eq!(
            message(&handler, PredictorKind::Psiver),
            "PSIVER: waiting for results (4 attempt(s) left)"
        );

        callback(Progress::JobFinished {
            predictor: PredictorKind::Psiver,
            success: true,
        });
        callback(Progress::JobFinished {
            predictor: PredictorKind::ProMate,
            success: false,
        });
        {
            let state = handler.state.lock().unwrap();
            assert!(state.jobs.values().all(|pb| pb.is_finished()));
        }
        assert_eq!(message(&handler, PredictorKind::Psiver), "✓ PSIVER");
        assert_eq!(message(&handler, PredictorKind::ProMate), "✗ ProMate failed");

        callback(Progress::PhaseFinish);
        assert!(handler.state.lock().unwrap().phase.is_none());
    }

    #[test]
    fn events_for_unknown_jobs_are_ignored() {
        let handler = hidden();
        let callback = handler.get_callback();
        callback(Progress::StageEntered {
            predictor: PredictorKind::Predus2,
            stage: JobStage::Fetching,
        });
        callback(Progress::JobFinished {
            predictor: PredictorKind::Predus2,
            success: true,
        });
        assert!(handler.state.lock().unwrap().jobs.is_empty());
    }

    #[test]
    fn finish_stops_running_spinners() {
        let handler = hidden();
        let callback = handler.get_callback();
        callback(Progress::JobStarted {
            predictor: PredictorKind::Predus2,
        });
        handler.finish();
        assert!(handler.state.lock().unwrap().jobs[&PredictorKind::Predus2].is_finished());
    }

    #[test]
    fn callback_is_thread_safe() {
        let handler = hidden();
        let callback = handler.get_callback();

        let workers: Vec<_> = PredictorKind::ALL
            .into_iter()
            .map(|predictor| {
                let callback = Arc::clone(&callback);
                thread::spawn(move || {
                    callback(Progress::JobStarted { predictor });
                    callback(Progress::JobFinished {
                        predictor,
                        success: true,
                    });
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let state = handler.state.lock().unwrap();
        assert_eq!(state.jobs.len(), PredictorKind::ALL.len());
        assert!(state.jobs.values().all(|pb| pb.is_finished()));
    }
}
