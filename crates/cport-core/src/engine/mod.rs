//! # Engine Module
//!
//! Stateful logic of a consensus run: driving remote predictors to completion and turning
//! their raw scores into one active/passive classification of the target chain.
//!
//! ## Architecture
//!
//! - **Backend Contract** ([`backend`]) - The four-operation capability trait every predictor
//!   implements, plus the opaque submission and result tokens
//! - **Job Lifecycle** ([`job`]) - `JobRunner`, an explicit submit/poll/fetch state machine with
//!   a bounded retry budget
//! - **Fan-out/Fan-in** ([`orchestrator`]) - One concurrent job per backend joined behind a
//!   single barrier
//! - **Cutoffs** ([`threshold`]) - Sensitivity-level tables and the `ThresholdCalculator`
//! - **Consensus** ([`aggregation`]) - Exposure filtering, the proximity rule and the merge
//! - **Configuration** ([`config`]) - Run parameters and their builder
//! - **Progress Monitoring** ([`progress`]) - Event callbacks for front ends
//! - **Error Handling** ([`error`]) - Per-stage failures and the aggregated `EngineError`
//!
//! Failures of individual predictors are values, carried in each job's outcome. The only
//! error that aborts a run is `EngineError::NoPredictorsAvailable`.

pub mod aggregation;
pub mod backend;
pub mod config;
pub mod error;
pub mod job;
pub mod orchestrator;
pub mod progress;
pub mod threshold;
