//! # CPORT Core Library
//!
//! A consensus engine for protein-protein interface prediction. It submits one chain to
//! several independent remote predictors, waits for them concurrently under bounded retry
//! budgets, and fuses whatever comes back into a single active/passive classification.
//!
//! ## Architectural Philosophy
//!
//! - **[`core`]: The Foundation.** Stateless data models (`StructureContext`,
//!   `PredictionResult`, `ConsensusAnnotation`) and file I/O.
//!
//! - **[`engine`]: The Logic Core.** The backend capability contract, the per-job state
//!   machine, concurrent orchestration, sensitivity cutoffs and consensus aggregation.
//!
//! - **[`predictors`]: The Adapters.** One backend per remote service, each a variant of a
//!   single tagged enum.
//!
//! - **[`workflows`]: The Public API.** Ties everything together into the `predict`
//!   procedure used by front ends.

pub mod core;
pub mod engine;
pub mod predictors;
pub mod workflows;
