//! End-to-end procedures built on the engine.
//!
//! - [`predict`] - Runs the configured predictors against one chain and fuses their
//!   results into a consensus, then writes the annotated structure and reports.

pub mod predict;
