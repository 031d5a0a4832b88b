//! # Core Module
//!
//! Stateless building blocks of the consensus engine: the data models every stage
//! shares, and the readers and writers for the files a run consumes and produces.
//!
//! ## Architecture
//!
//! - **Data Models** ([`models`]) - Structure context, predictor identities, normalized
//!   predictions and the consensus annotation
//! - **File I/O** ([`io`]) - PDB reading and B-factor annotation, surface and distance
//!   tables from external geometry tools, CSV reports
//! - **Utilities** ([`utils`]) - Residue distance geometry
//!
//! Nothing in this module performs network access or holds mutable state across calls.

pub mod io;
pub mod models;
pub mod utils;
