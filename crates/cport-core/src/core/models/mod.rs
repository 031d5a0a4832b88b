//! # Models Module
//!
//! Plain data types shared by every stage of a consensus run.
//!
//! - [`structure`] - The immutable [`structure::StructureContext`] describing the target chain,
//!   its surface exposure and its sparse residue distance table.
//! - [`predictor`] - Identities of the supported remote predictors and their defaults.
//! - [`prediction`] - The normalized per-residue output of one predictor.
//! - [`consensus`] - The final active/passive/neutral annotation.

pub mod consensus;
pub mod prediction;
pub mod predictor;
pub mod structure;
