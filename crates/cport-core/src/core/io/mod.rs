//! Provides input/output functionality for the files a consensus run reads and writes.
//!
//! The structure reader and annotator work on fixed-column PDB text, while the
//! surface and distance loaders accept the CSV output of external geometry tools.
//! Reports are written as CSV tables.

pub mod distances;
pub mod pdb;
pub mod report;
pub mod surface;
