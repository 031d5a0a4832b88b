//! Concrete predictor backends.
//!
//! Each remote service is one variant of [`Backend`], all fulfilling the
//! [`PredictorBackend`] contract. Adding a predictor means adding a module and a variant;
//! the job runner and orchestrator stay untouched.

pub mod http;
pub mod precomputed;
pub mod predictprotein;
pub mod predus2;
pub mod promate;
pub mod psiver;

use crate::core::models::prediction::PredictionResult;
use crate::core::models::predictor::PredictorKind;
use crate::core::models::structure::StructureContext;
use crate::engine::backend::{PollStatus, PredictorBackend, ResultLocation, SubmissionHandle};
use crate::engine::config::{PredictionSource, PredictorSettings};
use crate::engine::error::{ParseError, PollError, SubmissionError};
use precomputed::PrecomputedBackend;
use predictprotein::PredictProteinBackend;
use predus2::Predus2Backend;
use promate::ProMateBackend;
use psiver::PsiverBackend;
use reqwest::Client;

#[derive(Debug, Clone)]
pub enum Backend {
    Predus2(Predus2Backend),
    Psiver(PsiverBackend),
    ProMate(ProMateBackend),
    PredictProtein(PredictProteinBackend),
    Precomputed(PrecomputedBackend),
}

impl Backend {
    /// Builds the backend for one configured predictor.
    pub fn from_settings(
        settings: &PredictorSettings,
        context: &StructureContext,
        client: &Client,
    ) -> Self {
        match (&settings.source, settings.kind) {
            (PredictionSource::Precomputed(path), kind) => {
                Backend::Precomputed(PrecomputedBackend::new(kind, path.clone()))
            }
            (PredictionSource::Remote, PredictorKind::Predus2) => {
                Backend::Predus2(Predus2Backend::new(client.clone(), context))
            }
            (PredictionSource::Remote, PredictorKind::Psiver) => {
                Backend::Psiver(PsiverBackend::new(client.clone(), context))
            }
            (PredictionSource::Remote, PredictorKind::ProMate) => {
                Backend::ProMate(ProMateBackend::new(client.clone(), context))
            }
            (PredictionSource::Remote, PredictorKind::PredictProtein) => {
                Backend::PredictProtein(PredictProteinBackend::new(client.clone(), context))
            }
        }
    }
}

impl PredictorBackend for Backend {
    fn predictor(&self) -> PredictorKind {
        match self {
            Backend::Predus2(b) => b.predictor(),
            Backend::Psiver(b) => b.predictor(),
            Backend::ProMate(b) => b.predictor(),
            Backend::PredictProtein(b) => b.predictor(),
            Backend::Precomputed(b) => b.predictor(),
        }
    }

    async fn submit(&self, context: &StructureContext) -> Result<SubmissionHandle, SubmissionError> {
        match self {
            Backend::Predus2(b) => b.submit(context).await,
            Backend::Psiver(b) => b.submit(context).await,
            Backend::ProMate(b) => b.submit(context).await,
            Backend::PredictProtein(b) => b.submit(context).await,
            Backend::Precomputed(b) => b.submit(context).await,
        }
    }

    async fn poll(&self, handle: &SubmissionHandle) -> Result<PollStatus, PollError> {
        match self {
            Backend::Predus2(b) => b.poll(handle).await,
            Backend::Psiver(b) => b.poll(handle).await,
            Backend::ProMate(b) => b.poll(handle).await,
            Backend::PredictProtein(b) => b.poll(handle).await,
            Backend::Precomputed(b) => b.poll(handle).await,
        }
    }

    async fn fetch_and_parse(&self, location: &ResultLocation) -> Result<PredictionResult, ParseError> {
        match self {
            Backend::Predus2(b) => b.fetch_and_parse(location).await,
            Backend::Psiver(b) => b.fetch_and_parse(location).await,
            Backend::ProMate(b) => b.fetch_and_parse(location).await,
            Backend::PredictProtein(b) => b.fetch_and_parse(location).await,
            Backend::Precomputed(b) => b.fetch_and_parse(location).await,
        }
    }
}

/// PDB residue number at 1-based `position` of a sequence submitted as FASTA. `residues` are
/// the chain's residue numbers in sequence order.
pub(crate) fn sequence_residue(
    residues: &[isize],
    position: usize,
    line: usize,
) -> Result<isize, ParseError> {
    position
        .checked_sub(1)
        .and_then(|i| residues.get(i))
        .copied()
        .ok_or_else(|| ParseError::Malformed {
            line,
            message: format!(
                "sequence position {} outside the submitted chain of {} residues",
                position,
                residues.len()
            ),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn from_settings_picks_the_matching_variant() {
        let context = StructureContext::builder("1ppe", 'E')
            .pdb_code("1ppe")
            .residue(1, "ALA")
            .build()
            .unwrap();
        let client = Client::new();

        for kind in PredictorKind::ALL {
            let backend = Backend::from_settings(&PredictorSettings::remote(kind), &context, &client);
            assert_eq!(backend.predictor(), kind);
            assert!(!matches!(backend, Backend::Precomputed(_)));
        }

        let saved = PredictorSettings::precomputed(PredictorKind::ProMate, PathBuf::from("x.csv"));
        let backend = Backend::from_settings(&saved, &context, &client);
        assert!(matches!(backend, Backend::Precomputed(_)));
        assert_eq!(backend.predictor(), PredictorKind::ProMate);
    }

    #[test]
    fn sequence_positions_are_one_based() {
        let residues = [16, 17, 18];
        assert_eq!(sequence_residue(&residues, 1, 5).unwrap(), 16);
        assert_eq!(sequence_residue(&residues, 3, 5).unwrap(), 18);
        assert!(matches!(
            sequence_residue(&residues, 0, 5),
            Err(ParseError::Malformed { line: 5, .. })
        ));
        assert!(matches!(
            sequence_residue(&residues, 4, 6),
            Err(ParseError::Malformed { line: 6, .. })
        ));
    }
}
