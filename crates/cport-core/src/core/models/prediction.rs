use super::predictor::PredictorKind;
use super::structure::StructureContext;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One residue's entry in a predictor's output. `score` is `None` when the predictor
/// reported no usable value (NA) for the residue.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResidueScore {
    pub residue: isize,
    pub score: Option<f64>,
}

impl ResidueScore {
    pub fn new(residue: isize, score: Option<f64>) -> Self {
        Self { residue, score }
    }
}

/// A residue reported by a predictor that does not exist in the target chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResidueOutOfRange {
    pub predictor: PredictorKind,
    pub residue: isize,
}

impl fmt::Display for ResidueOutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} reported residue {} which is not part of the target chain",
            self.predictor, self.residue
        )
    }
}

/// Normalized output of one successful predictor run.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub predictor: PredictorKind,
    pub scores: Vec<ResidueScore>,
    /// Structure file returned by the predictor, if it returns one.
    pub structure: Option<String>,
}

impl PredictionResult {
    pub fn new(predictor: PredictorKind, scores: Vec<ResidueScore>) -> Self {
        Self {
            predictor,
            scores,
            structure: None,
        }
    }

    pub fn with_structure(mut self, structure: String) -> Self {
        self.structure = Some(structure);
        self
    }

    pub fn scored(&self) -> impl Iterator<Item = (isize, f64)> + '_ {
        self.scores
            .iter()
            .filter_map(|s| s.score.map(|v| (s.residue, v)))
    }

    /// Drops residues that are not in `context`, returning one record per dropped entry.
    pub fn retain_known(&mut self, context: &StructureContext) -> Vec<ResidueOutOfRange> {
        let predictor = self.predictor;
        let mut dropped = Vec::new();
        self.scores.retain(|s| {
            let known = context.contains(s.residue);
            if !known {
                dropped.push(ResidueOutOfRange {
                    predictor,
                    residue: s.residue,
                });
            }
            known
        });
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retain_known_reports_and_drops_foreign_residues() {
        let ctx = StructureContext::builder("t", 'A')
            .residues([(1, "ALA"), (2, "GLY")])
            .build()
            .unwrap();
        let mut result = PredictionResult::new(
            PredictorKind::Psiver,
            vec![
                ResidueScore::new(1, Some(0.4)),
                ResidueScore::new(7, Some(0.9)),
                ResidueScore::new(2, None),
            ],
        );

        let dropped = result.retain_known(&ctx);

        assert_eq!(
            dropped,
            vec![ResidueOutOfRange {
                predictor: PredictorKind::Psiver,
                residue: 7
            }]
        );
        assert_eq!(result.scores.len(), 2);
        assert_eq!(result.scored().collect::<Vec<_>>(), vec![(1, 0.4)]);
    }
}
