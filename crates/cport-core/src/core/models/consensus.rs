use super::predictor::PredictorKind;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Classification {
    Active,
    Passive,
    Neutral,
}

impl Classification {
    /// Value written to the B-factor column of the annotated structure.
    pub fn b_factor(&self) -> f64 {
        match self {
            Classification::Neutral => 0.0,
            Classification::Active => 50.0,
            Classification::Passive => 100.0,
        }
    }

    /// Cell marker used in the tabular report.
    pub fn marker(&self) -> &'static str {
        match self {
            Classification::Active => "+",
            Classification::Passive => "-",
            Classification::Neutral => "",
        }
    }
}

/// Final per-residue classification of the target chain, together with the filtered
/// votes of each predictor that contributed to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsensusAnnotation {
    residues: BTreeMap<isize, Classification>,
    votes: BTreeMap<PredictorKind, BTreeMap<isize, Classification>>,
    proximity: BTreeSet<isize>,
}

impl ConsensusAnnotation {
    pub(crate) fn new(
        residues: BTreeMap<isize, Classification>,
        votes: BTreeMap<PredictorKind, BTreeMap<isize, Classification>>,
        proximity: BTreeSet<isize>,
    ) -> Self {
        Self {
            residues,
            votes,
            proximity,
        }
    }

    pub fn get(&self, residue: isize) -> Option<Classification> {
        self.residues.get(&residue).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (isize, Classification)> + '_ {
        self.residues.iter().map(|(&r, &c)| (r, c))
    }

    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }

    pub fn residues_with(&self, class: Classification) -> BTreeSet<isize> {
        self.iter()
            .filter(|&(_, c)| c == class)
            .map(|(r, _)| r)
            .collect()
    }

    pub fn active(&self) -> BTreeSet<isize> {
        self.residues_with(Classification::Active)
    }

    pub fn passive(&self) -> BTreeSet<isize> {
        self.residues_with(Classification::Passive)
    }

    /// Predictors whose filtered votes are recorded, in canonical order.
    pub fn predictors(&self) -> impl Iterator<Item = PredictorKind> + '_ {
        self.votes.keys().copied()
    }

    /// Filtered vote of `predictor` for `residue`; `Neutral` when it cast none.
    pub fn vote(&self, predictor: PredictorKind, residue: isize) -> Classification {
        self.votes
            .get(&predictor)
            .and_then(|v| v.get(&residue))
            .copied()
            .unwrap_or(Classification::Neutral)
    }

    /// True when the residue is passive only because it lies near an active residue.
    pub fn is_proximity_passive(&self, residue: isize) -> bool {
        self.proximity.contains(&residue)
    }
}
