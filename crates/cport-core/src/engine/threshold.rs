use super::config::Sensitivity;
use crate::core::models::consensus::Classification;
use crate::core::models::prediction::PredictionResult;
use crate::core::models::predictor::{CutoffKind, PredictorKind, UnknownPredictorError};
use phf::{Map, phf_map};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Number of predictors the built-in tables are calibrated for. Each predictor missing from
/// this count lowers the effective sensitivity level by one.
pub const REFERENCE_CONSENSUS_SIZE: usize = 3;

const LEVELS: usize = Sensitivity::MAX as usize;

// (active, passive) per sensitivity level 1..=9.
static SCORE_CUTOFFS: Map<&'static str, ([f64; LEVELS], [f64; LEVELS])> = phf_map! {
    "predus2" => (
        [-0.20, -0.10, 0.00, 0.05, 0.10, 0.20, 0.30, 0.40, 0.50],
        [-0.50, -0.40, -0.30, -0.25, -0.20, -0.10, 0.00, 0.10, 0.20],
    ),
    "psiver" => (
        [0.20, 0.25, 0.30, 0.35, 0.40, 0.45, 0.50, 0.55, 0.60],
        [0.10, 0.12, 0.15, 0.18, 0.20, 0.25, 0.30, 0.35, 0.40],
    ),
};

static RANK_CUTOFFS: Map<&'static str, ([usize; LEVELS], [usize; LEVELS])> = phf_map! {
    "promate" => (
        [30, 25, 20, 17, 15, 12, 10, 8, 5],
        [50, 45, 40, 35, 30, 25, 20, 15, 10],
    ),
};

#[derive(Debug, Error)]
pub enum ThresholdTableError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error(transparent)]
    UnknownPredictor(#[from] UnknownPredictorError),
    #[error("{predictor} expects a {expected:?} cutoff table")]
    KindMismatch {
        predictor: PredictorKind,
        expected: CutoffKind,
    },
    #[error("{predictor}: active cutoff at level {level} is looser than at the level below")]
    NotMonotonic { predictor: PredictorKind, level: usize },
    #[error("{predictor}: passive cutoff at level {level} is stricter than the active cutoff")]
    PassiveStricter { predictor: PredictorKind, level: usize },
    #[error("{predictor}: invalid cutoff at level {level}")]
    InvalidValue { predictor: PredictorKind, level: usize },
    #[error("No cutoff table for {0}")]
    MissingPredictor(PredictorKind),
}

/// Nine-level cutoff table of one predictor.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CutoffTable {
    Rank {
        active: [usize; LEVELS],
        passive: [usize; LEVELS],
    },
    Score {
        active: [f64; LEVELS],
        passive: [f64; LEVELS],
    },
}

impl CutoffTable {
    pub fn kind(&self) -> CutoffKind {
        match self {
            CutoffTable::Rank { .. } => CutoffKind::Rank,
            CutoffTable::Score { .. } => CutoffKind::Score,
        }
    }

    pub fn at(&self, level: Sensitivity) -> ThresholdSpec {
        let i = level.index();
        match self {
            CutoffTable::Rank { active, passive } => ThresholdSpec::Rank {
                active: active[i],
                passive: passive[i],
            },
            CutoffTable::Score { active, passive } => ThresholdSpec::Score {
                active: active[i],
                passive: passive[i],
            },
        }
    }

    fn validate(&self, predictor: PredictorKind) -> Result<(), ThresholdTableError> {
        if self.kind() != predictor.cutoff_kind() {
            return Err(ThresholdTableError::KindMismatch {
                predictor,
                expected: predictor.cutoff_kind(),
            });
        }
        for i in 0..LEVELS {
            let level = i + 1;
            let (monotonic, passive_ok, valid) = match self {
                // Stricter levels keep fewer residues: rank cutoffs shrink.
                CutoffTable::Rank { active, passive } => (
                    i == 0 || active[i] <= active[i - 1],
                    passive[i] >= active[i],
                    active[i] >= 1,
                ),
                // Stricter levels demand higher scores.
                CutoffTable::Score { active, passive } => (
                    i == 0 || active[i] >= active[i - 1],
                    passive[i] <= active[i],
                    active[i].is_finite() && passive[i].is_finite(),
                ),
            };
            if !valid {
                return Err(ThresholdTableError::InvalidValue { predictor, level });
            }
            if !monotonic {
                return Err(ThresholdTableError::NotMonotonic { predictor, level });
            }
            if !passive_ok {
                return Err(ThresholdTableError::PassiveStricter { predictor, level });
            }
        }
        Ok(())
    }
}

/// Cutoff tables for every known predictor.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdTable {
    tables: BTreeMap<PredictorKind, CutoffTable>,
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ThresholdTable {
    pub fn builtin() -> Self {
        let tables = PredictorKind::ALL
            .iter()
            .filter_map(|&kind| {
                let table = match kind.cutoff_kind() {
                    CutoffKind::Score => SCORE_CUTOFFS
                        .get(kind.key())
                        .map(|&(active, passive)| CutoffTable::Score { active, passive }),
                    CutoffKind::Rank => RANK_CUTOFFS
                        .get(kind.key())
                        .map(|&(active, passive)| CutoffTable::Rank { active, passive }),
                    CutoffKind::Binary => None,
                };
                table.map(|t| (kind, t))
            })
            .collect();
        Self { tables }
    }

    pub fn from_tables(
        tables: impl IntoIterator<Item = (PredictorKind, CutoffTable)>,
    ) -> Result<Self, ThresholdTableError> {
        let tables: BTreeMap<_, _> = tables.into_iter().collect();
        for (&predictor, table) in &tables {
            table.validate(predictor)?;
        }
        Ok(Self { tables })
    }

    /// Loads a TOML file of per-predictor tables. Predictors absent from the file keep their
    /// built-in table.
    pub fn load(path: &Path) -> Result<Self, ThresholdTableError> {
        let content = std::fs::read_to_string(path).map_err(|e| ThresholdTableError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            ThresholdTableError::Toml { source, .. } => ThresholdTableError::Toml {
                path: path.to_string_lossy().to_string(),
                source,
            },
            other => other,
        })
    }

    fn from_toml(content: &str) -> Result<Self, ThresholdTableError> {
        let raw: HashMap<String, CutoffTable> =
            toml::from_str(content).map_err(|e| ThresholdTableError::Toml {
                path: "<string>".to_string(),
                source: e,
            })?;
        let mut merged = Self::builtin().tables;
        for (name, table) in raw {
            let predictor: PredictorKind = name.parse()?;
            debug!("Overriding cutoff table of {}", predictor);
            merged.insert(predictor, table);
        }
        Self::from_tables(merged)
    }

    pub fn get(&self, predictor: PredictorKind) -> Option<&CutoffTable> {
        self.tables.get(&predictor)
    }
}

/// Active and passive cutoffs of one predictor for one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdSpec {
    /// 1-based rank positions over residues sorted by descending score.
    Rank { active: usize, passive: usize },
    /// Inclusive lower score bounds.
    Score { active: f64, passive: f64 },
    /// Class labels: 1 is interacting (active), any other class is passive.
    Binary,
}

impl ThresholdSpec {
    /// Classifies the scored residues of `result`. Only active and passive residues appear in
    /// the returned map; unscored residues are never classified.
    pub fn classify(&self, result: &PredictionResult) -> BTreeMap<isize, Classification> {
        let mut best: BTreeMap<isize, f64> = BTreeMap::new();
        for (residue, score) in result.scored().filter(|(_, s)| !s.is_nan()) {
            best.entry(residue)
                .and_modify(|s| *s = s.max(score))
                .or_insert(score);
        }

        match *self {
            ThresholdSpec::Score { active, passive } => best
                .into_iter()
                .filter_map(|(residue, score)| {
                    if score >= active {
                        Some((residue, Classification::Active))
                    } else if score >= passive {
                        Some((residue, Classification::Passive))
                    } else {
                        None
                    }
                })
                .collect(),
            ThresholdSpec::Rank { active, passive } => {
                let mut ranked: Vec<(isize, f64)> = best.into_iter().collect();
                ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
                ranked
                    .into_iter()
                    .enumerate()
                    .filter_map(|(i, (residue, _))| {
                        let rank = i + 1;
                        if rank <= active {
                            Some((residue, Classification::Active))
                        } else if rank <= passive {
                            Some((residue, Classification::Passive))
                        } else {
                            None
                        }
                    })
                    .collect()
            }
            ThresholdSpec::Binary => best
                .into_iter()
                .map(|(residue, class)| {
                    if class >= 1.0 {
                        (residue, Classification::Active)
                    } else {
                        (residue, Classification::Passive)
                    }
                })
                .collect(),
        }
    }
}

/// Maps the global sensitivity and the number of successful predictors onto per-predictor
/// cutoffs. Pure; no I/O.
pub struct ThresholdCalculator<'a> {
    table: &'a ThresholdTable,
}

impl<'a> ThresholdCalculator<'a> {
    pub fn new(table: &'a ThresholdTable) -> Self {
        Self { table }
    }

    /// Sensitivity level actually used when only `successful` predictors returned results.
    pub fn effective_level(&self, sensitivity: Sensitivity, successful: usize) -> Sensitivity {
        let missing = REFERENCE_CONSENSUS_SIZE.saturating_sub(successful);
        let level = usize::from(sensitivity.get())
            .saturating_sub(missing)
            .max(usize::from(Sensitivity::MIN));
        // `level` lies within 1..=sensitivity, so it always fits.
        Sensitivity::new(level as u8).unwrap_or(sensitivity)
    }

    pub fn spec_for(
        &self,
        predictor: PredictorKind,
        sensitivity: Sensitivity,
        successful: usize,
    ) -> Result<ThresholdSpec, ThresholdTableError> {
        if predictor.cutoff_kind() == CutoffKind::Binary {
            return Ok(ThresholdSpec::Binary);
        }
        let table = self
            .table
            .get(predictor)
            .ok_or(ThresholdTableError::MissingPredictor(predictor))?;
        Ok(table.at(self.effective_level(sensitivity, successful)))
    }

    pub fn compute(
        &self,
        results: &[PredictionResult],
        sensitivity: Sensitivity,
    ) -> Result<BTreeMap<PredictorKind, ThresholdSpec>, ThresholdTableError> {
        let predictors: BTreeSet<PredictorKind> = results.iter().map(|r| r.predictor).collect();
        let successful = predictors.len();
        let effective = self.effective_level(sensitivity, successful);
        if effective != sensitivity {
            debug!(
                "Only {} predictor(s) succeeded, loosening sensitivity {} to {}",
                successful, sensitivity, effective
            );
        }
        predictors
            .into_iter()
            .map(|p| Ok((p, self.spec_for(p, sensitivity, successful)?)))
            .collect()
    }
}
