use super::threshold::ThresholdTable;
use crate::core::io::surface::DEFAULT_SURFACE_CUTOFF;
use crate::core::models::predictor::{PollPolicy, PredictorKind};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PASSIVE_RADIUS: f64 = 6.5;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
}

/// Stringency level of the consensus, from 1 (most permissive) to 9 (most stringent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Sensitivity(u8);

impl Sensitivity {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 9;

    pub fn new(level: u8) -> Result<Self, ConfigError> {
        if (Self::MIN..=Self::MAX).contains(&level) {
            Ok(Self(level))
        } else {
            Err(ConfigError::InvalidValue {
                parameter: "sensitivity",
                reason: format!(
                    "{} is outside the range {}..={}",
                    level,
                    Self::MIN,
                    Self::MAX
                ),
            })
        }
    }

    pub fn get(&self) -> u8 {
        self.0
    }

    /// Zero-based index into a nine-level threshold table.
    pub fn index(&self) -> usize {
        usize::from(self.0 - 1)
    }
}

impl Default for Sensitivity {
    fn default() -> Self {
        Self(3)
    }
}

impl fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a predictor's results come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredictionSource {
    Remote,
    /// A `residue,score` CSV saved by an earlier run.
    Precomputed(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictorSettings {
    pub kind: PredictorKind,
    pub poll_policy: PollPolicy,
    pub source: PredictionSource,
}

impl PredictorSettings {
    pub fn remote(kind: PredictorKind) -> Self {
        Self {
            kind,
            poll_policy: kind.default_poll_policy(),
            source: PredictionSource::Remote,
        }
    }

    pub fn precomputed(kind: PredictorKind, path: PathBuf) -> Self {
        Self {
            kind,
            poll_policy: PollPolicy::new(Duration::ZERO, 1),
            source: PredictionSource::Precomputed(path),
        }
    }

    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = policy;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsensusConfig {
    pub chain_id: char,
    pub sensitivity: Sensitivity,
    pub predictors: Vec<PredictorSettings>,
    /// Relative accessibility (percent) at which a residue counts as exposed.
    pub surface_cutoff: f64,
    /// Radius (Angstrom) of the proximity rule that turns neighbours of actives passive.
    pub passive_radius: f64,
    pub thresholds: ThresholdTable,
}

#[derive(Default)]
pub struct ConsensusConfigBuilder {
    chain_id: Option<char>,
    sensitivity: Option<Sensitivity>,
    predictors: Vec<PredictorSettings>,
    surface_cutoff: Option<f64>,
    passive_radius: Option<f64>,
    thresholds: Option<ThresholdTable>,
}

impl ConsensusConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chain_id(mut self, chain_id: char) -> Self {
        self.chain_id = Some(chain_id);
        self
    }
    pub fn sensitivity(mut self, sensitivity: Sensitivity) -> Self {
        self.sensitivity = Some(sensitivity);
        self
    }
    pub fn predictor(mut self, settings: PredictorSettings) -> Self {
        self.predictors.push(settings);
        self
    }
    pub fn predictors(mut self, settings: impl IntoIterator<Item = PredictorSettings>) -> Self {
        self.predictors.extend(settings);
        self
    }
    pub fn surface_cutoff(mut self, cutoff: f64) -> Self {
        self.surface_cutoff = Some(cutoff);
        self
    }
    pub fn passive_radius(mut self, radius: f64) -> Self {
        self.passive_radius = Some(radius);
        self
    }
    pub fn thresholds(mut self, table: ThresholdTable) -> Self {
        self.thresholds = Some(table);
        self
    }

    pub fn build(self) -> Result<ConsensusConfig, ConfigError> {
        let chain_id = self
            .chain_id
            .ok_or(ConfigError::MissingParameter("chain_id"))?;
        if !chain_id.is_ascii_alphanumeric() {
            return Err(ConfigError::InvalidValue {
                parameter: "chain_id",
                reason: format!("'{}' is not a valid chain identifier", chain_id),
            });
        }

        if self.predictors.is_empty() {
            return Err(ConfigError::MissingParameter("predictors"));
        }
        for (i, settings) in self.predictors.iter().enumerate() {
            if self.predictors[..i].iter().any(|s| s.kind == settings.kind) {
                return Err(ConfigError::InvalidValue {
                    parameter: "predictors",
                    reason: format!("{} is configured more than once", settings.kind),
                });
            }
            if settings.poll_policy.retries == 0 {
                return Err(ConfigError::InvalidValue {
                    parameter: "num_retries",
                    reason: format!("{} must be polled at least once", settings.kind),
                });
            }
        }

        let surface_cutoff = self.surface_cutoff.unwrap_or(DEFAULT_SURFACE_CUTOFF);
        if !surface_cutoff.is_finite() || surface_cutoff < 0.0 {
            return Err(ConfigError::InvalidValue {
                parameter: "surface_cutoff",
                reason: format!("{} is not a non-negative percentage", surface_cutoff),
            });
        }

        let passive_radius = self.passive_radius.unwrap_or(DEFAULT_PASSIVE_RADIUS);
        if !passive_radius.is_finite() || passive_radius <= 0.0 {
            return Err(ConfigError::InvalidValue {
                parameter: "passive_radius",
                reason: format!("{} is not a positive distance", passive_radius),
            });
        }

        Ok(ConsensusConfig {
            chain_id,
            sensitivity: self.sensitivity.unwrap_or_default(),
            predictors: self.predictors,
            surface_cutoff,
            passive_radius,
            thresholds: self.thresholds.unwrap_or_default(),
        })
    }
}
