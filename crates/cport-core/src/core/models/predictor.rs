use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Identity of a remote interface predictor known to the consensus engine.
///
/// The declaration order is the canonical predictor order used for report columns and for
/// choosing the reference structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PredictorKind {
    ProMate,
    Predus2,
    Psiver,
    PredictProtein,
}

/// How a predictor's output is cut into active and passive residues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutoffKind {
    /// Residues are ranked by score and cut at rank positions.
    Rank,
    /// Residues are cut at absolute score values.
    Score,
    /// The predictor already labels each residue as interacting or not; no cutoff applies.
    Binary,
}

/// Polling budget of a backend: total wait is `interval * retries`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub retries: u32,
}

impl PollPolicy {
    pub const fn new(interval: Duration, retries: u32) -> Self {
        Self { interval, retries }
    }

    pub fn total_wait(&self) -> Duration {
        self.interval * self.retries
    }
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("Unknown predictor '{0}'. Expected one of: promate, predus2, psiver, predictprotein.")]
pub struct UnknownPredictorError(pub String);

impl PredictorKind {
    pub const ALL: [PredictorKind; 4] = [
        PredictorKind::ProMate,
        PredictorKind::Predus2,
        PredictorKind::Psiver,
        PredictorKind::PredictProtein,
    ];

    /// Lower-case key used in configuration files and on the command line.
    pub fn key(&self) -> &'static str {
        match self {
            PredictorKind::ProMate => "promate",
            PredictorKind::Predus2 => "predus2",
            PredictorKind::Psiver => "psiver",
            PredictorKind::PredictProtein => "predictprotein",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PredictorKind::ProMate => "ProMate",
            PredictorKind::Predus2 => "PredUs2",
            PredictorKind::Psiver => "PSIVER",
            PredictorKind::PredictProtein => "PredictProtein",
        }
    }

    pub fn cutoff_kind(&self) -> CutoffKind {
        match self {
            PredictorKind::ProMate => CutoffKind::Rank,
            PredictorKind::Predus2 | PredictorKind::Psiver => CutoffKind::Score,
            PredictorKind::PredictProtein => CutoffKind::Binary,
        }
    }

    pub fn default_poll_policy(&self) -> PollPolicy {
        match self {
            PredictorKind::ProMate => PollPolicy::new(Duration::from_secs(10), 30),
            PredictorKind::Predus2 => PollPolicy::new(Duration::from_secs(10), 6),
            // PSIVER jobs can run for several hours.
            PredictorKind::Psiver => PollPolicy::new(Duration::from_secs(60), 300),
            PredictorKind::PredictProtein => PollPolicy::new(Duration::from_secs(10), 12),
        }
    }
}

impl fmt::Display for PredictorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for PredictorKind {
    type Err = UnknownPredictorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', '_'], "");
        match normalized.as_str() {
            "promate" => Ok(PredictorKind::ProMate),
            "predus2" | "predus" => Ok(PredictorKind::Predus2),
            "psiver" => Ok(PredictorKind::Psiver),
            "predictprotein" | "ppc" => Ok(PredictorKind::PredictProtein),
            _ => Err(UnknownPredictorError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_str_accepts_keys_and_display_names() {
        for kind in PredictorKind::ALL {
            assert_eq!(kind.key().parse::<PredictorKind>(), Ok(kind));
            assert_eq!(kind.display_name().parse::<PredictorKind>(), Ok(kind));
        }
        assert_eq!("PRED-US2".parse::<PredictorKind>(), Ok(PredictorKind::Predus2));
        assert_eq!(
            "Predict_Protein".parse::<PredictorKind>(),
            Ok(PredictorKind::PredictProtein)
        );
    }

    #[test]
    fn from_str_rejects_unknown_names() {
        let err = "whiscy".parse::<PredictorKind>().unwrap_err();
        assert_eq!(err, UnknownPredictorError("whiscy".to_string()));
    }

    #[test]
    fn total_wait_is_interval_times_retries() {
        let policy = PollPolicy::new(Duration::from_secs(10), 6);
        assert_eq!(policy.total_wait(), Duration::from_secs(60));
    }

    #[test]
    fn predictprotein_labels_residues_itself() {
        let kind = PredictorKind::PredictProtein;
        assert_eq!(kind.cutoff_kind(), CutoffKind::Binary);
        assert_eq!(kind.default_poll_policy().total_wait(), Duration::from_secs(120));
    }

    #[test]
    fn canonical_order_follows_declaration() {
        let mut kinds = vec![
            PredictorKind::PredictProtein,
            PredictorKind::Psiver,
            PredictorKind::ProMate,
            PredictorKind::Predus2,
        ];
        kinds.sort();
        assert_eq!(kinds, PredictorKind::ALL.to_vec());
    }
}
