use crate::cli::PredictArgs;
use crate::error::{CliError, Result};
use crate::utils::parser;
use cport::core::models::predictor::{PollPolicy, PredictorKind};
use cport::engine::config::{ConsensusConfig, ConsensusConfigBuilder, PredictorSettings, Sensitivity};
use cport::engine::error::EngineError;
use cport::engine::threshold::ThresholdTable;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialConsensusSection {
    sensitivity: Option<u8>,
    #[serde(rename = "passive-radius")]
    passive_radius: Option<f64>,
    #[serde(rename = "surface-cutoff")]
    surface_cutoff: Option<f64>,
    #[serde(rename = "thresholds-path")]
    thresholds_path: Option<PathBuf>,
    predictors: Option<Vec<String>>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
struct PartialPredictorSection {
    /// Seconds between two polls.
    #[serde(rename = "wait-interval")]
    wait_interval: Option<u64>,
    #[serde(rename = "num-retries")]
    num_retries: Option<u32>,
    precomputed: Option<PathBuf>,
}

/// Configuration as read from a TOML file, before CLI overrides are layered on top.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialConsensusConfig {
    consensus: Option<PartialConsensusSection>,
    #[serde(default)]
    predictors: BTreeMap<String, PartialPredictorSection>,
}

impl PartialConsensusConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    pub fn merge_with_cli(mut self, args: &PredictArgs) -> Result<ConsensusConfig> {
        self.normalize_predictor_keys()?;
        self.apply_set_values(&args.set_values)?;

        let consensus = self.consensus.take().unwrap_or_default();
        let mut sections: BTreeMap<PredictorKind, PartialPredictorSection> = BTreeMap::new();
        for (name, section) in std::mem::take(&mut self.predictors) {
            sections.insert(Self::predictor_key(&name)?, section);
        }
        for pair in &args.precomputed {
            let (kind, path) =
                parser::parse_precomputed(pair).map_err(|e| CliError::Argument(e.to_string()))?;
            sections.entry(kind).or_default().precomputed = Some(path);
        }

        let names = if args.predictors.is_empty() {
            consensus.predictors.unwrap_or_default()
        } else {
            args.predictors.clone()
        };
        let mut kinds = names
            .iter()
            .map(|n| parser::parse_predictor(n).map_err(|e| CliError::Argument(e.to_string())))
            .collect::<Result<Vec<_>>>()?;
        if kinds.is_empty() {
            kinds = PredictorKind::ALL.to_vec();
        }
        // Saved scores for a predictor that was not selected still take part.
        for (kind, section) in &sections {
            if section.precomputed.is_some() && !kinds.contains(kind) {
                kinds.push(*kind);
            }
        }

        let sensitivity = args
            .sensitivity
            .or(consensus.sensitivity)
            .map(Sensitivity::new)
            .transpose()
            .map_err(|e| CliError::Config(e.to_string()))?
            .unwrap_or_default();

        let thresholds = match args.thresholds.as_ref().or(consensus.thresholds_path.as_ref()) {
            Some(path) => {
                debug!("Loading threshold tables from {:?}", path);
                ThresholdTable::load(path).map_err(EngineError::from)?
            }
            None => ThresholdTable::builtin(),
        };

        let mut builder = ConsensusConfigBuilder::new()
            .chain_id(args.chain)
            .sensitivity(sensitivity)
            .predictors(
                kinds
                    .into_iter()
                    .map(|kind| Self::predictor_settings(kind, sections.get(&kind))),
            )
            .thresholds(thresholds);
        if let Some(radius) = consensus.passive_radius {
            builder = builder.passive_radius(radius);
        }
        if let Some(cutoff) = consensus.surface_cutoff {
            builder = builder.surface_cutoff(cutoff);
        }

        builder.build().map_err(|e| CliError::Config(e.to_string()))
    }

    fn predictor_settings(
        kind: PredictorKind,
        section: Option<&PartialPredictorSection>,
    ) -> PredictorSettings {
        let section = section.cloned().unwrap_or_default();
        if let Some(path) = section.precomputed {
            return PredictorSettings::precomputed(kind, path);
        }
        let default = kind.default_poll_policy();
        let policy = PollPolicy::new(
            section
                .wait_interval
                .map(Duration::from_secs)
                .unwrap_or(default.interval),
            section.num_retries.unwrap_or(default.retries),
        );
        PredictorSettings::remote(kind).with_poll_policy(policy)
    }

    fn predictor_key(name: &str) -> Result<PredictorKind> {
        parser::parse_predictor(name).map_err(|e| CliError::Config(e.to_string()))
    }

    /// Rewrites `[predictors.<name>]` tables to canonical keys so `-S` overrides land on the
    /// same section whatever spelling the file used.
    fn normalize_predictor_keys(&mut self) -> Result<()> {
        let mut normalized = BTreeMap::new();
        for (name, section) in std::mem::take(&mut self.predictors) {
            let key = Self::predictor_key(&name)?.key().to_string();
            if normalized.insert(key, section).is_some() {
                return Err(CliError::Config(format!(
                    "Predictor '{}' is configured more than once",
                    name
                )));
            }
        }
        self.predictors = normalized;
        Ok(())
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let (key, value_str) = parser::parse_key_value(kv_pair).map_err(|e| {
                CliError::Config(format!("Invalid --set value: {}", e))
            })?;

            match key.split('.').collect::<Vec<_>>().as_slice() {
                ["consensus", "sensitivity"] => {
                    self.consensus
                        .get_or_insert_with(Default::default)
                        .sensitivity = Some(parse_value(key, value_str)?);
                }
                ["consensus", "passive-radius"] => {
                    self.consensus
                        .get_or_insert_with(Default::default)
                        .passive_radius = Some(parse_value(key, value_str)?);
                }
                ["consensus", "surface-cutoff"] => {
                    self.consensus
                        .get_or_insert_with(Default::default)
                        .surface_cutoff = Some(parse_value(key, value_str)?);
                }
                ["consensus", "thresholds-path"] => {
                    self.consensus
                        .get_or_insert_with(Default::default)
                        .thresholds_path = Some(PathBuf::from(value_str));
                }
                ["predictors", name, field] => {
                    let kind = Self::predictor_key(name)?;
                    let section = self.predictors.entry(kind.key().to_string()).or_default();
                    match *field {
                        "wait-interval" => {
                            section.wait_interval = Some(parse_value(key, value_str)?)
                        }
                        "num-retries" => section.num_retries = Some(parse_value(key, value_str)?),
                        "precomputed" => section.precomputed = Some(PathBuf::from(value_str)),
                        _ => {
                            return Err(CliError::Config(format!(
                                "Unsupported configuration key for --set: '{}'",
                                key
                            )));
                        }
                    }
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid value for {}: {}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use cport::engine::config::PredictionSource;
    use once_cell::sync::Lazy;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    static TEST_DIR: Lazy<TempDir> = Lazy::new(|| tempdir().expect("Failed to create temp dir"));

    fn write_config(name: &str, content: &str) -> PathBuf {
        let path = TEST_DIR.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn predict_args(extra: &[&str]) -> PredictArgs {
        let mut argv = vec!["cport", "predict", "-f", "target.pdb", "-c", "A"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Commands::Predict(args) => args,
            _ => panic!("expected the predict command"),
        }
    }

    fn kinds(config: &ConsensusConfig) -> Vec<PredictorKind> {
        config.predictors.iter().map(|s| s.kind).collect()
    }

    #[test]
    fn defaults_run_every_predictor_with_its_poll_policy() {
        let config = PartialConsensusConfig::default()
            .merge_with_cli(&predict_args(&[]))
            .unwrap();

        assert_eq!(config.chain_id, 'A');
        assert_eq!(config.sensitivity.get(), 3);
        assert_eq!(kinds(&config), PredictorKind::ALL.to_vec());
        for settings in &config.predictors {
            assert_eq!(settings.poll_policy, settings.kind.default_poll_policy());
            assert_eq!(settings.source, PredictionSource::Remote);
        }
    }

    #[test]
    fn file_values_are_layered_under_set_values_and_flags() {
        let path = write_config(
            "layered.toml",
            r#"
[consensus]
sensitivity = 4
passive-radius = 8.0
predictors = ["psiver", "promate"]

[predictors.PSIVER]
wait-interval = 5
num-retries = 10
"#,
        );
        let partial = PartialConsensusConfig::from_file(&path).unwrap();
        let args = predict_args(&[
            "-S",
            "consensus.sensitivity=6",
            "-S",
            "predictors.psiver.num-retries=2",
            "--sensitivity",
            "7",
        ]);

        let config = partial.merge_with_cli(&args).unwrap();

        assert_eq!(config.sensitivity.get(), 7);
        assert_eq!(config.passive_radius, 8.0);
        assert_eq!(kinds(&config), vec![PredictorKind::Psiver, PredictorKind::ProMate]);
        assert_eq!(
            config.predictors[0].poll_policy,
            PollPolicy::new(Duration::from_secs(5), 2)
        );
    }

    #[test]
    fn precomputed_scores_replace_the_remote_source() {
        let config = PartialConsensusConfig::default()
            .merge_with_cli(&predict_args(&[
                "-p",
                "promate",
                "--precomputed",
                "psiver=saved/1ppe_psiver.csv",
            ]))
            .unwrap();

        assert_eq!(kinds(&config), vec![PredictorKind::ProMate, PredictorKind::Psiver]);
        assert_eq!(
            config.predictors[1].source,
            PredictionSource::Precomputed(PathBuf::from("saved/1ppe_psiver.csv"))
        );
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        let path = write_config("unknown.toml", "[consensus]\nradius = 3.0\n");
        assert!(matches!(
            PartialConsensusConfig::from_file(&path),
            Err(CliError::FileParsing { .. })
        ));
    }

    #[test]
    fn invalid_overrides_are_config_errors() {
        for set in [
            "consensus.radius=3",
            "consensus.sensitivity=high",
            "predictors.whiscy.num-retries=3",
            "predictors.psiver.timeout=3",
            "consensus.sensitivity",
        ] {
            let result =
                PartialConsensusConfig::default().merge_with_cli(&predict_args(&["-S", set]));
            assert!(matches!(result, Err(CliError::Config(_))), "{}", set);
        }
    }

    #[test]
    fn core_validation_errors_surface_as_config_errors() {
        let result = PartialConsensusConfig::default()
            .merge_with_cli(&predict_args(&["-s", "12"]));
        assert!(matches!(result, Err(CliError::Config(_))));

        let result = PartialConsensusConfig::default()
            .merge_with_cli(&predict_args(&["-S", "predictors.promate.num-retries=0"]));
        assert!(matches!(result, Err(CliError::Config(_))));

        let result =
            PartialConsensusConfig::default().merge_with_cli(&predict_args(&["-p", "psiver,psiver"]));
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn missing_threshold_file_is_reported() {
        let missing = TEST_DIR.path().join("missing-thresholds.toml");
        let result = PartialConsensusConfig::default().merge_with_cli(&predict_args(&[
            "--thresholds",
            missing.to_str().unwrap(),
        ]));
        assert!(matches!(result, Err(CliError::Cport(EngineError::Thresholds(_)))));
    }
}
