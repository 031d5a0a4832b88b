use cport::core::models::predictor::PredictorKind;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid format for '{0}'. Expected KEY=VALUE.")]
    MissingSeparator(String),

    #[error("{0}")]
    UnknownPredictor(String),

    #[error("Invalid PDB identifier '{0}'. Expected four alphanumeric characters (e.g., '1ppe').")]
    InvalidPdbId(String),

    #[error("Component '{component}' cannot be empty in '{input}'.")]
    EmptyComponent {
        component: &'static str,
        input: String,
    },
}

/// Splits `KEY=VALUE` at the first `=`, trimming both sides.
pub fn parse_key_value(input: &str) -> Result<(&str, &str), ParseError> {
    let (key, value) = input
        .split_once('=')
        .ok_or_else(|| ParseError::MissingSeparator(input.to_string()))?;
    let (key, value) = (key.trim(), value.trim());
    if key.is_empty() {
        return Err(ParseError::EmptyComponent {
            component: "key",
            input: input.to_string(),
        });
    }
    if value.is_empty() {
        return Err(ParseError::EmptyComponent {
            component: "value",
            input: input.to_string(),
        });
    }
    Ok((key, value))
}

pub fn parse_predictor(name: &str) -> Result<PredictorKind, ParseError> {
    name.parse::<PredictorKind>()
        .map_err(|e| ParseError::UnknownPredictor(e.to_string()))
}

/// Parses a `--precomputed NAME=PATH` value.
pub fn parse_precomputed(input: &str) -> Result<(PredictorKind, PathBuf), ParseError> {
    let (name, path) = parse_key_value(input)?;
    Ok((parse_predictor(name)?, PathBuf::from(path)))
}

/// Normalizes a PDB identifier to lower case after checking its shape.
pub fn parse_pdb_id(input: &str) -> Result<String, ParseError> {
    let id = input.trim();
    if id.len() != 4 || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ParseError::InvalidPdbId(input.to_string()));
    }
    Ok(id.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_splits_at_first_separator() {
        assert_eq!(parse_key_value("a.b = x=y"), Ok(("a.b", "x=y")));
        assert_eq!(
            parse_key_value("a.b"),
            Err(ParseError::MissingSeparator("a.b".to_string()))
        );
        assert!(matches!(
            parse_key_value("=3"),
            Err(ParseError::EmptyComponent { component: "key", .. })
        ));
        assert!(matches!(
            parse_key_value("a="),
            Err(ParseError::EmptyComponent { component: "value", .. })
        ));
    }

    #[test]
    fn precomputed_pairs_name_a_known_predictor() {
        assert_eq!(
            parse_precomputed("PSIVER=out/1ppe_psiver.csv"),
            Ok((PredictorKind::Psiver, PathBuf::from("out/1ppe_psiver.csv")))
        );
        assert!(matches!(
            parse_precomputed("whiscy=a.csv"),
            Err(ParseError::UnknownPredictor(_))
        ));
    }

    #[test]
    fn pdb_ids_are_validated_and_lowercased() {
        assert_eq!(parse_pdb_id("1PPE"), Ok("1ppe".to_string()));
        assert!(parse_pdb_id("1pp").is_err());
        assert!(parse_pdb_id("1pp-").is_err());
    }
}
