use crate::error::Result;
use cport::core::models::predictor::{CutoffKind, PredictorKind};
use cport::engine::config::Sensitivity;
use cport::engine::threshold::{
    REFERENCE_CONSENSUS_SIZE, ThresholdCalculator, ThresholdSpec, ThresholdTable,
};

pub fn run() -> Result<()> {
    let table = ThresholdTable::builtin();
    let sensitivity = Sensitivity::default();

    println!(
        "{:<14} {:<14} {:<7} {:>8} {:>8} {:>10}  cutoffs at sensitivity {}",
        "KEY", "NAME", "CUTOFF", "INTERVAL", "RETRIES", "MAX WAIT", sensitivity
    );
    for kind in PredictorKind::ALL {
        println!("{}", describe(kind, &table, sensitivity));
    }
    Ok(())
}

fn describe(kind: PredictorKind, table: &ThresholdTable, sensitivity: Sensitivity) -> String {
    let policy = kind.default_poll_policy();
    let cutoff_kind = match kind.cutoff_kind() {
        CutoffKind::Rank => "rank",
        CutoffKind::Score => "score",
        CutoffKind::Binary => "binary",
    };
    let spec = ThresholdCalculator::new(table).spec_for(kind, sensitivity, REFERENCE_CONSENSUS_SIZE);
    let cutoffs = match spec {
        Ok(ThresholdSpec::Rank { active, passive }) => {
            format!("active top {}, passive top {}", active, passive)
        }
        Ok(ThresholdSpec::Score { active, passive }) => {
            format!("active >= {:.2}, passive >= {:.2}", active, passive)
        }
        Ok(ThresholdSpec::Binary) => "class 1 active, other classes passive".to_string(),
        Err(_) => "none".to_string(),
    };
    format!(
        "{:<14} {:<14} {:<7} {:>7}s {:>8} {:>9}s  {}",
        kind.key(),
        kind.display_name(),
        cutoff_kind,
        policy.interval.as_secs(),
        policy.retries,
        policy.total_wait().as_secs(),
        cutoffs
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_lists_polling_and_default_cutoffs() {
        let table = ThresholdTable::builtin();
        let sensitivity = Sensitivity::default();

        let promate = describe(PredictorKind::ProMate, &table, sensitivity);
        assert!(promate.starts_with("promate"));
        assert!(promate.contains("rank"));
        assert!(promate.contains("300s"));
        assert!(promate.ends_with("active top 20, passive top 40"));

        let psiver = describe(PredictorKind::Psiver, &table, sensitivity);
        assert!(psiver.contains("18000s"));
        assert!(psiver.ends_with("active >= 0.30, passive >= 0.15"));

        let predictprotein = describe(PredictorKind::PredictProtein, &table, sensitivity);
        assert!(predictprotein.starts_with("predictprotein"));
        assert!(predictprotein.contains("binary"));
        assert!(predictprotein.contains("120s"));
        assert!(predictprotein.ends_with("class 1 active, other classes passive"));
    }
}
