use crate::core::io::pdb::{self, PdbStructure};
use crate::core::io::report;
use crate::core::models::consensus::ConsensusAnnotation;
use crate::core::models::prediction::PredictionResult;
use crate::core::models::predictor::{PollPolicy, PredictorKind};
use crate::core::models::structure::{DistanceTable, Exposure, StructureContext};
use crate::core::utils::geometry;
use crate::engine::aggregation::Aggregator;
use crate::engine::backend::PredictorBackend;
use crate::engine::config::{ConsensusConfig, Sensitivity};
use crate::engine::error::{EngineError, JobFailure};
use crate::engine::orchestrator::Orchestrator;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::threshold::{ThresholdCalculator, ThresholdSpec};
use crate::predictors::{Backend, http};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Everything known about the target structure before any predictor runs.
#[derive(Debug, Clone)]
pub struct StructureInput {
    /// Name used for output files.
    pub structure_id: String,
    pub pdb_code: Option<String>,
    pub structure: PdbStructure,
    /// Per-residue exposure from an external accessibility tool. Required: a run without it
    /// fails with [`EngineError::MissingSurface`].
    pub surface: Option<HashMap<isize, Exposure>>,
    /// Sparse residue distances from an external tool. Computed from coordinates if absent.
    pub distances: Option<DistanceTable>,
}

/// Where the annotated output structure was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceStructure {
    Predictor(PredictorKind),
    Input,
}

#[derive(Debug)]
pub struct PredictionRun {
    pub context: Arc<StructureContext>,
    pub consensus: ConsensusAnnotation,
    pub results: Vec<PredictionResult>,
    pub failures: Vec<(PredictorKind, JobFailure)>,
    pub thresholds: BTreeMap<PredictorKind, ThresholdSpec>,
    pub effective_sensitivity: Sensitivity,
    pub reference: ReferenceStructure,
    pub annotated_structure: String,
    /// Predictor-reported residues dropped because they are not in the chain.
    pub dropped_residues: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputFiles {
    pub structure: PathBuf,
    pub table: PathBuf,
    pub scores: Vec<PathBuf>,
}

/// Builds the immutable context of the target chain.
pub fn prepare_context(
    input: StructureInput,
    config: &ConsensusConfig,
) -> Result<StructureContext, EngineError> {
    let chain_id = config.chain_id;
    let residues = input.structure.chain_residues(chain_id)?;

    let surface = input
        .surface
        .ok_or(EngineError::MissingSurface { chain_id })?;
    let missing = residues
        .iter()
        .filter(|(n, _)| !surface.contains_key(n))
        .count();
    if missing == residues.len() {
        return Err(EngineError::MissingSurface { chain_id });
    }
    if missing > 0 {
        warn!("{} residue(s) missing from the surface data are treated as unknown", missing);
    }

    let distances = match input.distances {
        Some(table) => table,
        None => {
            info!("Computing residue distances within {} A", config.passive_radius);
            geometry::residue_distance_table(
                &input.structure.heavy_atoms_by_residue(chain_id),
                config.passive_radius,
            )
        }
    };

    let mut builder = StructureContext::builder(input.structure_id, chain_id)
        .residues(residues)
        .exposures(surface)
        .distances(distances)
        .source(input.structure.text());
    if let Some(code) = input.pdb_code {
        builder = builder.pdb_code(code);
    }
    Ok(builder.build()?)
}

/// Runs every configured predictor and fuses their results.
#[instrument(skip_all, name = "predict_workflow", fields(structure = context.structure_id()))]
pub async fn run(
    context: Arc<StructureContext>,
    config: &ConsensusConfig,
    reporter: &ProgressReporter,
) -> Result<PredictionRun, EngineError> {
    let client = http::build_client()?;
    let jobs: Vec<(Backend, PollPolicy)> = config
        .predictors
        .iter()
        .map(|s| (Backend::from_settings(s, &context, &client), s.poll_policy))
        .collect();
    run_with_backends(context, config, jobs, reporter).await
}

pub async fn run_with_backends<B>(
    context: Arc<StructureContext>,
    config: &ConsensusConfig,
    jobs: Vec<(B, PollPolicy)>,
    reporter: &ProgressReporter,
) -> Result<PredictionRun, EngineError>
where
    B: PredictorBackend + 'static,
{
    // === Phase 1: Remote predictions ===
    reporter.report(Progress::PhaseStart { name: "Prediction" });
    let set = Orchestrator::new(reporter.clone())
        .run(jobs, Arc::clone(&context))
        .await;
    let dropped_residues = set.outcomes().iter().map(|o| o.dropped.len()).sum();
    reporter.report(Progress::PhaseFinish);
    let (results, failures) = set.into_results()?;
    for (predictor, failure) in &failures {
        warn!(backend = %predictor, "Continuing without {}: {}", predictor, failure);
    }

    // === Phase 2: Cutoffs ===
    reporter.report(Progress::PhaseStart { name: "Thresholds" });
    let calculator = ThresholdCalculator::new(&config.thresholds);
    let thresholds = calculator.compute(&results, config.sensitivity)?;
    let effective_sensitivity = calculator.effective_level(config.sensitivity, results.len());
    reporter.report(Progress::PhaseFinish);

    // === Phase 3: Consensus ===
    reporter.report(Progress::PhaseStart { name: "Consensus" });
    let consensus =
        Aggregator::new(config.passive_radius).aggregate(&context, &results, &thresholds);
    let (reference, reference_text) = match results
        .iter()
        .filter(|r| r.structure.is_some())
        .min_by_key(|r| r.predictor)
    {
        Some(r) => (
            ReferenceStructure::Predictor(r.predictor),
            r.structure.as_deref().unwrap_or_default(),
        ),
        None => (ReferenceStructure::Input, context.source()),
    };
    let annotated_structure = pdb::annotate(reference_text, context.chain_id(), &consensus);
    reporter.report(Progress::PhaseFinish);

    info!(
        active = consensus.active().len(),
        passive = consensus.passive().len(),
        "Consensus complete with {} of {} predictor(s)",
        results.len(),
        results.len() + failures.len()
    );

    Ok(PredictionRun {
        context,
        consensus,
        results,
        failures,
        thresholds,
        effective_sensitivity,
        reference,
        annotated_structure,
        dropped_residues,
    })
}

/// Writes `<id>_cport.pdb`, `<id>_cport.csv` and one `<id>_<predictor>.csv` per successful
/// predictor into `dir`.
pub fn write_outputs(run: &PredictionRun, dir: &Path) -> Result<OutputFiles, EngineError> {
    std::fs::create_dir_all(dir).map_err(report::ReportError::Io)?;
    let id = run.context.structure_id();

    let structure = dir.join(format!("{}_cport.pdb", id));
    std::fs::write(&structure, &run.annotated_structure).map_err(report::ReportError::Io)?;

    let table = dir.join(format!("{}_cport.csv", id));
    let file = File::create(&table).map_err(report::ReportError::Io)?;
    report::write_consensus_table(&run.consensus, BufWriter::new(file))?;

    let mut scores = Vec::with_capacity(run.results.len());
    for result in &run.results {
        let path = dir.join(format!("{}_{}.csv", id, result.predictor.key()));
        let file = File::create(&path).map_err(report::ReportError::Io)?;
        report::write_scores(&result.scores, BufWriter::new(file))?;
        scores.push(path);
    }

    info!("Wrote results to {}", dir.display());
    Ok(OutputFiles {
        structure,
        table,
        scores,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::consensus::Classification;
    use crate::engine::config::{ConsensusConfigBuilder, PredictorSettings};
    use std::fs;
    use tempfile::tempdir;

    const STRUCTURE: &str = "\
ATOM      1  CA  LYS A  10       0.000   0.000   0.000  1.00 20.00           C
ATOM      2  CA  LEU A  11       3.800   0.000   0.000  1.00 20.00           C
ATOM      3  CA  ASP A  12       0.000   4.000   0.000  1.00 20.00           C
ATOM      4  CA  GLU A  13      30.000   0.000   0.000  1.00 20.00           C
END
";

    fn input(surface: bool) -> StructureInput {
        let exposures = HashMap::from([
            (10, Exposure::Exposed),
            (11, Exposure::Buried),
            (12, Exposure::Exposed),
            (13, Exposure::Exposed),
        ]);
        StructureInput {
            structure_id: "demo".to_string(),
            pdb_code: None,
            structure: PdbStructure::parse(STRUCTURE).unwrap(),
            surface: surface.then_some(exposures),
            distances: None,
        }
    }

    fn config(dir: &Path, files: &[(PredictorKind, &str)]) -> ConsensusConfig {
        let mut builder = ConsensusConfigBuilder::new().chain_id('A');
        for (kind, contents) in files {
            let path = dir.join(format!("{}.csv", kind.key()));
            fs::write(&path, contents).unwrap();
            builder = builder.predictor(PredictorSettings::precomputed(*kind, path));
        }
        builder.build().unwrap()
    }

    #[test]
    fn prepare_context_computes_distances_when_missing() {
        let dir = tempdir().unwrap();
        let config = config(dir.path(), &[(PredictorKind::Psiver, "residue,score\n")]);

        let context = prepare_context(input(true), &config).unwrap();

        assert_eq!(context.residue_numbers().collect::<Vec<_>>(), vec![10, 11, 12, 13]);
        assert!(context.distances().within(10, 12, 6.5));
        assert!(!context.distances().within(10, 13, 6.5));
        assert_eq!(context.exposure(11), Exposure::Buried);
    }

    #[test]
    fn prepare_context_requires_surface_data() {
        let dir = tempdir().unwrap();
        let config = config(dir.path(), &[(PredictorKind::Psiver, "residue,score\n")]);
        assert!(matches!(
            prepare_context(input(false), &config),
            Err(EngineError::MissingSurface { chain_id: 'A' })
        ));
    }

    #[test]
    fn prepare_context_rejects_surface_data_of_another_chain() {
        let dir = tempdir().unwrap();
        let config = config(dir.path(), &[(PredictorKind::Psiver, "residue,score\n")]);
        let mut other_chain = input(false);
        other_chain.surface = Some(HashMap::from([(500, Exposure::Exposed)]));
        assert!(matches!(
            prepare_context(other_chain, &config),
            Err(EngineError::MissingSurface { chain_id: 'A' })
        ));

        let mut partial = input(false);
        partial.surface = Some(HashMap::from([(10, Exposure::Exposed)]));
        let context = prepare_context(partial, &config).unwrap();
        assert_eq!(context.exposure(10), Exposure::Exposed);
        assert_eq!(context.exposure(11), Exposure::Unknown);
    }

    #[tokio::test]
    async fn run_fuses_precomputed_predictions() {
        let dir = tempdir().unwrap();
        let config = config(
            dir.path(),
            &[
                (PredictorKind::Psiver, "residue,score\n10,0.9\n11,0.9\n99,0.9\n"),
                (PredictorKind::Predus2, "residue,score\n13,NA\n"),
            ],
        );
        let context = Arc::new(prepare_context(input(true), &config).unwrap());

        let run = run(context, &config, &ProgressReporter::new()).await.unwrap();

        let consensus: BTreeMap<_, _> = run.consensus.iter().collect();
        assert_eq!(
            consensus,
            BTreeMap::from([
                (10, Classification::Active),
                (11, Classification::Neutral),
                (12, Classification::Passive),
                (13, Classification::Neutral),
            ])
        );
        assert_eq!(run.results.len(), 2);
        assert!(run.failures.is_empty());
        assert_eq!(run.dropped_residues, 1);
        assert_eq!(run.reference, ReferenceStructure::Input);
        // Two of three predictors: level 3 loosens to 2.
        assert_eq!(run.effective_sensitivity.get(), 2);
        assert!(run.annotated_structure.contains("LYS A  10       0.000   0.000   0.000  1.00 50.00"));
        assert!(run.annotated_structure.contains("ASP A  12       0.000   4.000   0.000  1.00100.00"));
    }

    #[tokio::test]
    async fn run_fails_when_no_predictor_succeeds() {
        let dir = tempdir().unwrap();
        let config = ConsensusConfigBuilder::new()
            .chain_id('A')
            .predictor(PredictorSettings::precomputed(
                PredictorKind::Psiver,
                dir.path().join("missing.csv"),
            ))
            .build()
            .unwrap();
        let context = Arc::new(prepare_context(input(true), &config).unwrap());

        let err = run(context, &config, &ProgressReporter::new()).await.unwrap_err();

        assert!(matches!(err, EngineError::NoPredictorsAvailable { .. }));
    }

    #[tokio::test]
    async fn write_outputs_creates_structure_table_and_scores() {
        let dir = tempdir().unwrap();
        let config = config(dir.path(), &[(PredictorKind::Psiver, "residue,score\n10,0.9\n")]);
        let context = Arc::new(prepare_context(input(true), &config).unwrap());
        let run = run(context, &config, &ProgressReporter::new()).await.unwrap();
        let out = dir.path().join("out");

        let files = write_outputs(&run, &out).unwrap();

        assert_eq!(files.structure, out.join("demo_cport.pdb"));
        assert_eq!(files.scores, vec![out.join("demo_psiver.csv")]);
        let table = fs::read_to_string(&files.table).unwrap();
        assert!(table.starts_with("residue,PSIVER,proximity,consensus\n10,+,,+\n"));
        let scores = fs::read_to_string(&files.scores[0]).unwrap();
        assert_eq!(scores, "residue,score\n10,0.9\n");
    }
}
