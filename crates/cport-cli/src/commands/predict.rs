use crate::cli::PredictArgs;
use crate::config::PartialConsensusConfig;
use crate::error::{CliError, Result};
use crate::fetch::{self, DownloadProgress};
use crate::utils::progress::CliProgressHandler;
use cport::core::io::pdb::PdbStructure;
use cport::core::io::{distances, surface};
use cport::engine::config::ConsensusConfig;
use cport::engine::progress::ProgressReporter;
use cport::workflows::predict::{self, ReferenceStructure, StructureInput};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub async fn run(args: PredictArgs) -> Result<()> {
    let partial_config = match &args.config {
        Some(path) => PartialConsensusConfig::from_file(path)?,
        None => PartialConsensusConfig::default(),
    };
    info!("Merging configuration from file and CLI arguments...");
    let config = partial_config.merge_with_cli(&args)?;

    let progress_handler = CliProgressHandler::new();
    let (structure_path, pdb_code) = resolve_structure(&args, &progress_handler).await?;
    let input = load_input(&args, &config, &structure_path, pdb_code)?;

    info!("Preparing chain {} of {:?}", config.chain_id, &structure_path);
    let context = Arc::new(predict::prepare_context(input, &config)?);

    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());
    println!(
        "Running {} predictor(s) on chain {} of {} ({} residues)...",
        config.predictors.len(),
        context.chain_id(),
        context.structure_id(),
        context.residues().len()
    );
    let outcome = predict::run(Arc::clone(&context), &config, &reporter).await;
    progress_handler.finish();
    let run = outcome?;

    for (predictor, failure) in &run.failures {
        println!("  ✗ {} was left out: {}", predictor, failure);
    }
    if run.dropped_residues > 0 {
        warn!(
            "{} predicted residue(s) outside chain {} were ignored",
            run.dropped_residues,
            context.chain_id()
        );
    }
    if run.effective_sensitivity != config.sensitivity {
        println!(
            "Sensitivity lowered from {} to {} for {} successful predictor(s).",
            config.sensitivity,
            run.effective_sensitivity,
            run.results.len()
        );
    }

    let files = predict::write_outputs(&run, &args.output_dir)?;
    let reference = match run.reference {
        ReferenceStructure::Predictor(kind) => format!("{} structure", kind),
        ReferenceStructure::Input => "input structure".to_string(),
    };
    println!(
        "✓ Consensus: {} active, {} passive residue(s).",
        run.consensus.active().len(),
        run.consensus.passive().len()
    );
    println!(
        "  Annotated {} written to: {}",
        reference,
        files.structure.display()
    );
    println!("  Consensus table written to: {}", files.table.display());
    for path in &files.scores {
        println!("  Scores written to: {}", path.display());
    }

    Ok(())
}

async fn resolve_structure(
    args: &PredictArgs,
    progress_handler: &CliProgressHandler,
) -> Result<(PathBuf, Option<String>)> {
    if let Some(path) = &args.source.pdb_file {
        return Ok((path.clone(), args.pdb_code.clone()));
    }
    let Some(pdb_id) = &args.source.pdb_id else {
        return Err(CliError::Argument(
            "either --pdb-file or --pdb-id is required".to_string(),
        ));
    };

    let pb = progress_handler.download_bar();
    let progress_callback = |progress: DownloadProgress| match progress {
        DownloadProgress::Started { total_size } => {
            if let Some(size) = total_size {
                pb.set_length(size);
            }
        }
        DownloadProgress::Downloading { downloaded } => pb.set_position(downloaded),
        DownloadProgress::Finished => {}
    };

    match fetch::download_structure(pdb_id, &args.output_dir, progress_callback).await {
        Ok((id, path)) => {
            pb.finish_with_message(format!("✓ Downloaded {}", id));
            Ok((path, Some(id)))
        }
        Err(e) => {
            pb.finish_with_message("✗ Download failed.");
            Err(e)
        }
    }
}

fn load_input(
    args: &PredictArgs,
    config: &ConsensusConfig,
    structure_path: &Path,
    pdb_code: Option<String>,
) -> Result<StructureInput> {
    let structure =
        PdbStructure::read_from_path(structure_path).map_err(|e| CliError::FileParsing {
            path: structure_path.to_path_buf(),
            source: e.into(),
        })?;

    let surface = args
        .surface
        .as_deref()
        .map(|path| {
            surface::read_surface(path, config.surface_cutoff).map_err(|e| {
                CliError::FileParsing {
                    path: path.to_path_buf(),
                    source: e.into(),
                }
            })
        })
        .transpose()?;

    let distances = args
        .distances
        .as_deref()
        .map(|path| {
            distances::read_distances(path).map_err(|e| CliError::FileParsing {
                path: path.to_path_buf(),
                source: e.into(),
            })
        })
        .transpose()?;

    Ok(StructureInput {
        structure_id: structure_id(args.name.as_deref(), pdb_code.as_deref(), structure_path),
        pdb_code,
        structure,
        surface,
        distances,
    })
}

/// Output file stem: explicit name, then PDB code, then the input file stem.
fn structure_id(name: Option<&str>, pdb_code: Option<&str>, path: &Path) -> String {
    name.or(pdb_code)
        .map(str::to_string)
        .or_else(|| {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
        })
        .unwrap_or_else(|| "structure".to_string())
}
