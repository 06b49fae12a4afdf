mod progress;

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use common::serializable::Serializable;
use eyre::{bail, Result, WrapErr};
use recursion_core::backend::ReferenceBackendFactory;
use recursion_core::circuit::{ArtifactDirLoader, BuiltinCircuits, CircuitLoader};
use recursion_core::inputs::{MainInputs, PublicInputEncoding};
use recursion_core::pipeline::{CancelToken, PipelineContext, PipelineOutcome, ProgressReporter};
use recursion_core::{split_aggregated_proof, PipelineConfig, ProofData};
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Proves `x != y`, then proves that the proof verifies inside the recursive circuit
    Prove(ProveArgs),
    /// Splits an aggregated proof buffer into its public inputs and proof body
    Split {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Writes the builtin circuits as `<name>.json` artifacts
    ExportCircuits {
        #[arg(value_name = "DIR")]
        dir: PathBuf,
    },
}

#[derive(Args, Debug)]
struct ProveArgs {
    /// Private input of the main circuit (decimal or 0x-hex)
    #[arg(long)]
    x: String,

    /// Public input of the main circuit (decimal; 0x-hex needs `--encoding proven-value`)
    #[arg(long)]
    y: String,

    /// Pipeline settings in TOML
    #[arg(long, env = "RECURSION_CONFIG")]
    config: Option<PathBuf>,

    /// Worker threads per backend
    #[arg(long, env = "RECURSION_THREADS")]
    threads: Option<usize>,

    /// Directory of circuit artifacts. Builtin circuits are used when omitted
    #[arg(long, env = "RECURSION_CIRCUITS")]
    circuits: Option<PathBuf>,

    /// How the recursive public input is derived: raw-decimal or proven-value
    #[arg(long)]
    encoding: Option<PublicInputEncoding>,

    /// Write a JSON report of the produced proofs
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl ProveArgs {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)
                .wrap_err_with(|| format!("loading {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if let Some(dir) = &self.circuits {
            config.circuit_dir = Some(dir.clone());
        }
        if let Some(encoding) = self.encoding {
            config.public_input_encoding = encoding;
        }
        config.validate()?;
        Ok(config)
    }
}

/// A proof with every byte string rendered as `0x`-prefixed hex.
#[derive(Serialize, Deserialize, Debug)]
struct HexProof {
    proof: String,
    public_inputs: Vec<String>,
}

impl From<&ProofData> for HexProof {
    fn from(data: &ProofData) -> Self {
        Self {
            proof: format!("0x{}", hex::encode(&data.proof)),
            public_inputs: data
                .public_inputs
                .iter()
                .map(|input| format!("0x{}", hex::encode(input)))
                .collect(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
struct ProofReport {
    verified: bool,
    main_proof: HexProof,
    recursive_public_inputs: Option<Vec<String>>,
    final_proof: Option<HexProof>,
}

impl From<&PipelineOutcome> for ProofReport {
    fn from(outcome: &PipelineOutcome) -> Self {
        match outcome {
            PipelineOutcome::Verified {
                main_proof,
                recursive_inputs,
                final_proof,
            }
            | PipelineOutcome::RecursiveProofRejected {
                main_proof,
                recursive_inputs,
                final_proof,
            } => Self {
                verified: outcome.is_verified(),
                main_proof: main_proof.into(),
                recursive_public_inputs: Some(recursive_inputs.public_inputs.clone()),
                final_proof: Some(final_proof.into()),
            },
            PipelineOutcome::MainProofRejected { main_proof } => Self {
                verified: false,
                main_proof: main_proof.into(),
                recursive_public_inputs: None,
                final_proof: None,
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let log_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_filter(log_filter);
    tracing_subscriber::registry().with(log_layer).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Prove(args) => prove(args).await,
        Commands::Split { file } => split(&file),
        Commands::ExportCircuits { dir } => export_circuits(&dir),
    }
}

async fn prove(args: ProveArgs) -> Result<()> {
    let config = args.pipeline_config()?;
    let inputs = MainInputs::parse(&args.x, &args.y)?;
    config.public_input_encoding.check(&inputs)?;

    let outcome = match &config.circuit_dir {
        Some(dir) => run_pipeline(&ArtifactDirLoader::new(dir), &config, inputs).await?,
        None => run_pipeline(&BuiltinCircuits, &config, inputs).await?,
    };

    if let Some(path) = &args.output {
        ProofReport::from(&outcome)
            .serialize_to_file(path)
            .wrap_err_with(|| format!("writing {}", path.display()))?;
        info!("Wrote proof report to {}", path.display());
    }

    match outcome {
        PipelineOutcome::Verified { .. } => {
            info!("Recursive proof verified");
            Ok(())
        }
        PipelineOutcome::MainProofRejected { .. } => bail!("intermediate proof did not verify"),
        PipelineOutcome::RecursiveProofRejected { .. } => bail!("recursive proof did not verify"),
    }
}

async fn run_pipeline<L: CircuitLoader>(
    loader: &L,
    config: &PipelineConfig,
    inputs: MainInputs,
) -> Result<PipelineOutcome> {
    let (reporter, events) = ProgressReporter::channel();
    let display = tokio::spawn(progress::render(events));

    let cancel = CancelToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let result = async {
        let context =
            PipelineContext::setup(loader, &ReferenceBackendFactory, config, &reporter).await?;
        context.prove(inputs, &reporter, &cancel).await
    }
    .await;

    drop(reporter);
    interrupt.abort();
    let _ = display.await;
    Ok(result?)
}

fn split(file: &Path) -> Result<()> {
    let buffer = std::fs::read(file).wrap_err_with(|| format!("reading {}", file.display()))?;
    let proof = split_aggregated_proof(&buffer)?;
    info!(
        "{} public inputs, {} byte proof body",
        proof.public_inputs.len(),
        proof.proof.len()
    );
    println!("{}", serde_json::to_string_pretty(&HexProof::from(&proof))?);
    Ok(())
}

fn export_circuits(dir: &Path) -> Result<()> {
    let loader = ArtifactDirLoader::new(dir);
    for circuit in BuiltinCircuits::all() {
        let path = loader.artifact_path(&circuit.name);
        circuit
            .serialize_to_file(&path)
            .wrap_err_with(|| format!("writing {}", path.display()))?;
        info!("Wrote {}", path.display());
    }
    Ok(())
}
