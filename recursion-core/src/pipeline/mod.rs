//! The staged recursion pipeline.
//!
//! | Stage | Work |
//! |---|---|
//! | [`Stage::Setup`] | load both circuits, create and initialize one backend per circuit |
//! | [`Stage::MainProof`] | execute the main circuit, prove, self-verify |
//! | [`Stage::EncodeForRecursion`] | turn the main proof and its key into field elements |
//! | [`Stage::RecursiveProof`] | assemble recursive inputs, execute, produce the final proof |
//! | [`Stage::FinalVerification`] | verify the final proof, release the recursive backend |
//!
//! Each stage awaits exactly one result before the next one starts. A proof
//! that fails its own verification ends the run with a rejected
//! [`PipelineOutcome`], while errors end it with a [`PipelineError`]. Backends
//! are released on every path.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use common::constants::RECURSIVE_PUBLIC_INPUTS;
use tracing::{debug, info, warn};

use crate::backend::{BackendFactory, ProvingBackend};
use crate::circuit::CircuitLoader;
use crate::config::PipelineConfig;
use crate::inputs::{MainInputs, PublicInputEncoding, RecursiveInputs};
use crate::proof::{ProofData, RecursiveArtifacts};
use crate::utils::errors::{InputError, PipelineError, ProvingError};

pub mod cancel;
pub mod progress;
mod prover;
#[cfg(test)]
mod tests;

pub use cancel::CancelToken;
pub use progress::{ProgressReporter, Stage, StageEvent, StageStatus};
pub use prover::Prover;

/// Result of the main circuit stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MainProof {
    pub proof: ProofData,
    pub verified: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// The final proof verified.
    Verified {
        main_proof: ProofData,
        recursive_inputs: RecursiveInputs,
        final_proof: ProofData,
    },
    /// The intermediate proof failed its own verification; nothing recursive ran.
    MainProofRejected { main_proof: ProofData },
    RecursiveProofRejected {
        main_proof: ProofData,
        recursive_inputs: RecursiveInputs,
        final_proof: ProofData,
    },
}

impl PipelineOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, PipelineOutcome::Verified { .. })
    }
}

/// Both provers of one request, plus the settings they run under.
pub struct PipelineContext<B: ProvingBackend> {
    main: Prover<B>,
    recursive: Prover<B>,
    encoding: PublicInputEncoding,
    stage_timeout: Option<Duration>,
}

impl<B: ProvingBackend> PipelineContext<B> {
    #[tracing::instrument(skip_all, name = "PipelineContext::setup")]
    pub async fn setup<L, F>(
        loader: &L,
        factory: &F,
        config: &PipelineConfig,
        progress: &ProgressReporter,
    ) -> Result<Self, PipelineError>
    where
        L: CircuitLoader,
        F: BackendFactory<Backend = B>,
    {
        progress.pending(Stage::Setup);
        let result = Self::setup_provers(loader, factory, config).await;
        match &result {
            Ok(_) => progress.succeeded(Stage::Setup),
            Err(err) => progress.failed(Stage::Setup, err),
        }
        result
    }

    async fn setup_provers<L, F>(
        loader: &L,
        factory: &F,
        config: &PipelineConfig,
    ) -> Result<Self, PipelineError>
    where
        L: CircuitLoader,
        F: BackendFactory<Backend = B>,
    {
        let main_circuit = Arc::new(loader.load(&config.main_circuit).await?);
        let recursive_circuit = Arc::new(loader.load(&config.recursive_circuit).await?);

        let setup_failed = |source| PipelineError::Stage {
            stage: Stage::Setup,
            source,
        };
        let options = config.backend_options();
        let main = Prover::new(factory, main_circuit, &options)
            .await
            .map_err(setup_failed)?;
        let recursive = Prover::new(factory, recursive_circuit, &options)
            .await
            .map_err(setup_failed)?;
        info!(
            "Provers ready for `{}` and `{}`",
            main.circuit().name,
            recursive.circuit().name
        );

        Ok(Self {
            main,
            recursive,
            encoding: config.public_input_encoding,
            stage_timeout: config.stage_timeout(),
        })
    }

    pub fn recursive_prover(&self) -> &Prover<B> {
        &self.recursive
    }

    #[tracing::instrument(skip_all, name = "PipelineContext::prove_main")]
    pub async fn prove_main(&self, inputs: &MainInputs) -> Result<MainProof, ProvingError> {
        let execution = self.main.execute(inputs).await?;
        let proof = self
            .main
            .generate_intermediate_proof(execution.witness)
            .await?;
        let verified = self.main.verify_intermediate_proof(&proof).await?;
        info!("Intermediate proof generated, verified: {verified}");
        Ok(MainProof { proof, verified })
    }

    #[tracing::instrument(skip_all, name = "PipelineContext::encode_for_recursion")]
    pub async fn encode_for_recursion(
        &self,
        proof: &ProofData,
    ) -> Result<RecursiveArtifacts, ProvingError> {
        let artifacts = self
            .main
            .proof_artifacts_as_fields(proof, RECURSIVE_PUBLIC_INPUTS)
            .await?;
        debug!(
            "Encoded {} proof fields and {} key fields",
            artifacts.proof_as_fields.len(),
            artifacts.vk_as_fields.len()
        );
        Ok(artifacts)
    }

    pub fn recursive_inputs(
        &self,
        artifacts: &RecursiveArtifacts,
        main_inputs: &MainInputs,
        main_proof: &ProofData,
    ) -> Result<RecursiveInputs, InputError> {
        RecursiveInputs::assemble(artifacts, main_inputs, main_proof, self.encoding)
    }

    #[tracing::instrument(skip_all, name = "PipelineContext::prove_recursive")]
    pub async fn prove_recursive(&self, inputs: &RecursiveInputs) -> Result<ProofData, ProvingError> {
        let execution = self.recursive.execute(inputs).await?;
        let proof = self
            .recursive
            .generate_final_proof(execution.witness)
            .await?;
        info!("Final proof generated");
        Ok(proof)
    }

    /// Verifies the final proof, then releases the recursive prover whatever
    /// the verification result.
    #[tracing::instrument(skip_all, name = "PipelineContext::verify_and_teardown")]
    pub async fn verify_and_teardown(&mut self, proof: &ProofData) -> Result<bool, ProvingError> {
        let verified = self.recursive.verify_final_proof(proof).await;
        release(&mut self.recursive);
        let verified = verified?;
        info!("Final proof verified: {verified}");
        Ok(verified)
    }

    /// Runs every stage after setup for one request. Inputs the configured
    /// encoding cannot carry fail before any stage starts.
    #[tracing::instrument(skip_all, name = "PipelineContext::prove")]
    pub async fn prove(
        mut self,
        inputs: MainInputs,
        progress: &ProgressReporter,
        cancel: &CancelToken,
    ) -> Result<PipelineOutcome, PipelineError> {
        self.encoding.check(&inputs)?;
        let timeout = self.stage_timeout;

        let main = run_stage(
            Stage::MainProof,
            timeout,
            progress,
            cancel,
            self.prove_main(&inputs),
        )
        .await?;
        if !main.verified {
            progress.rejected(Stage::MainProof);
            info!("Intermediate proof did not verify, skipping recursion");
            return Ok(PipelineOutcome::MainProofRejected {
                main_proof: main.proof,
            });
        }
        progress.succeeded(Stage::MainProof);

        let artifacts = run_stage(
            Stage::EncodeForRecursion,
            timeout,
            progress,
            cancel,
            self.encode_for_recursion(&main.proof),
        )
        .await?;
        progress.succeeded(Stage::EncodeForRecursion);
        release(&mut self.main);

        let (recursive_inputs, final_proof) = run_stage(
            Stage::RecursiveProof,
            timeout,
            progress,
            cancel,
            async {
                let recursive_inputs = self.recursive_inputs(&artifacts, &inputs, &main.proof)?;
                let final_proof = self.prove_recursive(&recursive_inputs).await?;
                Ok((recursive_inputs, final_proof))
            },
        )
        .await?;
        progress.succeeded(Stage::RecursiveProof);

        let verified = run_stage(
            Stage::FinalVerification,
            timeout,
            progress,
            cancel,
            self.verify_and_teardown(&final_proof),
        )
        .await?;

        if verified {
            progress.succeeded(Stage::FinalVerification);
            Ok(PipelineOutcome::Verified {
                main_proof: main.proof,
                recursive_inputs,
                final_proof,
            })
        } else {
            progress.rejected(Stage::FinalVerification);
            Ok(PipelineOutcome::RecursiveProofRejected {
                main_proof: main.proof,
                recursive_inputs,
                final_proof,
            })
        }
    }
}

fn release<B: ProvingBackend>(prover: &mut Prover<B>) {
    if let Err(err) = prover.release() {
        warn!("Failed to release prover for `{}`: {err}", prover.circuit().name);
    }
}

/// Awaits `work` under the cancel token and the optional stage timeout.
/// Emits the stage's pending event, and its terminal event on failure.
async fn run_stage<T, Fut>(
    stage: Stage,
    timeout: Option<Duration>,
    progress: &ProgressReporter,
    cancel: &CancelToken,
    work: Fut,
) -> Result<T, PipelineError>
where
    Fut: Future<Output = Result<T, ProvingError>>,
{
    progress.pending(stage);
    let bounded = async {
        let result = match timeout {
            Some(after) => tokio::time::timeout(after, work)
                .await
                .map_err(|_| PipelineError::TimedOut { stage, after })?,
            None => work.await,
        };
        result.map_err(|source| PipelineError::Stage { stage, source })
    };

    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PipelineError::Cancelled { stage }),
        result = bounded => result,
    };
    if let Err(err) = &result {
        warn!("{err}");
        progress.failed(stage, err);
    }
    result
}
