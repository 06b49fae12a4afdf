use std::sync::Arc;

use tracing::warn;

use crate::backend::{BackendFactory, BackendOptions, Execution, ProvingBackend, Witness};
use crate::circuit::CompiledCircuit;
use crate::inputs::CircuitInputs;
use crate::proof::{ProofData, RecursiveArtifacts};
use crate::utils::errors::ProvingError;

/// A circuit paired with an initialized backend instance.
///
/// The backend is destroyed exactly once: by [`Prover::release`], or when the
/// guard is dropped without having been released.
pub struct Prover<B: ProvingBackend> {
    circuit: Arc<CompiledCircuit>,
    backend: B,
    released: bool,
}

impl<B: ProvingBackend> Prover<B> {
    pub async fn new<F>(
        factory: &F,
        circuit: Arc<CompiledCircuit>,
        options: &BackendOptions,
    ) -> Result<Self, ProvingError>
    where
        F: BackendFactory<Backend = B>,
    {
        let backend = factory.instantiate(Arc::clone(&circuit), options)?;
        let mut prover = Self {
            circuit,
            backend,
            released: false,
        };
        prover.backend.init().await?;
        Ok(prover)
    }

    pub fn circuit(&self) -> &CompiledCircuit {
        &self.circuit
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    fn active(&self) -> Result<(), ProvingError> {
        if self.released {
            return Err(ProvingError::Destroyed(self.circuit.name.clone()));
        }
        Ok(())
    }

    /// Checks `inputs` against the circuit ABI, then solves the witness.
    pub async fn execute<I: CircuitInputs>(&self, inputs: &I) -> Result<Execution, ProvingError> {
        self.active()?;
        let input_map = inputs.to_input_map()?;
        self.circuit.abi.validate(&input_map)?;
        self.backend.execute_witness(input_map).await
    }

    pub async fn generate_intermediate_proof(&self, witness: Witness) -> Result<ProofData, ProvingError> {
        self.active()?;
        self.backend.generate_intermediate_proof(witness).await
    }

    pub async fn verify_intermediate_proof(&self, proof: &ProofData) -> Result<bool, ProvingError> {
        self.active()?;
        self.backend.verify_intermediate_proof(proof).await
    }

    pub async fn proof_artifacts_as_fields(
        &self,
        proof: &ProofData,
        num_public_inputs: usize,
    ) -> Result<RecursiveArtifacts, ProvingError> {
        self.active()?;
        self.backend
            .proof_artifacts_as_fields(proof, num_public_inputs)
            .await
    }

    pub async fn generate_final_proof(&self, witness: Witness) -> Result<ProofData, ProvingError> {
        self.active()?;
        self.backend.generate_final_proof(witness).await
    }

    pub async fn verify_final_proof(&self, proof: &ProofData) -> Result<bool, ProvingError> {
        self.active()?;
        self.backend.verify_final_proof(proof).await
    }

    /// Destroys the backend. Calls after the first are no-ops.
    pub fn release(&mut self) -> Result<(), ProvingError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.backend.destroy()
    }
}

impl<B: ProvingBackend> Drop for Prover<B> {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!("Failed to release prover for `{}`: {err}", self.circuit.name);
        }
    }
}
