//! The seam between the orchestrator and a proving system.
//!
//! A backend instance is bound to exactly one compiled circuit. Every call
//! other than [`ProvingBackend::destroy`] may run for seconds, so each returns a
//! future and the orchestrator awaits one result per stage.

use std::future::Future;
use std::sync::Arc;

use ark_bn254::Fr;
use common::constants::DEFAULT_THREADS;

use crate::circuit::{CompiledCircuit, InputMap, InputValue};
use crate::proof::{ProofData, RecursiveArtifacts};
use crate::utils::errors::ProvingError;

pub mod reference;

pub use reference::{ReferenceBackend, ReferenceBackendFactory};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendOptions {
    /// Worker threads for the backend's internal pool.
    pub threads: usize,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            threads: DEFAULT_THREADS,
        }
    }
}

/// Every value of one circuit execution.
///
/// Proof generation takes the witness by value, so a witness backs at most one
/// proof.
#[derive(Debug)]
pub struct Witness {
    /// Digest of the circuit that produced this witness.
    pub circuit_digest: Fr,
    /// Inputs in ABI order, followed by intermediate values.
    pub values: Vec<Fr>,
    /// Public parameters followed by return values.
    pub public_inputs: Vec<Fr>,
    /// Names of the constraints this assignment violates.
    pub unsatisfied: Vec<String>,
}

impl Witness {
    pub fn is_satisfied(&self) -> bool {
        self.unsatisfied.is_empty()
    }
}

#[derive(Debug)]
pub struct Execution {
    pub witness: Witness,
    pub return_value: Option<InputValue>,
}

pub trait ProvingBackend: Send + Sync {
    fn circuit(&self) -> &CompiledCircuit;

    fn init(&mut self) -> impl Future<Output = Result<(), ProvingError>> + Send;

    fn execute_witness(
        &self,
        inputs: InputMap,
    ) -> impl Future<Output = Result<Execution, ProvingError>> + Send;

    /// Proof meant to be verified inside another circuit.
    fn generate_intermediate_proof(
        &self,
        witness: Witness,
    ) -> impl Future<Output = Result<ProofData, ProvingError>> + Send;

    fn verify_intermediate_proof(
        &self,
        proof: &ProofData,
    ) -> impl Future<Output = Result<bool, ProvingError>> + Send;

    /// Field encoding of `proof` (without its first `num_public_inputs`
    /// words) and of this instance's verification key.
    fn proof_artifacts_as_fields(
        &self,
        proof: &ProofData,
        num_public_inputs: usize,
    ) -> impl Future<Output = Result<RecursiveArtifacts, ProvingError>> + Send;

    fn generate_final_proof(
        &self,
        witness: Witness,
    ) -> impl Future<Output = Result<ProofData, ProvingError>> + Send;

    fn verify_final_proof(
        &self,
        proof: &ProofData,
    ) -> impl Future<Output = Result<bool, ProvingError>> + Send;

    /// Releases native resources. Later calls on the instance fail.
    fn destroy(&mut self) -> Result<(), ProvingError>;
}

pub trait BackendFactory: Send + Sync {
    type Backend: ProvingBackend;

    fn instantiate(
        &self,
        circuit: Arc<CompiledCircuit>,
        options: &BackendOptions,
    ) -> Result<Self::Backend, ProvingError>;
}
