//! A transparent proving backend over BN254 field elements.
//!
//! Proofs follow the framing of the production barretenberg-style backends:
//! public inputs first, then a fixed [`PROOF_BODY_SIZE`](common::constants::PROOF_BODY_SIZE)
//! byte body. The body binds the verification key hash, a blinded witness
//! commitment and Keccak transcript tags over the statement. This is an
//! attestation scheme, not a zero-knowledge argument; it exists so the
//! recursion pipeline can run end to end without a native prover.

use std::sync::Arc;

use ark_bn254::Fr;
use common::field_conversion::fr_to_bytes;
use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::{debug, info};

use super::{BackendFactory, BackendOptions, Execution, ProvingBackend, Witness};
use crate::circuit::{CompiledCircuit, InputMap};
use crate::codec::{aggregate_proof, bytes_to_fields, fields_to_bytes, split_aggregated_proof};
use crate::proof::{ProofData, RecursiveArtifacts};
use crate::utils::errors::ProvingError;
use crate::utils::transcript::KeccakTranscript;

mod relations;

use relations::ProofKind;

#[derive(Debug)]
struct ProvingKey {
    circuit_digest: Fr,
    vk: Vec<Fr>,
    vk_hash: Fr,
}

enum State {
    Created,
    Ready {
        pool: Arc<ThreadPool>,
        key: Arc<ProvingKey>,
    },
    Destroyed,
}

pub struct ReferenceBackend {
    circuit: Arc<CompiledCircuit>,
    threads: usize,
    state: State,
}

impl ReferenceBackend {
    pub fn new(circuit: Arc<CompiledCircuit>, options: &BackendOptions) -> Self {
        Self {
            circuit,
            threads: options.threads,
            state: State::Created,
        }
    }

    pub fn is_destroyed(&self) -> bool {
        matches!(self.state, State::Destroyed)
    }

    fn ready(&self) -> Result<(Arc<ThreadPool>, Arc<ProvingKey>), ProvingError> {
        match &self.state {
            State::Ready { pool, key } => Ok((Arc::clone(pool), Arc::clone(key))),
            State::Created => Err(ProvingError::NotInitialized(self.circuit.name.clone())),
            State::Destroyed => Err(ProvingError::Destroyed(self.circuit.name.clone())),
        }
    }
}

/// Runs `job` on the backend's pool without blocking the async runtime.
async fn run_blocking<T, F>(pool: Arc<ThreadPool>, job: F) -> Result<T, ProvingError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || pool.install(job))
        .await
        .map_err(|err| ProvingError::Backend(format!("proving task failed: {err}")))
}

fn prove(
    kind: ProofKind,
    circuit_name: &str,
    key: &ProvingKey,
    witness: Witness,
) -> Result<ProofData, ProvingError> {
    if witness.circuit_digest != key.circuit_digest {
        return Err(ProvingError::WitnessMismatch(circuit_name.to_string()));
    }

    let blinding: [u8; 32] = rand::random();
    let witness_bytes: Vec<u8> = witness
        .values
        .par_iter()
        .flat_map_iter(fr_to_bytes)
        .collect();
    let mut transcript = KeccakTranscript::new(b"witness_commitment");
    transcript.append_bytes(&blinding);
    transcript.append_bytes(&witness_bytes);
    let commitment: Fr = transcript.challenge_scalar();

    let mut body = vec![key.vk_hash, commitment];
    body.extend(relations::statement_tags(
        kind,
        key.vk_hash,
        &witness.public_inputs,
        commitment,
        witness.is_satisfied(),
    ));

    let mut aggregated = fields_to_bytes(&witness.public_inputs);
    aggregated.extend(fields_to_bytes(&body));
    Ok(split_aggregated_proof(&aggregated)?)
}

fn verify(kind: ProofKind, key: &ProvingKey, proof: &ProofData) -> bool {
    let Ok(public_inputs) = proof.public_input_fields() else {
        return false;
    };
    if key.vk[1] != Fr::from(public_inputs.len() as u64) {
        return false;
    }
    let Ok(body) = bytes_to_fields(&proof.proof) else {
        return false;
    };
    relations::check_proof_body(kind, key.vk_hash, &public_inputs, &body)
}

impl ProvingBackend for ReferenceBackend {
    fn circuit(&self) -> &CompiledCircuit {
        &self.circuit
    }

    #[tracing::instrument(skip_all, name = "ReferenceBackend::init")]
    async fn init(&mut self) -> Result<(), ProvingError> {
        match self.state {
            State::Ready { .. } => return Ok(()),
            State::Destroyed => return Err(ProvingError::Destroyed(self.circuit.name.clone())),
            State::Created => {}
        }

        let name = self.circuit.name.clone();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .thread_name(move |i| format!("{name}-prover-{i}"))
            .build()
            .map_err(|err| ProvingError::Backend(err.to_string()))?;
        let pool = Arc::new(pool);

        let circuit = Arc::clone(&self.circuit);
        let key = run_blocking(Arc::clone(&pool), move || {
            let vk = relations::verification_key(&circuit);
            let vk_hash = relations::hash_fields(&vk);
            ProvingKey {
                circuit_digest: circuit.digest(),
                vk,
                vk_hash,
            }
        })
        .await?;
        info!(
            "Initialized backend for `{}` with {} threads",
            self.circuit.name, self.threads
        );

        self.state = State::Ready {
            pool,
            key: Arc::new(key),
        };
        Ok(())
    }

    #[tracing::instrument(skip_all, name = "ReferenceBackend::execute_witness")]
    async fn execute_witness(&self, inputs: InputMap) -> Result<Execution, ProvingError> {
        let (pool, _) = self.ready()?;
        let circuit = Arc::clone(&self.circuit);
        let execution = run_blocking(pool, move || relations::execute(&circuit, &inputs)).await??;
        if !execution.witness.is_satisfied() {
            debug!(
                "`{}` witness violates: {}",
                self.circuit.name,
                execution.witness.unsatisfied.join(", ")
            );
        }
        Ok(execution)
    }

    #[tracing::instrument(skip_all, name = "ReferenceBackend::generate_intermediate_proof")]
    async fn generate_intermediate_proof(&self, witness: Witness) -> Result<ProofData, ProvingError> {
        let (pool, key) = self.ready()?;
        let name = self.circuit.name.clone();
        run_blocking(pool, move || prove(ProofKind::Intermediate, &name, &key, witness)).await?
    }

    async fn verify_intermediate_proof(&self, proof: &ProofData) -> Result<bool, ProvingError> {
        let (pool, key) = self.ready()?;
        let proof = proof.clone();
        run_blocking(pool, move || verify(ProofKind::Intermediate, &key, &proof)).await
    }

    async fn proof_artifacts_as_fields(
        &self,
        proof: &ProofData,
        num_public_inputs: usize,
    ) -> Result<RecursiveArtifacts, ProvingError> {
        let (_, key) = self.ready()?;
        if proof.public_inputs.len() != num_public_inputs {
            return Err(ProvingError::PublicInputCount {
                expected: num_public_inputs,
                actual: proof.public_inputs.len(),
            });
        }

        let fields = bytes_to_fields(&aggregate_proof(proof))?;
        Ok(RecursiveArtifacts {
            proof_as_fields: fields[num_public_inputs..].to_vec(),
            vk_as_fields: key.vk.clone(),
            vk_hash: key.vk_hash,
        })
    }

    #[tracing::instrument(skip_all, name = "ReferenceBackend::generate_final_proof")]
    async fn generate_final_proof(&self, witness: Witness) -> Result<ProofData, ProvingError> {
        let (pool, key) = self.ready()?;
        let name = self.circuit.name.clone();
        run_blocking(pool, move || prove(ProofKind::Final, &name, &key, witness)).await?
    }

    async fn verify_final_proof(&self, proof: &ProofData) -> Result<bool, ProvingError> {
        let (pool, key) = self.ready()?;
        let proof = proof.clone();
        run_blocking(pool, move || verify(ProofKind::Final, &key, &proof)).await
    }

    fn destroy(&mut self) -> Result<(), ProvingError> {
        if self.is_destroyed() {
            return Err(ProvingError::Destroyed(self.circuit.name.clone()));
        }
        self.state = State::Destroyed;
        debug!("Destroyed backend for `{}`", self.circuit.name);
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ReferenceBackendFactory;

impl BackendFactory for ReferenceBackendFactory {
    type Backend = ReferenceBackend;

    fn instantiate(
        &self,
        circuit: Arc<CompiledCircuit>,
        options: &BackendOptions,
    ) -> Result<ReferenceBackend, ProvingError> {
        if options.threads == 0 {
            return Err(ProvingError::Backend(
                "backend needs at least one thread".to_string(),
            ));
        }
        Ok(ReferenceBackend::new(circuit, options))
    }
}
