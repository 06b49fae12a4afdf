//! Witness solving and statement tags for the reference backend.

use ark_bn254::Fr;
use ark_ff::{Field, One, Zero};
use common::constants::{AGGREGATION_OBJECT_SIZE, PROOF_BODY_FIELDS, VERIFICATION_KEY_FIELDS};

use crate::backend::{Execution, Witness};
use crate::circuit::{
    CompiledCircuit, InputMap, InputValue, Relation, AGGREGATION_PARAM, KEY_HASH_PARAM,
    PROOF_PARAM, PUBLIC_INPUTS_PARAM, VERIFICATION_KEY_PARAM,
};
use crate::utils::errors::{InputError, ProvingError};
use crate::utils::transcript::KeccakTranscript;

/// Number of verification key words that carry shape data rather than key material.
const VK_HEADER_FIELDS: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ProofKind {
    Intermediate,
    Final,
}

impl ProofKind {
    fn label(self) -> &'static [u8] {
        match self {
            ProofKind::Intermediate => b"intermediate_proof",
            ProofKind::Final => b"final_proof",
        }
    }
}

/// `[digest, #public inputs, witness width, proof words, key material...]`
pub(crate) fn verification_key(circuit: &CompiledCircuit) -> Vec<Fr> {
    let digest = circuit.digest();
    let mut transcript = KeccakTranscript::new(b"verification_key");
    transcript.append_scalar(&digest);

    let mut vk = Vec::with_capacity(VERIFICATION_KEY_FIELDS);
    vk.push(digest);
    vk.push(Fr::from(circuit.abi.num_public_inputs() as u64));
    vk.push(Fr::from(circuit.abi.witness_width() as u64));
    vk.push(Fr::from(PROOF_BODY_FIELDS as u64));
    vk.extend(transcript.challenge_vector::<Fr>(VERIFICATION_KEY_FIELDS - VK_HEADER_FIELDS));
    vk
}

pub(crate) fn hash_fields(fields: &[Fr]) -> Fr {
    let mut transcript = KeccakTranscript::new(b"vk_hash");
    transcript.append_scalars(fields);
    transcript.challenge_scalar()
}

/// Tags that fill the proof body after `[vk_hash, commitment]`.
pub(crate) fn statement_tags(
    kind: ProofKind,
    vk_hash: Fr,
    public_inputs: &[Fr],
    commitment: Fr,
    satisfied: bool,
) -> Vec<Fr> {
    let mut transcript = KeccakTranscript::new(b"statement");
    transcript.append_message(kind.label());
    transcript.append_scalar(&vk_hash);
    transcript.append_scalars(public_inputs);
    transcript.append_scalar(&commitment);
    let verdict: &'static [u8] = if satisfied {
        b"satisfied"
    } else {
        b"unsatisfied"
    };
    transcript.append_message(verdict);
    transcript.challenge_vector(PROOF_BODY_FIELDS - 2)
}

/// Accepts a proof body only if it was produced from a satisfying witness for
/// `public_inputs` under the key hashing to `vk_hash`.
pub(crate) fn check_proof_body(
    kind: ProofKind,
    vk_hash: Fr,
    public_inputs: &[Fr],
    body: &[Fr],
) -> bool {
    if body.len() != PROOF_BODY_FIELDS || body[0] != vk_hash {
        return false;
    }
    body[2..] == statement_tags(kind, vk_hash, public_inputs, body[1], true)[..]
}

fn fold_aggregation(
    key_hash: Fr,
    public_inputs: &[Fr],
    commitment: Fr,
    input_aggregation: &[Fr],
) -> Vec<Fr> {
    let mut transcript = KeccakTranscript::new(b"aggregation");
    transcript.append_scalar(&key_hash);
    transcript.append_scalars(public_inputs);
    transcript.append_scalar(&commitment);
    transcript.append_scalars(input_aggregation);
    transcript.challenge_vector(AGGREGATION_OBJECT_SIZE)
}

fn field(inputs: &InputMap, name: &str) -> Result<Fr, InputError> {
    inputs
        .get(name)
        .and_then(InputValue::as_field)
        .ok_or_else(|| InputError::Missing(name.to_string()))
}

fn fields(inputs: &InputMap, name: &str) -> Result<Vec<Fr>, InputError> {
    inputs
        .get(name)
        .and_then(InputValue::as_fields)
        .ok_or_else(|| InputError::Missing(name.to_string()))
}

/// Solves the witness for `inputs`. Violated constraints are recorded on the
/// witness rather than reported as errors.
pub(crate) fn execute(
    circuit: &CompiledCircuit,
    inputs: &InputMap,
) -> Result<Execution, ProvingError> {
    circuit.abi.validate(inputs)?;
    let mut values = circuit.abi.flatten(inputs);
    let mut public_inputs = circuit.abi.public_values(inputs);
    let mut unsatisfied = Vec::new();

    let return_value = match &circuit.relation {
        Relation::Distinct { lhs, rhs } => {
            let diff = field(inputs, lhs)? - field(inputs, rhs)?;
            let inverse = diff.inverse().unwrap_or_else(Fr::zero);
            values.push(inverse);
            if diff * inverse != Fr::one() {
                unsatisfied.push(format!("{lhs} != {rhs}"));
            }
            None
        }
        Relation::VerifyProof => {
            let vk = fields(inputs, VERIFICATION_KEY_PARAM)?;
            let proof = fields(inputs, PROOF_PARAM)?;
            let proven_inputs = fields(inputs, PUBLIC_INPUTS_PARAM)?;
            let key_hash = field(inputs, KEY_HASH_PARAM)?;
            let input_aggregation = fields(inputs, AGGREGATION_PARAM)?;

            let checks = [
                ("key_hash matches verification_key", hash_fields(&vk) == key_hash),
                (
                    "verification_key expects public_inputs",
                    vk[1] == Fr::from(proven_inputs.len() as u64),
                ),
                ("proof made for verification_key", proof[0] == key_hash),
                (
                    "proof verifies",
                    check_proof_body(ProofKind::Intermediate, key_hash, &proven_inputs, &proof),
                ),
            ];
            unsatisfied.extend(
                checks
                    .iter()
                    .filter(|(_, holds)| !holds)
                    .map(|(name, _)| name.to_string()),
            );

            let output = fold_aggregation(key_hash, &proven_inputs, proof[1], &input_aggregation);
            values.extend_from_slice(&output);
            public_inputs.extend_from_slice(&output);
            Some(InputValue::fields(output))
        }
    };

    Ok(Execution {
        witness: Witness {
            circuit_digest: circuit.digest(),
            values,
            public_inputs,
            unsatisfied,
        },
        return_value,
    })
}
