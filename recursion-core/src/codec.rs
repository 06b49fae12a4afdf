//! Framing of aggregated proof buffers.
//!
//! The proving system emits one buffer per proof: every public input as a
//! 32-byte word, in order, followed by a proof body of fixed size
//! ([`PROOF_BODY_SIZE`] bytes) that does not depend on the circuit. Splitting
//! the buffer therefore only needs its length.

use ark_bn254::Fr;
use common::constants::{FIELD_ELEMENT_SIZE, PROOF_BODY_SIZE};
use common::field_conversion::{fr_from_bytes, fr_to_bytes, FieldError};
use thiserror::Error;

use crate::proof::{ProofData, PublicInput};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Aggregated proof is {0} bytes, shorter than the {PROOF_BODY_SIZE}-byte proof body")]
    TooShort(usize),
    #[error("Public input region of {0} bytes is not a multiple of {FIELD_ELEMENT_SIZE}")]
    Misaligned(usize),
    #[error("Invalid field element at word {index}: {source}")]
    Field {
        index: usize,
        #[source]
        source: FieldError,
    },
}

/// Splits `buffer` into its ordered public inputs and its proof body.
pub fn split_aggregated_proof(buffer: &[u8]) -> Result<ProofData, CodecError> {
    let split_index = buffer
        .len()
        .checked_sub(PROOF_BODY_SIZE)
        .ok_or(CodecError::TooShort(buffer.len()))?;
    if split_index % FIELD_ELEMENT_SIZE != 0 {
        return Err(CodecError::Misaligned(split_index));
    }

    let (public_region, proof) = buffer.split_at(split_index);
    let public_inputs = public_region
        .chunks_exact(FIELD_ELEMENT_SIZE)
        .map(|chunk| {
            let mut input: PublicInput = [0u8; FIELD_ELEMENT_SIZE];
            input.copy_from_slice(chunk);
            input
        })
        .collect();

    Ok(ProofData {
        proof: proof.to_vec(),
        public_inputs,
    })
}

/// Inverse of [`split_aggregated_proof`].
pub fn aggregate_proof(proof: &ProofData) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(proof.public_inputs.len() * FIELD_ELEMENT_SIZE + proof.proof.len());
    for input in &proof.public_inputs {
        buffer.extend_from_slice(input);
    }
    buffer.extend_from_slice(&proof.proof);
    buffer
}

pub fn bytes_to_fields(bytes: &[u8]) -> Result<Vec<Fr>, CodecError> {
    if bytes.len() % FIELD_ELEMENT_SIZE != 0 {
        return Err(CodecError::Misaligned(bytes.len()));
    }
    bytes
        .chunks_exact(FIELD_ELEMENT_SIZE)
        .enumerate()
        .map(|(index, word)| fr_from_bytes(word).map_err(|source| CodecError::Field { index, source }))
        .collect()
}

pub fn fields_to_bytes(fields: &[Fr]) -> Vec<u8> {
    fields.iter().flat_map(fr_to_bytes).collect()
}
