use ark_bn254::Fr;
use common::constants::FIELD_ELEMENT_SIZE;
use common::field_conversion::{fr_from_bytes, FieldError};
use serde::{Deserialize, Serialize};

/// One public input as serialized by the proving system.
pub type PublicInput = [u8; FIELD_ELEMENT_SIZE];

/// A proof body together with the public inputs it was produced for.
///
/// Intermediate proofs (destined for recursion) and final proofs share this shape.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofData {
    pub proof: Vec<u8>,
    pub public_inputs: Vec<PublicInput>,
}

impl ProofData {
    pub fn public_input_fields(&self) -> Result<Vec<Fr>, FieldError> {
        self.public_inputs
            .iter()
            .map(|input| fr_from_bytes(input))
            .collect()
    }
}

/// Field-element encoding of a proof and of the key that verifies it, in the
/// form a recursive circuit takes as input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecursiveArtifacts {
    /// Proof body without its public inputs.
    pub proof_as_fields: Vec<Fr>,
    pub vk_as_fields: Vec<Fr>,
    pub vk_hash: Fr,
}
