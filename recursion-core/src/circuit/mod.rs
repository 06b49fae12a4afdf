//! Compiled circuit artifacts and the loaders that supply them.
//!
//! Compiling circuit sources is outside this crate; a [`CompiledCircuit`] is
//! the artifact a compiler hands over: an ABI plus the relation it constrains.

use std::collections::BTreeSet;

use ark_bn254::Fr;
use common::constants::{
    AGGREGATION_OBJECT_SIZE, PROOF_BODY_FIELDS, RECURSIVE_PUBLIC_INPUTS, VERIFICATION_KEY_FIELDS,
};
use serde::{Deserialize, Serialize};

use crate::utils::errors::LoadError;
use crate::utils::transcript::{AppendToTranscript, KeccakTranscript};

pub mod abi;
pub mod builtin;
pub mod loader;

pub use abi::{Abi, AbiParameter, AbiType, InputMap, InputValue, Visibility};
pub use builtin::BuiltinCircuits;
pub use loader::{ArtifactDirLoader, CircuitLoader};

pub const VERIFICATION_KEY_PARAM: &str = "verification_key";
pub const PROOF_PARAM: &str = "proof";
pub const PUBLIC_INPUTS_PARAM: &str = "public_inputs";
pub const KEY_HASH_PARAM: &str = "key_hash";
pub const AGGREGATION_PARAM: &str = "input_aggregation_object";

/// The constraint program of a circuit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Relation {
    /// `lhs != rhs`
    Distinct { lhs: String, rhs: String },
    /// Verifies one intermediate proof in-circuit and folds it into an
    /// aggregation object, which the circuit returns.
    VerifyProof,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledCircuit {
    pub name: String,
    pub abi: Abi,
    pub relation: Relation,
}

impl CompiledCircuit {
    /// Rejects artifacts whose relation does not fit their ABI.
    pub fn check(&self) -> Result<(), LoadError> {
        let fail = |reason: String| LoadError::Compilation {
            name: self.name.clone(),
            reason,
        };

        let mut seen = BTreeSet::new();
        for param in &self.abi.parameters {
            if !seen.insert(param.name.as_str()) {
                return Err(fail(format!("duplicate parameter `{}`", param.name)));
            }
        }

        let expect = |name: &str, typ: AbiType| -> Result<(), LoadError> {
            match self.abi.parameter(name) {
                Some(param) if param.typ == typ => Ok(()),
                Some(param) => Err(fail(format!(
                    "parameter `{name}` has type {}, expected {typ}",
                    param.typ
                ))),
                None => Err(fail(format!("missing parameter `{name}`"))),
            }
        };

        match &self.relation {
            Relation::Distinct { lhs, rhs } => {
                if lhs == rhs {
                    return Err(fail(format!("`{lhs}` compared with itself")));
                }
                expect(lhs, AbiType::Field)?;
                expect(rhs, AbiType::Field)?;
                if self.abi.return_type.is_some() {
                    return Err(fail("distinctness circuits return nothing".to_string()));
                }
            }
            Relation::VerifyProof => {
                expect(VERIFICATION_KEY_PARAM, AbiType::field_array(VERIFICATION_KEY_FIELDS))?;
                expect(PROOF_PARAM, AbiType::field_array(PROOF_BODY_FIELDS))?;
                expect(PUBLIC_INPUTS_PARAM, AbiType::field_array(RECURSIVE_PUBLIC_INPUTS))?;
                expect(KEY_HASH_PARAM, AbiType::Field)?;
                expect(AGGREGATION_PARAM, AbiType::field_array(AGGREGATION_OBJECT_SIZE))?;
                if self.abi.parameters.len() != 5 {
                    return Err(fail("unexpected extra parameters".to_string()));
                }
                if self.abi.return_type != Some(AbiType::field_array(AGGREGATION_OBJECT_SIZE)) {
                    return Err(fail(format!(
                        "must return the [Field; {AGGREGATION_OBJECT_SIZE}] aggregation object"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Binding digest of the artifact; feeds the verification key.
    pub fn digest(&self) -> Fr {
        let mut transcript = KeccakTranscript::new(b"circuit_digest");
        self.append_to_transcript(&mut transcript);
        transcript.challenge_scalar()
    }
}

impl AppendToTranscript for CompiledCircuit {
    fn append_to_transcript(&self, transcript: &mut KeccakTranscript) {
        transcript.append_bytes(self.name.as_bytes());
        self.abi.append_to_transcript(transcript);
        match &self.relation {
            Relation::Distinct { lhs, rhs } => {
                transcript.append_message(b"distinct");
                transcript.append_bytes(lhs.as_bytes());
                transcript.append_bytes(rhs.as_bytes());
            }
            Relation::VerifyProof => transcript.append_message(b"verify_proof"),
        }
    }
}
