//! Typed inputs for the two circuits of the protocol.

use std::str::FromStr;

use ark_bn254::Fr;
use ark_std::Zero;
use common::constants::{AGGREGATION_OBJECT_SIZE, RECURSIVE_PUBLIC_INPUTS};
use common::field_conversion::{fr_from_str, fr_to_minimal_hex, FieldError};
use serde::{Deserialize, Serialize};

use crate::circuit::{
    InputMap, InputValue, AGGREGATION_PARAM, KEY_HASH_PARAM, PROOF_PARAM, PUBLIC_INPUTS_PARAM,
    VERIFICATION_KEY_PARAM,
};
use crate::proof::{ProofData, RecursiveArtifacts};
use crate::utils::errors::InputError;

/// Converts a typed input struct into the name-keyed map a circuit executes on.
pub trait CircuitInputs {
    fn to_input_map(&self) -> Result<InputMap, InputError>;
}

/// A user-supplied scalar: the text as typed and its field value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldInput {
    raw: String,
    value: Fr,
}

impl FieldInput {
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn value(&self) -> Fr {
        self.value
    }
}

impl FromStr for FieldInput {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self {
            raw: s.trim().to_string(),
            value: fr_from_str(s)?,
        })
    }
}

/// Inputs of the main circuit: private `x`, public `y`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MainInputs {
    pub x: FieldInput,
    pub y: FieldInput,
}

impl MainInputs {
    pub fn parse(x: &str, y: &str) -> Result<Self, InputError> {
        let field = |name: &str, text: &str| {
            text.parse::<FieldInput>().map_err(|source| InputError::Field {
                name: name.to_string(),
                source,
            })
        };
        Ok(Self {
            x: field("x", x)?,
            y: field("y", y)?,
        })
    }
}

impl CircuitInputs for MainInputs {
    fn to_input_map(&self) -> Result<InputMap, InputError> {
        Ok(InputMap::from([
            ("x".to_string(), InputValue::Field(self.x.value())),
            ("y".to_string(), InputValue::Field(self.y.value())),
        ]))
    }
}

/// Accumulated pairing state handed from one recursive verification to the
/// next. Its width is fixed by the recursive circuit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AggregationObject(pub [Fr; AGGREGATION_OBJECT_SIZE]);

impl AggregationObject {
    /// No prior aggregation.
    pub fn empty() -> Self {
        Self([Fr::zero(); AGGREGATION_OBJECT_SIZE])
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Fr::is_zero)
    }

    pub fn as_slice(&self) -> &[Fr] {
        &self.0
    }
}

impl Default for AggregationObject {
    fn default() -> Self {
        Self::empty()
    }
}

/// How the recursive circuit's public input is derived from the main proof.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PublicInputEncoding {
    /// `"0x"` followed by `y` exactly as the user typed it. `y` must be decimal.
    #[default]
    RawDecimal,
    /// The public input carried by the intermediate proof, as minimal hex.
    ProvenValue,
}

impl PublicInputEncoding {
    /// Rejects main inputs this encoding cannot carry into the recursive circuit.
    pub fn check(self, main_inputs: &MainInputs) -> Result<(), InputError> {
        match self {
            PublicInputEncoding::RawDecimal => {
                let raw = main_inputs.y.raw();
                if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(InputError::NotDecimal("y".to_string()));
                }
                Ok(())
            }
            PublicInputEncoding::ProvenValue => Ok(()),
        }
    }
}

impl FromStr for PublicInputEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw-decimal" => Ok(Self::RawDecimal),
            "proven-value" => Ok(Self::ProvenValue),
            other => Err(format!(
                "unknown public input encoding `{other}`, expected `raw-decimal` or `proven-value`"
            )),
        }
    }
}

/// Inputs of the recursive circuit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecursiveInputs {
    pub verification_key: Vec<Fr>,
    pub proof: Vec<Fr>,
    /// Hex strings, fed to the circuit as field elements.
    pub public_inputs: Vec<String>,
    pub key_hash: Fr,
    pub input_aggregation_object: AggregationObject,
}

impl RecursiveInputs {
    /// Assembles the recursive circuit's inputs from the encoded main proof.
    pub fn assemble(
        artifacts: &RecursiveArtifacts,
        main_inputs: &MainInputs,
        main_proof: &ProofData,
        encoding: PublicInputEncoding,
    ) -> Result<Self, InputError> {
        let public_input = match encoding {
            PublicInputEncoding::RawDecimal => {
                encoding.check(main_inputs)?;
                format!("0x{}", main_inputs.y.raw())
            }
            PublicInputEncoding::ProvenValue => {
                let proven = main_proof
                    .public_input_fields()
                    .map_err(|source| InputError::Field {
                        name: PUBLIC_INPUTS_PARAM.to_string(),
                        source,
                    })?;
                if proven.len() != RECURSIVE_PUBLIC_INPUTS {
                    return Err(InputError::PublicInputCount {
                        expected: RECURSIVE_PUBLIC_INPUTS,
                        actual: proven.len(),
                    });
                }
                fr_to_minimal_hex(&proven[0])
            }
        };

        Ok(Self {
            verification_key: artifacts.vk_as_fields.clone(),
            proof: artifacts.proof_as_fields.clone(),
            public_inputs: vec![public_input],
            key_hash: artifacts.vk_hash,
            input_aggregation_object: AggregationObject::empty(),
        })
    }
}

impl CircuitInputs for RecursiveInputs {
    fn to_input_map(&self) -> Result<InputMap, InputError> {
        let public_inputs = self
            .public_inputs
            .iter()
            .map(|text| fr_from_str(text))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| InputError::Field {
                name: PUBLIC_INPUTS_PARAM.to_string(),
                source,
            })?;

        Ok(InputMap::from([
            (
                VERIFICATION_KEY_PARAM.to_string(),
                InputValue::fields(self.verification_key.iter().copied()),
            ),
            (
                PROOF_PARAM.to_string(),
                InputValue::fields(self.proof.iter().copied()),
            ),
            (
                PUBLIC_INPUTS_PARAM.to_string(),
                InputValue::fields(public_inputs),
            ),
            (KEY_HASH_PARAM.to_string(), InputValue::Field(self.key_hash)),
            (
                AGGREGATION_PARAM.to_string(),
                InputValue::fields(self.input_aggregation_object.0),
            ),
        ]))
    }
}
