use common::constants::{
    AGGREGATION_OBJECT_SIZE, DEFAULT_MAIN_CIRCUIT, DEFAULT_RECURSIVE_CIRCUIT, PROOF_BODY_FIELDS,
    RECURSIVE_PUBLIC_INPUTS, VERIFICATION_KEY_FIELDS,
};

use super::loader::CircuitLoader;
use super::{
    Abi, AbiParameter, AbiType, CompiledCircuit, Relation, Visibility, AGGREGATION_PARAM,
    KEY_HASH_PARAM, PROOF_PARAM, PUBLIC_INPUTS_PARAM, VERIFICATION_KEY_PARAM,
};
use crate::utils::errors::LoadError;

/// The two circuits of the recursion protocol, compiled in.
#[derive(Clone, Copy, Debug, Default)]
pub struct BuiltinCircuits;

impl BuiltinCircuits {
    /// `fn main(x: Field, y: pub Field) { assert(x != y) }`
    pub fn main() -> CompiledCircuit {
        CompiledCircuit {
            name: DEFAULT_MAIN_CIRCUIT.to_string(),
            abi: Abi {
                parameters: vec![
                    AbiParameter::new("x", AbiType::Field, Visibility::Private),
                    AbiParameter::new("y", AbiType::Field, Visibility::Public),
                ],
                return_type: None,
            },
            relation: Relation::Distinct {
                lhs: "x".to_string(),
                rhs: "y".to_string(),
            },
        }
    }

    /// Verifies one proof of [`BuiltinCircuits::main`] and returns the
    /// resulting aggregation object.
    pub fn recursive() -> CompiledCircuit {
        CompiledCircuit {
            name: DEFAULT_RECURSIVE_CIRCUIT.to_string(),
            abi: Abi {
                parameters: vec![
                    AbiParameter::new(
                        VERIFICATION_KEY_PARAM,
                        AbiType::field_array(VERIFICATION_KEY_FIELDS),
                        Visibility::Private,
                    ),
                    AbiParameter::new(
                        PROOF_PARAM,
                        AbiType::field_array(PROOF_BODY_FIELDS),
                        Visibility::Private,
                    ),
                    AbiParameter::new(
                        PUBLIC_INPUTS_PARAM,
                        AbiType::field_array(RECURSIVE_PUBLIC_INPUTS),
                        Visibility::Private,
                    ),
                    AbiParameter::new(KEY_HASH_PARAM, AbiType::Field, Visibility::Private),
                    AbiParameter::new(
                        AGGREGATION_PARAM,
                        AbiType::field_array(AGGREGATION_OBJECT_SIZE),
                        Visibility::Private,
                    ),
                ],
                return_type: Some(AbiType::field_array(AGGREGATION_OBJECT_SIZE)),
            },
            relation: Relation::VerifyProof,
        }
    }

    pub fn all() -> Vec<CompiledCircuit> {
        vec![Self::main(), Self::recursive()]
    }
}

impl CircuitLoader for BuiltinCircuits {
    async fn load(&self, name: &str) -> Result<CompiledCircuit, LoadError> {
        match name {
            DEFAULT_MAIN_CIRCUIT => Ok(Self::main()),
            DEFAULT_RECURSIVE_CIRCUIT => Ok(Self::recursive()),
            _ => Err(LoadError::NotFound(name.to_string())),
        }
    }
}
