use std::collections::BTreeMap;
use std::fmt;

use ark_bn254::Fr;
use serde::{Deserialize, Serialize};

use crate::utils::errors::InputError;
use crate::utils::transcript::{AppendToTranscript, KeccakTranscript};

/// Concrete value for one circuit parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputValue {
    Field(Fr),
    Vec(Vec<InputValue>),
}

/// Inputs keyed by parameter name.
pub type InputMap = BTreeMap<String, InputValue>;

impl InputValue {
    pub fn fields(values: impl IntoIterator<Item = Fr>) -> Self {
        InputValue::Vec(values.into_iter().map(InputValue::Field).collect())
    }

    pub fn as_field(&self) -> Option<Fr> {
        match self {
            InputValue::Field(value) => Some(*value),
            InputValue::Vec(_) => None,
        }
    }

    /// Elements of a one-dimensional field array.
    pub fn as_fields(&self) -> Option<Vec<Fr>> {
        match self {
            InputValue::Vec(items) => items.iter().map(InputValue::as_field).collect(),
            InputValue::Field(_) => None,
        }
    }

    pub fn flatten_into(&self, out: &mut Vec<Fr>) {
        match self {
            InputValue::Field(value) => out.push(*value),
            InputValue::Vec(items) => items.iter().for_each(|item| item.flatten_into(out)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbiType {
    Field,
    Array {
        length: usize,
        #[serde(rename = "type")]
        typ: Box<AbiType>,
    },
}

impl AbiType {
    pub fn field_array(length: usize) -> Self {
        AbiType::Array {
            length,
            typ: Box::new(AbiType::Field),
        }
    }

    /// Number of field elements a value of this type flattens to.
    pub fn width(&self) -> usize {
        match self {
            AbiType::Field => 1,
            AbiType::Array { length, typ } => length * typ.width(),
        }
    }

    fn matches(&self, value: &InputValue) -> bool {
        match (self, value) {
            (AbiType::Field, InputValue::Field(_)) => true,
            (AbiType::Array { length, typ }, InputValue::Vec(items)) => {
                items.len() == *length && items.iter().all(|item| typ.matches(item))
            }
            _ => false,
        }
    }
}

impl fmt::Display for AbiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbiType::Field => write!(f, "Field"),
            AbiType::Array { length, typ } => write!(f, "[{typ}; {length}]"),
        }
    }
}

impl AppendToTranscript for AbiType {
    fn append_to_transcript(&self, transcript: &mut KeccakTranscript) {
        match self {
            AbiType::Field => transcript.append_u64(0),
            AbiType::Array { length, typ } => {
                transcript.append_u64(1);
                transcript.append_u64(*length as u64);
                typ.append_to_transcript(transcript);
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub typ: AbiType,
    pub visibility: Visibility,
}

impl AbiParameter {
    pub fn new(name: &str, typ: AbiType, visibility: Visibility) -> Self {
        Self {
            name: name.to_string(),
            typ,
            visibility,
        }
    }
}

/// Parameter list and return type of a compiled circuit. Return values are
/// always public.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Abi {
    pub parameters: Vec<AbiParameter>,
    #[serde(default)]
    pub return_type: Option<AbiType>,
}

impl Abi {
    pub fn parameter(&self, name: &str) -> Option<&AbiParameter> {
        self.parameters.iter().find(|param| param.name == name)
    }

    /// Checks that `inputs` supplies exactly the declared parameters, each with
    /// its declared shape.
    pub fn validate(&self, inputs: &InputMap) -> Result<(), InputError> {
        for param in &self.parameters {
            let value = inputs
                .get(&param.name)
                .ok_or_else(|| InputError::Missing(param.name.clone()))?;
            if !param.typ.matches(value) {
                return Err(InputError::Shape {
                    name: param.name.clone(),
                    expected: param.typ.to_string(),
                });
            }
        }
        if let Some(unexpected) = inputs.keys().find(|key| self.parameter(key).is_none()) {
            return Err(InputError::Unexpected(unexpected.clone()));
        }
        Ok(())
    }

    pub fn witness_width(&self) -> usize {
        self.parameters.iter().map(|param| param.typ.width()).sum()
    }

    pub fn num_public_inputs(&self) -> usize {
        let public_params: usize = self
            .parameters
            .iter()
            .filter(|param| param.visibility == Visibility::Public)
            .map(|param| param.typ.width())
            .sum();
        public_params + self.return_type.as_ref().map_or(0, AbiType::width)
    }

    /// Inputs flattened in parameter order. Assumes `inputs` passed [`Abi::validate`].
    pub fn flatten(&self, inputs: &InputMap) -> Vec<Fr> {
        let mut out = Vec::with_capacity(self.witness_width());
        for param in &self.parameters {
            if let Some(value) = inputs.get(&param.name) {
                value.flatten_into(&mut out);
            }
        }
        out
    }

    /// Values of the public parameters, flattened in parameter order.
    pub fn public_values(&self, inputs: &InputMap) -> Vec<Fr> {
        let mut out = Vec::new();
        for param in self
            .parameters
            .iter()
            .filter(|param| param.visibility == Visibility::Public)
        {
            if let Some(value) = inputs.get(&param.name) {
                value.flatten_into(&mut out);
            }
        }
        out
    }
}

impl AppendToTranscript for Abi {
    fn append_to_transcript(&self, transcript: &mut KeccakTranscript) {
        transcript.append_u64(self.parameters.len() as u64);
        for param in &self.parameters {
            transcript.append_bytes(param.name.as_bytes());
            param.typ.append_to_transcript(transcript);
            transcript.append_u64(matches!(param.visibility, Visibility::Public) as u64);
        }
        match &self.return_type {
            Some(typ) => {
                transcript.append_u64(1);
                typ.append_to_transcript(transcript);
            }
            None => transcript.append_u64(0),
        }
    }
}
