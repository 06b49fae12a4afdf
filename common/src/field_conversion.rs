//! Conversions between BN254 scalars and the byte / string encodings used at
//! circuit boundaries. All byte encodings are 32-byte big-endian words.

use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use num::BigUint;
use thiserror::Error;

use crate::constants::FIELD_ELEMENT_SIZE;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("Invalid field element length, expected {FIELD_ELEMENT_SIZE} bytes but got {0}")]
    InvalidLength(usize),
    #[error("Non-canonical field element: 0x{0}")]
    NonCanonical(String),
    #[error("Could not parse {0:?} as a field element")]
    Unparseable(String),
    #[error("Value {0:?} is not smaller than the field modulus")]
    Overflow(String),
}

pub fn fr_to_bytes(value: &Fr) -> [u8; FIELD_ELEMENT_SIZE] {
    let bytes = value.into_bigint().to_bytes_be();
    let mut out = [0u8; FIELD_ELEMENT_SIZE];
    out[FIELD_ELEMENT_SIZE - bytes.len()..].copy_from_slice(&bytes);
    out
}

/// Decodes a 32-byte big-endian word, rejecting values at or above the modulus.
pub fn fr_from_bytes(bytes: &[u8]) -> Result<Fr, FieldError> {
    if bytes.len() != FIELD_ELEMENT_SIZE {
        return Err(FieldError::InvalidLength(bytes.len()));
    }
    let value = Fr::from_be_bytes_mod_order(bytes);
    if fr_to_bytes(&value) != bytes {
        return Err(FieldError::NonCanonical(hex::encode(bytes)));
    }
    Ok(value)
}

/// Parses a decimal string or a `0x`-prefixed hex string.
pub fn fr_from_str(input: &str) -> Result<Fr, FieldError> {
    let trimmed = input.trim();
    let (digits, radix) = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex_digits) => (hex_digits, 16),
        None => (trimmed, 10),
    };
    if digits.is_empty() {
        return Err(FieldError::Unparseable(input.to_string()));
    }
    let value = BigUint::parse_bytes(digits.as_bytes(), radix)
        .ok_or_else(|| FieldError::Unparseable(input.to_string()))?;

    let modulus: BigUint = Fr::MODULUS.into();
    if value >= modulus {
        return Err(FieldError::Overflow(input.to_string()));
    }
    Ok(Fr::from_be_bytes_mod_order(&value.to_bytes_be()))
}

/// Full-width hex, `0x` followed by 64 digits.
pub fn fr_to_hex(value: &Fr) -> String {
    format!("0x{}", hex::encode(fr_to_bytes(value)))
}

/// Hex without leading zeros, e.g. `0x3`.
pub fn fr_to_minimal_hex(value: &Fr) -> String {
    format!("0x{:x}", BigUint::from_bytes_be(&fr_to_bytes(value)))
}
