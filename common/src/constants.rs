/// Size in bytes of one serialized field element (and of one public input).
pub const FIELD_ELEMENT_SIZE: usize = 32;
/// The proving system serializes a fixed-size proof body after the public inputs.
pub const PROOF_BODY_SIZE: usize = 2144;
pub const PROOF_BODY_FIELDS: usize = PROOF_BODY_SIZE / FIELD_ELEMENT_SIZE;

/// Arity of the recursive circuit's aggregation input (and output).
pub const AGGREGATION_OBJECT_SIZE: usize = 16;
pub const VERIFICATION_KEY_FIELDS: usize = 8;
/// Public inputs of the main circuit that the recursive circuit re-exposes.
pub const RECURSIVE_PUBLIC_INPUTS: usize = 1;

pub const DEFAULT_THREADS: usize = 8;
pub const DEFAULT_MAIN_CIRCUIT: &str = "main";
pub const DEFAULT_RECURSIVE_CIRCUIT: &str = "recursive";

const _: () = assert!(PROOF_BODY_SIZE % FIELD_ELEMENT_SIZE == 0);
