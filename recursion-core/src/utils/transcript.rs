use ark_ff::{BigInteger, PrimeField};
use sha3::{Digest, Keccak256};

/// Running Keccak-256 sponge used for digests, commitments and Fiat-Shamir
/// style tags. Every absorb and squeeze advances the state and a round counter.
#[derive(Clone)]
pub struct KeccakTranscript {
    state: [u8; 32],
    n_rounds: u32,
}

impl KeccakTranscript {
    pub fn new(label: &'static [u8]) -> Self {
        assert!(label.len() < 33);
        let mut padded = label.to_vec();
        padded.resize(32, 0);
        Self {
            state: Keccak256::digest(&padded).into(),
            n_rounds: 0,
        }
    }

    /// Hasher seeded with the running state and the round counter.
    fn hasher(&self) -> Keccak256 {
        let mut packed = [0_u8; 32];
        packed[28..].copy_from_slice(&self.n_rounds.to_be_bytes());
        Keccak256::new().chain_update(self.state).chain_update(packed)
    }

    fn update_state(&mut self, new_state: [u8; 32]) {
        self.state = new_state;
        self.n_rounds += 1;
    }

    /// Messages are right padded to one 32-byte word.
    pub fn append_message(&mut self, msg: &'static [u8]) {
        assert!(msg.len() < 33);
        let mut packed = msg.to_vec();
        packed.resize(32, 0);
        let hasher = self.hasher().chain_update(packed);
        self.update_state(hasher.finalize().into());
    }

    pub fn append_bytes(&mut self, bytes: &[u8]) {
        let hasher = self.hasher().chain_update(bytes);
        self.update_state(hasher.finalize().into());
    }

    pub fn append_u64(&mut self, x: u64) {
        let mut packed = [0_u8; 32];
        packed[24..].copy_from_slice(&x.to_be_bytes());
        let hasher = self.hasher().chain_update(packed);
        self.update_state(hasher.finalize().into());
    }

    pub fn append_scalar<F: PrimeField>(&mut self, scalar: &F) {
        self.append_bytes(&scalar.into_bigint().to_bytes_be());
    }

    pub fn append_scalars<F: PrimeField>(&mut self, scalars: &[F]) {
        self.append_message(b"begin_append_vector");
        for item in scalars.iter() {
            self.append_scalar(item);
        }
        self.append_message(b"end_append_vector");
    }

    pub fn challenge_scalar<F: PrimeField>(&mut self) -> F {
        let rand: [u8; 32] = self.hasher().finalize().into();
        self.update_state(rand);
        F::from_be_bytes_mod_order(&rand)
    }

    pub fn challenge_vector<F: PrimeField>(&mut self, len: usize) -> Vec<F> {
        (0..len).map(|_| self.challenge_scalar()).collect()
    }
}

pub trait AppendToTranscript {
    fn append_to_transcript(&self, transcript: &mut KeccakTranscript);
}
