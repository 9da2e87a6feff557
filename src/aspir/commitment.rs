//! Random-oracle commitments.

use num_bigint::BigUint;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A binding commitment: SHA-256 over the committed value and a random
/// nonce, with the hash modeled as a random oracle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoCommitment {
    pub hash: [u8; 32],
    pub r: BigUint,
}

impl RoCommitment {
    /// Commit to a value with a fresh 256-bit nonce.
    pub fn commit(value: &BigUint, rng: &mut impl Rng) -> Self {
        let mut nonce = [0u8; 32];
        rng.fill(&mut nonce[..]);
        let r = BigUint::from_bytes_be(&nonce);
        Self { hash: digest(value, &r), r }
    }

    /// True if `value` opens this commitment.
    pub fn check_open(&self, value: &BigUint) -> bool {
        digest(value, &self.r) == self.hash
    }
}

fn digest(value: &BigUint, r: &BigUint) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(value.to_bytes_be());
    hasher.update(r.to_bytes_be());
    hasher.finalize().into()
}
