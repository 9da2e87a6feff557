//! DDLEQ: a statistically sound argument that two nested ciphertexts
//! encrypt the same plaintext under both layers.
//!
//! The witness relation is `ct2 = ct1^(a^n mod n^2) * g^(n^2) mod n^3`,
//! an inner-preserving re-randomization: raising to an `n`-th power
//! multiplies the inner randomness without touching the inner plaintext,
//! and `n^2`-th powers only refresh the outer randomness. The argument
//! is a binary-challenge sigma protocol repeated `8 * sec_param` times
//! and made non-interactive with Fiat-Shamir over SHA-256; a cheating
//! prover survives each round with probability 1/2, so soundness error
//! is `2^-(8 * sec_param)`.

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::One;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::paillier::mod_inverse;
use super::{Ciphertext, EncLevel, PublicKey, SecretKey};

/// A non-interactive DDLEQ argument.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DdleqProof {
    /// Per-round commitments `T_i`.
    commitments: Vec<BigUint>,
    /// Per-round responses: `(u_i, v_i)` opening against `ct1` on a
    /// zero challenge, `(s_i, w_i)` opening against `ct2` on a one.
    responses: Vec<(BigUint, BigUint)>,
    /// Soundness parameter in octets.
    sec_param: usize,
}

impl SecretKey {
    /// Prove that `ct1` and `ct2` carry the same nested plaintext, where
    /// `ct2` was produced by [`SecretKey::nested_randomize`] with inner
    /// witness `a`. The outer witness is implicit: the prover recovers
    /// the outer correction of each one-challenge response by residue
    /// root extraction, which the secret key makes exact.
    pub fn prove_ddleq(
        &self,
        sec_param: usize,
        ct1: &Ciphertext,
        ct2: &Ciphertext,
        a: &BigUint,
        _b: &BigUint,
        rng: &mut impl Rng,
    ) -> DdleqProof {
        let pk = &self.pk;
        let rounds = 8 * sec_param;

        let a_inv = mod_inverse(a, &pk.n2).expect("witness must be a unit");

        let mut nonces = Vec::with_capacity(rounds);
        let mut commitments = Vec::with_capacity(rounds);
        for _ in 0..rounds {
            let u = random_unit_n2(pk, rng);
            let v = super::random_nonce(&pk.n, rng);
            commitments.push(rerandomizer(pk, &ct1.c, &u, &v));
            nonces.push((u, v));
        }

        let challenge = challenge_bits(pk, &ct1.c, &ct2.c, &commitments, rounds);

        let responses = nonces
            .into_iter()
            .zip(challenge.iter())
            .zip(commitments.iter())
            .map(|(((u, v), &bit), t_i)| {
                if !bit {
                    (u, v)
                } else {
                    // shift the opening from ct1 to ct2
                    let s = (&u * &a_inv) % &pk.n2;
                    let opened = rerandomizer(pk, &ct2.c, &s, &BigUint::one());
                    let x = (t_i * mod_inverse(&opened, &pk.n3).expect("unit")) % &pk.n3;
                    let w = self.n2th_root(&x);
                    (s, w)
                }
            })
            .collect();

        DdleqProof { commitments, responses, sec_param }
    }
}

impl PublicKey {
    /// Verify a DDLEQ argument relating two level-2 ciphertexts.
    pub fn verify_ddleq(
        &self,
        ct1: &Ciphertext,
        ct2: &Ciphertext,
        proof: &DdleqProof,
    ) -> bool {
        if ct1.level != EncLevel::Two || ct2.level != EncLevel::Two {
            return false;
        }
        let rounds = 8 * proof.sec_param;
        if proof.commitments.len() != rounds || proof.responses.len() != rounds {
            return false;
        }

        let challenge = challenge_bits(self, &ct1.c, &ct2.c, &proof.commitments, rounds);

        for ((t_i, (x, y)), bit) in proof
            .commitments
            .iter()
            .zip(proof.responses.iter())
            .zip(challenge)
        {
            // degenerate responses sharing a factor with n would let the
            // opening collapse part of the plaintext
            if !x.gcd(&self.n).is_one() || !y.gcd(&self.n).is_one() {
                return false;
            }

            let base = if bit { &ct2.c } else { &ct1.c };
            if rerandomizer(self, base, x, y) != *t_i {
                return false;
            }
        }
        true
    }
}

/// `base^(u^n mod n^2) * v^(n^2) mod n^3` — the inner-preserving
/// re-randomization both sides of the protocol evaluate.
fn rerandomizer(pk: &PublicKey, base: &BigUint, u: &BigUint, v: &BigUint) -> BigUint {
    let exp = u.modpow(&pk.n, &pk.n2);
    (base.modpow(&exp, &pk.n3) * v.modpow(&pk.n2, &pk.n3)) % &pk.n3
}

fn random_unit_n2(pk: &PublicKey, rng: &mut impl Rng) -> BigUint {
    let mut bytes = vec![0u8; pk.n2.to_bytes_be().len() + 8];
    loop {
        rng.fill(&mut bytes[..]);
        let candidate = BigUint::from_bytes_be(&bytes) % &pk.n2;
        if candidate.gcd(&pk.n).is_one() {
            return candidate;
        }
    }
}

/// Fiat-Shamir challenge: `rounds` bits derived from the statement and
/// the round commitments, extended by block counter as needed.
fn challenge_bits(
    pk: &PublicKey,
    c1: &BigUint,
    c2: &BigUint,
    commitments: &[BigUint],
    rounds: usize,
) -> Vec<bool> {
    let mut hasher = Sha256::new();
    for value in [&pk.n, c1, c2].into_iter().chain(commitments.iter()) {
        let bytes = value.to_bytes_be();
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(&bytes);
    }
    let seed = hasher.finalize();

    let mut bits = Vec::with_capacity(rounds);
    let mut counter = 0u64;
    'outer: loop {
        let mut block = Sha256::new();
        block.update(&seed);
        block.update(counter.to_le_bytes());
        for byte in block.finalize() {
            for shift in 0..8 {
                bits.push((byte >> shift) & 1 == 1);
                if bits.len() == rounds {
                    break 'outer;
                }
            }
        }
        counter += 1;
    }
    bits
}
