//! Additively homomorphic encryption with nested levels.
//!
//! The PIR engine consumes a narrow AHE surface: level-1 and level-2
//! encryption (a level-2 plaintext is exactly a level-1 ciphertext
//! value), ciphertext addition, ciphertext-by-constant multiplication, a
//! deterministic null ciphertext to seed accumulations, nested
//! subtraction and decryption, randomness extraction, re-randomization
//! with witnesses, and a DDLEQ argument over nested ciphertexts.
//!
//! This module realizes that surface with a levelled Paillier scheme:
//! level `s` encrypts `m ∈ Z_{n^s}` as `(1+n)^m * r^{n^s} mod n^{s+1}`
//! with `r ∈ Z*_n`. Level 2 over the same modulus makes the plaintext
//! space `Z_{n^2}`, which holds a level-1 ciphertext with no re-chunking.

mod ddleq;
mod paillier;
mod primes;

pub use ddleq::DdleqProof;

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::One;
use rand::Rng;
use serde::{Deserialize, Serialize};

use paillier::{mod_inverse, random_unit};
use primes::gen_prime;

/// Encryption level: how many layers of encryption a ciphertext carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncLevel {
    One,
    Two,
}

/// A Paillier ciphertext at a given level.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ciphertext {
    pub c: BigUint,
    pub level: EncLevel,
}

/// Public encryption key. `n2` and `n3` are the level-1 and level-2
/// ciphertext moduli.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    pub n: BigUint,
    pub(crate) n2: BigUint,
    pub(crate) n3: BigUint,
}

/// Secret decryption key; also holds a copy of the public key since
/// every private operation needs the moduli.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SecretKey {
    pub pk: PublicKey,
    /// `lcm(p - 1, q - 1)`
    pub(crate) lambda: BigUint,
    pub(crate) lambda_inv_n: BigUint,
    pub(crate) lambda_inv_n2: BigUint,
    /// `n^-1 mod lambda`, for level-1 randomness extraction
    pub(crate) n_inv_lambda: BigUint,
    /// `(n^2)^-1 mod lambda`, for level-2 randomness extraction
    pub(crate) n2_inv_lambda: BigUint,
}

impl PublicKey {
    pub(crate) fn new(n: BigUint) -> Self {
        let n2 = &n * &n;
        let n3 = &n2 * &n;
        Self { n, n2, n3 }
    }
}

/// Generate a key pair with a modulus of roughly `bits` bits.
///
/// Resamples until `gcd(n, lambda) = 1`, which the decryption and
/// randomness-extraction inverses all require.
pub fn key_gen(bits: usize, rng: &mut impl Rng) -> (SecretKey, PublicKey) {
    loop {
        let p = gen_prime(bits / 2, rng);
        let q = gen_prime(bits - bits / 2, rng);
        if p == q {
            continue;
        }

        let n = &p * &q;
        let lambda = (&p - 1u32).lcm(&(&q - 1u32));
        if n.gcd(&lambda) != BigUint::one() {
            continue;
        }

        let pk = PublicKey::new(n);
        let (lambda_inv_n, lambda_inv_n2, n_inv_lambda, n2_inv_lambda) = match (
            mod_inverse(&lambda, &pk.n),
            mod_inverse(&lambda, &pk.n2),
            mod_inverse(&pk.n, &lambda),
            mod_inverse(&pk.n2, &lambda),
        ) {
            (Some(a), Some(b), Some(c), Some(d)) => (a, b, c, d),
            _ => continue,
        };

        let sk = SecretKey {
            pk: pk.clone(),
            lambda,
            lambda_inv_n,
            lambda_inv_n2,
            n_inv_lambda,
            n2_inv_lambda,
        };
        return (sk, pk);
    }
}

/// Sample a uniform unit of `Z*_n` (used for encryption randomness and
/// protocol nonces).
pub(crate) fn random_nonce(n: &BigUint, rng: &mut impl Rng) -> BigUint {
    random_unit(n, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::Zero;

    fn test_keys() -> (SecretKey, PublicKey) {
        let mut rng = rand::rng();
        key_gen(128, &mut rng)
    }

    #[test]
    fn test_encrypt_decrypt_level_one() {
        let mut rng = rand::rng();
        let (sk, pk) = test_keys();

        for m in [0u32, 1, 2, 255, 10_000] {
            let ct = pk.encrypt(&BigUint::from(m), &mut rng);
            assert_eq!(sk.decrypt(&ct), BigUint::from(m));
        }
    }

    #[test]
    fn test_encrypt_decrypt_level_two() {
        let mut rng = rand::rng();
        let (sk, pk) = test_keys();

        // a level-2 plaintext can be as large as n^2 - 1
        let m = &pk.n2 - 3u32;
        let ct = pk.encrypt_at_level(&m, EncLevel::Two, &mut rng);
        assert_eq!(sk.decrypt(&ct), m);
    }

    #[test]
    fn test_additive_homomorphism() {
        let mut rng = rand::rng();
        let (sk, pk) = test_keys();

        let a = pk.encrypt(&BigUint::from(17u32), &mut rng);
        let b = pk.encrypt(&BigUint::from(25u32), &mut rng);
        assert_eq!(sk.decrypt(&pk.add(&a, &b)), BigUint::from(42u32));

        let scaled = pk.const_mult(&a, &BigUint::from(3u32));
        assert_eq!(sk.decrypt(&scaled), BigUint::from(51u32));
    }

    #[test]
    fn test_null_ciphertext_is_identity() {
        let mut rng = rand::rng();
        let (sk, pk) = test_keys();

        for level in [EncLevel::One, EncLevel::Two] {
            let null = pk.null_ciphertext(level);
            let m = BigUint::from(99u32);
            let ct = pk.encrypt_at_level(&m, level, &mut rng);
            assert_eq!(sk.decrypt(&pk.add(&null, &ct)), m);
            assert!(sk.decrypt(&null).is_zero());
        }
    }

    #[test]
    fn test_nested_decrypt_round_trip() {
        let mut rng = rand::rng();
        let (sk, pk) = test_keys();

        let m = BigUint::from(1234u32);
        let inner = pk.encrypt(&m, &mut rng);
        let outer = pk.encrypt_at_level(&inner.c, EncLevel::Two, &mut rng);

        // one layer peels back to the inner ciphertext
        let peeled = sk.decrypt_nested_layer(&outer);
        assert_eq!(peeled.c, inner.c);
        assert_eq!(sk.nested_decrypt(&outer), m);
    }

    #[test]
    fn test_nested_sub() {
        let mut rng = rand::rng();
        let (sk, pk) = test_keys();

        let a = pk.encrypt(&BigUint::from(70u32), &mut rng);
        let b = pk.encrypt(&BigUint::from(28u32), &mut rng);
        let nested = pk.encrypt_at_level(&a.c, EncLevel::Two, &mut rng);

        let diff = pk.nested_sub(&nested, &b);
        assert_eq!(sk.nested_decrypt(&diff), BigUint::from(42u32));

        // equal inner plaintexts cancel to a nested zero
        let b2 = pk.encrypt(&BigUint::from(70u32), &mut rng);
        let zero = pk.nested_sub(&nested, &b2);
        assert!(sk.nested_decrypt(&zero).is_zero());
    }

    #[test]
    fn test_extract_randomness() {
        let mut rng = rand::rng();
        let (sk, pk) = test_keys();

        for level in [EncLevel::One, EncLevel::Two] {
            let m = BigUint::from(5u32);
            let r = random_nonce(&pk.n, &mut rng);
            let ct = pk.encrypt_with_r(&m, &r, level);
            assert_eq!(sk.extract_randomness(&ct), r);
        }
    }

    #[test]
    fn test_nested_randomize_preserves_plaintext() {
        let mut rng = rand::rng();
        let (sk, pk) = test_keys();

        let m = BigUint::from(7u32);
        let inner = pk.encrypt(&m, &mut rng);
        let ct = pk.encrypt_at_level(&inner.c, EncLevel::Two, &mut rng);

        let (ct2, _, _) = sk.nested_randomize(&ct, &mut rng);
        assert_ne!(ct2.c, ct.c);
        assert_eq!(sk.nested_decrypt(&ct2), m);
    }

    #[test]
    fn test_randomize_witnesses_reconstruct() {
        // the claimed randomness must rebuild ct2 exactly, which is the
        // final equation of the ASPIR proof check
        let mut rng = rand::rng();
        let (sk, pk) = test_keys();

        let inner = pk.encrypt(&BigUint::zero(), &mut rng);
        let ct = pk.encrypt_at_level(&inner.c, EncLevel::Two, &mut rng);
        let (ct2, _, _) = sk.nested_randomize(&ct, &mut rng);

        let s = sk.extract_randomness(&ct2);
        let peeled = sk.decrypt_nested_layer(&ct2);
        let r = sk.extract_randomness(&peeled);

        let check_inner = pk.encrypt_with_r(&BigUint::zero(), &r, EncLevel::One);
        let check = pk.encrypt_with_r(&check_inner.c, &s, EncLevel::Two);
        assert_eq!(check.c, ct2.c);
    }

    #[test]
    fn test_ddleq_accepts_honest_rerandomization() {
        let mut rng = rand::rng();
        let (sk, pk) = test_keys();

        let inner = pk.encrypt(&BigUint::from(3u32), &mut rng);
        let ct1 = pk.encrypt_at_level(&inner.c, EncLevel::Two, &mut rng);
        let (ct2, a, b) = sk.nested_randomize(&ct1, &mut rng);

        let proof = sk.prove_ddleq(4, &ct1, &ct2, &a, &b, &mut rng);
        assert!(pk.verify_ddleq(&ct1, &ct2, &proof));
    }

    #[test]
    fn test_ddleq_rejects_different_plaintexts() {
        let mut rng = rand::rng();
        let (sk, pk) = test_keys();

        let inner1 = pk.encrypt(&BigUint::from(3u32), &mut rng);
        let ct1 = pk.encrypt_at_level(&inner1.c, EncLevel::Two, &mut rng);
        let (ct2, a, b) = sk.nested_randomize(&ct1, &mut rng);

        // unrelated ciphertext with a different nested plaintext
        let inner3 = pk.encrypt(&BigUint::from(4u32), &mut rng);
        let ct3 = pk.encrypt_at_level(&inner3.c, EncLevel::Two, &mut rng);

        let proof = sk.prove_ddleq(4, &ct1, &ct2, &a, &b, &mut rng);
        assert!(!pk.verify_ddleq(&ct1, &ct3, &proof));
        assert!(!pk.verify_ddleq(&ct3, &ct2, &proof));
    }

    #[test]
    fn test_message_space_bytes() {
        let (_, pk) = test_keys();
        // 128-bit modulus: 16 bytes minus the 2-byte safety margin
        assert_eq!(pk.message_space_bytes(), 14);
    }
}
