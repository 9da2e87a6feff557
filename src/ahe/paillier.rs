//! Levelled Paillier operations.

use num_bigint::{BigInt, BigUint};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::Rng;

use super::{Ciphertext, EncLevel, PublicKey, SecretKey};

impl PublicKey {
    /// Ciphertext modulus `n^{s+1}` for a level.
    pub(crate) fn ct_modulus(&self, level: EncLevel) -> &BigUint {
        match level {
            EncLevel::One => &self.n2,
            EncLevel::Two => &self.n3,
        }
    }

    /// Plaintext modulus `n^s` for a level.
    pub(crate) fn plain_modulus(&self, level: EncLevel) -> &BigUint {
        match level {
            EncLevel::One => &self.n,
            EncLevel::Two => &self.n2,
        }
    }

    /// Usable plaintext bytes at level 1, with a two-byte safety margin
    /// so chunk values always stay below the modulus.
    pub fn message_space_bytes(&self) -> usize {
        self.n.to_bytes_be().len() - 2
    }

    /// `(1 + n)^m` reduced at the level's ciphertext modulus, via the
    /// closed-form binomial expansion.
    fn g_pow(&self, m: &BigUint, level: EncLevel) -> BigUint {
        match level {
            // (1+n)^m = 1 + m n (mod n^2)
            EncLevel::One => (BigUint::one() + m % &self.n * &self.n) % &self.n2,
            // (1+n)^m = 1 + m n + C(m,2) n^2 (mod n^3); C(m,2) mod n
            // depends only on m mod n
            EncLevel::Two => {
                let m = m % &self.n2;
                let m1 = &m % &self.n;
                let c2 = if m1.is_zero() {
                    BigUint::zero()
                } else {
                    (&m1 * (&m1 - 1u32)) >> 1
                };
                (BigUint::one() + &m * &self.n + (c2 % &self.n) * &self.n2) % &self.n3
            }
        }
    }

    /// Deterministic encryption with caller-supplied randomness
    /// `r ∈ Z*_n`: `(1+n)^m * r^{n^s} mod n^{s+1}`.
    pub fn encrypt_with_r(&self, m: &BigUint, r: &BigUint, level: EncLevel) -> Ciphertext {
        let modulus = self.ct_modulus(level);
        let r_ns = r.modpow(self.plain_modulus(level), modulus);
        Ciphertext {
            c: (self.g_pow(m, level) * r_ns) % modulus,
            level,
        }
    }

    /// Encrypt a plaintext at level 1.
    pub fn encrypt(&self, m: &BigUint, rng: &mut impl Rng) -> Ciphertext {
        self.encrypt_at_level(m, EncLevel::One, rng)
    }

    /// Encrypt a plaintext at the given level with fresh randomness.
    pub fn encrypt_at_level(
        &self,
        m: &BigUint,
        level: EncLevel,
        rng: &mut impl Rng,
    ) -> Ciphertext {
        let r = random_unit(&self.n, rng);
        self.encrypt_with_r(m, &r, level)
    }

    pub fn encrypt_zero(&self, rng: &mut impl Rng) -> Ciphertext {
        self.encrypt_at_level(&BigUint::zero(), EncLevel::One, rng)
    }

    pub fn encrypt_one(&self, rng: &mut impl Rng) -> Ciphertext {
        self.encrypt_at_level(&BigUint::one(), EncLevel::One, rng)
    }

    pub fn encrypt_zero_at_level(&self, level: EncLevel, rng: &mut impl Rng) -> Ciphertext {
        self.encrypt_at_level(&BigUint::zero(), level, rng)
    }

    pub fn encrypt_one_at_level(&self, level: EncLevel, rng: &mut impl Rng) -> Ciphertext {
        self.encrypt_at_level(&BigUint::one(), level, rng)
    }

    /// The additive identity at a level: an encryption of zero with
    /// fixed, known randomness, so accumulations can start from it
    /// deterministically.
    pub fn null_ciphertext(&self, level: EncLevel) -> Ciphertext {
        Ciphertext { c: BigUint::one(), level }
    }

    /// Ciphertext addition (plaintexts add).
    pub fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Ciphertext {
        assert_eq!(a.level, b.level, "cannot add ciphertexts across levels");
        let modulus = self.ct_modulus(a.level);
        Ciphertext {
            c: (&a.c * &b.c) % modulus,
            level: a.level,
        }
    }

    /// Multiply the plaintext by a cleartext constant.
    pub fn const_mult(&self, ct: &Ciphertext, m: &BigUint) -> Ciphertext {
        let modulus = self.ct_modulus(ct.level);
        Ciphertext {
            c: ct.c.modpow(m, modulus),
            level: ct.level,
        }
    }

    /// Nested subtraction: `nested` is a level-2 encryption of a level-1
    /// ciphertext of `a`, `ct` a level-1 ciphertext of `b`. The result
    /// is a level-2 ciphertext whose nested plaintext is `a - b`.
    ///
    /// Multiplying the inner value by `ct^-1` is the level-1 homomorphic
    /// subtraction, lifted through the outer layer as a constant
    /// multiplication.
    pub fn nested_sub(&self, nested: &Ciphertext, ct: &Ciphertext) -> Ciphertext {
        assert_eq!(nested.level, EncLevel::Two, "nested operand must be level 2");
        assert_eq!(ct.level, EncLevel::One, "subtrahend must be level 1");
        let inv = mod_inverse(&ct.c, &self.n2)
            .expect("ciphertext value must be a unit mod n^2");
        self.const_mult(nested, &inv)
    }
}

impl SecretKey {
    /// Decrypt one layer: a level-1 ciphertext yields its plaintext, a
    /// level-2 ciphertext yields the nested level-1 ciphertext value.
    ///
    /// The all-zero value decrypts to zero. It is not a real ciphertext,
    /// but peeling a nested result of a null query produces it (the
    /// selected inner value is the plaintext zero), and the challenge
    /// flow must decode that branch as zero.
    pub fn decrypt(&self, ct: &Ciphertext) -> BigUint {
        if ct.c.is_zero() {
            return BigUint::zero();
        }
        let pk = &self.pk;
        match ct.level {
            EncLevel::One => {
                let u = ct.c.modpow(&self.lambda, &pk.n2);
                let l = (u - 1u32) / &pk.n;
                (l * &self.lambda_inv_n) % &pk.n
            }
            EncLevel::Two => {
                // extract a = lambda * m mod n^2 from (1+n)^a mod n^3
                let u = ct.c.modpow(&self.lambda, &pk.n3);
                let t = ((u - 1u32) / &pk.n) % &pk.n2;
                let a1 = &t % &pk.n;
                let c2 = if a1.is_zero() {
                    BigUint::zero()
                } else {
                    (&a1 * (&a1 - 1u32)) >> 1
                };
                let correction = (c2 % &pk.n) * &pk.n % &pk.n2;
                let a = (t + &pk.n2 - correction) % &pk.n2;
                (a * &self.lambda_inv_n2) % &pk.n2
            }
        }
    }

    /// Strip the outer layer of a level-2 ciphertext, returning the
    /// nested level-1 ciphertext.
    pub fn decrypt_nested_layer(&self, ct: &Ciphertext) -> Ciphertext {
        assert_eq!(ct.level, EncLevel::Two, "layer decryption needs level 2");
        Ciphertext {
            c: self.decrypt(ct),
            level: EncLevel::One,
        }
    }

    /// Decrypt both layers of a level-2 ciphertext in one call.
    pub fn nested_decrypt(&self, ct: &Ciphertext) -> BigUint {
        let inner = self.decrypt_nested_layer(ct);
        self.decrypt(&inner)
    }

    /// Recover the randomness `r ∈ Z*_n` of a ciphertext.
    pub fn extract_randomness(&self, ct: &Ciphertext) -> BigUint {
        let pk = &self.pk;
        let m = self.decrypt(ct);
        let modulus = pk.ct_modulus(ct.level);

        // strip (1+n)^m, leaving r^{n^s}
        let g_inv = mod_inverse(&pk.g_pow(&m, ct.level), modulus)
            .expect("generator power must be a unit");
        let u = (&ct.c * g_inv) % modulus;

        let exp = match ct.level {
            EncLevel::One => &self.n_inv_lambda,
            EncLevel::Two => &self.n2_inv_lambda,
        };
        (u % &pk.n).modpow(exp, &pk.n)
    }

    /// Re-randomize both layers of a nested ciphertext, returning the
    /// fresh ciphertext together with the multiplicative witnesses
    /// `(a, b)` applied to the inner and outer randomness. These are the
    /// DDLEQ witnesses.
    pub fn nested_randomize(
        &self,
        ct: &Ciphertext,
        rng: &mut impl Rng,
    ) -> (Ciphertext, BigUint, BigUint) {
        assert_eq!(ct.level, EncLevel::Two, "nested randomize needs level 2");
        let pk = &self.pk;

        let outer_r = self.extract_randomness(ct);
        let inner = self.decrypt_nested_layer(ct);
        let inner_r = self.extract_randomness(&inner);
        let m = self.decrypt(&inner);

        let a = random_unit(&pk.n, rng);
        let b = random_unit(&pk.n, rng);

        let inner2 = pk.encrypt_with_r(&m, &((inner_r * &a) % &pk.n), EncLevel::One);
        let ct2 = pk.encrypt_with_r(&inner2.c, &((outer_r * &b) % &pk.n), EncLevel::Two);
        (ct2, a, b)
    }

    /// Root of an `n^2`-th power residue mod `n^3`: the witness-recovery
    /// step of the DDLEQ prover.
    pub(crate) fn n2th_root(&self, x: &BigUint) -> BigUint {
        (x % &self.pk.n).modpow(&self.n2_inv_lambda, &self.pk.n)
    }
}

/// Modular inverse via the extended Euclidean algorithm; `None` when the
/// operand shares a factor with the modulus.
pub(crate) fn mod_inverse(a: &BigUint, m: &BigUint) -> Option<BigUint> {
    let a = BigInt::from(a % m);
    let m = BigInt::from(m.clone());
    let e = a.extended_gcd(&m);
    if !e.gcd.is_one() {
        return None;
    }
    (((e.x % &m) + &m) % &m).to_biguint()
}

/// Uniform element of `Z*_n`.
pub(crate) fn random_unit(n: &BigUint, rng: &mut impl Rng) -> BigUint {
    let num_bytes = n.to_bytes_be().len() + 8;
    let mut bytes = vec![0u8; num_bytes];
    loop {
        rng.fill(&mut bytes[..]);
        let candidate = BigUint::from_bytes_be(&bytes) % n;
        if !candidate.is_zero() && candidate.gcd(n).is_one() {
            return candidate;
        }
    }
}
