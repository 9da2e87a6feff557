//! Prime sampling for key generation.

use num_bigint::BigUint;
use num_traits::{One, Zero};
use rand::Rng;

const SMALL_PRIMES: &[u32] = &[
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67,
    71, 73, 79, 83, 89, 97,
];

const MILLER_RABIN_ROUNDS: usize = 40;

/// Sample a random prime of exactly `bits` bits.
pub(crate) fn gen_prime(bits: usize, rng: &mut impl Rng) -> BigUint {
    assert!(bits >= 16, "prime width too small");
    loop {
        let candidate = random_odd(bits, rng);
        if is_prime(&candidate, rng) {
            return candidate;
        }
    }
}

/// Random odd integer with the top bit set, exactly `bits` bits wide.
fn random_odd(bits: usize, rng: &mut impl Rng) -> BigUint {
    let mut bytes = vec![0u8; bits.div_ceil(8)];
    rng.fill(&mut bytes[..]);

    let mut x = BigUint::from_bytes_be(&bytes) % (BigUint::one() << bits);
    x |= BigUint::one() << (bits - 1);
    x |= BigUint::one();
    x
}

/// Miller-Rabin primality test with random bases, after trial division
/// by the small primes.
pub(crate) fn is_prime(n: &BigUint, rng: &mut impl Rng) -> bool {
    for &p in SMALL_PRIMES {
        let p = BigUint::from(p);
        if *n == p {
            return true;
        }
        if (n % &p).is_zero() {
            return false;
        }
    }
    if *n < BigUint::from(2u32) {
        return false;
    }

    // n - 1 = d * 2^s with d odd
    let n_minus_1 = n - 1u32;
    let s = n_minus_1.trailing_zeros().unwrap_or(0);
    let d = &n_minus_1 >> s;

    'witness: for _ in 0..MILLER_RABIN_ROUNDS {
        let a = random_below(&(n - 3u32), rng) + 2u32;
        let mut x = a.modpow(&d, n);
        if x.is_one() || x == n_minus_1 {
            continue;
        }
        for _ in 1..s {
            x = (&x * &x) % n;
            if x == n_minus_1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

fn random_below(bound: &BigUint, rng: &mut impl Rng) -> BigUint {
    let mut bytes = vec![0u8; bound.to_bytes_be().len() + 8];
    rng.fill(&mut bytes[..]);
    BigUint::from_bytes_be(&bytes) % bound
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_primes() {
        let mut rng = rand::rng();
        for p in [101u32, 104729, 2147483647] {
            assert!(is_prime(&BigUint::from(p), &mut rng), "{p} is prime");
        }
        for c in [100u32, 104730, 2147483649] {
            assert!(!is_prime(&BigUint::from(c), &mut rng), "{c} is composite");
        }
    }

    #[test]
    fn test_generated_prime_width() {
        let mut rng = rand::rng();
        let p = gen_prime(64, &mut rng);
        assert_eq!(p.bits(), 64);
        assert!(p.bit(0), "prime must be odd");
    }
}
