//! Distributed point functions.
//!
//! A point function `f_{a,b}` evaluates to `b` at `a` and to zero
//! everywhere else. The two-party construction follows Boyle-Gilboa-Ishai
//! (CCS 2016): a GGM-style tree of PRF expansions with one correction
//! word per level, keys of size `O(num_bits)`. The multi-party
//! construction (3+ servers) is the BGI multi-party point function with
//! XOR-linear output.
//!
//! Both sides of the protocol drive the same fixed-key AES PRF: the
//! client samples the key set at initialization and ships it inside each
//! query share, the server rebuilds the ciphers from those keys, and
//! identical seeds then expand to identical blocks on both ends.

mod eval;
mod gen;
mod prf;

use aes::cipher::KeyInit;
use aes::Aes128;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub(crate) use prf::prf;

/// AES block size in bytes.
pub(crate) const AES_BLOCK_SIZE: usize = 16;

/// Number of fixed AES keys in the PRF key set.
pub(crate) const NUM_PRF_KEYS: usize = 4;

/// Bytes per correction word entry in the multi-party construction.
pub(crate) const CW_BYTES: usize = 4;

/// One fixed AES key, shared between the client and every server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrfKey(pub [u8; AES_BLOCK_SIZE]);

/// A two-party DPF key share.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Key2P {
    /// Initial seed of the evaluation tree.
    pub s_init: [u8; AES_BLOCK_SIZE],
    /// Initial control bit.
    pub t_init: u8,
    /// Per-level correction word: an AES block plus the two control bits.
    pub cw: Vec<[u8; AES_BLOCK_SIZE + 2]>,
    /// Final integer correction applied when the control bit is set.
    pub final_cw: i64,
}

/// A multi-party DPF key share for `num_parties >= 3`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyMp {
    /// Per-row seed table: `nu` rows of `2^(p-1)` blocks, zeroed where
    /// this party's selection bit is unset.
    pub sigma: Vec<Vec<u8>>,
    /// Correction word table shared by all parties: `2^(p-1)` rows of
    /// `mu` words.
    pub cw: Vec<Vec<u32>>,
    pub num_parties: usize,
}

/// DPF context: domain size plus the fixed-key AES ciphers.
pub struct Dpf {
    /// Number of input bits; the domain is `[0, 2^num_bits)`.
    pub num_bits: u32,
    /// The PRF key set, shipped to servers inside query shares.
    pub prf_keys: Vec<PrfKey>,
    ciphers: Vec<Aes128>,
}

impl Dpf {
    /// Client-side initialization: samples a fresh PRF key set.
    pub fn client_initialize(num_bits: u32, rng: &mut impl Rng) -> Self {
        let prf_keys: Vec<PrfKey> =
            (0..NUM_PRF_KEYS).map(|_| PrfKey(rng.random())).collect();
        Self::from_keys(prf_keys, num_bits)
    }

    /// Server-side initialization from the PRF keys carried by a query
    /// share.
    pub fn server_initialize(prf_keys: &[PrfKey], num_bits: u32) -> Self {
        Self::from_keys(prf_keys.to_vec(), num_bits)
    }

    fn from_keys(prf_keys: Vec<PrfKey>, num_bits: u32) -> Self {
        let ciphers = prf_keys
            .iter()
            .map(|k| Aes128::new(&k.0.into()))
            .collect();
        Self { num_bits, prf_keys, ciphers }
    }

    pub(crate) fn ciphers(&self) -> &[Aes128] {
        &self.ciphers
    }

    /// Multi-party table dimensions `(p2, mu, nu)` for a party count.
    pub(crate) fn mp_dimensions(&self, num_parties: usize) -> (usize, usize, usize) {
        let p2 = 1usize << (num_parties - 1);
        let mu = (2f64.powf(self.num_bits as f64 / 2.0)
            * 2f64.powf((num_parties - 1) as f64 / 2.0))
        .ceil() as usize;
        let nu = (2f64.powf(self.num_bits as f64) / mu as f64).ceil() as usize;
        (p2, mu, nu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_two_server_point_function() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        for _ in 0..10 {
            let num: u64 = rng.random_range(100..1124);
            let target = rng.random_range(0..num);
            let value = rng.random_range(1..num);

            let num_bits = 64 - num.leading_zeros();
            let client = Dpf::client_initialize(num_bits, &mut rng);
            let [key0, key1] = client.generate_two_server(target, value, &mut rng);

            let server = Dpf::server_initialize(&client.prf_keys, num_bits);
            for x in 0..num {
                let ans0 = server.eval_two_party(0, &key0, x);
                let ans1 = server.eval_two_party(1, &key1, x);
                let sum = ans0.wrapping_add(ans1);

                if x == target {
                    assert_eq!(sum, value as i64, "wrong value at target {x}");
                } else {
                    assert_eq!(sum, 0, "non-zero at {x}");
                }
            }
        }
    }

    #[test]
    fn test_two_server_full_domain() {
        // num_bits = 11, a = 10, b = 1: exact sum over all 2048 points
        let mut rng = rand::rng();
        let client = Dpf::client_initialize(11, &mut rng);
        let [key0, key1] = client.generate_two_server(10, 1, &mut rng);
        let server = Dpf::server_initialize(&client.prf_keys, 11);

        for x in 0..2048u64 {
            let sum = server
                .eval_two_party(0, &key0, x)
                .wrapping_add(server.eval_two_party(1, &key1, x));
            assert_eq!(sum, i64::from(x == 10));
        }
    }

    #[test]
    fn test_two_server_parity() {
        // parity of the two evaluations differs exactly at the target
        let mut rng = rand::rng();
        let client = Dpf::client_initialize(9, &mut rng);
        let target = 137;
        let [key0, key1] = client.generate_two_server(target, 1, &mut rng);
        let server = Dpf::server_initialize(&client.prf_keys, 9);

        for x in 0..512u64 {
            let bit0 = server.eval_two_party(0, &key0, x) % 2 != 0;
            let bit1 = server.eval_two_party(1, &key1, x) % 2 != 0;
            assert_eq!(bit0 ^ bit1, x == target);
        }
    }

    #[test]
    fn test_two_server_keyword_domain() {
        // sparse evaluation over a 64-bit domain
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let keyword: u64 = rng.random_range(0..1 << 62);

        let client = Dpf::client_initialize(64, &mut rng);
        let [key0, key1] = client.generate_two_server(keyword, 1, &mut rng);
        let server = Dpf::server_initialize(&client.prf_keys, 64);

        for i in 0..100 {
            let x = if i == 0 { keyword } else { rng.random_range(0..1 << 62) };
            let sum = server
                .eval_two_party(0, &key0, x)
                .wrapping_add(server.eval_two_party(1, &key1, x));
            assert_eq!(sum, i64::from(x == keyword));
        }
    }

    #[test]
    fn test_multi_party_point_function() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        for &num_parties in &[3usize, 4, 5] {
            let num_bits = 8;
            let target = rng.random_range(0..1 << num_bits);
            let value: u32 = rng.random();

            let client = Dpf::client_initialize(num_bits, &mut rng);
            let keys =
                client.generate_multi_server(target, value, num_parties, &mut rng);
            let server = Dpf::server_initialize(&client.prf_keys, num_bits);

            for x in 0..1u64 << num_bits {
                let xor = keys
                    .iter()
                    .fold(0u32, |acc, k| acc ^ server.eval_multi_party(k, x));
                if x == target {
                    assert_eq!(xor, value, "{num_parties} parties, target {x}");
                } else {
                    assert_eq!(xor, 0, "{num_parties} parties, point {x}");
                }
            }
        }
    }

    #[test]
    fn test_multi_party_parity() {
        // with b = 1, the XOR of evaluation parities marks the target row
        let mut rng = rand::rng();
        let client = Dpf::client_initialize(10, &mut rng);
        let target = 600;
        let keys = client.generate_multi_server(target, 1, 3, &mut rng);
        let server = Dpf::server_initialize(&client.prf_keys, 10);

        for x in 0..1024u64 {
            let parity = keys
                .iter()
                .fold(false, |acc, k| acc ^ (server.eval_multi_party(k, x) % 2 != 0));
            assert_eq!(parity, x == target);
        }
    }
}
