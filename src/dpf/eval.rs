//! Server-side DPF evaluation.

use super::gen::{read_word, seed_to_int};
use super::{prf, Dpf, Key2P, KeyMp, AES_BLOCK_SIZE, CW_BYTES};

const RIGHT: usize = AES_BLOCK_SIZE + 1;

impl Dpf {
    /// Evaluate a two-party key share at `x`.
    ///
    /// Walks the GGM tree along the bits of `x`, applying the level's
    /// correction word whenever the control bit is set. Party 1 returns
    /// its result negated so the two shares reconstruct by plain
    /// addition.
    pub fn eval_two_party(&self, server_num: usize, key: &Key2P, x: u64) -> i64 {
        let num_bits = self.num_bits as usize;

        let mut s_curr = key.s_init;
        let mut t_curr = key.t_init;
        let mut out = [0u8; AES_BLOCK_SIZE * 3];

        for i in 0..num_bits {
            let x_bit = ((x >> (num_bits - 1 - i)) & 1) as u8;

            prf(self.ciphers(), &s_curr, 3, &mut out);

            // G(s) ^ t * (s_cw || t_l_cw || s_cw || t_r_cw)
            let cw = &key.cw[i];
            if t_curr == 1 {
                for j in 0..AES_BLOCK_SIZE {
                    out[j] ^= cw[j];
                    out[RIGHT + j] ^= cw[j];
                }
                out[AES_BLOCK_SIZE] ^= cw[AES_BLOCK_SIZE];
                out[AES_BLOCK_SIZE * 2 + 1] ^= cw[AES_BLOCK_SIZE + 1];
            }

            if x_bit == 0 {
                s_curr.copy_from_slice(&out[..AES_BLOCK_SIZE]);
                t_curr = out[AES_BLOCK_SIZE] % 2;
            } else {
                s_curr.copy_from_slice(&out[RIGHT..RIGHT + AES_BLOCK_SIZE]);
                t_curr = out[AES_BLOCK_SIZE * 2 + 1] % 2;
            }
        }

        let val = seed_to_int(&s_curr)
            .wrapping_add((t_curr as i64).wrapping_mul(key.final_cw));
        if server_num == 0 {
            val
        } else {
            val.wrapping_neg()
        }
    }

    /// Evaluate a multi-party key share at `x`. The output is XOR-linear
    /// across the parties' shares.
    pub fn eval_multi_party(&self, key: &KeyMp, x: u64) -> u32 {
        let (p2, mu, _) = self.mp_dimensions(key.num_parties);

        let gamma = (x / mu as u64) as usize;
        let delta = (x % mu as u64) as usize;

        let num_blocks = (CW_BYTES * mu).div_ceil(AES_BLOCK_SIZE);
        let mut prf_out = vec![0u8; num_blocks * AES_BLOCK_SIZE];
        let row = &key.sigma[gamma];

        let mut y = vec![0u32; mu];
        for i in 0..p2 {
            let block = &row[i * AES_BLOCK_SIZE..(i + 1) * AES_BLOCK_SIZE];
            if block.iter().all(|&b| b == 0) {
                continue;
            }

            let mut seed = [0u8; AES_BLOCK_SIZE];
            seed.copy_from_slice(block);
            prf(self.ciphers(), &seed, num_blocks, &mut prf_out);

            for (k, acc) in y.iter_mut().enumerate() {
                *acc ^= read_word(&prf_out, k) ^ key.cw[i][k];
            }
        }

        y[delta]
    }
}
