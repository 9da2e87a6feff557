//! Client-side DPF key generation.

use rand::Rng;

use super::{prf, Dpf, Key2P, KeyMp, AES_BLOCK_SIZE, CW_BYTES};

const LEFT: usize = 0;
const RIGHT: usize = AES_BLOCK_SIZE + 1;

impl Dpf {
    /// Generate the two key shares of the point function that evaluates
    /// to `b` at `a` and to zero elsewhere, with
    /// `eval(0, k0, x) + eval(1, k1, x)` as the reconstruction.
    ///
    /// At each tree level both parties' seeds are expanded into
    /// `(s_l, t_l, s_r, t_r)`; the "lose" halves (the side off the
    /// target path) are XORed into the level's correction word, and the
    /// two control-bit corrections are set so that exactly one party
    /// flips its control bit on the path to `a`.
    pub fn generate_two_server(&self, a: u64, b: u64, rng: &mut impl Rng) -> [Key2P; 2] {
        let num_bits = self.num_bits as usize;

        let t_init0 = rng.random::<u8>() % 2;
        let mut key0 = Key2P {
            s_init: rng.random(),
            t_init: t_init0,
            cw: Vec::with_capacity(num_bits),
            final_cw: 0,
        };
        let mut key1 = Key2P {
            s_init: rng.random(),
            t_init: t_init0 ^ 1,
            cw: Vec::with_capacity(num_bits),
            final_cw: 0,
        };

        let mut s_curr0 = key0.s_init;
        let mut s_curr1 = key1.s_init;
        let mut t_curr0 = key0.t_init;
        let mut t_curr1 = key1.t_init;

        let mut out0 = [0u8; AES_BLOCK_SIZE * 3];
        let mut out1 = [0u8; AES_BLOCK_SIZE * 3];

        for i in 0..num_bits {
            // expand each seed into two seeds plus two control bits
            prf(self.ciphers(), &s_curr0, 3, &mut out0);
            prf(self.ciphers(), &s_curr1, 3, &mut out1);

            let t0_left = out0[AES_BLOCK_SIZE] % 2;
            let t0_right = out0[AES_BLOCK_SIZE * 2 + 1] % 2;
            let t1_left = out1[AES_BLOCK_SIZE] % 2;
            let t1_right = out1[AES_BLOCK_SIZE * 2 + 1] % 2;

            let a_bit = ((a >> (num_bits - 1 - i)) & 1) as u8;
            let (keep, lose) = if a_bit == 0 { (LEFT, RIGHT) } else { (RIGHT, LEFT) };

            let mut cw = [0u8; AES_BLOCK_SIZE + 2];
            for j in 0..AES_BLOCK_SIZE {
                cw[j] = out0[lose + j] ^ out1[lose + j];
            }
            cw[AES_BLOCK_SIZE] = t0_left ^ t1_left ^ a_bit ^ 1;
            cw[AES_BLOCK_SIZE + 1] = t0_right ^ t1_right ^ a_bit;

            for j in 0..AES_BLOCK_SIZE {
                s_curr0[j] = out0[keep + j] ^ (t_curr0 * cw[j]);
                s_curr1[j] = out1[keep + j] ^ (t_curr1 * cw[j]);
            }

            let t_cw_keep = if keep == RIGHT {
                cw[AES_BLOCK_SIZE + 1]
            } else {
                cw[AES_BLOCK_SIZE]
            };
            t_curr0 = (out0[keep + AES_BLOCK_SIZE] % 2) ^ (t_cw_keep * t_curr0);
            t_curr1 = (out1[keep + AES_BLOCK_SIZE] % 2) ^ (t_cw_keep * t_curr1);

            key0.cw.push(cw);
            key1.cw.push(cw);
        }

        // final correction over the integers; party 1 negates its output
        let mut final_cw = (b as i64)
            .wrapping_sub(seed_to_int(&s_curr0))
            .wrapping_add(seed_to_int(&s_curr1));
        if t_curr1 == 1 {
            final_cw = final_cw.wrapping_neg();
        }
        key0.final_cw = final_cw;
        key1.final_cw = final_cw;

        [key0, key1]
    }

    /// Generate `num_parties >= 3` key shares of the point function
    /// `f_{a,b}` with XOR reconstruction.
    ///
    /// The domain splits into `nu` rows of `mu` columns with
    /// `(gamma, delta) = (a / mu, a % mu)`. Per row and party a
    /// `2^(p-1)`-bit selection vector is sampled; the last party's bits
    /// are forced so the column XOR is 1 exactly on row `gamma`. The
    /// correction words are then chosen so the selected PRF expansions
    /// cancel to `b` at column `delta` and to zero elsewhere.
    pub fn generate_multi_server(
        &self,
        a: u64,
        b: u32,
        num_parties: usize,
        rng: &mut impl Rng,
    ) -> Vec<KeyMp> {
        assert!(num_parties >= 3, "multi-party DPF needs at least 3 parties");
        let (p2, mu, nu) = self.mp_dimensions(num_parties);

        let gamma = (a / mu as u64) as usize;
        let delta = (a % mu as u64) as usize;

        // selection bits: a_bits[row][party][k]
        let mut a_bits = vec![vec![vec![0u8; p2]; num_parties]; nu];
        for (row, row_bits) in a_bits.iter_mut().enumerate() {
            for k in 0..p2 {
                let mut parity = 0u8;
                for party in 0..num_parties - 1 {
                    let bit = rng.random::<u8>() % 2;
                    row_bits[party][k] = bit;
                    parity ^= bit;
                }
                row_bits[num_parties - 1][k] =
                    if row == gamma { parity ^ 1 } else { parity };
            }
        }

        // seeds[row][k]
        let seeds: Vec<Vec<[u8; AES_BLOCK_SIZE]>> = (0..nu)
            .map(|_| (0..p2).map(|_| rng.random()).collect())
            .collect();

        let num_blocks = (CW_BYTES * mu).div_ceil(AES_BLOCK_SIZE);
        let mut prf_out = vec![0u8; num_blocks * AES_BLOCK_SIZE];

        // all correction word rows are random except the last, which is
        // fixed so the XOR along the target row comes out to b at delta
        let mut cw = vec![vec![0u32; mu]; p2];
        let mut cw_acc = vec![0u32; mu];
        for i in 0..p2 {
            prf(self.ciphers(), &seeds[gamma][i], num_blocks, &mut prf_out);
            for (k, acc) in cw_acc.iter_mut().enumerate() {
                *acc ^= read_word(&prf_out, k);
            }
            if i == p2 - 1 {
                break;
            }
            for j in 0..mu {
                cw[i][j] = rng.random();
                cw_acc[j] ^= cw[i][j];
            }
        }
        for j in 0..mu {
            cw[p2 - 1][j] = if j == delta { b ^ cw_acc[j] } else { cw_acc[j] };
        }

        // per-party sigma tables: seed where the selection bit is set,
        // zero block otherwise
        (0..num_parties)
            .map(|party| {
                let sigma = (0..nu)
                    .map(|row| {
                        let mut blocks = vec![0u8; AES_BLOCK_SIZE * p2];
                        for k in 0..p2 {
                            if a_bits[row][party][k] != 0 {
                                blocks[k * AES_BLOCK_SIZE..(k + 1) * AES_BLOCK_SIZE]
                                    .copy_from_slice(&seeds[row][k]);
                            }
                        }
                        blocks
                    })
                    .collect();
                KeyMp { sigma, cw: cw.clone(), num_parties }
            })
            .collect()
    }
}

/// Interpret the low 8 bytes of a seed as a signed integer.
pub(super) fn seed_to_int(seed: &[u8; AES_BLOCK_SIZE]) -> i64 {
    let mut low = [0u8; 8];
    low.copy_from_slice(&seed[..8]);
    i64::from_le_bytes(low)
}

/// Read the `k`-th little-endian correction word from a PRF output.
pub(super) fn read_word(out: &[u8], k: usize) -> u32 {
    let mut word = [0u8; CW_BYTES];
    word.copy_from_slice(&out[CW_BYTES * k..CW_BYTES * (k + 1)]);
    u32::from_le_bytes(word)
}
