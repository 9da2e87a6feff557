//! Fixed-key PRF expansion.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::BlockEncrypt;
use aes::Aes128;

use super::AES_BLOCK_SIZE;

/// Expand one seed block into `num_blocks * AES_BLOCK_SIZE` output bytes.
///
/// Block `i` is `E_k(x_i) ^ x_i` (Matyas-Meyer-Oseas) where `x_i` is the
/// seed with the block counter folded into its upper half and `k` cycles
/// through the fixed key set. The XOR of the input back into the cipher
/// output is what gives the PRP-to-PRF reduction; raw `E_k(x)` would not.
pub(crate) fn prf(
    ciphers: &[Aes128],
    seed: &[u8; AES_BLOCK_SIZE],
    num_blocks: usize,
    out: &mut [u8],
) {
    debug_assert!(out.len() >= num_blocks * AES_BLOCK_SIZE);

    for i in 0..num_blocks {
        let mut x = *seed;
        for (b, c) in x[8..].iter_mut().zip((i as u64).to_le_bytes()) {
            *b ^= c;
        }

        let mut block = GenericArray::from(x);
        ciphers[i % ciphers.len()].encrypt_block(&mut block);

        let dst = &mut out[i * AES_BLOCK_SIZE..(i + 1) * AES_BLOCK_SIZE];
        for (o, (e, s)) in dst.iter_mut().zip(block.iter().zip(x.iter())) {
            *o = e ^ s;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::Dpf;
    use super::*;

    #[test]
    fn test_client_server_prf_agreement() {
        // identical keys and seeds must expand identically on both ends
        let mut rng = rand::rng();
        let client = Dpf::client_initialize(16, &mut rng);
        let server = Dpf::server_initialize(&client.prf_keys, 16);

        let seed = [0x5au8; AES_BLOCK_SIZE];
        let mut out_c = [0u8; AES_BLOCK_SIZE * 6];
        let mut out_s = [0u8; AES_BLOCK_SIZE * 6];
        prf(client.ciphers(), &seed, 6, &mut out_c);
        prf(server.ciphers(), &seed, 6, &mut out_s);

        assert_eq!(out_c, out_s);
    }

    #[test]
    fn test_prf_blocks_differ() {
        let mut rng = rand::rng();
        let dpf = Dpf::client_initialize(16, &mut rng);

        let seed = [1u8; AES_BLOCK_SIZE];
        let mut out = [0u8; AES_BLOCK_SIZE * 3];
        prf(dpf.ciphers(), &seed, 3, &mut out);

        assert_ne!(out[..16], out[16..32]);
        assert_ne!(out[16..32], out[32..48]);
    }
}
