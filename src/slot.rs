//! Fixed-width byte records.
//!
//! A [`Slot`] is the unit of storage in a PIR database: a byte string of
//! fixed width with XOR, lexicographic comparison, and a chunked
//! conversion to and from big-integer arrays. The chunked conversion is
//! what lets one slot span several AHE ciphertexts when the slot is wider
//! than the plaintext space.

use num_bigint::BigUint;
use num_traits::Zero;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::PirError;

/// A fixed-width byte record. Position in the database is its identity;
/// a slot carries no key of its own.
///
/// Comparison is lexicographic over the raw bytes (derived `Ord`).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Slot {
    pub data: Vec<u8>,
}

impl Slot {
    /// Wrap raw bytes in a slot.
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// All-zero slot of the given width.
    pub fn empty(num_bytes: usize) -> Self {
        Self { data: vec![0u8; num_bytes] }
    }

    /// Uniformly random slot of the given width.
    pub fn random(num_bytes: usize, rng: &mut impl Rng) -> Self {
        let mut data = vec![0u8; num_bytes];
        rng.fill(&mut data[..]);
        Self { data }
    }

    /// Encode a string into a slot of width `slot_bytes`, padding with
    /// trailing zeros.
    pub fn from_string(s: &str, slot_bytes: usize) -> Self {
        let mut data = s.as_bytes().to_vec();
        data.resize(slot_bytes.max(data.len()), 0);
        Self { data }
    }

    /// Slot width in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// True if every byte is zero.
    pub fn is_zero(&self) -> bool {
        self.data.iter().all(|&b| b == 0)
    }

    /// XOR `other` into this slot in place. Both slots must have equal
    /// width.
    pub fn xor_with(&mut self, other: &Slot) {
        assert_eq!(self.data.len(), other.data.len(), "slot width mismatch");
        for (a, b) in self.data.iter_mut().zip(other.data.iter()) {
            *a ^= b;
        }
    }

    /// Decode the slot back into a string, dropping the trailing zero
    /// padding added by [`Slot::from_string`].
    pub fn to_string_lossy(&self) -> String {
        let end = self
            .data
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |p| p + 1);
        String::from_utf8_lossy(&self.data[..end]).into_owned()
    }

    /// Split the slot into `num_chunks` big integers of
    /// `max(1, ceil(len / num_chunks))` bytes each, big-endian.
    ///
    /// Returns the chunk values and the chunk width actually used; the
    /// width is needed by [`Slot::from_biguint_array`] to restore leading
    /// zeros on the round trip.
    pub fn to_biguint_array(
        &self,
        num_chunks: usize,
    ) -> Result<(Vec<BigUint>, usize), PirError> {
        if num_chunks == 0 {
            return Err(PirError::InvalidChunkCount);
        }

        let bytes_per_chunk = self.data.len().div_ceil(num_chunks).max(1);
        let mut res = Vec::with_capacity(num_chunks);
        for i in 0..num_chunks {
            let start = i * bytes_per_chunk;
            let end = (start + bytes_per_chunk).min(self.data.len());
            if start >= end {
                // more chunks requested than there is data
                res.push(BigUint::zero());
            } else {
                res.push(BigUint::from_bytes_be(&self.data[start..end]));
            }
        }

        Ok((res, bytes_per_chunk))
    }

    /// Reassemble a slot of width `num_bytes` from chunk values produced
    /// with chunk width `bytes_per_chunk`.
    ///
    /// A chunk's minimal byte encoding may be shorter than the chunk
    /// width; the missing bytes are leading zeros. The final chunk may
    /// additionally hold fewer than `bytes_per_chunk` bytes, so its bytes
    /// are anchored flush against the right end of the output.
    pub fn from_biguint_array(
        arr: &[BigUint],
        num_bytes: usize,
        bytes_per_chunk: usize,
    ) -> Slot {
        let mut data = vec![0u8; num_bytes];
        let mut next_byte = 0;
        for v in arr {
            // minimal big-endian encoding; empty for zero
            let vb = if v.is_zero() { Vec::new() } else { v.to_bytes_be() };

            if next_byte + bytes_per_chunk <= num_bytes {
                // interior chunk: missing bytes are leading zeros
                if vb.len() <= bytes_per_chunk {
                    next_byte += bytes_per_chunk - vb.len();
                }
            } else {
                // residual chunk: right-anchor whatever bytes remain
                next_byte = num_bytes - vb.len();
            }

            for b in vb {
                data[next_byte] = b;
                next_byte += 1;
            }
        }

        Slot { data }
    }
}

/// XOR `b` into `a`. Free-function form for symmetry with the recovery
/// loops that fold many shares together.
pub fn xor_slots(a: &mut Slot, b: &Slot) {
    a.xor_with(b);
}

/// Minimal slot width able to hold every string in `data`.
pub fn required_slot_size(data: &[String]) -> usize {
    data.iter().map(|s| s.len()).max().unwrap_or(0)
}
