//! Client-side query construction and result recovery.
//!
//! A query selects one grid row (or one group, for the recursive
//! variant). Secret-shared queries carry DPF key shares, one per server;
//! encrypted queries carry a unary vector of AHE ciphertexts with
//! exactly one encryption of 1. Query structures are one-shot: built for
//! a single retrieval and never reused.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ahe::{Ciphertext, EncLevel, PublicKey, SecretKey};
use crate::database::{
    index_bits, DbMetadata, DoublyEncryptedQueryResult, EncryptedQueryResult,
    SecretSharedQueryResult, KEYWORD_INDEX_BITS,
};
use crate::dpf::{Dpf, Key2P, KeyMp, PrfKey};
use crate::error::PirError;
use crate::slot::Slot;

/// The DPF key carried by one share of a secret-shared query.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum DpfKeyShare {
    TwoParty(Key2P),
    MultiParty(KeyMp),
}

/// One server's share of a secret-shared PIR query.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryShare {
    pub key: DpfKeyShare,
    /// PRF key set shared by client and servers.
    pub prf_keys: Vec<PrfKey>,
    /// Evaluate rows at their keyword rather than their index.
    pub is_keyword_based: bool,
    pub share_number: usize,
    /// Number of adjacent slots returned per selection.
    pub group_size: usize,
}

/// An encrypted unary selection vector: one ciphertext per row, exactly
/// one of which encrypts 1 (or none, for the blinding query used by
/// authenticated retrieval).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EncryptedQuery {
    pub pk: PublicKey,
    pub bits: Vec<Ciphertext>,
    pub group_size: usize,
    pub db_width: usize,
    pub db_height: usize,
}

/// A recursive query: a level-1 row selection and a level-2 column
/// selection over the encrypted row result.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DoublyEncryptedQuery {
    pub row: EncryptedQuery,
    pub col: EncryptedQuery,
}

// ============================================================================
// Secret-shared query construction
// ============================================================================

impl DbMetadata {
    /// Generate `num_shares` DPF query shares selecting row `index`.
    pub fn new_index_query_shares(
        &self,
        index: usize,
        group_size: usize,
        num_shares: usize,
        rng: &mut impl Rng,
    ) -> Result<Vec<QueryShare>, PirError> {
        self.new_query_shares(index as u64, group_size, num_shares, false, rng)
    }

    /// Generate `num_shares` DPF query shares selecting the row whose
    /// keyword equals `keyword`.
    pub fn new_keyword_query_shares(
        &self,
        keyword: u32,
        group_size: usize,
        num_shares: usize,
        rng: &mut impl Rng,
    ) -> Result<Vec<QueryShare>, PirError> {
        self.new_query_shares(keyword as u64, group_size, num_shares, true, rng)
    }

    fn new_query_shares(
        &self,
        key: u64,
        group_size: usize,
        num_shares: usize,
        is_keyword_based: bool,
        rng: &mut impl Rng,
    ) -> Result<Vec<QueryShare>, PirError> {
        assert!(num_shares >= 2, "secret sharing needs at least two servers");
        if group_size == 0 || group_size > self.db_size {
            return Err(PirError::InvalidGroupSize(group_size));
        }

        let dim_height = self.db_size.div_ceil(group_size);
        let num_bits = if is_keyword_based {
            KEYWORD_INDEX_BITS
        } else {
            index_bits(dim_height)
        };
        if !is_keyword_based && key >= dim_height as u64 {
            return Err(PirError::DomainOverflow {
                target: key,
                domain: dim_height as u64,
            });
        }

        let dpf = Dpf::client_initialize(num_bits, rng);

        let keys: Vec<DpfKeyShare> = if num_shares == 2 {
            let [k0, k1] = dpf.generate_two_server(key, 1, rng);
            vec![DpfKeyShare::TwoParty(k0), DpfKeyShare::TwoParty(k1)]
        } else {
            dpf.generate_multi_server(key, 1, num_shares, rng)
                .into_iter()
                .map(DpfKeyShare::MultiParty)
                .collect()
        };

        Ok(keys
            .into_iter()
            .enumerate()
            .map(|(i, key)| QueryShare {
                key,
                prf_keys: dpf.prf_keys.clone(),
                is_keyword_based,
                share_number: i,
                group_size,
            })
            .collect())
    }
}

// ============================================================================
// Encrypted query construction
// ============================================================================

impl DbMetadata {
    /// Encrypted unary query selecting row `index` of the
    /// bandwidth-optimal grid.
    pub fn new_encrypted_query(
        &self,
        pk: &PublicKey,
        group_size: usize,
        index: usize,
        rng: &mut impl Rng,
    ) -> Result<EncryptedQuery, PirError> {
        let (width, height) = self.optimal_dimensions(group_size)?;
        if index >= height {
            return Err(PirError::DomainOverflow {
                target: index as u64,
                domain: height as u64,
            });
        }

        Ok(EncryptedQuery {
            pk: pk.clone(),
            bits: unary_vector(pk, height, Some(index), EncLevel::One, rng),
            group_size,
            db_width: width,
            db_height: height,
        })
    }

    /// Recursive query selecting group `index`, where groups number
    /// `height * width / group_size` across the grid.
    pub fn new_doubly_encrypted_query(
        &self,
        pk: &PublicKey,
        group_size: usize,
        index: usize,
        rng: &mut impl Rng,
    ) -> Result<DoublyEncryptedQuery, PirError> {
        self.doubly_encrypted_query_impl(pk, group_size, Some(index), rng)
    }

    /// A query that retrieves nothing: every selector encrypts zero.
    /// Used as the blinding half of an authenticated query.
    pub fn new_doubly_encrypted_null_query(
        &self,
        pk: &PublicKey,
        group_size: usize,
        rng: &mut impl Rng,
    ) -> Result<DoublyEncryptedQuery, PirError> {
        self.doubly_encrypted_query_impl(pk, group_size, None, rng)
    }

    fn doubly_encrypted_query_impl(
        &self,
        pk: &PublicKey,
        group_size: usize,
        index: Option<usize>,
        rng: &mut impl Rng,
    ) -> Result<DoublyEncryptedQuery, PirError> {
        let (width, height) = self.optimal_dimensions(group_size)?;
        let groups_per_row = width / group_size;

        let (row_index, col_group) = match index {
            Some(i) => {
                let num_groups = groups_per_row * height;
                if i >= num_groups {
                    return Err(PirError::DomainOverflow {
                        target: i as u64,
                        domain: num_groups as u64,
                    });
                }
                (Some(i / groups_per_row), Some(i % groups_per_row))
            }
            None => (None, None),
        };

        let row = EncryptedQuery {
            pk: pk.clone(),
            bits: unary_vector(pk, height, row_index, EncLevel::One, rng),
            group_size,
            db_width: width,
            db_height: height,
        };
        let col = EncryptedQuery {
            pk: pk.clone(),
            bits: unary_vector(pk, groups_per_row, col_group, EncLevel::Two, rng),
            group_size,
            db_width: group_size,
            db_height: groups_per_row,
        };

        Ok(DoublyEncryptedQuery { row, col })
    }
}

/// Unary encoding of `index` as ciphertexts: `Enc(1)` at the index,
/// `Enc(0)` elsewhere; all zeros when `index` is `None`.
fn unary_vector(
    pk: &PublicKey,
    len: usize,
    index: Option<usize>,
    level: EncLevel,
    rng: &mut impl Rng,
) -> Vec<Ciphertext> {
    (0..len)
        .map(|i| {
            if Some(i) == index {
                pk.encrypt_one_at_level(level, rng)
            } else {
                pk.encrypt_zero_at_level(level, rng)
            }
        })
        .collect()
}

// ============================================================================
// Recovery
// ============================================================================

/// XOR the servers' shares back together into the selected row.
pub fn recover(result_shares: &[SecretSharedQueryResult]) -> Vec<Slot> {
    let first = match result_shares.first() {
        Some(r) => r,
        None => return Vec::new(),
    };

    let mut slots = vec![Slot::empty(first.slot_bytes); first.shares.len()];
    for share in result_shares {
        for (acc, slot) in slots.iter_mut().zip(share.shares.iter()) {
            acc.xor_with(slot);
        }
    }
    slots
}

/// Decrypt an encrypted row result back into slots.
pub fn recover_encrypted(result: &EncryptedQueryResult, sk: &SecretKey) -> Vec<Slot> {
    result
        .slots
        .iter()
        .map(|eslot| {
            let chunks: Vec<_> = eslot.cts.iter().map(|ct| sk.decrypt(ct)).collect();
            Slot::from_biguint_array(
                &chunks,
                result.slot_bytes,
                result.num_bytes_per_ciphertext,
            )
        })
        .collect()
}

/// Decrypt both layers of a recursive query result back into the
/// retrieved group of slots.
pub fn recover_doubly_encrypted(
    result: &DoublyEncryptedQueryResult,
    sk: &SecretKey,
) -> Vec<Slot> {
    result
        .slots
        .iter()
        .map(|dslot| {
            let chunks: Vec<_> = dslot
                .cts
                .iter()
                .map(|ct| sk.nested_decrypt(ct))
                .collect();
            Slot::from_biguint_array(
                &chunks,
                result.slot_bytes,
                result.num_bytes_per_ciphertext,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_construction_domain_checked() {
        let mut rng = rand::rng();
        let md = DbMetadata { slot_bytes: 4, db_size: 16 };

        assert!(md.new_index_query_shares(15, 1, 2, &mut rng).is_ok());
        assert!(matches!(
            md.new_index_query_shares(16, 1, 2, &mut rng),
            Err(PirError::DomainOverflow { .. })
        ));
        assert!(matches!(
            md.new_index_query_shares(0, 0, 2, &mut rng),
            Err(PirError::InvalidGroupSize(0))
        ));
    }

    #[test]
    fn test_share_counts() {
        let mut rng = rand::rng();
        let md = DbMetadata { slot_bytes: 4, db_size: 16 };

        let two = md.new_index_query_shares(3, 1, 2, &mut rng).unwrap();
        assert_eq!(two.len(), 2);
        assert!(matches!(two[0].key, DpfKeyShare::TwoParty(_)));
        assert_eq!(two[1].share_number, 1);

        let three = md.new_index_query_shares(3, 1, 3, &mut rng).unwrap();
        assert_eq!(three.len(), 3);
        assert!(matches!(three[0].key, DpfKeyShare::MultiParty(_)));
    }

    #[test]
    fn test_recover_xors_shares() {
        let a = SecretSharedQueryResult {
            slot_bytes: 2,
            shares: vec![Slot::new(vec![0xf0, 0x0f])],
        };
        let b = SecretSharedQueryResult {
            slot_bytes: 2,
            shares: vec![Slot::new(vec![0xff, 0x00])],
        };
        let recovered = recover(&[a, b]);
        assert_eq!(recovered, vec![Slot::new(vec![0x0f, 0x0f])]);
    }
}
