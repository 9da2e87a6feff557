//! Grid-shaped slot store and the server-side query engines.
//!
//! A database is a linear sequence of equal-width slots. Queries view it
//! as a `height x width` grid with `slot_index = row * width + col`:
//! rows are the unit selection acts on, columns are the unit returned.
//! Three engines process queries against the grid:
//!
//! - [`Database::private_secret_shared_query`] expands a DPF share into
//!   per-row selection bits and XORs the selected rows.
//! - [`Database::private_encrypted_query`] applies an encrypted unary
//!   selection vector homomorphically, one `const_mult`/`add` pair per
//!   slot chunk.
//! - [`Database::private_doubly_encrypted_query`] runs the encrypted row
//!   query and then column-selects *over the resulting ciphertexts*
//!   under a second encryption layer, returning one group of adjacent
//!   slots.
//!
//! The slot array is immutable after build, so concurrent queries are
//! race-free; all per-query mutable state lives in per-worker buffers.

use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ahe::{Ciphertext, EncLevel, PublicKey};
use crate::dpf::Dpf;
use crate::error::PirError;
use crate::query::{DoublyEncryptedQuery, DpfKeyShare, EncryptedQuery, QueryShare};
use crate::slot::Slot;

/// Number of bits the DPF uses for keyword-based queries.
pub(crate) const KEYWORD_INDEX_BITS: u32 = 32;

/// Bits needed to address `dim_height` rows.
pub(crate) fn index_bits(dim_height: usize) -> u32 {
    usize::BITS - dim_height.max(1).leading_zeros()
}

/// Layout and size information for a slot database.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbMetadata {
    pub slot_bytes: usize,
    pub db_size: usize,
}

/// A set of slots arranged in a grid, with an optional parallel keyword
/// array for keyword-based DPF queries.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Database {
    pub metadata: DbMetadata,
    pub slots: Vec<Slot>,
    pub keywords: Vec<u32>,
}

// ============================================================================
// Results
// ============================================================================

/// Shares of the selected row, to be XORed across servers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SecretSharedQueryResult {
    pub slot_bytes: usize,
    pub shares: Vec<Slot>,
}

/// One slot under level-1 encryption. A slot wider than the plaintext
/// space spans several ciphertexts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EncryptedSlot {
    pub cts: Vec<Ciphertext>,
}

/// One slot under two encryption layers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DoublyEncryptedSlot {
    pub cts: Vec<Ciphertext>,
}

/// Result of an encrypted row query: one encrypted slot per grid column.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EncryptedQueryResult {
    pub slots: Vec<EncryptedSlot>,
    pub pk: PublicKey,
    pub slot_bytes: usize,
    /// Chunk width used when slots were split into ciphertexts; the
    /// client needs it to invert the chunking.
    pub num_bytes_per_ciphertext: usize,
}

/// Result of a recursive query: one doubly encrypted slot per group
/// member.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DoublyEncryptedQueryResult {
    pub slots: Vec<DoublyEncryptedSlot>,
    pub pk: PublicKey,
    pub slot_bytes: usize,
    pub num_bytes_per_ciphertext: usize,
}

// ============================================================================
// Grid derivation
// ============================================================================

impl DbMetadata {
    /// Map a slot index to `(row, col)` for a grid of the given width.
    pub fn index_to_coordinates(&self, index: usize, width: usize) -> (usize, usize) {
        (index / width, index % width)
    }

    /// Bandwidth-optimal grid `(width, height)` for this database:
    /// `height ~ sqrt(db_size * slot_bytes)`, width rounded up to a
    /// multiple of the group size, height trimmed to fit.
    pub fn optimal_dimensions(&self, group_size: usize) -> Result<(usize, usize), PirError> {
        let height = (((self.db_size * self.slot_bytes) as f64).sqrt() as usize).max(1);
        self.dimensions_for_height(height, group_size)
    }

    /// Grid `(width, height)` for an explicit height constraint.
    pub fn dimensions_for_height(
        &self,
        height: usize,
        group_size: usize,
    ) -> Result<(usize, usize), PirError> {
        self.dimensions_for_height_width_multiple(height, group_size, 1)
    }

    /// Grid derivation with the width additionally rounded up to a
    /// multiple of `width_multiple`.
    pub fn dimensions_for_height_width_multiple(
        &self,
        height: usize,
        group_size: usize,
        width_multiple: usize,
    ) -> Result<(usize, usize), PirError> {
        if group_size == 0 || group_size > self.db_size {
            return Err(PirError::InvalidGroupSize(group_size));
        }

        let mut width = self.db_size.div_ceil(height.max(1));
        width = width.next_multiple_of(group_size);
        if width_multiple > 0 {
            width = width.next_multiple_of(width_multiple);
        }

        // trim the height to fit the database without empty rows
        let height = self.db_size.div_ceil(width);
        Ok((width, height))
    }
}

// ============================================================================
// Construction
// ============================================================================

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a database where each record gets one slot, sized to the
    /// longest record.
    pub fn build_for_data<R: AsRef<[u8]>>(records: &[R]) -> Self {
        let slot_bytes = records
            .iter()
            .map(|r| r.as_ref().len())
            .max()
            .unwrap_or(0);
        Self::build_for_data_with_slot_size(records, slot_bytes)
    }

    /// Build a database with an explicit slot width; records are padded
    /// with trailing zeros.
    pub fn build_for_data_with_slot_size<R: AsRef<[u8]>>(
        records: &[R],
        slot_bytes: usize,
    ) -> Self {
        let slots = records
            .iter()
            .map(|r| {
                let mut data = r.as_ref().to_vec();
                data.resize(slot_bytes, 0);
                Slot::new(data)
            })
            .collect();

        Self {
            metadata: DbMetadata { slot_bytes, db_size: records.len() },
            slots,
            keywords: Vec::new(),
        }
    }

    /// Associate a 32-bit keyword with each slot. The array length must
    /// equal the database size.
    pub fn set_keywords(&mut self, keywords: Vec<u32>) -> Result<(), PirError> {
        if keywords.len() != self.metadata.db_size {
            return Err(PirError::MissingKeywords {
                expected: self.metadata.db_size,
                got: keywords.len(),
            });
        }
        self.keywords = keywords;
        Ok(())
    }

    /// Database of uniformly random slots (test and benchmark helper).
    pub fn new_random(size: usize, slot_bytes: usize, rng: &mut impl Rng) -> Self {
        Self {
            metadata: DbMetadata { slot_bytes, db_size: size },
            slots: (0..size).map(|_| Slot::random(slot_bytes, rng)).collect(),
            keywords: Vec::new(),
        }
    }

    /// Database of all-zero slots (benchmark helper).
    pub fn new_empty(size: usize, slot_bytes: usize) -> Self {
        Self {
            metadata: DbMetadata { slot_bytes, db_size: size },
            slots: (0..size).map(|_| Slot::empty(slot_bytes)).collect(),
            keywords: Vec::new(),
        }
    }
}

// ============================================================================
// Secret-shared queries
// ============================================================================

impl Database {
    /// Process one share of a DPF query, returning this server's XOR
    /// share of the selected row.
    ///
    /// The expansion stage evaluates the DPF at every row index (or row
    /// keyword) and keeps the parity of the evaluation; the scan stage
    /// XORs each selected row's slots into per-worker column
    /// accumulators which are then folded together. Work is split into
    /// `nprocs` contiguous row ranges.
    pub fn private_secret_shared_query(
        &self,
        query: &QueryShare,
        nprocs: usize,
    ) -> Result<SecretSharedQueryResult, PirError> {
        let md = &self.metadata;
        if query.group_size == 0 || query.group_size > md.db_size {
            return Err(PirError::InvalidGroupSize(query.group_size));
        }

        let dim_width = query.group_size;
        let dim_height = md.db_size.div_ceil(query.group_size);

        let num_bits = if query.is_keyword_based {
            KEYWORD_INDEX_BITS
        } else {
            index_bits(dim_height)
        };
        if query.is_keyword_based && self.keywords.len() < dim_height {
            return Err(PirError::MissingKeywords {
                expected: dim_height,
                got: self.keywords.len(),
            });
        }

        debug!(
            db_size = md.db_size,
            dim_width, dim_height, nprocs, "processing secret-shared query"
        );

        let dpf = Dpf::server_initialize(&query.prf_keys, num_bits);
        let nprocs = nprocs.max(1);
        let rows_per_proc = dim_height.div_ceil(nprocs);

        // expansion stage: one selection bit per row
        let mut bits = vec![false; dim_height];
        bits.par_chunks_mut(rows_per_proc)
            .enumerate()
            .for_each(|(chunk, out)| {
                let base = chunk * rows_per_proc;
                for (i, bit) in out.iter_mut().enumerate() {
                    let row = base + i;
                    let x = if query.is_keyword_based {
                        self.keywords[row] as u64
                    } else {
                        row as u64
                    };
                    // parity taken on the integer result, never after a
                    // float cast
                    *bit = match &query.key {
                        DpfKeyShare::TwoParty(k) => {
                            dpf.eval_two_party(query.share_number, k, x) % 2 != 0
                        }
                        DpfKeyShare::MultiParty(k) => dpf.eval_multi_party(k, x) % 2 != 0,
                    };
                }
            });

        // scan stage: XOR selected rows into per-worker accumulators
        let shares = bits
            .par_chunks(rows_per_proc)
            .enumerate()
            .map(|(chunk, rows)| {
                let mut acc = vec![Slot::empty(md.slot_bytes); dim_width];
                let base = chunk * rows_per_proc;
                for (i, &selected) in rows.iter().enumerate() {
                    if !selected {
                        continue;
                    }
                    let row = base + i;
                    for (col, slot_acc) in acc.iter_mut().enumerate() {
                        let slot_index = row * dim_width + col;
                        if slot_index >= self.slots.len() {
                            break;
                        }
                        slot_acc.xor_with(&self.slots[slot_index]);
                    }
                }
                acc
            })
            .reduce(
                || vec![Slot::empty(md.slot_bytes); dim_width],
                |mut a, b| {
                    for (x, y) in a.iter_mut().zip(b.iter()) {
                        x.xor_with(y);
                    }
                    a
                },
            );

        Ok(SecretSharedQueryResult { slot_bytes: md.slot_bytes, shares })
    }
}

// ============================================================================
// Encrypted queries
// ============================================================================

impl Database {
    /// Process an encrypted selection vector, returning the selected row
    /// under level-1 encryption.
    ///
    /// Slots wider than the AHE plaintext space split into several
    /// ciphertexts; each worker owns a contiguous row range and
    /// accumulates `const_mult(selector[row], chunk)` products into its
    /// own column buffers, combined by homomorphic addition at the end.
    pub fn private_encrypted_query(
        &self,
        query: &EncryptedQuery,
        nprocs: usize,
    ) -> Result<EncryptedQueryResult, PirError> {
        let md = &self.metadata;
        let (dim_width, dim_height) = (query.db_width, query.db_height);
        if query.bits.len() < dim_height {
            return Err(PirError::InvalidResultShape {
                expected: dim_height,
                got: query.bits.len(),
            });
        }

        let cts_per_slot = md.slot_bytes.div_ceil(query.pk.message_space_bytes()).max(1);
        let bytes_per_ct = md.slot_bytes.div_ceil(cts_per_slot).max(1);

        debug!(
            db_size = md.db_size,
            dim_width, dim_height, cts_per_slot, nprocs, "processing encrypted query"
        );

        let nprocs = nprocs.max(1);
        let rows_per_proc = dim_height.div_ceil(nprocs).max(1);

        let slots = (0..nprocs)
            .into_par_iter()
            .map(|worker| {
                let start = worker * rows_per_proc;
                let end = (start + rows_per_proc).min(dim_height);

                let mut acc: Vec<EncryptedSlot> = (0..dim_width)
                    .map(|_| EncryptedSlot {
                        cts: vec![query.pk.null_ciphertext(EncLevel::One); cts_per_slot],
                    })
                    .collect();

                for row in start..end {
                    for (col, slot_acc) in acc.iter_mut().enumerate() {
                        let slot_index = row * dim_width + col;
                        if slot_index >= self.slots.len() {
                            continue;
                        }

                        let (chunks, _) = self.slots[slot_index]
                            .to_biguint_array(cts_per_slot)
                            .expect("chunk count is positive");

                        for (j, chunk) in chunks.iter().enumerate() {
                            let sel = query.pk.const_mult(&query.bits[row], chunk);
                            slot_acc.cts[j] = query.pk.add(&slot_acc.cts[j], &sel);
                        }
                    }
                }
                acc
            })
            .reduce_with(|mut a, b| {
                for (x, y) in a.iter_mut().zip(b.iter()) {
                    for (cx, cy) in x.cts.iter_mut().zip(y.cts.iter()) {
                        *cx = query.pk.add(cx, cy);
                    }
                }
                a
            })
            .unwrap_or_default();

        Ok(EncryptedQueryResult {
            slots,
            pk: query.pk.clone(),
            slot_bytes: md.slot_bytes,
            num_bytes_per_ciphertext: bytes_per_ct,
        })
    }

    /// Run the encrypted row query, then column-select over the row's
    /// ciphertexts under a second encryption layer. Returns one group of
    /// adjacent slots, doubly encrypted.
    pub fn private_doubly_encrypted_query(
        &self,
        query: &DoublyEncryptedQuery,
        nprocs: usize,
    ) -> Result<DoublyEncryptedQueryResult, PirError> {
        let md = &self.metadata;
        if query.row.group_size == 0 || query.row.group_size > md.db_size {
            return Err(PirError::InvalidGroupSize(query.row.group_size));
        }
        if query.col.group_size == 0 || query.col.group_size > query.row.db_width {
            return Err(PirError::InvalidGroupSize(query.col.group_size));
        }

        let row_result = self.private_encrypted_query(&query.row, nprocs)?;
        self.private_encrypted_query_over_encrypted_result(&query.col, &row_result)
    }

    /// Column phase of the recursive query, split out so a caller that
    /// already holds a row result can reuse it.
    ///
    /// Each level-1 ciphertext of the row result becomes a level-2
    /// plaintext: `const_mult(selector[col / g], ct)` accumulated by
    /// group member. The output is `group_size` doubly encrypted slots.
    pub fn private_encrypted_query_over_encrypted_result(
        &self,
        query: &EncryptedQuery,
        result: &EncryptedQueryResult,
    ) -> Result<DoublyEncryptedQueryResult, PirError> {
        let group_size = query.group_size;
        if group_size == 0
            || group_size > result.slots.len()
            || result.slots.len() % group_size != 0
        {
            return Err(PirError::InvalidGroupSize(group_size));
        }

        let num_groups = result.slots.len() / group_size;
        if query.bits.len() < num_groups {
            return Err(PirError::InvalidResultShape {
                expected: num_groups,
                got: query.bits.len(),
            });
        }

        let cts_per_slot = result.slots.first().map_or(0, |s| s.cts.len());
        let mut acc: Vec<DoublyEncryptedSlot> = (0..group_size)
            .map(|_| DoublyEncryptedSlot {
                cts: vec![query.pk.null_ciphertext(EncLevel::Two); cts_per_slot],
            })
            .collect();

        for (col, slot) in result.slots.iter().enumerate() {
            let member = col % group_size;
            let selector = &query.bits[col / group_size];

            for (j, ct) in slot.cts.iter().enumerate() {
                let sel = query.pk.const_mult(selector, &ct.c);
                acc[member].cts[j] = query.pk.add(&acc[member].cts[j], &sel);
            }
        }

        Ok(DoublyEncryptedQueryResult {
            slots: acc,
            pk: result.pk.clone(),
            slot_bytes: self.metadata.slot_bytes,
            num_bytes_per_ciphertext: result.num_bytes_per_ciphertext,
        })
    }
}
