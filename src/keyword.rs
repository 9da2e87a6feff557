//! Keyword-to-index search structures.
//!
//! A keyword lookup becomes an index lookup in two rounds: the client
//! resolves its keyword against a public boundary array to find a row,
//! then retrieves that row by PIR and scans it locally. Only the
//! second-layer access is server-observable.

use serde::{Deserialize, Serialize};

use crate::database::{
    Database, DbMetadata, EncryptedQueryResult, SecretSharedQueryResult,
};
use crate::error::PirError;
use crate::query::{EncryptedQuery, QueryShare};
use crate::slot::{required_slot_size, Slot};

/// Padding value appended when the data size must be rounded up. A
/// single DEL byte: collates above printable ASCII content, so appending
/// it to sorted data keeps the order, and it cannot collide with real
/// keys.
const PADDING: &str = "\u{7f}";

/// Search tree with `sqrt(N)` boundaries per layer. One PIR round trip
/// resolves a keyword: the first layer is a public (client-cached)
/// boundary array, the second layer a PIR database over all keys.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrivateSqrtSt {
    /// End-of-group boundaries: `first_layer[k]` is the largest key of
    /// row `k`.
    pub first_layer: Vec<String>,
    pub second_layer: Database,
    pub num_keys: usize,
    pub slot_bytes: usize,
    pub width: usize,
    pub height: usize,
}

impl PrivateSqrtSt {
    /// Build the index over sorted keys, padding until the size has an
    /// integer square root.
    pub fn build_for_data(data: &[String]) -> Result<Self, PirError> {
        assert!(!data.is_empty(), "keyword index needs at least one key");
        if data.windows(2).any(|w| w[0] > w[1]) {
            return Err(PirError::UnsortedData);
        }

        let data = pad_to_sqrt(data);
        let sqrt_dim = (data.len() as f64).sqrt() as usize;

        let first_layer: Vec<String> = (0..sqrt_dim)
            .map(|k| data[(k + 1) * sqrt_dim - 1].clone())
            .collect();

        let slot_bytes = required_slot_size(&data);
        let second_layer = Database::build_for_data_with_slot_size(&data, slot_bytes);

        Ok(Self {
            first_layer,
            second_layer,
            num_keys: data.len(),
            slot_bytes,
            width: sqrt_dim,
            height: sqrt_dim,
        })
    }

    /// Row holding `query`: the first boundary not below it, defaulting
    /// to the last row. Computed client-side against the public
    /// boundary array.
    pub fn row_for_query(&self, query: &str) -> usize {
        self.first_layer
            .iter()
            .position(|boundary| query <= boundary.as_str())
            .unwrap_or(self.first_layer.len() - 1)
    }

    /// Resolve the final index from a recovered row: the first slot not
    /// below the query, at `row * width + col`.
    pub fn resolve_index(&self, row: usize, slots: &[Slot], query: &str) -> usize {
        let query_slot = Slot::from_string(query, self.slot_bytes);
        let col = slots
            .iter()
            .position(|slot| *slot >= query_slot)
            .unwrap_or(slots.len().saturating_sub(1));
        row * self.width + col
    }

    /// Run a secret-shared PIR query against the second layer.
    pub fn private_query(
        &self,
        query: &QueryShare,
        nprocs: usize,
    ) -> Result<SecretSharedQueryResult, PirError> {
        self.second_layer.private_secret_shared_query(query, nprocs)
    }

    /// Run an encrypted PIR query against the second layer.
    pub fn private_encrypted_query(
        &self,
        query: &EncryptedQuery,
        nprocs: usize,
    ) -> Result<EncryptedQueryResult, PirError> {
        self.second_layer.private_encrypted_query(query, nprocs)
    }

    /// Metadata of the second-layer PIR database, for query
    /// construction.
    pub fn second_layer_metadata(&self) -> DbMetadata {
        self.second_layer.metadata
    }
}

/// Binary-search-tree layering of the keys: layer `i` holds the `2^i`
/// depth-`i` boundary nodes of a balanced tree over the sorted data, and
/// each layer is an independent PIR database. Traversal costs
/// `log2(N)` PIR round trips of a constant number of slots each, against
/// the sqrt tree's single wider round trip.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrivateBst {
    pub root: String,
    pub layers: Vec<Database>,
    pub num_keys: usize,
    pub slot_bytes: usize,
}

impl PrivateBst {
    /// Build the layered index over sorted keys, padding the size up to
    /// a power of two.
    pub fn build_for_data(data: &[String]) -> Result<Self, PirError> {
        assert!(!data.is_empty(), "keyword index needs at least one key");
        if data.windows(2).any(|w| w[0] > w[1]) {
            return Err(PirError::UnsortedData);
        }

        let mut data = pad_to_power_of_2(data);
        if data.len() < 2 {
            data.resize(2, PADDING.to_string());
        }
        let depth = data.len().ilog2() as usize;
        let slot_bytes = required_slot_size(&data);

        let layers: Vec<Database> = bst_layers(&data, depth)
            .iter()
            .map(|layer| Database::build_for_data_with_slot_size(layer, slot_bytes))
            .collect();

        let root = bst_layers(&data, 1)[0][0].clone();

        Ok(Self { root, layers, num_keys: data.len(), slot_bytes })
    }

    /// Query one layer of the tree.
    pub fn private_query(
        &self,
        query: &QueryShare,
        layer: usize,
        nprocs: usize,
    ) -> Result<SecretSharedQueryResult, PirError> {
        self.layers[layer].private_secret_shared_query(query, nprocs)
    }
}

/// Group sorted data (of power-of-two length) into `depth` layers where
/// layer `i` holds the `2^i` subtree-median boundaries.
fn bst_layers(data: &[String], depth: usize) -> Vec<Vec<String>> {
    (0..depth)
        .map(|i| {
            let step = data.len() >> i;
            (0..1usize << i)
                .map(|j| data[j * step + step / 2 - 1].clone())
                .collect()
        })
        .collect()
}

/// Pad sorted data with the sentinel until its length is a perfect
/// square.
pub fn pad_to_sqrt(data: &[String]) -> Vec<String> {
    let next_sqrt = (data.len() as f64).sqrt().ceil() as usize;
    let mut padded = data.to_vec();
    padded.resize(next_sqrt * next_sqrt, PADDING.to_string());
    padded
}

/// Pad sorted data with the sentinel until its length is a power of two.
pub fn pad_to_power_of_2(data: &[String]) -> Vec<String> {
    let mut padded = data.to_vec();
    padded.resize(data.len().next_power_of_two(), PADDING.to_string());
    padded
}
