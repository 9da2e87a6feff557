//! Private information retrieval with authenticated queries.
//!
//! A client fetches one record from a server-held database without
//! revealing which record it wants. Two query backends share one
//! grid-shaped record store:
//!
//! - **Secret-shared (multi-server).** The client splits a point
//!   function into DPF key shares, one per server; each server expands
//!   its share over the row domain and returns an XOR share of the
//!   selected row. Two-server and 3+-server variants, index- or
//!   keyword-addressed.
//! - **Encrypted (single-server).** The client sends a unary vector of
//!   additively homomorphic ciphertexts; the server folds the database
//!   through it and returns the selected row encrypted. A recursive
//!   variant column-selects over the encrypted row under a second
//!   encryption layer, returning one group of adjacent records.
//!
//! On top of retrieval, the [`aspir`] module adds authentication: the
//! client proves it knows a secret tag bound to the fetched record,
//! without revealing the record identity. See [`keyword`] for the
//! structures that turn a keyword lookup into an index lookup.
//!
//! The crate defines no wire protocol: query and result types derive
//! `serde` traits and callers marshal them with the transport of their
//! choice.
//!
//! ```
//! use aspir::{Database, recover};
//!
//! let mut rng = rand::rng();
//! let records: Vec<&[u8]> = vec![b"alpha", b"bravo", b"charl", b"delta"];
//! let db = Database::build_for_data(&records);
//!
//! // client: two DPF shares selecting row 1, one per server
//! let shares = db.metadata.new_index_query_shares(1, 2, 2, &mut rng).unwrap();
//!
//! // each server processes its share independently
//! let res0 = db.private_secret_shared_query(&shares[0], 1).unwrap();
//! let res1 = db.private_secret_shared_query(&shares[1], 1).unwrap();
//!
//! // client: XOR the shares back together
//! let row = recover(&[res0, res1]);
//! assert_eq!(row[0].data, b"charl");
//! ```

pub mod ahe;
pub mod aspir;
pub mod database;
pub mod dpf;
pub mod error;
pub mod keyword;
pub mod query;
pub mod slot;

pub use database::{
    Database, DbMetadata, DoublyEncryptedQueryResult, DoublyEncryptedSlot,
    EncryptedQueryResult, EncryptedSlot, SecretSharedQueryResult,
};
pub use error::PirError;
pub use query::{
    recover, recover_doubly_encrypted, recover_encrypted, DoublyEncryptedQuery,
    DpfKeyShare, EncryptedQuery, QueryShare,
};
pub use slot::{required_slot_size, xor_slots, Slot};
