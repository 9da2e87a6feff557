//! Error types for the PIR library

use thiserror::Error;

/// Errors surfaced by query construction, query processing, and the
/// authenticated-PIR protocol. Proof *rejection* is not an error: the
/// verification functions return `false` instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PirError {
    /// Slot conversion was asked for zero chunks.
    #[error("cannot divide slot data into 0 chunks")]
    InvalidChunkCount,

    /// A query result had an unexpected slot-array shape.
    #[error("invalid result shape: expected {expected}, got {got}")]
    InvalidResultShape { expected: usize, got: usize },

    /// The query target lies outside the selection domain.
    #[error("query target {target} outside domain of size {domain}")]
    DomainOverflow { target: u64, domain: u64 },

    /// Group size is zero, exceeds the database, or does not divide the
    /// row-phase width.
    #[error("invalid group size {0}")]
    InvalidGroupSize(usize),

    /// Both ASPIR challenge tokens decrypted to non-zero values.
    #[error("both challenge tokens non-zero, server likely cheating")]
    ServerCheating,

    /// A keyword query was issued against a database without keywords.
    #[error("keyword query requires {expected} keywords, found {got}")]
    MissingKeywords { expected: usize, got: usize },

    /// Keyword-index construction requires sorted input.
    #[error("keyword index data is not sorted")]
    UnsortedData,
}
