//! Error types for dbdump
//!
//! Provides a unified error type for all dump and restore operations.
//! Every variant is terminal for the operation that raised it; nothing is
//! retried internally.

use thiserror::Error;

use crate::protocol::ObjectId;

/// Result type alias using DumpError
pub type Result<T> = std::result::Result<T, DumpError>;

/// Unified error type for dbdump operations
#[derive(Debug, Error)]
pub enum DumpError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Archive Format Errors
    // -------------------------------------------------------------------------
    #[error("not a dump file: magic title does not match")]
    NotADumpFile,

    #[error("dump version {found} is not supported (max supported: {max_supported})")]
    UnsupportedVersion { found: u64, max_supported: u64 },

    #[error("dump integrity is compromised: header data does not match the checksum")]
    HeaderIntegrityViolation,

    #[error(
        "dump integrity is compromised: data block does not match the checksum \
         (object {object_id}, chunk {chunk_index})"
    )]
    DataIntegrityViolation {
        object_id: ObjectId,
        chunk_index: usize,
    },

    #[error("malformed dump header: {0}")]
    MalformedHeader(String),

    #[error("truncated input: needed {needed} bytes, {remaining} remaining")]
    TruncatedInput { needed: usize, remaining: usize },

    #[error("truncated archive: {0}")]
    TruncatedArchive(String),

    // -------------------------------------------------------------------------
    // Dump-time Errors
    // -------------------------------------------------------------------------
    #[error("integrity mismatch: {0}")]
    IntegrityMismatch(String),

    // -------------------------------------------------------------------------
    // Caller / Collaborator Errors
    // -------------------------------------------------------------------------
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("connection error: {0}")]
    Connection(String),
}

impl DumpError {
    /// True for checksum failures, which must never be tolerated or repaired
    pub fn is_integrity_violation(&self) -> bool {
        matches!(
            self,
            DumpError::HeaderIntegrityViolation | DumpError::DataIntegrityViolation { .. }
        )
    }
}
