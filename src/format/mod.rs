//! Archive Format Module
//!
//! Byte-level layout of a dump file and the primitives used to read and
//! write it. All integers are big-endian (network order), fixed width.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Preamble (53 bytes)                                     │
//! │   Magic (17) | Version: u64 (8)                         │
//! │   HeaderSHA1 (20) | HeaderLen: u64 (8)                  │
//! ├─────────────────────────────────────────────────────────┤
//! │ Header (HeaderLen bytes)                                │
//! │   ServerTs: u64 | ServerVersion: len32 | Schema: len32  │
//! │   BlockCount: u64                                       │
//! │   per block:                                            │
//! │     ObjectId (16) | DepCount: u32 | DepIds (16 each)    │
//! │     TypeDesc: len32 | TotalSize: u64 | ChunkCount: u64  │
//! │     per chunk: ChunkSize: u64 | ChunkSHA1 (20)          │
//! ├─────────────────────────────────────────────────────────┤
//! │ Data Region                                             │
//! │   chunk bytes, block order then chunk order             │
//! └─────────────────────────────────────────────────────────┘
//! ```

mod checksum;
mod cursor;
mod header;

pub use checksum::{checksum, checksum_hex, Checksum, CHECKSUM_LEN};
pub use cursor::{BinReader, BinWriter};
pub use header::{decode_header, encode_header, BlockRecord, ChunkInfo, DumpHeader};

// =============================================================================
// Shared Constants (used by dumper, parser, interleaver)
// =============================================================================

/// Format signature. Not valid text in any Unicode encoding and contains
/// NUL bytes, so text tools treat the file as binary.
pub const MAGIC: &[u8; 17] = b"\xFF\xD8\x00\x00\xD8EDGEDB\x00DUMP\x00";

/// Format version written by this crate
pub const FORMAT_VERSION: u64 = 1;

/// Highest format version the parser accepts by default
pub const MAX_SUPPORTED_VERSION: u64 = 1;

/// Width of a schema object identifier on disk
pub const OBJECT_ID_LEN: usize = 16;

/// Preamble size: Magic (17) + Version (8) + HeaderChecksum (20) + HeaderLen (8)
pub const PREAMBLE_SIZE: usize = MAGIC.len() + 8 + CHECKSUM_LEN + 8;
