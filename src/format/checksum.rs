//! Chunk and header digests
//!
//! SHA-1 over raw bytes. Used for corruption detection, not authentication.

use sha1::{Digest, Sha1};

/// Digest width in bytes
pub const CHECKSUM_LEN: usize = 20;

/// A 20-byte SHA-1 digest
pub type Checksum = [u8; CHECKSUM_LEN];

/// Digest of `data`
pub fn checksum(data: &[u8]) -> Checksum {
    Sha1::digest(data).into()
}

/// Lowercase hex rendering, for logs and the inspect tool
pub fn checksum_hex(sum: &Checksum) -> String {
    hex::encode(sum)
}
