//! Header codec
//!
//! Serialization of the single metadata record that precedes the data
//! region: schema text, per-object block metadata and per-chunk checksums.

use bytes::Bytes;

use crate::error::{DumpError, Result};
use crate::protocol::ObjectId;

use super::{BinReader, BinWriter, Checksum, CHECKSUM_LEN, OBJECT_ID_LEN};

/// Smallest possible encoded block: id + dep count + type desc len + size + chunk count
const MIN_BLOCK_SIZE: usize = OBJECT_ID_LEN + 4 + 4 + 8 + 8;

/// Encoded chunk entry: size (8) + checksum (20)
const CHUNK_ENTRY_SIZE: usize = 8 + CHECKSUM_LEN;

/// Size and digest of one chunk, in write order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkInfo {
    pub size: u64,
    pub checksum: Checksum,
}

/// Archived metadata for one schema object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRecord {
    pub object_id: ObjectId,
    /// Order is preserved on disk
    pub dependency_ids: Vec<ObjectId>,
    /// Opaque on-wire shape of the object's data, handed back on restore
    pub type_descriptor: Bytes,
    pub total_data_size: u64,
    pub chunks: Vec<ChunkInfo>,
}

impl BlockRecord {
    /// Sum of the recorded chunk sizes, `None` on overflow
    pub fn chunk_size_sum(&self) -> Option<u64> {
        self.chunks
            .iter()
            .try_fold(0u64, |acc, c| acc.checked_add(c.size))
    }
}

/// The full header record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpHeader {
    pub server_timestamp: u64,
    pub server_version: Bytes,
    pub schema_text: Bytes,
    pub blocks: Vec<BlockRecord>,
}

/// Encode a header to bytes
pub fn encode_header(header: &DumpHeader) -> Result<Bytes> {
    let mut w = BinWriter::new();

    w.write_u64(header.server_timestamp);
    w.write_len32_prefixed(&header.server_version)?;
    w.write_len32_prefixed(&header.schema_text)?;

    w.write_u64(header.blocks.len() as u64);
    for block in &header.blocks {
        w.write_bytes(block.object_id.as_bytes());

        let dep_count = u32::try_from(block.dependency_ids.len()).map_err(|_| {
            DumpError::InvalidParameter(format!(
                "object {} has too many dependencies",
                block.object_id
            ))
        })?;
        w.write_u32(dep_count);
        for dep in &block.dependency_ids {
            w.write_bytes(dep.as_bytes());
        }

        w.write_len32_prefixed(&block.type_descriptor)?;
        w.write_u64(block.total_data_size);

        w.write_u64(block.chunks.len() as u64);
        for chunk in &block.chunks {
            w.write_u64(chunk.size);
            w.write_bytes(&chunk.checksum);
        }
    }

    Ok(w.finish())
}

/// Decode a header from bytes
///
/// Any shortfall, implausible count or trailing garbage is `MalformedHeader`.
pub fn decode_header(bytes: &[u8]) -> Result<DumpHeader> {
    let mut r = BinReader::new(bytes);
    let header = read_header(&mut r).map_err(|e| match e {
        DumpError::TruncatedInput { needed, remaining } => DumpError::MalformedHeader(format!(
            "unexpected end of header at byte {}: needed {} bytes, {} remaining",
            bytes.len() - remaining,
            needed,
            remaining
        )),
        other => other,
    })?;

    if r.remaining() != 0 {
        return Err(DumpError::MalformedHeader(format!(
            "{} trailing bytes after last block",
            r.remaining()
        )));
    }
    Ok(header)
}

fn read_header(r: &mut BinReader<'_>) -> Result<DumpHeader> {
    let server_timestamp = r.read_u64()?;
    let server_version = Bytes::copy_from_slice(r.read_len32_prefixed()?);
    let schema_text = Bytes::copy_from_slice(r.read_len32_prefixed()?);

    let block_count = r.read_u64()?;
    check_count(r, block_count, MIN_BLOCK_SIZE, "block")?;

    let mut blocks = Vec::with_capacity(block_count as usize);
    for _ in 0..block_count {
        blocks.push(read_block(r)?);
    }

    Ok(DumpHeader {
        server_timestamp,
        server_version,
        schema_text,
        blocks,
    })
}

fn read_block(r: &mut BinReader<'_>) -> Result<BlockRecord> {
    let object_id = ObjectId::from_bytes(r.read_array::<OBJECT_ID_LEN>()?);

    let dep_count = r.read_u32()? as u64;
    check_count(r, dep_count, OBJECT_ID_LEN, "dependency")?;
    let mut dependency_ids = Vec::with_capacity(dep_count as usize);
    for _ in 0..dep_count {
        dependency_ids.push(ObjectId::from_bytes(r.read_array::<OBJECT_ID_LEN>()?));
    }

    let type_descriptor = Bytes::copy_from_slice(r.read_len32_prefixed()?);
    let total_data_size = r.read_u64()?;

    let chunk_count = r.read_u64()?;
    check_count(r, chunk_count, CHUNK_ENTRY_SIZE, "chunk")?;
    let mut chunks = Vec::with_capacity(chunk_count as usize);
    for _ in 0..chunk_count {
        let size = r.read_u64()?;
        let checksum = r.read_array::<CHECKSUM_LEN>()?;
        chunks.push(ChunkInfo { size, checksum });
    }

    Ok(BlockRecord {
        object_id,
        dependency_ids,
        type_descriptor,
        total_data_size,
        chunks,
    })
}

/// Reject counts whose minimum encoding cannot fit in what is left.
/// Keeps a corrupt count from driving a huge allocation.
fn check_count(r: &BinReader<'_>, count: u64, min_each: usize, what: &str) -> Result<()> {
    let fits = count
        .checked_mul(min_each as u64)
        .map_or(false, |need| need <= r.remaining() as u64);
    if !fits {
        return Err(DumpError::MalformedHeader(format!(
            "declared {} count {} exceeds the remaining {} header bytes",
            what,
            count,
            r.remaining()
        )));
    }
    Ok(())
}
