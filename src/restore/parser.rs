//! Dump file parser
//!
//! Validates the preamble and header of a dump file and rebuilds the block
//! offset table. No data bytes are read here.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::error::{DumpError, Result};
use crate::format::{
    checksum, decode_header, BinReader, ChunkInfo, CHECKSUM_LEN, MAGIC, MAX_SUPPORTED_VERSION,
    PREAMBLE_SIZE,
};
use crate::protocol::ObjectId;

/// One block with its position in the data region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedBlock {
    pub object_id: ObjectId,
    pub dependency_ids: Vec<ObjectId>,
    pub type_descriptor: Bytes,
    /// Offset of the block's first chunk, relative to the data region
    pub data_offset: u64,
    pub total_data_size: u64,
    pub chunks: Vec<ChunkInfo>,
}

/// Everything the header says, plus derived offsets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDumpInfo {
    pub path: PathBuf,
    pub dump_version: u64,
    pub server_timestamp: u64,
    pub server_version: Bytes,
    pub schema_text: Bytes,
    pub blocks: Vec<ParsedBlock>,
    /// Absolute file offset where the data region starts
    pub header_offset: u64,
}

impl ParsedDumpInfo {
    /// Total size of the data region
    pub fn data_size(&self) -> u64 {
        self.blocks.iter().map(|b| b.total_data_size).sum()
    }

    /// Total number of chunks across all blocks
    pub fn chunk_count(&self) -> usize {
        self.blocks.iter().map(|b| b.chunks.len()).sum()
    }

    /// `(object_id, type_descriptor)` pairs in declaration order
    pub fn restore_blocks(&self) -> Vec<(ObjectId, Bytes)> {
        self.blocks
            .iter()
            .map(|b| (b.object_id, b.type_descriptor.clone()))
            .collect()
    }
}

/// Parse a dump file accepting format versions up to `MAX_SUPPORTED_VERSION`
pub fn parse(path: &Path) -> Result<ParsedDumpInfo> {
    parse_with_max_version(path, MAX_SUPPORTED_VERSION)
}

/// Parse a dump file accepting format versions up to `max_version`
///
/// Checks, in order: magic title, version, header length against the file
/// size, header checksum, header structure, block sizes, data region length.
pub fn parse_with_max_version(path: &Path, max_version: u64) -> Result<ParsedDumpInfo> {
    let mut file = File::open(path)?;
    let file_len = file.metadata()?.len();

    // Preamble
    let mut preamble = Vec::with_capacity(PREAMBLE_SIZE);
    (&mut file)
        .take(PREAMBLE_SIZE as u64)
        .read_to_end(&mut preamble)?;

    if preamble.len() < MAGIC.len() || &preamble[..MAGIC.len()] != MAGIC {
        return Err(DumpError::NotADumpFile);
    }
    let short_preamble = || {
        DumpError::TruncatedArchive(format!(
            "file is {} bytes, shorter than the {}-byte preamble",
            file_len, PREAMBLE_SIZE
        ))
    };

    // Version is gated before anything after it is looked at
    let mut r = BinReader::new(&preamble[MAGIC.len()..]);
    let dump_version = r.read_u64().map_err(|_| short_preamble())?;
    if dump_version > max_version {
        return Err(DumpError::UnsupportedVersion {
            found: dump_version,
            max_supported: max_version,
        });
    }
    if preamble.len() < PREAMBLE_SIZE {
        return Err(short_preamble());
    }
    let header_checksum = r.read_array::<CHECKSUM_LEN>()?;
    let header_len = r.read_u64()?;

    // Header
    let available = file_len.saturating_sub(PREAMBLE_SIZE as u64);
    if header_len > available {
        return Err(DumpError::TruncatedArchive(format!(
            "header declares {} bytes, only {} follow the preamble",
            header_len, available
        )));
    }
    let mut header_bytes = vec![0u8; header_len as usize];
    file.read_exact(&mut header_bytes).map_err(|e| truncated(e, "header"))?;

    if checksum(&header_bytes) != header_checksum {
        return Err(DumpError::HeaderIntegrityViolation);
    }
    let header = decode_header(&header_bytes)?;

    // Offsets
    let header_offset = PREAMBLE_SIZE as u64 + header_len;
    let mut offset = 0u64;
    let mut blocks = Vec::with_capacity(header.blocks.len());
    for block in header.blocks {
        if block.chunk_size_sum() != Some(block.total_data_size) {
            return Err(DumpError::MalformedHeader(format!(
                "object {} declares {} bytes but its chunks do not add up to that",
                block.object_id, block.total_data_size
            )));
        }
        let data_offset = offset;
        offset = offset.checked_add(block.total_data_size).ok_or_else(|| {
            DumpError::MalformedHeader("data region size overflows u64".to_string())
        })?;
        blocks.push(ParsedBlock {
            object_id: block.object_id,
            dependency_ids: block.dependency_ids,
            type_descriptor: block.type_descriptor,
            data_offset,
            total_data_size: block.total_data_size,
            chunks: block.chunks,
        });
    }

    let data_available = file_len - header_offset;
    if offset > data_available {
        return Err(DumpError::TruncatedArchive(format!(
            "data region declares {} bytes, file holds {}",
            offset, data_available
        )));
    }

    tracing::debug!(
        "Parsed {}: version {}, {} blocks, {} data bytes at offset {}",
        path.display(),
        dump_version,
        blocks.len(),
        offset,
        header_offset
    );

    Ok(ParsedDumpInfo {
        path: path.to_path_buf(),
        dump_version,
        server_timestamp: header.server_timestamp,
        server_version: header.server_version,
        schema_text: header.schema_text,
        blocks,
        header_offset,
    })
}

/// Map a short read to `TruncatedArchive`, pass other I/O errors through
pub(super) fn truncated(e: std::io::Error, what: &str) -> DumpError {
    if e.kind() == ErrorKind::UnexpectedEof {
        DumpError::TruncatedArchive(format!("unexpected end of file while reading {}", what))
    } else {
        DumpError::Io(e)
    }
}
