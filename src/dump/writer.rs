//! Dumper
//!
//! Drives a dump session end to end and publishes the archive atomically.

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::config::Config;
use crate::error::{DumpError, Result};
use crate::format::{
    checksum, encode_header, BinWriter, BlockRecord, DumpHeader, FORMAT_VERSION, MAGIC,
    PREAMBLE_SIZE,
};
use crate::protocol::{Connection, DumpDescriptor, DumpEvent};

use super::SpillStore;

/// What a successful dump produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpSummary {
    /// Published archive path
    pub path: PathBuf,
    pub blocks: usize,
    pub chunks: usize,
    /// Size of the data region
    pub data_bytes: u64,
    /// Size of the encoded header
    pub header_bytes: u64,
}

/// Writes dump archives
pub struct Dumper {
    config: Config,
}

impl Dumper {
    /// Create a dumper; fails if the config is invalid
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Dump the connection's database into `output`
    ///
    /// Steps:
    /// 1. Drain the dump session into per-object spill files
    /// 2. Cross-check received chunks against the descriptor
    /// 3. Write the archive to a uniquely named temp file next to `output`,
    ///    then rename it over `output`
    ///
    /// On any failure nothing is published and the temp file is removed.
    /// Spill files are removed in every case.
    pub fn dump<C: Connection + ?Sized>(&self, conn: &mut C, output: &Path) -> Result<DumpSummary> {
        let mut tmp = temp_file_for(output)?;

        let mut spill = SpillStore::new(self.config.spill_dir.as_deref())?;
        tracing::info!("Starting dump to {}", output.display());

        // Step 1: receive
        let descriptor = receive(conn, &mut spill)?;

        // Step 2: validate before touching the output location
        let header = build_header(&descriptor, &spill)?;
        let header_bytes = encode_header(&header)?;

        // Step 3: write + publish; dropping `tmp` on error removes it
        let data_bytes = self.write_archive(tmp.as_file_mut(), &header, &header_bytes, &spill)?;
        tmp.persist(output).map_err(|e| DumpError::Io(e.error))?;

        let summary = DumpSummary {
            path: output.to_path_buf(),
            blocks: header.blocks.len(),
            chunks: header.blocks.iter().map(|b| b.chunks.len()).sum(),
            data_bytes,
            header_bytes: header_bytes.len() as u64,
        };
        tracing::info!(
            "Dump complete: {} blocks, {} chunks, {} data bytes",
            summary.blocks,
            summary.chunks,
            summary.data_bytes
        );
        Ok(summary)
    }

    /// Write preamble, header and data region. Returns data region size.
    fn write_archive(
        &self,
        file: &mut File,
        header: &DumpHeader,
        header_bytes: &[u8],
        spill: &SpillStore,
    ) -> Result<u64> {
        let mut writer = BufWriter::new(file);

        let mut preamble = BinWriter::with_capacity(PREAMBLE_SIZE);
        preamble.write_bytes(MAGIC);
        preamble.write_u64(FORMAT_VERSION);
        preamble.write_bytes(&checksum(header_bytes));
        preamble.write_u64(header_bytes.len() as u64);
        writer.write_all(&preamble.finish())?;
        writer.write_all(header_bytes)?;

        // Data region: spill files in declaration order, copied in fixed steps
        let mut buf = vec![0u8; self.config.copy_buffer_size];
        let mut data_bytes = 0u64;
        for block in &header.blocks {
            if block.chunks.is_empty() {
                continue;
            }
            let mut spill_file = File::open(spill.path_for(&block.object_id))?;
            let copied = copy_in_steps(&mut spill_file, &mut writer, &mut buf)?;
            if copied != block.total_data_size {
                return Err(DumpError::IntegrityMismatch(format!(
                    "spill file for object {} holds {} bytes, expected {}",
                    block.object_id, copied, block.total_data_size
                )));
            }
            data_bytes += copied;
        }

        writer.flush()?;
        let file = writer
            .into_inner()
            .map_err(|e| DumpError::Io(e.into_error()))?;
        file.sync_all()?;

        Ok(data_bytes)
    }
}

/// Drain a dump session into the spill store, returning its descriptor
fn receive<C: Connection + ?Sized>(conn: &mut C, spill: &mut SpillStore) -> Result<DumpDescriptor> {
    let mut descriptor = None;
    let mut delivered = 0u64;

    for event in conn.dump_session()? {
        match event? {
            DumpEvent::Data(chunk) => {
                if descriptor.is_some() {
                    return Err(DumpError::IntegrityMismatch(format!(
                        "data for object {} arrived after the dump descriptor",
                        chunk.object_id
                    )));
                }
                spill.append(&chunk)?;
                delivered += 1;
            }
            DumpEvent::Complete(desc) => {
                if descriptor.is_some() {
                    return Err(DumpError::IntegrityMismatch(
                        "server sent more than one dump descriptor".to_string(),
                    ));
                }
                descriptor = Some(desc);
            }
        }
    }

    tracing::debug!("Dump session delivered {} chunks", delivered);
    descriptor.ok_or_else(|| {
        DumpError::Connection("dump session ended without a descriptor".to_string())
    })
}

/// Combine the descriptor with what was actually received
///
/// Every declared block must match its received chunk count and byte total
/// exactly, and no chunk may belong to an undeclared object.
fn build_header(desc: &DumpDescriptor, spill: &SpillStore) -> Result<DumpHeader> {
    let mut declared = HashSet::with_capacity(desc.blocks.len());
    let mut blocks = Vec::with_capacity(desc.blocks.len());

    for block in &desc.blocks {
        if !declared.insert(block.object_id) {
            return Err(DumpError::IntegrityMismatch(format!(
                "object {} is declared more than once",
                block.object_id
            )));
        }

        let chunks = spill.chunks(&block.object_id);
        if chunks.len() as u64 != block.expected_chunk_count {
            tracing::warn!(
                "Object {}: server declared {} chunks, received {}",
                block.object_id,
                block.expected_chunk_count,
                chunks.len()
            );
            return Err(DumpError::IntegrityMismatch(format!(
                "server reported data blocks count does not match actual received \
                 (object {}: declared {}, received {})",
                block.object_id,
                block.expected_chunk_count,
                chunks.len()
            )));
        }

        let record = BlockRecord {
            object_id: block.object_id,
            dependency_ids: block.dependency_ids.clone(),
            type_descriptor: block.type_descriptor.clone(),
            total_data_size: block.expected_data_size,
            chunks: chunks.to_vec(),
        };
        let received = record.chunk_size_sum();
        if received != Some(block.expected_data_size) {
            tracing::warn!(
                "Object {}: server declared {} bytes, received {:?}",
                block.object_id,
                block.expected_data_size,
                received
            );
            return Err(DumpError::IntegrityMismatch(format!(
                "server reported data block size does not match actual received \
                 (object {}: declared {} bytes)",
                block.object_id, block.expected_data_size
            )));
        }
        blocks.push(record);
    }

    if let Some(stray) = spill.object_ids().find(|id| !declared.contains(*id)) {
        return Err(DumpError::IntegrityMismatch(format!(
            "received data for object {} which the descriptor does not declare",
            stray
        )));
    }

    Ok(DumpHeader {
        server_timestamp: desc.server_timestamp,
        server_version: desc.server_version.clone(),
        schema_text: desc.schema_text.clone(),
        blocks,
    })
}

/// Copy `src` into `dst` one buffer at a time; returns bytes copied
fn copy_in_steps(src: &mut impl Read, dst: &mut impl Write, buf: &mut [u8]) -> Result<u64> {
    let mut copied = 0u64;
    loop {
        let n = match src.read(buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        dst.write_all(&buf[..n])?;
        copied += n as u64;
    }
    Ok(copied)
}

/// Fresh `.{name}.XXXXXX.tmp` file in the output's directory, so the final
/// rename stays on one filesystem and never clobbers an existing file
fn temp_file_for(output: &Path) -> Result<NamedTempFile> {
    let name = output.file_name().ok_or_else(|| {
        DumpError::InvalidParameter(format!(
            "output path {} has no file name",
            output.display()
        ))
    })?;
    let dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut prefix = OsString::from(".");
    prefix.push(name);
    prefix.push(".");

    let tmp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tracing::debug!("Writing archive to {}", tmp.path().display());
    Ok(tmp)
}
