//! Offline verification
//!
//! Reads every chunk of a dump file and checks its digest, without a server.

use std::collections::HashMap;
use std::path::Path;

use crate::config::Config;
use crate::error::{DumpError, Result};
use crate::protocol::ObjectId;

use super::{parse_with_max_version, Interleaver};

/// Totals from a clean verification pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    pub dump_version: u64,
    pub blocks: usize,
    pub chunks: usize,
    pub bytes: u64,
}

/// Parse `path` and read back every chunk through the interleaver
///
/// Uses `config.fan_out` lanes and accepts format versions up to
/// `config.max_supported_version`.
pub fn verify(path: &Path, config: &Config) -> Result<VerifyReport> {
    config.validate()?;
    let info = parse_with_max_version(path, config.max_supported_version)?;

    let mut per_object: HashMap<ObjectId, u64> = HashMap::with_capacity(info.blocks.len());
    let mut chunks = 0usize;
    let mut bytes = 0u64;
    for chunk in Interleaver::new(config.fan_out, path, &info)? {
        let chunk = chunk?;
        *per_object.entry(chunk.object_id).or_default() += chunk.data.len() as u64;
        chunks += 1;
        bytes += chunk.data.len() as u64;
    }

    for block in &info.blocks {
        let read = per_object.get(&block.object_id).copied().unwrap_or(0);
        if read != block.total_data_size {
            return Err(DumpError::IntegrityMismatch(format!(
                "object {}: read {} bytes, header declares {}",
                block.object_id, read, block.total_data_size
            )));
        }
    }

    tracing::info!(
        "Verified {}: {} blocks, {} chunks, {} bytes",
        path.display(),
        info.blocks.len(),
        chunks,
        bytes
    );

    Ok(VerifyReport {
        dump_version: info.dump_version,
        blocks: info.blocks.len(),
        chunks,
        bytes,
    })
}
