//! Spill store
//!
//! Per-object temporary files that hold chunk data until the descriptor
//! arrives and the archive can be laid out.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::Result;
use crate::format::{checksum, ChunkInfo};
use crate::protocol::{DataChunk, ObjectId};

/// Owns the spill directory for one dump; the directory and everything in
/// it is removed when the store is dropped.
pub struct SpillStore {
    dir: TempDir,
    /// Chunk sizes and digests per object, in arrival order
    chunks: HashMap<ObjectId, Vec<ChunkInfo>>,
}

impl SpillStore {
    /// Create a fresh spill directory under `parent` (or the system temp dir)
    pub fn new(parent: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(".dbdump-");
        let dir = match parent {
            Some(p) => builder.tempdir_in(p)?,
            None => builder.tempdir()?,
        };
        tracing::debug!("Spill directory: {}", dir.path().display());

        Ok(Self {
            dir,
            chunks: HashMap::new(),
        })
    }

    /// Append one chunk to its object's spill file and record its info
    ///
    /// The file is opened in append mode per chunk, so memory stays bounded
    /// by one chunk and no handles are held between deliveries.
    pub fn append(&mut self, chunk: &DataChunk) -> Result<()> {
        let path = self.path_for(&chunk.object_id);
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(&chunk.data)?;

        self.chunks
            .entry(chunk.object_id)
            .or_default()
            .push(ChunkInfo {
                size: chunk.data.len() as u64,
                checksum: checksum(&chunk.data),
            });

        tracing::trace!(
            "Spilled {} bytes for object {}",
            chunk.data.len(),
            chunk.object_id
        );
        Ok(())
    }

    /// Spill file path for an object (its id in hex)
    pub fn path_for(&self, object_id: &ObjectId) -> PathBuf {
        self.dir.path().join(object_id.simple().to_string())
    }

    /// Recorded chunks for an object; empty if none arrived
    pub fn chunks(&self, object_id: &ObjectId) -> &[ChunkInfo] {
        self.chunks
            .get(object_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Objects that received at least one chunk
    pub fn object_ids(&self) -> impl Iterator<Item = &ObjectId> {
        self.chunks.keys()
    }

    /// Root of the spill directory
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}
