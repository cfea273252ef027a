//! Interleaver
//!
//! Multiplexes the chunk streams of up to `fan_out` blocks into a single
//! ordered stream, verifying each chunk's checksum as it is read.
//!
//! ## Scheduling
//! ```text
//!   shared queue: [B0, B1, B2, B3, ...]   (declaration order, FIFO)
//!
//!   round 1: lane0 ─► lane1 ─► ... ─► laneN-1
//!   round 2: lane0 ─► lane1 ─► ... ─► laneN-1
//!   ...
//! ```
//! A lane without a current block takes the next one from the shared queue;
//! a lane that finds the queue empty is exhausted for good. A round in which
//! every activation produced nothing ends the stream.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::error::{DumpError, Result};
use crate::format::checksum;
use crate::protocol::DataChunk;

use super::parser::truncated;
use super::{ParsedBlock, ParsedDumpInfo};

/// Per-lane cursor over its current block
enum LaneState<'a> {
    /// No block assigned yet
    Idle,
    /// Streaming `block`; `offset` is relative to the block's data start
    Reading {
        block: &'a ParsedBlock,
        file: File,
        next_chunk: usize,
        offset: u64,
    },
}

/// Lazy, bounded fan-out chunk stream over a parsed dump
pub struct Interleaver<'a> {
    path: PathBuf,
    header_offset: u64,
    /// Blocks no lane has started yet
    queue: VecDeque<&'a ParsedBlock>,
    /// `None` marks an exhausted lane
    lanes: Vec<Option<LaneState<'a>>>,
    /// Next lane to activate within the current round
    cursor: usize,
    /// Activations in the current round that produced nothing
    idle_in_round: usize,
    done: bool,
}

/// Build an interleaved chunk stream over `info`'s blocks read from `path`
pub fn interleave<'a>(
    fan_out: usize,
    path: &Path,
    info: &'a ParsedDumpInfo,
) -> Result<Interleaver<'a>> {
    Interleaver::new(fan_out, path, info)
}

impl<'a> Interleaver<'a> {
    /// Create an interleaver with `fan_out` lanes; `fan_out` must be at least 1
    pub fn new(fan_out: usize, path: &Path, info: &'a ParsedDumpInfo) -> Result<Self> {
        if fan_out == 0 {
            return Err(DumpError::InvalidParameter(
                "invalid interleave factor: fan-out must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            path: path.to_path_buf(),
            header_offset: info.header_offset,
            queue: info.blocks.iter().collect(),
            lanes: (0..fan_out).map(|_| Some(LaneState::Idle)).collect(),
            cursor: 0,
            idle_in_round: 0,
            done: false,
        })
    }

    /// Number of lanes
    pub fn fan_out(&self) -> usize {
        self.lanes.len()
    }

    /// Lanes currently holding a block (and its file handle)
    pub fn active_lanes(&self) -> usize {
        self.lanes
            .iter()
            .filter(|l| matches!(l, Some(LaneState::Reading { .. })))
            .count()
    }

    /// Advance lane `idx` by one chunk; `Ok(None)` means it has nothing left
    fn activate(&mut self, idx: usize) -> Result<Option<DataChunk>> {
        loop {
            let state = match &mut self.lanes[idx] {
                Some(state) => state,
                None => return Ok(None),
            };

            match state {
                LaneState::Reading {
                    block,
                    file,
                    next_chunk,
                    offset,
                } if *next_chunk < block.chunks.len() => {
                    let info = block.chunks[*next_chunk];
                    let pos = self.header_offset + block.data_offset + *offset;
                    let len = usize::try_from(info.size).map_err(|_| {
                        DumpError::MalformedHeader(format!(
                            "chunk of {} bytes does not fit in memory",
                            info.size
                        ))
                    })?;

                    file.seek(SeekFrom::Start(pos))?;
                    let mut data = vec![0u8; len];
                    file.read_exact(&mut data)
                        .map_err(|e| truncated(e, "chunk data"))?;

                    if checksum(&data) != info.checksum {
                        tracing::warn!(
                            "Checksum mismatch in object {} chunk {} at offset {}",
                            block.object_id,
                            next_chunk,
                            pos
                        );
                        return Err(DumpError::DataIntegrityViolation {
                            object_id: block.object_id,
                            chunk_index: *next_chunk,
                        });
                    }

                    *next_chunk += 1;
                    *offset += info.size;
                    return Ok(Some(DataChunk::new(block.object_id, Bytes::from(data))));
                }
                _ => match self.queue.pop_front() {
                    Some(block) => {
                        tracing::trace!("Lane {} takes object {}", idx, block.object_id);
                        *state = LaneState::Reading {
                            block,
                            file: File::open(&self.path)?,
                            next_chunk: 0,
                            offset: 0,
                        };
                    }
                    None => {
                        self.lanes[idx] = None;
                        return Ok(None);
                    }
                },
            }
        }
    }
}

impl<'a> Iterator for Interleaver<'a> {
    type Item = Result<DataChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let idx = self.cursor;
            let produced = match self.activate(idx) {
                Ok(produced) => produced,
                Err(e) => {
                    // Integrity and I/O failures end the whole stream
                    self.done = true;
                    return Some(Err(e));
                }
            };

            if produced.is_none() {
                self.idle_in_round += 1;
            }
            self.cursor += 1;
            if self.cursor == self.lanes.len() {
                if self.idle_in_round == self.lanes.len() {
                    self.done = true;
                }
                self.cursor = 0;
                self.idle_in_round = 0;
            }

            if let Some(chunk) = produced {
                return Some(Ok(chunk));
            }
        }
        None
    }
}
