//! Dump session messages
//!
//! What the server sends while a dump session is open.

use bytes::Bytes;

use super::ObjectId;

/// One chunk of one object's data, as delivered by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataChunk {
    pub object_id: ObjectId,
    pub data: Bytes,
}

impl DataChunk {
    pub fn new(object_id: ObjectId, data: impl Into<Bytes>) -> Self {
        Self {
            object_id,
            data: data.into(),
        }
    }
}

/// Server-declared metadata for one object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpBlockDescriptor {
    pub object_id: ObjectId,
    pub dependency_ids: Vec<ObjectId>,
    pub type_descriptor: Bytes,
    /// Total bytes the server claims to have sent for this object
    pub expected_data_size: u64,
    /// Number of chunks the server claims to have sent for this object
    pub expected_chunk_count: u64,
}

/// Manifest produced once per dump session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpDescriptor {
    pub server_timestamp: u64,
    pub server_version: Bytes,
    pub schema_text: Bytes,
    pub blocks: Vec<DumpBlockDescriptor>,
}

/// Events of a dump session, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpEvent {
    /// A data chunk for some object
    Data(DataChunk),

    /// End of session; carries the block manifest
    Complete(DumpDescriptor),
}
