//! Transport traits
//!
//! Implemented by the client's connection layer (and by test fakes).

use bytes::Bytes;

use crate::error::Result;

use super::{DataChunk, DumpEvent, ObjectId};

/// Events of an open dump session
pub type DumpStream<'a> = Box<dyn Iterator<Item = Result<DumpEvent>> + 'a>;

/// Chunk source handed to the server during restore
pub type ChunkStream<'a> = dyn Iterator<Item = Result<DataChunk>> + 'a;

/// An open connection to one database
pub trait Connection {
    /// Execute a statement that returns no rows
    fn execute(&mut self, statement: &str) -> Result<()>;

    /// Open a dump session over the current database
    ///
    /// The stream yields any number of `DumpEvent::Data` followed by exactly
    /// one `DumpEvent::Complete`.
    fn dump_session(&mut self) -> Result<DumpStream<'_>>;

    /// Restore schema and data into the current (empty) database
    ///
    /// The implementation must stop pulling from `chunks` and fail as soon
    /// as the stream yields an error.
    fn restore_session(
        &mut self,
        schema_text: &[u8],
        blocks: &[(ObjectId, Bytes)],
        chunks: &mut ChunkStream<'_>,
    ) -> Result<()>;

    /// Close the connection. Calling it more than once is allowed.
    fn close(&mut self) -> Result<()>;
}

/// Opens connections by database name
pub trait Connector {
    type Conn: Connection;

    fn connect(&self, database: &str) -> Result<Self::Conn>;
}
