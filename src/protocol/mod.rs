//! Protocol Module
//!
//! Boundary with the database transport. The dump/restore engine only sees
//! the server through the [`Connection`] and [`Connector`] traits; the wire
//! protocol, failover and retry live behind them.
//!
//! ## Dump Session
//! ```text
//! dump_session() ──► Data(obj, bytes) ─► Data(..) ─► ... ─► Complete(descriptor)
//! ```
//! Chunks arrive before the descriptor that declares their expected
//! counts and sizes, so the dumper can only cross-check at the end.
//!
//! ## Restore Session
//! ```text
//! restore_session(schema, [(obj, type_desc)...], chunk stream)
//! ```

mod connection;
mod descriptor;
mod quote;

pub use connection::{ChunkStream, Connection, Connector, DumpStream};
pub use descriptor::{DataChunk, DumpBlockDescriptor, DumpDescriptor, DumpEvent};
pub use quote::quote_ident;

/// 16-byte schema object identifier
pub type ObjectId = uuid::Uuid;
