//! # dbdump
//!
//! Dump/restore engine for a database client:
//! - Self-describing binary archive with SHA-1 checksums on the header and
//!   on every data chunk
//! - Streaming dump through per-object spill files (memory bounded by one chunk)
//! - Interleaved restore with bounded fan-out across objects
//! - All-or-nothing database creation on restore
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Connection (transport, external)            │
//! └───────────┬─────────────────────────────────▲───────────────┘
//!             │ dump_session()                  │ restore_session()
//! ┌───────────▼───────────┐         ┌───────────┴───────────────┐
//! │        Dumper         │         │         Restorer          │
//! │  SpillStore → header  │         │  CREATE / DROP lifecycle  │
//! └───────────┬───────────┘         └───────────▲───────────────┘
//!             │                                 │
//!             ▼                                 │
//! ┌───────────────────────┐         ┌───────────┴───────────────┐
//! │  format (header,      │  file   │  parse() → Interleaver    │
//! │  BinReader, SHA-1)    ├────────►│  (N lanes, checksummed)   │
//! └───────────────────────┘         └───────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod format;
pub mod protocol;
pub mod dump;
pub mod restore;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{DumpError, Result};
pub use config::Config;
pub use dump::{DumpSummary, Dumper};
pub use protocol::{Connection, Connector, ObjectId};
pub use restore::{interleave, parse, verify, Interleaver, ParsedDumpInfo, Restorer};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of dbdump
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
