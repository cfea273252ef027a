//! Dump Module
//!
//! Turns a server dump session into a single archive file.
//!
//! ## Responsibilities
//! - Spill each object's chunks to its own append-only temp file as they arrive
//! - Record size + SHA-1 of every chunk in arrival order
//! - Cross-check received data against the server's descriptor
//! - Write preamble, header and data region to a temp path, then rename
//!
//! ## Flow
//! ```text
//! dump_session ──► SpillStore ──► DumpHeader ──► {output}.tmp ──► rename
//!   (events)      (per object)    (validated)     (streamed)
//! ```

mod spill;
mod writer;

pub use spill::SpillStore;
pub use writer::{DumpSummary, Dumper};
