//! Restore Module
//!
//! Reads dump files back and streams them into a new database.
//!
//! ## Responsibilities
//! - Validate magic, version and header checksum before trusting anything
//! - Rebuild each block's offset within the data region
//! - Stream chunks from several blocks at once, verifying every checksum
//! - Create the target database and drop it again if anything fails
//!
//! ## Flow
//! ```text
//! Restorer ──► parse() ──► Interleaver ──► Connection::restore_session
//!    │                                              │
//!    └──── CREATE DATABASE ... DROP on failure ◄────┘
//! ```

mod interleave;
mod orchestrator;
mod parser;
mod verify;

pub use interleave::{interleave, Interleaver};
pub use orchestrator::{RestoreState, RestoreSummary, Restorer};
pub use parser::{parse, parse_with_max_version, ParsedBlock, ParsedDumpInfo};
pub use verify::{verify, VerifyReport};
