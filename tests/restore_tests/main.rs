//! Tests for the restore side: parser, interleaver, verify, orchestration

#[path = "../common/mod.rs"]
mod common;
