//! Tests for the Dumper
//!
//! These tests verify:
//! - Archive layout: magic, version, header digest, header, data region
//! - Cross-checks between the descriptor and received data
//! - Nothing is published (and no temp file is left) when a dump fails
//! - Existing files next to the output are never touched
//! - Spill files are cleaned up in every case

use std::fs;
use std::path::Path;

use bytes::Bytes;
use dbdump::format::{checksum, decode_header, BinReader, FORMAT_VERSION, MAGIC, PREAMBLE_SIZE};
use dbdump::protocol::{ChunkStream, DataChunk, DumpEvent, DumpStream};
use dbdump::{Config, Connection, DumpError, Dumper, ObjectId, Result};
use tempfile::TempDir;

use crate::common::{
    descriptor_for, events_for, events_with, mixed_objects, oid, scenario_objects,
    setup_temp_dump, FakeConnection, ObjectSpec,
};

// =============================================================================
// Helper Functions
// =============================================================================

fn dump_events(path: &Path, events: Vec<DumpEvent>) -> Result<dbdump::DumpSummary> {
    let mut conn = FakeConnection::with_events(events);
    Dumper::new(Config::default()).unwrap().dump(&mut conn, path)
}

/// Names of everything in the output's directory, sorted
fn dir_entries(path: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(path.parent().unwrap())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn assert_nothing_published(path: &Path) {
    assert!(!path.exists(), "output must not exist");
    assert!(dir_entries(path).is_empty(), "temp file must be removed");
}

/// Server whose dump stream fails after one chunk
struct BrokenStream;

impl Connection for BrokenStream {
    fn execute(&mut self, _statement: &str) -> Result<()> {
        Ok(())
    }

    fn dump_session(&mut self) -> Result<DumpStream<'_>> {
        let events = vec![
            Ok(DumpEvent::Data(DataChunk::new(oid(1), &b"partial"[..]))),
            Err(DumpError::Connection("connection reset".to_string())),
        ];
        Ok(Box::new(events.into_iter()))
    }

    fn restore_session(
        &mut self,
        _schema_text: &[u8],
        _blocks: &[(ObjectId, Bytes)],
        _chunks: &mut ChunkStream<'_>,
    ) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// Layout Tests
// =============================================================================

#[test]
fn test_dump_writes_preamble() {
    let (_dir, path) = setup_temp_dump();
    dump_events(&path, events_for(&scenario_objects())).unwrap();

    let bytes = fs::read(&path).unwrap();
    assert_eq!(&bytes[..MAGIC.len()], &MAGIC[..]);

    let mut r = BinReader::new(&bytes[MAGIC.len()..PREAMBLE_SIZE]);
    assert_eq!(r.read_u64().unwrap(), FORMAT_VERSION);
    let digest = r.read_array::<20>().unwrap();
    let header_len = r.read_u64().unwrap() as usize;

    let header_bytes = &bytes[PREAMBLE_SIZE..PREAMBLE_SIZE + header_len];
    assert_eq!(checksum(header_bytes), digest);
}

#[test]
fn test_dump_header_matches_descriptor() {
    let (_dir, path) = setup_temp_dump();
    let objects = scenario_objects();
    let desc = descriptor_for(&objects);
    dump_events(&path, events_for(&objects)).unwrap();

    let bytes = fs::read(&path).unwrap();
    let header_len =
        u64::from_be_bytes(bytes[PREAMBLE_SIZE - 8..PREAMBLE_SIZE].try_into().unwrap()) as usize;
    let header = decode_header(&bytes[PREAMBLE_SIZE..PREAMBLE_SIZE + header_len]).unwrap();

    assert_eq!(header.server_timestamp, desc.server_timestamp);
    assert_eq!(header.server_version, desc.server_version);
    assert_eq!(header.schema_text, desc.schema_text);
    assert_eq!(header.blocks.len(), 2);

    let b = &header.blocks[1];
    assert_eq!(b.object_id, oid(0xB));
    assert_eq!(b.dependency_ids, vec![oid(0xA)]);
    assert_eq!(b.total_data_size, 6);
    assert_eq!(b.chunks.len(), 2);
    assert_eq!(b.chunks[0].size, 2);
    assert_eq!(b.chunks[0].checksum, checksum(b"B1"));
    assert_eq!(b.chunks[1].size, 4);
    assert_eq!(b.chunks[1].checksum, checksum(b"B222"));
}

#[test]
fn test_dump_data_region_in_declaration_order() {
    let (_dir, path) = setup_temp_dump();
    let summary = dump_events(&path, events_for(&scenario_objects())).unwrap();

    let bytes = fs::read(&path).unwrap();
    let data_start = PREAMBLE_SIZE + summary.header_bytes as usize;
    assert_eq!(&bytes[data_start..], b"AAAAAB1B222");

    assert_eq!(summary.path, path);
    assert_eq!(summary.blocks, 2);
    assert_eq!(summary.chunks, 3);
    assert_eq!(summary.data_bytes, 11);
}

#[test]
fn test_dump_interleaved_arrival() {
    // Server alternates objects; each object's bytes stay contiguous on disk
    let (_dir, path) = setup_temp_dump();
    let objects = scenario_objects();
    let events = vec![
        DumpEvent::Data(DataChunk::new(oid(0xB), &b"B1"[..])),
        DumpEvent::Data(DataChunk::new(oid(0xA), &b"AAAAA"[..])),
        DumpEvent::Data(DataChunk::new(oid(0xB), &b"B222"[..])),
        DumpEvent::Complete(descriptor_for(&objects)),
    ];
    let summary = dump_events(&path, events).unwrap();

    let bytes = fs::read(&path).unwrap();
    let data_start = PREAMBLE_SIZE + summary.header_bytes as usize;
    assert_eq!(&bytes[data_start..], b"AAAAAB1B222");
}

#[test]
fn test_dump_empty_database() {
    let (_dir, path) = setup_temp_dump();
    let summary = dump_events(&path, events_for(&[])).unwrap();

    assert_eq!(summary.blocks, 0);
    assert_eq!(summary.data_bytes, 0);
    let len = fs::metadata(&path).unwrap().len();
    assert_eq!(len, PREAMBLE_SIZE as u64 + summary.header_bytes);
}

#[test]
fn test_dump_zero_chunk_block() {
    let (_dir, path) = setup_temp_dump();
    let objects = vec![
        ObjectSpec::new(oid(1), &[]),
        ObjectSpec::new(oid(2), &[b"xy"]),
    ];
    let summary = dump_events(&path, events_for(&objects)).unwrap();
    assert_eq!(summary.blocks, 2);
    assert_eq!(summary.chunks, 1);
    assert_eq!(summary.data_bytes, 2);
}

#[test]
fn test_dump_tiny_copy_buffer() {
    let (_dir, path) = setup_temp_dump();
    let objects = mixed_objects();
    let config = Config::builder().copy_buffer_size(1).build();
    let mut conn = FakeConnection::with_events(events_for(&objects));
    let summary = Dumper::new(config).unwrap().dump(&mut conn, &path).unwrap();

    let expected: Vec<u8> = objects.iter().flat_map(|o| o.chunks.concat()).collect();
    let bytes = fs::read(&path).unwrap();
    let data_start = PREAMBLE_SIZE + summary.header_bytes as usize;
    assert_eq!(&bytes[data_start..], &expected[..]);
}

#[test]
fn test_dump_replaces_existing_output() {
    let (_dir, path) = setup_temp_dump();
    fs::write(&path, b"old contents").unwrap();
    dump_events(&path, events_for(&scenario_objects())).unwrap();

    let bytes = fs::read(&path).unwrap();
    assert_eq!(&bytes[..MAGIC.len()], &MAGIC[..]);
    assert_eq!(dir_entries(&path), vec!["test.dump".to_string()]);
}

// =============================================================================
// Integrity Mismatch Tests
// =============================================================================

#[test]
fn test_chunk_count_mismatch() {
    let (_dir, path) = setup_temp_dump();
    let objects = scenario_objects();
    let mut desc = descriptor_for(&objects);
    desc.blocks[1].expected_chunk_count = 3;

    let err = dump_events(&path, events_with(&objects, desc)).unwrap_err();
    match err {
        DumpError::IntegrityMismatch(msg) => {
            assert!(msg.contains("data blocks count does not match"), "{}", msg)
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_nothing_published(&path);
}

#[test]
fn test_data_size_mismatch() {
    let (_dir, path) = setup_temp_dump();
    let objects = scenario_objects();
    let mut desc = descriptor_for(&objects);
    desc.blocks[0].expected_data_size = 4;

    let err = dump_events(&path, events_with(&objects, desc)).unwrap_err();
    assert!(matches!(err, DumpError::IntegrityMismatch(_)));
    assert_nothing_published(&path);
}

#[test]
fn test_declared_block_without_data() {
    let (_dir, path) = setup_temp_dump();
    let objects = scenario_objects();
    let desc = descriptor_for(&objects);

    // Only A's data arrives
    let err = dump_events(&path, events_with(&objects[..1], desc)).unwrap_err();
    assert!(matches!(err, DumpError::IntegrityMismatch(_)));
    assert_nothing_published(&path);
}

#[test]
fn test_undeclared_object_rejected() {
    let (_dir, path) = setup_temp_dump();
    let objects = scenario_objects();
    let desc = descriptor_for(&objects[..1]);

    let err = dump_events(&path, events_with(&objects, desc)).unwrap_err();
    match err {
        DumpError::IntegrityMismatch(msg) => assert!(msg.contains("does not declare"), "{}", msg),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_nothing_published(&path);
}

#[test]
fn test_duplicate_declaration_rejected() {
    let (_dir, path) = setup_temp_dump();
    let objects = scenario_objects();
    let mut desc = descriptor_for(&objects);
    let dup = desc.blocks[0].clone();
    desc.blocks.push(dup);

    let err = dump_events(&path, events_with(&objects, desc)).unwrap_err();
    assert!(matches!(err, DumpError::IntegrityMismatch(_)));
    assert_nothing_published(&path);
}

#[test]
fn test_data_after_descriptor_rejected() {
    let (_dir, path) = setup_temp_dump();
    let objects = scenario_objects();
    let mut events = events_for(&objects);
    events.push(DumpEvent::Data(DataChunk::new(oid(0xA), &b"late"[..])));

    let err = dump_events(&path, events).unwrap_err();
    assert!(matches!(err, DumpError::IntegrityMismatch(_)));
    assert_nothing_published(&path);
}

#[test]
fn test_second_descriptor_rejected() {
    let (_dir, path) = setup_temp_dump();
    let objects = scenario_objects();
    let mut events = events_for(&objects);
    events.push(DumpEvent::Complete(descriptor_for(&objects)));

    let err = dump_events(&path, events).unwrap_err();
    assert!(matches!(err, DumpError::IntegrityMismatch(_)));
    assert_nothing_published(&path);
}

#[test]
fn test_missing_descriptor() {
    let (_dir, path) = setup_temp_dump();
    let mut events = events_for(&scenario_objects());
    events.pop();

    let err = dump_events(&path, events).unwrap_err();
    assert!(matches!(err, DumpError::Connection(_)));
    assert_nothing_published(&path);
}

#[test]
fn test_failed_dump_keeps_previous_output() {
    let (_dir, path) = setup_temp_dump();
    fs::write(&path, b"previous dump").unwrap();

    let objects = scenario_objects();
    let mut desc = descriptor_for(&objects);
    desc.blocks[0].expected_chunk_count = 0;
    dump_events(&path, events_with(&objects, desc)).unwrap_err();

    assert_eq!(fs::read(&path).unwrap(), b"previous dump");
    assert_eq!(dir_entries(&path), vec!["test.dump".to_string()]);
}

#[test]
fn test_unrelated_tmp_file_survives() {
    let (_dir, path) = setup_temp_dump();
    let bystander = path.with_file_name("test.dump.tmp");
    fs::write(&bystander, b"not ours").unwrap();

    let objects = scenario_objects();
    let mut desc = descriptor_for(&objects);
    desc.blocks[0].expected_chunk_count = 0;
    dump_events(&path, events_with(&objects, desc)).unwrap_err();
    assert_eq!(fs::read(&bystander).unwrap(), b"not ours");

    dump_events(&path, events_for(&objects)).unwrap();
    assert_eq!(fs::read(&bystander).unwrap(), b"not ours");
    assert_eq!(
        dir_entries(&path),
        vec!["test.dump".to_string(), "test.dump.tmp".to_string()]
    );
}

// =============================================================================
// Transport and Config Tests
// =============================================================================

#[test]
fn test_stream_error_propagates() {
    let (_dir, path) = setup_temp_dump();
    let err = Dumper::new(Config::default())
        .unwrap()
        .dump(&mut BrokenStream, &path)
        .unwrap_err();
    assert!(matches!(err, DumpError::Connection(_)));
    assert_nothing_published(&path);
}

#[test]
fn test_unwritable_output_location() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing").join("out.dump");
    let err = dump_events(&path, events_for(&scenario_objects())).unwrap_err();
    assert!(matches!(err, DumpError::Io(_)));
}

#[test]
fn test_spill_dir_cleaned_on_success_and_failure() {
    let spill_parent = TempDir::new().unwrap();
    let (_dir, path) = setup_temp_dump();
    let config = Config::builder().spill_dir(spill_parent.path()).build();
    let dumper = Dumper::new(config).unwrap();

    let objects = scenario_objects();
    let mut conn = FakeConnection::with_events(events_for(&objects));
    dumper.dump(&mut conn, &path).unwrap();
    assert_eq!(fs::read_dir(spill_parent.path()).unwrap().count(), 0);

    let mut desc = descriptor_for(&objects);
    desc.blocks[1].expected_data_size = 1;
    let mut conn = FakeConnection::with_events(events_with(&objects, desc));
    dumper.dump(&mut conn, &path).unwrap_err();
    assert_eq!(fs::read_dir(spill_parent.path()).unwrap().count(), 0);
}

#[test]
fn test_invalid_config_rejected() {
    let config = Config::builder().copy_buffer_size(0).build();
    assert!(matches!(
        Dumper::new(config),
        Err(DumpError::InvalidParameter(_))
    ));
}
