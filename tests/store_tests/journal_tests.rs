//! Journal Tests
//!
//! These tests verify:
//! - Writer LSN assignment across reopen
//! - Recovery from a clean journal
//! - Recovery with a torn tail
//! - Recovery with corrupted entries (CRC mismatch)
//! - Journaled KeyedStore surviving a restart

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use switchboard::config::JournalSyncStrategy;
use switchboard::store::journal::{JournalEntry, JournalReader, JournalRecovery, JournalWriter, Operation};
use switchboard::store::{record, Column, KeyedStore, Schema, Value};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_journal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.journal");
    (temp_dir, path)
}

fn set_op(i: usize) -> Operation {
    Operation::Set {
        key: format!("key{}", i),
        record: record([("count", i as i64)]),
    }
}

fn write_entries_via_writer(path: &Path, count: usize) {
    let mut writer = JournalWriter::open(path, JournalSyncStrategy::EveryWrite).unwrap();
    for i in 0..count {
        writer.append(set_op(i)).unwrap();
    }
}

fn schema() -> Schema {
    Schema::new(vec![Column::int("count")])
}

// =============================================================================
// Writer Tests
// =============================================================================

#[test]
fn test_writer_assigns_sequential_lsns() {
    let (_temp, path) = setup_temp_journal();
    let mut writer = JournalWriter::open(&path, JournalSyncStrategy::EveryWrite).unwrap();

    assert_eq!(writer.append(set_op(0)).unwrap(), 1);
    assert_eq!(writer.append(set_op(1)).unwrap(), 2);
    assert_eq!(writer.current_lsn(), 3);
}

#[test]
fn test_writer_reopen_continues_lsn() {
    let (_temp, path) = setup_temp_journal();
    write_entries_via_writer(&path, 3);

    let mut writer =
        JournalWriter::open(&path, JournalSyncStrategy::EveryNEntries { count: 10 }).unwrap();
    assert_eq!(writer.append(set_op(3)).unwrap(), 4);
    writer.sync().unwrap();

    let entries: Vec<_> = JournalReader::open(&path)
        .unwrap()
        .entries()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(entries.len(), 4);
}

#[test]
fn test_writer_create_discards_contents() {
    let (_temp, path) = setup_temp_journal();
    write_entries_via_writer(&path, 3);

    let writer = JournalWriter::create(&path, JournalSyncStrategy::EveryWrite).unwrap();
    assert_eq!(writer.current_lsn(), 1);
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_recover_empty_file() {
    let (_temp, path) = setup_temp_journal();
    File::create(&path).unwrap();

    let (entries, result) = JournalRecovery::recover(&path).unwrap();
    assert!(entries.is_empty());
    assert_eq!(result.entries_recovered, 0);
    assert_eq!(result.last_lsn, 0);
    assert!(!result.was_truncated);
}

#[test]
fn test_recover_clean_journal() {
    let (_temp, path) = setup_temp_journal();
    write_entries_via_writer(&path, 5);

    let (entries, result) = JournalRecovery::recover(&path).unwrap();
    assert_eq!(entries.len(), 5);
    assert_eq!(result.entries_recovered, 5);
    assert_eq!(result.entries_corrupted, 0);
    assert_eq!(result.last_lsn, 5);
    assert_eq!(entries[2].operation, set_op(2));
}

#[test]
fn test_recover_truncates_torn_tail() {
    let (_temp, path) = setup_temp_journal();
    write_entries_via_writer(&path, 2);
    let clean_len = std::fs::metadata(&path).unwrap().len();

    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    let partial = JournalEntry::new(3, set_op(3)).serialize().unwrap();
    file.write_all(&partial[..partial.len() / 2]).unwrap();
    file.sync_all().unwrap();

    let verified = JournalRecovery::verify(&path).unwrap();
    assert!(verified.was_truncated);

    let (entries, result) = JournalRecovery::recover(&path).unwrap();
    assert_eq!(entries.len(), 2);
    assert!(result.was_truncated);
    assert_eq!(std::fs::metadata(&path).unwrap().len(), clean_len);
}

#[test]
fn test_recover_skips_corrupt_entry() {
    let (_temp, path) = setup_temp_journal();

    let mut bytes = Vec::new();
    for lsn in 1..=3u64 {
        bytes.extend(JournalEntry::new(lsn, set_op(lsn as usize)).serialize().unwrap());
    }
    let first_len = JournalEntry::new(1, set_op(1)).serialize().unwrap().len();
    // Flip a byte inside the second entry's body
    bytes[first_len + 20] ^= 0xFF;

    let mut file = File::create(&path).unwrap();
    file.write_all(&bytes).unwrap();
    file.sync_all().unwrap();

    let (entries, result) = JournalRecovery::recover(&path).unwrap();
    assert_eq!(result.entries_recovered, 2);
    assert_eq!(result.entries_corrupted, 1);
    assert_eq!(result.last_lsn, 3);
    assert_eq!(entries.iter().map(|e| e.lsn).collect::<Vec<_>>(), vec![1, 3]);
}

#[test]
fn test_reader_fails_on_corrupt_entry() {
    let (_temp, path) = setup_temp_journal();
    let mut bytes = JournalEntry::new(1, set_op(1)).serialize().unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    std::fs::write(&path, &bytes).unwrap();

    let mut reader = JournalReader::open(&path).unwrap();
    assert!(reader.next_entry().is_err());
}

// =============================================================================
// Journaled Table Tests
// =============================================================================

#[test]
fn test_journaled_table_survives_restart() {
    let (_temp, path) = setup_temp_journal();
    {
        let t = KeyedStore::open_journaled("acks", schema(), 16, &path, JournalSyncStrategy::EveryWrite)
            .unwrap();
        assert!(t.is_journaled());
        t.set("a", record([("count", 3i64)])).unwrap();
        t.set("b", record([("count", 1i64)])).unwrap();
        t.decr("a", "count", 1);
        t.delete("b");
    }

    let t = KeyedStore::open_journaled("acks", schema(), 16, &path, JournalSyncStrategy::EveryWrite)
        .unwrap();
    assert_eq!(t.len(), 1);
    assert_eq!(t.get_field("a", "count"), Some(Value::Int(2)));
    assert!(!t.exists("b"));
}

#[test]
fn test_journaled_table_compacts_on_open() {
    let (_temp, path) = setup_temp_journal();
    {
        let t = KeyedStore::open_journaled("acks", schema(), 16, &path, JournalSyncStrategy::EveryWrite)
            .unwrap();
        for i in 0..10 {
            t.incr("a", "count", 1);
            t.set(&format!("k{}", i), record([("count", i as i64)])).unwrap();
            t.delete(&format!("k{}", i));
        }
        t.set("a", record([("count", 1i64)])).unwrap();
    }

    let _t = KeyedStore::open_journaled("acks", schema(), 16, &path, JournalSyncStrategy::EveryWrite)
        .unwrap();
    let (entries, _) = JournalRecovery::recover(&path).unwrap();
    assert_eq!(entries.len(), 1);
}

#[test]
fn test_journaled_destroy_persists() {
    let (_temp, path) = setup_temp_journal();
    {
        let t = KeyedStore::open_journaled("acks", schema(), 16, &path, JournalSyncStrategy::EveryWrite)
            .unwrap();
        t.set("a", record([("count", 1i64)])).unwrap();
        t.destroy();
        t.set("b", record([("count", 2i64)])).unwrap();
    }

    let t = KeyedStore::open_journaled("acks", schema(), 16, &path, JournalSyncStrategy::EveryWrite)
        .unwrap();
    assert!(!t.exists("a"));
    assert_eq!(t.get_field("b", "count"), Some(Value::Int(2)));
}
