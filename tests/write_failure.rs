//! Needs the `test-helpers` feature for the fault-injection hook.

use std::fs;
use std::io::{self, Write};

use atomic_replace::{AtomicFileWriter, WriterState, backup_path_for, restore_from_backup};
use tempfile::tempdir;

#[test]
fn failed_write_leaves_backup_identical_to_original() {
    let td = tempdir().unwrap();
    let target = td.path().join("library.bib");
    let original: Vec<u8> = (0..50_000u32).map(|i| (i % 97) as u8 + b' ').collect();
    fs::write(&target, &original).unwrap();

    let mut w = AtomicFileWriter::new(&target).unwrap();
    w.create_backup().unwrap();
    w.write_all(&[b'n'; 4096]).unwrap();
    w.flush().unwrap();
    w.fail_next_io(io::ErrorKind::StorageFull);

    let err = w.write_all(b"the rest").unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::StorageFull);
    assert_eq!(w.state(), WriterState::Failed);
    assert!(!w.is_locked(), "lock released on failure");

    assert_eq!(fs::read(backup_path_for(&target)).unwrap(), original);

    // Caller-driven recovery.
    drop(w);
    restore_from_backup(&target).unwrap();
    assert_eq!(fs::read(&target).unwrap(), original);
}

#[test]
fn failed_flush_releases_lock_for_next_writer() {
    let td = tempdir().unwrap();
    let target = td.path().join("flush.txt");
    fs::write(&target, b"orig").unwrap();

    let mut w = AtomicFileWriter::new(&target).unwrap();
    w.create_backup().unwrap();
    w.write_all(b"buffered").unwrap();
    w.fail_next_io(io::ErrorKind::Other);
    assert!(w.flush().is_err());
    assert_eq!(w.state(), WriterState::Failed);

    let mut next = AtomicFileWriter::new(&target).unwrap();
    next.abort().unwrap();
}

#[test]
fn failed_close_keeps_backup() {
    let td = tempdir().unwrap();
    let target = td.path().join("close.txt");
    fs::write(&target, b"orig").unwrap();

    let mut w = AtomicFileWriter::new(&target).unwrap();
    w.create_backup().unwrap();
    w.write_all(b"new").unwrap();
    w.fail_next_io(io::ErrorKind::Other);
    let err = w.close().unwrap_err();
    assert!(!err.is_invalid_state());
    assert_eq!(w.state(), WriterState::Failed);
    assert_eq!(fs::read(backup_path_for(&target)).unwrap(), b"orig");
}
