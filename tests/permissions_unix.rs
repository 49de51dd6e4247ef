#![cfg(unix)]

use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;

use atomic_replace::{AtomicFileWriter, backup_path_for, write_atomically, WriteOptions};
use tempfile::tempdir;

fn mode(p: &std::path::Path) -> u32 {
    fs::metadata(p).unwrap().permissions().mode() & 0o7777
}

#[test]
fn mode_bits_survive_round_trip_with_backup() {
    for desired in [0o600, 0o640, 0o644, 0o660, 0o755] {
        let td = tempdir().unwrap();
        let target = td.path().join("perm.txt");
        fs::write(&target, b"before").unwrap();
        fs::set_permissions(&target, fs::Permissions::from_mode(desired)).unwrap();

        let mut w = AtomicFileWriter::new(&target).unwrap();
        w.create_backup().unwrap();
        w.write_all(b"after").unwrap();
        w.close().unwrap();

        assert_eq!(mode(&target), desired, "mode {desired:o} not preserved");
        assert_eq!(fs::read(&target).unwrap(), b"after");
    }
}

#[test]
fn mode_bits_survive_round_trip_without_backup() {
    let td = tempdir().unwrap();
    let target = td.path().join("plain.txt");
    fs::write(&target, b"before").unwrap();
    fs::set_permissions(&target, fs::Permissions::from_mode(0o604)).unwrap();

    write_atomically(&target, b"after", WriteOptions::default()).unwrap();
    assert_eq!(mode(&target), 0o604);
}

#[test]
fn mode_restored_even_if_changed_during_write() {
    let td = tempdir().unwrap();
    let target = td.path().join("changed.txt");
    fs::write(&target, b"before").unwrap();
    fs::set_permissions(&target, fs::Permissions::from_mode(0o640)).unwrap();

    let mut w = AtomicFileWriter::new(&target).unwrap();
    w.create_backup().unwrap();
    w.write_all(b"after").unwrap();
    fs::set_permissions(&target, fs::Permissions::from_mode(0o600)).unwrap();
    w.close().unwrap();

    assert_eq!(mode(&target), 0o640);
}

#[test]
fn kept_backup_mirrors_target_mode() {
    let td = tempdir().unwrap();
    let target = td.path().join("mirror.txt");
    fs::write(&target, b"v1").unwrap();
    fs::set_permissions(&target, fs::Permissions::from_mode(0o640)).unwrap();

    write_atomically(
        &target,
        b"v2",
        WriteOptions {
            backup: true,
            keep_backup: true,
        },
    )
    .unwrap();

    assert_eq!(mode(&backup_path_for(&target)), 0o640);
}

#[test]
fn backup_copy_failure_refuses_to_write() {
    // Root ignores directory permissions, which defeats this test's premise.
    if unsafe { libc::geteuid() } == 0 {
        eprintln!("skipping: running as root");
        return;
    }

    let td = tempdir().unwrap();
    let dir = td.path().join("ro");
    fs::create_dir_all(&dir).unwrap();
    let target = dir.join("doc.txt");
    fs::write(&target, b"keep me").unwrap();

    // Existing file stays writable; the directory refuses new entries (the backup).
    fs::set_permissions(&dir, fs::Permissions::from_mode(0o555)).unwrap();

    let mut w = AtomicFileWriter::new(&target).unwrap();
    let err = w.create_backup().unwrap_err();
    assert!(!err.is_invalid_state());
    assert!(!w.is_locked());
    assert!(w.append(b"should not land").unwrap_err().is_invalid_state());

    fs::set_permissions(&dir, fs::Permissions::from_mode(0o755)).unwrap();
    assert_eq!(fs::read(&target).unwrap(), b"keep me");
    assert!(!backup_path_for(&target).exists());
}
