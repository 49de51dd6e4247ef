//! Streaming copy used to stage backups.
//!
//! - Writes to a newly created destination file (`create_new`; never clobbers).
//! - Buffered I/O with 1 MiB buffers to reduce syscall count.
//! - Data and metadata are forced to stable storage (`sync_all`) before returning.
//!
//! Snapshot semantics: the source is read once from start to EOF. The target is
//! locked by the caller while this runs, so well-behaved writers cannot change it.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

const BUF_SIZE: usize = 1024 * 1024;

/// Copy everything readable from `src` into a new file at `dst`, then fsync it.
/// Returns the number of bytes copied.
pub(super) fn copy_to_new_file(src: &Path, dst: &Path) -> io::Result<u64> {
    let src_f = File::open(src)?;
    let dst_f = OpenOptions::new().write(true).create_new(true).open(dst)?;
    copy_durable(src_f, dst_f)
}

fn copy_durable<R: Read>(reader: R, dst_f: File) -> io::Result<u64> {
    let mut reader = BufReader::with_capacity(BUF_SIZE, reader);
    let mut writer = BufWriter::with_capacity(BUF_SIZE, dst_f);
    let bytes = io::copy(&mut reader, &mut writer)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(bytes)
}
