use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Hidden sibling temp name for staging a backup next to `target`.
/// Pattern: .<file name>.<pid>.<nanos>.<seq>.tmp
pub(super) fn unique_temp_path(target: &Path) -> PathBuf {
    let pid = std::process::id();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let stem = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "atomic_replace".to_string());
    let name = format!(".{stem}.{pid}.{nanos}.{seq}.tmp");
    target.with_file_name(name)
}

/// Directory containing `path` ("." for bare file names).
pub(super) fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

#[cfg(unix)]
pub(super) fn fsync_dir(dir: &Path) -> io::Result<()> {
    let f = File::open(dir)?;
    f.sync_all()
}

#[cfg(not(unix))]
pub(super) fn fsync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn temp_names_are_unique_hidden_siblings() {
        let target = Path::new("/data/refs.bib");
        let mut seen = HashSet::new();
        for _ in 0..16 {
            let p = unique_temp_path(target);
            assert_eq!(p.parent(), Some(Path::new("/data")));
            let name = p.file_name().unwrap().to_string_lossy().into_owned();
            assert!(name.starts_with(".refs.bib."));
            assert!(name.ends_with(".tmp"));
            assert!(seen.insert(p));
        }
    }

    #[test]
    fn parent_of_bare_name_is_cwd() {
        assert_eq!(parent_dir(Path::new("file.txt")), Path::new("."));
        assert_eq!(parent_dir(Path::new("a/file.txt")), Path::new("a"));
    }
}
