use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;
use tempfile::NamedTempFile;

/// Atomically replaces `path` with `buf`.
///
/// The buffer is written to a temporary file in the same directory, synced,
/// and then renamed over the destination, so readers see either the old or
/// the new document and never a partial one.
pub fn safe_write_all<P: AsRef<Path>>(path: P, buf: &[u8]) -> io::Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(buf)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Serializes `value` as JSON and writes it with [`safe_write_all`].
pub fn write_json<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> Result<(), crate::error::CompanionError> {
    let buf = serde_json::to_vec_pretty(value)?;
    safe_write_all(path, &buf)?;
    Ok(())
}
