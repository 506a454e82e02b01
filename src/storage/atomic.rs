use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Replaces `path` with `contents` without ever exposing a partial file
///
/// The data goes to a temporary file in the same directory, is synced, and is then renamed over
/// the destination. A crash at any point leaves either the old or the new snapshot.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
