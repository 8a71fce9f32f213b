use beanport_core::{render_entries, Directive};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{io_error, StorageError};

/// Sibling temp path used while replacing `path`.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Replace `path` with `content`, writing to a temp file and renaming it into
/// place so readers never observe a partial file.
pub fn write_atomic(path: &Path, content: &str) -> Result<(), StorageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    let tmp = temp_path(path);
    {
        let mut file = fs::File::create(&tmp).map_err(io_error(&tmp))?;
        file.write_all(content.as_bytes()).map_err(io_error(&tmp))?;
        file.sync_all().map_err(io_error(&tmp))?;
    }
    fs::rename(&tmp, path).map_err(io_error(path))?;
    Ok(())
}

/// Write rendered `entries` to `path`, replacing any previous content.
pub fn write_entries(path: &Path, entries: &[Directive]) -> Result<(), StorageError> {
    write_atomic(path, &render_entries(entries))?;
    tracing::info!(path = %path.display(), entries = entries.len(), "Wrote entries");
    Ok(())
}
