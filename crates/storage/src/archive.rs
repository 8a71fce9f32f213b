use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{io_error, StorageError};

/// Move `source` to `destination`, creating parent directories.
///
/// When `destination` is already taken the path returned by `fallback` is
/// used instead; if that is taken as well the move fails and `source` stays
/// where it is. Returns the path the file ended up at.
pub fn move_file(
    source: &Path,
    destination: &Path,
    fallback: impl FnOnce() -> PathBuf,
) -> Result<PathBuf, StorageError> {
    if !source.is_file() {
        return Err(StorageError::Io {
            path: source.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "source file not found"),
        });
    }

    let mut target = destination.to_path_buf();
    if target.exists() {
        let alternative = fallback();
        tracing::warn!(
            file = %source.display(),
            taken = %target.display(),
            using = %alternative.display(),
            "Archive destination exists"
        );
        target = alternative;
    }
    if target.exists() {
        return Err(StorageError::Io {
            path: target.display().to_string(),
            source: std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "archive destination already exists",
            ),
        });
    }

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }

    if fs::rename(source, &target).is_err() {
        // Cross-device: copy next to the target, then rename into place.
        copy_then_remove(source, &target)?;
    }
    tracing::info!(from = %source.display(), to = %target.display(), "Archived");
    Ok(target)
}

fn copy_then_remove(source: &Path, target: &Path) -> Result<(), StorageError> {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    let temp = target.with_file_name(name);

    fs::copy(source, &temp).map_err(io_error(&temp))?;
    if let Err(e) = fs::rename(&temp, target) {
        let _ = fs::remove_file(&temp);
        return Err(io_error(target)(e));
    }
    fs::remove_file(source).map_err(io_error(source))?;
    Ok(())
}
