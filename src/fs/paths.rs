//! Path and directory management.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::fs::naming::{activity_file_name, is_extracted_activity};

/// Destination of an activity's extracted file: `{directory}/{id}.{ext}`.
pub fn activity_destination(directory: &Path, activity_id: u64, extension: &str) -> Result<PathBuf> {
    Ok(directory.join(activity_file_name(activity_id, extension)?))
}

/// Ensure a directory exists, creating it if necessary.
pub async fn ensure_dir(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| Error::filesystem(path, e))
}

/// Whether a regular file exists at `path`.
pub async fn file_exists(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Whether `directory` already holds an extracted file for `activity_id`,
/// under its normalized name or its archive entry name.
pub async fn activity_present(directory: &Path, activity_id: u64, extension: &str) -> Result<bool> {
    if file_exists(&activity_destination(directory, activity_id, extension)?).await {
        return Ok(true);
    }

    let mut entries = match tokio::fs::read_dir(directory).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(Error::filesystem(directory, e)),
    };

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Error::filesystem(directory, e))?
    {
        let name = entry.file_name();
        if is_extracted_activity(&name.to_string_lossy(), activity_id, extension)
            && file_exists(&entry.path()).await
        {
            return Ok(true);
        }
    }

    Ok(false)
}
