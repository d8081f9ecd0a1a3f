//! Filename generation and matching.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Prefix of staged archive names.
const ARCHIVE_PREFIX: &str = "activity_";

/// Validate and sanitize a filename by removing or replacing invalid characters.
///
/// Returns an error if the filename contains path traversal patterns.
pub fn sanitize_filename(name: &str) -> Result<String> {
    // Reject path traversal attempts
    if name.contains("..") {
        return Err(Error::InvalidFilename(format!(
            "Path traversal detected: '{}'",
            name
        )));
    }

    if name.contains('/') || name.contains('\\') {
        return Err(Error::InvalidFilename(format!(
            "Path separators not allowed in filename: '{}'",
            name
        )));
    }

    if name.contains('\0') {
        return Err(Error::InvalidFilename(format!(
            "Null bytes not allowed in filename: '{}'",
            name
        )));
    }

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.trim().is_empty() {
        return Err(Error::InvalidFilename(
            "Filename cannot be empty or whitespace-only".to_string(),
        ));
    }

    Ok(sanitized)
}

/// Final name of an activity file: `{id}.{ext}`.
pub fn activity_file_name(activity_id: u64, extension: &str) -> Result<String> {
    sanitize_filename(&format!("{}.{}", activity_id, extension))
}

/// Staged archive name: `activity_{id}.{ext}`.
pub fn staged_archive_name(activity_id: u64, extension: &str) -> Result<String> {
    sanitize_filename(&format!("{}{}.{}", ARCHIVE_PREFIX, activity_id, extension))
}

/// Whether `name` looks like an archive with the given extension.
pub fn is_archive_name(name: &str, extension: &str) -> bool {
    name.len() > extension.len() + 1
        && name
            .rsplit_once('.')
            .map(|(_, ext)| ext.eq_ignore_ascii_case(extension))
            .unwrap_or(false)
}

/// Recover the activity id from a staged archive name.
pub fn activity_id_from_archive(name: &str, extension: &str) -> Option<u64> {
    let (stem, ext) = name.rsplit_once('.')?;
    if !ext.eq_ignore_ascii_case(extension) {
        return None;
    }
    stem.strip_prefix(ARCHIVE_PREFIX)?.parse().ok()
}

/// Whether `name` is an extracted file of `activity_id`: either the
/// normalized `{id}.{ext}` or an archive entry name such as `{id}_ACTIVITY.{ext}`.
pub fn is_extracted_activity(name: &str, activity_id: u64, extension: &str) -> bool {
    let Some((stem, ext)) = name.rsplit_once('.') else {
        return false;
    };
    if !ext.eq_ignore_ascii_case(extension) {
        return false;
    }
    let id = activity_id.to_string();
    match stem.strip_prefix(id.as_str()) {
        Some(rest) => rest.is_empty() || rest.starts_with('_'),
        None => false,
    }
}

/// In-progress download name: the final name plus `.part`.
pub fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}
