//! Per-run staging directory for downloaded archives.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::fs::naming::staged_archive_name;

/// A staging directory owned by exactly one run.
///
/// Allocation creates a new `run-<uuid>` directory and fails if it already
/// exists, so two runs never share one.
#[derive(Debug)]
pub struct StagingArea {
    path: PathBuf,
    archive_extension: String,
}

impl StagingArea {
    /// Create a fresh staging directory under `root`.
    pub async fn allocate(root: &Path, archive_extension: &str) -> Result<Self> {
        tokio::fs::create_dir_all(root)
            .await
            .map_err(|e| Error::filesystem(root, e))?;

        let path = root.join(format!("run-{}", Uuid::new_v4()));
        tokio::fs::create_dir(&path)
            .await
            .map_err(|e| Error::filesystem(&path, e))?;

        tracing::debug!("Allocated staging directory {}", path.display());
        Ok(Self {
            path,
            archive_extension: archive_extension.to_string(),
        })
    }

    /// Adopt a staging directory left behind by a cancelled run.
    pub async fn resume(path: &Path, archive_extension: &str) -> Result<Self> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| Error::filesystem(path, e))?;
        if !metadata.is_dir() {
            return Err(Error::filesystem(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a directory"),
            ));
        }

        tracing::info!("Resuming staging directory {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            archive_extension: archive_extension.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where the archive for `activity_id` is staged.
    pub fn archive_path(&self, activity_id: u64) -> Result<PathBuf> {
        Ok(self
            .path
            .join(staged_archive_name(activity_id, &self.archive_extension)?))
    }

    /// Remove every entry in the staging directory, keeping the directory.
    pub async fn clear(&self) -> Result<usize> {
        clear_dir(&self.path).await
    }

    /// Clear and remove the staging directory at the end of a run.
    pub async fn finish(self) -> Result<()> {
        self.clear().await?;
        tokio::fs::remove_dir(&self.path)
            .await
            .map_err(|e| Error::filesystem(&self.path, e))?;
        tracing::debug!("Removed staging directory {}", self.path.display());
        Ok(())
    }
}

/// Remove all entries of `dir`. Returns how many were removed.
pub async fn clear_dir(dir: &Path) -> Result<usize> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| Error::filesystem(dir, e))?;
    let mut removed = 0;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Error::filesystem(dir, e))?
    {
        let path = entry.path();
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| Error::filesystem(&path, e))?;

        let result = if file_type.is_dir() {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };
        result.map_err(|e| Error::filesystem(&path, e))?;
        removed += 1;
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_allocate_creates_unique_dirs() {
        let root = tempfile::tempdir().unwrap();
        let a = StagingArea::allocate(root.path(), "zip").await.unwrap();
        let b = StagingArea::allocate(root.path(), "zip").await.unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a.path().is_dir());
        assert!(b.path().starts_with(root.path()));
    }

    #[tokio::test]
    async fn test_archive_path_is_named_by_id() {
        let root = tempfile::tempdir().unwrap();
        let staging = StagingArea::allocate(root.path(), "zip").await.unwrap();
        assert_eq!(
            staging.archive_path(102).unwrap(),
            staging.path().join("activity_102.zip")
        );
    }

    #[tokio::test]
    async fn test_clear_keeps_directory() {
        let root = tempfile::tempdir().unwrap();
        let staging = StagingArea::allocate(root.path(), "zip").await.unwrap();
        std::fs::write(staging.path().join("activity_1.zip"), b"x").unwrap();
        std::fs::write(staging.path().join("activity_2.zip.part"), b"x").unwrap();
        std::fs::create_dir(staging.path().join("leftover")).unwrap();

        assert_eq!(staging.clear().await.unwrap(), 3);
        assert!(staging.path().is_dir());
        assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_finish_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let staging = StagingArea::allocate(root.path(), "zip").await.unwrap();
        let path = staging.path().to_path_buf();
        std::fs::write(path.join("activity_1.zip"), b"x").unwrap();

        staging.finish().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_resume_existing_and_missing() {
        let root = tempfile::tempdir().unwrap();
        let staging = StagingArea::resume(root.path(), "zip").await.unwrap();
        assert_eq!(staging.path(), root.path());

        let missing = root.path().join("nope");
        assert!(matches!(
            StagingArea::resume(&missing, "zip").await,
            Err(Error::Filesystem { .. })
        ));
    }
}
