//! Per-activity download decision.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::fs::{activity_destination, activity_present, file_exists, StagingArea};

/// What to do with one listed activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAction {
    /// The destination file is already present.
    SkipExisting,
    /// A previous, interrupted run already staged the archive.
    ReuseStaged,
    Download,
}

/// One activity's download, built and consumed within a single loop step.
#[derive(Debug, Clone)]
pub struct DownloadTask {
    pub activity_id: u64,
    pub destination: PathBuf,
    pub staging_file: PathBuf,
    pub exists: bool,
    pub staged: bool,
    pub overwrite: bool,
}

impl DownloadTask {
    /// Inspect the filesystem for `activity_id`.
    pub async fn plan(
        activity_id: u64,
        directory: &Path,
        activity_extension: &str,
        staging: &StagingArea,
        overwrite: bool,
    ) -> Result<Self> {
        let destination = activity_destination(directory, activity_id, activity_extension)?;
        let staging_file = staging.archive_path(activity_id)?;
        let exists = activity_present(directory, activity_id, activity_extension).await?;
        let staged = file_exists(&staging_file).await;

        Ok(Self {
            activity_id,
            destination,
            staging_file,
            exists,
            staged,
            overwrite,
        })
    }

    pub fn action(&self) -> TaskAction {
        if self.overwrite {
            TaskAction::Download
        } else if self.exists {
            TaskAction::SkipExisting
        } else if self.staged {
            TaskAction::ReuseStaged
        } else {
            TaskAction::Download
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(exists: bool, staged: bool, overwrite: bool) -> DownloadTask {
        DownloadTask {
            activity_id: 1,
            destination: PathBuf::from("out/1.fit"),
            staging_file: PathBuf::from("staging/activity_1.zip"),
            exists,
            staged,
            overwrite,
        }
    }

    #[test]
    fn test_actions() {
        assert_eq!(task(false, false, false).action(), TaskAction::Download);
        assert_eq!(task(true, false, false).action(), TaskAction::SkipExisting);
        assert_eq!(task(true, true, false).action(), TaskAction::SkipExisting);
        assert_eq!(task(false, true, false).action(), TaskAction::ReuseStaged);
        assert_eq!(task(true, true, true).action(), TaskAction::Download);
        assert_eq!(task(true, false, true).action(), TaskAction::Download);
    }

    #[tokio::test]
    async fn test_plan_reads_filesystem() {
        let out = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let staging = StagingArea::allocate(root.path(), "zip").await.unwrap();
        std::fs::write(out.path().join("101.fit"), b"x").unwrap();

        let present = DownloadTask::plan(101, out.path(), "fit", &staging, false)
            .await
            .unwrap();
        assert!(present.exists);
        assert_eq!(present.destination, out.path().join("101.fit"));
        assert_eq!(present.action(), TaskAction::SkipExisting);

        let missing = DownloadTask::plan(102, out.path(), "fit", &staging, false)
            .await
            .unwrap();
        assert!(!missing.exists);
        assert_eq!(missing.staging_file, staging.path().join("activity_102.zip"));
        assert_eq!(missing.action(), TaskAction::Download);

        std::fs::write(out.path().join("103_ACTIVITY.fit"), b"x").unwrap();
        let kept_name = DownloadTask::plan(103, out.path(), "fit", &staging, false)
            .await
            .unwrap();
        assert_eq!(kept_name.action(), TaskAction::SkipExisting);
    }
}
