//! Unpacking staged archives into the output directory.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::error::{Error, Result};
use crate::fs::naming::{
    activity_file_name, activity_id_from_archive, is_archive_name, partial_path,
};
use crate::fs::paths::ensure_dir;
use crate::fs::staging::clear_dir;

/// Outcome of one extraction pass.
#[derive(Debug, Default)]
pub struct ExtractionReport {
    /// Archives that extracted completely.
    pub archives_extracted: u64,
    /// Files written to the output directory.
    pub files: Vec<PathBuf>,
    /// Archives that could not be opened or failed mid-way.
    pub failures: Vec<(PathBuf, String)>,
    /// Staging entries that were not archives.
    pub ignored: u64,
    /// Whether the staging directory was emptied afterwards.
    pub staging_cleared: bool,
}

/// Turns staged archives into ready-to-parse files.
#[derive(Debug, Clone)]
pub struct ExtractionStage {
    archive_extension: String,
    activity_extension: String,
    rename_extracted: bool,
}

impl ExtractionStage {
    pub fn new(archive_extension: &str, activity_extension: &str) -> Self {
        Self {
            archive_extension: archive_extension.to_string(),
            activity_extension: activity_extension.to_string(),
            rename_extracted: false,
        }
    }

    /// Rename a lone activity file from `activity_<id>` archives to `<id>.<ext>`.
    pub fn with_rename(mut self, rename: bool) -> Self {
        self.rename_extracted = rename;
        self
    }

    /// Extract every archive in `staging_dir` into `output_dir`, then empty
    /// `staging_dir`. A bad archive is recorded and skipped.
    pub async fn extract(&self, staging_dir: &Path, output_dir: &Path) -> Result<ExtractionReport> {
        ensure_dir(output_dir).await?;
        tracing::info!(
            "Extracting archives from {} to {}",
            staging_dir.display(),
            output_dir.display()
        );

        let mut report = ExtractionReport::default();

        for (path, name) in list_entries(staging_dir).await? {
            if !is_archive_name(&name, &self.archive_extension) {
                tracing::debug!("Ignoring staging entry {}", name);
                report.ignored += 1;
                continue;
            }

            let source = path.clone();
            let target = output_dir.to_path_buf();
            let result = tokio::task::spawn_blocking(move || extract_zip(&source, &target))
                .await
                .map_err(|e| Error::Archive {
                    path: path.clone(),
                    message: format!("extraction task failed: {}", e),
                })
                .and_then(|r| r);

            match result {
                Ok(files) => {
                    tracing::debug!("Extracted {} file(s) from {}", files.len(), name);
                    let files = self.maybe_rename(&name, files, output_dir).await;
                    report.archives_extracted += 1;
                    report.files.extend(files);
                }
                Err(e) => {
                    tracing::error!("Failed to unzip {} to {}: {}", path.display(), output_dir.display(), e);
                    report.failures.push((path, e.to_string()));
                }
            }
        }

        match clear_dir(staging_dir).await {
            Ok(removed) => {
                tracing::debug!("Cleared {} staging entries", removed);
                report.staging_cleared = true;
            }
            Err(e) => tracing::warn!("Could not clear staging directory: {}", e),
        }

        Ok(report)
    }

    async fn maybe_rename(&self, archive_name: &str, files: Vec<PathBuf>, output_dir: &Path) -> Vec<PathBuf> {
        if !self.rename_extracted {
            return files;
        }
        let Some(activity_id) = activity_id_from_archive(archive_name, &self.archive_extension) else {
            return files;
        };

        let activity_files: Vec<&PathBuf> = files
            .iter()
            .filter(|f| has_extension(f, &self.activity_extension))
            .collect();
        let [only] = activity_files.as_slice() else {
            return files;
        };

        let Ok(name) = activity_file_name(activity_id, &self.activity_extension) else {
            return files;
        };
        let renamed = output_dir.join(name);
        let original = (*only).clone();

        match tokio::fs::rename(&original, &renamed).await {
            Ok(()) => files
                .into_iter()
                .map(|f| if f == original { renamed.clone() } else { f })
                .collect(),
            Err(e) => {
                tracing::warn!("Could not rename {} to {}: {}", original.display(), renamed.display(), e);
                files
            }
        }
    }
}

/// Entries of `dir` in name order.
async fn list_entries(dir: &Path) -> Result<Vec<(PathBuf, String)>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| Error::filesystem(dir, e))?;
    let mut listed = Vec::new();

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Error::filesystem(dir, e))?
    {
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if !is_file {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        listed.push((entry.path(), name));
    }

    listed.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(listed)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

/// Extract all entries of one zip archive into `target`.
///
/// Entries are written to `.part` files and renamed once complete. If any
/// entry fails, every file already written from this archive is removed,
/// so a bad archive leaves nothing behind in `target`.
fn extract_zip(source: &Path, target: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    match extract_entries(source, target, &mut written) {
        Ok(()) => Ok(written),
        Err(e) => {
            for path in &written {
                if let Err(remove_err) = fs::remove_file(path) {
                    tracing::warn!("Could not remove {}: {}", path.display(), remove_err);
                }
            }
            Err(e)
        }
    }
}

fn extract_entries(source: &Path, target: &Path, written: &mut Vec<PathBuf>) -> Result<()> {
    let archive_error = |message: String| Error::Archive {
        path: source.to_path_buf(),
        message,
    };

    let file = File::open(source).map_err(|e| Error::filesystem(source, e))?;
    let mut archive =
        ZipArchive::new(file).map_err(|e| archive_error(format!("not a valid archive: {}", e)))?;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| archive_error(format!("unreadable entry {}: {}", index, e)))?;

        let Some(relative) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
            tracing::warn!("Skipping unsafe entry '{}' in {}", entry.name(), source.display());
            continue;
        };
        let destination = target.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&destination).map_err(|e| Error::filesystem(&destination, e))?;
            continue;
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::filesystem(parent, e))?;
        }

        let partial = partial_path(&destination);
        let copied = File::create(&partial)
            .map_err(|e| Error::filesystem(&partial, e))
            .and_then(|mut output| {
                io::copy(&mut entry, &mut output).map_err(|e| {
                    archive_error(format!("failed extracting '{}': {}", entry.name(), e))
                })
            });
        if let Err(e) = copied {
            // Best effort; the archive error is what gets reported.
            let _ = fs::remove_file(&partial);
            return Err(e);
        }

        fs::rename(&partial, &destination).map_err(|e| Error::filesystem(&destination, e))?;
        written.push(destination);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, contents) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(contents).unwrap();
        }
        zip.finish().unwrap();
    }

    #[tokio::test]
    async fn test_valid_and_corrupt_archives() {
        let staging = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_zip(
            &staging.path().join("activity_101.zip"),
            &[("101_ACTIVITY.fit", b"fit-bytes")],
        );
        std::fs::write(staging.path().join("activity_102.zip"), b"definitely not a zip").unwrap();

        let stage = ExtractionStage::new("zip", "fit");
        let report = stage.extract(staging.path(), output.path()).await.unwrap();

        assert_eq!(report.archives_extracted, 1);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].0.ends_with("activity_102.zip"));
        assert_eq!(
            std::fs::read(output.path().join("101_ACTIVITY.fit")).unwrap(),
            b"fit-bytes"
        );
        assert!(report.staging_cleared);
        assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
        assert!(staging.path().is_dir());
    }

    #[tokio::test]
    async fn test_checksum_mismatch_leaves_no_files() {
        let staging = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let archive = staging.path().join("activity_1.zip");
        write_zip(
            &archive,
            &[("notes.txt", b"first entry"), ("1_ACTIVITY.fit", b"PAYLOAD-BYTES")],
        );

        // Flip one stored payload byte so the CRC check fails on read.
        let mut bytes = std::fs::read(&archive).unwrap();
        let at = bytes
            .windows(b"PAYLOAD-BYTES".len())
            .position(|w| w == b"PAYLOAD-BYTES")
            .unwrap();
        bytes[at] ^= 0xff;
        std::fs::write(&archive, bytes).unwrap();

        let report = ExtractionStage::new("zip", "fit")
            .extract(staging.path(), output.path())
            .await
            .unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.archives_extracted, 0);
        assert!(report.files.is_empty());
        assert_eq!(std::fs::read_dir(output.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_non_archives_are_ignored() {
        let staging = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        std::fs::write(staging.path().join("activity_5.zip.part"), b"partial").unwrap();
        std::fs::write(staging.path().join("notes.txt"), b"x").unwrap();

        let report = ExtractionStage::new("zip", "fit")
            .extract(staging.path(), output.path())
            .await
            .unwrap();

        assert_eq!(report.ignored, 2);
        assert!(report.failures.is_empty());
        assert!(report.files.is_empty());
        assert_eq!(std::fs::read_dir(output.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_nested_entries_keep_archive_names() {
        let staging = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_zip(
            &staging.path().join("bundle.zip"),
            &[("a.fit", b"a"), ("sub/b.fit", b"b")],
        );

        let report = ExtractionStage::new("zip", "fit")
            .extract(staging.path(), output.path())
            .await
            .unwrap();

        assert_eq!(report.files.len(), 2);
        assert!(output.path().join("a.fit").is_file());
        assert!(output.path().join("sub").join("b.fit").is_file());
    }

    #[tokio::test]
    async fn test_rename_single_activity_file() {
        let staging = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_zip(
            &staging.path().join("activity_102.zip"),
            &[("102_ACTIVITY.fit", b"fit")],
        );

        let report = ExtractionStage::new("zip", "fit")
            .with_rename(true)
            .extract(staging.path(), output.path())
            .await
            .unwrap();

        assert_eq!(report.files, vec![output.path().join("102.fit")]);
        assert!(output.path().join("102.fit").is_file());
        assert!(!output.path().join("102_ACTIVITY.fit").exists());
    }

    #[tokio::test]
    async fn test_rename_skipped_when_ambiguous() {
        let staging = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_zip(
            &staging.path().join("activity_103.zip"),
            &[("x.fit", b"1"), ("y.fit", b"2")],
        );

        ExtractionStage::new("zip", "fit")
            .with_rename(true)
            .extract(staging.path(), output.path())
            .await
            .unwrap();

        assert!(output.path().join("x.fit").is_file());
        assert!(output.path().join("y.fit").is_file());
        assert!(!output.path().join("103.fit").exists());
    }

    #[tokio::test]
    async fn test_missing_staging_dir_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let result = ExtractionStage::new("zip", "fit")
            .extract(&root.path().join("missing"), &root.path().join("out"))
            .await;
        assert!(matches!(result, Err(Error::Filesystem { .. })));
    }
}
