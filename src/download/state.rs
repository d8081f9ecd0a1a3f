//! Download state tracking.

use std::collections::HashSet;

/// Per-run download state.
#[derive(Debug, Default)]
pub struct DownloadState {
    // Deduplication tracking - activity IDs handled this run
    pub seen_activity_ids: HashSet<u64>,

    // Statistics
    pub listed: u64,
    pub downloaded: u64,
    pub skipped_existing: u64,
    pub reused_staged: u64,
    pub duplicate_count: u64,
    pub failed: u64,
    pub bytes_downloaded: u64,
    pub failed_ids: Vec<u64>,
    pub cancelled: bool,
}

impl DownloadState {
    /// Record an id; returns false if it was already handled this run.
    pub fn mark_seen(&mut self, activity_id: u64) -> bool {
        self.seen_activity_ids.insert(activity_id)
    }

    /// Increment duplicate count.
    pub fn increment_duplicate(&mut self) {
        self.duplicate_count += 1;
    }

    pub fn record_download(&mut self, bytes: u64) {
        self.downloaded += 1;
        self.bytes_downloaded += bytes;
    }

    pub fn record_failure(&mut self, activity_id: u64) {
        self.failed += 1;
        self.failed_ids.push(activity_id);
    }

    /// Activities for which a download request was issued.
    pub fn attempted(&self) -> u64 {
        self.downloaded + self.failed
    }

    /// Activities not fetched because their file or archive was already there.
    pub fn skipped(&self) -> u64 {
        self.skipped_existing + self.reused_staged + self.duplicate_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let mut state = DownloadState::default();
        assert!(state.mark_seen(1));
        assert!(!state.mark_seen(1));
        assert!(state.seen_activity_ids.contains(&1));

        state.record_download(100);
        state.record_download(50);
        state.record_failure(3);
        state.skipped_existing += 1;
        state.increment_duplicate();

        assert_eq!(state.attempted(), 3);
        assert_eq!(state.skipped(), 2);
        assert_eq!(state.bytes_downloaded, 150);
        assert_eq!(state.failed_ids, vec![3]);
    }
}
