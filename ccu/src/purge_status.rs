use crate::status::StatusSnapshot;

/// Summary of one purge, derived from its snapshot history.
#[derive(Clone, Debug, PartialEq)]
pub struct PurgeStatus {
    snapshots: Vec<StatusSnapshot>,
    urls: Vec<String>,
}

impl PurgeStatus {
    /// Returns `None` for an empty history.
    pub fn new(snapshots: Vec<StatusSnapshot>) -> Option<Self> {
        if snapshots.is_empty() {
            return None;
        }

        let urls = snapshots
            .iter()
            .filter_map(|snapshot| snapshot.urls_queued.as_ref())
            .flatten()
            .cloned()
            .collect();

        Some(PurgeStatus { snapshots, urls })
    }

    pub fn most_recent(&self) -> &StatusSnapshot {
        // Never empty, checked in new().
        &self.snapshots[self.snapshots.len() - 1]
    }

    pub fn purge_id(&self) -> &str {
        self.most_recent().purge_id()
    }

    pub fn support_id(&self) -> Option<&str> {
        self.most_recent().status.support_id.as_deref()
    }

    pub fn last_checked_time(&self) -> u64 {
        self.most_recent().request_made_at
    }

    pub fn http_code(&self) -> u16 {
        self.most_recent().status.http_status
    }

    pub fn description(&self) -> Option<&str> {
        self.most_recent().status.description.as_deref()
    }

    /// Every URL queued under this purge id, across all batches.
    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn is_complete(&self) -> bool {
        self.most_recent().is_complete()
    }

    pub fn snapshots(&self) -> &[StatusSnapshot] {
        &self.snapshots
    }
}
