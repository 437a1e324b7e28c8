//! History of purge statuses, keyed by the purge id the API assigns.
//!
//! One purge id can collect many snapshots: a purge submitted in several
//! batches shares an id, and every status check appends another snapshot.
//! The newest snapshot is the current state, older ones are kept until the
//! record is deleted or expires.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::store::{KeyValueStore, StoreError};
use crate::types::{PURGE_DONE, PurgeResponse, PurgeStatusResponse};

/// Key the whole status log is stored under.
pub const PURGE_STATUS_KEY: &str = "ccu.purge_status";

pub type StatusLog = IndexMap<String, Vec<StatusSnapshot>>;

/// The API's view of a purge at one point in time. Submission responses and
/// status checks report their state under different keys, both end up in
/// `description`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub purge_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub support_id: Option<String>,
    pub http_status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ping_after_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_queue_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<String>,
}

impl From<PurgeResponse> for StatusUpdate {
    fn from(response: PurgeResponse) -> Self {
        StatusUpdate {
            purge_id: response.purge_id,
            support_id: response.support_id,
            http_status: response.http_status,
            description: response.detail,
            estimated_seconds: response.estimated_seconds,
            ping_after_seconds: response.ping_after_seconds,
            original_queue_length: None,
            progress_uri: response.progress_uri,
            submitted_by: None,
            submission_time: None,
            completion_time: None,
        }
    }
}

impl From<PurgeStatusResponse> for StatusUpdate {
    fn from(response: PurgeStatusResponse) -> Self {
        StatusUpdate {
            description: response.purge_status.or(response.detail),
            purge_id: response.purge_id,
            support_id: response.support_id,
            http_status: response.http_status,
            estimated_seconds: response.original_estimated_seconds,
            ping_after_seconds: response.ping_after_seconds,
            original_queue_length: response.original_queue_length,
            progress_uri: None,
            submitted_by: response.submitted_by,
            submission_time: response.submission_time,
            completion_time: response.completion_time,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    #[serde(flatten)]
    pub status: StatusUpdate,
    /// Unix timestamp, in seconds, of when the request was made locally.
    pub request_made_at: u64,
    /// Only set on snapshots created by a submission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urls_queued: Option<Vec<String>>,
}

impl StatusSnapshot {
    pub fn purge_id(&self) -> &str {
        &self.status.purge_id
    }

    pub fn is_complete(&self) -> bool {
        self.status.description.as_deref() == Some(PURGE_DONE)
    }
}

type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

pub struct PurgeStatusStore {
    kv: Arc<dyn KeyValueStore>,
    clock: Clock,
}

impl PurgeStatusStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        PurgeStatusStore {
            kv,
            clock: Arc::new(unix_now),
        }
    }

    /// Replaces the wall clock, in unix seconds.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> u64 + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// Appends a snapshot to the history of its purge id and returns it.
    pub fn save<S>(&self, status: S, urls_queued: Option<Vec<String>>) -> Result<StatusSnapshot, StoreError>
    where
        S: Into<StatusUpdate>,
    {
        let snapshot = StatusSnapshot {
            status: status.into(),
            request_made_at: (self.clock)(),
            urls_queued,
        };

        self.modify(|log| {
            log.entry(snapshot.purge_id().to_string())
                .or_default()
                .push(snapshot.clone());
        })?;

        Ok(snapshot)
    }

    /// Every snapshot recorded for a purge id, oldest first.
    pub fn get(&self, purge_id: &str) -> Result<Option<Vec<StatusSnapshot>>, StoreError> {
        Ok(self.load()?.shift_remove(purge_id))
    }

    /// All histories, in the order their purge ids were first seen.
    pub fn get_all(&self) -> Result<StatusLog, StoreError> {
        self.load()
    }

    /// Removes a purge id and its whole history. Unknown ids are ignored.
    /// Returns whether anything was removed.
    pub fn delete(&self, purge_id: &str) -> Result<bool, StoreError> {
        let mut removed = false;
        self.modify(|log| {
            removed = log.shift_remove(purge_id).is_some();
        })?;
        Ok(removed)
    }

    /// Drops every purge whose newest snapshot is at least `max_age` old.
    /// Returns the purge ids that were removed.
    pub fn expire(&self, max_age: Duration) -> Result<Vec<String>, StoreError> {
        let now = (self.clock)();
        let max_age = max_age.as_secs();
        let mut expired = Vec::new();

        self.modify(|log| {
            expired.clear();
            log.retain(|purge_id, snapshots| {
                let keep = snapshots
                    .last()
                    .is_some_and(|newest| now.saturating_sub(newest.request_made_at) < max_age);
                if !keep {
                    expired.push(purge_id.clone());
                }
                keep
            });
        })?;

        Ok(expired)
    }

    fn load(&self) -> Result<StatusLog, StoreError> {
        decode(self.kv.get(PURGE_STATUS_KEY)?)
    }

    fn modify<F>(&self, mut f: F) -> Result<(), StoreError>
    where
        F: FnMut(&mut StatusLog),
    {
        self.kv.update(PURGE_STATUS_KEY, &mut |current| {
            let mut log = decode(current)?;
            f(&mut log);
            if log.is_empty() {
                return Ok(None);
            }
            serde_json::to_vec(&log).map(Some).map_err(StoreError::Encode)
        })
    }
}

fn decode(bytes: Option<Vec<u8>>) -> Result<StatusLog, StoreError> {
    match bytes {
        Some(bytes) => serde_json::from_slice(&bytes).map_err(StoreError::Decode),
        None => Ok(StatusLog::new()),
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
