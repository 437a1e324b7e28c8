use ccu::metrics_defs::ALL_METRICS;
use ccu::store::{KeyValueStore, StoreError, set_json};
use ccu::types::queue_length_report;
use ccu::{CcuError, PurgeClient, PurgeStatus, PurgeStatusStore, StatusSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Key the outcome of the last credentials check is stored under.
pub const VALID_CREDENTIALS_KEY: &str = "ccu.valid_credentials";

#[derive(thiserror::Error, Debug)]
pub enum CommandError {
    #[error(transparent)]
    Ccu(#[from] CcuError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no status recorded for purge {0}")]
    UnknownPurge(String),
    #[error("CCU credentials were rejected")]
    NotAuthorized,
}

/// Per-call overrides of the session defaults.
#[derive(Debug, Default)]
pub struct PurgeOptions {
    pub action: Option<String>,
    pub domain: Option<String>,
    pub object_type: Option<String>,
    pub queue: Option<String>,
}

pub struct App {
    pub client: PurgeClient,
    pub status_store: Arc<PurgeStatusStore>,
    pub kv: Arc<dyn KeyValueStore>,
    pub status_expire: Duration,
}

impl App {
    pub async fn purge(
        &mut self,
        paths: &[String],
        options: PurgeOptions,
    ) -> Result<(), CommandError> {
        if let Some(action) = &options.action {
            self.client.set_action(action)?;
        }
        if let Some(domain) = &options.domain {
            self.client.set_domain(domain)?;
        }
        if let Some(object_type) = &options.object_type {
            self.client.set_type(object_type)?;
        }
        if let Some(queue) = &options.queue {
            self.client.set_queue(queue)?;
        }

        let submission = self.client.purge_urls(paths).await?;

        for skipped in &submission.skipped {
            println!("skipped {skipped}");
        }
        println!(
            "{} ({} URLs queued)",
            submission.response.detail.as_deref().unwrap_or("Request accepted."),
            submission.urls.len()
        );
        println!("purge id:   {}", submission.response.purge_id);
        if let Some(support_id) = &submission.response.support_id {
            println!("support id: {support_id}");
        }
        if let Some(seconds) = submission.response.estimated_seconds {
            println!("estimated:  {seconds}s");
        }
        Ok(())
    }

    pub async fn queue_length(&self) -> Result<(), CommandError> {
        let length = self.client.get_queue_length().await?;
        println!("{}", queue_length_report(length));
        Ok(())
    }

    /// Checks the configured credentials against the API and records the outcome.
    pub async fn verify(&self) -> Result<(), CommandError> {
        let authorized = self.client.is_authorized().await;
        set_json(self.kv.as_ref(), VALID_CREDENTIALS_KEY, &authorized)?;

        if !authorized {
            return Err(CommandError::NotAuthorized);
        }
        println!("CCU credentials are valid");
        Ok(())
    }

    /// Lists every tracked purge, sweeping expired ones first.
    pub fn list_statuses(&self) -> Result<(), CommandError> {
        self.expire(None)?;

        let statuses = self.status_store.get_all()?;
        if statuses.is_empty() {
            println!("No purges found.");
            return Ok(());
        }

        for snapshots in statuses.into_values() {
            if let Some(status) = PurgeStatus::new(snapshots) {
                println!("{}", status_row(&status));
            }
        }
        Ok(())
    }

    pub fn show_status(&self, purge_id: &str) -> Result<(), CommandError> {
        let snapshots = self
            .status_store
            .get(purge_id)?
            .ok_or_else(|| CommandError::UnknownPurge(purge_id.to_string()))?;

        for snapshot in &snapshots {
            println!("{}", snapshot_row(snapshot));
        }
        Ok(())
    }

    /// Fetches a fresh status from the API and records it.
    pub async fn check_status(&self, purge_id: &str) -> Result<(), CommandError> {
        let response = self.client.get_purge_status(purge_id).await?;
        self.status_store.save(response, None)?;

        let snapshots = self.status_store.get(purge_id)?.unwrap_or_default();
        match PurgeStatus::new(snapshots) {
            Some(status) => {
                println!("{}", status_row(&status));
                if status.is_complete() {
                    println!("purge complete");
                }
            }
            None => println!("no status recorded for {purge_id}"),
        }
        Ok(())
    }

    pub fn delete_status(&self, purge_id: &str) -> Result<(), CommandError> {
        if self.status_store.delete(purge_id)? {
            info!(purge_id, "deleted purge status");
        }
        Ok(())
    }

    pub fn expire(&self, max_age: Option<Duration>) -> Result<(), CommandError> {
        let expired = self
            .status_store
            .expire(max_age.unwrap_or(self.status_expire))?;
        if !expired.is_empty() {
            info!(count = expired.len(), "expired purge statuses");
        }
        Ok(())
    }
}

pub fn list_metrics() {
    for metric in ALL_METRICS {
        println!(
            "{}\t{}\t{}",
            metric.name,
            metric.metric_type.as_str(),
            metric.description
        );
    }
}

fn snapshot_row(snapshot: &StatusSnapshot) -> String {
    format!(
        "{}\t{}\t{}",
        snapshot.request_made_at,
        snapshot.status.http_status,
        snapshot.status.description.as_deref().unwrap_or("-")
    )
}

fn status_row(status: &PurgeStatus) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}",
        status.last_checked_time(),
        status.urls().join(", "),
        status.purge_id(),
        status.support_id().unwrap_or("-"),
        status.description().unwrap_or("-"),
    )
}
