//! Client for the Akamai Content Control Utility (CCU v2) purge API.
//!
//! Paths are normalized against the site's base URL, submitted to a purge
//! queue with signed requests, and every accepted purge is tracked in a status
//! store keyed by the purge id the API hands back.

pub mod client;
pub mod config;
pub mod error;
pub mod metrics_defs;
pub mod normalizer;
pub mod purge_status;
pub mod request;
pub mod router;
pub mod sender;
pub mod signer;
pub mod status;
pub mod store;
pub mod types;

use std::sync::Arc;

pub use client::{PurgeClient, PurgeSubmission};
pub use error::{CcuError, PathError, Result};
pub use purge_status::PurgeStatus;
pub use status::{PurgeStatusStore, StatusSnapshot};

use config::StatusStoreType;
use store::{FilesystemStore, KeyValueStore, MemoryStore, StoreError};

pub fn get_store(store_type: &StatusStoreType) -> Result<Arc<dyn KeyValueStore>, StoreError> {
    let store: Arc<dyn KeyValueStore> = match store_type {
        StatusStoreType::Memory => Arc::new(MemoryStore::new()),
        StatusStoreType::Filesystem { base_dir } => Arc::new(FilesystemStore::new(base_dir)?),
    };
    Ok(store)
}
