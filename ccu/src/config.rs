use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::router::{AnyRoute, RoutePatterns, SiteRouter};
use crate::signer::Credentials;
use crate::types::{ClientSession, ObjectType, PurgeAction, PurgeDomain, QueueName, ValidationMode};

const DEFAULT_API_PATH: &str = "/ccu/v2";
const DEFAULT_TIMEOUT_SECS: u64 = 20;
// Two weeks.
const DEFAULT_STATUS_EXPIRE_SECS: u64 = 1_209_600;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("timeout must be greater than 0")]
    InvalidTimeout,

    #[error("base_url must be an absolute http(s) URL, got {0}")]
    InvalidBaseUrl(String),

    #[error("{0} must be set")]
    MissingEndpoint(&'static str),

    #[error("client_token, client_secret and access_token are required outside devel mode")]
    IncompleteCredentials,
}

/// Connection and purge defaults for the CCU API.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct CcuConfig {
    /// Host of the CCU REST API, e.g. `https://akab-xxx.purge.akamaiapis.net/`
    pub rest_api_url: Option<Url>,
    /// Path prefix of the API endpoints on that host.
    #[serde(default = "default_api_path")]
    pub api_path: String,
    #[serde(default)]
    pub credentials: Credentials,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Fully qualified origin of the site, used to qualify relative paths.
    pub base_url: Url,
    /// Send everything to `mock_endpoint` instead of `rest_api_url`.
    #[serde(default)]
    pub devel_mode: bool,
    pub mock_endpoint: Option<Url>,
    #[serde(default)]
    pub log_requests: bool,
    #[serde(default)]
    pub action: PurgeAction,
    #[serde(default)]
    pub domain: PurgeDomain,
    #[serde(default, rename = "type")]
    pub object_type: ObjectType,
    #[serde(default)]
    pub queue: QueueName,
    #[serde(default)]
    pub validation: ValidationMode,
    /// Paths of the site that may be purged. Every path is accepted when unset.
    pub known_routes: Option<Vec<String>>,
}

fn default_api_path() -> String {
    DEFAULT_API_PATH.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl CcuConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }

        if !matches!(self.base_url.scheme(), "http" | "https") || !self.base_url.has_host() {
            return Err(ValidationError::InvalidBaseUrl(self.base_url.to_string()));
        }

        self.api_host()?;

        if !self.devel_mode && !self.credentials.is_complete() {
            return Err(ValidationError::IncompleteCredentials);
        }

        Ok(())
    }

    /// The host requests go to, which depends on devel mode.
    pub fn api_host(&self) -> Result<&Url, ValidationError> {
        if self.devel_mode {
            self.mock_endpoint
                .as_ref()
                .ok_or(ValidationError::MissingEndpoint("mock_endpoint"))
        } else {
            self.rest_api_url
                .as_ref()
                .ok_or(ValidationError::MissingEndpoint("rest_api_url"))
        }
    }

    pub fn api_base_url(&self) -> Result<String, ValidationError> {
        let host = self.api_host()?;
        let path = self.api_path.trim_matches('/');
        let host = host.as_str().trim_end_matches('/');

        if path.is_empty() {
            Ok(host.to_string())
        } else {
            Ok(format!("{host}/{path}"))
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn session(&self) -> ClientSession {
        ClientSession {
            action: self.action,
            domain: self.domain,
            object_type: self.object_type,
            queue: self.queue.clone(),
        }
    }

    pub fn site_router(&self) -> Arc<dyn SiteRouter> {
        match &self.known_routes {
            Some(routes) => Arc::new(RoutePatterns::new(routes)),
            None => Arc::new(AnyRoute),
        }
    }
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
#[serde(tag = "type")]
pub enum StatusStoreType {
    Memory,
    Filesystem { base_dir: String },
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct StatusStoreConfig {
    #[serde(flatten)]
    pub r#type: StatusStoreType,
    /// Purge statuses older than this are removed by `expire`.
    #[serde(default = "default_status_expire_secs")]
    pub status_expire_secs: u64,
}

fn default_status_expire_secs() -> u64 {
    DEFAULT_STATUS_EXPIRE_SECS
}

impl StatusStoreConfig {
    pub fn status_expire(&self) -> Duration {
        Duration::from_secs(self.status_expire_secs)
    }
}

impl Default for StatusStoreConfig {
    fn default() -> Self {
        StatusStoreConfig {
            r#type: StatusStoreType::Memory,
            status_expire_secs: DEFAULT_STATUS_EXPIRE_SECS,
        }
    }
}
