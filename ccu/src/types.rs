use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CcuError;

pub const DEFAULT_QUEUE: &str = "default";

/// Upstream description of a purge that has finished propagating.
pub const PURGE_DONE: &str = "Done";

/// Declares a lowercase string enum accepted by the CCU API, with a parser that
/// lists every valid option when it rejects a value.
macro_rules! api_enum {
    ($name:ident, $label:literal, { $($variant:ident => $value:literal),+ $(,)? }) => {
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            #[default]
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub const fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = CcuError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                $name::ALL
                    .iter()
                    .copied()
                    .find(|candidate| candidate.as_str() == value)
                    .ok_or_else(|| {
                        let options = $name::ALL
                            .iter()
                            .map(|candidate| candidate.as_str())
                            .collect::<Vec<_>>()
                            .join(", ");
                        CcuError::InvalidArgument(format!("{} must be one of: {options}", $label))
                    })
            }
        }
    };
}

// The first variant listed is the default.
api_enum!(PurgeAction, "Action", { Remove => "remove", Invalidate => "invalidate" });
api_enum!(PurgeDomain, "Domain", { Production => "production", Staging => "staging" });
api_enum!(ObjectType, "Type", { Arl => "arl", CpCode => "cpcode" });

/// How a batch of paths is treated when some of them fail normalization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Any invalid path rejects the whole batch.
    #[default]
    Strict,
    /// Valid paths are submitted, invalid ones are reported back.
    Lenient,
}

/// Name of a purge queue. Only characters that are safe in a URL path segment
/// are accepted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QueueName(String);

impl QueueName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for QueueName {
    fn default() -> Self {
        QueueName(DEFAULT_QUEUE.into())
    }
}

impl FromStr for QueueName {
    type Err = CcuError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let valid = !value.is_empty()
            && value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(CcuError::InvalidArgument(format!(
                "Queue must be a non-empty name made of letters, digits, '-' or '_', got {value:?}"
            )));
        }
        Ok(QueueName(value.to_string()))
    }
}

impl TryFrom<String> for QueueName {
    type Error = CcuError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<QueueName> for String {
    fn from(queue: QueueName) -> Self {
        queue.0
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Defaults applied to every purge made by a client until changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientSession {
    pub action: PurgeAction,
    pub domain: PurgeDomain,
    pub object_type: ObjectType,
    pub queue: QueueName,
}

/// Body of a purge submission. All four fields are always serialized since the
/// API has no server side defaults we want to rely on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PurgeRequest {
    pub objects: Vec<String>,
    pub action: PurgeAction,
    pub domain: PurgeDomain,
    #[serde(rename = "type")]
    pub object_type: ObjectType,
}

/// Returned by the API when a purge submission is accepted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeResponse {
    pub purge_id: String,
    #[serde(default)]
    pub support_id: Option<String>,
    pub http_status: u16,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub estimated_seconds: Option<u64>,
    #[serde(default)]
    pub ping_after_seconds: Option<u64>,
    #[serde(default)]
    pub progress_uri: Option<String>,
}

/// Returned by the API when checking on a previously submitted purge. Depending
/// on the query the state is reported in `purgeStatus` or in `detail`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeStatusResponse {
    pub purge_id: String,
    #[serde(default)]
    pub support_id: Option<String>,
    pub http_status: u16,
    #[serde(default)]
    pub purge_status: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub original_estimated_seconds: Option<u64>,
    #[serde(default)]
    pub original_queue_length: Option<u64>,
    #[serde(default)]
    pub ping_after_seconds: Option<u64>,
    #[serde(default)]
    pub submitted_by: Option<String>,
    #[serde(default)]
    pub submission_time: Option<String>,
    #[serde(default)]
    pub completion_time: Option<String>,
}

impl PurgeStatusResponse {
    pub fn description(&self) -> Option<&str> {
        self.purge_status.as_deref().or(self.detail.as_deref())
    }

    pub fn is_complete(&self) -> bool {
        self.description() == Some(PURGE_DONE)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub queue_length: u64,
    #[serde(default)]
    pub detail: Option<String>,
}

/// Human readable summary of a queue backlog.
pub fn queue_length_report(length: u64) -> String {
    match length {
        0 => "Purging queue is empty.".to_string(),
        1 => "1 item in the queue".to_string(),
        n => format!("{n} items in the queue"),
    }
}
