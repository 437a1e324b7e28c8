use http::StatusCode;
use std::fmt;
use thiserror::Error;

use crate::store::StoreError;

/// Result type alias for CCU client operations
pub type Result<T, E = CcuError> = std::result::Result<T, E>;

/// A user supplied path that could not be turned into a purgeable URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathError {
    pub path: String,
    pub reason: String,
}

impl PathError {
    pub fn new<P, R>(path: P, reason: R) -> Self
    where
        P: Into<String>,
        R: Into<String>,
    {
        PathError {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

/// Errors that can occur while talking to the Content Control Utility
#[derive(Error, Debug)]
pub enum CcuError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("invalid paths: {}", join_paths(.0))]
    InvalidPaths(Vec<PathError>),

    #[error("CCU API unreachable: {0}")]
    Unreachable(String),

    #[error("CCU API rejected the request with {status}: {}", join_details(.details))]
    ApiRejected {
        status: StatusCode,
        details: Vec<(String, String)>,
    },

    #[error("invalid response from CCU API: {0}")]
    InvalidResponse(String),

    #[error("could not sign request: {0}")]
    Signing(String),

    #[error("status store error: {0}")]
    Store(#[from] StoreError),
}

impl CcuError {
    /// Network and upstream failures are expected and never abort the caller.
    pub fn is_upstream_failure(&self) -> bool {
        matches!(
            self,
            CcuError::Unreachable(_) | CcuError::ApiRejected { .. } | CcuError::InvalidResponse(_)
        )
    }
}

fn join_paths(errors: &[PathError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_details(details: &[(String, String)]) -> String {
    details
        .iter()
        .map(|(key, value)| format!("{key}: {value}"))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_rejected_message() {
        let err = CcuError::ApiRejected {
            status: StatusCode::FORBIDDEN,
            details: vec![
                ("title".into(), "unauthorized arl".into()),
                ("httpStatus".into(), "403".into()),
            ],
        };
        assert_eq!(
            err.to_string(),
            "CCU API rejected the request with 403 Forbidden: title: unauthorized arl; httpStatus: 403"
        );
        assert!(err.is_upstream_failure());
    }

    #[test]
    fn test_invalid_paths_message() {
        let err = CcuError::InvalidPaths(vec![
            PathError::new("nope", "unknown route"),
            PathError::new("", "empty path"),
        ]);
        assert_eq!(err.to_string(), "invalid paths: nope: unknown route, : empty path");
        assert!(!err.is_upstream_failure());
    }
}
