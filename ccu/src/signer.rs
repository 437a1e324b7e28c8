use serde::Deserialize;
use std::fmt;

use crate::error::Result;

/// API client credentials issued for the CCU API.
#[derive(Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    #[serde(default)]
    pub client_token: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub access_token: String,
}

impl Credentials {
    pub fn new<C, S, A>(client_token: C, client_secret: S, access_token: A) -> Self
    where
        C: Into<String>,
        S: Into<String>,
        A: Into<String>,
    {
        Credentials {
            client_token: client_token.into(),
            client_secret: client_secret.into(),
            access_token: access_token.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.client_token.is_empty()
            && !self.client_secret.is_empty()
            && !self.access_token.is_empty()
    }
}

// Never print the secret.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_token", &self.client_token)
            .field("client_secret", &"<redacted>")
            .field("access_token", &self.access_token)
            .finish()
    }
}

/// Attaches authentication to an outgoing request. The EdgeGrid scheme signs
/// the method, URL, a subset of headers and a hash of the body, so signing
/// has to happen on the fully built request right before it is sent.
pub trait Signer: Send + Sync {
    fn sign(&self, request: &mut reqwest::Request, credentials: &Credentials) -> Result<()>;
}

/// Leaves requests unsigned. Meant for mock endpoints in development mode, or
/// for deployments where a signing proxy sits between us and the API.
pub struct NoopSigner;

impl Signer for NoopSigner {
    fn sign(&self, _request: &mut reqwest::Request, _credentials: &Credentials) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secret() {
        let credentials = Credentials::new("ct", "very-secret", "at");
        let printed = format!("{credentials:?}");
        assert!(printed.contains("ct"));
        assert!(!printed.contains("very-secret"));
    }

    #[test]
    fn test_is_complete() {
        assert!(Credentials::new("a", "b", "c").is_complete());
        assert!(!Credentials::new("a", "", "c").is_complete());
        assert!(!Credentials::default().is_complete());
    }
}
