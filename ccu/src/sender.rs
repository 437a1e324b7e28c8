use http::header::{ACCEPT, HeaderValue};
use http::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{CcuError, Result};
use crate::histogram;
use crate::metrics_defs::REQUEST_DURATION;
use crate::signer::{Credentials, Signer};

/// A decoded 2xx response.
#[derive(Debug)]
pub struct ApiResponse<T> {
    pub status: StatusCode,
    pub body: T,
}

/// Sends signed JSON requests to the CCU API and classifies the outcome into
/// unreachable, rejected or a decoded body.
pub struct SignedHttpSender {
    client: reqwest::Client,
    api_base_url: String,
    signer: Arc<dyn Signer>,
    credentials: Credentials,
    log_requests: bool,
}

impl SignedHttpSender {
    pub fn new(
        api_base_url: &str,
        timeout: Duration,
        signer: Arc<dyn Signer>,
        credentials: Credentials,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CcuError::InvalidArgument(format!("could not build HTTP client: {e}")))?;

        Ok(SignedHttpSender {
            client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            signer,
            credentials,
            log_requests: false,
        })
    }

    /// Log every request and response body at debug level.
    pub fn with_request_logging(mut self, enabled: bool) -> Self {
        self.log_requests = enabled;
        self
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base_url, path.trim_start_matches('/'))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<ApiResponse<T>> {
        self.send::<(), T>(Method::GET, path, None).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<ApiResponse<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(Method::POST, path, Some(body)).await
    }

    pub async fn send<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<ApiResponse<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path);

        let mut builder = self
            .client
            .request(method.clone(), &url)
            .header(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let mut request = builder
            .build()
            .map_err(|e| CcuError::InvalidArgument(format!("could not build request for {url}: {e}")))?;
        self.signer.sign(&mut request, &self.credentials)?;

        if self.log_requests {
            let body = request
                .body()
                .and_then(|b| b.as_bytes())
                .map(String::from_utf8_lossy)
                .unwrap_or_default();
            debug!(%method, %url, %body, "sending CCU request");
        }

        let start = Instant::now();
        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| CcuError::Unreachable(format!("{method} {url}: {e}")))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| CcuError::Unreachable(format!("{method} {url}: {e}")))?;
        histogram!(REQUEST_DURATION).record(start.elapsed().as_secs_f64());

        if self.log_requests {
            debug!(%method, %url, %status, body = %String::from_utf8_lossy(&bytes), "received CCU response");
        }

        if !status.is_success() {
            return Err(CcuError::ApiRejected {
                status,
                details: error_details(status, &bytes),
            });
        }

        let body = serde_json::from_slice(&bytes)
            .map_err(|e| CcuError::InvalidResponse(format!("{method} {url}: {e}")))?;

        Ok(ApiResponse { status, body })
    }
}

/// Flattens a JSON error body into key/value pairs. Nested keys are joined with
/// a dot. A body that is not a JSON object is reported as a single message.
fn error_details(status: StatusCode, body: &[u8]) -> Vec<(String, String)> {
    match serde_json::from_slice::<Value>(body) {
        Ok(value @ Value::Object(_)) => {
            let mut details = Vec::new();
            flatten_into(&mut details, None, &value);
            details
        }
        _ => {
            let text = String::from_utf8_lossy(body).trim().to_string();
            let message = if text.is_empty() {
                status.canonical_reason().unwrap_or("no response body").to_string()
            } else {
                text
            };
            vec![("message".to_string(), message)]
        }
    }
}

fn flatten_into(details: &mut Vec<(String, String)>, prefix: Option<&str>, value: &Value) {
    match value {
        Value::Object(map) => {
            for (key, value) in map {
                let key = match prefix {
                    Some(prefix) => format!("{prefix}.{key}"),
                    None => key.clone(),
                };
                flatten_into(details, Some(&key), value);
            }
        }
        Value::String(s) => details.push((prefix.unwrap_or_default().to_string(), s.clone())),
        other => details.push((prefix.unwrap_or_default().to_string(), other.to_string())),
    }
}
