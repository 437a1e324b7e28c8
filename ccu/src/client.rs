use http::StatusCode;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::CcuConfig;
use crate::error::{CcuError, PathError, Result};
use crate::metrics_defs::{INVALID_PATHS, PURGE_FAILED, PURGE_SUBMITTED, STATUS_CHECKS, URLS_QUEUED};
use crate::normalizer::{NormalizedUrls, UrlNormalizer, normalize_cp_codes};
use crate::request::{build_purge_request, purge_status_path, queue_path};
use crate::sender::SignedHttpSender;
use crate::signer::Signer;
use crate::status::PurgeStatusStore;
use crate::types::{
    ClientSession, ObjectType, PurgeAction, PurgeDomain, PurgeRequest, PurgeResponse,
    PurgeStatusResponse, QueueName, QueueStatus, ValidationMode,
};
use crate::{counter, histogram};

/// An accepted purge.
#[derive(Debug, Clone, PartialEq)]
pub struct PurgeSubmission {
    pub response: PurgeResponse,
    /// The normalized URLs that were sent.
    pub urls: Vec<String>,
    /// Paths left out of the request. Only ever non-empty in lenient mode.
    pub skipped: Vec<PathError>,
}

/// Client for the CCU purge API.
///
/// Holds the session defaults (action, domain, type and queue) that apply to
/// every purge until changed through the setters. Accepted submissions are
/// recorded in the status store. Status checks are not, callers decide
/// whether a check is worth keeping.
pub struct PurgeClient {
    sender: SignedHttpSender,
    normalizer: UrlNormalizer,
    status_store: Arc<PurgeStatusStore>,
    session: ClientSession,
    validation: ValidationMode,
}

impl PurgeClient {
    pub fn new(
        sender: SignedHttpSender,
        normalizer: UrlNormalizer,
        status_store: Arc<PurgeStatusStore>,
    ) -> Self {
        PurgeClient {
            sender,
            normalizer,
            status_store,
            session: ClientSession::default(),
            validation: ValidationMode::default(),
        }
    }

    /// Wires a client from configuration. The config is expected to be validated.
    pub fn from_config(
        config: &CcuConfig,
        signer: Arc<dyn Signer>,
        status_store: Arc<PurgeStatusStore>,
    ) -> Result<Self> {
        let api_base_url = config
            .api_base_url()
            .map_err(|e| CcuError::InvalidArgument(e.to_string()))?;

        let sender = SignedHttpSender::new(
            &api_base_url,
            config.timeout(),
            signer,
            config.credentials.clone(),
        )?
        .with_request_logging(config.log_requests);
        let normalizer = UrlNormalizer::new(config.base_url.as_str(), config.site_router());

        Ok(PurgeClient::new(sender, normalizer, status_store)
            .with_session(config.session())
            .with_validation(config.validation))
    }

    pub fn with_session(mut self, session: ClientSession) -> Self {
        self.session = session;
        self
    }

    pub fn with_validation(mut self, validation: ValidationMode) -> Self {
        self.validation = validation;
        self
    }

    pub fn session(&self) -> &ClientSession {
        &self.session
    }

    pub fn status_store(&self) -> &PurgeStatusStore {
        &self.status_store
    }

    pub fn set_action(&mut self, value: &str) -> Result<&mut Self> {
        self.session.action = value.parse::<PurgeAction>()?;
        Ok(self)
    }

    pub fn set_domain(&mut self, value: &str) -> Result<&mut Self> {
        self.session.domain = value.parse::<PurgeDomain>()?;
        Ok(self)
    }

    pub fn set_type(&mut self, value: &str) -> Result<&mut Self> {
        self.session.object_type = value.parse::<ObjectType>()?;
        Ok(self)
    }

    pub fn set_queue(&mut self, value: &str) -> Result<&mut Self> {
        self.session.queue = value.parse::<QueueName>()?;
        Ok(self)
    }

    /// Normalizes purge objects for the session's type. ARL paths become site
    /// URLs, CP codes are only checked to be numeric.
    pub fn normalize_urls<I, S>(&self, paths: I) -> NormalizedUrls
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match self.session.object_type {
            ObjectType::Arl => self.normalizer.normalize_many(paths),
            ObjectType::CpCode => normalize_cp_codes(paths),
        }
    }

    pub fn is_managed_url(&self, url: &str) -> bool {
        self.normalizer.is_managed_url(url)
    }

    /// The body that would be sent for these objects with the current session.
    pub fn create_purge_body(&self, objects: &[String]) -> PurgeRequest {
        build_purge_request(objects, &self.session)
    }

    pub async fn purge_url(&self, url: &str) -> Result<PurgeSubmission> {
        self.purge_urls([url]).await
    }

    /// Normalizes the paths, submits them to the session's queue and records
    /// the accepted purge in the status store.
    pub async fn purge_urls<I, S>(&self, paths: I) -> Result<PurgeSubmission>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let normalized = self.normalize_urls(paths);
        for invalid in &normalized.invalid {
            warn!(path = %invalid.path, reason = %invalid.reason, "skipping invalid path");
        }
        counter!(INVALID_PATHS).increment(normalized.invalid.len() as u64);

        let NormalizedUrls { urls, invalid } = normalized.enforce(self.validation)?;

        let body = self.create_purge_body(&urls);
        let response = match self
            .sender
            .post::<_, PurgeResponse>(&queue_path(&self.session), &body)
            .await
        {
            Ok(response) => response.body,
            Err(e) => {
                counter!(PURGE_FAILED).increment(1);
                error!(error = %e, urls = ?urls, "purge request failed");
                return Err(e);
            }
        };

        counter!(PURGE_SUBMITTED).increment(1);
        histogram!(URLS_QUEUED).record(urls.len() as f64);
        info!(
            purge_id = %response.purge_id,
            support_id = ?response.support_id,
            estimated_seconds = ?response.estimated_seconds,
            "purge request accepted for {} URLs",
            urls.len()
        );

        // The purge went through upstream, a failure to record it is only logged.
        if let Err(e) = self.status_store.save(response.clone(), Some(urls.clone())) {
            error!(error = %e, purge_id = %response.purge_id, "could not record purge status");
        }

        Ok(PurgeSubmission {
            response,
            urls,
            skipped: invalid,
        })
    }

    pub async fn get_queue_length(&self) -> Result<u64> {
        match self
            .sender
            .get::<QueueStatus>(&queue_path(&self.session))
            .await
        {
            Ok(response) => Ok(response.body.queue_length),
            Err(e) => {
                error!(error = %e, queue = %self.session.queue, "could not fetch queue length");
                Err(e)
            }
        }
    }

    /// Probes the queue endpoint. Any failure counts as not authorized.
    pub async fn is_authorized(&self) -> bool {
        match self
            .sender
            .get::<QueueStatus>(&queue_path(&self.session))
            .await
        {
            Ok(response) => response.status == StatusCode::OK,
            Err(e) => {
                warn!(error = %e, "CCU credentials check failed");
                false
            }
        }
    }

    /// Fetches the current status of a purge. The result is not recorded.
    pub async fn get_purge_status(&self, purge_id: &str) -> Result<PurgeStatusResponse> {
        let valid = !purge_id.is_empty()
            && purge_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !valid {
            return Err(CcuError::InvalidArgument(format!(
                "invalid purge id {purge_id:?}"
            )));
        }

        counter!(STATUS_CHECKS).increment(1);
        match self
            .sender
            .get::<PurgeStatusResponse>(&purge_status_path(purge_id))
            .await
        {
            Ok(response) => Ok(response.body),
            Err(e) => {
                error!(error = %e, purge_id, "could not fetch purge status");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::{AnyRoute, RoutePatterns};
    use crate::signer::{Credentials, NoopSigner};
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PURGE_ID: &str = "e535071c-26b2-11e7-94d7-276f2f54d938";

    fn client(server_uri: &str) -> PurgeClient {
        let sender = SignedHttpSender::new(
            &format!("{server_uri}/ccu/v2"),
            Duration::from_secs(5),
            Arc::new(NoopSigner),
            Credentials::default(),
        )
        .unwrap();
        let normalizer = UrlNormalizer::new("http://example.com", Arc::new(AnyRoute));
        let store = Arc::new(PurgeStatusStore::new(Arc::new(MemoryStore::new())));
        PurgeClient::new(sender, normalizer, store)
    }

    fn accepted() -> ResponseTemplate {
        ResponseTemplate::new(201).set_body_json(json!({
            "estimatedSeconds": 420,
            "progressUri": format!("/ccu/v2/purges/{PURGE_ID}"),
            "purgeId": PURGE_ID,
            "supportId": "17PY1321286429616716-211907680",
            "httpStatus": 201,
            "detail": "Request accepted.",
            "pingAfterSeconds": 420,
        }))
    }

    #[test]
    fn test_setters() {
        let mut client = client("http://127.0.0.1:9");

        client
            .set_action("invalidate")
            .unwrap()
            .set_domain("staging")
            .unwrap()
            .set_type("cpcode")
            .unwrap()
            .set_queue("test_queue")
            .unwrap();

        assert_eq!(client.session().action, PurgeAction::Invalidate);
        assert_eq!(client.session().domain, PurgeDomain::Staging);
        assert_eq!(client.session().object_type, ObjectType::CpCode);
        assert_eq!(client.session().queue.as_str(), "test_queue");

        let body = client.create_purge_body(&["12345".to_string()]);
        assert_eq!(body.action, PurgeAction::Invalidate);
        assert_eq!(body.object_type, ObjectType::CpCode);
    }

    #[test]
    fn test_setters_reject_unknown_values() {
        let mut client = client("http://127.0.0.1:9");

        for value in ["remove", "invalidate"] {
            client.set_action(value).unwrap();
            assert_eq!(
                client.create_purge_body(&[]).action.as_str(),
                value
            );
        }

        let err = client.set_action("wrong").err().unwrap();
        assert_eq!(err.to_string(), "Action must be one of: remove, invalidate");
        assert_eq!(client.session().action, PurgeAction::Invalidate);

        assert!(client.set_domain("wrong").is_err());
        assert_eq!(client.session().domain, PurgeDomain::Production);
        assert!(client.set_type("wrong").is_err());
        assert_eq!(client.session().object_type, ObjectType::Arl);
        assert!(client.set_queue("bad/queue").is_err());
        assert_eq!(client.session().queue.as_str(), "default");
    }

    #[test]
    fn test_default_purge_body() {
        let client = client("http://127.0.0.1:9");
        let body = client.create_purge_body(&["example.com/node/11".to_string()]);
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "objects": ["example.com/node/11"],
                "action": "remove",
                "domain": "production",
                "type": "arl",
            })
        );
    }

    #[tokio::test]
    async fn test_purge_and_authorize() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/ccu/v2/queues/default"))
            .and(body_json(json!({
                "objects": ["http://example.com/node/11"],
                "action": "remove",
                "domain": "production",
                "type": "arl",
            })))
            .respond_with(accepted())
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/ccu/v2/queues/default"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"queueLength": 3, "detail": "The queue may take a minute to reflect new or removed requests.", "httpStatus": 200})),
            )
            .expect(2)
            .mount(&mock_server)
            .await;

        let client = client(&mock_server.uri());
        let submission = client.purge_url("/node/11").await.unwrap();

        assert_eq!(submission.response.purge_id, PURGE_ID);
        assert_eq!(submission.response.http_status, 201);
        assert_eq!(submission.urls, vec!["http://example.com/node/11"]);
        assert!(submission.skipped.is_empty());

        let history = client.status_store().get(PURGE_ID).unwrap().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(
            history[0].urls_queued,
            Some(vec!["http://example.com/node/11".to_string()])
        );
        assert_eq!(history[0].status.description.as_deref(), Some("Request accepted."));

        assert!(client.is_authorized().await);
        assert_eq!(client.get_queue_length().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_not_authorized() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ccu/v2/queues/default"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "type": "https://problems.purge.akamaiapis.net/-/pep-authn/deny",
                "title": "Not authorized",
                "status": 401,
            })))
            .mount(&mock_server)
            .await;

        let client = client(&mock_server.uri());
        assert!(!client.is_authorized().await);
        assert!(matches!(
            client.get_queue_length().await,
            Err(CcuError::ApiRejected { status, .. }) if status == StatusCode::UNAUTHORIZED
        ));
    }

    #[tokio::test]
    async fn test_authorization_requires_queue_length() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ccu/v2/queues/default"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"detail": "ok"})))
            .mount(&mock_server)
            .await;

        let client = client(&mock_server.uri());
        assert!(!client.is_authorized().await);
    }

    #[tokio::test]
    async fn test_authorization_requires_200() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ccu/v2/queues/default"))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({"queueLength": 0})))
            .mount(&mock_server)
            .await;

        let client = client(&mock_server.uri());
        assert!(!client.is_authorized().await);
    }

    #[tokio::test]
    async fn test_unreachable_is_not_authorized() {
        let client = client("http://127.0.0.1:9");
        assert!(!client.is_authorized().await);
        assert!(matches!(
            client.purge_url("node/1").await,
            Err(CcuError::Unreachable(_))
        ));
        assert!(client.status_store().get_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_purge_is_not_recorded() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "supportId": "17PY1321286429616716-211907680",
                "title": "unauthorized arl",
                "httpStatus": 403,
                "detail": "http://www.example.com/bogus",
                "describedBy": "https://api.ccu.akamai.com/ccu/v2/errors/unauthorized-arl",
            })))
            .mount(&mock_server)
            .await;

        let client = client(&mock_server.uri());
        let err = client.purge_url("bogus").await.unwrap_err();

        match err {
            CcuError::ApiRejected { status, details } => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert!(details.contains(&("title".into(), "unauthorized arl".into())));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(client.status_store().get_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_strict_and_lenient_validation() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/ccu/v2/queues/default"))
            .and(body_json(json!({
                "objects": ["http://example.com/node/1", "http://example.com/node/2"],
                "action": "remove",
                "domain": "production",
                "type": "arl",
            })))
            .respond_with(accepted())
            .expect(1)
            .mount(&mock_server)
            .await;

        let sender = SignedHttpSender::new(
            &format!("{}/ccu/v2", mock_server.uri()),
            Duration::from_secs(5),
            Arc::new(NoopSigner),
            Credentials::default(),
        )
        .unwrap();
        let normalizer =
            UrlNormalizer::new("http://example.com", Arc::new(RoutePatterns::new(["/node/*"])));
        let store = Arc::new(PurgeStatusStore::new(Arc::new(MemoryStore::new())));
        let client = PurgeClient::new(sender, normalizer, store);

        let paths = ["node/1", "user/5", "node/2", "node/1"];

        // Strict: nothing is sent.
        match client.purge_urls(paths).await {
            Err(CcuError::InvalidPaths(errors)) => {
                assert_eq!(errors, vec![PathError::new("user/5", "path does not match a known route")]);
            }
            other => panic!("unexpected result {other:?}"),
        }

        let client = client.with_validation(ValidationMode::Lenient);
        let submission = client.purge_urls(paths).await.unwrap();
        assert_eq!(
            submission.urls,
            vec!["http://example.com/node/1", "http://example.com/node/2"]
        );
        assert_eq!(submission.skipped.len(), 1);
        assert_eq!(submission.skipped[0].path, "user/5");
    }

    #[tokio::test]
    async fn test_batches_accumulate_under_one_purge_id() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/ccu/v2/queues/default"))
            .respond_with(accepted())
            .expect(2)
            .mount(&mock_server)
            .await;

        let client = client(&mock_server.uri());
        client.purge_urls(["node/1"]).await.unwrap();
        client.purge_urls(["node/2", "node/3"]).await.unwrap();

        let history = client.status_store().get(PURGE_ID).unwrap().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].urls_queued.as_ref().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_get_purge_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("/ccu/v2/purges/{PURGE_ID}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "originalEstimatedSeconds": 480,
                "progressUri": format!("/ccu/v2/purges/{PURGE_ID}"),
                "originalQueueLength": 6,
                "purgeId": PURGE_ID,
                "supportId": "17SY1321286536440716-218507680",
                "httpStatus": 200,
                "completionTime": null,
                "submittedBy": "test1",
                "purgeStatus": "In-Progress",
                "submissionTime": "2011-11-14T16:14:56Z",
                "pingAfterSeconds": 60,
            })))
            .mount(&mock_server)
            .await;

        let client = client(&mock_server.uri());
        let status = client.get_purge_status(PURGE_ID).await.unwrap();

        assert_eq!(status.description(), Some("In-Progress"));
        assert_eq!(status.original_queue_length, Some(6));
        assert!(!status.is_complete());

        // Checks are not recorded automatically.
        assert_eq!(client.status_store().get(PURGE_ID).unwrap(), None);
        client.status_store().save(status, None).unwrap();
        assert_eq!(client.status_store().get(PURGE_ID).unwrap().unwrap().len(), 1);

        assert!(matches!(
            client.get_purge_status("../queues/default").await,
            Err(CcuError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_purge_uses_session_queue() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/ccu/v2/queues/emergency"))
            .and(body_json(json!({
                "objects": ["http://example.com/node/11"],
                "action": "invalidate",
                "domain": "staging",
                "type": "arl",
            })))
            .respond_with(accepted())
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut client = client(&mock_server.uri());
        client
            .set_queue("emergency")
            .unwrap()
            .set_action("invalidate")
            .unwrap()
            .set_domain("staging")
            .unwrap();

        client.purge_url("node/11").await.unwrap();
    }

    #[tokio::test]
    async fn test_cp_codes_are_not_qualified() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/ccu/v2/queues/default"))
            .and(body_json(json!({
                "objects": ["12345"],
                "action": "remove",
                "domain": "production",
                "type": "cpcode",
            })))
            .respond_with(accepted())
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut client = client(&mock_server.uri());
        client.set_type("cpcode").unwrap();

        let submission = client.purge_urls([" 12345 "]).await.unwrap();
        assert_eq!(submission.urls, vec!["12345"]);

        assert!(matches!(
            client.purge_url("node/11").await,
            Err(CcuError::InvalidPaths(errors)) if errors[0].reason == "CP code must be numeric"
        ));
    }
}
