//! Client for the keyward daemon.
//!
//! Every request carries a fresh `X-Request-ID`. Operations that report
//! progress go through [`DaemonClient::do_with_progress`], which opens the
//! daemon's shared event stream, keeps only the events tagged with that
//! request's ID, and hands them to a callback while the request runs.

pub mod error;
pub mod stream;

pub use error::{ClientError, ClientResult};
pub use stream::EventStream;

use keyward_protocol::api::{ErrorBody, GenerateKeypairsRequest, GeneratedKeypairs, VersionInfo};
use keyward_protocol::{
    CorrelationId, EVENT_STREAM_CONTENT_TYPE, Event, KEYPAIRS_GENERATE_PATH, OBSERVE_PATH,
    REQUEST_ID_HEADER, VERSION_PATH,
};
use reqwest::header::ACCEPT;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tokio_util::task::AbortOnDropHandle;

pub const DEFAULT_DAEMON_URL: &str = "http://127.0.0.1:7781";

/// Environment variable overriding [`DEFAULT_DAEMON_URL`].
pub const DAEMON_URL_ENV: &str = "KEYWARD_DAEMON_URL";

/// Daemon base URL from `$KEYWARD_DAEMON_URL`, else the loopback default.
pub fn default_daemon_url() -> String {
    std::env::var(DAEMON_URL_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DAEMON_URL.to_string())
}

#[derive(Debug, Clone)]
pub struct DaemonClient {
    http: reqwest::Client,
    base_url: String,
}

impl DaemonClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a request for `path`, tagged with a freshly minted request ID.
    pub fn new_request(&self, method: Method, path: &str) -> (RequestBuilder, CorrelationId) {
        let id = CorrelationId::new();
        let builder = self
            .http
            .request(method, format!("{}{path}", self.base_url))
            .header(REQUEST_ID_HEADER, id.as_str());
        (builder, id)
    }

    pub async fn version(&self) -> ClientResult<VersionInfo> {
        let (req, _) = self.new_request(Method::GET, VERSION_PATH);
        self.send_json(req).await
    }

    /// Generate the org's keypairs, reporting the daemon's progress to `on_progress`.
    pub async fn generate_keypairs<F>(
        &self,
        org_id: &str,
        on_progress: F,
    ) -> ClientResult<GeneratedKeypairs>
    where
        F: FnMut(Result<Event, ClientError>) + Send + 'static,
    {
        let (req, id) = self.new_request(Method::POST, KEYPAIRS_GENERATE_PATH);
        let req = req.json(&GenerateKeypairsRequest {
            org_id: org_id.to_string(),
        });
        self.do_with_progress(req, id, on_progress).await
    }

    /// Open the daemon's shared progress stream, unfiltered.
    ///
    /// Resolves once the daemon has accepted the subscription, so events
    /// produced after this returns are not missed.
    pub async fn subscribe(&self) -> ClientResult<EventStream> {
        let (req, _) = self.new_request(Method::GET, OBSERVE_PATH);
        let response = self
            .send(req.header(ACCEPT, EVENT_STREAM_CONTENT_TYPE))
            .await?;
        Ok(EventStream::new(response))
    }

    /// Send `req` (tagged `id` by [`new_request`](Self::new_request)) and
    /// decode its JSON response, forwarding progress events for `id` to
    /// `on_progress` while it runs.
    ///
    /// Events belonging to other requests are skipped. A stream failure is
    /// forwarded once and stops the reader without affecting `req`. The
    /// reader is torn down as soon as the response arrives.
    pub async fn do_with_progress<T, F>(
        &self,
        req: RequestBuilder,
        id: CorrelationId,
        on_progress: F,
    ) -> ClientResult<T>
    where
        T: DeserializeOwned,
        F: FnMut(Result<Event, ClientError>) + Send + 'static,
    {
        let events = self.subscribe().await?;
        let reader = AbortOnDropHandle::new(tokio::spawn(stream::forward_progress(
            events,
            id,
            on_progress,
        )));
        let result = self.send_json(req).await;
        drop(reader);
        result
    }

    async fn send(&self, req: RequestBuilder) -> ClientResult<Response> {
        let response = req.send().await.map_err(|source| ClientError::Connection {
            url: self.base_url.clone(),
            source,
        })?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or(text);
        Err(ClientError::Http {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> ClientResult<T> {
        self.send(req)
            .await?
            .json()
            .await
            .map_err(ClientError::Response)
    }
}
