use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use keyward_protocol::{CorrelationId, REQUEST_ID_HEADER};
use tokio_util::sync::CancellationToken;

/// Per-request state threaded into progress trees: the correlation ID the
/// client minted (if any) and the request's cancellation signal.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    request_id: Option<CorrelationId>,
    cancel: CancellationToken,
}

impl RequestContext {
    /// A context with no request ID and a fresh cancellation token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from the correlation header, if present and non-empty.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let request_id = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(CorrelationId::from);
        Self {
            request_id,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_request_id(mut self, id: CorrelationId) -> Self {
        self.request_id = Some(id);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn request_id(&self) -> Option<&CorrelationId> {
        self.request_id.as_ref()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Handlers take the context installed by the daemon's request-ID
/// middleware, or read the header directly when mounted without it.
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_else(|| RequestContext::from_headers(&parts.headers)))
    }
}
