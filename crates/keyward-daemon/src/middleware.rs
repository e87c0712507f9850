use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use keyward_observer::RequestContext;
use keyward_protocol::REQUEST_ID_HEADER;
use tracing::Instrument;

/// Bind the client's `X-Request-ID` into a [`RequestContext`] for handlers.
///
/// The context's cancellation token fires when the handler future finishes or
/// is dropped (client gone), which makes any in-flight progress from that
/// request drop instead of queueing.
pub async fn bind_request_context(mut req: Request, next: Next) -> Response {
    let ctx = RequestContext::from_headers(req.headers());
    let request_id = ctx.request_id().cloned();
    let span = tracing::info_span!(
        "request",
        request_id = request_id.as_ref().map(|id| id.as_str()).unwrap_or("-"),
    );
    let _cancel_on_drop = ctx.cancellation().clone().drop_guard();
    req.extensions_mut().insert(ctx);

    let mut response = next.run(req).instrument(span).await;

    if let Some(value) = request_id.and_then(|id| HeaderValue::from_str(id.as_str()).ok()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
