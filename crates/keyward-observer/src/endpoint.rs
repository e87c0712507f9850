//! `GET /v1/observe`: one long-lived server-sent-event stream per connection.

use std::convert::Infallible;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, Sse};
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use crate::hub::Hub;

/// Attach the connection to the hub and stream every delivered event.
///
/// The subscriber is attached before the response is returned, and hyper
/// writes the `text/event-stream` headers as soon as it is, so a client sees
/// the stream as connected before the first event exists. Each event becomes
/// one `event:`/`data:` frame written as its own body chunk. When the peer
/// goes away the body is dropped, which drops the subscription and detaches
/// it; when the hub stops, the stream ends.
pub async fn observe(State(hub): State<Hub>) -> Response {
    let mut subscription = match hub.attach() {
        Ok(subscription) => subscription,
        Err(err) => return (StatusCode::SERVICE_UNAVAILABLE, err.to_string()).into_response(),
    };
    let subscriber = subscription.id();

    let stream = async_stream::stream! {
        while let Some(event) = subscription.recv().await {
            if !event.kind.is_framable() {
                warn!(
                    subscriber,
                    request_id = %event.id,
                    kind = ?event.kind,
                    "event name has a line break, skipping"
                );
                continue;
            }
            match event.data_json() {
                Ok(data) => {
                    yield Ok::<_, Infallible>(
                        SseEvent::default().event(event.kind.as_str()).data(data),
                    );
                }
                Err(err) => {
                    warn!(subscriber, request_id = %event.id, "failed to encode event: {err}")
                }
            }
        }
        debug!(subscriber, "progress stream ended");
    };

    Sse::new(stream).into_response()
}
