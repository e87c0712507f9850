use axum::extract::{FromRef, State};
use axum::routing::{get, post};
use axum::{Json, Router, middleware};
use keyward_observer::{Hub, RequestContext, endpoint::observe};
use keyward_protocol::api::{GenerateKeypairsRequest, GeneratedKeypairs, VersionInfo};
use keyward_protocol::{KEYPAIRS_GENERATE_PATH, OBSERVE_PATH, VERSION_PATH};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::ApiError;
use crate::keypairs;
use crate::middleware::bind_request_context;

#[derive(Clone)]
pub struct AppState {
    hub: Hub,
}

impl AppState {
    pub fn new(hub: Hub) -> Self {
        Self { hub }
    }
}

impl FromRef<AppState> for Hub {
    fn from_ref(state: &AppState) -> Hub {
        state.hub.clone()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(OBSERVE_PATH, get(observe))
        .route(VERSION_PATH, get(version))
        .route(KEYPAIRS_GENERATE_PATH, post(generate_keypairs))
        .layer(middleware::from_fn(bind_request_context))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn version() -> Json<VersionInfo> {
    Json(VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn generate_keypairs(
    State(hub): State<Hub>,
    ctx: RequestContext,
    Json(req): Json<GenerateKeypairsRequest>,
) -> Result<Json<GeneratedKeypairs>, ApiError> {
    let org_id = req.org_id.trim().to_string();
    if org_id.is_empty() {
        return Err(ApiError::bad_request("org_id must not be empty"));
    }
    let root = hub.notifier(&ctx, keypairs::ROOT_BUDGET)?;
    info!(org_id, "generating keypairs");

    let generated = tokio::task::spawn_blocking(move || keypairs::generate(&root, &org_id))
        .await
        .map_err(|err| ApiError::internal(err.into()))?
        .map_err(ApiError::internal)?;
    Ok(Json(generated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use keyward_observer::HubConfig;
    use keyward_protocol::api::ErrorBody;
    use keyward_protocol::{CorrelationId, REQUEST_ID_HEADER};
    use std::time::Duration;
    use tower::ServiceExt;

    fn started_hub() -> Hub {
        let hub = Hub::new(HubConfig::default());
        hub.start().unwrap();
        hub
    }

    fn generate_request(request_id: Option<&CorrelationId>, org_id: &str) -> Request<Body> {
        let mut builder = Request::post(KEYPAIRS_GENERATE_PATH)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(id) = request_id {
            builder = builder.header(REQUEST_ID_HEADER, id.as_str());
        }
        let body = serde_json::to_vec(&GenerateKeypairsRequest {
            org_id: org_id.to_string(),
        })
        .unwrap();
        builder.body(Body::from(body)).unwrap()
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn version_reports_package_version() {
        let hub = started_hub();
        let response = router(AppState::new(hub.clone()))
            .oneshot(Request::get(VERSION_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let info: VersionInfo = body_json(response).await;
        assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
        hub.stop();
    }

    #[tokio::test]
    async fn generate_streams_correlated_progress() {
        let hub = started_hub();
        let mut sub = hub.attach().unwrap();
        let id = CorrelationId::new();

        let response = router(AppState::new(hub.clone()))
            .oneshot(generate_request(Some(&id), "acme"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[REQUEST_ID_HEADER], id.as_str());

        let generated: GeneratedKeypairs = body_json(response).await;
        assert_eq!(generated.org_id, "acme");
        assert_eq!(generated.keypairs.len(), 2);

        let mut last = None;
        for _ in 0..6 {
            let event = tokio::time::timeout(Duration::from_secs(2), sub.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(event.id, id);
            last = Some(event);
        }
        let last = last.unwrap();
        assert_eq!(last.completed, last.total);
        hub.stop();
    }

    #[tokio::test]
    async fn generate_without_request_id_is_rejected() {
        let hub = started_hub();
        let mut sub = hub.attach().unwrap();

        let response = router(AppState::new(hub.clone()))
            .oneshot(generate_request(None, "acme"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!response.headers().contains_key(REQUEST_ID_HEADER));
        let body: ErrorBody = body_json(response).await;
        assert!(body.error.contains("invalid context"));

        let nothing = tokio::time::timeout(Duration::from_millis(100), sub.recv()).await;
        assert!(nothing.is_err(), "no progress without a request id");
        hub.stop();
    }

    #[tokio::test]
    async fn generate_rejects_blank_org() {
        let hub = started_hub();
        let response = router(AppState::new(hub.clone()))
            .oneshot(generate_request(Some(&CorrelationId::new()), "   "))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = body_json(response).await;
        assert_eq!(body.error, "org_id must not be empty");
        hub.stop();
    }

    #[tokio::test]
    async fn observe_is_routed() {
        let hub = started_hub();
        let response = router(AppState::new(hub.clone()))
            .oneshot(Request::get(OBSERVE_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(hub.subscriber_count(), 1);
        drop(response);
        assert_eq!(hub.subscriber_count(), 0);
        hub.stop();
    }
}
