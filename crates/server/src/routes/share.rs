//! Bundle sharing handlers.
//!
//! Create endpoints take the raw request body as the payload and answer with
//! an absolute retrieval URL. Reads return the shared bytes as a JSON
//! download.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::Serialize;

use crate::error::ApiError;
use crate::handler::AppState;

const BUNDLE_CONTENT_TYPE: &str = "application/json";
const BUNDLE_DISPOSITION: &str = "attachment; filename=\"kumi-bundle.json\"";

/// Response for share creation.
#[derive(Debug, Clone, Serialize)]
pub struct ShareResponse {
    pub url: String,
}

fn bundle(payload: Vec<u8>) -> Response {
    let headers = [(header::CONTENT_TYPE, BUNDLE_CONTENT_TYPE), (header::CONTENT_DISPOSITION, BUNDLE_DISPOSITION)];
    (headers, payload).into_response()
}

pub async fn create_ephemeral(
    State(state): State<AppState>, headers: HeaderMap, body: Bytes,
) -> Result<Json<ShareResponse>, ApiError> {
    let handle = state.shares.create_ephemeral(&body).await?;
    Ok(Json(ShareResponse { url: handle.url(&state.base_url(&headers)) }))
}

pub async fn read_ephemeral(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response, ApiError> {
    let payload = state.shares.read_ephemeral(&id).await?;
    Ok(bundle(payload))
}

pub async fn create_public(
    State(state): State<AppState>, headers: HeaderMap, body: Bytes,
) -> Result<Json<ShareResponse>, ApiError> {
    let handle = state.shares.create_public(&body).await?;
    Ok(Json(ShareResponse { url: handle.url(&state.base_url(&headers)) }))
}

pub async fn read_public(State(state): State<AppState>, Path(uid): Path<String>) -> Result<Response, ApiError> {
    let payload = state.shares.read_public(&uid).await?;
    Ok(bundle(payload))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::http::{StatusCode, header};
    use bytes::Bytes;
    use kumi_core::{MemoryStore, VolatileStore};

    use crate::handler::testing::{DownStore, app, app_with, body_bytes, body_json, get, path_of, post, send};

    #[tokio::test]
    async fn test_ephemeral_round_trip() {
        let (app, _) = app().await;

        let response = send(&app, post("/share/ephemeral", r#"{"a":1}"#)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let url = body_json(response).await["url"].as_str().unwrap().to_string();
        assert!(url.starts_with("http://kumi.test/s/"));

        let response = send(&app, get(path_of(&url))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(response.headers()[header::CONTENT_DISPOSITION], "attachment; filename=\"kumi-bundle.json\"");
        assert_eq!(body_bytes(response).await.as_ref(), br#"{"a":1}"#);
    }

    #[tokio::test]
    async fn test_public_round_trip() {
        let (app, _) = app().await;
        let payload = r#"{"v":1,"format":"grid2d@1","schema_src":"schema { a }"}"#;

        let url = body_json(send(&app, post("/share/public", payload)).await).await["url"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(url.starts_with("http://kumi.test/p/PUB_"));

        let response = send(&app, get(path_of(&url))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await.as_ref(), payload.as_bytes());
    }

    #[tokio::test]
    async fn test_unknown_shares_are_404() {
        let (app, _) = app().await;

        let response = send(&app, get("/p/PUB_nonexistent")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["errors"][0], "Resource not found");

        let response = send(&app, get("/s/nope")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_empty_payload_is_stored() {
        let (app, _) = app().await;

        for route in ["/share/ephemeral", "/share/public"] {
            let response = send(&app, post(route, "")).await;
            assert_eq!(response.status(), StatusCode::OK);
            let url = body_json(response).await["url"].as_str().unwrap().to_string();

            let response = send(&app, get(path_of(&url))).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert!(body_bytes(response).await.is_empty());
        }
    }

    #[tokio::test]
    async fn test_corrupt_share_is_500() {
        let volatile = Arc::new(MemoryStore::new(10));
        let (app, _) = app_with(volatile.clone()).await;
        volatile
            .set("kumi:share:garbled", Bytes::from_static(b"not a brotli stream"), Duration::from_secs(60))
            .await
            .unwrap();

        let response = send(&app, get("/s/garbled")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["errors"][0], "Internal server error");
    }

    #[tokio::test]
    async fn test_store_down_is_503() {
        let (app, _) = app_with(Arc::new(DownStore)).await;

        let response = send(&app, post("/share/ephemeral", r#"{"a":1}"#)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["errors"][0], "Storage service unavailable");

        let response = send(&app, get("/s/anything")).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_public_shares_survive_volatile_outage() {
        let (app, _) = app_with(Arc::new(DownStore)).await;

        let url = body_json(send(&app, post("/share/public", "{}")).await).await["url"]
            .as_str()
            .unwrap()
            .to_string();
        let response = send(&app, get(path_of(&url))).await;
        assert_eq!(body_bytes(response).await.as_ref(), b"{}");
    }
}
