//! HTTP router and shared request state.
//!
//! This module wires the route handlers in [`crate::routes`] to their paths
//! and carries the managers every handler needs.

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderMap, header};
use axum::routing::{get, post};
use kumi_core::{ArtifactServer, CompileCache, ShareManager};
use tower_http::trace::TraceLayer;

use crate::routes;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub compile: Arc<CompileCache>,
    pub artifacts: Arc<ArtifactServer>,
    pub shares: Arc<ShareManager>,
    /// Overrides the request-derived base URL in returned links.
    pub public_base_url: Option<String>,
}

impl AppState {
    /// Base URL for absolute links: the configured public URL, else
    /// `http://{Host}` from the request.
    pub fn base_url(&self, headers: &HeaderMap) -> String {
        if let Some(base) = &self.public_base_url {
            return base.trim_end_matches('/').to_string();
        }

        let host = headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .filter(|h| !h.is_empty())
            .unwrap_or("localhost");
        format!("http://{host}")
    }
}

/// Build the service router.
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/healthz", get(routes::health::healthz))
        .route("/compile", post(routes::compile::compile))
        .route("/artifacts/{file}", get(routes::artifacts::get_artifact))
        .route("/share/ephemeral", post(routes::share::create_ephemeral))
        .route("/share/public", post(routes::share::create_public))
        .route("/s/{id}", get(routes::share::read_ephemeral))
        .route("/p/{uid}", get(routes::share::read_public))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use bytes::Bytes;
    use kumi_core::compiler::testing::StubCompiler;
    use kumi_core::{Database, Error, KeyScheme, MemoryStore, VolatileStore};
    use tower::ServiceExt;

    use super::*;

    pub const MAX_BODY: usize = 64 * 1024;

    /// Router over in-memory stores and the stub compiler.
    pub async fn app() -> (Router, StubCompiler) {
        let volatile: Arc<dyn VolatileStore> = Arc::new(MemoryStore::new(1_000));
        app_with(volatile).await
    }

    pub async fn app_with(volatile: Arc<dyn VolatileStore>) -> (Router, StubCompiler) {
        let durable = Arc::new(Database::open_in_memory().await.unwrap());
        let compiler = StubCompiler::new();
        let keys = KeyScheme::new("kumi", "1");

        let state = AppState {
            compile: Arc::new(CompileCache::new(volatile.clone(), Arc::new(compiler.clone()), keys.clone())),
            artifacts: Arc::new(ArtifactServer::new(volatile.clone(), keys.clone())),
            shares: Arc::new(ShareManager::new(volatile, durable, keys)),
            public_base_url: None,
        };
        (router(state, MAX_BODY), compiler)
    }

    pub async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    pub async fn body_bytes(response: Response) -> Bytes {
        to_bytes(response.into_body(), usize::MAX).await.unwrap()
    }

    pub async fn body_json(response: Response) -> serde_json::Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    pub fn post(uri: &str, body: impl Into<Body>) -> Request<Body> {
        Request::post(uri)
            .header(header::HOST, "kumi.test")
            .body(body.into())
            .unwrap()
    }

    pub fn get(uri: &str) -> Request<Body> {
        Request::get(uri).header(header::HOST, "kumi.test").body(Body::empty()).unwrap()
    }

    /// Path component of an absolute URL built against `http://kumi.test`.
    pub fn path_of(url: &str) -> &str {
        url.strip_prefix("http://kumi.test").unwrap()
    }

    /// Volatile store whose backend is unreachable.
    pub struct DownStore;

    #[async_trait]
    impl VolatileStore for DownStore {
        async fn get(&self, _key: &str) -> Result<Option<Bytes>, Error> {
            Err(Error::StorageUnavailable("connection refused".into()))
        }
        async fn set(&self, _key: &str, _value: Bytes, _ttl: Duration) -> Result<(), Error> {
            Err(Error::StorageUnavailable("connection refused".into()))
        }
        async fn delete(&self, _key: &str) -> Result<(), Error> {
            Err(Error::StorageUnavailable("connection refused".into()))
        }
        async fn ttl(&self, _key: &str) -> Result<Option<Duration>, Error> {
            Err(Error::StorageUnavailable("connection refused".into()))
        }
        async fn sweep(&self) -> Result<u64, Error> {
            Err(Error::StorageUnavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let (app, _) = app().await;
        let response = send(&app, get("/nope")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_body_limit() {
        let (app, _) = app().await;
        let response = send(&app, post("/share/ephemeral", vec![b'a'; MAX_BODY + 1])).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
