//! Liveness probe.

/// `GET /healthz`: plain-text `ok`.
pub async fn healthz() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use axum::http::{StatusCode, header};

    use crate::handler::testing::{app, body_bytes, get, send};

    #[tokio::test]
    async fn test_healthz() {
        let (app, _) = app().await;
        let response = send(&app, get("/healthz")).await;

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
        assert!(content_type.starts_with("text/plain"));
        assert_eq!(body_bytes(response).await.as_ref(), b"ok");
    }
}
