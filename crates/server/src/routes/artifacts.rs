//! `GET /artifacts/{schema_digest}.js` handler.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use kumi_core::Error;

use crate::error::ApiError;
use crate::handler::AppState;

pub async fn get_artifact(State(state): State<AppState>, Path(file): Path<String>) -> Result<Response, ApiError> {
    let schema_digest = file.strip_suffix(".js").ok_or_else(|| Error::NotFound(file.clone()))?;
    let artifact = state.artifacts.get_artifact(schema_digest).await?;

    let headers = [
        (header::CONTENT_TYPE, artifact.content_type()),
        (header::CACHE_CONTROL, artifact.cache_control()),
        (header::CONTENT_DISPOSITION, "inline"),
    ];
    Ok((headers, artifact.body).into_response())
}
