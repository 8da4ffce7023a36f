//! `POST /compile` handler.
//!
//! Compiles a schema through the cache and returns the artifact inline along
//! with its immutable URL.

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use bytes::Bytes;
use kumi_core::Error;
use kumi_core::compiler::Metadata;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::handler::AppState;

/// Request body for `POST /compile`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompileParams {
    /// Schema source text.
    #[serde(default)]
    pub schema_src: Option<String>,
}

/// Successful compile response.
#[derive(Debug, Clone, Serialize)]
pub struct CompileResponse {
    pub ok: bool,
    pub schema_hash: String,
    pub artifact_url: String,
    pub artifact_hash: String,
    pub js_src: String,
    #[serde(skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
    /// Whether the result came from the compile cache.
    pub cached: bool,
}

fn parse_params(body: &[u8]) -> Result<CompileParams, Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(CompileParams::default());
    }
    serde_json::from_slice(body).map_err(|e| Error::MissingInput(format!("invalid JSON body: {e}")))
}

pub async fn compile(
    State(state): State<AppState>, headers: HeaderMap, body: Bytes,
) -> Result<Json<CompileResponse>, ApiError> {
    let params = parse_params(&body)?;
    let compiled = state.compile.compile(params.schema_src.as_deref().unwrap_or_default()).await?;

    let response = CompileResponse {
        ok: true,
        artifact_url: compiled.artifact_url(&state.base_url(&headers)),
        schema_hash: compiled.schema_digest,
        artifact_hash: compiled.artifact_hash,
        js_src: compiled.artifact,
        metadata: compiled.metadata,
        cached: compiled.cached,
    };

    Ok(Json(response))
}
