//! Read-only artifact lookup by schema digest.
//!
//! Content at a digest never changes for a given compiler version, so
//! responses may be cached by clients and proxies for as long as they like.
//! A miss is final here: nothing is ever compiled on this path.

use std::sync::Arc;

use bytes::Bytes;

use crate::digest::KeyScheme;
use crate::store::VolatileStore;
use crate::Error;

/// `Cache-Control` for artifact responses: one year, immutable.
pub const CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Content type of compiled artifacts.
pub const CONTENT_TYPE: &str = "text/javascript";

/// Service-relative path of the artifact for `schema_digest`.
pub fn artifact_path(schema_digest: &str) -> String {
    format!("/artifacts/{schema_digest}.js")
}

/// A cached artifact ready to be served.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub schema_digest: String,
    pub body: Bytes,
}

impl Artifact {
    pub fn cache_control(&self) -> &'static str {
        CACHE_CONTROL
    }

    pub fn content_type(&self) -> &'static str {
        CONTENT_TYPE
    }
}

/// Serves artifacts written by [`crate::CompileCache`].
pub struct ArtifactServer {
    store: Arc<dyn VolatileStore>,
    keys: KeyScheme,
}

impl ArtifactServer {
    pub fn new(store: Arc<dyn VolatileStore>, keys: KeyScheme) -> Self {
        Self { store, keys }
    }

    pub async fn get_artifact(&self, schema_digest: &str) -> Result<Artifact, Error> {
        if schema_digest.is_empty() {
            return Err(Error::NotFound("artifact".into()));
        }

        let key = self.keys.artifact_key(schema_digest);
        let body = self.store.get(&key).await?.ok_or_else(|| Error::NotFound(key.clone()))?;

        tracing::debug!(%key, bytes = body.len(), "artifact served");
        Ok(Artifact { schema_digest: schema_digest.to_string(), body })
    }
}
