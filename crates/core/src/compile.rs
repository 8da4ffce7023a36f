//! Compile-result cache.
//!
//! ### Flow
//! 1. Blank source is rejected as missing input.
//! 2. The source digest selects a version-scoped result key.
//! 3. A hit is returned without touching the compiler, even when the
//!    artifact entry has separately expired.
//! 4. A miss invokes the compiler. Failures are returned and never cached.
//! 5. Success writes the artifact entry, then the result entry, both with the
//!    same TTL. Write failures are logged and do not fail the request.
//! 6. The artifact hash is always recomputed over the bytes being returned.
//!
//! ### Concurrency
//! With single-flight enabled, concurrent misses on the same key await one
//! compiler invocation. Without it racing misses each compile and overwrite
//! the same deterministic entries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::artifacts::artifact_path;
use crate::compiler::{CompileOutput, Compiler, Diagnostic, Metadata};
use crate::digest::{self, KeyScheme};
use crate::store::VolatileStore;
use crate::Error;

/// Default lifetime of result and artifact entries.
pub const DEFAULT_COMPILE_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

type Outcome = Result<CompiledSchema, Vec<Diagnostic>>;
type Inflight = Mutex<HashMap<String, Arc<OnceCell<Outcome>>>>;

fn lock(inflight: &Inflight) -> MutexGuard<'_, HashMap<String, Arc<OnceCell<Outcome>>>> {
    inflight.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drops a request's in-flight cell from the map when the request finishes
/// or is cancelled, unless a newer cell has replaced it.
struct InflightEntry<'a> {
    inflight: &'a Inflight,
    key: &'a str,
    cell: Arc<OnceCell<Outcome>>,
}

impl Drop for InflightEntry<'_> {
    fn drop(&mut self) {
        let mut map = lock(self.inflight);
        if map.get(self.key).is_some_and(|current| Arc::ptr_eq(current, &self.cell)) {
            map.remove(self.key);
        }
    }
}

/// Successful compile as stored under the result key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CompiledSchema {
    ok: bool,
    schema_digest: String,
    js_src: String,
    #[serde(default)]
    metadata: Metadata,
}

impl From<CompileOutput> for CompiledSchema {
    fn from(output: CompileOutput) -> Self {
        Self { ok: true, schema_digest: output.schema_digest, js_src: output.artifact, metadata: output.metadata }
    }
}

/// Result of a successful [`CompileCache::compile`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledArtifact {
    pub schema_digest: String,
    /// Path of the artifact relative to the service root.
    pub artifact_path: String,
    /// SHA-256 of `artifact`.
    pub artifact_hash: String,
    pub artifact: String,
    pub metadata: Metadata,
    /// Whether the result came from the cache.
    pub cached: bool,
}

impl CompiledArtifact {
    fn new(schema: CompiledSchema, cached: bool) -> Self {
        Self {
            artifact_path: artifact_path(&schema.schema_digest),
            artifact_hash: digest::artifact_hash(schema.js_src.as_bytes()),
            schema_digest: schema.schema_digest,
            artifact: schema.js_src,
            metadata: schema.metadata,
            cached,
        }
    }

    /// Absolute artifact URL under `base_url`.
    pub fn artifact_url(&self, base_url: &str) -> String {
        format!("{}{}", base_url.trim_end_matches('/'), self.artifact_path)
    }
}

/// Content-addressed cache in front of the schema compiler.
pub struct CompileCache {
    store: Arc<dyn VolatileStore>,
    compiler: Arc<dyn Compiler>,
    keys: KeyScheme,
    ttl: Duration,
    inflight: Option<Inflight>,
}

impl CompileCache {
    /// Create a cache with the default TTL and single-flight enabled.
    pub fn new(store: Arc<dyn VolatileStore>, compiler: Arc<dyn Compiler>, keys: KeyScheme) -> Self {
        Self { store, compiler, keys, ttl: DEFAULT_COMPILE_TTL, inflight: Some(Mutex::default()) }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.inflight = enabled.then(Mutex::default);
        self
    }

    pub fn keys(&self) -> &KeyScheme {
        &self.keys
    }

    /// Compile `source`, serving from the cache when possible.
    pub async fn compile(&self, source: &str) -> Result<CompiledArtifact, Error> {
        if source.trim().is_empty() {
            return Err(Error::MissingInput("param is missing or the value is empty: schema_src".into()));
        }

        let source_digest = digest::source_digest(source);
        let key = self.keys.result_key(&source_digest);

        if let Some(schema) = self.lookup(&key).await {
            debug!(%key, schema_digest = %schema.schema_digest, "compile cache hit");
            return Ok(CompiledArtifact::new(schema, true));
        }

        debug!(%key, "compile cache miss");
        let outcome = match &self.inflight {
            Some(inflight) => self.compile_coalesced(inflight, &key, source).await,
            None => self.compile_and_store(&key, source).await,
        };

        outcome.map(|schema| CompiledArtifact::new(schema, false)).map_err(Error::CompileFailed)
    }

    /// Read a cached result. Store errors and unreadable records count as a
    /// miss.
    async fn lookup(&self, key: &str) -> Option<CompiledSchema> {
        let raw = match self.store.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(%key, error = %e, "compile cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_slice::<CompiledSchema>(&raw) {
            Ok(schema) if schema.ok => Some(schema),
            Ok(_) => None,
            Err(e) => {
                warn!(%key, error = %e, "discarding unreadable compile cache entry");
                None
            }
        }
    }

    async fn compile_coalesced(&self, inflight: &Inflight, key: &str, source: &str) -> Outcome {
        let cell = {
            let mut map = lock(inflight);
            let cell = map.entry(key.to_string()).or_default();
            if matches!(cell.get(), Some(Err(_))) {
                *cell = Arc::default();
            }
            cell.clone()
        };
        let entry = InflightEntry { inflight, key, cell };

        entry.cell.get_or_init(|| self.compile_and_store(key, source)).await.clone()
    }

    async fn compile_and_store(&self, key: &str, source: &str) -> Outcome {
        let output = self.compiler.compile(source).await.map_err(|failure| {
            debug!(%key, diagnostics = failure.diagnostics.len(), "compile failed");
            failure.diagnostics
        })?;

        let schema = CompiledSchema::from(output);
        self.store_pair(key, &schema).await;
        Ok(schema)
    }

    /// Write the artifact entry, then the result entry.
    ///
    /// A result entry therefore never exists without its artifact unless the
    /// artifact write itself failed.
    async fn store_pair(&self, result_key: &str, schema: &CompiledSchema) {
        let artifact_key = self.keys.artifact_key(&schema.schema_digest);
        let artifact = Bytes::from(schema.js_src.clone());
        if let Err(e) = self.store.set(&artifact_key, artifact, self.ttl).await {
            warn!(key = %artifact_key, error = %e, "artifact cache write failed");
        }

        let record = match serde_json::to_vec(schema) {
            Ok(record) => record,
            Err(e) => {
                warn!(key = %result_key, error = %e, "compile result serialization failed");
                return;
            }
        };
        if let Err(e) = self.store.set(result_key, Bytes::from(record), self.ttl).await {
            warn!(key = %result_key, error = %e, "compile cache write failed");
        }
    }
}
