//! Content-addressed cache key generation.
//!
//! Every compile-derived key carries the compiler version so that bumping it
//! partitions the cache instead of reusing stale entries.

use sha2::{Digest, Sha256};

/// SHA-256 of the raw compiler input, hex encoded.
pub fn source_digest(source: &str) -> String {
    hex::encode(Sha256::digest(source.as_bytes()))
}

/// SHA-256 of the artifact bytes being returned to the client, hex encoded.
pub fn artifact_hash(artifact: &[u8]) -> String {
    hex::encode(Sha256::digest(artifact))
}

/// Key layout for the volatile store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyScheme {
    namespace: String,
    compiler_version: String,
}

impl KeyScheme {
    pub fn new(namespace: impl Into<String>, compiler_version: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), compiler_version: compiler_version.into() }
    }

    pub fn compiler_version(&self) -> &str {
        &self.compiler_version
    }

    /// `{ns}:compile:v{version}:{source_digest}`
    pub fn result_key(&self, source_digest: &str) -> String {
        format!("{}:compile:v{}:{}", self.namespace, self.compiler_version, source_digest)
    }

    /// `{ns}:art:v{version}:{schema_digest}`
    pub fn artifact_key(&self, schema_digest: &str) -> String {
        format!("{}:art:v{}:{}", self.namespace, self.compiler_version, schema_digest)
    }

    /// `{ns}:share:{token}`. Shares outlive compiler upgrades, so no version.
    pub fn share_key(&self, token: &str) -> String {
        format!("{}:share:{}", self.namespace, token)
    }
}
