//! Bundle sharing.
//!
//! Payloads are opaque bytes, Brotli-compressed before storage under one of
//! two policies:
//!
//! - **Ephemeral**: random URL-safe token, volatile store, fixed TTL.
//! - **Public**: `PUB_`-prefixed uid, durable store, kept forever.

use std::sync::Arc;
use std::time::Duration;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use bytes::Bytes;
use rand::Rng;
use rand::distributions::Alphanumeric;
use tracing::info;

use crate::codec::Codec;
use crate::digest::KeyScheme;
use crate::store::{DurableStore, VolatileStore};
use crate::Error;

/// Lifetime of an ephemeral share.
pub const DEFAULT_SHARE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Prefix of every public share uid.
pub const PUBLIC_UID_PREFIX: &str = "PUB_";

const TOKEN_BYTES: usize = 6;
const PUBLIC_UID_SUFFIX_LEN: usize = 10;

/// Which policy a share was stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareKind {
    Ephemeral,
    Public,
}

/// Retrieval handle returned when a share is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareHandle {
    pub kind: ShareKind,
    pub id: String,
}

impl ShareHandle {
    /// Service-relative retrieval path.
    pub fn path(&self) -> String {
        match self.kind {
            ShareKind::Ephemeral => format!("/s/{}", self.id),
            ShareKind::Public => format!("/p/{}", self.id),
        }
    }

    pub fn url(&self, base_url: &str) -> String {
        format!("{}{}", base_url.trim_end_matches('/'), self.path())
    }
}

/// Fresh ephemeral token: 6 random bytes, URL-safe base64 without padding.
pub fn generate_token() -> String {
    let bytes: [u8; TOKEN_BYTES] = rand::thread_rng().r#gen();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Fresh public uid: `PUB_` and 10 random alphanumerics.
pub fn generate_public_uid() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PUBLIC_UID_SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!("{PUBLIC_UID_PREFIX}{suffix}")
}

/// Stores and retrieves shared bundles.
pub struct ShareManager {
    volatile: Arc<dyn VolatileStore>,
    durable: Arc<dyn DurableStore>,
    codec: Codec,
    keys: KeyScheme,
    ttl: Duration,
}

impl ShareManager {
    pub fn new(volatile: Arc<dyn VolatileStore>, durable: Arc<dyn DurableStore>, keys: KeyScheme) -> Self {
        Self { volatile, durable, codec: Codec::default(), keys, ttl: DEFAULT_SHARE_TTL }
    }

    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub async fn create_ephemeral(&self, payload: &[u8]) -> Result<ShareHandle, Error> {
        let token = generate_token();
        let key = self.keys.share_key(&token);
        let blob = self.codec.compress(payload)?;
        let stored = blob.len();

        self.volatile.set(&key, Bytes::from(blob), self.ttl).await.map_err(storage_unavailable)?;

        info!(%key, bytes = payload.len(), stored, ttl_secs = self.ttl.as_secs(), "ephemeral share created");
        Ok(ShareHandle { kind: ShareKind::Ephemeral, id: token })
    }

    /// Read an ephemeral share. Expired and unknown tokens are both
    /// [`Error::NotFound`]; backend failures are never reported as a miss.
    pub async fn read_ephemeral(&self, token: &str) -> Result<Vec<u8>, Error> {
        if token.is_empty() {
            return Err(Error::NotFound("share".into()));
        }

        let key = self.keys.share_key(token);
        let blob = self
            .volatile
            .get(&key)
            .await
            .map_err(storage_unavailable)?
            .ok_or_else(|| Error::NotFound(key.clone()))?;

        self.codec.decompress(&blob)
    }

    /// Create a public share. A uid collision is reported, never retried.
    pub async fn create_public(&self, payload: &[u8]) -> Result<ShareHandle, Error> {
        let uid = generate_public_uid();
        let blob = self.codec.compress(payload)?;
        let share = self.durable.insert_share(&uid, &blob).await?;

        info!(uid = %share.uid, bytes = payload.len(), stored = blob.len(), "public share created");
        Ok(ShareHandle { kind: ShareKind::Public, id: share.uid })
    }

    pub async fn read_public(&self, uid: &str) -> Result<Vec<u8>, Error> {
        let share = self
            .durable
            .find_share(uid)
            .await?
            .ok_or_else(|| Error::NotFound(uid.to_string()))?;

        self.codec.decompress(&share.blob)
    }
}

fn storage_unavailable(err: Error) -> Error {
    if err.is_storage() && !matches!(err, Error::StorageUnavailable(_)) {
        return Error::StorageUnavailable(err.to_string());
    }
    err
}
