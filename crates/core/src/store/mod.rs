//! Storage backends for compile caching and bundle sharing.
//!
//! Two contracts live here:
//!
//! - [`VolatileStore`]: keyed bytes with per-key TTL. Holds compile results,
//!   artifacts and ephemeral shares. Backed either by SQLite (`kv` table with
//!   an expiry column, shared across processes) or by an in-process moka
//!   cache.
//! - [`DurableStore`]: permanent public shares with a unique `uid`, backed by
//!   the SQLite `public_shares` table.
//!
//! Both are injected as trait objects so the managers never reach for a
//! global handle.

pub mod connection;
pub mod kv;
pub mod memory;
pub mod migrations;
pub mod shares;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

pub use crate::Error;

pub use connection::Database;
pub use memory::MemoryStore;
pub use shares::PublicShare;

/// Keyed byte store with per-key expiry.
///
/// Entries past their TTL are never returned, whether or not they have been
/// physically removed yet.
#[async_trait]
pub trait VolatileStore: Send + Sync {
    /// Fetch a live entry.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, Error>;

    /// Insert or overwrite an entry that expires after `ttl`.
    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), Error>;

    /// Remove an entry. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), Error>;

    /// Remaining lifetime of a live entry.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, Error>;

    /// Physically drop expired entries, returning how many were removed when
    /// the backend can tell.
    async fn sweep(&self) -> Result<u64, Error>;

    async fn exists(&self, key: &str) -> Result<bool, Error> {
        Ok(self.ttl(key).await?.is_some())
    }
}

/// Permanent storage for public shares.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Insert a new share. A taken `uid` is a
    /// [`Error::ValidationFailed`] and the existing record is left untouched.
    async fn insert_share(&self, uid: &str, blob: &[u8]) -> Result<PublicShare, Error>;

    async fn find_share(&self, uid: &str) -> Result<Option<PublicShare>, Error>;
}
