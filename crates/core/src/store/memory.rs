//! In-process volatile store backed by moka.
//!
//! Each entry carries its own TTL through a moka [`Expiry`] policy. Entries
//! are only visible to the process that wrote them.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use moka::Expiry;
use moka::future::Cache as MokaCache;
use tracing::debug;

use super::VolatileStore;
use crate::Error;

/// Longest lifetime an entry is given; larger TTLs are clamped.
const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

#[derive(Clone)]
struct Entry {
    data: Bytes,
    ttl: Duration,
    expires_at: Instant,
}

impl Entry {
    fn remaining(&self) -> Option<Duration> {
        let remaining = self.expires_at.saturating_duration_since(Instant::now());
        (!remaining.is_zero()).then_some(remaining)
    }
}

struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, value: &Entry, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self, _key: &String, value: &Entry, _updated_at: Instant, _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Moka-backed [`VolatileStore`].
#[derive(Clone)]
pub struct MemoryStore {
    cache: MokaCache<String, Entry>,
}

impl MemoryStore {
    /// Create a store holding at most `max_entries` live entries.
    pub fn new(max_entries: u64) -> Self {
        let cache = MokaCache::builder()
            .max_capacity(max_entries)
            .expire_after(PerEntryTtl)
            .build();

        debug!(max_entries, "memory store created");

        Self { cache }
    }

    async fn live(&self, key: &str) -> Option<Entry> {
        let entry = self.cache.get(key).await?;
        if entry.remaining().is_none() {
            self.cache.invalidate(key).await;
            return None;
        }
        Some(entry)
    }
}

#[async_trait]
impl VolatileStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, Error> {
        Ok(self.live(key).await.map(|entry| entry.data))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), Error> {
        let ttl = ttl.min(MAX_TTL);
        let entry = Entry { data: value, ttl, expires_at: Instant::now() + ttl };
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, Error> {
        Ok(self.live(key).await.and_then(|entry| entry.remaining()))
    }

    async fn sweep(&self) -> Result<u64, Error> {
        let before = self.cache.entry_count();
        self.cache.run_pending_tasks().await;
        Ok(before.saturating_sub(self.cache.entry_count()))
    }
}
