//! SQLite-backed volatile store.
//!
//! Entries carry an absolute expiry in unix milliseconds. Reads filter on it,
//! so an expired row is invisible even before [`Database::purge_expired_kv`]
//! removes it.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tokio_rusqlite::params;

use super::VolatileStore;
use super::connection::Database;
use crate::Error;

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

impl Database {
    /// Get a live entry by key.
    ///
    /// Returns None if the key doesn't exist or has expired.
    pub async fn get_kv(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        let key = key.to_string();
        let now = now_ms();
        self.conn
            .call(move |conn| -> Result<Option<Vec<u8>>, Error> {
                let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1 AND expires_at_ms > ?2")?;

                let result = stmt.query_row(params![key, now], |row| row.get(0));

                match result {
                    Ok(value) => Ok(Some(value)),
                    Err(tokio_rusqlite::rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or replace an entry.
    ///
    /// Uses UPSERT semantics: the value and expiry of an existing key are
    /// overwritten.
    pub async fn put_kv(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), Error> {
        let key = key.to_string();
        let value = value.to_vec();
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at_ms = now_ms().saturating_add(ttl_ms);
        let updated_at = Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO kv (key, value, expires_at_ms, updated_at)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(key) DO UPDATE SET
                        value = excluded.value,
                        expires_at_ms = excluded.expires_at_ms,
                        updated_at = excluded.updated_at",
                    params![key, value, expires_at_ms, updated_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    pub async fn delete_kv(&self, key: &str) -> Result<(), Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Remaining lifetime of a live entry.
    pub async fn kv_ttl(&self, key: &str) -> Result<Option<Duration>, Error> {
        let key = key.to_string();
        let now = now_ms();
        self.conn
            .call(move |conn| -> Result<Option<Duration>, Error> {
                let result = conn.query_row(
                    "SELECT expires_at_ms FROM kv WHERE key = ?1 AND expires_at_ms > ?2",
                    params![key, now],
                    |row| row.get::<_, i64>(0),
                );

                match result {
                    Ok(expires_at_ms) => {
                        let remaining = u64::try_from(expires_at_ms - now).unwrap_or(0);
                        Ok(Some(Duration::from_millis(remaining)))
                    }
                    Err(tokio_rusqlite::rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Delete expired entries.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_expired_kv(&self) -> Result<u64, Error> {
        let now = now_ms();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM kv WHERE expires_at_ms <= ?1", params![now])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[async_trait]
impl VolatileStore for Database {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, Error> {
        Ok(self.get_kv(key).await?.map(Bytes::from))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), Error> {
        self.put_kv(key, &value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        self.delete_kv(key).await
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, Error> {
        self.kv_ttl(key).await
    }

    async fn sweep(&self) -> Result<u64, Error> {
        self.purge_expired_kv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    #[tokio::test]
    async fn test_put_and_get_kv() {
        let db = Database::open_in_memory().await.unwrap();
        db.put_kv("kumi:art:v1:abc", b"export class Schema {}", DAY).await.unwrap();

        let value = db.get_kv("kumi:art:v1:abc").await.unwrap().unwrap();
        assert_eq!(value, b"export class Schema {}");
    }

    #[tokio::test]
    async fn test_get_missing_kv() {
        let db = Database::open_in_memory().await.unwrap();
        assert!(db.get_kv("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_kv_expiry() {
        let db = Database::open_in_memory().await.unwrap();
        db.put_kv("short", b"x", Duration::from_millis(50)).await.unwrap();
        assert!(db.get_kv("short").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(db.get_kv("short").await.unwrap().is_none());
        assert!(db.kv_ttl("short").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_kv_ttl_bounds() {
        let db = Database::open_in_memory().await.unwrap();
        db.put_kv("share", b"x", 7 * DAY).await.unwrap();

        let ttl = db.kv_ttl("share").await.unwrap().unwrap();
        assert!(ttl > Duration::ZERO);
        assert!(ttl <= 7 * DAY);
    }

    #[tokio::test]
    async fn test_purge_expired_kv() {
        let db = Database::open_in_memory().await.unwrap();
        db.put_kv("expiring", b"a", Duration::from_millis(20)).await.unwrap();
        db.put_kv("fresh", b"b", DAY).await.unwrap();

        tokio::time::sleep(Duration::from_millis(80)).await;

        let deleted = db.purge_expired_kv().await.unwrap();
        assert_eq!(deleted, 1);
        assert!(db.get_kv("fresh").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_upsert_kv() {
        let db = Database::open_in_memory().await.unwrap();
        db.put_kv("key", b"old", DAY).await.unwrap();
        db.put_kv("key", b"new", DAY).await.unwrap();

        assert_eq!(db.get_kv("key").await.unwrap().unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_volatile_store_delete() {
        let db = Database::open_in_memory().await.unwrap();
        let store: &dyn VolatileStore = &db;

        store.set("kumi:share:tok", Bytes::from_static(b"blob"), DAY).await.unwrap();
        assert!(store.exists("kumi:share:tok").await.unwrap());

        store.delete("kumi:share:tok").await.unwrap();
        assert!(!store.exists("kumi:share:tok").await.unwrap());
        store.delete("kumi:share:tok").await.unwrap();
    }
}
