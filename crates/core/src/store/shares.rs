//! Public share records.
//!
//! Rows are written once and never updated: a taken `uid` is rejected rather
//! than overwritten.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::DurableStore;
use super::connection::Database;
use crate::Error;

/// A permanent, publicly addressable share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicShare {
    pub id: i64,
    pub uid: String,
    /// Compressed payload, stored verbatim.
    pub blob: Vec<u8>,
    pub created_at: String,
    pub updated_at: String,
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

impl Database {
    /// Insert a new public share.
    ///
    /// Blank `uid`s are rejected before touching the database; a duplicate
    /// `uid` surfaces the UNIQUE index violation as a validation error.
    pub async fn insert_public_share(&self, uid: &str, blob: &[u8]) -> Result<PublicShare, Error> {
        if uid.trim().is_empty() {
            return Err(Error::ValidationFailed { field: "uid".into(), message: "can't be blank".into() });
        }

        let uid = uid.to_string();
        let blob = blob.to_vec();
        let now = Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<PublicShare, Error> {
                let inserted = conn.execute(
                    "INSERT INTO public_shares (uid, blob, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
                    params![uid, blob, now],
                );

                match inserted {
                    Ok(_) => Ok(PublicShare { id: conn.last_insert_rowid(), uid, blob, created_at: now.clone(), updated_at: now }),
                    Err(e) if is_unique_violation(&e) => {
                        Err(Error::ValidationFailed { field: "uid".into(), message: "has already been taken".into() })
                    }
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Get a public share by uid.
    ///
    /// Returns None if no share has that uid.
    pub async fn get_public_share(&self, uid: &str) -> Result<Option<PublicShare>, Error> {
        let uid = uid.to_string();
        self.conn
            .call(move |conn| -> Result<Option<PublicShare>, Error> {
                let mut stmt =
                    conn.prepare("SELECT id, uid, blob, created_at, updated_at FROM public_shares WHERE uid = ?1")?;

                let result = stmt.query_row(params![uid], |row| {
                    Ok(PublicShare {
                        id: row.get(0)?,
                        uid: row.get(1)?,
                        blob: row.get(2)?,
                        created_at: row.get(3)?,
                        updated_at: row.get(4)?,
                    })
                });

                match result {
                    Ok(share) => Ok(Some(share)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Count stored public shares.
    pub async fn count_public_shares(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM public_shares", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[async_trait]
impl DurableStore for Database {
    async fn insert_share(&self, uid: &str, blob: &[u8]) -> Result<PublicShare, Error> {
        self.insert_public_share(uid, blob).await
    }

    async fn find_share(&self, uid: &str) -> Result<Option<PublicShare>, Error> {
        self.get_public_share(uid).await
    }
}
