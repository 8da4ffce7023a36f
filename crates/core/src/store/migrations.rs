//! Schema upgrades, tracked in SQLite's `user_version` header field.
//!
//! Every step runs in its own transaction together with the version bump, so
//! a failed step leaves the database at the last good version.

use tokio_rusqlite::Connection;
use tracing::debug;

use super::Error;

/// Ordered schema steps. A step's version is its position plus one.
const MIGRATIONS: &[&str] = &[
    include_str!("../../migrations/001_kv.sql"),
    include_str!("../../migrations/002_public_shares.sql"),
];

/// Bring the schema up to the newest version.
///
/// # Errors
///
/// Returns [`Error::MigrationFailed`] naming the first step that could not be
/// applied.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        let current: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

        for (version, sql) in (1_i64..).zip(MIGRATIONS).skip_while(|(version, _)| *version <= current) {
            let step = |e: tokio_rusqlite::rusqlite::Error| Error::MigrationFailed(format!("version {version}: {e}"));

            let tx = conn.transaction().map_err(step)?;
            tx.execute_batch(sql).map_err(step)?;
            tx.pragma_update(None, "user_version", version).map_err(step)?;
            tx.commit().map_err(step)?;

            debug!(version, "schema upgraded");
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}
