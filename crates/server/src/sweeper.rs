//! Periodic purge of expired volatile entries.

use std::sync::Arc;
use std::time::Duration;

use kumi_core::VolatileStore;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Run one sweep, logging rather than propagating failures.
pub async fn sweep_once(store: &dyn VolatileStore) -> u64 {
    match store.sweep().await {
        Ok(purged) => {
            tracing::debug!(purged, "volatile store swept");
            purged
        }
        Err(e) => {
            tracing::warn!(error = %e, "volatile store sweep failed");
            0
        }
    }
}

/// Spawn a task sweeping `store` every `interval`, first tick after one interval.
pub fn spawn(store: Arc<dyn VolatileStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            sweep_once(store.as_ref()).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kumi_core::Database;

    use crate::handler::testing::DownStore;

    #[tokio::test]
    async fn test_sweep_purges_expired_rows() {
        let db = Database::open_in_memory().await.unwrap();
        db.put_kv("kumi:share:old", b"x", Duration::from_millis(1)).await.unwrap();
        db.put_kv("kumi:share:new", b"y", Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(sweep_once(&db).await, 1);
        assert_eq!(db.get_kv("kumi:share:new").await.unwrap(), Some(b"y".to_vec()));
    }

    #[tokio::test]
    async fn test_sweep_failure_is_swallowed() {
        assert_eq!(sweep_once(&DownStore).await, 0);
    }

    #[tokio::test]
    async fn test_spawned_sweeper_runs() {
        let db = Arc::new(Database::open_in_memory().await.unwrap());
        db.put_kv("kumi:share:old", b"x", Duration::from_millis(1)).await.unwrap();

        let handle = spawn(db.clone(), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();

        assert_eq!(db.purge_expired_kv().await.unwrap(), 0);
    }
}
