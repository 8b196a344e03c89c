// ABOUTME: Background task that rewrites every store on a fixed interval.
// ABOUTME: Safety net behind write-through persistence; stops on a cancellation token.

use crate::state::Stores;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;

/// Spawn the flusher. The first flush happens one full `period` after start.
pub fn spawn_flusher(
    stores: Arc<Stores>,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(run_flusher(stores, period, shutdown))
}

pub async fn run_flusher(stores: Arc<Stores>, period: Duration, shutdown: CancellationToken) {
    tracing::info!(interval_secs = period.as_secs(), "Starting state flusher");
    let mut ticker = interval_at(Instant::now() + period, period);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match stores.flush_all() {
                    Ok(()) => tracing::debug!("State flushed"),
                    Err(e) => tracing::error!(error = %e, "Periodic flush failed"),
                }
            }
            _ = shutdown.cancelled() => {
                tracing::info!("State flusher stopped");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn stores(dir: &TempDir) -> Arc<Stores> {
        Arc::new(Stores::open_at(&dir.path().join("data"), &dir.path().join("uploads"), 20).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_flush_waits_one_interval() {
        let dir = TempDir::new().unwrap();
        let stores = stores(&dir);
        let chat = stores.conversations.create_chat().unwrap();
        let path = dir.path().join("data/chats").join(format!("{}.json", chat.id));
        std::fs::remove_file(&path).unwrap();

        let shutdown = CancellationToken::new();
        let handle = spawn_flusher(stores.clone(), Duration::from_secs(10), shutdown.clone());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!path.exists());

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(path.exists());

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_stops_on_cancellation() {
        let dir = TempDir::new().unwrap();
        let shutdown = CancellationToken::new();
        let handle = spawn_flusher(stores(&dir), Duration::from_secs(3600), shutdown.clone());
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("flusher should stop")
            .unwrap();
    }
}
