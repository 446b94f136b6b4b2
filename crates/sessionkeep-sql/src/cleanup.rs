//! Expired session sweep
//!
//! A sweep deletes every row whose `expired` timestamp has passed. The
//! background task runs one sweep immediately, opens the readiness barrier,
//! then sleeps for the configured interval after each sweep completes, so
//! sweeps never overlap. Sweep errors go to the configured hook and never
//! stop the task.

use chrono::Utc;
use sqlx::AnyPool;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};

use sessionkeep_core::{Dialect, Error, Result};

use crate::config::CleanupErrorHook;
use crate::readiness::{Readiness, ReadinessSignal};

/// Statistics about one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupStats {
    /// Number of expired sessions deleted
    pub sessions_deleted: u64,
    /// Duration of the sweep in milliseconds
    pub duration_ms: u64,
}

/// Delete all expired sessions once
pub async fn sweep_expired(pool: &AnyPool, dialect: &Dialect) -> Result<CleanupStats> {
    let start = Instant::now();
    let now = dialect.timestamp(Utc::now());

    let result = sqlx::query(&dialect.sql().delete_expired)
        .bind(now)
        .execute(pool)
        .await
        .map_err(Error::storage)?;

    let stats = CleanupStats {
        sessions_deleted: result.rows_affected(),
        duration_ms: start.elapsed().as_millis() as u64,
    };

    tracing::debug!(
        table = dialect.table_name(),
        deleted = stats.sessions_deleted,
        duration_ms = stats.duration_ms,
        "Expired session sweep finished"
    );

    Ok(stats)
}

/// Handle for the background cleanup task
///
/// Dropping the handle stops the task after any sweep in progress.
pub struct CleanupTask {
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl CleanupTask {
    /// Signal the cleanup task to stop and wait for it to exit
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.handle.await;
    }

    /// Whether the task is still scheduled
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

/// Spawn the background cleanup task
///
/// `signal` is opened after the first sweep. Must be called from within a
/// tokio runtime.
pub fn spawn_cleanup_task(
    pool: AnyPool,
    dialect: Arc<Dialect>,
    interval: Duration,
    on_error: CleanupErrorHook,
    signal: ReadinessSignal,
) -> CleanupTask {
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

    let handle = tokio::spawn(async move {
        tracing::info!(
            "Starting session cleanup for table {} (interval: {}ms)",
            dialect.table_name(),
            interval.as_millis()
        );

        let mut signal = Some(signal);

        loop {
            let state = match sweep_expired(&pool, &dialect).await {
                Ok(_) => Readiness::Ready,
                Err(e) => {
                    on_error(&Error::cleanup(e));
                    Readiness::Degraded
                }
            };

            if let Some(signal) = signal.take() {
                signal.open(state);
            }

            // A closed channel means the handle was dropped
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Session cleanup task shutting down");
                    break;
                }
                _ = sleep(interval) => {}
            }
        }
    });

    CleanupTask {
        shutdown_tx,
        handle,
    }
}
