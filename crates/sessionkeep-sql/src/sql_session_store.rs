//! SqlSessionStore - SessionStore trait implementation for SQLite, PostgreSQL and MySQL
//!
//! The store talks to the database through a type-erased `sqlx::AnyPool`;
//! all engine differences are resolved by the [`Dialect`] it was built with.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::any::AnyRow;
use sqlx::{AnyPool, Row};
use std::sync::{Arc, Mutex};

use sessionkeep_core::{
    Dialect, Error, Result, SessionData, SessionStore, StoredSession, codec,
};

use crate::cleanup::{CleanupStats, CleanupTask, spawn_cleanup_task, sweep_expired};
use crate::config::{CleanupErrorHook, StoreConfig, log_cleanup_error};
use crate::readiness::{Readiness, ReadinessBarrier};

/// Relational session store
///
/// Cheap to clone; clones share the pool, the readiness barrier and the
/// cleanup task. The cleanup task stops when the last clone is dropped.
/// The pool itself is owned by the caller and is never closed here.
#[derive(Clone)]
pub struct SqlSessionStore {
    inner: Arc<Inner>,
}

struct Inner {
    pool: AnyPool,
    dialect: Arc<Dialect>,
    config: StoreConfig,
    ready: ReadinessBarrier,
    cleanup: Mutex<Option<CleanupTask>>,
}

/// Builder for [`SqlSessionStore`]
#[derive(Default)]
pub struct SqlSessionStoreBuilder {
    pool: Option<AnyPool>,
    config: StoreConfig,
    on_cleanup_error: Option<CleanupErrorHook>,
}

impl SqlSessionStoreBuilder {
    pub fn pool(mut self, pool: AnyPool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Hook receiving background sweep errors (defaults to logging them)
    pub fn on_cleanup_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.on_cleanup_error = Some(Arc::new(hook));
        self
    }

    /// Build the store and, if cleanup is enabled, start the sweep
    ///
    /// # Errors
    /// - `Error::Config` if no pool was given, the configuration is invalid,
    ///   or cleanup is enabled outside a tokio runtime
    pub fn build(self) -> Result<SqlSessionStore> {
        let pool = self
            .pool
            .ok_or_else(|| Error::Config("A database pool is required".to_string()))?;
        self.config.validate()?;

        let dialect = Arc::new(self.config.dialect());

        let (ready, cleanup) = if self.config.cleanup_enabled() {
            tokio::runtime::Handle::try_current().map_err(|_| {
                Error::Config("Session cleanup requires a running tokio runtime".to_string())
            })?;

            let (barrier, signal) = ReadinessBarrier::pending();
            let task = spawn_cleanup_task(
                pool.clone(),
                dialect.clone(),
                self.config.cleanup_interval(),
                self.on_cleanup_error.unwrap_or_else(log_cleanup_error),
                signal,
            );
            (barrier, Some(task))
        } else {
            (ReadinessBarrier::ready(), None)
        };

        Ok(SqlSessionStore {
            inner: Arc::new(Inner {
                pool,
                dialect,
                config: self.config,
                ready,
                cleanup: Mutex::new(cleanup),
            }),
        })
    }
}

impl SqlSessionStore {
    pub fn builder() -> SqlSessionStoreBuilder {
        SqlSessionStoreBuilder::default()
    }

    /// Build a store with the default cleanup error hook
    pub fn new(pool: AnyPool, config: StoreConfig) -> Result<Self> {
        Self::builder().pool(pool).config(config).build()
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &AnyPool {
        &self.inner.pool
    }

    pub fn dialect(&self) -> &Dialect {
        &self.inner.dialect
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Wait for the readiness barrier
    pub async fn ready(&self) -> Readiness {
        self.inner.ready.wait().await
    }

    /// Whether a background sweep is currently scheduled
    pub fn cleanup_scheduled(&self) -> bool {
        self.cleanup_slot().as_ref().is_some_and(|task| task.is_running())
    }

    /// Run one sweep now, independently of the background schedule
    ///
    /// # Errors
    /// - `Error::Cleanup` wrapping the storage error
    pub async fn cleanup_now(&self) -> Result<CleanupStats> {
        self.ready().await;
        sweep_expired(self.pool(), self.dialect())
            .await
            .map_err(Error::cleanup)
    }

    /// Stop the background sweep for all clones of this store
    pub async fn shutdown(&self) {
        let task = self.cleanup_slot().take();
        if let Some(task) = task {
            task.shutdown().await;
        }
    }

    fn cleanup_slot(&self) -> std::sync::MutexGuard<'_, Option<CleanupTask>> {
        self.inner
            .cleanup
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn now(&self) -> String {
        self.dialect().timestamp(Utc::now())
    }

    /// Write through a row-locking transaction
    ///
    /// Concurrent first writes of the same id can both miss the row and race
    /// on the insert. The loser sees a unique violation (or, on engines that
    /// gap-lock the missing row, a deadlock) and retries, by which time the
    /// row exists and is locked for update.
    async fn set_locked(&self, sid: &str, expires: &str, sess: &str) -> Result<()> {
        let mut attempt = 1;
        loop {
            match self.try_set_locked(sid, expires, sess).await {
                Err(sqlx::Error::Database(db_err))
                    if attempt < MAX_WRITE_ATTEMPTS && is_write_conflict(db_err.as_ref()) =>
                {
                    tracing::debug!(
                        "Concurrent write of session {} (attempt {}), retrying",
                        sid,
                        attempt
                    );
                    attempt += 1;
                }
                result => return result.map_err(Error::storage),
            }
        }
    }

    async fn try_set_locked(
        &self,
        sid: &str,
        expires: &str,
        sess: &str,
    ) -> std::result::Result<(), sqlx::Error> {
        let sql = self.dialect().sql();
        let mut tx = match self.dialect().db_type().begin_statement() {
            Some(begin) => self.pool().begin_with(begin).await?,
            None => self.pool().begin().await?,
        };

        let existing = sqlx::query(&sql.select_for_update)
            .bind(sid)
            .fetch_optional(&mut *tx)
            .await?;

        if existing.is_none() {
            sqlx::query(&sql.insert)
                .bind(sid)
                .bind(expires)
                .bind(sess)
                .execute(&mut *tx)
                .await?;
        } else {
            sqlx::query(&sql.update)
                .bind(expires)
                .bind(sess)
                .bind(sid)
                .execute(&mut *tx)
                .await?;
        }

        // Dropping an uncommitted transaction rolls it back
        tx.commit().await
    }
}

/// Attempts made by the transactional write before giving up
const MAX_WRITE_ATTEMPTS: u32 = 3;

/// Unique violation on the insert, a deadlock/serialization failure, or a
/// SQLite lock still held once the busy timeout ran out
fn is_write_conflict(err: &dyn sqlx::error::DatabaseError) -> bool {
    err.is_unique_violation()
        || matches!(
            err.code().as_deref(),
            Some("40001") | Some("40P01") | Some("5") | Some("517")
        )
}

fn decode_row(row: &AnyRow) -> Result<SessionData> {
    let stored = match row.try_get::<Option<String>, _>(0).map_err(Error::storage)? {
        Some(text) => StoredSession::Text(text),
        None => StoredSession::Structured(serde_json::Value::Null),
    };
    codec::decode(stored)
}

#[async_trait]
impl SessionStore for SqlSessionStore {
    async fn get(&self, sid: &str) -> Result<Option<SessionData>> {
        self.ready().await;

        let row = sqlx::query(&self.dialect().sql().select_live)
            .bind(sid)
            .bind(self.now())
            .fetch_optional(self.pool())
            .await
            .map_err(Error::storage)?;

        row.as_ref().map(decode_row).transpose()
    }

    async fn set(&self, sid: &str, session: &SessionData) -> Result<()> {
        self.ready().await;

        let expires = self.dialect().timestamp(session.cookie.expiry_from(Utc::now())?);
        let sess = codec::encode(session)?;

        let upsert = if self.config().fast_upsert {
            self.dialect().sql().upsert.as_deref()
        } else {
            None
        };

        match upsert {
            Some(upsert) => {
                sqlx::query(upsert)
                    .bind(sid)
                    .bind(expires.as_str())
                    .bind(sess.as_str())
                    .execute(self.pool())
                    .await
                    .map_err(Error::storage)?;
            }
            None => self.set_locked(sid, &expires, &sess).await?,
        }

        Ok(())
    }

    async fn touch(&self, sid: &str, session: &SessionData) -> Result<()> {
        self.ready().await;

        let Some(expires) = session.cookie.expires else {
            return Ok(());
        };

        sqlx::query(&self.dialect().sql().touch)
            .bind(self.dialect().timestamp(expires))
            .bind(sid)
            .bind(self.now())
            .execute(self.pool())
            .await
            .map_err(Error::storage)?;

        Ok(())
    }

    async fn destroy(&self, sid: &str) -> Result<u64> {
        self.ready().await;

        let result = sqlx::query(&self.dialect().sql().delete_one)
            .bind(sid)
            .execute(self.pool())
            .await
            .map_err(Error::storage)?;

        Ok(result.rows_affected())
    }

    async fn length(&self) -> Result<u64> {
        self.ready().await;

        let count: i64 = sqlx::query_scalar(&self.dialect().sql().count)
            .fetch_one(self.pool())
            .await
            .map_err(Error::storage)?;

        Ok(count.max(0) as u64)
    }

    async fn clear(&self) -> Result<u64> {
        self.ready().await;

        let result = sqlx::query(&self.dialect().sql().delete_all)
            .execute(self.pool())
            .await
            .map_err(Error::storage)?;

        Ok(result.rows_affected())
    }

    async fn all(&self) -> Result<Vec<SessionData>> {
        self.ready().await;

        let rows = sqlx::query(&self.dialect().sql().select_all_live)
            .bind(self.now())
            .fetch_all(self.pool())
            .await
            .map_err(Error::storage)?;

        rows.iter().map(decode_row).collect()
    }
}
