//! Relational session storage for sessionkeep
//!
//! This crate implements the `SessionStore` trait on top of a `sqlx::AnyPool`,
//! supporting SQLite, PostgreSQL and MySQL with one code path.
//!
//! # Features
//! - Single-statement upserts where the engine has one, row-locking
//!   transactions otherwise
//! - Reads filter expired sessions in SQL, whether or not a sweep has run
//! - Self-rescheduling background sweep of expired rows with an error hook
//! - Readiness barrier: operations start after the first sweep completes
//! - Idempotent table creation
//!
//! # Example
//! ```no_run
//! # use sessionkeep_sql::{SqlSessionStore, StoreConfig, schema};
//! # use sessionkeep_core::{Cookie, SessionData, SessionStore};
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! sqlx::any::install_default_drivers();
//! let pool = sqlx::AnyPool::connect("sqlite://sessions.db?mode=rwc").await?;
//!
//! let config = StoreConfig::default();
//! schema::create_table(&pool, &config.dialect()).await?;
//!
//! let store = SqlSessionStore::new(pool, config)?;
//!
//! let session = SessionData::new(Cookie::new().with_max_age(30_000)).with_field("views", 1);
//! store.set("sid-1", &session).await?;
//! # Ok(())
//! # }
//! ```

pub mod cleanup;
pub mod config;
pub mod readiness;
pub mod schema;
mod sql_session_store;

pub use cleanup::{CleanupStats, CleanupTask};
pub use config::{CleanupErrorHook, StoreConfig};
pub use readiness::{Readiness, ReadinessBarrier};
pub use sql_session_store::{SqlSessionStore, SqlSessionStoreBuilder};
