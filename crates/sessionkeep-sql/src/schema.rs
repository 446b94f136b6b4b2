//! Session table setup
//!
//! Creation is idempotent: the table is looked up through the engine's
//! catalog first and left alone when it already exists.

use sqlx::AnyPool;
use tracing::{debug, info};

use sessionkeep_core::{Dialect, Error, Result};

/// Check whether the session table exists
pub async fn table_exists(pool: &AnyPool, dialect: &Dialect) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(&dialect.table_exists_sql())
        .bind(dialect.table_name())
        .fetch_one(pool)
        .await
        .map_err(Error::storage)?;

    Ok(count > 0)
}

/// Create the session table and its expiry index
///
/// Returns `false` without touching the database schema if the table is
/// already present.
pub async fn create_table(pool: &AnyPool, dialect: &Dialect) -> Result<bool> {
    if table_exists(pool, dialect).await? {
        debug!("Session table {} already exists", dialect.table_name());
        return Ok(false);
    }

    sqlx::query(&dialect.create_table_sql())
        .execute(pool)
        .await
        .map_err(Error::storage)?;

    sqlx::query(&dialect.create_index_sql())
        .execute(pool)
        .await
        .map_err(Error::storage)?;

    info!(
        "Created session table {} ({})",
        dialect.table_name(),
        dialect.db_type()
    );
    Ok(true)
}
