//! Store scenarios shared by the server-backed integration tests

#![allow(dead_code)]

use chrono::{TimeDelta, Utc};
use serde_json::json;
use sessionkeep_core::{Cookie, SessionData, SessionStore};
use sessionkeep_sql::{SqlSessionStore, StoreConfig, schema};
use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;
use std::time::Duration;

/// Connect to `url` through the Any driver, retrying while the server boots
pub async fn connect(url: &str) -> AnyPool {
    sqlx::any::install_default_drivers();

    let mut attempts = 0;
    loop {
        match AnyPoolOptions::new().max_connections(10).connect(url).await {
            Ok(pool) => return pool,
            Err(e) if attempts < 30 => {
                attempts += 1;
                tracing::debug!("Database not ready yet: {}", e);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            Err(e) => panic!("Failed to connect to {}: {}", url, e),
        }
    }
}

/// Create the session table for `config` and build a store on `pool`
pub async fn store_with(pool: &AnyPool, config: StoreConfig) -> SqlSessionStore {
    schema::create_table(pool, &config.dialect())
        .await
        .expect("Failed to create session table");
    SqlSessionStore::new(pool.clone(), config).expect("Failed to build store")
}

pub fn session(max_age_ms: i64, name: &str) -> SessionData {
    SessionData::new(
        Cookie::new()
            .with_max_age(max_age_ms)
            .with_attribute("originalMaxAge", max_age_ms),
    )
    .with_field("name", name)
}

/// set, get, overwrite, destroy and clear
pub async fn basic_lifecycle(store: &SqlSessionStore) {
    store.clear().await.unwrap();
    assert_eq!(store.length().await.unwrap(), 0);

    let sample = session(20000, "sample name").with_field("nested", json!({"a": [1, 2, 3]}));
    store.set("1111222233334444", &sample).await.unwrap();
    assert_eq!(store.length().await.unwrap(), 1);
    assert_eq!(store.get("1111222233334444").await.unwrap(), Some(sample));
    assert_eq!(store.get("hope-and-change").await.unwrap(), None);

    store
        .set("1111222233334444", &session(20000, "replaced"))
        .await
        .unwrap();
    assert_eq!(store.length().await.unwrap(), 1);
    assert_eq!(
        store.get("1111222233334444").await.unwrap(),
        Some(session(20000, "replaced"))
    );

    store.set("555666777", &session(1000, "Rob Dobilina")).await.unwrap();
    assert_eq!(store.destroy("555666777").await.unwrap(), 1);
    assert_eq!(store.destroy("555666777").await.unwrap(), 0);

    assert_eq!(store.clear().await.unwrap(), 1);
    assert_eq!(store.clear().await.unwrap(), 0);
}

/// Expired rows are invisible to reads, extendable only while live
pub async fn expiry_rules(store: &SqlSessionStore) {
    store.clear().await.unwrap();

    store.set("old", &session(-60_000, "old")).await.unwrap();
    store.set("new", &session(20000, "new")).await.unwrap();

    assert_eq!(store.get("old").await.unwrap(), None);
    assert_eq!(store.all().await.unwrap(), vec![session(20000, "new")]);
    assert_eq!(store.length().await.unwrap(), 2);

    let mut touched = session(20000, "old");
    touched.cookie.expires = Some(Utc::now() + TimeDelta::hours(1));
    store.touch("old", &touched).await.unwrap();
    assert_eq!(store.get("old").await.unwrap(), None);

    store.set("short", &session(1000, "short")).await.unwrap();
    let mut touched = session(1000, "short");
    touched.cookie.expires = Some(Utc::now() + TimeDelta::hours(1));
    store.touch("short", &touched).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(store.get("short").await.unwrap(), Some(session(1000, "short")));

    let stats = store.cleanup_now().await.unwrap();
    assert_eq!(stats.sessions_deleted, 1);
    assert_eq!(store.length().await.unwrap(), 2);

    store.clear().await.unwrap();
}

/// Concurrent first writes of one id leave exactly one row
pub async fn concurrent_writers(store: &SqlSessionStore) {
    store.clear().await.unwrap();

    let writes = (0..20).map(|i| {
        let store = store.clone();
        async move { store.set("shared", &session(20000, &format!("writer {i}"))).await }
    });
    for result in futures::future::join_all(writes).await {
        result.unwrap();
    }

    assert_eq!(store.length().await.unwrap(), 1);
    let stored = store.get("shared").await.unwrap().unwrap();
    assert!(stored.get("name").unwrap().as_str().unwrap().starts_with("writer "));

    store.clear().await.unwrap();
}
