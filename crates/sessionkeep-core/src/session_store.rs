//! Session store trait
//!
//! The seven operations a session middleware expects from its backing
//! store. Implementations must filter expired sessions out of reads on
//! their own, independently of any background cleanup.

use async_trait::async_trait;

use crate::Result;
use crate::session::SessionData;

/// Session store trait
///
/// Implementations:
/// - `SqlSessionStore`: SQLite, PostgreSQL or MySQL through sqlx
///
/// # Example
/// ```no_run
/// # use sessionkeep_core::{Cookie, SessionData, SessionStore};
/// # async fn example(store: &dyn SessionStore) -> sessionkeep_core::Result<()> {
/// let session = SessionData::new(Cookie::new().with_max_age(30_000)).with_field("views", 1);
/// store.set("sid-1", &session).await?;
/// assert_eq!(store.get("sid-1").await?, Some(session));
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch a live session
    ///
    /// Returns `None` for unknown and expired ids alike.
    ///
    /// # Errors
    /// - `Error::Storage` for query errors
    /// - `Error::Serialization` if the stored payload is malformed
    async fn get(&self, sid: &str) -> Result<Option<SessionData>>;

    /// Insert or replace a session, expiring `cookie.maxAge` from now
    ///
    /// # Errors
    /// - `Error::Storage` for write errors
    /// - `Error::InvalidSession` if the expiry is out of range
    async fn set(&self, sid: &str, session: &SessionData) -> Result<()>;

    /// Move the expiry of a live session to `cookie.expires`
    ///
    /// Does nothing when the cookie has no absolute expiry or the session
    /// has already expired.
    async fn touch(&self, sid: &str, session: &SessionData) -> Result<()>;

    /// Delete one session, returning the number of rows removed
    async fn destroy(&self, sid: &str) -> Result<u64>;

    /// Number of stored sessions, expired ones included
    async fn length(&self) -> Result<u64>;

    /// Delete every session, returning the number of rows removed
    async fn clear(&self) -> Result<u64>;

    /// All live sessions, in storage order
    async fn all(&self) -> Result<Vec<SessionData>>;
}
