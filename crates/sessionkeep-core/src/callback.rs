//! Callback calling convention
//!
//! Session middleware written against completion callbacks can drive any
//! [`SessionStore`] through [`CallbackStore`]. The callback sees exactly
//! the outcome that is returned: success values by reference, errors by
//! reference, and the error is still returned afterwards.

use crate::session::SessionData;
use crate::session_store::SessionStore;
use crate::{Error, Result};

/// Deliver `result` to `callback` (if any) and hand it back unchanged
pub fn complete<T, F>(result: Result<T>, callback: Option<F>) -> Result<T>
where
    F: FnOnce(std::result::Result<&T, &Error>),
{
    if let Some(callback) = callback {
        callback(result.as_ref());
    }
    result
}

/// Adapter exposing a store's operations with optional completion callbacks
pub struct CallbackStore<S> {
    inner: S,
}

impl<S: SessionStore> CallbackStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    pub async fn get<F>(&self, sid: &str, callback: Option<F>) -> Result<Option<SessionData>>
    where
        F: FnOnce(std::result::Result<&Option<SessionData>, &Error>),
    {
        complete(self.inner.get(sid).await, callback)
    }

    pub async fn set<F>(&self, sid: &str, session: &SessionData, callback: Option<F>) -> Result<()>
    where
        F: FnOnce(std::result::Result<&(), &Error>),
    {
        complete(self.inner.set(sid, session).await, callback)
    }

    pub async fn touch<F>(
        &self,
        sid: &str,
        session: &SessionData,
        callback: Option<F>,
    ) -> Result<()>
    where
        F: FnOnce(std::result::Result<&(), &Error>),
    {
        complete(self.inner.touch(sid, session).await, callback)
    }

    pub async fn destroy<F>(&self, sid: &str, callback: Option<F>) -> Result<u64>
    where
        F: FnOnce(std::result::Result<&u64, &Error>),
    {
        complete(self.inner.destroy(sid).await, callback)
    }

    pub async fn length<F>(&self, callback: Option<F>) -> Result<u64>
    where
        F: FnOnce(std::result::Result<&u64, &Error>),
    {
        complete(self.inner.length().await, callback)
    }

    pub async fn clear<F>(&self, callback: Option<F>) -> Result<u64>
    where
        F: FnOnce(std::result::Result<&u64, &Error>),
    {
        complete(self.inner.clear().await, callback)
    }

    pub async fn all<F>(&self, callback: Option<F>) -> Result<Vec<SessionData>>
    where
        F: FnOnce(std::result::Result<&Vec<SessionData>, &Error>),
    {
        complete(self.inner.all().await, callback)
    }
}
