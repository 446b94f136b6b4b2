//! Session payload types
//!
//! A session is an arbitrary JSON object that always carries a `cookie`
//! sub-object. Only the cookie's expiry hints are interpreted by the store;
//! every other field is carried through untouched.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Lifetime applied by `set` when the cookie carries no `maxAge` (one day)
pub const DEFAULT_MAX_AGE_MS: i64 = 86_400_000;

/// Cookie expiry hints attached to every session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    /// Remaining lifetime in milliseconds
    #[serde(rename = "maxAge", default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<i64>,

    /// Absolute expiry, used by `touch`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,

    /// Remaining cookie attributes (path, httpOnly, originalMaxAge, ...)
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Cookie {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_age(mut self, max_age_ms: i64) -> Self {
        self.max_age = Some(max_age_ms);
        self
    }

    pub fn with_expires(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Absolute expiry for a write happening at `now`
    ///
    /// Falls back to [`DEFAULT_MAX_AGE_MS`] when `maxAge` is absent.
    ///
    /// # Errors
    /// - `Error::InvalidSession` if the resulting instant is out of range
    pub fn expiry_from(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let max_age = self.max_age.unwrap_or(DEFAULT_MAX_AGE_MS);
        TimeDelta::try_milliseconds(max_age)
            .and_then(|delta| now.checked_add_signed(delta))
            .ok_or_else(|| {
                Error::InvalidSession(format!("maxAge {} ms is out of range", max_age))
            })
    }
}

/// Session payload as exchanged with the session middleware
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default)]
    pub cookie: Cookie,

    /// Application data stored alongside the cookie
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl SessionData {
    pub fn new(cookie: Cookie) -> Self {
        Self {
            cookie,
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(key.into(), value.into())
    }
}
