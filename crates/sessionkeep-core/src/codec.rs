//! JSON codec for stored session payloads

use serde_json::Value;

use crate::Result;
use crate::session::SessionData;

/// Payload as handed back by the database driver
///
/// Some engines return JSON columns as text, others as an already parsed
/// value. Both normalize to the same [`SessionData`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoredSession {
    Text(String),
    Structured(Value),
}

impl From<String> for StoredSession {
    fn from(text: String) -> Self {
        StoredSession::Text(text)
    }
}

impl From<Value> for StoredSession {
    fn from(value: Value) -> Self {
        StoredSession::Structured(value)
    }
}

/// Serialize a session to the JSON text written to the `sess` column
pub fn encode(session: &SessionData) -> Result<String> {
    Ok(serde_json::to_string(session)?)
}

/// Deserialize a stored payload
///
/// A structured value holding a JSON string is treated as text: the engine
/// handed back an encoded document rather than an object.
///
/// # Errors
/// - `Error::Serialization` if the payload is not a valid session document
pub fn decode(stored: StoredSession) -> Result<SessionData> {
    let session = match stored {
        StoredSession::Text(text) => serde_json::from_str(&text)?,
        StoredSession::Structured(Value::String(text)) => serde_json::from_str(&text)?,
        StoredSession::Structured(value) => serde_json::from_value(value)?,
    };
    Ok(session)
}
