//! sessionkeep core types and traits
//!
//! This crate provides the engine-independent parts of sessionkeep:
//! - Session payload types and their JSON codec
//! - The SQL dialect policy for SQLite, PostgreSQL and MySQL
//! - The `SessionStore` trait and its callback adapter
//! - Core error types

pub mod callback;
pub mod codec;
pub mod dialect;
pub mod error;
pub mod session;
pub mod session_store;

pub use callback::CallbackStore;
pub use codec::StoredSession;
pub use dialect::{DbType, Dialect, Statements};
pub use error::{Error, Result};
pub use session::{Cookie, DEFAULT_MAX_AGE_MS, SessionData};
pub use session_store::SessionStore;
