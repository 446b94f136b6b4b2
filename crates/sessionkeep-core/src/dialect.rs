//! SQL dialect policy for the supported database engines
//!
//! Every statement the store issues is generated here, once, from the
//! backend tag and the configured table/column names. Operation code never
//! branches on the backend itself.
//!
//! Timestamps are always bound as text and cast in SQL, so the same bind
//! values work through a type-erased driver on all three engines.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Supported database engines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
    #[default]
    Sqlite,
    Mysql,
    #[serde(alias = "postgres")]
    Postgresql,
}

impl DbType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DbType::Sqlite => "sqlite",
            DbType::Mysql => "mysql",
            DbType::Postgresql => "postgresql",
        }
    }

    /// Type used to cast a textual "now" before comparing it with `expired`
    pub fn timestamp_type_name(&self) -> &'static str {
        match self {
            DbType::Sqlite => "datetime",
            DbType::Mysql => "DATETIME(3)",
            DbType::Postgresql => "timestamptz",
        }
    }

    /// Column type of `sess`
    pub fn json_type_name(&self) -> &'static str {
        match self {
            DbType::Postgresql => "jsonb",
            DbType::Sqlite | DbType::Mysql => "json",
        }
    }

    /// Column type of `expired`
    pub fn expiry_column_type(&self) -> &'static str {
        match self {
            DbType::Sqlite => "timestamp",
            DbType::Mysql => "DATETIME(3)",
            DbType::Postgresql => "timestamptz",
        }
    }

    /// Render an instant as a literal the engine parses back losslessly
    ///
    /// MySQL rejects zone suffixes in DATETIME literals, so it gets a bare
    /// UTC wall-clock time.
    pub fn format_timestamp(&self, instant: DateTime<Utc>) -> String {
        match self {
            DbType::Mysql => instant.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            DbType::Sqlite | DbType::Postgresql => {
                instant.to_rfc3339_opts(SecondsFormat::Millis, true)
            }
        }
    }

    /// Quote an identifier, doubling any embedded quote characters
    pub fn quote_ident(&self, name: &str) -> String {
        match self {
            DbType::Mysql => format!("`{}`", name.replace('`', "``")),
            DbType::Sqlite | DbType::Postgresql => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }

    /// Positional parameter marker (1-based)
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            DbType::Postgresql => format!("${}", index),
            DbType::Sqlite | DbType::Mysql => "?".to_string(),
        }
    }

    /// Statement opening the transactional write, if the default `BEGIN`
    /// is not enough
    ///
    /// SQLite takes its write lock up front; a deferred transaction would
    /// hold a read lock at the existence check and fail with `SQLITE_BUSY`
    /// when a second writer tries to upgrade alongside it.
    pub fn begin_statement(&self) -> Option<&'static str> {
        match self {
            DbType::Sqlite => Some("BEGIN IMMEDIATE"),
            DbType::Mysql | DbType::Postgresql => None,
        }
    }

    /// Row lock appended to the existence check of the transactional write
    ///
    /// SQLite has no row locks; its write lock covers the whole database.
    pub fn row_lock_clause(&self) -> &'static str {
        match self {
            DbType::Sqlite => "",
            DbType::Mysql | DbType::Postgresql => " FOR UPDATE",
        }
    }

    /// Expression selecting `sess` as text
    pub fn payload_expr(&self) -> &'static str {
        match self {
            DbType::Sqlite => "sess",
            DbType::Mysql => "CAST(sess AS CHAR)",
            DbType::Postgresql => "sess::text",
        }
    }

    /// Parameter holding a timestamp literal
    pub fn timestamp_param(&self, index: usize) -> String {
        match self {
            DbType::Sqlite => self.placeholder(index),
            DbType::Mysql | DbType::Postgresql => format!(
                "CAST({} AS {})",
                self.placeholder(index),
                self.timestamp_type_name()
            ),
        }
    }

    /// Parameter holding JSON text
    pub fn json_param(&self, index: usize) -> String {
        match self {
            DbType::Postgresql => format!("CAST({} AS jsonb)", self.placeholder(index)),
            DbType::Sqlite | DbType::Mysql => self.placeholder(index),
        }
    }

    /// True while "now" (bound at `index`) is strictly before `expired`
    pub fn live_predicate(&self, index: usize) -> String {
        match self {
            DbType::Sqlite => format!(
                "datetime({}) < datetime(expired)",
                self.placeholder(index)
            ),
            DbType::Mysql | DbType::Postgresql => {
                format!("{} < expired", self.timestamp_param(index))
            }
        }
    }

    /// Complement of [`DbType::live_predicate`], used by the sweep
    pub fn expired_predicate(&self, index: usize) -> String {
        match self {
            DbType::Sqlite => format!(
                "datetime(expired) <= datetime({})",
                self.placeholder(index)
            ),
            DbType::Mysql | DbType::Postgresql => {
                format!("expired <= {}", self.timestamp_param(index))
            }
        }
    }

    /// Single-statement insert-or-replace, if the engine has a safe one
    ///
    /// Binds: sid, expired, sess.
    pub fn upsert_statement(&self, table: &str, sid: &str) -> Option<String> {
        let values = format!(
            "({}, {}, {})",
            self.placeholder(1),
            self.timestamp_param(2),
            self.json_param(3)
        );
        let sql = match self {
            DbType::Sqlite => format!(
                "INSERT OR REPLACE INTO {table} ({sid}, expired, sess) VALUES {values}"
            ),
            DbType::Postgresql => format!(
                "INSERT INTO {table} ({sid}, expired, sess) VALUES {values} \
                 ON CONFLICT ({sid}) DO UPDATE SET expired = EXCLUDED.expired, sess = EXCLUDED.sess"
            ),
            DbType::Mysql => format!(
                "INSERT INTO {table} ({sid}, expired, sess) VALUES {values} \
                 ON DUPLICATE KEY UPDATE expired = VALUES(expired), sess = VALUES(sess)"
            ),
        };
        Some(sql)
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DbType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(DbType::Sqlite),
            "mysql" => Ok(DbType::Mysql),
            "postgresql" | "postgres" => Ok(DbType::Postgresql),
            other => Err(Error::Config(format!(
                "Unsupported database type '{}' (expected sqlite, mysql or postgresql)",
                other
            ))),
        }
    }
}

/// Statements used by the session store, with their bind order
#[derive(Debug, Clone)]
pub struct Statements {
    /// Binds: sid, now
    pub select_live: String,
    /// Binds: now
    pub select_all_live: String,
    /// Binds: sid, expired, sess
    ///
    /// Every supported engine has one, so this is always `Some` as built;
    /// the store skips it (taking the transactional write) when
    /// `fast_upsert` is disabled in its configuration.
    pub upsert: Option<String>,
    /// Binds: sid
    pub select_for_update: String,
    /// Binds: sid, expired, sess
    pub insert: String,
    /// Binds: expired, sess, sid
    pub update: String,
    /// Binds: expired, sid, now
    pub touch: String,
    /// Binds: sid
    pub delete_one: String,
    pub count: String,
    pub delete_all: String,
    /// Binds: now
    pub delete_expired: String,
}

/// Dialect policy bound to one session table
#[derive(Debug, Clone)]
pub struct Dialect {
    db_type: DbType,
    table_name: String,
    sid_field_name: String,
    statements: Statements,
}

impl Dialect {
    pub fn new(db_type: DbType, table_name: &str, sid_field_name: &str) -> Self {
        let statements = build_statements(db_type, table_name, sid_field_name);
        Self {
            db_type,
            table_name: table_name.to_string(),
            sid_field_name: sid_field_name.to_string(),
            statements,
        }
    }

    pub fn db_type(&self) -> DbType {
        self.db_type
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn sql(&self) -> &Statements {
        &self.statements
    }

    /// Render an instant for binding into any statement of this dialect
    pub fn timestamp(&self, instant: DateTime<Utc>) -> String {
        self.db_type.format_timestamp(instant)
    }

    /// Introspection query counting tables with the bound name
    pub fn table_exists_sql(&self) -> String {
        let db = self.db_type;
        match db {
            DbType::Sqlite => format!(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = {}",
                db.placeholder(1)
            ),
            DbType::Postgresql => format!(
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_name = {}",
                db.placeholder(1)
            ),
            DbType::Mysql => format!(
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_schema = DATABASE() AND table_name = {}",
                db.placeholder(1)
            ),
        }
    }

    pub fn create_table_sql(&self) -> String {
        let db = self.db_type;
        format!(
            "CREATE TABLE {} ({} VARCHAR(255) NOT NULL PRIMARY KEY, sess {}, expired {} NOT NULL)",
            db.quote_ident(&self.table_name),
            db.quote_ident(&self.sid_field_name),
            db.json_type_name(),
            db.expiry_column_type()
        )
    }

    pub fn create_index_sql(&self) -> String {
        let db = self.db_type;
        format!(
            "CREATE INDEX {} ON {} (expired)",
            db.quote_ident(&format!("{}_expired_idx", self.table_name)),
            db.quote_ident(&self.table_name)
        )
    }
}

fn build_statements(db: DbType, table_name: &str, sid_field_name: &str) -> Statements {
    let table = db.quote_ident(table_name);
    let sid = db.quote_ident(sid_field_name);
    let payload = db.payload_expr();

    Statements {
        select_live: format!(
            "SELECT {payload} FROM {table} WHERE {sid} = {} AND {}",
            db.placeholder(1),
            db.live_predicate(2)
        ),
        select_all_live: format!(
            "SELECT {payload} FROM {table} WHERE {}",
            db.live_predicate(1)
        ),
        upsert: db.upsert_statement(&table, &sid),
        select_for_update: format!(
            "SELECT {sid} FROM {table} WHERE {sid} = {}{}",
            db.placeholder(1),
            db.row_lock_clause()
        ),
        insert: format!(
            "INSERT INTO {table} ({sid}, expired, sess) VALUES ({}, {}, {})",
            db.placeholder(1),
            db.timestamp_param(2),
            db.json_param(3)
        ),
        update: format!(
            "UPDATE {table} SET expired = {}, sess = {} WHERE {sid} = {}",
            db.timestamp_param(1),
            db.json_param(2),
            db.placeholder(3)
        ),
        touch: format!(
            "UPDATE {table} SET expired = {} WHERE {sid} = {} AND {}",
            db.timestamp_param(1),
            db.placeholder(2),
            db.live_predicate(3)
        ),
        delete_one: format!("DELETE FROM {table} WHERE {sid} = {}", db.placeholder(1)),
        count: format!("SELECT COUNT({sid}) FROM {table}"),
        delete_all: format!("DELETE FROM {table}"),
        delete_expired: format!(
            "DELETE FROM {table} WHERE {}",
            db.expired_predicate(1)
        ),
    }
}
