//! Relational store abstraction.
//!
//! The loader talks to one long-lived connection through [`Store`] and to a
//! single open transaction through [`Transaction`]. Both backends roll an
//! uncommitted transaction back when its handle is dropped, so every exit path
//! of a table load ends in either a commit or a rollback.

mod pg;
mod sqlite;

use std::fmt;

use anyhow::{Result, bail};
use chrono::NaiveDateTime;

use crate::{data::Value, query::Dialect};

pub use self::pg::PostgresStore;
pub use self::sqlite::SqliteStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Success,
    Failure,
}

impl LoadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LoadStatus::Success => "SUCCESS",
            LoadStatus::Failure => "FAILURE",
        }
    }
}

impl fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the load log table.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadLogEntry {
    pub table: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub row_count: i64,
    pub status: LoadStatus,
    pub message: String,
}

pub trait Transaction {
    /// Executes one parameterized statement, returning the affected row count.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Executes parameterless statements such as savepoint commands.
    fn batch(&mut self, sql: &str) -> Result<()>;

    fn commit(self: Box<Self>) -> Result<()>;

    fn rollback(self: Box<Self>) -> Result<()>;
}

pub trait Store {
    fn dialect(&self) -> Dialect;

    fn begin(&mut self) -> Result<Box<dyn Transaction + '_>>;

    /// Inserts and commits one load log entry outside any table transaction.
    fn record_load(&mut self, log_table: &str, entry: &LoadLogEntry) -> Result<()>;
}

/// Opens a store from a `postgres://`, `postgresql://` or `sqlite://` URL.
pub fn open(url: &str) -> Result<Box<dyn Store>> {
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        Ok(Box::new(PostgresStore::connect(url)?))
    } else if let Some(path) = url.strip_prefix("sqlite://") {
        Ok(Box::new(SqliteStore::open(path)?))
    } else if url == "sqlite::memory:" {
        Ok(Box::new(SqliteStore::in_memory()?))
    } else {
        bail!("Unsupported database URL '{}'", redact_url(url))
    }
}

/// Hides the password component of a connection URL for logging.
pub fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    match rest.split_once('@') {
        Some((credentials, host)) => {
            let user = credentials.split(':').next().unwrap_or_default();
            format!("{scheme}://{user}:***@{host}")
        }
        None => url.to_string(),
    }
}
