use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use rusqlite::{Connection, params, params_from_iter, types::Value as SqlValue};

use super::{LoadLogEntry, Store, Transaction};
use crate::{
    data::Value,
    query::{Dialect, quote_table},
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// SQLite-backed store, used for local runs and tests.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn =
            Connection::open(path).with_context(|| format!("Opening SQLite database {path:?}"))?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Opening in-memory SQLite database")?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Store for SqliteStore {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn begin(&mut self) -> Result<Box<dyn Transaction + '_>> {
        let inner = self
            .conn
            .transaction()
            .context("Starting SQLite transaction")?;
        Ok(Box::new(SqliteTransaction { inner }))
    }

    fn record_load(&mut self, log_table: &str, entry: &LoadLogEntry) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (table_name, start_time, end_time, row_count, status, message) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            quote_table(log_table)
        );
        self.conn
            .execute(
                &sql,
                params![
                    entry.table,
                    format_timestamp(&entry.start_time),
                    format_timestamp(&entry.end_time),
                    entry.row_count,
                    entry.status.as_str(),
                    entry.message,
                ],
            )
            .with_context(|| format!("Writing load log entry to {log_table}"))?;
        Ok(())
    }
}

struct SqliteTransaction<'a> {
    inner: rusqlite::Transaction<'a>,
}

impl Transaction for SqliteTransaction<'_> {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        let affected = self
            .inner
            .execute(sql, params_from_iter(params.iter().map(to_sqlite)))?;
        Ok(affected as u64)
    }

    fn batch(&mut self, sql: &str) -> Result<()> {
        Ok(self.inner.execute_batch(sql)?)
    }

    fn commit(self: Box<Self>) -> Result<()> {
        self.inner.commit().context("Committing SQLite transaction")
    }

    fn rollback(self: Box<Self>) -> Result<()> {
        self.inner
            .rollback()
            .context("Rolling back SQLite transaction")
    }
}

fn format_timestamp(value: &NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

fn to_sqlite(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Date(d) => SqlValue::Text(d.format("%Y-%m-%d").to_string()),
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::Boolean(b) => SqlValue::Integer(i64::from(*b)),
        Value::String(s) => SqlValue::Text(s.clone()),
    }
}
