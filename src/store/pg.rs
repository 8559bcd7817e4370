use std::error::Error;

use anyhow::{Context, Result};
use bytes::BytesMut;
use chrono::{NaiveTime, TimeZone, Utc};
use log::debug;
use postgres::{
    Client, NoTls,
    types::{IsNull, ToSql, Type, to_sql_checked},
};
use rust_decimal::{Decimal, prelude::FromPrimitive};

use super::{LoadLogEntry, Store, Transaction, redact_url};
use crate::{
    data::Value,
    query::{Dialect, quote_table},
};

type BoxedError = Box<dyn Error + Sync + Send>;

pub struct PostgresStore {
    client: Client,
}

impl PostgresStore {
    pub fn connect(url: &str) -> Result<Self> {
        let client = Client::connect(url, NoTls)
            .with_context(|| format!("Connecting to {}", redact_url(url)))?;
        debug!("Connected to {}", redact_url(url));
        Ok(Self { client })
    }
}

impl Store for PostgresStore {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn begin(&mut self) -> Result<Box<dyn Transaction + '_>> {
        let inner = self
            .client
            .transaction()
            .context("Starting PostgreSQL transaction")?;
        Ok(Box::new(PostgresTransaction { inner }))
    }

    fn record_load(&mut self, log_table: &str, entry: &LoadLogEntry) -> Result<()> {
        // Casts pin the parameter types so integer or timestamptz log columns accept them.
        let sql = format!(
            "INSERT INTO {} (table_name, start_time, end_time, row_count, status, message) \
             VALUES ($1::text, $2::timestamp, $3::timestamp, $4::bigint, $5::text, $6::text)",
            quote_table(log_table)
        );
        self.client
            .execute(
                sql.as_str(),
                &[
                    &entry.table,
                    &entry.start_time,
                    &entry.end_time,
                    &entry.row_count,
                    &entry.status.as_str(),
                    &entry.message,
                ],
            )
            .with_context(|| format!("Writing load log entry to {log_table}"))?;
        Ok(())
    }
}

struct PostgresTransaction<'a> {
    inner: postgres::Transaction<'a>,
}

impl Transaction for PostgresTransaction<'_> {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        let bound = params.iter().map(PgParam).collect::<Vec<_>>();
        let refs = bound
            .iter()
            .map(|p| p as &(dyn ToSql + Sync))
            .collect::<Vec<_>>();
        Ok(self.inner.execute(sql, &refs)?)
    }

    fn batch(&mut self, sql: &str) -> Result<()> {
        Ok(self.inner.batch_execute(sql)?)
    }

    fn commit(self: Box<Self>) -> Result<()> {
        self.inner
            .commit()
            .context("Committing PostgreSQL transaction")
    }

    fn rollback(self: Box<Self>) -> Result<()> {
        self.inner
            .rollback()
            .context("Rolling back PostgreSQL transaction")
    }
}

/// Binds a [`Value`] according to the parameter type the server inferred from
/// the destination column, so one cell kind can feed several column types.
#[derive(Debug)]
struct PgParam<'a>(&'a Value);

impl ToSql for PgParam<'_> {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxedError> {
        match self.0 {
            Value::Null => Ok(IsNull::Yes),
            Value::Integer(v) => bind_integer(*v, ty, out),
            Value::Float(v) => bind_float(*v, ty, out),
            Value::Boolean(v) => match *ty {
                Type::BOOL => v.to_sql(ty, out),
                _ if is_text(ty) => v.to_string().to_sql(ty, out),
                _ => bind_integer(i64::from(*v), ty, out),
            },
            Value::Date(v) => match *ty {
                Type::DATE => v.to_sql(ty, out),
                Type::TIMESTAMP => v.and_time(NaiveTime::MIN).to_sql(ty, out),
                Type::TIMESTAMPTZ => Utc
                    .from_utc_datetime(&v.and_time(NaiveTime::MIN))
                    .to_sql(ty, out),
                _ if is_text(ty) => v.format("%Y-%m-%d").to_string().to_sql(ty, out),
                _ => Err(mismatch(self.0, ty)),
            },
            Value::String(v) => match *ty {
                Type::NUMERIC => v.trim().parse::<Decimal>()?.to_sql(ty, out),
                _ if is_text(ty) => v.as_str().to_sql(ty, out),
                _ => Err(mismatch(self.0, ty)),
            },
        }
    }

    fn accepts(_: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn is_text(ty: &Type) -> bool {
    matches!(
        *ty,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN
    )
}

fn mismatch(value: &Value, ty: &Type) -> BoxedError {
    format!("cannot bind '{value}' to a column of type {ty}").into()
}

fn bind_integer(v: i64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxedError> {
    match *ty {
        Type::INT2 => i16::try_from(v)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(v)?.to_sql(ty, out),
        Type::INT8 => v.to_sql(ty, out),
        Type::FLOAT4 => (v as f32).to_sql(ty, out),
        Type::FLOAT8 => (v as f64).to_sql(ty, out),
        Type::NUMERIC => Decimal::from(v).to_sql(ty, out),
        Type::BOOL => (v != 0).to_sql(ty, out),
        _ if is_text(ty) => v.to_string().to_sql(ty, out),
        _ => Err(mismatch(&Value::Integer(v), ty)),
    }
}

fn bind_float(v: f64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxedError> {
    match *ty {
        Type::FLOAT4 => (v as f32).to_sql(ty, out),
        Type::FLOAT8 => v.to_sql(ty, out),
        Type::NUMERIC => Decimal::from_f64(v)
            .ok_or_else(|| format!("{v} does not fit a numeric column"))?
            .to_sql(ty, out),
        Type::INT2 | Type::INT4 | Type::INT8 if v.fract() == 0.0 => bind_integer(v as i64, ty, out),
        _ if is_text(ty) => v.to_string().to_sql(ty, out),
        _ => Err(mismatch(&Value::Float(v), ty)),
    }
}
