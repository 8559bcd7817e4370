//! Two-tier insertion: one bulk attempt, then row-by-row on failure.
//!
//! The bulk attempt runs inside a savepoint. If any page of it fails the
//! savepoint is rolled back and every row is retried alone under its own
//! savepoint, so a failing row neither poisons the surrounding transaction nor
//! stops the rows after it.

use anyhow::Result;
use log::{debug, info, warn};

use crate::{
    data::Value,
    dataset::Row,
    error::LoadError,
    query::InsertQuery,
    store::Transaction,
};

pub const DEFAULT_PAGE_SIZE: usize = 100;

const BULK_SAVEPOINT: &str = "dsload_bulk";
const ROW_SAVEPOINT: &str = "dsload_row";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFailure {
    pub line: usize,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub attempted: usize,
    pub loaded: usize,
    pub failures: Vec<RowFailure>,
    /// Error that moved the load from bulk to row-by-row mode.
    pub bulk_error: Option<String>,
}

impl LoadReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn fell_back(&self) -> bool {
        self.bulk_error.is_some()
    }
}

/// Inserts `rows` with `query`, falling back to per-row statements when the
/// bulk attempt fails. Only savepoint bookkeeping errors are fatal.
pub fn load_rows(
    tx: &mut dyn Transaction,
    query: &InsertQuery,
    rows: &[Row],
    page_size: usize,
) -> Result<LoadReport, LoadError> {
    let mut report = LoadReport {
        attempted: rows.len(),
        ..LoadReport::default()
    };
    if rows.is_empty() {
        debug!("No rows to insert");
        return Ok(report);
    }

    savepoint(tx, BULK_SAVEPOINT)?;
    match bulk_insert(tx, query, rows, page_size.max(1)) {
        Ok(()) => {
            release(tx, BULK_SAVEPOINT)?;
            report.loaded = rows.len();
            debug!("Bulk insert of {} row(s) succeeded", rows.len());
            return Ok(report);
        }
        Err(err) => {
            rollback_to(tx, BULK_SAVEPOINT)?;
            warn!("Bulk insert failed: {err:#}");
            info!("Falling back to row-by-row insertion");
            report.bulk_error = Some(format!("{err:#}"));
        }
    }

    let sql = query.sql(1);
    for row in rows {
        savepoint(tx, ROW_SAVEPOINT)?;
        match tx.execute(&sql, &row.values) {
            Ok(_) => {
                release(tx, ROW_SAVEPOINT)?;
                report.loaded += 1;
            }
            Err(err) => {
                rollback_to(tx, ROW_SAVEPOINT)?;
                warn!("Row {} rejected: {:?}\n   cause: {err:#}", row.line_number(), row.values);
                report.failures.push(RowFailure {
                    line: row.line_number(),
                    error: format!("{err:#}"),
                });
            }
        }
    }
    info!("Row-by-row insertion finished with {} failed row(s)", report.failed());
    Ok(report)
}

fn bulk_insert(
    tx: &mut dyn Transaction,
    query: &InsertQuery,
    rows: &[Row],
    page_size: usize,
) -> Result<()> {
    for page in rows.chunks(page_size) {
        let params = page
            .iter()
            .flat_map(|row| row.values.iter().cloned())
            .collect::<Vec<Value>>();
        tx.execute(&query.sql(page.len()), &params)?;
    }
    Ok(())
}

fn savepoint(tx: &mut dyn Transaction, name: &str) -> Result<(), LoadError> {
    tx.batch(&format!("SAVEPOINT {name}"))
        .map_err(LoadError::database)
}

fn release(tx: &mut dyn Transaction, name: &str) -> Result<(), LoadError> {
    tx.batch(&format!("RELEASE SAVEPOINT {name}"))
        .map_err(LoadError::database)
}

fn rollback_to(tx: &mut dyn Transaction, name: &str) -> Result<(), LoadError> {
    tx.batch(&format!("ROLLBACK TO SAVEPOINT {name}"))
        .map_err(LoadError::database)?;
    release(tx, name)
}

#[cfg(test)]
mod tests {
    use anyhow::bail;

    use super::*;
    use crate::query::Dialect;

    /// Records statements and fails any execute whose parameters contain a
    /// poisoned value.
    #[derive(Default)]
    struct ScriptedTransaction {
        statements: Vec<String>,
        inserted: Vec<Vec<Value>>,
        poison: Option<Value>,
    }

    impl Transaction for ScriptedTransaction {
        fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
            self.statements.push(sql.to_string());
            if let Some(poison) = &self.poison {
                if params.contains(poison) {
                    bail!("constraint violated by {poison}");
                }
            }
            self.inserted.push(params.to_vec());
            Ok(1)
        }

        fn batch(&mut self, sql: &str) -> Result<()> {
            self.statements.push(sql.to_string());
            Ok(())
        }

        fn commit(self: Box<Self>) -> Result<()> {
            Ok(())
        }

        fn rollback(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    fn rows(count: usize) -> Vec<Row> {
        (0..count)
            .map(|index| Row {
                index,
                values: vec![Value::Integer(index as i64)],
            })
            .collect()
    }

    fn query() -> InsertQuery {
        InsertQuery::new(Dialect::Sqlite, "t", &["id".to_string()], &[]).unwrap()
    }

    #[test]
    fn bulk_path_pages_rows_inside_one_savepoint() {
        let mut tx = ScriptedTransaction::default();
        let report = load_rows(&mut tx, &query(), &rows(5), 2).unwrap();

        assert_eq!(report.loaded, 5);
        assert!(!report.fell_back());
        assert_eq!(tx.statements.first().unwrap(), "SAVEPOINT dsload_bulk");
        assert_eq!(tx.statements.last().unwrap(), "RELEASE SAVEPOINT dsload_bulk");
        let inserts = tx
            .statements
            .iter()
            .filter(|s| s.starts_with("INSERT"))
            .count();
        assert_eq!(inserts, 3);
    }

    #[test]
    fn row_fallback_isolates_the_failing_row() {
        let mut tx = ScriptedTransaction {
            poison: Some(Value::Integer(2)),
            ..ScriptedTransaction::default()
        };
        let report = load_rows(&mut tx, &query(), &rows(4), 100).unwrap();

        assert!(report.fell_back());
        assert_eq!(report.attempted, 4);
        assert_eq!(report.loaded, 3);
        assert_eq!(
            report.failures,
            vec![RowFailure {
                line: 4,
                error: "constraint violated by 2".to_string()
            }]
        );
        assert!(tx
            .statements
            .contains(&"ROLLBACK TO SAVEPOINT dsload_bulk".to_string()));
        assert_eq!(tx.inserted.len(), 3);
    }

    #[test]
    fn empty_input_issues_no_statements() {
        let mut tx = ScriptedTransaction::default();
        let report = load_rows(&mut tx, &query(), &[], 100).unwrap();
        assert_eq!(report, LoadReport::default());
        assert!(tx.statements.is_empty());
    }
}
