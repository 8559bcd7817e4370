//! Table-load orchestration.
//!
//! For every configured table: read, normalize, validate and coerce the
//! extract, then apply it inside one transaction and record a load log entry.
//! A failing table is rolled back and logged; the next table is still loaded.

use std::{mem, thread, time::Duration};

use anyhow::{Result, anyhow};
use chrono::{Local, NaiveDateTime};
use encoding_rs::Encoding;
use log::{debug, error, info, warn};

use crate::{
    audit::AuditLog,
    config::PipelineConfig,
    data::{Value, coerce_value},
    dataset::{Dataset, Row},
    error::LoadError,
    io_utils::{read_dataset, resolve_encodings},
    loader::{LoadReport, load_rows},
    normalize::normalize,
    query::{InsertQuery, delete_all_sql},
    registry::TableDescriptor,
    store::{LoadLogEntry, LoadStatus, Store, Transaction},
};

/// Counts gathered while preparing and applying one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableStats {
    pub rows_read: usize,
    pub dropped_for_dates: usize,
    pub duplicates_removed: usize,
    pub quarantined: usize,
    pub replaced: Option<u64>,
    pub report: LoadReport,
}

impl TableStats {
    pub fn summary(&self, audit: &AuditLog) -> String {
        let mut parts = Vec::new();
        if self.dropped_for_dates > 0 {
            parts.push(format!(
                "{} row(s) dropped for missing dates",
                self.dropped_for_dates
            ));
        }
        if self.duplicates_removed > 0 {
            parts.push(format!(
                "{} duplicate row(s) removed",
                self.duplicates_removed
            ));
        }
        if self.quarantined > 0 {
            parts.push(format!(
                "{} row(s) quarantined to {}",
                self.quarantined,
                audit.path().display()
            ));
        }
        if let Some(deleted) = self.replaced {
            parts.push(format!("{deleted} existing row(s) replaced"));
        }
        if self.report.fell_back() {
            parts.push(format!(
                "bulk insert failed, {} row(s) rejected in row mode",
                self.report.failed()
            ));
        }
        parts.join("; ")
    }
}

#[derive(Debug)]
pub struct LoadOutcome {
    pub entry: LoadLogEntry,
    pub stats: Option<TableStats>,
    pub error: Option<LoadError>,
}

impl LoadOutcome {
    pub fn is_success(&self) -> bool {
        self.entry.status == LoadStatus::Success
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    delimiter: u8,
    encodings: Vec<&'static Encoding>,
    audit: AuditLog,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let delimiter = config.delimiter_byte()?;
        let encodings = resolve_encodings(&config.encodings)?;
        let audit = AuditLog::new(config.audit_log.clone());
        Ok(Self {
            config,
            delimiter,
            encodings,
            audit,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Loads every configured table in order.
    pub fn run(&self, store: &mut dyn Store) -> Vec<LoadOutcome> {
        let mut outcomes = Vec::with_capacity(self.config.tables.len());
        for table in &self.config.tables {
            info!("Loading {}...", table.name);
            outcomes.push(self.load_table(store, table));
        }
        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        info!(
            "Load finished: {} table(s) succeeded, {} failed",
            outcomes.len() - failed,
            failed
        );
        outcomes
    }

    pub fn run_table(&self, store: &mut dyn Store, name: &str) -> Result<LoadOutcome> {
        let table = self
            .config
            .table(name)
            .ok_or_else(|| anyhow!("Table '{name}' is not configured"))?;
        Ok(self.load_table(store, table))
    }

    pub fn load_table(&self, store: &mut dyn Store, table: &TableDescriptor) -> LoadOutcome {
        let start_time = now();
        info!(
            "Starting load of {} ({}) at {}",
            table.name,
            table.mode(),
            start_time.format("%H:%M:%S")
        );
        pause(self.config.pacing.before_load());

        let result = self
            .prepare(table)
            .and_then(|(dataset, stats)| self.apply(store, table, &dataset, stats));
        pause(self.config.pacing.after_load());
        let end_time = now();

        let outcome = match result {
            Ok(stats) => {
                info!(
                    "Loaded {} of {} row(s) into {}",
                    stats.report.loaded, stats.rows_read, table.name
                );
                LoadOutcome {
                    entry: LoadLogEntry {
                        table: table.name.clone(),
                        start_time,
                        end_time,
                        row_count: stats.report.loaded as i64,
                        status: LoadStatus::Success,
                        message: stats.summary(&self.audit),
                    },
                    stats: Some(stats),
                    error: None,
                }
            }
            Err(err) => {
                error!("Load of {} failed ({} error): {err}", table.name, err.kind());
                LoadOutcome {
                    entry: LoadLogEntry {
                        table: table.name.clone(),
                        start_time,
                        end_time,
                        row_count: 0,
                        status: LoadStatus::Failure,
                        message: err.to_string(),
                    },
                    stats: None,
                    error: Some(err),
                }
            }
        };

        if let Err(err) = store.record_load(&self.config.log_table, &outcome.entry) {
            error!("Could not record load log entry for {}: {err:#}", table.name);
        }
        outcome
    }

    fn prepare(&self, table: &TableDescriptor) -> Result<(Dataset, TableStats), LoadError> {
        let mut dataset = read_dataset(&table.path, self.delimiter, &self.encodings)?;
        let mut stats = TableStats {
            rows_read: dataset.len(),
            ..TableStats::default()
        };

        let normalized = normalize(&mut dataset);
        stats.dropped_for_dates = normalized.dropped_rows;
        if normalized.dropped_rows > 0 {
            warn!(
                "Dropped {} row(s) of {} with missing or unparsable values in {:?}",
                normalized.dropped_rows, table.name, normalized.date_columns
            );
        }

        if let Some(validation) = table.validation {
            let summary = validation.apply(&table.name, &mut dataset, &self.audit)?;
            stats.duplicates_removed = summary.duplicates_removed;
            stats.quarantined = summary.quarantined;
        }

        coerce_rows(&mut dataset.rows);
        Ok((dataset, stats))
    }

    fn apply(
        &self,
        store: &mut dyn Store,
        table: &TableDescriptor,
        dataset: &Dataset,
        mut stats: TableStats,
    ) -> Result<TableStats, LoadError> {
        let query = InsertQuery::new(store.dialect(), &table.name, &dataset.columns, &table.keys)?;
        let mut tx = store.begin().map_err(LoadError::database)?;
        match self.write(&mut *tx, table, &query, &dataset.rows, &mut stats) {
            Ok(()) => {
                tx.commit().map_err(LoadError::database)?;
                Ok(stats)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!("Rollback of {} failed: {rollback_err:#}", table.name);
                }
                Err(err)
            }
        }
    }

    fn write(
        &self,
        tx: &mut dyn Transaction,
        table: &TableDescriptor,
        query: &InsertQuery,
        rows: &[Row],
        stats: &mut TableStats,
    ) -> Result<(), LoadError> {
        if table.is_full_replace() {
            let deleted = tx
                .execute(&delete_all_sql(&table.name), &[])
                .map_err(LoadError::database)?;
            info!("Deleted {deleted} existing row(s) from {}", table.name);
            stats.replaced = Some(deleted);
        }
        stats.report = load_rows(tx, query, rows, self.config.page_size)?;
        Ok(())
    }
}

fn coerce_rows(rows: &mut [Row]) {
    for row in rows {
        for value in &mut row.values {
            *value = coerce_value(mem::replace(value, Value::Null));
        }
    }
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        debug!("Pausing for {duration:?}");
        thread::sleep(duration);
    }
}
