#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use dsload::config::{Pacing, PipelineConfig};
use dsload::registry::TableDescriptor;
use dsload::store::SqliteStore;
use rusqlite::Connection;
use tempfile::{TempDir, tempdir};

/// Destination tables mirroring the warehouse layout, without the `ds` schema.
pub const WAREHOUSE_SCHEMA: &str = "
CREATE TABLE ft_balance_f (
    on_date TEXT NOT NULL,
    account_rk INTEGER NOT NULL,
    currency_rk INTEGER NOT NULL,
    balance_out REAL,
    PRIMARY KEY (on_date, account_rk)
);
CREATE TABLE ft_posting_f (
    oper_date TEXT NOT NULL,
    credit_account_rk INTEGER,
    debet_account_rk INTEGER,
    credit_amount REAL,
    debet_amount REAL
);
CREATE TABLE md_account_d (
    data_actual_date TEXT NOT NULL,
    data_actual_end_date TEXT NOT NULL,
    account_rk INTEGER NOT NULL,
    account_number VARCHAR(20),
    char_type TEXT,
    currency_rk INTEGER,
    currency_code TEXT,
    PRIMARY KEY (data_actual_date, account_rk)
);
CREATE TABLE md_currency_d (
    currency_rk INTEGER NOT NULL,
    data_actual_date TEXT NOT NULL,
    currency_code TEXT,
    code_iso_char TEXT,
    PRIMARY KEY (currency_rk, data_actual_date)
);
CREATE TABLE md_exchange_rate_d (
    data_actual_date TEXT NOT NULL,
    currency_rk INTEGER NOT NULL,
    reduced_cource REAL,
    code_iso_num TEXT,
    PRIMARY KEY (data_actual_date, currency_rk)
);
CREATE TABLE md_ledger_account_s (
    ledger_account INTEGER NOT NULL,
    start_date TEXT NOT NULL,
    chapter TEXT,
    ledger_account_name TEXT,
    PRIMARY KEY (ledger_account, start_date)
);
CREATE TABLE etl_log (
    table_name TEXT,
    start_time TEXT,
    end_time TEXT,
    row_count INTEGER,
    status TEXT,
    message TEXT
);
";

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` as UTF-8 into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents).expect("write temp file contents");
        path
    }

    pub fn audit_log(&self) -> PathBuf {
        self.path().join("logs").join("bad_rows.log")
    }

    pub fn read_audit_log(&self) -> String {
        fs::read_to_string(self.audit_log()).unwrap_or_default()
    }

    /// Pipeline config writing audit entries into this workspace, without pauses.
    pub fn config(&self, tables: Vec<TableDescriptor>) -> PipelineConfig {
        PipelineConfig {
            audit_log: self.audit_log(),
            log_table: "etl_log".to_string(),
            pacing: Pacing::disabled(),
            tables,
            ..PipelineConfig::default()
        }
    }
}

pub fn create_warehouse(conn: &Connection) {
    conn.execute_batch(WAREHOUSE_SCHEMA)
        .expect("create warehouse tables");
}

pub fn warehouse_store() -> SqliteStore {
    let store = SqliteStore::in_memory().expect("in-memory sqlite");
    create_warehouse(store.connection());
    store
}

pub fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .expect("count rows")
}

/// `(table_name, status, row_count, message)` for every load log entry, in insertion order.
pub fn load_log(conn: &Connection) -> Vec<(String, String, i64, String)> {
    let mut stmt = conn
        .prepare("SELECT table_name, status, row_count, message FROM etl_log ORDER BY rowid")
        .expect("prepare load log query");
    let entries = stmt
        .query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })
        .expect("query load log")
        .collect::<Result<Vec<_>, _>>()
        .expect("read load log");
    entries
}
