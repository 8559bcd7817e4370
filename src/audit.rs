//! Append-only audit trail for rows rejected by table validation.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use itertools::Itertools;

use crate::data::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct BadRow {
    pub table: String,
    /// Zero-based data-row index in the source file.
    pub index: usize,
    pub fields: Vec<(String, Value)>,
    pub reasons: Vec<String>,
}

impl BadRow {
    pub fn render(&self) -> String {
        let fields = self
            .fields
            .iter()
            .map(|(name, value)| format!("{name}: {value}"))
            .join(", ");
        format!(
            "[{}] row {}: {{{}}}\n   reasons: {}\n",
            self.table,
            self.index + 2,
            fields,
            self.reasons.join(", ")
        )
    }
}

#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self, bad_row: &BadRow) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Creating audit log directory {parent:?}"))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Opening audit log {:?}", self.path))?;
        file.write_all(bad_row.render().as_bytes())
            .with_context(|| format!("Writing audit log {:?}", self.path))
    }
}
