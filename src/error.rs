use std::path::PathBuf;

use thiserror::Error;

/// Failures that abort a single table load.
///
/// Row-level problems never surface here: rejected rows go to the audit log and
/// failed inserts are counted by the loader.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not decode {path:?} with any of the configured encodings ({tried})")]
    Decode { path: PathBuf, tried: String },
    #[error("failed to read {path:?}: {message}")]
    Read { path: PathBuf, message: String },
    #[error("missing columns in {table}: {}", missing.join(", "))]
    MissingColumns { table: String, missing: Vec<String> },
    #[error("database error: {0}")]
    Database(String),
}

impl LoadError {
    pub fn database(err: anyhow::Error) -> Self {
        LoadError::Database(format!("{err:#}"))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LoadError::Decode { .. } => "decode",
            LoadError::Read { .. } => "read",
            LoadError::MissingColumns { .. } => "schema",
            LoadError::Database(_) => "database",
        }
    }
}
