//! Pipeline configuration: YAML persistence and the built-in defaults.

use std::{
    collections::HashSet,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, anyhow, ensure};
use serde::{Deserialize, Serialize};

use crate::{
    cli::parse_delimiter,
    io_utils::{DEFAULT_ENCODINGS, resolve_encodings},
    loader::DEFAULT_PAGE_SIZE,
    registry::{TableDescriptor, default_tables},
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Pacing {
    pub before_load_ms: u64,
    pub after_load_ms: u64,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            before_load_ms: 5_000,
            after_load_ms: 2_000,
        }
    }
}

impl Pacing {
    pub fn disabled() -> Self {
        Self {
            before_load_ms: 0,
            after_load_ms: 0,
        }
    }

    pub fn before_load(&self) -> Duration {
        Duration::from_millis(self.before_load_ms)
    }

    pub fn after_load(&self) -> Duration {
        Duration::from_millis(self.after_load_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    pub delimiter: String,
    pub encodings: Vec<String>,
    pub audit_log: PathBuf,
    pub log_table: String,
    pub page_size: usize,
    pub pacing: Pacing,
    pub tables: Vec<TableDescriptor>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            delimiter: ";".to_string(),
            encodings: DEFAULT_ENCODINGS.iter().map(|e| e.to_string()).collect(),
            audit_log: PathBuf::from("logs").join("bad_rows.log"),
            log_table: "logs.etl_log".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            pacing: Pacing::default(),
            tables: default_tables(),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let config: PipelineConfig = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing config YAML {path:?}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating config file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing config YAML")
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Serializing config YAML")
    }

    pub fn validate(&self) -> Result<()> {
        self.delimiter_byte()?;
        resolve_encodings(&self.encodings)?;
        ensure!(self.page_size > 0, "page_size must be at least 1");
        ensure!(!self.log_table.trim().is_empty(), "log_table must not be empty");
        let mut seen = HashSet::new();
        for table in &self.tables {
            ensure!(
                seen.insert(table.name.as_str()),
                "Table '{}' is configured more than once",
                table.name
            );
        }
        Ok(())
    }

    pub fn delimiter_byte(&self) -> Result<u8> {
        parse_delimiter(&self.delimiter).map_err(|err| anyhow!("Invalid delimiter: {err}"))
    }

    pub fn table(&self, name: &str) -> Option<&TableDescriptor> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Resolves relative table paths against `data_dir`.
    pub fn rebase_paths(&mut self, data_dir: &Path) {
        for table in &mut self.tables {
            if table.path.is_relative() {
                table.path = data_dir.join(&table.path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::registry::Validation;

    #[test]
    fn default_config_matches_the_warehouse_deployment() {
        let config = PipelineConfig::default();
        assert_eq!(config.delimiter_byte().unwrap(), b';');
        assert_eq!(config.log_table, "logs.etl_log");
        assert_eq!(config.tables.len(), 6);
        assert_eq!(config.pacing.before_load(), Duration::from_secs(5));
        assert_eq!(config.pacing.after_load(), Duration::from_secs(2));
        config.validate().unwrap();
    }

    #[test]
    fn partial_yaml_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pipeline.yml");
        std::fs::write(
            &path,
            "log_table: etl_log\npacing:\n  before_load_ms: 0\ntables:\n  - name: rates\n    path: rates.csv\n    keys: [data_actual_date, currency_rk]\n    validation: exchange-rate\n",
        )
        .unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.log_table, "etl_log");
        assert_eq!(config.pacing.before_load_ms, 0);
        assert_eq!(config.pacing.after_load_ms, 2_000);
        assert_eq!(config.encodings.len(), 3);
        let rates = config.table("rates").unwrap();
        assert_eq!(rates.validation, Some(Validation::ExchangeRate));
    }

    #[test]
    fn validate_rejects_duplicates_and_bad_settings() {
        let mut config = PipelineConfig::default();
        config.tables.push(config.tables[0].clone());
        assert!(config.validate().is_err());

        let config = PipelineConfig {
            encodings: vec!["ebcdic-martian".into()],
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());

        let config = PipelineConfig {
            delimiter: ";;".into(),
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rebase_paths_only_touches_relative_paths() {
        let mut config = PipelineConfig::default();
        config.tables[0].path = PathBuf::from("/srv/extract/balance.csv");
        config.rebase_paths(Path::new("/data"));
        assert_eq!(config.tables[0].path, PathBuf::from("/srv/extract/balance.csv"));
        assert_eq!(
            config.tables[1].path,
            PathBuf::from("/data/data/ft_posting_f.csv")
        );
    }

    #[test]
    fn save_and_load_preserve_tables() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pipeline.yml");
        let config = PipelineConfig::default();
        config.save(&path).unwrap();
        assert_eq!(PipelineConfig::load(&path).unwrap(), config);
    }
}
