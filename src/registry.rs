//! Destination table descriptors.
//!
//! Each table carries its conflict key, an optional validation rule and an
//! optional pre-load action. The loader never branches on table names; it only
//! reads these descriptors.

use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Validation {
    /// Requires `data_actual_date` and `currency_rk`; deduplicates on the pair.
    ExchangeRate,
    /// Row-level checks of `currency_code` and `code_iso_char`.
    CurrencyMetadata,
}

impl Validation {
    /// Name as written in the pipeline YAML.
    pub fn as_str(self) -> &'static str {
        match self {
            Validation::ExchangeRate => "exchange-rate",
            Validation::CurrencyMetadata => "currency-metadata",
        }
    }
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PreLoad {
    /// Delete every existing row inside the load transaction.
    DeleteAll,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableDescriptor {
    pub name: String,
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<Validation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_load: Option<PreLoad>,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            keys: Vec::new(),
            validation: None,
            pre_load: None,
        }
    }

    pub fn with_keys(mut self, keys: &[&str]) -> Self {
        self.keys = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn with_validation(mut self, validation: Validation) -> Self {
        self.validation = Some(validation);
        self
    }

    pub fn with_pre_load(mut self, action: PreLoad) -> Self {
        self.pre_load = Some(action);
        self
    }

    pub fn is_upsert(&self) -> bool {
        !self.keys.is_empty()
    }

    pub fn is_full_replace(&self) -> bool {
        self.pre_load == Some(PreLoad::DeleteAll)
    }

    pub fn mode(&self) -> &'static str {
        match (self.is_full_replace(), self.is_upsert()) {
            (true, true) => "replace+upsert",
            (true, false) => "replace",
            (false, true) => "upsert",
            (false, false) => "insert",
        }
    }
}

/// The table set of the balance/posting warehouse feed, in load order.
pub fn default_tables() -> Vec<TableDescriptor> {
    vec![
        TableDescriptor::new("ds.ft_balance_f", "data/ft_balance_f.csv")
            .with_keys(&["on_date", "account_rk"]),
        TableDescriptor::new("ds.ft_posting_f", "data/ft_posting_f.csv")
            .with_pre_load(PreLoad::DeleteAll),
        TableDescriptor::new("ds.md_account_d", "data/md_account_d.csv")
            .with_keys(&["data_actual_date", "account_rk"]),
        TableDescriptor::new("ds.md_currency_d", "data/md_currency_d.csv")
            .with_keys(&["currency_rk", "data_actual_date"])
            .with_validation(Validation::CurrencyMetadata),
        TableDescriptor::new("ds.md_exchange_rate_d", "data/md_exchange_rate_d.csv")
            .with_keys(&["data_actual_date", "currency_rk"])
            .with_validation(Validation::ExchangeRate),
        TableDescriptor::new("ds.md_ledger_account_s", "data/md_ledger_account_s.csv")
            .with_keys(&["ledger_account", "start_date"]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tables_cover_the_feed_in_order() {
        let tables = default_tables();
        let names = tables.iter().map(|t| t.name.as_str()).collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "ds.ft_balance_f",
                "ds.ft_posting_f",
                "ds.md_account_d",
                "ds.md_currency_d",
                "ds.md_exchange_rate_d",
                "ds.md_ledger_account_s",
            ]
        );
    }

    #[test]
    fn posting_table_is_the_only_full_replace_table() {
        let replaced = default_tables()
            .into_iter()
            .filter(TableDescriptor::is_full_replace)
            .collect::<Vec<_>>();
        assert_eq!(replaced.len(), 1);
        assert_eq!(replaced[0].name, "ds.ft_posting_f");
        assert_eq!(replaced[0].mode(), "replace");
    }

    #[test]
    fn descriptors_round_trip_through_yaml_with_kebab_case_rules() {
        let descriptor = TableDescriptor::new("ds.md_currency_d", "data/md_currency_d.csv")
            .with_keys(&["currency_rk"])
            .with_validation(Validation::CurrencyMetadata);
        let yaml = serde_yaml::to_string(&descriptor).unwrap();
        assert!(yaml.contains("validation: currency-metadata"));
        assert!(!yaml.contains("pre_load"));
        let parsed: TableDescriptor = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, descriptor);
    }

    #[test]
    fn validation_display_matches_yaml_names() {
        for validation in [Validation::ExchangeRate, Validation::CurrencyMetadata] {
            let yaml = serde_yaml::to_string(&validation).unwrap();
            assert_eq!(yaml.trim(), validation.to_string());
        }
        assert_eq!(Validation::CurrencyMetadata.to_string(), "currency-metadata");
    }
}
