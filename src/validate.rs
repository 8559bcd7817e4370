//! Table-specific validation rules.
//!
//! Schema problems (a required column is absent) fail the whole table. Row
//! problems quarantine the row: it is written to the audit log, removed from
//! the dataset and the load carries on.

use std::collections::HashSet;

use log::{info, warn};

use crate::{
    audit::{AuditLog, BadRow},
    data::{Value, coerce_value},
    dataset::{Dataset, Row},
    error::LoadError,
    registry::Validation,
};

const EXCHANGE_RATE_KEY: [&str; 2] = ["data_actual_date", "currency_rk"];
const CURRENCY_CODE: &str = "currency_code";
const ISO_CHAR_CODE: &str = "code_iso_char";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationSummary {
    pub duplicates_removed: usize,
    pub quarantined: usize,
}

impl Validation {
    pub fn apply(
        self,
        table: &str,
        dataset: &mut Dataset,
        audit: &AuditLog,
    ) -> Result<ValidationSummary, LoadError> {
        match self {
            Validation::ExchangeRate => dedupe_exchange_rates(table, dataset),
            Validation::CurrencyMetadata => Ok(quarantine_bad_currencies(table, dataset, audit)),
        }
    }
}

fn dedupe_exchange_rates(
    table: &str,
    dataset: &mut Dataset,
) -> Result<ValidationSummary, LoadError> {
    let missing = dataset.missing_columns(&EXCHANGE_RATE_KEY);
    if !missing.is_empty() {
        return Err(LoadError::MissingColumns {
            table: table.to_string(),
            missing,
        });
    }
    let key_indices = EXCHANGE_RATE_KEY
        .iter()
        .filter_map(|name| dataset.column_index(name))
        .collect::<Vec<_>>();

    let mut seen = HashSet::new();
    let before = dataset.rows.len();
    dataset.rows.retain(|row| {
        let key = key_indices
            .iter()
            .map(|idx| coerce_value(row.values[*idx].clone()).as_display())
            .collect::<Vec<_>>();
        seen.insert(key)
    });
    let duplicates_removed = before - dataset.rows.len();
    if duplicates_removed > 0 {
        info!("Removed {duplicates_removed} duplicate exchange-rate row(s) from {table}");
    }
    Ok(ValidationSummary {
        duplicates_removed,
        quarantined: 0,
    })
}

fn quarantine_bad_currencies(
    table: &str,
    dataset: &mut Dataset,
    audit: &AuditLog,
) -> ValidationSummary {
    let code_idx = dataset.column_index(CURRENCY_CODE);
    let iso_idx = dataset.column_index(ISO_CHAR_CODE);

    let mut rejected = Vec::new();
    for (position, row) in dataset.rows.iter_mut().enumerate() {
        let original = row.clone();
        let mut reasons = Vec::new();

        match code_idx.map(|idx| &row.values[idx]) {
            None | Some(Value::Null) => reasons.push(format!("{CURRENCY_CODE} is empty")),
            Some(code) if !code.is_numeric() => {
                reasons.push(format!("{CURRENCY_CODE} is not numeric: '{code}'"))
            }
            Some(_) => {}
        }

        match iso_idx {
            Some(idx) if !row.values[idx].is_null() => {
                let raw = row.values[idx].as_display();
                let reduced = reduce_iso_code(&raw);
                let length = reduced.chars().count();
                if length == 3 {
                    row.values[idx] = Value::String(reduced);
                } else {
                    reasons.push(format!(
                        "{ISO_CHAR_CODE} is invalid: '{raw}' -> '{reduced}' (length {length})"
                    ));
                }
            }
            _ => reasons.push(format!("{ISO_CHAR_CODE} is empty")),
        }

        if !reasons.is_empty() {
            rejected.push((position, original, reasons));
        }
    }

    for (_, row, reasons) in &rejected {
        let bad_row = bad_row(table, dataset, row, reasons.clone());
        if let Err(err) = audit.record(&bad_row) {
            warn!("Could not write audit entry for {table} row {}: {err:#}", row.line_number());
        }
    }
    let positions = rejected.iter().map(|(pos, _, _)| *pos).collect::<HashSet<_>>();
    let mut position = 0;
    dataset.rows.retain(|_| {
        let keep = !positions.contains(&position);
        position += 1;
        keep
    });

    if !rejected.is_empty() {
        warn!(
            "Discarded {} row(s) with invalid currency values from {table} (see {:?})",
            rejected.len(),
            audit.path()
        );
    }
    ValidationSummary {
        duplicates_removed: 0,
        quarantined: rejected.len(),
    }
}

/// Keeps alphabetic characters only, upper-cased.
pub fn reduce_iso_code(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphabetic())
        .flat_map(char::to_uppercase)
        .collect()
}

fn bad_row(table: &str, dataset: &Dataset, row: &Row, reasons: Vec<String>) -> BadRow {
    BadRow {
        table: table.to_string(),
        index: row.index,
        fields: dataset
            .row_fields(row)
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect(),
        reasons,
    }
}
