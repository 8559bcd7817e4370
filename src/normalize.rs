//! Column-name and date normalization applied to every dataset before
//! table-specific validation.
//!
//! Any column whose name contains `date` is treated as a required date column.
//! This is a naming heuristic rather than a schema: values are parsed day-first
//! and rows whose date does not parse are dropped.

use log::debug;

use crate::{
    data::{Value, is_null_sentinel, normalize_column_name, parse_day_first_date},
    dataset::Dataset,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeSummary {
    pub date_columns: Vec<String>,
    pub dropped_rows: usize,
}

pub fn is_date_column(name: &str) -> bool {
    name.to_lowercase().contains("date")
}

pub fn normalize(dataset: &mut Dataset) -> NormalizeSummary {
    for column in &mut dataset.columns {
        *column = normalize_column_name(column);
    }
    let date_indices = dataset
        .columns
        .iter()
        .enumerate()
        .filter(|(_, name)| is_date_column(name))
        .map(|(idx, _)| idx)
        .collect::<Vec<_>>();

    for row in &mut dataset.rows {
        for (idx, value) in row.values.iter_mut().enumerate() {
            let replacement = match value {
                Value::String(raw) if date_indices.contains(&idx) => {
                    parse_day_first_date(raw).map_or(Value::Null, Value::Date)
                }
                Value::String(raw) if is_null_sentinel(raw) => Value::Null,
                _ => continue,
            };
            *value = replacement;
        }
    }

    let before = dataset.rows.len();
    dataset.rows.retain(|row| {
        date_indices
            .iter()
            .all(|idx| row.values.get(*idx).is_some_and(|v| !v.is_null()))
    });
    let dropped_rows = before - dataset.rows.len();
    if dropped_rows > 0 {
        debug!("Dropped {dropped_rows} row(s) with missing or unparsable dates");
    }

    NormalizeSummary {
        date_columns: date_indices
            .iter()
            .map(|idx| dataset.columns[*idx].clone())
            .collect(),
        dropped_rows,
    }
}
