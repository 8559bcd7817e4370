//! INSERT / upsert statement construction.

use itertools::Itertools;

use crate::error::LoadError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    pub fn placeholder(self, position: usize) -> String {
        match self {
            Dialect::Postgres => format!("${position}"),
            Dialect::Sqlite => format!("?{position}"),
        }
    }
}

pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quotes each dot-separated part of a possibly schema-qualified name.
pub fn quote_table(name: &str) -> String {
    name.split('.').map(quote_ident).join(".")
}

pub fn delete_all_sql(table: &str) -> String {
    format!("DELETE FROM {}", quote_table(table))
}

/// Statement shape for one destination table; renders SQL for any row count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertQuery {
    dialect: Dialect,
    head: String,
    conflict: Option<String>,
    width: usize,
}

impl InsertQuery {
    /// Upsert when `keys` is non-empty, plain insert otherwise.
    pub fn new(
        dialect: Dialect,
        table: &str,
        columns: &[String],
        keys: &[String],
    ) -> Result<Self, LoadError> {
        let missing = keys
            .iter()
            .filter(|key| !columns.contains(key))
            .cloned()
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(LoadError::MissingColumns {
                table: table.to_string(),
                missing,
            });
        }
        let head = format!(
            "INSERT INTO {} ({})",
            quote_table(table),
            columns.iter().map(|c| quote_ident(c)).join(", ")
        );
        let conflict = if keys.is_empty() {
            None
        } else {
            let updates = columns
                .iter()
                .filter(|column| !keys.contains(column))
                .map(|column| {
                    let quoted = quote_ident(column);
                    format!("{quoted} = EXCLUDED.{quoted}")
                })
                .collect::<Vec<_>>();
            let action = if updates.is_empty() {
                "DO NOTHING".to_string()
            } else {
                format!("DO UPDATE SET {}", updates.join(", "))
            };
            Some(format!(
                "ON CONFLICT ({}) {action}",
                keys.iter().map(|k| quote_ident(k)).join(", ")
            ))
        };
        Ok(Self {
            dialect,
            head,
            conflict,
            width: columns.len(),
        })
    }

    pub fn is_upsert(&self) -> bool {
        self.conflict.is_some()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// SQL inserting `rows` rows; parameters are numbered row-major from 1.
    pub fn sql(&self, rows: usize) -> String {
        let tuples = (0..rows)
            .map(|row| {
                let placeholders = (1..=self.width)
                    .map(|col| self.dialect.placeholder(row * self.width + col))
                    .join(", ");
                format!("({placeholders})")
            })
            .join(", ");
        match &self.conflict {
            Some(conflict) => format!("{} VALUES {tuples} {conflict}", self.head),
            None => format!("{} VALUES {tuples}", self.head),
        }
    }
}
