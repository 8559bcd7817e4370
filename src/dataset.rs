use encoding_rs::Encoding;

use crate::data::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Zero-based position among the data rows of the source file.
    pub index: usize,
    pub values: Vec<Value>,
}

impl Row {
    /// Line number in the source file, counting the header as line 1.
    pub fn line_number(&self) -> usize {
        self.index + 2
    }
}

/// In-memory table produced by the reader and refined by every later stage.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub encoding: &'static Encoding,
}

impl Dataset {
    pub fn new(columns: Vec<String>, encoding: &'static Encoding) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            encoding,
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn missing_columns(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|name| self.column_index(name).is_none())
            .map(|name| name.to_string())
            .collect()
    }

    /// Column name/value pairs for one row, in column order.
    pub fn row_fields<'a>(&'a self, row: &'a Row) -> impl Iterator<Item = (&'a str, &'a Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(row.values.iter())
    }
}

#[cfg(test)]
mod tests {
    use encoding_rs::UTF_8;

    use super::*;

    #[test]
    fn missing_columns_reports_only_absent_names() {
        let dataset = Dataset::new(vec!["a".into(), "b".into()], UTF_8);
        assert_eq!(dataset.missing_columns(&["a", "c"]), vec!["c".to_string()]);
        assert!(dataset.missing_columns(&["b"]).is_empty());
    }

    #[test]
    fn line_number_accounts_for_header() {
        let row = Row {
            index: 0,
            values: vec![Value::Null],
        };
        assert_eq!(row.line_number(), 2);
    }
}
