//! File input for the loader: encoding resolution and the encoding-resilient
//! dataset reader.
//!
//! Source extracts come from several producers and carry no reliable encoding
//! marker. [`read_dataset`] reads the bytes once and tries each configured
//! encoding in priority order, decoding strictly so that the first encoding
//! able to represent the whole file wins.

use std::{fs, io::Read, path::Path};

use anyhow::{Result, anyhow};
use encoding_rs::Encoding;
use itertools::Itertools;
use log::{debug, info};

use crate::{
    data::Value,
    dataset::{Dataset, Row},
    error::LoadError,
};

pub const DEFAULT_DELIMITER: u8 = b';';
pub const DEFAULT_ENCODINGS: &[&str] = &["utf-8", "windows-1251", "iso-8859-1"];

const BYTE_ORDER_MARK: char = '\u{feff}';

pub fn resolve_encoding(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| anyhow!("Unknown encoding '{label}'"))
}

pub fn resolve_encodings<S: AsRef<str>>(labels: &[S]) -> Result<Vec<&'static Encoding>> {
    if labels.is_empty() {
        return Err(anyhow!("At least one input encoding must be configured"));
    }
    labels
        .iter()
        .map(|label| resolve_encoding(label.as_ref()))
        .collect()
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(false);
    builder.from_reader(reader)
}

/// Decodes without replacement characters; `None` means the bytes are not
/// valid in `encoding`.
pub fn decode_strict(bytes: &[u8], encoding: &'static Encoding) -> Option<String> {
    let text = encoding.decode_without_bom_handling_and_without_replacement(bytes)?;
    let text = text.strip_prefix(BYTE_ORDER_MARK).unwrap_or(&text);
    Some(text.to_string())
}

/// Reads a delimited file with a header row, trying `encodings` in order.
pub fn read_dataset(
    path: &Path,
    delimiter: u8,
    encodings: &[&'static Encoding],
) -> Result<Dataset, LoadError> {
    let bytes = fs::read(path).map_err(|err| LoadError::Read {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    for &encoding in encodings {
        match decode_strict(&bytes, encoding) {
            Some(text) => {
                info!("Decoded {:?} as {}", path, encoding.name());
                return parse_text(path, &text, delimiter, encoding);
            }
            None => debug!("{:?} is not valid {}", path, encoding.name()),
        }
    }
    Err(LoadError::Decode {
        path: path.to_path_buf(),
        tried: encodings.iter().map(|e| e.name()).join(", "),
    })
}

fn parse_text(
    path: &Path,
    text: &str,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<Dataset, LoadError> {
    let read_error = |message: String| LoadError::Read {
        path: path.to_path_buf(),
        message,
    };
    if text.trim().is_empty() {
        return Err(read_error("file is empty".to_string()));
    }
    let mut reader = open_csv_reader(text.as_bytes(), delimiter);
    let headers = reader
        .headers()
        .map_err(|err| read_error(err.to_string()))?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let mut dataset = Dataset::new(headers, encoding);
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|err| read_error(format!("row {}: {err}", index + 2)))?;
        let values = record
            .iter()
            .map(|field| {
                if field.is_empty() {
                    Value::Null
                } else {
                    Value::String(field.to_string())
                }
            })
            .collect();
        dataset.rows.push(Row { index, values });
    }
    debug!(
        "Parsed {} row(s) across {} column(s) from {:?}",
        dataset.len(),
        dataset.columns.len(),
        path
    );
    Ok(dataset)
}
