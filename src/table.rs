//! Plain-text rendering of the end-of-run load summary.

use std::borrow::Cow;
use std::fmt::Write as _;

use crate::pipeline::LoadOutcome;

const SUMMARY_HEADERS: [&str; 6] = ["table", "status", "rows", "failed", "duration", "message"];

pub fn render_outcomes(outcomes: &[LoadOutcome]) -> String {
    let headers = SUMMARY_HEADERS.map(str::to_string);
    let rows = outcomes
        .iter()
        .map(|outcome| {
            let entry = &outcome.entry;
            let failed = outcome
                .stats
                .as_ref()
                .map(|stats| stats.report.failed())
                .unwrap_or_default();
            let elapsed = entry.end_time - entry.start_time;
            vec![
                entry.table.clone(),
                entry.status.to_string(),
                entry.row_count.to_string(),
                failed.to_string(),
                format!("{:.1}s", elapsed.num_milliseconds() as f64 / 1000.0),
                entry.message.clone(),
            ]
        })
        .collect::<Vec<_>>();
    render_table(&headers, &rows)
}

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));

    let separator = widths
        .iter()
        .map(|w| "-".repeat((*w).max(3)))
        .collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator, &widths));

    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let mut line = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let sanitized = sanitize_cell(value);
            let padding = width.saturating_sub(display_width(&sanitized));
            format!("{sanitized}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join("  ");
    while line.ends_with(' ') {
        line.pop();
    }
    line
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
