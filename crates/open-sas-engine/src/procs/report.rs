//! Plain-text report layout shared by the built-in procedures.

use crate::table::{format_number, ColumnData, ValueKind};

/// One column of a report.
pub(crate) struct ReportColumn {
    pub header: String,
    pub cells: Vec<String>,
    pub right: bool,
}

impl ReportColumn {
    pub fn new(header: impl Into<String>, cells: Vec<String>, right: bool) -> Self {
        Self { header: header.into(), cells, right }
    }

    /// Cells of a table column: numbers right-aligned, missing numbers as `.`
    /// and missing text as blank.
    pub fn from_data(header: &str, data: &ColumnData, rows: usize) -> Self {
        let cells = (0..rows).map(|row| cell_text(data, row)).collect();
        Self::new(header, cells, data.kind() == ValueKind::Numeric)
    }
}

/// Display text of one cell.
pub(crate) fn cell_text(data: &ColumnData, row: usize) -> String {
    match data {
        ColumnData::Numeric(v) => match v.get(row).copied().flatten() {
            Some(n) => format_number(n),
            None => ".".to_string(),
        },
        ColumnData::Text(v) => v.get(row).cloned().flatten().unwrap_or_default(),
    }
}

/// Fixed-decimal text for statistics; missing prints as `.`.
pub(crate) fn stat_text(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(n) => format!("{n:.decimals$}"),
        None => ".".to_string(),
    }
}

/// Lay out columns as a header line, a rule, and one line per row.
pub(crate) fn render(columns: &[ReportColumn]) -> Vec<String> {
    let rows = columns.iter().map(|c| c.cells.len()).max().unwrap_or(0);
    let widths: Vec<usize> = columns
        .iter()
        .map(|c| {
            c.cells
                .iter()
                .map(|s| s.chars().count())
                .chain(std::iter::once(c.header.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |texts: Vec<&str>| -> String {
        let cells: Vec<String> = texts
            .iter()
            .zip(columns.iter().zip(&widths))
            .map(|(text, (col, &width))| {
                if col.right {
                    format!("{text:>width$}")
                } else {
                    format!("{text:<width$}")
                }
            })
            .collect();
        cells.join("  ").trim_end().to_string()
    };

    let mut out = Vec::with_capacity(rows + 2);
    out.push(line(columns.iter().map(|c| c.header.as_str()).collect()));
    out.push("-".repeat(widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1)));
    for row in 0..rows {
        out.push(line(
            columns
                .iter()
                .map(|c| c.cells.get(row).map_or("", String::as_str))
                .collect(),
        ));
    }
    out
}
