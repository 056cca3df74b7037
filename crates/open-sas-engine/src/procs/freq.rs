//! PROC FREQ.
//!
//! Each variable on a `TABLES` statement gets a one-way frequency table:
//! count, percent, cumulative count and cumulative percent per distinct
//! value, in sorted value order. Missing values are counted separately and
//! excluded from the percentages. Options after `/` are `NOCUM`,
//! `NOPERCENT` and `OUT=`; `OUT=` keeps the table of the last variable.

use crate::table::{Column, ColumnData, Table, Value};

use super::report::{render, stat_text, ReportColumn};
use super::request::parse_options;
use super::sort::{sorted_indices, SortKey};
use super::{resolve_columns, ProcError, ProcOutput, ProcRequest, ProcedureHandler};

/// The FREQ procedure.
#[derive(Debug, Clone, Copy, Default)]
pub struct Freq;

/// Counts for one distinct value.
#[derive(Debug, Clone, PartialEq)]
pub struct Level {
    pub value: Value,
    pub count: usize,
}

/// Distinct non-missing values of `column` with their counts, in sorted
/// order, plus the number of missing cells.
pub fn frequencies(table: &Table, column: &str) -> (Vec<Level>, usize) {
    let mut levels: Vec<Level> = Vec::new();
    let mut missing = 0;
    let key = [SortKey { column: column.to_string(), descending: false }];
    for row in sorted_indices(table, &key) {
        let value = table.value(row, column);
        if value.is_missing() {
            missing += 1;
            continue;
        }
        match levels.last_mut() {
            Some(level) if level.value == value => level.count += 1,
            _ => levels.push(Level { value, count: 1 }),
        }
    }
    (levels, missing)
}

impl ProcedureHandler for Freq {
    fn name(&self) -> &str {
        "FREQ"
    }

    fn execute(&self, input: &Table, request: &ProcRequest) -> Result<ProcOutput, ProcError> {
        let specs: Vec<&str> = request
            .statements
            .iter()
            .filter(|(k, _)| k == "TABLES" || k == "TABLE")
            .map(|(_, text)| text.as_str())
            .collect();
        if specs.is_empty() {
            return Err(ProcError::MissingStatement { procedure: "FREQ".into(), statement: "TABLES".into() });
        }

        let mut lines = Vec::new();
        let mut out_name = request.out.as_ref().map(ToString::to_string);
        let mut last_table = None;

        for spec in specs {
            let (vars_text, options_text) = spec.split_once('/').unwrap_or((spec, ""));
            let options = parse_options(options_text);
            if let Some(name) = options.get("OUT").filter(|n| !n.is_empty()) {
                out_name = Some(name.clone());
            }
            if vars_text.contains('*') {
                return Err(ProcError::Unsupported { procedure: "FREQ".into(), feature: "crosstabulation".into() });
            }
            let vars: Vec<String> = vars_text.split_whitespace().map(str::to_string).collect();
            for var in resolve_columns(input, &vars)? {
                let (levels, missing) = frequencies(input, &var);
                let show_cum = !options.contains_key("NOCUM");
                let show_pct = !options.contains_key("NOPERCENT");
                if !lines.is_empty() {
                    lines.push(String::new());
                }
                lines.push(format!("Frequency table for {var}"));
                lines.extend(report(input, &var, &levels, show_pct, show_cum));
                if missing > 0 {
                    lines.push(format!("Frequency Missing = {missing}"));
                }
                last_table = Some(output_table(input, &var, &levels));
            }
        }

        let output = ProcOutput::report(lines);
        match (out_name, last_table) {
            (Some(name), Some(table)) => Ok(output.with_table(Some(name), table)),
            _ => Ok(output),
        }
    }
}

fn percent(count: usize, total: usize) -> Option<f64> {
    (total > 0).then(|| count as f64 * 100.0 / total as f64)
}

fn report(input: &Table, var: &str, levels: &[Level], show_pct: bool, show_cum: bool) -> Vec<String> {
    let total: usize = levels.iter().map(|l| l.count).sum();
    let right = input.column(var).is_some_and(|c| c.kind() == crate::table::ValueKind::Numeric);
    let mut columns = vec![
        ReportColumn::new(var, levels.iter().map(|l| l.value.to_string()).collect(), right),
        ReportColumn::new("Frequency", levels.iter().map(|l| l.count.to_string()).collect(), true),
    ];
    if show_pct {
        columns.push(ReportColumn::new(
            "Percent",
            levels.iter().map(|l| stat_text(percent(l.count, total), 2)).collect(),
            true,
        ));
    }
    if show_cum {
        let mut running = 0;
        let cumulative: Vec<usize> = levels
            .iter()
            .map(|l| {
                running += l.count;
                running
            })
            .collect();
        columns.push(ReportColumn::new(
            "Cumulative Frequency",
            cumulative.iter().map(|c| c.to_string()).collect(),
            true,
        ));
        if show_pct {
            columns.push(ReportColumn::new(
                "Cumulative Percent",
                cumulative.iter().map(|&c| stat_text(percent(c, total), 2)).collect(),
                true,
            ));
        }
    }
    render(&columns)
}

fn output_table(input: &Table, var: &str, levels: &[Level]) -> Table {
    let total: usize = levels.iter().map(|l| l.count).sum();
    let kind = input.column(var).map_or(crate::table::ValueKind::Text, |c| c.kind());
    let values = levels.iter().map(|l| l.value.clone()).collect();
    let columns = vec![
        Column::new(var, ColumnData::with_kind(values, kind)),
        Column::new("COUNT", ColumnData::Numeric(levels.iter().map(|l| Some(l.count as f64)).collect())),
        Column::new("PERCENT", ColumnData::Numeric(levels.iter().map(|l| percent(l.count, total)).collect())),
    ];
    let mut table = Table::new(levels.len());
    for column in columns {
        table = table.with_column(&column.name, column.data);
    }
    table
}
