//! PROC MEANS.
//!
//! Statistics are computed over non-missing values of each analysis
//! variable. `CLASS` (or `BY`) variables split the rows into groups, reported
//! in sorted key order. Statistic keywords on the PROC line (`N MEAN STD MIN
//! MAX`) select the columns; without any, all five are shown.
//!
//! `OUT=` on the PROC line, or `OUTPUT OUT=name`, also produces a table with
//! one row per group and variable.

use crate::table::{Column, ColumnData, Table, Value, ValueKind};

use super::report::{render, stat_text, ReportColumn};
use super::request::parse_options;
use super::sort::{sorted_indices, SortKey};
use super::{resolve_columns, ProcError, ProcOutput, ProcRequest, ProcedureHandler};

/// The MEANS procedure.
#[derive(Debug, Clone, Copy, Default)]
pub struct Means;

/// A statistic MEANS can compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statistic {
    N,
    Mean,
    Std,
    Min,
    Max,
}

impl Statistic {
    const ALL: [Statistic; 5] = [Statistic::N, Statistic::Mean, Statistic::Std, Statistic::Min, Statistic::Max];

    fn keyword(name: &str) -> Option<Statistic> {
        match name.to_ascii_uppercase().as_str() {
            "N" => Some(Statistic::N),
            "MEAN" => Some(Statistic::Mean),
            "STD" | "STDDEV" => Some(Statistic::Std),
            "MIN" => Some(Statistic::Min),
            "MAX" => Some(Statistic::Max),
            _ => None,
        }
    }

    fn report_label(self) -> &'static str {
        match self {
            Statistic::N => "N",
            Statistic::Mean => "Mean",
            Statistic::Std => "Std Dev",
            Statistic::Min => "Minimum",
            Statistic::Max => "Maximum",
        }
    }

    fn column_name(self) -> &'static str {
        match self {
            Statistic::N => "N",
            Statistic::Mean => "Mean",
            Statistic::Std => "StdDev",
            Statistic::Min => "Min",
            Statistic::Max => "Max",
        }
    }
}

/// Summary of one variable within one group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub n: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Summary {
    /// Summarize the non-missing values. The standard deviation uses the
    /// `n - 1` divisor and is missing below two values.
    pub fn of(values: &[f64]) -> Summary {
        let n = values.len();
        if n == 0 {
            return Summary { n, mean: None, std: None, min: None, max: None };
        }
        let mean = values.iter().sum::<f64>() / n as f64;
        let std = (n > 1).then(|| {
            let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (n - 1) as f64).sqrt()
        });
        Summary {
            n,
            mean: Some(mean),
            std,
            min: values.iter().copied().reduce(f64::min),
            max: values.iter().copied().reduce(f64::max),
        }
    }

    fn get(&self, stat: Statistic) -> Option<f64> {
        match stat {
            Statistic::N => Some(self.n as f64),
            Statistic::Mean => self.mean,
            Statistic::Std => self.std,
            Statistic::Min => self.min,
            Statistic::Max => self.max,
        }
    }
}

impl ProcedureHandler for Means {
    fn name(&self) -> &str {
        "MEANS"
    }

    fn execute(&self, input: &Table, request: &ProcRequest) -> Result<ProcOutput, ProcError> {
        let mut class_vars = request.variables("CLASS");
        class_vars.extend(request.variables("BY"));
        let class_vars = resolve_columns(input, &class_vars)?;

        let vars = request.variables("VAR");
        let vars = if vars.is_empty() {
            input
                .columns()
                .iter()
                .filter(|c| c.kind() == ValueKind::Numeric && !class_vars.contains(&c.name))
                .map(|c| c.name.clone())
                .collect()
        } else {
            resolve_columns(input, &vars)?
        };
        if let Some(text_var) = vars.iter().find(|v| input.column(v).is_some_and(|c| c.kind() == ValueKind::Text)) {
            return Err(ProcError::Unsupported {
                procedure: "MEANS".into(),
                feature: format!("character analysis variable {text_var}"),
            });
        }
        if vars.is_empty() {
            return Err(ProcError::MissingStatement { procedure: "MEANS".into(), statement: "VAR".into() });
        }

        let mut stats: Vec<Statistic> = Statistic::ALL
            .into_iter()
            .filter(|s| request.options.keys().any(|k| Statistic::keyword(k) == Some(*s)))
            .collect();
        if stats.is_empty() {
            stats = Statistic::ALL.to_vec();
        }

        let groups = group_rows(input, &class_vars);
        let mut lines = vec![format!("Analysis Variables: {}", vars.join(", "))];
        let mut rows: Vec<(Vec<Value>, String, Summary)> = Vec::new();

        for (key, members) in &groups {
            lines.push(String::new());
            if !class_vars.is_empty() {
                let label: Vec<String> = class_vars
                    .iter()
                    .zip(key)
                    .map(|(name, value)| format!("{name}={value}"))
                    .collect();
                lines.push(label.join(" "));
            }
            let mut summaries = Vec::with_capacity(vars.len());
            for var in &vars {
                let values: Vec<f64> = members.iter().filter_map(|&row| input.value(row, var).as_f64()).collect();
                summaries.push(Summary::of(&values));
            }
            lines.extend(report_group(&vars, &summaries, &stats));
            for (var, summary) in vars.iter().zip(summaries) {
                rows.push((key.clone(), var.clone(), summary));
            }
        }

        let output = ProcOutput::report(lines);
        match output_name(request) {
            Some(name) => {
                let table = output_table(input, &class_vars, &stats, &rows);
                Ok(output.with_table(Some(name), table))
            }
            None => Ok(output),
        }
    }
}

/// Rows grouped by the values of `class_vars`, in sorted key order. Without
/// class variables there is a single group holding every row.
fn group_rows(input: &Table, class_vars: &[String]) -> Vec<(Vec<Value>, Vec<usize>)> {
    let keys: Vec<SortKey> = class_vars
        .iter()
        .map(|c| SortKey { column: c.clone(), descending: false })
        .collect();
    let mut groups: Vec<(Vec<Value>, Vec<usize>)> = Vec::new();
    for row in sorted_indices(input, &keys) {
        let key: Vec<Value> = class_vars.iter().map(|c| input.value(row, c)).collect();
        match groups.last_mut() {
            Some((last, members)) if *last == key => members.push(row),
            _ => groups.push((key, vec![row])),
        }
    }
    if groups.is_empty() && class_vars.is_empty() {
        groups.push((Vec::new(), Vec::new()));
    }
    groups
}

fn report_group(vars: &[String], summaries: &[Summary], stats: &[Statistic]) -> Vec<String> {
    let mut columns = vec![ReportColumn::new("Variable", vars.to_vec(), false)];
    for &stat in stats {
        let cells = summaries
            .iter()
            .map(|s| match stat {
                Statistic::N => s.n.to_string(),
                _ => stat_text(s.get(stat), 4),
            })
            .collect();
        columns.push(ReportColumn::new(stat.report_label(), cells, true));
    }
    render(&columns)
}

fn output_name(request: &ProcRequest) -> Option<String> {
    if let Some(out) = &request.out {
        return Some(out.to_string());
    }
    request
        .statement("OUTPUT")
        .and_then(|text| parse_options(text).remove("OUT"))
        .filter(|name| !name.is_empty())
}

fn output_table(
    input: &Table,
    class_vars: &[String],
    stats: &[Statistic],
    rows: &[(Vec<Value>, String, Summary)],
) -> Table {
    let mut columns = Vec::with_capacity(class_vars.len() + stats.len() + 1);
    for (i, name) in class_vars.iter().enumerate() {
        let kind = input.column(name).map_or(ValueKind::Numeric, |c| c.kind());
        let values = rows.iter().map(|(key, _, _)| key[i].clone()).collect();
        columns.push(Column::new(name.clone(), ColumnData::with_kind(values, kind)));
    }
    columns.push(Column::new(
        "Variable",
        ColumnData::Text(rows.iter().map(|(_, var, _)| Some(var.clone())).collect()),
    ));
    for &stat in stats {
        columns.push(Column::new(
            stat.column_name(),
            ColumnData::Numeric(rows.iter().map(|(_, _, s)| s.get(stat)).collect()),
        ));
    }
    let mut table = Table::new(rows.len());
    for column in columns {
        table = table.with_column(&column.name, column.data);
    }
    table
}
