//! PROC PRINT.
//!
//! Supports `VAR` (column selection and order), `OBS=n` (row cap), `NOOBS`
//! (no observation-number column) and `TITLE`.

use crate::table::Table;

use super::report::{render, ReportColumn};
use super::{resolve_columns, ProcError, ProcOutput, ProcRequest, ProcedureHandler};

/// The PRINT procedure.
#[derive(Debug, Clone, Copy, Default)]
pub struct Print;

impl ProcedureHandler for Print {
    fn name(&self) -> &str {
        "PRINT"
    }

    fn execute(&self, input: &Table, request: &ProcRequest) -> Result<ProcOutput, ProcError> {
        let vars = request.variables("VAR");
        let names = if vars.is_empty() {
            input.column_names().into_iter().map(str::to_string).collect()
        } else {
            resolve_columns(input, &vars)?
        };

        let rows = match request.option("OBS") {
            Some(obs) => obs
                .parse::<usize>()
                .map_err(|_| ProcError::InvalidOption { option: "OBS".into(), value: obs.into() })?
                .min(input.row_count()),
            None => input.row_count(),
        };

        let mut lines = Vec::new();
        if let Some(title) = request.statement("TITLE") {
            lines.push(crate::text::unquote(title));
            lines.push(String::new());
        }
        if rows == 0 {
            lines.push("No observations to display.".to_string());
            return Ok(ProcOutput::report(lines));
        }

        let mut columns = Vec::with_capacity(names.len() + 1);
        if !request.has_option("NOOBS") {
            columns.push(ReportColumn::new("Obs", (1..=rows).map(|n| n.to_string()).collect(), true));
        }
        for name in &names {
            if let Some(column) = input.column(name) {
                columns.push(ReportColumn::from_data(&column.name, &column.data, rows));
            }
        }
        lines.extend(render(&columns));
        Ok(ProcOutput::report(lines))
    }
}
