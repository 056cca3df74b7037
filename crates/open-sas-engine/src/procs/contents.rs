//! PROC CONTENTS: row count and one line per column with its kind.

use crate::table::{Table, ValueKind};

use super::report::{render, ReportColumn};
use super::{ProcError, ProcOutput, ProcRequest, ProcedureHandler};

/// The CONTENTS procedure.
#[derive(Debug, Clone, Copy, Default)]
pub struct Contents;

impl ProcedureHandler for Contents {
    fn name(&self) -> &str {
        "CONTENTS"
    }

    fn execute(&self, input: &Table, request: &ProcRequest) -> Result<ProcOutput, ProcError> {
        let name = request.data.as_ref().map_or_else(|| "_LAST_".to_string(), |d| d.to_string().to_uppercase());
        let mut lines = vec![
            format!("Data Set Name: {name}"),
            format!("Observations: {}", input.row_count()),
            format!("Variables: {}", input.column_count()),
            String::new(),
        ];
        let columns = input.columns();
        lines.extend(render(&[
            ReportColumn::new("#", (1..=columns.len()).map(|n| n.to_string()).collect(), true),
            ReportColumn::new("Variable", columns.iter().map(|c| c.name.clone()).collect(), false),
            ReportColumn::new("Type", columns.iter().map(|c| c.kind().to_string()).collect(), false),
            ReportColumn::new(
                "Missing",
                columns.iter().map(|c| c.data.missing_count().to_string()).collect(),
                true,
            ),
        ]));
        let text_columns = columns.iter().filter(|c| c.kind() == ValueKind::Text).count();
        tracing::debug!(columns = columns.len(), text_columns, "contents listed");
        Ok(ProcOutput::report(lines))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    #[test]
    fn test_contents_lines() {
        let table = Table::from_columns(vec![Column::text("name", &["a"]), Column::numeric("x", &[1.0])]).unwrap();
        let req = ProcRequest::parse("proc contents data=work.people; run;").unwrap();
        let out = Contents.execute(&table, &req).unwrap();
        assert_eq!(out.report_lines[0], "Data Set Name: WORK.PEOPLE");
        assert_eq!(out.report_lines[1], "Observations: 1");
        assert_eq!(out.report_lines[4], "#  Variable  Type  Missing");
        assert_eq!(out.report_lines[6], "1  name      Char        0");
        assert_eq!(out.report_lines[7], "2  x         Num         0");
    }
}
