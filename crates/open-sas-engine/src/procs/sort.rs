//! PROC SORT.
//!
//! `BY [DESCENDING] var ...` is required. The sort is stable. `NODUPKEY`
//! keeps the first row of each run of equal keys. The sorted table is
//! registered under `OUT=` when given, otherwise it replaces `DATA=`.

use std::cmp::Ordering;

use crate::table::Table;

use super::{resolve_columns, ProcError, ProcOutput, ProcRequest, ProcedureHandler};

/// The SORT procedure.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sort;

/// One BY key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    /// Column name.
    pub column: String,
    /// Sort high to low.
    pub descending: bool,
}

/// Parse the text of a BY statement. `DESCENDING` applies to the variable
/// that follows it.
pub fn parse_by(text: &str) -> Vec<SortKey> {
    let mut keys = Vec::new();
    let mut descending = false;
    for word in text.split_whitespace() {
        if word.eq_ignore_ascii_case("descending") {
            descending = true;
            continue;
        }
        keys.push(SortKey { column: word.to_string(), descending });
        descending = false;
    }
    keys
}

/// Row order of `table` sorted by `keys`, missing values first.
pub fn sorted_indices(table: &Table, keys: &[SortKey]) -> Vec<usize> {
    let columns: Vec<_> = keys
        .iter()
        .filter_map(|k| table.column(&k.column).map(|c| (&c.data, k.descending)))
        .collect();
    let mut indices: Vec<usize> = (0..table.row_count()).collect();
    indices.sort_by(|&a, &b| {
        columns
            .iter()
            .map(|(data, descending)| {
                let ord = data.get(a).sort_cmp(&data.get(b));
                if *descending {
                    ord.reverse()
                } else {
                    ord
                }
            })
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    });
    indices
}

impl ProcedureHandler for Sort {
    fn name(&self) -> &str {
        "SORT"
    }

    fn execute(&self, input: &Table, request: &ProcRequest) -> Result<ProcOutput, ProcError> {
        let mut keys = parse_by(&request.variables("BY").join(" "));
        if keys.is_empty() {
            return Err(ProcError::MissingStatement { procedure: "SORT".into(), statement: "BY".into() });
        }
        let names: Vec<String> = keys.iter().map(|k| k.column.clone()).collect();
        for (key, resolved) in keys.iter_mut().zip(resolve_columns(input, &names)?) {
            key.column = resolved;
        }

        let mut indices = sorted_indices(input, &keys);
        let mut lines = Vec::new();
        if request.has_option("NODUPKEY") {
            let before = indices.len();
            let key_of = |row: usize| -> Vec<_> { keys.iter().map(|k| input.value(row, &k.column)).collect() };
            indices.dedup_by(|b, a| key_of(*a) == key_of(*b));
            let removed = before - indices.len();
            lines.push(format!("NOTE: {removed} observations with duplicate key values were deleted."));
        }

        let sorted = input.select_rows(&indices);
        lines.push(format!(
            "NOTE: {} observations sorted by {}.",
            sorted.row_count(),
            names.join(" ")
        ));
        let target = request.out.as_ref().or(request.data.as_ref()).map(ToString::to_string);
        Ok(ProcOutput::report(lines).with_table(target, sorted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Column, Value};

    fn input() -> Table {
        Table::from_columns(vec![
            Column::text("g", &["b", "a", "b", "a"]),
            Column::numeric("x", &[1.0, 2.0, 3.0, 4.0]),
        ])
        .unwrap()
    }

    fn column_x(out: &ProcOutput) -> Vec<Value> {
        out.output_table.as_ref().unwrap().column("x").unwrap().data.values()
    }

    #[test]
    fn test_sort_is_stable() {
        let req = ProcRequest::parse("proc sort data=t; by g; run;").unwrap();
        let out = Sort.execute(&input(), &req).unwrap();
        assert_eq!(column_x(&out), vec![Value::Num(2.0), Value::Num(4.0), Value::Num(1.0), Value::Num(3.0)]);
        assert_eq!(out.output_table_name.as_deref(), Some("t"));
    }

    #[test]
    fn test_descending_and_out() {
        let req = ProcRequest::parse("proc sort data=t out=s; by descending g x; run;").unwrap();
        let out = Sort.execute(&input(), &req).unwrap();
        assert_eq!(column_x(&out), vec![Value::Num(1.0), Value::Num(3.0), Value::Num(2.0), Value::Num(4.0)]);
        assert_eq!(out.output_table_name.as_deref(), Some("s"));
    }

    #[test]
    fn test_nodupkey() {
        let req = ProcRequest::parse("proc sort data=t nodupkey; by g; run;").unwrap();
        let out = Sort.execute(&input(), &req).unwrap();
        assert_eq!(column_x(&out), vec![Value::Num(2.0), Value::Num(1.0)]);
        assert!(out.report_lines[0].contains("2 observations with duplicate"));
    }

    #[test]
    fn test_missing_sorts_first() {
        let table = Table::from_columns(vec![Column::new(
            "x",
            crate::table::ColumnData::Numeric(vec![Some(2.0), None, Some(1.0)]),
        )])
        .unwrap();
        let req = ProcRequest::parse("proc sort; by x; run;").unwrap();
        let out = Sort.execute(&table, &req).unwrap();
        assert_eq!(column_x(&out), vec![Value::Missing, Value::Num(1.0), Value::Num(2.0)]);
        assert_eq!(out.output_table_name, None);
    }

    #[test]
    fn test_by_required() {
        let req = ProcRequest::parse("proc sort data=t; run;").unwrap();
        assert!(matches!(Sort.execute(&input(), &req), Err(ProcError::MissingStatement { .. })));
    }
}
