//! DATA step execution.
//!
//! [`execute`] transforms an already resolved source table. Resolving the
//! source (workspace, library, DATALINES) and binding the result are the
//! interpreter's job.
//!
//! Order of operations is fixed: WHERE filters, then the assignment list in
//! source order, then DROP, KEEP, RENAME.

use crate::error::Notice;
use crate::expr::{Evaluator, FunctionRegistry};
use crate::table::{ColumnData, Table, Value, ValueKind};

use super::parser::{Action, Branch, DataStepSpec, StepAction};

/// Result of running a step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    /// The output table.
    pub table: Table,
    /// Warnings and notes produced along the way.
    pub notices: Vec<Notice>,
}

/// Run `spec` against `input`.
pub fn execute(spec: &DataStepSpec, input: Table, functions: &FunctionRegistry) -> StepOutcome {
    let mut run = StepRun { functions, notices: Vec::new() };
    run.report_spec(spec);

    let mut table = input;
    if !spec.by.is_empty() {
        run.check_by_order(&table, &spec.by);
    }

    if !spec.filters.is_empty() {
        let mut keep = vec![true; table.row_count()];
        for condition in &spec.filters {
            let mask = run.mask(&table, condition);
            for (k, m) in keep.iter_mut().zip(mask) {
                *k = *k && m;
            }
        }
        table = table.filter(&keep);
    }

    // Rows already claimed by the current IF/ELSE chain.
    let mut chain: Option<Vec<bool>> = None;

    for statement in &spec.assignments {
        let Some(action) = StepAction::parse(statement) else {
            run.notices.push(Notice::warning(
                "osas::step::unparsed_statement",
                format!("statement not understood and skipped: {statement}"),
            ));
            chain = None;
            continue;
        };

        match action {
            StepAction::Assign { target, expr } => {
                chain = None;
                let data = run.column(&table, &expr);
                table = table.with_column(&target, data);
            }
            StepAction::Subset { condition } => {
                chain = None;
                let mask = run.mask(&table, &condition);
                table = table.filter(&mask);
            }
            StepAction::Conditional { branch, action } => {
                let selected = match branch {
                    Branch::If(condition) => {
                        let mask = run.mask(&table, &condition);
                        chain = Some(mask.clone());
                        mask
                    }
                    Branch::ElseIf(condition) => {
                        let mask = run.mask(&table, &condition);
                        let Some(taken) = chain.as_mut() else {
                            run.else_without_if(statement);
                            continue;
                        };
                        let selected: Vec<bool> = mask.iter().zip(taken.iter()).map(|(m, t)| *m && !*t).collect();
                        for (t, s) in taken.iter_mut().zip(&selected) {
                            *t = *t || *s;
                        }
                        selected
                    }
                    Branch::Else => {
                        let Some(taken) = chain.take() else {
                            run.else_without_if(statement);
                            continue;
                        };
                        taken.iter().map(|t| !t).collect()
                    }
                };

                match action {
                    Action::Assign { target, expr } => {
                        table = run.masked_assign(table, &target, &expr, &selected);
                    }
                    Action::Delete => {
                        let keep: Vec<bool> = selected.iter().map(|s| !s).collect();
                        if let Some(taken) = chain.as_mut() {
                            *taken = taken.iter().zip(&keep).filter(|(_, k)| **k).map(|(t, _)| *t).collect();
                        }
                        table = table.filter(&keep);
                    }
                }
            }
        }
    }

    if !spec.drop.is_empty() {
        table = table.drop_columns(&spec.drop);
    }
    if !spec.keep.is_empty() {
        table = table.keep_columns(&spec.keep);
    }
    if !spec.rename.is_empty() {
        table = table.rename_columns(&spec.rename);
    }

    tracing::debug!(rows = table.row_count(), columns = table.column_count(), "DATA step executed");
    StepOutcome { table, notices: run.notices }
}

struct StepRun<'a> {
    functions: &'a FunctionRegistry,
    notices: Vec<Notice>,
}

impl StepRun<'_> {
    fn report_spec(&mut self, spec: &DataStepSpec) {
        if spec.sources.len() > 1 {
            let extra: Vec<String> = spec.sources[1..].iter().map(ToString::to_string).collect();
            self.notices.push(Notice::warning(
                "osas::step::extra_sources",
                format!("only the first source table is read; ignoring {}", extra.join(", ")),
            ));
        }
        for keyword in &spec.ignored {
            self.notices.push(Notice::note(
                "osas::step::statement_ignored",
                format!("{keyword} statement has no effect and was ignored"),
            ));
        }
        for statement in &spec.unrecognized {
            self.notices.push(Notice::warning(
                "osas::step::unknown_statement",
                format!("statement not recognized and skipped: {statement}"),
            ));
        }
    }

    fn check_by_order(&mut self, table: &Table, by: &[String]) {
        let mut keys = Vec::with_capacity(by.len());
        for name in by {
            match table.column(name) {
                Some(column) => keys.push(&column.data),
                None => {
                    self.notices.push(Notice::warning(
                        "osas::step::by_column_missing",
                        format!("BY variable {name} is not in the input table"),
                    ));
                    return;
                }
            }
        }
        let sorted = (1..table.row_count()).all(|row| {
            let prev: Vec<Value> = keys.iter().map(|k| k.get(row - 1)).collect();
            let cur: Vec<Value> = keys.iter().map(|k| k.get(row)).collect();
            let ordering = prev
                .iter()
                .zip(&cur)
                .map(|(a, b)| a.sort_cmp(b))
                .find(|o| o.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal);
            ordering.is_le()
        });
        if !sorted {
            self.notices.push(Notice::warning(
                "osas::step::by_not_sorted",
                format!("input is not sorted by {}", by.join(" ")),
            ));
        }
    }

    fn mask(&mut self, table: &Table, condition: &str) -> Vec<bool> {
        let mut ev = Evaluator::new(table, self.functions);
        let mask = ev.mask(condition);
        self.collect(ev.take_fallbacks());
        mask
    }

    fn values(&mut self, table: &Table, expr: &str) -> Vec<Value> {
        let mut ev = Evaluator::new(table, self.functions);
        let values = ev.values(expr);
        self.collect(ev.take_fallbacks());
        values
    }

    fn column(&mut self, table: &Table, expr: &str) -> ColumnData {
        ColumnData::from_values(self.values(table, expr))
    }

    /// Write `expr` into the rows of `target` selected by `mask`, creating the
    /// column (all missing) if needed. Other rows keep their values.
    fn masked_assign(&mut self, table: Table, target: &str, expr: &str, mask: &[bool]) -> Table {
        let rows = table.row_count();
        let new_values = self.values(&table, expr);
        let existing = table.column(target).map(|c| c.data.clone());

        let kind = match &existing {
            Some(data) if data.kind() == ValueKind::Text => ValueKind::Text,
            _ if new_values.iter().any(|v| matches!(v, Value::Text(_))) => ValueKind::Text,
            _ => ValueKind::Numeric,
        };

        let mut merged = existing.map_or_else(|| vec![Value::Missing; rows], |d| d.values());
        for (row, value) in new_values.into_iter().enumerate() {
            if mask.get(row).copied().unwrap_or(false) {
                merged[row] = value;
            }
        }
        table.with_column(target, ColumnData::with_kind(merged, kind))
    }

    fn else_without_if(&mut self, statement: &str) {
        self.notices.push(Notice::warning(
            "osas::step::else_without_if",
            format!("ELSE without a preceding IF was skipped: {statement}"),
        ));
    }

    fn collect(&mut self, fallbacks: Vec<String>) {
        self.notices.extend(
            fallbacks
                .into_iter()
                .map(|message| Notice::warning("osas::evaluation_fallback", message)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    fn run(block: &str, input: Table) -> StepOutcome {
        let spec = DataStepSpec::parse(block).unwrap();
        execute(&spec, input, &FunctionRegistry::new())
    }

    fn xs() -> Table {
        Table::from_columns(vec![Column::numeric("x", &[5.0, 15.0, 20.0])]).unwrap()
    }

    #[test]
    fn test_masked_conditional_assignment() {
        let out = run("data t; set s; if x > 10 then y = 'Hi'; run;", xs());
        let y = &out.table.column("y").unwrap().data;
        assert_eq!(y, &ColumnData::Text(vec![None, Some("Hi".into()), Some("Hi".into())]));
        assert!(out.notices.is_empty());
    }

    #[test]
    fn test_conditional_no_match_keeps_kind() {
        let out = run("data t; set s; if x > 100 then y = 'Hi'; run;", xs());
        assert_eq!(out.table.column("y").unwrap().kind(), ValueKind::Text);
        assert_eq!(out.table.column("y").unwrap().data.missing_count(), 3);
    }

    #[test]
    fn test_if_else_chain() {
        let block = "data t; set s;\n if x < 10 then g = 'lo';\n else if x < 18 then g = 'mid';\n else g = 'hi';\nrun;";
        let out = run(block, xs());
        assert_eq!(
            out.table.column("g").unwrap().data,
            ColumnData::Text(vec![Some("lo".into()), Some("mid".into()), Some("hi".into())])
        );
    }

    #[test]
    fn test_masked_write_keeps_other_rows() {
        let block = "data t; set s; y = 0; if x > 10 then y = x; run;";
        let out = run(block, xs());
        assert_eq!(
            out.table.column("y").unwrap().data,
            ColumnData::Numeric(vec![Some(0.0), Some(15.0), Some(20.0)])
        );
    }

    #[test]
    fn test_keep_drop_rename_order_fixed() {
        // RENAME and DROP written before the assignments still apply last.
        let block = "data t; rename a=z; drop b; a = 1; b = 2; c = 3; run;";
        let out = run(block, Table::new(1));
        assert_eq!(out.table.column_names(), vec!["z", "c"]);
    }

    #[test]
    fn test_keep_then_rename() {
        let block = "data t; set s; keep x y; y = x + 1; z = 0; rename y=w; run;";
        let out = run(block, xs());
        assert_eq!(out.table.column_names(), vec!["x", "w"]);
    }

    #[test]
    fn test_where_filters_and_combine() {
        let block = "data t; set s; where x > 5; where x < 20; run;";
        let out = run(block, xs());
        assert_eq!(out.table.row_count(), 1);
        assert_eq!(out.table.value(0, "x"), Value::Num(15.0));
    }

    #[test]
    fn test_subsetting_if_and_delete() {
        let out = run("data t; set s; if x >= 15; run;", xs());
        assert_eq!(out.table.row_count(), 2);

        let out = run("data t; set s; if x = 15 then delete; run;", xs());
        assert_eq!(out.table.row_count(), 2);
        assert_eq!(out.table.value(1, "x"), Value::Num(20.0));
    }

    #[test]
    fn test_delete_inside_chain() {
        let block = "data t; set s; if x > 18 then delete; else flag = 1; run;";
        let out = run(block, xs());
        assert_eq!(out.table.row_count(), 2);
        assert_eq!(
            out.table.column("flag").unwrap().data,
            ColumnData::Numeric(vec![Some(1.0), Some(1.0)])
        );
    }

    #[test]
    fn test_else_without_if_warns() {
        let out = run("data t; set s; else y = 1; run;", xs());
        assert!(out.table.column("y").is_none());
        assert_eq!(out.notices[0].code, "osas::step::else_without_if");
    }

    #[test]
    fn test_fallbacks_become_notices() {
        let out = run("data t; set s; y = nosuch(x); run;", xs());
        assert_eq!(
            out.table.column("y").unwrap().data,
            ColumnData::Numeric(vec![Some(0.0); 3])
        );
        assert_eq!(out.notices.len(), 1);
        assert_eq!(out.notices[0].code, "osas::evaluation_fallback");
    }

    #[test]
    fn test_extra_sources_and_ignored_statements_reported() {
        let out = run("data t; set a b; length y 8; run;", xs());
        let codes: Vec<&str> = out.notices.iter().map(|n| n.code).collect();
        assert_eq!(codes, vec!["osas::step::extra_sources", "osas::step::statement_ignored"]);
    }

    #[test]
    fn test_by_order_warning() {
        let unsorted = Table::from_columns(vec![Column::numeric("x", &[3.0, 1.0])]).unwrap();
        let out = run("data t; set s; by x; run;", unsorted);
        assert_eq!(out.notices[0].code, "osas::step::by_not_sorted");

        let out = run("data t; set s; by x; run;", xs());
        assert!(out.notices.is_empty());
    }
}
