//! DATA step block parsing.
//!
//! The block is split into `;`-terminated statements (quotes respected) and
//! each statement is sorted by its leading keyword into the fields of a
//! [`DataStepSpec`]. Conditions and expressions are kept as raw text; they
//! are only parsed when the step runs against a table.

use crate::table::{is_sas_name, TableRef};
use crate::text::{after_first_word, find_keyword, find_unquoted, find_datalines, first_word, statements, words};

use super::datalines::InputSpec;
use super::StepError;

/// Statements that are accepted and have no effect on the result.
const IGNORED_STATEMENTS: &[&str] = &["LENGTH", "FORMAT", "INFORMAT", "LABEL", "RETAIN", "OUTPUT", "ATTRIB"];

/// Parsed view of one DATA step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataStepSpec {
    /// Output table; `None` for `DATA _NULL_`.
    pub output: Option<TableRef>,
    /// Tables named on `SET`/`MERGE`; only the first is read.
    pub sources: Vec<TableRef>,
    /// `WHERE` conditions, combined with AND.
    pub filters: Vec<String>,
    /// Assignment, `IF` and `ELSE` statements in source order.
    pub assignments: Vec<String>,
    /// `DROP` columns.
    pub drop: Vec<String>,
    /// `KEEP` columns.
    pub keep: Vec<String>,
    /// `RENAME` pairs `(old, new)`.
    pub rename: Vec<(String, String)>,
    /// `BY` columns.
    pub by: Vec<String>,
    /// `INPUT` statement.
    pub input: Option<InputSpec>,
    /// Lines of a `DATALINES`/`CARDS` section.
    pub datalines: Option<Vec<String>>,
    /// Keywords of statements accepted and ignored.
    pub ignored: Vec<String>,
    /// Statements that were not understood.
    pub unrecognized: Vec<String>,
}

impl DataStepSpec {
    /// Parse a DataStep block.
    pub fn parse(block: &str) -> Result<DataStepSpec, StepError> {
        let (header, datalines, inline) = split_datalines(block);
        let stmts = statements(&header);
        let mut stmts = stmts.into_iter();

        let first = stmts.next().ok_or(StepError::NoDataStatement)?;
        if !first_word(first).eq_ignore_ascii_case("data") {
            return Err(StepError::NoDataStatement);
        }
        let mut spec = DataStepSpec {
            output: parse_output(after_first_word(first))?,
            datalines,
            ..DataStepSpec::default()
        };

        for stmt in stmts {
            spec.add_statement(stmt)?;
        }
        if let Some(data) = inline {
            let width = spec.input.as_ref().map_or(0, |input| input.variables.len());
            spec.datalines.get_or_insert_with(Vec::new).extend(inline_rows(&data, width));
        }
        Ok(spec)
    }

    fn add_statement(&mut self, stmt: &str) -> Result<(), StepError> {
        // `keep = 1;` assigns to a column called keep.
        if after_first_word(stmt).starts_with('=') && split_assignment(stmt).is_some() {
            self.assignments.push(stmt.to_string());
            return Ok(());
        }

        let keyword = first_word(stmt).to_ascii_uppercase();
        let rest = after_first_word(stmt);
        match keyword.as_str() {
            "SET" | "MERGE" => {
                let names = words(rest);
                if names.is_empty() {
                    return Err(StepError::EmptySourceList { keyword: keyword.clone() });
                }
                for name in names {
                    let table = TableRef::parse(name)
                        .ok_or_else(|| StepError::InvalidTableName { name: name.to_string() })?;
                    self.sources.push(table);
                }
            }
            "WHERE" => self.filters.push(rest.to_string()),
            "IF" | "ELSE" => self.assignments.push(stmt.to_string()),
            "DROP" => self.drop.extend(words(rest).into_iter().map(String::from)),
            "KEEP" => self.keep.extend(words(rest).into_iter().map(String::from)),
            "RENAME" => self.rename.extend(parse_rename(rest)),
            "BY" => self.by.extend(
                words(rest)
                    .into_iter()
                    .filter(|w| !w.eq_ignore_ascii_case("descending"))
                    .map(String::from),
            ),
            "INPUT" => self.input = Some(InputSpec::parse(rest)),
            "DATALINES" | "CARDS" | "RUN" => {}
            k if IGNORED_STATEMENTS.contains(&k) => {
                tracing::debug!(statement = %k, "statement accepted and ignored");
                self.ignored.push(keyword.clone());
            }
            _ if split_assignment(stmt).is_some() => self.assignments.push(stmt.to_string()),
            _ => self.unrecognized.push(stmt.to_string()),
        }
        Ok(())
    }
}

/// Data written on the `DATALINES;` line itself and closed there.
type InlineData = Option<String>;

/// Separate the literal-data lines from the statement text of a block.
fn split_datalines(block: &str) -> (String, Option<Vec<String>>, InlineData) {
    let mut header = String::with_capacity(block.len());
    let mut datalines: Option<Vec<String>> = None;
    let mut inline = None;
    let mut in_data = false;

    for line in block.lines() {
        if in_data {
            if line.trim() == ";" {
                in_data = false;
            } else if let Some(rows) = datalines.as_mut() {
                rows.push(line.to_string());
            }
            continue;
        }
        let Some(mark) = find_datalines(line) else {
            header.push_str(line);
            header.push('\n');
            continue;
        };
        header.push_str(&line[..mark.data_start]);
        let rows = datalines.get_or_insert_with(Vec::new);
        match mark.data_end {
            Some(end) => {
                inline = Some(line[mark.data_start..end].to_string());
                header.push_str(&line[end + 1..]);
            }
            None => {
                let rest = &line[mark.data_start..];
                if !rest.trim().is_empty() {
                    rows.push(rest.to_string());
                }
                in_data = true;
            }
        }
        header.push('\n');
    }
    (header, datalines, inline)
}

/// Cut same-line data into rows of `width` tokens. A short last row is kept
/// so ingest can count it as malformed.
fn inline_rows(data: &str, width: usize) -> Vec<String> {
    let tokens: Vec<&str> = data.split_whitespace().collect();
    if width == 0 {
        return if tokens.is_empty() { Vec::new() } else { vec![tokens.join(" ")] };
    }
    tokens.chunks(width).map(|row| row.join(" ")).collect()
}

fn parse_output(text: &str) -> Result<Option<TableRef>, StepError> {
    // Dataset options such as `out(keep=a)` are not supported; cut them off.
    let name = text
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or("");
    if name.is_empty() {
        return Err(StepError::MissingOutput);
    }
    let table = TableRef::parse(name).ok_or_else(|| StepError::InvalidTableName { name: name.to_string() })?;
    Ok(if table.is_null() { None } else { Some(table) })
}

/// `a=b c = d` → `[(a, b), (c, d)]`.
fn parse_rename(text: &str) -> Vec<(String, String)> {
    let compact = text.split('=').map(str::trim).collect::<Vec<_>>().join("=");
    compact
        .split_whitespace()
        .filter_map(|pair| pair.split_once('='))
        .filter(|(old, new)| is_sas_name(old) && is_sas_name(new))
        .map(|(old, new)| (old.to_string(), new.to_string()))
        .collect()
}

/// Split `target = expr` at the first unquoted `=`.
pub fn split_assignment(text: &str) -> Option<(String, String)> {
    let eq = find_unquoted(text, '=')?;
    let target = text[..eq].trim();
    let expr = text[eq + 1..].trim();
    if !is_sas_name(target) || expr.is_empty() || expr.starts_with('=') {
        return None;
    }
    Some((target.to_string(), expr.to_string()))
}

// ---------------------------------------------------------------------------
//  Step actions
// ---------------------------------------------------------------------------

/// Branch of an IF chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Branch {
    /// `IF cond THEN`
    If(String),
    /// `ELSE IF cond THEN`
    ElseIf(String),
    /// `ELSE`
    Else,
}

/// What a conditional branch does to the selected rows.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// `var = expr`
    Assign { target: String, expr: String },
    /// `DELETE`
    Delete,
}

/// One statement of the assignment list, ready to run.
#[derive(Debug, Clone, PartialEq)]
pub enum StepAction {
    /// `var = expr` for every row.
    Assign { target: String, expr: String },
    /// Subsetting `IF cond;`: keep only matching rows.
    Subset { condition: String },
    /// A branch of an IF/ELSE chain.
    Conditional { branch: Branch, action: Action },
}

impl StepAction {
    /// Interpret one raw statement from [`DataStepSpec::assignments`].
    pub fn parse(statement: &str) -> Option<StepAction> {
        let keyword = first_word(statement);
        let rest = after_first_word(statement);

        if keyword.eq_ignore_ascii_case("if") {
            return Some(match find_keyword(rest, "then") {
                Some(then) => StepAction::Conditional {
                    branch: Branch::If(rest[..then].trim().to_string()),
                    action: Action::parse(&rest[then + 4..])?,
                },
                None => StepAction::Subset { condition: rest.to_string() },
            });
        }

        if keyword.eq_ignore_ascii_case("else") {
            if first_word(rest).eq_ignore_ascii_case("if") {
                let cond_and_action = after_first_word(rest);
                let then = find_keyword(cond_and_action, "then")?;
                return Some(StepAction::Conditional {
                    branch: Branch::ElseIf(cond_and_action[..then].trim().to_string()),
                    action: Action::parse(&cond_and_action[then + 4..])?,
                });
            }
            return Some(StepAction::Conditional { branch: Branch::Else, action: Action::parse(rest)? });
        }

        let (target, expr) = split_assignment(statement)?;
        Some(StepAction::Assign { target, expr })
    }
}

impl Action {
    fn parse(text: &str) -> Option<Action> {
        let text = text.trim();
        if text.eq_ignore_ascii_case("delete") {
            return Some(Action::Delete);
        }
        let (target, expr) = split_assignment(text)?;
        Some(Action::Assign { target, expr })
    }
}
