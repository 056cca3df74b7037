//! DATALINES / CARDS ingestion with list input.
//!
//! Every data line is split on whitespace and must supply exactly one token
//! per `INPUT` variable. Lines with any other token count are dropped and
//! counted; they are not padded or truncated.

use crate::table::{is_sas_name, Column, ColumnData, Table, TableError, ValueKind};

/// One variable of an `INPUT` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputVariable {
    /// Column name.
    pub name: String,
    /// `Text` when the name is followed by `$`.
    pub kind: ValueKind,
}

/// Variables listed on an `INPUT` statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputSpec {
    /// Variables in order.
    pub variables: Vec<InputVariable>,
}

impl InputSpec {
    /// Parse the text after `INPUT`. Both `name $` and `name$` mark a text
    /// variable; column pointers and other tokens are skipped.
    pub fn parse(text: &str) -> InputSpec {
        let mut variables: Vec<InputVariable> = Vec::new();
        for token in text.split_whitespace() {
            if token == "$" {
                if let Some(last) = variables.last_mut() {
                    last.kind = ValueKind::Text;
                }
                continue;
            }
            let (name, kind) = match token.strip_suffix('$') {
                Some(name) => (name, ValueKind::Text),
                None => (token, ValueKind::Numeric),
            };
            if is_sas_name(name) {
                variables.push(InputVariable { name: name.to_string(), kind });
            }
        }
        InputSpec { variables }
    }
}

/// Result of ingesting literal rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Ingested {
    /// The accepted rows.
    pub table: Table,
    /// Lines dropped for having the wrong number of tokens.
    pub dropped: usize,
}

/// Build a table from data lines. Blank lines are skipped without counting as
/// dropped. A `.` token or a number that does not parse is a missing value.
pub fn ingest(spec: &InputSpec, lines: &[String]) -> Result<Ingested, TableError> {
    let width = spec.variables.len();
    let mut cells: Vec<Vec<&str>> = vec![Vec::new(); width];
    let mut dropped = 0;

    for line in lines {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }
        if tokens.len() != width {
            tracing::debug!(expected = width, found = tokens.len(), line = %line, "datalines row dropped");
            dropped += 1;
            continue;
        }
        for (column, token) in cells.iter_mut().zip(tokens) {
            column.push(token);
        }
    }

    let columns = spec
        .variables
        .iter()
        .zip(cells)
        .map(|(var, tokens)| {
            let data = match var.kind {
                ValueKind::Numeric => ColumnData::Numeric(
                    tokens
                        .iter()
                        .map(|t| t.parse::<f64>().ok().filter(|n| n.is_finite()))
                        .collect(),
                ),
                ValueKind::Text => ColumnData::Text(
                    tokens
                        .iter()
                        .map(|t| (*t != ".").then(|| (*t).to_string()))
                        .collect(),
                ),
            };
            Column::new(var.name.clone(), data)
        })
        .collect();

    Ok(Ingested { table: Table::from_columns(columns)?, dropped })
}
