//! In-memory columnar tables.
//!
//! A [`Table`] is an immutable snapshot: every operation below returns a new
//! table and leaves the receiver untouched. The interpreter rebinds a name to
//! the new snapshot after each statement.
//!
//! Missing cells are `None` in both column kinds. `NaN` never appears as
//! data; the evaluator turns non-finite results into missing values before
//! they reach a column.

use std::cmp::Ordering;
use std::fmt;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
//  Errors
// ---------------------------------------------------------------------------

/// Errors raised when assembling a table from columns.
#[derive(Debug, Error, Diagnostic)]
pub enum TableError {
    /// A column's length differs from the table's row count.
    #[error("column '{column}' has {actual} rows, expected {expected}")]
    #[diagnostic(code(osas::table::length_mismatch))]
    LengthMismatch {
        /// Offending column.
        column: String,
        /// Row count of the table.
        expected: usize,
        /// Row count of the column.
        actual: usize,
    },

    /// Two columns share a name (compared case-insensitively).
    #[error("duplicate column name '{column}'")]
    #[diagnostic(code(osas::table::duplicate_column))]
    DuplicateColumn {
        /// The repeated name.
        column: String,
    },
}

// ---------------------------------------------------------------------------
//  Values
// ---------------------------------------------------------------------------

/// Storage kind of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    /// Floating-point numbers.
    Numeric,
    /// Character strings.
    Text,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Numeric => write!(f, "Num"),
            ValueKind::Text => write!(f, "Char"),
        }
    }
}

/// A single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A number.
    Num(f64),
    /// A string.
    Text(String),
    /// The absence of a value.
    Missing,
}

impl Value {
    /// Build a numeric value, mapping non-finite results to missing.
    pub fn number(n: f64) -> Self {
        if n.is_finite() {
            Value::Num(n)
        } else {
            Value::Missing
        }
    }

    /// Numeric 1/0 for a boolean.
    pub fn flag(b: bool) -> Self {
        Value::Num(if b { 1.0 } else { 0.0 })
    }

    /// Whether the value is missing.
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Numeric view. Text converts when it parses as a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            Value::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            Value::Missing => None,
        }
    }

    /// Text view. Missing has no text.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Num(n) => Some(format_number(*n)),
            Value::Text(s) => Some(s.clone()),
            Value::Missing => None,
        }
    }

    /// Truth value used by predicates: non-missing non-zero numbers and
    /// non-blank text are true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Num(n) => *n != 0.0,
            Value::Text(s) => match s.trim().parse::<f64>() {
                Ok(n) => n != 0.0,
                Err(_) => !s.trim().is_empty(),
            },
            Value::Missing => false,
        }
    }

    /// Sort order used by PROC SORT: missing first, numbers before text.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Missing, Value::Missing) => Ordering::Equal,
            (Value::Missing, _) => Ordering::Less,
            (_, Value::Missing) => Ordering::Greater,
            (Value::Num(a), Value::Num(b)) => a.total_cmp(b),
            (Value::Num(_), Value::Text(_)) => Ordering::Less,
            (Value::Text(_), Value::Num(_)) => Ordering::Greater,
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Num(n) => write!(f, "{}", format_number(*n)),
            Value::Text(s) => write!(f, "{s}"),
            Value::Missing => write!(f, "."),
        }
    }
}

/// Format a number the way reports print it: integral values without
/// decimals, others with at most six decimals and no trailing zeros.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        return format!("{}", n as i64);
    }
    let text = format!("{n:.6}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

// ---------------------------------------------------------------------------
//  Columns
// ---------------------------------------------------------------------------

/// The cells of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values")]
pub enum ColumnData {
    /// Numeric cells.
    Numeric(Vec<Option<f64>>),
    /// Text cells.
    Text(Vec<Option<String>>),
}

impl ColumnData {
    /// A column of `len` missing cells.
    pub fn missing(kind: ValueKind, len: usize) -> Self {
        match kind {
            ValueKind::Numeric => ColumnData::Numeric(vec![None; len]),
            ValueKind::Text => ColumnData::Text(vec![None; len]),
        }
    }

    /// Build a column from cell values.
    ///
    /// The column is `Text` if any value is text, otherwise `Numeric`. Numbers
    /// written into a text column keep their report formatting.
    pub fn from_values(values: Vec<Value>) -> Self {
        let kind = if values.iter().any(|v| matches!(v, Value::Text(_))) {
            ValueKind::Text
        } else {
            ValueKind::Numeric
        };
        Self::with_kind(values, kind)
    }

    /// Build a column of the given kind. Text that does not parse becomes
    /// missing in a numeric column.
    pub fn with_kind(values: Vec<Value>, kind: ValueKind) -> Self {
        match kind {
            ValueKind::Text => ColumnData::Text(values.iter().map(Value::as_text).collect()),
            ValueKind::Numeric => ColumnData::Numeric(values.iter().map(Value::as_f64).collect()),
        }
    }

    /// Kind of the column.
    pub fn kind(&self) -> ValueKind {
        match self {
            ColumnData::Numeric(_) => ValueKind::Numeric,
            ColumnData::Text(_) => ValueKind::Text,
        }
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Text(v) => v.len(),
        }
    }

    /// Whether the column has no cells.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cell `row` as a [`Value`]; out-of-range rows read as missing.
    pub fn get(&self, row: usize) -> Value {
        match self {
            ColumnData::Numeric(v) => match v.get(row) {
                Some(Some(n)) => Value::Num(*n),
                _ => Value::Missing,
            },
            ColumnData::Text(v) => match v.get(row) {
                Some(Some(s)) => Value::Text(s.clone()),
                _ => Value::Missing,
            },
        }
    }

    /// All cells as values.
    pub fn values(&self) -> Vec<Value> {
        (0..self.len()).map(|i| self.get(i)).collect()
    }

    /// Number of missing cells.
    pub fn missing_count(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.iter().filter(|c| c.is_none()).count(),
            ColumnData::Text(v) => v.iter().filter(|c| c.is_none()).count(),
        }
    }

    /// Cells at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> Self {
        match self {
            ColumnData::Numeric(v) => {
                ColumnData::Numeric(indices.iter().map(|&i| v.get(i).copied().flatten()).collect())
            }
            ColumnData::Text(v) => {
                ColumnData::Text(indices.iter().map(|&i| v.get(i).cloned().flatten()).collect())
            }
        }
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name as written in the script.
    pub name: String,
    /// Column cells.
    pub data: ColumnData,
}

impl Column {
    /// Create a column.
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self { name: name.into(), data }
    }

    /// Numeric column from plain numbers.
    pub fn numeric(name: impl Into<String>, values: &[f64]) -> Self {
        Self::new(name, ColumnData::Numeric(values.iter().map(|&n| Some(n)).collect()))
    }

    /// Text column from string slices.
    pub fn text(name: impl Into<String>, values: &[&str]) -> Self {
        Self::new(
            name,
            ColumnData::Text(values.iter().map(|s| Some((*s).to_string())).collect()),
        )
    }

    /// Kind of the column.
    pub fn kind(&self) -> ValueKind {
        self.data.kind()
    }
}

// ---------------------------------------------------------------------------
//  Tables
// ---------------------------------------------------------------------------

/// An ordered collection of equally long columns.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<Column>,
    rows: usize,
}

impl Table {
    /// A table with `rows` rows and no columns.
    pub fn new(rows: usize) -> Self {
        Self { columns: Vec::new(), rows }
    }

    /// Assemble a table, checking lengths and name uniqueness.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self, TableError> {
        let rows = columns.first().map_or(0, |c| c.data.len());
        for (i, column) in columns.iter().enumerate() {
            if column.data.len() != rows {
                return Err(TableError::LengthMismatch {
                    column: column.name.clone(),
                    expected: rows,
                    actual: column.data.len(),
                });
            }
            if columns[..i].iter().any(|c| c.name.eq_ignore_ascii_case(&column.name)) {
                return Err(TableError::DuplicateColumn { column: column.name.clone() });
            }
        }
        Ok(Self { columns, rows })
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Columns in order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Position of a column: exact match first, then case-insensitive.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .or_else(|| self.columns.iter().position(|c| c.name.eq_ignore_ascii_case(name)))
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.column_index(name).map(|i| &self.columns[i])
    }

    /// Cell value, or missing when the column or row does not exist.
    pub fn value(&self, row: usize, column: &str) -> Value {
        self.column(column).map_or(Value::Missing, |c| c.data.get(row))
    }

    /// One row as values in column order.
    pub fn row(&self, row: usize) -> Vec<Value> {
        self.columns.iter().map(|c| c.data.get(row)).collect()
    }

    /// Replace the column called `name` (keeping its position and spelling) or
    /// append a new one.
    ///
    /// `data` must have one cell per row.
    pub fn with_column(mut self, name: &str, data: ColumnData) -> Table {
        debug_assert_eq!(data.len(), self.rows, "column length must match row count");
        match self.column_index(name) {
            Some(i) => self.columns[i].data = data,
            None => self.columns.push(Column::new(name, data)),
        }
        self
    }

    /// Rows where `mask` is true.
    pub fn filter(&self, mask: &[bool]) -> Table {
        let indices: Vec<usize> = (0..self.rows).filter(|&i| mask.get(i).copied().unwrap_or(false)).collect();
        self.select_rows(&indices)
    }

    /// Rows at `indices`, in that order.
    pub fn select_rows(&self, indices: &[usize]) -> Table {
        Table {
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), c.data.select(indices)))
                .collect(),
            rows: indices.len(),
        }
    }

    /// Remove the named columns; unknown names are ignored.
    pub fn drop_columns(&self, names: &[String]) -> Table {
        let columns = self
            .columns
            .iter()
            .filter(|c| !names.iter().any(|n| n.eq_ignore_ascii_case(&c.name)))
            .cloned()
            .collect();
        Table { columns, rows: self.rows }
    }

    /// Keep only the named columns, in table order; unknown names are ignored.
    pub fn keep_columns(&self, names: &[String]) -> Table {
        let columns = self
            .columns
            .iter()
            .filter(|c| names.iter().any(|n| n.eq_ignore_ascii_case(&c.name)))
            .cloned()
            .collect();
        Table { columns, rows: self.rows }
    }

    /// Apply `(old, new)` renames; pairs naming unknown columns are ignored.
    pub fn rename_columns(&self, pairs: &[(String, String)]) -> Table {
        let mut table = self.clone();
        for (old, new) in pairs {
            if let Some(i) = table.column_index(old) {
                table.columns[i].name = new.clone();
            }
        }
        table
    }
}

// ---------------------------------------------------------------------------
//  Table references
// ---------------------------------------------------------------------------

/// A possibly library-qualified table name (`lib.name` or `name`).
///
/// Both parts are stored lower-cased; SAS names are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    /// Library alias, `None` when unqualified.
    pub library: Option<String>,
    /// Table name.
    pub name: String,
}

impl TableRef {
    /// Parse `lib.name` or `name`. Returns `None` for anything that is not a
    /// valid SAS name.
    pub fn parse(text: &str) -> Option<TableRef> {
        let text = text.trim();
        let (library, name) = match text.split_once('.') {
            Some((lib, name)) => (Some(lib), name),
            None => (None, text),
        };
        if !is_sas_name(name) || library.is_some_and(|l| !is_sas_name(l)) {
            return None;
        }
        Some(TableRef {
            library: library.map(|l| l.to_ascii_lowercase()),
            name: name.to_ascii_lowercase(),
        })
    }

    /// Library alias, falling back to `default`.
    pub fn library_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.library.as_deref().unwrap_or(default)
    }

    /// Whether the reference lives in the in-memory default library.
    pub fn is_default_library(&self, default: &str) -> bool {
        self.library_or(default).eq_ignore_ascii_case(default)
    }

    /// Workspace key, e.g. `work.sales`.
    pub fn key(&self, default: &str) -> String {
        format!("{}.{}", self.library_or(default).to_ascii_lowercase(), self.name)
    }

    /// Whether this is the `_NULL_` sink.
    pub fn is_null(&self) -> bool {
        self.library.is_none() && self.name == "_null_"
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.library {
            Some(lib) => write!(f, "{lib}.{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Whether `s` is a SAS name: a letter or underscore followed by letters,
/// digits, or underscores.
pub fn is_sas_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_columns(vec![
            Column::text("name", &["a", "b", "c"]),
            Column::numeric("x", &[1.0, 2.0, 3.0]),
        ])
        .unwrap()
    }

    #[test]
    fn test_from_columns_checks_length() {
        let err = Table::from_columns(vec![
            Column::numeric("x", &[1.0, 2.0]),
            Column::numeric("y", &[1.0]),
        ])
        .unwrap_err();
        assert!(matches!(err, TableError::LengthMismatch { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn test_from_columns_rejects_duplicates() {
        let err = Table::from_columns(vec![
            Column::numeric("x", &[1.0]),
            Column::numeric("X", &[2.0]),
        ])
        .unwrap_err();
        assert!(matches!(err, TableError::DuplicateColumn { .. }));
    }

    #[test]
    fn test_column_lookup_case_insensitive() {
        let t = sample();
        assert_eq!(t.column_index("X"), Some(1));
        assert_eq!(t.value(2, "NAME"), Value::Text("c".into()));
        assert_eq!(t.value(5, "x"), Value::Missing);
    }

    #[test]
    fn test_filter_and_select() {
        let t = sample();
        let f = t.filter(&[true, false, true]);
        assert_eq!(f.row_count(), 2);
        assert_eq!(f.value(1, "x"), Value::Num(3.0));
        // Receiver is untouched.
        assert_eq!(t.row_count(), 3);

        let s = t.select_rows(&[2, 0]);
        assert_eq!(s.row(0), vec![Value::Text("c".into()), Value::Num(3.0)]);
    }

    #[test]
    fn test_with_column_replaces_in_place() {
        let t = sample().with_column("X", ColumnData::Numeric(vec![None, Some(9.0), None]));
        assert_eq!(t.column_names(), vec!["name", "x"]);
        assert_eq!(t.value(1, "x"), Value::Num(9.0));

        let t = t.with_column("y", ColumnData::missing(ValueKind::Text, 3));
        assert_eq!(t.column_count(), 3);
    }

    #[test]
    fn test_drop_keep_rename() {
        let t = sample();
        assert_eq!(t.drop_columns(&["NAME".into()]).column_names(), vec!["x"]);
        assert_eq!(t.keep_columns(&["x".into(), "zzz".into()]).column_names(), vec!["x"]);
        let r = t.rename_columns(&[("x".into(), "z".into()), ("nope".into(), "q".into())]);
        assert_eq!(r.column_names(), vec!["name", "z"]);
    }

    #[test]
    fn test_from_values_kind_inference() {
        let c = ColumnData::from_values(vec![Value::Missing, Value::Num(2.0)]);
        assert_eq!(c, ColumnData::Numeric(vec![None, Some(2.0)]));

        let c = ColumnData::from_values(vec![Value::Num(1.5), Value::Text("Hi".into()), Value::Missing]);
        assert_eq!(
            c,
            ColumnData::Text(vec![Some("1.5".into()), Some("Hi".into()), None])
        );
    }

    #[test]
    fn test_value_truthiness() {
        assert!(Value::Num(2.0).is_truthy());
        assert!(!Value::Num(0.0).is_truthy());
        assert!(!Value::Missing.is_truthy());
        assert!(Value::Text("x".into()).is_truthy());
        assert!(!Value::Text("  ".into()).is_truthy());
        assert!(!Value::Text("0".into()).is_truthy());
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(2.0), "2");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(1.0 / 3.0), "0.333333");
        assert_eq!(Value::Missing.to_string(), ".");
    }

    #[test]
    fn test_non_finite_becomes_missing() {
        assert_eq!(Value::number(f64::NAN), Value::Missing);
        assert_eq!(Value::number(f64::INFINITY), Value::Missing);
    }

    #[test]
    fn test_table_ref_parse() {
        let r = TableRef::parse("Lib.Sales").unwrap();
        assert_eq!(r.library.as_deref(), Some("lib"));
        assert_eq!(r.name, "sales");
        assert_eq!(r.key("work"), "lib.sales");
        assert!(!r.is_default_library("work"));

        let r = TableRef::parse("t").unwrap();
        assert_eq!(r.key("work"), "work.t");
        assert!(r.is_default_library("work"));
        assert!(TableRef::parse("work.t").unwrap().is_default_library("work"));

        assert!(TableRef::parse("1abc").is_none());
        assert!(TableRef::parse("a.b.c").is_none());
        assert!(TableRef::parse("_NULL_").unwrap().is_null());
    }

    #[test]
    fn test_serde_round_trip_keeps_missing() {
        let t = Table::from_columns(vec![Column::new(
            "x",
            ColumnData::Numeric(vec![Some(1.0), None]),
        )])
        .unwrap();
        let json = serde_json::to_string(&t).unwrap();
        assert!(json.contains("null"));
        let back: Table = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_sort_cmp_missing_first() {
        assert_eq!(Value::Missing.sort_cmp(&Value::Num(-5.0)), Ordering::Less);
        assert_eq!(Value::Num(1.0).sort_cmp(&Value::Num(2.0)), Ordering::Less);
        assert_eq!(Value::Text("b".into()).sort_cmp(&Value::Text("a".into())), Ordering::Greater);
    }
}
