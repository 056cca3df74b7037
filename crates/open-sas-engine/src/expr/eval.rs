//! Column-at-a-time expression evaluation.
//!
//! An expression is evaluated once against a whole table. Literals stay
//! scalar until they meet a column, so `x + 1` walks the column once and
//! `upcase('a')` is computed a single time and broadcast.
//!
//! Evaluation never fails. Text that does not parse evaluates to an
//! all-missing column; an unknown function or a call with the wrong number of
//! arguments evaluates to zero. Each such fallback is logged and kept on the
//! [`Evaluator`] so the caller can report it.

use std::cmp::Ordering;

use crate::table::{ColumnData, Table, Value};

use super::ast::{BinOp, Expr, UnaryOp};
use super::functions::FunctionRegistry;
use super::parser::parse_expression;

/// An intermediate result: one value for every row, or one per row.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Same value on every row.
    Scalar(Value),
    /// One value per row.
    Column(Vec<Value>),
}

impl Operand {
    /// Value on `row`.
    pub fn at(&self, row: usize) -> Value {
        match self {
            Operand::Scalar(v) => v.clone(),
            Operand::Column(vs) => vs.get(row).cloned().unwrap_or(Value::Missing),
        }
    }

    /// Expand to exactly `rows` values.
    pub fn into_values(self, rows: usize) -> Vec<Value> {
        match self {
            Operand::Scalar(v) => vec![v; rows],
            Operand::Column(vs) => vs,
        }
    }
}

/// Evaluates expressions against one table.
pub struct Evaluator<'a> {
    table: &'a Table,
    functions: &'a FunctionRegistry,
    fallbacks: Vec<String>,
}

impl<'a> Evaluator<'a> {
    /// Create an evaluator over `table`.
    pub fn new(table: &'a Table, functions: &'a FunctionRegistry) -> Self {
        Self { table, functions, fallbacks: Vec::new() }
    }

    /// Fallback messages recorded so far.
    pub fn fallbacks(&self) -> &[String] {
        &self.fallbacks
    }

    /// Drain the recorded fallback messages.
    pub fn take_fallbacks(&mut self) -> Vec<String> {
        std::mem::take(&mut self.fallbacks)
    }

    /// Evaluate expression text to one value per row.
    pub fn values(&mut self, source: &str) -> Vec<Value> {
        let rows = self.table.row_count();
        match parse_expression(source) {
            Ok(expr) => self.eval(&expr).into_values(rows),
            Err(err) => {
                self.fallback(format!("cannot evaluate '{}': {err}; using missing values", source.trim()));
                vec![Value::Missing; rows]
            }
        }
    }

    /// Evaluate expression text to a column.
    pub fn column(&mut self, source: &str) -> ColumnData {
        ColumnData::from_values(self.values(source))
    }

    /// Evaluate a predicate to a row mask.
    pub fn mask(&mut self, source: &str) -> Vec<bool> {
        self.values(source).iter().map(Value::is_truthy).collect()
    }

    /// Evaluate a parsed expression.
    pub fn eval(&mut self, expr: &Expr) -> Operand {
        match expr {
            Expr::Number(n) => Operand::Scalar(Value::number(*n)),
            Expr::Text(s) => Operand::Scalar(Value::Text(s.clone())),
            Expr::Missing => Operand::Scalar(Value::Missing),
            Expr::Ident(name) => match self.table.column(name) {
                Some(column) => Operand::Column(column.data.values()),
                // Not a column: the word stands for itself.
                None => Operand::Scalar(Value::Text(name.clone())),
            },
            Expr::Call { name, args } => self.eval_call(name, args),
            Expr::Unary { op, operand } => {
                let value = self.eval(operand);
                map1(value, |v| unary_value(*op, v))
            }
            Expr::Binary { left, op, right } => {
                let l = self.eval(left);
                let r = self.eval(right);
                map2(l, r, |a, b| binary_value(*op, a, b))
            }
            Expr::In { operand, list } => {
                let value = self.eval(operand);
                let items: Vec<Operand> = list.iter().map(|item| self.eval(item)).collect();
                self.eval_in(value, &items)
            }
        }
    }

    fn eval_call(&mut self, name: &str, args: &[Expr]) -> Operand {
        if !self.functions.exists(name) {
            self.fallback(format!("unknown function {}; using 0", name.to_ascii_uppercase()));
            return Operand::Scalar(Value::Num(0.0));
        }
        let operands: Vec<Operand> = args.iter().map(|arg| self.eval(arg)).collect();

        if operands.iter().all(|o| matches!(o, Operand::Scalar(_))) {
            let values: Vec<Value> = operands.iter().map(|o| o.at(0)).collect();
            return match self.functions.invoke(name, &values) {
                Ok(v) => Operand::Scalar(v),
                Err(err) => {
                    self.fallback(format!("{err}; using 0"));
                    Operand::Scalar(Value::Num(0.0))
                }
            };
        }

        let rows = self.table.row_count();
        let mut out = Vec::with_capacity(rows);
        for row in 0..rows {
            let values: Vec<Value> = operands.iter().map(|o| o.at(row)).collect();
            match self.functions.invoke(name, &values) {
                Ok(v) => out.push(v),
                Err(err) => {
                    self.fallback(format!("{err}; using 0"));
                    return Operand::Scalar(Value::Num(0.0));
                }
            }
        }
        Operand::Column(out)
    }

    fn eval_in(&self, value: Operand, items: &[Operand]) -> Operand {
        let test = |row: usize, v: &Value| {
            items
                .iter()
                .any(|item| compare(BinOp::Eq, v, &item.at(row)))
        };
        let all_scalar = items.iter().all(|o| matches!(o, Operand::Scalar(_)));
        match value {
            Operand::Scalar(v) if all_scalar => Operand::Scalar(Value::flag(test(0, &v))),
            other => {
                let rows = self.table.row_count();
                Operand::Column((0..rows).map(|row| Value::flag(test(row, &other.at(row)))).collect())
            }
        }
    }

    fn fallback(&mut self, message: String) {
        tracing::warn!(message = %message, "evaluation fallback");
        self.fallbacks.push(message);
    }
}

// ---------------------------------------------------------------------------
// Broadcasting
// ---------------------------------------------------------------------------

fn map1(operand: Operand, f: impl Fn(&Value) -> Value) -> Operand {
    match operand {
        Operand::Scalar(v) => Operand::Scalar(f(&v)),
        Operand::Column(vs) => Operand::Column(vs.iter().map(f).collect()),
    }
}

fn map2(left: Operand, right: Operand, f: impl Fn(&Value, &Value) -> Value) -> Operand {
    match (left, right) {
        (Operand::Scalar(a), Operand::Scalar(b)) => Operand::Scalar(f(&a, &b)),
        (Operand::Scalar(a), Operand::Column(b)) => Operand::Column(b.iter().map(|y| f(&a, y)).collect()),
        (Operand::Column(a), Operand::Scalar(b)) => Operand::Column(a.iter().map(|x| f(x, &b)).collect()),
        (Operand::Column(a), Operand::Column(b)) => {
            Operand::Column(a.iter().zip(&b).map(|(x, y)| f(x, y)).collect())
        }
    }
}

// ---------------------------------------------------------------------------
// Scalar semantics
// ---------------------------------------------------------------------------

fn unary_value(op: UnaryOp, v: &Value) -> Value {
    match op {
        UnaryOp::Neg => v.as_f64().map_or(Value::Missing, |n| Value::number(-n)),
        UnaryOp::Pos => v.as_f64().map_or(Value::Missing, Value::number),
        UnaryOp::Not => Value::flag(!v.is_truthy()),
    }
}

fn binary_value(op: BinOp, a: &Value, b: &Value) -> Value {
    match op {
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Pow => {
            let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) else {
                return Value::Missing;
            };
            let result = match op {
                BinOp::Add => x + y,
                BinOp::Sub => x - y,
                BinOp::Mul => x * y,
                BinOp::Div if y == 0.0 => return Value::Missing,
                BinOp::Div => x / y,
                _ => x.powf(y),
            };
            Value::number(result)
        }
        BinOp::Concat => {
            let mut s = a.as_text().unwrap_or_default();
            s.push_str(&b.as_text().unwrap_or_default());
            Value::Text(s)
        }
        BinOp::And => Value::flag(a.is_truthy() && b.is_truthy()),
        BinOp::Or => Value::flag(a.is_truthy() || b.is_truthy()),
        cmp => Value::flag(compare(cmp, a, b)),
    }
}

/// Apply a comparison operator.
///
/// Missing equals only missing; ordering comparisons involving a missing
/// operand are false. A number compared with text that parses as a number is
/// compared numerically, otherwise both sides compare as text with trailing
/// blanks ignored.
pub fn compare(op: BinOp, a: &Value, b: &Value) -> bool {
    let ordering = match (a, b) {
        (Value::Missing, Value::Missing) => return matches!(op, BinOp::Eq),
        (Value::Missing, _) | (_, Value::Missing) => return matches!(op, BinOp::Ne),
        (Value::Num(x), Value::Num(y)) => x.partial_cmp(y),
        (Value::Text(x), Value::Text(y)) => Some(x.trim_end().cmp(y.trim_end())),
        (num, text) => match (num.as_f64(), text.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => {
                let (x, y) = (num.as_text().unwrap_or_default(), text.as_text().unwrap_or_default());
                Some(x.trim_end().cmp(y.trim_end()))
            }
        },
    };
    let Some(ordering) = ordering else {
        return false;
    };
    match op {
        BinOp::Eq => ordering == Ordering::Equal,
        BinOp::Ne => ordering != Ordering::Equal,
        BinOp::Lt => ordering == Ordering::Less,
        BinOp::Le => ordering != Ordering::Greater,
        BinOp::Gt => ordering == Ordering::Greater,
        BinOp::Ge => ordering != Ordering::Less,
        _ => false,
    }
}
