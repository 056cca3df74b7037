//! Arithmetic, string and boolean expressions over table columns.
//!
//! - [`lexer`] / [`parser`] turn text into an [`Expr`] tree
//! - [`eval`] walks the tree against a table, one column at a time
//! - [`functions`] holds the callable built-ins
//!
//! Expressions and predicates share one grammar: a predicate is an
//! expression whose value is read as true or false per row.

pub mod ast;
pub mod eval;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::{BinOp, Expr, UnaryOp};
pub use eval::{compare, Evaluator, Operand};
pub use functions::{FunctionError, FunctionRegistry};
pub use lexer::LexError;
pub use parser::{parse_expression, ExprError};
