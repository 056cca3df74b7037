//! Expression syntax tree.

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal.
    Number(f64),
    /// String literal.
    Text(String),
    /// The missing literal `.`.
    Missing,
    /// Bare identifier: a column if the table has one by that name, otherwise
    /// the identifier's own text.
    Ident(String),
    /// Function call.
    Call { name: String, args: Vec<Expr> },
    /// Prefix operator.
    Unary { op: UnaryOp, operand: Box<Expr> },
    /// Infix operator.
    Binary { left: Box<Expr>, op: BinOp, right: Box<Expr> },
    /// `operand IN (list)`.
    In { operand: Box<Expr>, list: Vec<Expr> },
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

/// Infix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    /// Whether the operator compares its operands.
    pub fn is_comparison(self) -> bool {
        matches!(self, BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge)
    }
}
