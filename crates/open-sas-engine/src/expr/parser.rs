//! Expression parser: recursive descent over the token stream.
//!
//! Precedence, loosest first:
//!
//! ```text
//! or  →  and  →  not  →  comparison / IN  →  concat  →  additive
//!     →  multiplicative  →  power (right-assoc)  →  unary  →  primary
//! ```
//!
//! Prefix minus binds tighter than `**`, so `-2**2` is `4` as in SAS.

use miette::Diagnostic;
use thiserror::Error;

use super::ast::{BinOp, Expr, UnaryOp};
use super::lexer::{lex, LexError};
use super::token::{Token, TokenKind};

/// Expression parse error.
#[derive(Debug, Clone, Error, Diagnostic)]
pub enum ExprError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Lex(#[from] LexError),

    #[error("unexpected {found} at offset {offset} (expected {expected})")]
    #[diagnostic(code(osas::expr::unexpected))]
    Unexpected {
        found: String,
        expected: String,
        offset: usize,
    },

    #[error("empty expression")]
    #[diagnostic(code(osas::expr::empty))]
    Empty,
}

/// Parse expression text into an [`Expr`].
pub fn parse_expression(source: &str) -> Result<Expr, ExprError> {
    let tokens = lex(source)?;
    let mut parser = Parser::new(&tokens);
    if parser.peek_kind() == &TokenKind::Eof {
        return Err(ExprError::Empty);
    }
    let expr = parser.parse_expr()?;
    parser.expect(&TokenKind::Eof, "end of expression")?;
    Ok(expr)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn parse_expr(&mut self) -> Result<Expr, ExprError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_and()?;
        while self.peek_kind() == &TokenKind::Or {
            self.advance();
            let right = self.parse_and()?;
            left = binary(left, BinOp::Or, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_not()?;
        while self.peek_kind() == &TokenKind::And {
            self.advance();
            let right = self.parse_not()?;
            left = binary(left, BinOp::And, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ExprError> {
        if self.peek_kind() == &TokenKind::Not {
            self.advance();
            let operand = self.parse_not()?;
            return Ok(Expr::Unary { op: UnaryOp::Not, operand: Box::new(operand) });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExprError> {
        let left = self.parse_concat()?;
        if let Some(op) = self.peek_comparison() {
            self.advance();
            let right = self.parse_concat()?;
            return Ok(binary(left, op, right));
        }
        if self.peek_kind() == &TokenKind::In {
            self.advance();
            let list = self.parse_in_list()?;
            return Ok(Expr::In { operand: Box::new(left), list });
        }
        // `x not in (...)`
        if self.peek_kind() == &TokenKind::Not && self.peek_kind_at(1) == &TokenKind::In {
            self.advance();
            self.advance();
            let list = self.parse_in_list()?;
            let test = Expr::In { operand: Box::new(left), list };
            return Ok(Expr::Unary { op: UnaryOp::Not, operand: Box::new(test) });
        }
        Ok(left)
    }

    /// `( item [,] item ... )`, commas optional as in SAS.
    fn parse_in_list(&mut self) -> Result<Vec<Expr>, ExprError> {
        self.expect(&TokenKind::LParen, "'(' after IN")?;
        let mut list = Vec::new();
        while self.peek_kind() != &TokenKind::RParen {
            list.push(self.parse_unary()?);
            if self.peek_kind() == &TokenKind::Comma {
                self.advance();
            }
            if self.peek_kind() == &TokenKind::Eof {
                break;
            }
        }
        self.expect(&TokenKind::RParen, "')' closing IN list")?;
        Ok(list)
    }

    fn parse_concat(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_additive()?;
        while self.peek_kind() == &TokenKind::Concat {
            self.advance();
            let right = self.parse_additive()?;
            left = binary(left, BinOp::Concat, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_power()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_power()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_power(&mut self) -> Result<Expr, ExprError> {
        let base = self.parse_unary()?;
        if self.peek_kind() == &TokenKind::StarStar {
            self.advance();
            let exponent = self.parse_power()?;
            return Ok(binary(base, BinOp::Pow, exponent));
        }
        Ok(base)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        let op = match self.peek_kind() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Pos,
            _ => return self.parse_primary(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        Ok(Expr::Unary { op, operand: Box::new(operand) })
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        match self.peek_kind().clone() {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Number(n))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Text(s))
            }
            TokenKind::MissingLit => {
                self.advance();
                Ok(Expr::Missing)
            }
            TokenKind::Ident(name) => {
                self.advance();
                if self.peek_kind() != &TokenKind::LParen {
                    return Ok(Expr::Ident(name));
                }
                self.advance(); // skip (
                let mut args = Vec::new();
                if self.peek_kind() != &TokenKind::RParen {
                    args.push(self.parse_expr()?);
                    while self.peek_kind() == &TokenKind::Comma {
                        self.advance();
                        args.push(self.parse_expr()?);
                    }
                }
                self.expect(&TokenKind::RParen, "')' closing argument list")?;
                Ok(Expr::Call { name, args })
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(expr)
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    // -----------------------------------------------------------------------
    // Token utilities
    // -----------------------------------------------------------------------

    fn peek_comparison(&self) -> Option<BinOp> {
        match self.peek_kind() {
            TokenKind::Eq => Some(BinOp::Eq),
            TokenKind::Ne => Some(BinOp::Ne),
            TokenKind::Lt => Some(BinOp::Lt),
            TokenKind::Le => Some(BinOp::Le),
            TokenKind::Gt => Some(BinOp::Gt),
            TokenKind::Ge => Some(BinOp::Ge),
            _ => None,
        }
    }

    fn peek_kind(&self) -> &TokenKind {
        self.peek_kind_at(0)
    }

    fn peek_kind_at(&self, ahead: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + ahead)
            .map_or(&TokenKind::Eof, |t| &t.kind)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> Result<(), ExprError> {
        if self.peek_kind() == kind {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn unexpected(&self, expected: &str) -> ExprError {
        let (found, offset) = match self.tokens.get(self.pos) {
            Some(t) if t.kind != TokenKind::Eof => (format!("{:?}", t.kind), t.offset),
            Some(t) => ("end of input".to_string(), t.offset),
            None => ("end of input".to_string(), 0),
        };
        ExprError::Unexpected { found, expected: expected.to_string(), offset }
    }
}

fn binary(left: Expr, op: BinOp, right: Expr) -> Expr {
    Expr::Binary { left: Box::new(left), op, right: Box::new(right) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Box<Expr> {
        Box::new(Expr::Number(n))
    }

    #[test]
    fn test_precedence_mul_over_add() {
        let e = parse_expression("1 + 2 * 3").unwrap();
        assert_eq!(
            e,
            Expr::Binary {
                left: num(1.0),
                op: BinOp::Add,
                right: Box::new(Expr::Binary { left: num(2.0), op: BinOp::Mul, right: num(3.0) }),
            }
        );
    }

    #[test]
    fn test_power_right_assoc() {
        let e = parse_expression("2 ** 3 ** 2").unwrap();
        assert!(matches!(
            e,
            Expr::Binary { op: BinOp::Pow, ref right, .. }
                if matches!(**right, Expr::Binary { op: BinOp::Pow, .. })
        ));
    }

    #[test]
    fn test_comparison_and_or() {
        let e = parse_expression("x > 1 and y = 'a' or z").unwrap();
        let Expr::Binary { op: BinOp::Or, left, .. } = e else {
            panic!("expected OR at the top");
        };
        assert!(matches!(*left, Expr::Binary { op: BinOp::And, .. }));
    }

    #[test]
    fn test_not_wraps_comparison() {
        let e = parse_expression("not x > 5").unwrap();
        let Expr::Unary { op: UnaryOp::Not, operand } = e else {
            panic!("expected NOT");
        };
        assert!(matches!(*operand, Expr::Binary { op: BinOp::Gt, .. }));
    }

    #[test]
    fn test_function_call() {
        let e = parse_expression("substr(name, 1, 2)").unwrap();
        assert!(matches!(e, Expr::Call { ref name, ref args } if name == "substr" && args.len() == 3));
        assert!(matches!(parse_expression("f()").unwrap(), Expr::Call { ref args, .. } if args.is_empty()));
    }

    #[test]
    fn test_in_list() {
        let e = parse_expression("x in (1, 2 3)").unwrap();
        assert!(matches!(e, Expr::In { ref list, .. } if list.len() == 3));
        let e = parse_expression("x not in ('a')").unwrap();
        assert!(matches!(e, Expr::Unary { op: UnaryOp::Not, .. }));
    }

    #[test]
    fn test_unary_minus() {
        assert_eq!(
            parse_expression("-x").unwrap(),
            Expr::Unary { op: UnaryOp::Neg, operand: Box::new(Expr::Ident("x".into())) }
        );
    }

    #[test]
    fn test_errors() {
        assert!(matches!(parse_expression(""), Err(ExprError::Empty)));
        assert!(matches!(parse_expression("1 +"), Err(ExprError::Unexpected { .. })));
        assert!(matches!(parse_expression("(1"), Err(ExprError::Unexpected { .. })));
        assert!(matches!(parse_expression("a b"), Err(ExprError::Unexpected { .. })));
        assert!(matches!(parse_expression("'x"), Err(ExprError::Lex(_))));
    }
}
