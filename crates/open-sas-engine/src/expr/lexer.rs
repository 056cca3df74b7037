//! Expression lexer.
//!
//! Lexical rules:
//! - Strings: `'...'` or `"..."`, a doubled quote escapes the quote character
//! - Numbers: `12`, `3.5`, `.5`, `1e3`; a lone `.` is the missing literal
//! - Identifiers: letters, digits, `_`; mnemonic operators become operator tokens
//! - `**` is exponentiation, `||`/`!!` concatenation

use miette::Diagnostic;
use thiserror::Error;

use super::token::{Token, TokenKind};

/// Lexer error.
#[derive(Debug, Clone, Error, Diagnostic)]
pub enum LexError {
    #[error("unterminated string starting at offset {offset}")]
    #[diagnostic(code(osas::expr::unterminated_string))]
    UnterminatedString { offset: usize },

    #[error("unexpected character '{ch}' at offset {offset}")]
    #[diagnostic(code(osas::expr::unexpected_char))]
    UnexpectedChar { ch: char, offset: usize },
}

/// Tokenize an expression. The result always ends with [`TokenKind::Eof`].
pub fn lex(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).tokenize()
}

struct Lexer {
    chars: Vec<(usize, char)>,
    pos: usize,
    len: usize,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.char_indices().collect(),
            pos: 0,
            len: source.len(),
        }
    }

    fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        while let Some(c) = self.peek() {
            let offset = self.offset();
            let kind = match c {
                c if c.is_whitespace() => {
                    self.advance();
                    continue;
                }
                '\'' | '"' => self.lex_string(c)?,
                c if c.is_ascii_digit() => self.lex_number(),
                '.' if self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) => self.lex_number(),
                '.' => {
                    self.advance();
                    TokenKind::MissingLit
                }
                c if c.is_alphabetic() || c == '_' => {
                    let word = self.lex_word();
                    TokenKind::keyword(&word).unwrap_or(TokenKind::Ident(word))
                }
                _ => self.lex_operator(c, offset)?,
            };
            tokens.push(Token { kind, offset });
        }

        tokens.push(Token { kind: TokenKind::Eof, offset: self.len });
        Ok(tokens)
    }

    fn lex_operator(&mut self, c: char, offset: usize) -> Result<TokenKind, LexError> {
        let next = self.peek_at(1);
        let (kind, width) = match (c, next) {
            ('*', Some('*')) => (TokenKind::StarStar, 2),
            ('*', _) => (TokenKind::Star, 1),
            ('+', _) => (TokenKind::Plus, 1),
            ('-', _) => (TokenKind::Minus, 1),
            ('/', _) => (TokenKind::Slash, 1),
            ('(', _) => (TokenKind::LParen, 1),
            (')', _) => (TokenKind::RParen, 1),
            (',', _) => (TokenKind::Comma, 1),
            ('|', Some('|')) | ('!', Some('!')) => (TokenKind::Concat, 2),
            ('|', _) => (TokenKind::Or, 1),
            ('&', _) => (TokenKind::And, 1),
            ('=', Some('=')) => (TokenKind::Eq, 2),
            ('=', _) => (TokenKind::Eq, 1),
            ('^' | '~' | '¬', Some('=')) => (TokenKind::Ne, 2),
            ('^' | '~' | '¬', _) => (TokenKind::Not, 1),
            ('<', Some('=')) => (TokenKind::Le, 2),
            ('<', _) => (TokenKind::Lt, 1),
            ('>', Some('=')) => (TokenKind::Ge, 2),
            ('>', _) => (TokenKind::Gt, 1),
            _ => return Err(LexError::UnexpectedChar { ch: c, offset }),
        };
        for _ in 0..width {
            self.advance();
        }
        Ok(kind)
    }

    fn lex_string(&mut self, quote: char) -> Result<TokenKind, LexError> {
        let start = self.offset();
        self.advance();
        let mut value = String::new();
        loop {
            match self.peek() {
                None => return Err(LexError::UnterminatedString { offset: start }),
                Some(c) if c == quote => {
                    self.advance();
                    if self.peek() == Some(quote) {
                        value.push(quote);
                        self.advance();
                    } else {
                        return Ok(TokenKind::Str(value));
                    }
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
    }

    fn lex_number(&mut self) -> TokenKind {
        let mut text = String::new();
        while let Some(c) = self.peek().filter(|c| c.is_ascii_digit() || *c == '.') {
            text.push(c);
            self.advance();
        }
        // Exponent only when digits follow, so `1e` stays `1` then `e`.
        if matches!(self.peek(), Some('e' | 'E')) {
            let sign = matches!(self.peek_at(1), Some('+' | '-'));
            let digit_at = if sign { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                for _ in 0..digit_at {
                    text.push(self.peek().unwrap_or('e'));
                    self.advance();
                }
                while let Some(c) = self.peek().filter(char::is_ascii_digit) {
                    text.push(c);
                    self.advance();
                }
            }
        }
        match text.parse::<f64>() {
            Ok(n) => TokenKind::Number(n),
            // e.g. `1.2.3`
            Err(_) => TokenKind::Ident(text),
        }
    }

    fn lex_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self.peek().filter(|c| c.is_alphanumeric() || *c == '_') {
            word.push(c);
            self.advance();
        }
        word
    }

    // -----------------------------------------------------------------------
    // Cursor utilities
    // -----------------------------------------------------------------------

    fn peek(&self) -> Option<char> {
        self.peek_at(0)
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).map(|&(_, c)| c)
    }

    fn offset(&self) -> usize {
        self.chars.get(self.pos).map_or(self.len, |&(i, _)| i)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_lex_arithmetic() {
        assert_eq!(
            kinds("a + 2.5 ** b"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Plus,
                TokenKind::Number(2.5),
                TokenKind::StarStar,
                TokenKind::Ident("b".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lex_strings() {
        assert_eq!(kinds("'it''s'")[0], TokenKind::Str("it's".into()));
        assert_eq!(kinds("\"a;b\"")[0], TokenKind::Str("a;b".into()));
        assert!(matches!(lex("'open"), Err(LexError::UnterminatedString { offset: 0 })));
    }

    #[test]
    fn test_lex_comparisons_and_mnemonics() {
        assert_eq!(
            kinds("x ^= 1 and y ge 2 or not z in (1)"),
            vec![
                TokenKind::Ident("x".into()),
                TokenKind::Ne,
                TokenKind::Number(1.0),
                TokenKind::And,
                TokenKind::Ident("y".into()),
                TokenKind::Ge,
                TokenKind::Number(2.0),
                TokenKind::Or,
                TokenKind::Not,
                TokenKind::Ident("z".into()),
                TokenKind::In,
                TokenKind::LParen,
                TokenKind::Number(1.0),
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lex_numbers() {
        assert_eq!(kinds(".5")[0], TokenKind::Number(0.5));
        assert_eq!(kinds("1e3")[0], TokenKind::Number(1000.0));
        assert_eq!(kinds("2E-1")[0], TokenKind::Number(0.2));
        assert_eq!(kinds("x = .")[2], TokenKind::MissingLit);
    }

    #[test]
    fn test_lex_concat() {
        assert_eq!(kinds("a || b")[1], TokenKind::Concat);
        assert_eq!(kinds("a | b")[1], TokenKind::Or);
    }

    #[test]
    fn test_lex_unexpected_char() {
        assert!(matches!(lex("a # b"), Err(LexError::UnexpectedChar { ch: '#', offset: 2 })));
    }
}
