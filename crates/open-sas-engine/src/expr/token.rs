//! Expression token types.

/// A lexed token with its byte offset in the expression text.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}

/// Expression token kinds.
///
/// Mnemonic operators (`EQ`, `AND`, `IN`, ...) are recognised by the lexer,
/// so they cannot be used as column names inside an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // -- Literals --
    /// Numeric literal.
    Number(f64),
    /// Quoted string with quotes removed.
    Str(String),
    /// The missing value literal `.`.
    MissingLit,
    /// Column name, function name or bare word.
    Ident(String),

    // -- Operators --
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `**`
    StarStar,
    /// `||` or `!!`
    Concat,
    /// `=`, `==` or `EQ`
    Eq,
    /// `^=`, `~=`, `¬=` or `NE`
    Ne,
    /// `<` or `LT`
    Lt,
    /// `<=` or `LE`
    Le,
    /// `>` or `GT`
    Gt,
    /// `>=` or `GE`
    Ge,
    /// `&` or `AND`
    And,
    /// `|` or `OR`
    Or,
    /// `^`, `~`, `¬` or `NOT`
    Not,
    /// `IN`
    In,

    // -- Delimiters --
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// End of input.
    Eof,
}

impl TokenKind {
    /// Operator keyword for an identifier spelling, if any.
    pub fn keyword(word: &str) -> Option<TokenKind> {
        let kind = match word.to_ascii_uppercase().as_str() {
            "AND" => TokenKind::And,
            "OR" => TokenKind::Or,
            "NOT" => TokenKind::Not,
            "IN" => TokenKind::In,
            "EQ" => TokenKind::Eq,
            "NE" => TokenKind::Ne,
            "LT" => TokenKind::Lt,
            "LE" => TokenKind::Le,
            "GT" => TokenKind::Gt,
            "GE" => TokenKind::Ge,
            _ => return None,
        };
        Some(kind)
    }
}
