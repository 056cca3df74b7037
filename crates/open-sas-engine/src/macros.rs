//! Macro variables: `%LET` bindings and `&name` substitution.
//!
//! Substitution is plain text replacement applied to one statement block
//! before it is parsed. Substituted values are not rescanned, so a value that
//! itself contains `&x` is inserted literally.

use std::collections::BTreeMap;

use miette::Diagnostic;
use thiserror::Error;

use crate::text::{after_first_word, first_word, opens_datalines};

/// Errors raised by the macro pass.
#[derive(Debug, Error, Diagnostic)]
pub enum MacroError {
    /// `&name` with no binding.
    #[error("apparent symbolic reference {name} not resolved")]
    #[diagnostic(code(osas::macro_unresolved), help("define it first with %LET {name} = value;"))]
    Unresolved {
        /// Referenced name, upper-cased.
        name: String,
    },

    /// `%LET` without `name = value`.
    #[error("invalid %LET statement: {text}")]
    #[diagnostic(code(osas::macro_invalid_let))]
    InvalidLet {
        /// Statement text.
        text: String,
    },
}

/// Session macro variables. Names are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MacroTable {
    vars: BTreeMap<String, String>,
}

impl MacroTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name`, replacing any previous value.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.vars.insert(name.to_ascii_uppercase(), value.into());
    }

    /// Current value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(&name.to_ascii_uppercase()).map(String::as_str)
    }

    /// Remove a binding.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.vars.remove(&name.to_ascii_uppercase())
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether no variables are bound.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Bindings in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Replace every `&name` / `&name.` outside single quotes.
    pub fn resolve(&self, text: &str) -> Result<String, MacroError> {
        let mut out = String::with_capacity(text.len());
        // Only the quote character that opened a string can close it, so an
        // apostrophe inside "..." does not start a single-quoted span.
        let mut quote: Option<char> = None;
        let mut chars = text.char_indices().peekable();

        while let Some((i, ch)) = chars.next() {
            if ch == '\'' || ch == '"' {
                match quote {
                    Some(q) if q == ch => quote = None,
                    Some(_) => {}
                    None => quote = Some(ch),
                }
                out.push(ch);
                continue;
            }
            let starts_name = chars
                .peek()
                .is_some_and(|&(_, next)| next.is_ascii_alphabetic() || next == '_');
            if ch != '&' || quote == Some('\'') || !starts_name {
                out.push(ch);
                continue;
            }

            let name_start = i + 1;
            let mut name_end = name_start;
            while let Some(&(j, c)) = chars.peek() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    name_end = j + c.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            // A single trailing '.' ends the reference and is consumed.
            if chars.peek().is_some_and(|&(_, c)| c == '.') {
                chars.next();
            }

            let name = &text[name_start..name_end];
            match self.get(name) {
                Some(value) => out.push_str(value),
                None => return Err(MacroError::Unresolved { name: name.to_ascii_uppercase() }),
            }
        }
        Ok(out)
    }

    /// Resolve a statement block, leaving DATALINES sections untouched.
    pub fn resolve_block(&self, block: &str) -> Result<String, MacroError> {
        let mut out = String::with_capacity(block.len());
        let mut in_datalines = false;
        for line in block.split_inclusive('\n') {
            if in_datalines {
                out.push_str(line);
                if line.trim() == ";" {
                    in_datalines = false;
                }
                continue;
            }
            let resolved = self.resolve(line)?;
            in_datalines = opens_datalines(resolved.trim_end_matches('\n'));
            out.push_str(&resolved);
        }
        Ok(out)
    }
}

/// Parse `%LET name = value;` into its name and trimmed value.
pub fn parse_let(statement: &str) -> Result<(String, String), MacroError> {
    let invalid = || MacroError::InvalidLet { text: statement.trim().to_string() };
    let body = statement.trim().trim_end_matches(';');
    if !first_word(body).eq_ignore_ascii_case("%let") {
        return Err(invalid());
    }
    let rest = after_first_word(body);
    let (name, value) = rest.split_once('=').ok_or_else(invalid)?;
    let name = name.trim();
    if !crate::table::is_sas_name(name) {
        return Err(invalid());
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Text of a `%PUT` statement.
pub fn parse_put(statement: &str) -> String {
    let body = statement.trim().trim_end_matches(';');
    after_first_word(body).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> MacroTable {
        let mut m = MacroTable::new();
        m.set("lib", "work");
        m.set("N", "3");
        m
    }

    #[test]
    fn test_resolve_basic() {
        let m = table();
        assert_eq!(m.resolve("data &lib..t;").unwrap(), "data work.t;");
        assert_eq!(m.resolve("x = &n + 1;").unwrap(), "x = 3 + 1;");
        assert_eq!(m.resolve("title \"&LIB\";").unwrap(), "title \"work\";");
    }

    #[test]
    fn test_single_quotes_not_resolved() {
        let m = table();
        assert_eq!(m.resolve("x = '&n';").unwrap(), "x = '&n';");
    }

    #[test]
    fn test_apostrophe_inside_double_quotes() {
        let mut m = MacroTable::new();
        m.set("yr", "2024");
        assert_eq!(m.resolve("s = \"Bob's &yr\"; t = '&yr';").unwrap(), "s = \"Bob's 2024\"; t = '&yr';");
        assert_eq!(m.resolve("u = 'say \"&yr\"' || \"&yr\";").unwrap(), "u = 'say \"&yr\"' || \"2024\";");
    }

    #[test]
    fn test_ampersand_operator_untouched() {
        let m = table();
        assert_eq!(m.resolve("where a > 1 & b < 2;").unwrap(), "where a > 1 & b < 2;");
    }

    #[test]
    fn test_unresolved_reference() {
        let m = table();
        let err = m.resolve("x = &missing;").unwrap_err();
        assert!(matches!(err, MacroError::Unresolved { ref name } if name == "MISSING"));
    }

    #[test]
    fn test_no_rescan() {
        let mut m = MacroTable::new();
        m.set("a", "&b");
        assert_eq!(m.resolve("&a").unwrap(), "&b");
    }

    #[test]
    fn test_resolve_block_skips_datalines() {
        let m = table();
        let block = "data t;\ninput a $;\ndatalines;\n&undefined\n;\nx = &n;\nrun;";
        let out = m.resolve_block(block).unwrap();
        assert!(out.contains("&undefined"));
        assert!(out.contains("x = 3;"));
    }

    #[test]
    fn test_set_replaces_value() {
        let mut m = table();
        m.set("n", "4");
        assert_eq!(m.get("N"), Some("4"));
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn test_parse_let() {
        assert_eq!(parse_let("%let x =  hello world ;").unwrap(), ("x".into(), "hello world".into()));
        assert_eq!(parse_let("%LET eq = a=b;").unwrap(), ("eq".into(), "a=b".into()));
        assert!(matches!(parse_let("%let = 1;"), Err(MacroError::InvalidLet { .. })));
        assert!(matches!(parse_let("%let novalue;"), Err(MacroError::InvalidLet { .. })));
    }

    #[test]
    fn test_parse_put() {
        assert_eq!(parse_put("%put value is 3;"), "value is 3");
    }
}
