//! Parsing a Proc block into a [`ProcRequest`].

use std::collections::BTreeMap;

use crate::table::TableRef;
use crate::text::{after_first_word, find_unquoted, first_word, split_unquoted, unquote, words};

use super::ProcError;

/// Keywords that open a sub-statement on a new line even when the previous
/// statement was not closed with `;`.
const LINE_STATEMENTS: &[&str] = &["TABLES", "TABLE", "VAR", "BY", "CLASS", "MODEL", "OUTPUT", "WHERE", "ID", "TITLE"];

/// One parsed PROC step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcRequest {
    /// Procedure name, upper-cased.
    pub name: String,
    /// `DATA=` table, if given.
    pub data: Option<TableRef>,
    /// `OUT=` table, if given on the PROC line.
    pub out: Option<TableRef>,
    /// PROC-line options keyed by upper-cased name. Bare flags map to `""`.
    pub options: BTreeMap<String, String>,
    /// Sub-statements in order, as (upper-cased keyword, rest of statement).
    pub statements: Vec<(String, String)>,
}

impl ProcRequest {
    /// Parse the text of one Proc block.
    pub fn parse(block: &str) -> Result<ProcRequest, ProcError> {
        let mut logical = logical_statements(block).into_iter();
        let head = logical.next().ok_or(ProcError::NoProcStatement)?;
        if !first_word(&head).eq_ignore_ascii_case("proc") {
            return Err(ProcError::NoProcStatement);
        }
        let rest = after_first_word(&head);
        let name = first_word(rest).to_ascii_uppercase();
        if name.is_empty() {
            return Err(ProcError::NoProcStatement);
        }

        let options = parse_options(after_first_word(rest));
        let data = table_option(&options, "DATA")?;
        let out = table_option(&options, "OUT")?;

        let statements = logical
            .filter_map(|stmt| {
                let keyword = first_word(&stmt).to_ascii_uppercase();
                match keyword.as_str() {
                    "" | "RUN" | "QUIT" => None,
                    _ => Some((keyword, after_first_word(&stmt).to_string())),
                }
            })
            .collect();

        Ok(ProcRequest { name, data, out, options, statements })
    }

    /// Value of a PROC-line option.
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(&key.to_ascii_uppercase()).map(String::as_str)
    }

    /// Whether a PROC-line option or flag is present.
    pub fn has_option(&self, key: &str) -> bool {
        self.options.contains_key(&key.to_ascii_uppercase())
    }

    /// Text of the first sub-statement with this keyword.
    pub fn statement(&self, keyword: &str) -> Option<&str> {
        self.statements
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(keyword))
            .map(|(_, text)| text.as_str())
    }

    /// Words of every sub-statement with this keyword, concatenated.
    pub fn variables(&self, keyword: &str) -> Vec<String> {
        self.statements
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(keyword))
            .flat_map(|(_, text)| text.split_whitespace().map(str::to_string))
            .collect()
    }

    /// Remove every sub-statement with this keyword and return their texts.
    pub fn take_statements(&mut self, keyword: &str) -> Vec<String> {
        let (taken, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.statements)
            .into_iter()
            .partition(|(k, _)| k.eq_ignore_ascii_case(keyword));
        self.statements = kept;
        taken.into_iter().map(|(_, text)| text).collect()
    }
}

/// Split a block into statements. Besides `;`, a line that starts with one
/// of [`LINE_STATEMENTS`] starts a new statement.
fn logical_statements(block: &str) -> Vec<String> {
    let mut out = Vec::new();
    for piece in split_unquoted(block, ';') {
        let mut current = String::new();
        for line in piece.lines() {
            let word = first_word(line);
            if !current.trim().is_empty() && LINE_STATEMENTS.iter().any(|k| k.eq_ignore_ascii_case(word)) {
                out.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(line.trim());
        }
        out.push(current);
    }
    out.into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse `KEY=VALUE` pairs and bare flags. Whitespace around `=` is allowed
/// and quoted values are unquoted.
pub fn parse_options(text: &str) -> BTreeMap<String, String> {
    let mut options = BTreeMap::new();
    let tight = tighten_equals(text);
    for word in words(&tight) {
        match find_unquoted(word, '=') {
            Some(eq) if eq > 0 => {
                options.insert(word[..eq].to_ascii_uppercase(), unquote(&word[eq + 1..]));
            }
            Some(_) => {}
            None => {
                options.insert(word.to_ascii_uppercase(), String::new());
            }
        }
    }
    options
}

/// Remove unquoted whitespace around `=` so `data = t` reads as `data=t`.
fn tighten_equals(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut quote: Option<char> = None;
    let mut skip_space = false;
    for ch in text.chars() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                }
                out.push(ch);
            }
            None if ch == '=' => {
                let trimmed = out.trim_end().len();
                out.truncate(trimmed);
                out.push('=');
                skip_space = true;
            }
            None if ch.is_whitespace() && skip_space => {}
            None => {
                skip_space = false;
                if ch == '\'' || ch == '"' {
                    quote = Some(ch);
                }
                out.push(ch);
            }
        }
    }
    out
}

fn table_option(options: &BTreeMap<String, String>, key: &str) -> Result<Option<TableRef>, ProcError> {
    match options.get(key) {
        None => Ok(None),
        Some(value) => TableRef::parse(value)
            .map(Some)
            .ok_or_else(|| ProcError::InvalidOption { option: key.to_string(), value: value.clone() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_proc_line() {
        let req = ProcRequest::parse("proc sort data = work.a out=b nodupkey;\n by x;\nrun;").unwrap();
        assert_eq!(req.name, "SORT");
        assert_eq!(req.data, TableRef::parse("work.a"));
        assert_eq!(req.out, TableRef::parse("b"));
        assert!(req.has_option("nodupkey"));
        assert_eq!(req.statements, vec![("BY".to_string(), "x".to_string())]);
    }

    #[test]
    fn test_sub_statements_without_semicolon() {
        let req = ProcRequest::parse("proc means data=t;\n var a b\n class g;\nrun;").unwrap();
        assert_eq!(req.variables("var"), vec!["a", "b"]);
        assert_eq!(req.variables("class"), vec!["g"]);
    }

    #[test]
    fn test_quoted_option_value() {
        let req = ProcRequest::parse("proc print data=t label='a b';\nrun;").unwrap();
        assert_eq!(req.option("LABEL"), Some("a b"));
    }

    #[test]
    fn test_take_statements() {
        let mut req = ProcRequest::parse("proc print data=t; where x > 1; var x; run;").unwrap();
        assert_eq!(req.take_statements("where"), vec!["x > 1"]);
        assert_eq!(req.statements.len(), 1);
    }

    #[test]
    fn test_not_a_proc() {
        assert!(matches!(ProcRequest::parse("data x; run;"), Err(ProcError::NoProcStatement)));
        assert!(matches!(ProcRequest::parse("proc;"), Err(ProcError::NoProcStatement)));
    }

    #[test]
    fn test_invalid_data_option() {
        let err = ProcRequest::parse("proc print data=1abc; run;").unwrap_err();
        assert!(matches!(err, ProcError::InvalidOption { ref option, .. } if option == "DATA"));
    }
}
