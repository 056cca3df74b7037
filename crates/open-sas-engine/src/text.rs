//! Quote-aware scanning helpers shared by the segmenter and statement parsers.
//!
//! A quoted span starts at an unmatched `'` or `"` and ends at the next
//! identical quote character. Doubled quotes inside a span (`'it''s'`) close
//! and immediately reopen it, which every helper here treats correctly.

/// Split `text` at every unquoted `delim`. The delimiter is not included.
/// A trailing piece without a delimiter is returned as well.
pub fn split_unquoted(text: &str, delim: char) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, ch) in text.char_indices() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None if ch == '\'' || ch == '"' => quote = Some(ch),
            None if ch == delim => {
                pieces.push(&text[start..i]);
                start = i + ch.len_utf8();
            }
            None => {}
        }
    }
    pieces.push(&text[start..]);
    pieces
}

/// Split a block into `;`-terminated statements, trimmed, dropping empties.
pub fn statements(text: &str) -> Vec<&str> {
    split_unquoted(text, ';')
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Byte offset of the first unquoted `target` character on one line.
pub fn find_unquoted(line: &str, target: char) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, ch) in line.char_indices() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None if ch == '\'' || ch == '"' => quote = Some(ch),
            None if ch == target => return Some(i),
            None => {}
        }
    }
    None
}

/// Whitespace-separated words, keeping quoted spans (with their quotes)
/// inside a single word.
pub fn words(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut quote: Option<char> = None;
    let mut start: Option<usize> = None;
    for (i, ch) in text.char_indices() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None if ch.is_whitespace() => {
                if let Some(s) = start.take() {
                    out.push(&text[s..i]);
                }
            }
            None => {
                if ch == '\'' || ch == '"' {
                    quote = Some(ch);
                }
                if start.is_none() {
                    start = Some(i);
                }
            }
        }
    }
    if let Some(s) = start {
        out.push(&text[s..]);
    }
    out
}

/// The leading word of a statement, up to whitespace, `;`, `=` or `(`.
pub fn first_word(text: &str) -> &str {
    let text = text.trim_start();
    let end = text
        .find(|c: char| c.is_whitespace() || c == ';' || c == '=' || c == '(')
        .unwrap_or(text.len());
    &text[..end]
}

/// Text after the leading word, trimmed.
pub fn after_first_word(text: &str) -> &str {
    let text = text.trim_start();
    let word = first_word(text);
    text[word.len()..].trim()
}

/// Byte offset of `keyword` as a whole word outside quotes, case-insensitive.
pub fn find_keyword(text: &str, keyword: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let klen = keyword.len();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'\'' || b == b'"' => quote = Some(b),
            None => {
                let boundary_before = i == 0 || !is_word_byte(bytes[i - 1]);
                let end = i + klen;
                if boundary_before
                    && end <= bytes.len()
                    && text.is_char_boundary(end)
                    && text[i..end].eq_ignore_ascii_case(keyword)
                    && (end == bytes.len() || !is_word_byte(bytes[end]))
                {
                    return Some(i);
                }
            }
        }
        i += 1;
    }
    None
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Remove one level of matching surrounding quotes and undouble inner quotes.
pub fn unquote(text: &str) -> String {
    let text = text.trim();
    let mut chars = text.chars();
    match (chars.next(), chars.next_back()) {
        (Some(open), Some(close)) if (open == '\'' || open == '"') && open == close && text.len() >= 2 => {
            let inner = &text[1..text.len() - 1];
            let doubled: String = [open, open].iter().collect();
            inner.replace(&doubled, &open.to_string())
        }
        _ => text.to_string(),
    }
}

/// Whether a `;`-free statement body is `DATALINES` or `CARDS`.
pub fn is_datalines_keyword(statement: &str) -> bool {
    let s = statement.trim();
    s.eq_ignore_ascii_case("datalines") || s.eq_ignore_ascii_case("cards")
}

/// Where literal data sits on a line holding a `DATALINES;` / `CARDS;`
/// statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatalinesMark {
    /// Byte offset just past the statement's `;`.
    pub data_start: usize,
    /// Offset of the `;` that closes the data, when it is on the same line.
    pub data_end: Option<usize>,
}

/// Find a terminated `DATALINES;` / `CARDS;` statement on a physical line.
/// Data is never quoted, so the first `;` after the statement closes it.
pub fn find_datalines(line: &str) -> Option<DatalinesMark> {
    let mut start = 0;
    while let Some(rel) = find_unquoted(&line[start..], ';') {
        let end = start + rel;
        if is_datalines_keyword(&line[start..end]) {
            let data_start = end + 1;
            let data_end = line[data_start..].find(';').map(|j| data_start + j);
            return Some(DatalinesMark { data_start, data_end });
        }
        start = end + 1;
    }
    None
}

/// Whether the literal data opened on this line continues on the following
/// lines, up to a line holding only `;`.
pub fn opens_datalines(line: &str) -> bool {
    find_datalines(line).is_some_and(|mark| mark.data_end.is_none())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_respects_quotes() {
        assert_eq!(split_unquoted("x = \"a;b\"; y = 1;", ';'), vec!["x = \"a;b\"", " y = 1", ""]);
        assert_eq!(split_unquoted("a='it''s;'; b", ';'), vec!["a='it''s;'", " b"]);
    }

    #[test]
    fn test_statements_trimmed() {
        assert_eq!(statements(" data a;\n set b ;\n;run;"), vec!["data a", "set b", "run"]);
    }

    #[test]
    fn test_find_unquoted() {
        assert_eq!(find_unquoted("x = 'a*b' * 2", '*'), Some(10));
        assert_eq!(find_unquoted("x = 'a*b'", '*'), None);
    }

    #[test]
    fn test_words_keep_quotes() {
        assert_eq!(words("libname lib 'my dir' ;"), vec!["libname", "lib", "'my dir'", ";"]);
        assert_eq!(words("   "), Vec::<&str>::new());
    }

    #[test]
    fn test_first_word() {
        assert_eq!(first_word("  data work.t;"), "data");
        assert_eq!(first_word("x=1"), "x");
        assert_eq!(after_first_word("proc  print data=a"), "print data=a");
    }

    #[test]
    fn test_find_keyword() {
        assert_eq!(find_keyword("if x > 1 then y = 2", "then"), Some(9));
        assert_eq!(find_keyword("if x = 'then' THEN y", "then"), Some(14));
        assert_eq!(find_keyword("if athen > 1", "then"), None);
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("'./x'"), "./x");
        assert_eq!(unquote("\"a\""), "a");
        assert_eq!(unquote("'it''s'"), "it's");
        assert_eq!(unquote("plain"), "plain");
        assert_eq!(unquote("'"), "'");
    }

    #[test]
    fn test_opens_datalines() {
        assert!(opens_datalines("datalines;"));
        assert!(opens_datalines("input a b; CARDS;  "));
        assert!(!opens_datalines("datalines"));
        assert!(!opens_datalines("x = 'datalines;';"));
        assert!(!opens_datalines("datalines; x 1 y 2 ; run;"));
        assert!(opens_datalines("datalines; x 1"));
    }

    #[test]
    fn test_find_inline_datalines() {
        let line = "input n $ v; datalines; x 1 y 2 ; run;";
        let mark = find_datalines(line).unwrap();
        assert_eq!(&line[mark.data_start..mark.data_end.unwrap()], " x 1 y 2 ");
        assert_eq!(find_datalines("x = 1;"), None);
    }
}
