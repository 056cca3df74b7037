//! Statement segmentation.
//!
//! Script text is cut into [`StatementBlock`]s: a whole DATA step or PROC
//! step (everything up to its `RUN;`/`QUIT;`), or one standalone statement
//! such as `LIBNAME` or `%LET`.
//!
//! Comments are removed first by [`strip_comments`]. Segmentation then runs a
//! small state machine over the stripped text:
//!
//! | State         | Leaves on                                        |
//! |---------------|--------------------------------------------------|
//! | `Normal`      | `DATA` → `InDataStep`, `PROC` → `InProcStep`     |
//! | `InDataStep`  | `RUN;`, a new `DATA`/`PROC`, `DATALINES;`        |
//! | `InProcStep`  | `RUN;`/`QUIT;`, a new `DATA`/`PROC`              |
//! | `InDatalines` | a line holding only `;`                          |
//!
//! Blocks partition the stripped text: whitespace between blocks is attached
//! to the following block (or, at the end, to the last one), so joining the
//! text of every block reproduces the input exactly.

use open_sas_lang_core::{normalize_line_endings, Span};

use crate::text::{after_first_word, find_unquoted, first_word, is_datalines_keyword, opens_datalines};

/// Kind of a segmented block, decided by its leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// `DATA ... RUN;`
    DataStep,
    /// `PROC ... RUN;` or `PROC ... QUIT;`
    Proc,
    /// `LIBNAME name 'path';`
    Libname,
    /// `%LET name = value;`
    MacroLet,
    /// `%PUT text;`
    MacroPut,
    /// A `RUN;` or `QUIT;` outside any step.
    Run,
    /// Anything else.
    Unrecognized,
}

/// One segmented unit of script text.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementBlock {
    /// Kind of the block.
    pub kind: BlockKind,
    /// Raw block text, including leading whitespace.
    pub text: String,
    /// Position of `text` in the stripped script.
    pub span: Span,
    /// `false` when the block was cut off by the end of input.
    pub terminated: bool,
}

impl StatementBlock {
    /// Build a block from statement text that did not come from a script
    /// (e.g. a single REPL statement).
    pub fn synthetic(kind: BlockKind, text: impl Into<String>) -> Self {
        Self { kind, text: text.into(), span: Span::dummy(), terminated: true }
    }
}

/// Keywords that start a new logical line inside a PROC step even when the
/// previous line has no `;`.
const PROC_SUB_STATEMENTS: &[&str] = &["TABLES", "VAR", "BY", "CLASS", "MODEL", "OUTPUT", "WHERE"];

// ---------------------------------------------------------------------------
//  Comment stripping
// ---------------------------------------------------------------------------

/// Remove comments from a script.
///
/// `/* ... */` comments are removed first, across lines and regardless of
/// quoting; the newlines they spanned are kept so line numbers stay valid.
/// Then every line outside a DATALINES section is cut at its first unquoted
/// `*`. That also cuts a bare multiplication operator: `y = x * 2;` loses
/// everything from the `*` on, so scripts cannot multiply outside quotes.
/// Real SAS only treats a statement-leading `*` as a comment; this rule is
/// kept as a known limitation.
pub fn strip_comments(script: &str) -> String {
    let without_blocks = strip_block_comments(script);
    let mut out = String::with_capacity(without_blocks.len());
    let mut in_datalines = false;
    for line in without_blocks.split_inclusive('\n') {
        if in_datalines {
            out.push_str(line);
            if line.trim() == ";" {
                in_datalines = false;
            }
            continue;
        }
        let (body, newline) = match line.strip_suffix('\n') {
            Some(body) => (body, "\n"),
            None => (line, ""),
        };
        let kept = match find_unquoted(body, '*') {
            Some(star) => &body[..star],
            None => body,
        };
        out.push_str(kept);
        out.push_str(newline);
        if opens_datalines(kept) {
            in_datalines = true;
        }
    }
    out
}

fn strip_block_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find("/*") {
        let Some(close) = rest[open + 2..].find("*/") else {
            break;
        };
        let end = open + 2 + close + 2;
        out.push_str(&rest[..open]);
        out.extend(rest[open..end].chars().filter(|&c| c == '\n'));
        rest = &rest[end..];
    }
    out.push_str(rest);
    out
}

// ---------------------------------------------------------------------------
//  Segmentation
// ---------------------------------------------------------------------------

/// Normalize line endings, strip comments and segment a whole script.
pub fn segment_script(script: &str) -> Vec<StatementBlock> {
    segment(&strip_comments(&normalize_line_endings(script)))
}

/// Segment comment-stripped text into blocks.
pub fn segment(text: &str) -> Vec<StatementBlock> {
    Segmenter::new(text).run()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    InDataStep,
    InProcStep,
    InDatalines,
}

struct Segmenter<'a> {
    text: &'a str,
    state: State,
    blocks: Vec<StatementBlock>,
    /// Start of the block being built (end of the previous block).
    block_start: usize,
    /// Kind of the open DATA/PROC block.
    open: Option<BlockKind>,
    /// Start of the statement being accumulated.
    stmt_start: usize,
}

impl<'a> Segmenter<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            state: State::Normal,
            blocks: Vec::new(),
            block_start: 0,
            open: None,
            stmt_start: 0,
        }
    }

    fn run(mut self) -> Vec<StatementBlock> {
        let mut offset = 0;
        let mut quote: Option<char> = None;

        for line in self.text.split_inclusive('\n') {
            let line_start = offset;
            offset += line.len();

            if self.state == State::InDatalines {
                if line.trim() == ";" {
                    self.state = State::InDataStep;
                    self.stmt_start = offset;
                }
                continue;
            }

            if self.state == State::InProcStep
                && quote.is_none()
                && starts_sub_statement(line)
                && !self.text[self.stmt_start..line_start].trim().is_empty()
            {
                self.stmt_start = line_start;
            }

            let mut resume = 0;
            for (i, ch) in line.char_indices() {
                if i < resume {
                    continue;
                }
                match quote {
                    Some(q) if ch == q => quote = None,
                    Some(_) => {}
                    None if ch == '\'' || ch == '"' => quote = Some(ch),
                    None if ch == ';' => {
                        self.statement(line_start + i + 1);
                        if self.state == State::InDatalines {
                            match line[i + 1..].find(';') {
                                // Data closed on this line: `datalines; x 1 y 2 ; run;`.
                                Some(j) => {
                                    resume = i + 1 + j + 1;
                                    self.state = State::InDataStep;
                                    self.stmt_start = line_start + resume;
                                }
                                // Data runs on to a line holding only `;`.
                                None => break,
                            }
                        }
                    }
                    None => {}
                }
            }
        }

        self.finish();
        self.blocks
    }

    /// Handle one `;`-terminated statement ending at byte `end`.
    fn statement(&mut self, end: usize) {
        let start = self.stmt_start;
        self.stmt_start = end;
        let body = self.text[start..end].trim().trim_end_matches(';').trim();
        if body.is_empty() {
            return;
        }
        // `run = 2;` assigns to a column called run; it is no boundary.
        let keyword = if after_first_word(body).starts_with('=') {
            String::new()
        } else {
            first_word(body).to_ascii_uppercase()
        };

        match self.state {
            State::Normal => match keyword.as_str() {
                "DATA" => self.open_block(BlockKind::DataStep),
                "PROC" => self.open_block(BlockKind::Proc),
                _ => self.flush(classify(&keyword), end, true),
            },
            State::InDataStep => match keyword.as_str() {
                "RUN" => self.flush(BlockKind::DataStep, end, true),
                "DATA" => {
                    self.flush(BlockKind::DataStep, start, true);
                    self.open_block(BlockKind::DataStep);
                }
                "PROC" => {
                    self.flush(BlockKind::DataStep, start, true);
                    self.open_block(BlockKind::Proc);
                }
                _ if is_datalines_keyword(body) => self.state = State::InDatalines,
                _ => {}
            },
            State::InProcStep => match keyword.as_str() {
                "RUN" | "QUIT" => self.flush(BlockKind::Proc, end, true),
                "DATA" => {
                    self.flush(BlockKind::Proc, start, true);
                    self.open_block(BlockKind::DataStep);
                }
                "PROC" => {
                    self.flush(BlockKind::Proc, start, true);
                    self.open_block(BlockKind::Proc);
                }
                _ => {}
            },
            State::InDatalines => {}
        }
    }

    fn open_block(&mut self, kind: BlockKind) {
        self.open = Some(kind);
        self.state = match kind {
            BlockKind::Proc => State::InProcStep,
            _ => State::InDataStep,
        };
    }

    fn flush(&mut self, kind: BlockKind, end: usize, terminated: bool) {
        let start = self.block_start;
        self.blocks.push(StatementBlock {
            kind,
            text: self.text[start..end].to_string(),
            span: Span::from_range(start..end),
            terminated,
        });
        self.block_start = end;
        self.open = None;
        self.state = State::Normal;
    }

    fn finish(&mut self) {
        let end = self.text.len();
        if let Some(kind) = self.open {
            tracing::warn!(kind = ?kind, "unterminated block flushed at end of input");
            self.flush(kind, end, false);
            return;
        }

        let pending = self.text[self.stmt_start..end].trim();
        if !pending.is_empty() {
            let kind = classify(&first_word(pending).to_ascii_uppercase());
            tracing::warn!(kind = ?kind, "statement without ';' flushed at end of input");
            self.flush(kind, end, false);
            return;
        }

        // Trailing whitespace (and stray `;`) joins the last block.
        let rest = &self.text[self.block_start..end];
        if let Some(last) = self.blocks.last_mut() {
            last.text.push_str(rest);
            last.span.end = end as u32;
        }
    }
}

fn starts_sub_statement(line: &str) -> bool {
    let word = first_word(line);
    PROC_SUB_STATEMENTS.iter().any(|k| k.eq_ignore_ascii_case(word))
}

fn classify(keyword: &str) -> BlockKind {
    match keyword {
        "DATA" => BlockKind::DataStep,
        "PROC" => BlockKind::Proc,
        "LIBNAME" => BlockKind::Libname,
        "%LET" => BlockKind::MacroLet,
        "%PUT" => BlockKind::MacroPut,
        "RUN" | "QUIT" => BlockKind::Run,
        _ => BlockKind::Unrecognized,
    }
}

/// Name written after `DATA` in a DataStep block, e.g. `work.t`.
pub fn data_step_output(block: &str) -> Option<&str> {
    let first = block.trim_start().split(';').next()?;
    if !first_word(first).eq_ignore_ascii_case("data") {
        return None;
    }
    after_first_word(first).split_whitespace().next()
}
