//! Script preprocessing shared by the segmenter and diagnostics.
//!
//! Scripts are normalized to `\n` line endings before segmentation, and a
//! [`LineIndex`] built from the normalized text maps block offsets back to
//! line numbers.
//!
//! [`str::lines()`] hides whether a line ended in `\r\n` or `\n`, so offsets
//! accumulated with `line.len() + 1` drift on Windows scripts. Normalizing
//! first and indexing actual byte positions avoids that.

/// A normalized script and its line index.
#[derive(Debug, Clone)]
pub struct PreprocessedSource {
    /// Script text with all line endings converted to `\n`.
    pub text: String,
    /// Line offsets of `text`.
    pub line_index: LineIndex,
}

impl PreprocessedSource {
    /// Normalize line endings and index the result.
    pub fn new(raw: &str) -> Self {
        let text = normalize_line_endings(raw);
        let line_index = LineIndex::new(&text);
        Self { text, line_index }
    }

    /// 1-based line number containing the byte `offset`.
    pub fn line_of(&self, offset: u32) -> u32 {
        self.line_index.line_of(offset) + 1
    }
}

/// Byte offset of the start of every line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    offsets: Vec<u32>,
}

impl LineIndex {
    /// Build a line index from text that uses `\n` only.
    pub fn new(text: &str) -> Self {
        let mut offsets = vec![0];
        for (i, byte) in text.as_bytes().iter().enumerate() {
            if *byte == b'\n' {
                offsets.push((i + 1) as u32);
            }
        }
        Self { offsets }
    }

    /// Number of lines.
    pub fn line_count(&self) -> usize {
        self.offsets.len()
    }

    /// Byte offset where line `line` (0-indexed) starts.
    pub fn line_start(&self, line: usize) -> Option<u32> {
        self.offsets.get(line).copied()
    }

    /// 0-indexed line containing `offset`.
    pub fn line_of(&self, offset: u32) -> u32 {
        let line = match self.offsets.binary_search(&offset) {
            Ok(exact) => exact,
            Err(insert_point) => insert_point.saturating_sub(1),
        };
        line as u32
    }
}

/// Convert `\r\n` and bare `\r` line endings to `\n`.
pub fn normalize_line_endings(text: &str) -> String {
    if !text.contains('\r') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\r' {
            out.push('\n');
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
        } else {
            out.push(ch);
        }
    }
    out
}
