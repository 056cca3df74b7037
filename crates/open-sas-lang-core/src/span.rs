//! Source location tracking for statement blocks and diagnostics.
//!
//! The segmenter tags every statement block with a [`Span`] into the
//! comment-stripped script text, so a failing statement can be reported
//! against the lines it came from.

use std::ops::Range;

/// Identifier of a script submitted to an interpreter session.
///
/// One session may run several scripts (a file, then REPL lines); the id keeps
/// their spans apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScriptId(pub u32);

impl ScriptId {
    /// The id used when a session runs a single script.
    pub const MAIN: ScriptId = ScriptId(0);
}

/// A contiguous byte range of script text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// The script this span belongs to.
    pub script: ScriptId,
    /// Byte offset of the first byte (0-indexed).
    pub start: u32,
    /// Byte offset one past the last byte.
    pub end: u32,
}

impl Span {
    /// Create a new span.
    pub fn new(script: ScriptId, start: u32, end: u32) -> Self {
        Self { script, start, end }
    }

    /// Create a span in the main script.
    pub fn main(start: u32, end: u32) -> Self {
        Self::new(ScriptId::MAIN, start, end)
    }

    /// Create a span from a `usize` byte range in the main script.
    pub fn from_range(range: Range<usize>) -> Self {
        Self::main(range.start as u32, range.end as u32)
    }

    /// Span for text that was not read from a script (REPL input, synthesized blocks).
    pub fn dummy() -> Self {
        Self::default()
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        (self.end - self.start) as usize
    }

    /// Whether the span covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Smallest span covering both `self` and `other`.
    pub fn extend(self, other: Span) -> Self {
        debug_assert_eq!(self.script, other.script, "cannot extend span across scripts");
        Self {
            script: self.script,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Byte range usable for slicing the script text.
    pub fn to_range(&self) -> Range<usize> {
        (self.start as usize)..(self.end as usize)
    }

    /// Slice the covered text out of `source`, or `""` when out of bounds.
    pub fn slice<'a>(&self, source: &'a str) -> &'a str {
        source.get(self.to_range()).unwrap_or("")
    }
}
