//! Diagnostic records collected while a script runs.
//!
//! The interpreter never aborts a session on an ordinary script error. Each
//! failure is turned into a [`Diagnostic`] and recorded, and the next
//! statement runs.

use std::fmt;

use crate::span::Span;

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational note (e.g. a statement that was accepted and ignored).
    Note,
    /// The statement ran, but something was dropped or guessed.
    Warning,
    /// The statement was aborted.
    Error,
}

/// One recorded diagnostic.
///
/// # Example
///
/// ```
/// use open_sas_lang_core::{Diagnostic, Severity, Span};
///
/// let d = Diagnostic::error("osas::missing_source", "table WORK.A not found", Span::main(0, 12))
///     .at_line(3);
///
/// assert_eq!(d.severity, Severity::Error);
/// assert_eq!(d.to_string(), "ERROR[osas::missing_source] line 3: table WORK.A not found");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Severity of the diagnostic.
    pub severity: Severity,
    /// Stable code, e.g. `osas::missing_source`.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Span of the statement block the diagnostic refers to.
    pub span: Span,
    /// 1-based line of the block start, when known.
    pub line: Option<u32>,
}

impl Diagnostic {
    fn with_severity(
        severity: Severity,
        code: impl Into<String>,
        message: impl Into<String>,
        span: Span,
    ) -> Self {
        Self {
            severity,
            code: code.into(),
            message: message.into(),
            span,
            line: None,
        }
    }

    /// Create an error diagnostic.
    pub fn error(code: impl Into<String>, message: impl Into<String>, span: Span) -> Self {
        Self::with_severity(Severity::Error, code, message, span)
    }

    /// Create a warning diagnostic.
    pub fn warning(code: impl Into<String>, message: impl Into<String>, span: Span) -> Self {
        Self::with_severity(Severity::Warning, code, message, span)
    }

    /// Create a note.
    pub fn note(code: impl Into<String>, message: impl Into<String>, span: Span) -> Self {
        Self::with_severity(Severity::Note, code, message, span)
    }

    /// Attach the 1-based source line.
    pub fn at_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    /// Returns `true` if this diagnostic is an error.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Returns `true` if this diagnostic is a warning.
    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // SAS log prefixes.
        match self {
            Severity::Note => write!(f, "NOTE"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.severity, self.code)?;
        if let Some(line) = self.line {
            write!(f, " line {line}")?;
        }
        write!(f, ": {}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_error() {
        let d = Diagnostic::error("osas::x", "Something went wrong", Span::main(0, 10));
        assert_eq!(d.severity, Severity::Error);
        assert_eq!(d.code, "osas::x");
        assert!(d.is_error());
        assert!(!d.is_warning());
        assert!(d.line.is_none());
    }

    #[test]
    fn test_diagnostic_warning() {
        let d = Diagnostic::warning("osas::w", "row dropped", Span::main(5, 15));
        assert!(d.is_warning());
        assert!(!d.is_error());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Note);
    }

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic::note("osas::ignored", "LENGTH ignored", Span::dummy());
        assert_eq!(d.to_string(), "NOTE[osas::ignored]: LENGTH ignored");
    }

    #[test]
    fn test_diagnostic_display_with_line() {
        let d = Diagnostic::warning("osas::w", "odd", Span::dummy()).at_line(12);
        assert_eq!(d.to_string(), "WARNING[osas::w] line 12: odd");
    }
}
