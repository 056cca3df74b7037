//! Statement-level error and notice types.
//!
//! Every statement runs inside its own boundary: a [`StatementError`] aborts
//! that statement only, and [`Notice`]s report things a statement dropped or
//! guessed while still succeeding. The interpreter turns both into
//! [`open_sas_lang_core::Diagnostic`]s.

use miette::Diagnostic;
use open_sas_lang_core::Severity;
use thiserror::Error;

use crate::datastep::StepError;
use crate::library::LibraryError;
use crate::macros::MacroError;
use crate::procs::ProcError;
use crate::table::TableError;

/// Failure of one statement block.
#[derive(Debug, Error, Diagnostic)]
pub enum StatementError {
    /// The block's leading keyword is not a statement the engine knows.
    #[error("statement is not valid or is used out of proper order: {text}")]
    #[diagnostic(code(osas::unknown_statement))]
    UnknownStatement {
        /// First line of the block.
        text: String,
    },

    /// A referenced table is neither in the workspace nor in its library.
    #[error("table {table} does not exist")]
    #[diagnostic(code(osas::missing_source))]
    MissingSource {
        /// Qualified table name.
        table: String,
    },

    /// A `LIBNAME` statement without a name or location.
    #[error("invalid LIBNAME statement: {text}")]
    #[diagnostic(code(osas::invalid_libname))]
    InvalidLibname {
        /// Statement text.
        text: String,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Macro(#[from] MacroError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Step(#[from] StepError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Proc(#[from] ProcError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Library(#[from] LibraryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Table(#[from] TableError),
}

impl StatementError {
    /// Stable diagnostic code, e.g. `osas::missing_source`.
    pub fn code_string(&self) -> String {
        self.code().map_or_else(|| "osas::error".to_string(), |c| c.to_string())
    }

    /// Severity the failure is recorded with. Unknown statements are skipped
    /// with a warning; everything else is an error.
    pub fn severity(&self) -> Severity {
        match self {
            StatementError::UnknownStatement { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// Something a statement reported while still succeeding.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    /// Severity to record.
    pub severity: Severity,
    /// Stable code.
    pub code: &'static str,
    /// Human-readable message.
    pub message: String,
}

impl Notice {
    /// A warning notice.
    pub fn warning(code: &'static str, message: impl Into<String>) -> Self {
        Self { severity: Severity::Warning, code, message: message.into() }
    }

    /// An informational note.
    pub fn note(code: &'static str, message: impl Into<String>) -> Self {
        Self { severity: Severity::Note, code, message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        let err = StatementError::MissingSource { table: "work.a".into() };
        assert_eq!(err.code_string(), "osas::missing_source");
        assert_eq!(err.severity(), Severity::Error);
        assert_eq!(err.to_string(), "table work.a does not exist");
    }

    #[test]
    fn test_transparent_code() {
        let err: StatementError = MacroError::Unresolved { name: "X".into() }.into();
        assert_eq!(err.code_string(), "osas::macro_unresolved");
    }

    #[test]
    fn test_unknown_statement_is_warning() {
        let err = StatementError::UnknownStatement { text: "foo;".into() };
        assert_eq!(err.severity(), Severity::Warning);
    }
}
