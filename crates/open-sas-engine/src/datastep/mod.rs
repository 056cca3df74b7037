//! DATA step support.
//!
//! - [`parser`] extracts a [`DataStepSpec`] from one DataStep block
//! - [`datalines`] builds a table from an `INPUT` statement and literal rows
//! - [`executor`] applies a spec to its source table
//!
//! The step runs column-at-a-time: filters, then assignments in source order,
//! then DROP, KEEP and RENAME, whatever order those were written in.

pub mod datalines;
pub mod executor;
pub mod parser;

use miette::Diagnostic;
use thiserror::Error;

pub use datalines::{ingest, Ingested, InputSpec, InputVariable};
pub use executor::{execute, StepOutcome};
pub use parser::{Action, Branch, DataStepSpec, StepAction};

/// Errors raised while parsing or running a DATA step.
#[derive(Debug, Error, Diagnostic)]
pub enum StepError {
    /// The block does not start with a `DATA` statement.
    #[error("DATA step block does not start with a DATA statement")]
    #[diagnostic(code(osas::step::no_data_statement))]
    NoDataStatement,

    /// `DATA;` without a table name.
    #[error("DATA statement names no output table")]
    #[diagnostic(code(osas::step::missing_output))]
    MissingOutput,

    /// A table name that is not `name` or `lib.name`.
    #[error("invalid table name '{name}'")]
    #[diagnostic(code(osas::step::invalid_table_name))]
    InvalidTableName {
        /// Offending text.
        name: String,
    },

    /// Literal data without an `INPUT` statement describing it.
    #[error("DATALINES section without an INPUT statement")]
    #[diagnostic(code(osas::step::datalines_without_input))]
    DatalinesWithoutInput,

    /// `SET` or `MERGE` without any table.
    #[error("{keyword} statement names no table")]
    #[diagnostic(code(osas::step::empty_source_list))]
    EmptySourceList {
        /// `SET` or `MERGE`.
        keyword: String,
    },
}
