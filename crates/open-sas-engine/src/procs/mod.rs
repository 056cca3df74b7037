//! PROC step support.
//!
//! A Proc block is parsed into a [`ProcRequest`] and dispatched by name to a
//! [`ProcedureHandler`] held in a [`ProcedureRegistry`]. Built-in handlers:
//!
//! - `PRINT` lists rows ([`print`])
//! - `SORT` orders rows by BY variables ([`sort`])
//! - `MEANS` computes descriptive statistics ([`means`])
//! - `FREQ` builds one-way frequency tables ([`freq`])
//! - `CONTENTS` describes the columns of a table ([`contents`])

pub mod contents;
pub mod freq;
pub mod means;
pub mod print;
mod report;
pub mod request;
pub mod sort;

use std::collections::HashMap;
use std::fmt;

use miette::Diagnostic;
use thiserror::Error;
use tracing::{debug, info};

use crate::table::Table;

pub use request::ProcRequest;

/// Errors raised while parsing or running a procedure.
#[derive(Debug, Error, Diagnostic)]
pub enum ProcError {
    /// The block does not start with `PROC name`.
    #[error("PROC block does not start with a PROC statement")]
    #[diagnostic(code(osas::proc::no_proc_statement))]
    NoProcStatement,

    /// No handler is registered under this name.
    #[error("procedure {name} not found")]
    #[diagnostic(code(osas::proc::unknown_procedure))]
    UnknownProcedure {
        /// Requested procedure.
        name: String,
    },

    /// A required sub-statement is absent.
    #[error("PROC {procedure} requires a {statement} statement")]
    #[diagnostic(code(osas::proc::missing_statement))]
    MissingStatement {
        /// Procedure name.
        procedure: String,
        /// Missing keyword.
        statement: String,
    },

    /// An option value that cannot be used.
    #[error("invalid value '{value}' for option {option}")]
    #[diagnostic(code(osas::proc::invalid_option))]
    InvalidOption {
        /// Option name.
        option: String,
        /// Given value.
        value: String,
    },

    /// A variable named in the step is not a column of the input.
    #[error("variable {column} not found in the input table")]
    #[diagnostic(code(osas::proc::unknown_column))]
    UnknownColumn {
        /// Variable name.
        column: String,
    },

    /// A feature the procedure does not implement.
    #[error("PROC {procedure} does not support {feature}")]
    #[diagnostic(code(osas::proc::unsupported))]
    Unsupported {
        /// Procedure name.
        procedure: String,
        /// What was asked for.
        feature: String,
    },
}

/// What a procedure hands back to the interpreter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcOutput {
    /// Report lines, in order.
    pub report_lines: Vec<String>,
    /// Table to register, if any.
    pub output_table: Option<Table>,
    /// Name to register `output_table` under.
    pub output_table_name: Option<String>,
}

impl ProcOutput {
    /// Output consisting of report lines only.
    pub fn report(lines: Vec<String>) -> Self {
        Self { report_lines: lines, ..Self::default() }
    }

    /// Attach an output table.
    pub fn with_table(mut self, name: Option<String>, table: Table) -> Self {
        self.output_table = Some(table);
        self.output_table_name = name;
        self
    }
}

/// A procedure that can be invoked from a PROC step.
pub trait ProcedureHandler {
    /// Procedure name, e.g. `"PRINT"`.
    fn name(&self) -> &str;

    /// Run against `input`. The input is already filtered by any WHERE
    /// sub-statement.
    fn execute(&self, input: &Table, request: &ProcRequest) -> Result<ProcOutput, ProcError>;
}

/// Procedures available to the interpreter, keyed by upper-cased name.
pub struct ProcedureRegistry {
    handlers: HashMap<String, Box<dyn ProcedureHandler>>,
}

impl fmt::Debug for ProcedureRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcedureRegistry")
            .field("handlers", &self.list_procedures())
            .finish()
    }
}

impl Default for ProcedureRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ProcedureRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self { handlers: HashMap::new() }
    }

    /// A registry holding PRINT, SORT, MEANS, FREQ and CONTENTS.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(print::Print));
        registry.register(Box::new(sort::Sort));
        registry.register(Box::new(means::Means));
        registry.register(Box::new(freq::Freq));
        registry.register(Box::new(contents::Contents));
        registry
    }

    /// Register a handler, replacing any handler of the same name.
    pub fn register(&mut self, handler: Box<dyn ProcedureHandler>) {
        let name = handler.name().to_ascii_uppercase();
        debug!(procedure = %name, "registering procedure");
        self.handlers.insert(name, handler);
    }

    /// Run the handler named by `request.name` against `input`.
    pub fn dispatch(&self, input: &Table, request: &ProcRequest) -> Result<ProcOutput, ProcError> {
        let name = request.name.to_ascii_uppercase();
        let handler = self
            .handlers
            .get(&name)
            .ok_or_else(|| ProcError::UnknownProcedure { name: name.clone() })?;
        info!(procedure = %name, rows = input.row_count(), "running procedure");
        handler.execute(input, request)
    }

    /// Whether a procedure is registered.
    pub fn is_registered(&self, name: &str) -> bool {
        self.handlers.contains_key(&name.to_ascii_uppercase())
    }

    /// Registered names, sorted.
    pub fn list_procedures(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Resolve each name against `table`, reporting the first unknown one.
/// Returns the column spellings used by the table.
pub(crate) fn resolve_columns(table: &Table, names: &[String]) -> Result<Vec<String>, ProcError> {
    names
        .iter()
        .map(|name| {
            table
                .column(name)
                .map(|c| c.name.clone())
                .ok_or_else(|| ProcError::UnknownColumn { column: name.clone() })
        })
        .collect()
}
