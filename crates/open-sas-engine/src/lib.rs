#![forbid(unsafe_code)]
//! Open-SAS script engine.
//!
//! This crate provides:
//!
//! - **Tables** ([`table`]): column-oriented tables with numeric and text
//!   columns and explicit missing values
//! - **Segmenter** ([`segment`]): comment stripping and the state machine
//!   that cuts a script into DATA, PROC, LIBNAME and macro blocks
//! - **Macros** ([`macros`]): `%LET`/`%PUT` and `&name` substitution
//! - **Expressions** ([`expr`]): lexer, parser and column-wise evaluator with
//!   a built-in function library
//! - **DATA step** ([`datastep`]): spec parser, DATALINES ingestion and the
//!   executor for filters, masked assignments and column operations
//! - **Procedures** ([`procs`]): PROC parsing and the PRINT, SORT, MEANS,
//!   FREQ and CONTENTS handlers
//! - **Libraries** ([`library`]): in-memory and directory-backed table storage
//! - **Interpreter** ([`interpreter`]): session state and statement dispatch
//!
//! # Example
//!
//! ```
//! use open_sas_engine::{Interpreter, InterpreterConfig, MemoryLibrary, Value};
//!
//! let mut interp = Interpreter::with_library(InterpreterConfig::default(), Box::new(MemoryLibrary::new()));
//! let summary = interp.run("data work.t;\n  x = 2;\n  y = x + 1;\nrun;\n");
//!
//! assert_eq!(summary.failures, 0);
//! assert_eq!(interp.table("work.t").unwrap().value(0, "y"), Value::Num(3.0));
//! ```

pub mod config;
pub mod datastep;
pub mod error;
pub mod expr;
pub mod interpreter;
pub mod library;
pub mod macros;
pub mod procs;
pub mod segment;
pub mod table;
pub mod text;

pub use config::{ConfigError, InterpreterConfig};
pub use datastep::{DataStepSpec, StepError, StepOutcome};
pub use error::{Notice, StatementError};
pub use expr::{Evaluator, ExprError, FunctionRegistry};
pub use interpreter::{Interpreter, RunSummary, Workspace};
pub use library::{DirectoryLibrary, LibraryError, LibraryManager, MemoryLibrary};
pub use macros::{MacroError, MacroTable};
pub use procs::{ProcError, ProcOutput, ProcRequest, ProcedureHandler, ProcedureRegistry};
pub use segment::{segment_script, BlockKind, StatementBlock};
pub use table::{Column, ColumnData, Table, TableError, TableRef, Value, ValueKind};
