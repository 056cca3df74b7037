//! Shared types for the Open-SAS script engine.
//!
//! This crate provides the building blocks that the engine and the CLI share:
//!
//! - **Source location tracking**: [`Span`], [`ScriptId`]
//! - **Diagnostics**: [`Diagnostic`], [`Severity`]
//! - **Preprocessing**: [`PreprocessedSource`], [`LineIndex`]
//!
//! # Design Principles
//!
//! - **Zero dependencies**: plain Rust types only. The engine adds
//!   `miette`/`thiserror` on top for its error enums and converts them into
//!   [`Diagnostic`] records at the statement boundary.
//! - **Byte offsets everywhere**: every span refers to the normalized script
//!   text held by a [`PreprocessedSource`].

mod diagnostic;
mod preprocess;
mod span;

pub use diagnostic::{Diagnostic, Severity};
pub use preprocess::{normalize_line_endings, LineIndex, PreprocessedSource};
pub use span::{ScriptId, Span};
