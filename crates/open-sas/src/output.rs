//! Structured output types for machine-readable CLI responses.
//!
//! When `--format json` is specified, commands emit these types as JSON
//! instead of human-readable text.

use serde::Serialize;

use open_sas_engine::Workspace;
use open_sas_lang_core::{Diagnostic, Severity};

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    /// Unknown names fall back to text.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }

    pub fn is_json(self) -> bool {
        self == OutputFormat::Json
    }
}

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Note,
}

impl From<Severity> for DiagnosticSeverity {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Error => DiagnosticSeverity::Error,
            Severity::Warning => DiagnosticSeverity::Warning,
            Severity::Note => DiagnosticSeverity::Note,
        }
    }
}

/// A single diagnostic message.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticEntry {
    pub severity: DiagnosticSeverity,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl From<&Diagnostic> for DiagnosticEntry {
    fn from(d: &Diagnostic) -> Self {
        Self {
            severity: d.severity.into(),
            code: d.code.clone(),
            message: d.message.clone(),
            line: d.line,
        }
    }
}

/// Summary of diagnostic counts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiagnosticSummary {
    pub errors: usize,
    pub warnings: usize,
    pub notes: usize,
}

impl DiagnosticSummary {
    pub fn of(diagnostics: &[Diagnostic]) -> Self {
        let mut summary = Self::default();
        for d in diagnostics {
            match d.severity {
                Severity::Error => summary.errors += 1,
                Severity::Warning => summary.warnings += 1,
                Severity::Note => summary.notes += 1,
            }
        }
        summary
    }
}

/// A workspace table in run output.
#[derive(Debug, Clone, Serialize)]
pub struct TableEntry {
    pub name: String,
    pub rows: usize,
    pub columns: Vec<String>,
}

impl TableEntry {
    pub fn list(workspace: &Workspace) -> Vec<Self> {
        workspace
            .iter()
            .map(|(name, table)| TableEntry {
                name: name.to_string(),
                rows: table.row_count(),
                columns: table.column_names().into_iter().map(String::from).collect(),
            })
            .collect()
    }
}

/// Output from the run command.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    pub status: String,
    pub statements: usize,
    pub failures: usize,
    pub output: Vec<String>,
    pub diagnostics: Vec<DiagnosticEntry>,
    pub summary: DiagnosticSummary,
    pub tables: Vec<TableEntry>,
}

/// One segmented block in check output.
#[derive(Debug, Clone, Serialize)]
pub struct BlockEntry {
    pub kind: String,
    pub line: u32,
    pub terminated: bool,
    pub text: String,
}

/// Output from the check command.
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutput {
    pub status: String,
    pub blocks: Vec<BlockEntry>,
}

/// Print a serializable value as JSON to stdout.
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize JSON: {}", e),
    }
}
