//! Interpreter configuration.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading a configuration file.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read configuration {}: {source}", path.display())]
    #[diagnostic(code(osas::config::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid configuration JSON.
    #[error("invalid configuration: {0}")]
    #[diagnostic(code(osas::config::parse))]
    Parse(#[from] serde_json::Error),
}

/// Settings of one interpreter session. Every field has a default, so a
/// configuration file only needs the fields it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpreterConfig {
    /// Library used for unqualified table names.
    #[serde(default = "default_library")]
    pub default_library: String,
    /// Append PROC report lines to the output log.
    #[serde(default = "default_true")]
    pub echo_reports: bool,
    /// Row cap for PROC PRINT when the step gives no `OBS=`.
    #[serde(default)]
    pub max_print_rows: Option<usize>,
    /// Record NOTE diagnostics.
    #[serde(default = "default_true")]
    pub notes: bool,
    /// Base directory for relative LIBNAME paths.
    #[serde(default)]
    pub library_root: Option<PathBuf>,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            default_library: default_library(),
            echo_reports: true,
            max_print_rows: None,
            notes: true,
            library_root: None,
        }
    }
}

impl InterpreterConfig {
    /// Parse configuration JSON.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }
}

fn default_library() -> String {
    "work".to_string()
}

fn default_true() -> bool {
    true
}
