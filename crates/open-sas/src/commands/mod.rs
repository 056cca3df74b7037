//! Subcommand implementations.

pub mod check;
pub mod repl;
pub mod run;

use miette::{IntoDiagnostic, Result, WrapErr};

use open_sas_engine::{Interpreter, InterpreterConfig};

use crate::SessionArgs;

/// Build an interpreter from `--config`, `--lib` and `--set`.
pub fn session(args: &SessionArgs) -> Result<Interpreter> {
    let config = match &args.config {
        Some(path) => InterpreterConfig::from_file(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to load configuration: {}", path.display()))?,
        None => InterpreterConfig::default(),
    };
    let mut interp = Interpreter::new(config);

    for lib in &args.libs {
        let (name, path) = split_assignment(lib, "--lib")?;
        interp
            .declare_library(name, path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to assign library {name}"))?;
        tracing::debug!("Assigned library {} = {}", name, path);
    }
    for binding in &args.macros {
        let (name, value) = split_assignment(binding, "--set")?;
        interp.set_macro(name, value);
    }
    Ok(interp)
}

/// Split `NAME=VALUE`.
fn split_assignment<'a>(text: &'a str, flag: &str) -> Result<(&'a str, &'a str)> {
    match text.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim(), value.trim())),
        _ => Err(miette::miette!("{flag} expects NAME=VALUE, got '{text}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_assignment() {
        assert_eq!(split_assignment("lib=/data", "--lib").unwrap(), ("lib", "/data"));
        assert_eq!(split_assignment(" n = 3 ", "--set").unwrap(), ("n", "3"));
        assert!(split_assignment("novalue", "--set").is_err());
        assert!(split_assignment("=x", "--set").is_err());
    }

    #[test]
    fn test_session_binds_macros() {
        let args = SessionArgs { macros: vec!["who=world".to_string()], ..SessionArgs::default() };
        let interp = session(&args).unwrap();
        assert_eq!(interp.macro_value("who"), Some("world"));
    }
}
