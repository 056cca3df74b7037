//! Run command implementation.

use std::path::PathBuf;

use miette::{IntoDiagnostic, Result, WrapErr};

use crate::output::{print_json, DiagnosticEntry, DiagnosticSummary, OutputFormat, RunOutput, TableEntry};
use crate::SessionArgs;

/// Run a script file and print its report log and diagnostics.
pub fn run(input: PathBuf, session: &SessionArgs, format: OutputFormat, fail_on_error: bool) -> Result<()> {
    let script = std::fs::read_to_string(&input)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to read script: {}", input.display()))?;

    tracing::info!("Running {}", input.display());

    let mut interp = super::session(session)?;
    let result = interp.run(&script);
    let output = interp.take_output();
    let diagnostics = interp.take_diagnostics();
    let status = if result.failures == 0 { "success" } else { "error" };

    if format.is_json() {
        print_json(&RunOutput {
            status: status.to_string(),
            statements: result.statements,
            failures: result.failures,
            output,
            diagnostics: diagnostics.iter().map(DiagnosticEntry::from).collect(),
            summary: DiagnosticSummary::of(&diagnostics),
            tables: TableEntry::list(interp.tables()),
        });
    } else {
        for line in &output {
            println!("{line}");
        }
        for d in &diagnostics {
            eprintln!("{d}");
        }
        let summary = DiagnosticSummary::of(&diagnostics);
        eprintln!(
            "{} statement(s), {} failed, {} warning(s)",
            result.statements, result.failures, summary.warnings
        );
    }

    if fail_on_error && result.failures > 0 {
        return Err(miette::miette!(
            "{} of {} statements failed in {}",
            result.failures,
            result.statements,
            input.display()
        ));
    }
    Ok(())
}
