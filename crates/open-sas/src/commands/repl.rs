//! Interactive REPL.
//!
//! Lines are buffered until every segmented block in the buffer is
//! terminated, then the buffer runs as one script. Lines starting with `:`
//! are REPL commands.

use std::io::{BufRead, Write};

use miette::{IntoDiagnostic, Result};

use open_sas_engine::{segment_script, Interpreter};

use crate::SessionArgs;

const PROMPT: &str = "osas> ";
const CONTINUE: &str = "  ... ";

/// What the REPL does with one input line.
#[derive(Debug, PartialEq, Eq)]
enum LineAction {
    /// Keep reading; the buffer is incomplete.
    Wait,
    /// Run the buffer.
    Execute,
    /// Run a `:` command.
    Command(String),
}

/// Run the REPL on stdin until end of input or `:quit`.
pub fn run(session: &SessionArgs) -> Result<()> {
    let mut interp = super::session(session)?;
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let mut buffer = String::new();

    prompt(&mut stdout, PROMPT)?;
    for line in stdin.lock().lines() {
        let line = line.into_diagnostic()?;
        match classify(&mut buffer, &line) {
            LineAction::Command(cmd) => {
                if !command(&mut interp, &cmd) {
                    break;
                }
            }
            LineAction::Execute => {
                let summary = interp.run(&buffer);
                buffer.clear();
                tracing::debug!("REPL ran {} statement(s), {} failed", summary.statements, summary.failures);
                flush_session(&mut interp);
            }
            LineAction::Wait => {}
        }
        prompt(&mut stdout, if buffer.is_empty() { PROMPT } else { CONTINUE })?;
    }

    // Run whatever is left, so an unterminated step is still reported.
    if !buffer.trim().is_empty() {
        interp.run(&buffer);
        flush_session(&mut interp);
    }
    Ok(())
}

fn prompt(out: &mut impl Write, text: &str) -> Result<()> {
    write!(out, "{text}").into_diagnostic()?;
    out.flush().into_diagnostic()
}

/// Append `line` to the buffer and decide whether it is ready to run.
fn classify(buffer: &mut String, line: &str) -> LineAction {
    let trimmed = line.trim();
    if buffer.is_empty() {
        if let Some(cmd) = trimmed.strip_prefix(':') {
            return LineAction::Command(cmd.trim().to_ascii_lowercase());
        }
        if trimmed.is_empty() {
            return LineAction::Wait;
        }
    }
    buffer.push_str(line);
    buffer.push('\n');

    let blocks = segment_script(buffer);
    if blocks.is_empty() {
        // Only comments so far.
        if !buffer.contains("/*") || buffer.contains("*/") {
            buffer.clear();
        }
        return LineAction::Wait;
    }
    if blocks.iter().all(|b| b.terminated) {
        LineAction::Execute
    } else {
        LineAction::Wait
    }
}

/// Run a `:` command. Returns `false` to leave the REPL.
fn command(interp: &mut Interpreter, cmd: &str) -> bool {
    match cmd {
        "q" | "quit" | "exit" => return false,
        "tables" => {
            for (name, table) in interp.tables().iter() {
                println!("{name}  ({} rows, {} columns)", table.row_count(), table.column_count());
            }
        }
        "libs" => {
            for (alias, location) in interp.libraries() {
                println!("{alias}  {location}");
            }
        }
        "clear" => interp.clear_workspace(),
        "help" => {
            println!(":tables  list workspace tables");
            println!(":libs    list assigned libraries");
            println!(":clear   drop all workspace tables");
            println!(":quit    leave the REPL");
        }
        other => eprintln!("unknown command :{other} (try :help)"),
    }
    true
}

fn flush_session(interp: &mut Interpreter) {
    for line in interp.take_output() {
        println!("{line}");
    }
    for d in interp.take_diagnostics() {
        eprintln!("{d}");
    }
}
