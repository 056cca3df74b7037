//! Open-SAS CLI: run SAS-like scripts, check how they segment, or work
//! interactively in a REPL.

mod commands;
mod output;

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use miette::Result;

use output::OutputFormat;

/// Open-SAS CLI.
#[derive(Parser)]
#[command(name = "osas", version, about = "Open-SAS: a script engine for SAS-like DATA and PROC steps")]
struct Cli {
    /// Enable debug logging on stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a script file.
    Run {
        /// Script to run.
        file: PathBuf,

        #[command(flatten)]
        session: SessionArgs,

        /// Output format (text, json).
        #[arg(long, default_value = "text")]
        format: String,

        /// Exit with an error status when any statement fails.
        #[arg(long)]
        fail_on_error: bool,
    },

    /// Segment a script and list its blocks without running it.
    Check {
        /// Script to check.
        file: PathBuf,

        /// Output format (text, json).
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Read statements from stdin and run each as soon as it is complete.
    Repl {
        #[command(flatten)]
        session: SessionArgs,
    },
}

/// Options that shape an interpreter session.
#[derive(Args, Debug, Default)]
pub struct SessionArgs {
    /// Interpreter configuration file (JSON).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Pre-assigned library (format: NAME=PATH).
    #[arg(long = "lib")]
    pub libs: Vec<String>,

    /// Pre-bound macro variable (format: NAME=VALUE).
    #[arg(long = "set")]
    pub macros: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging stays off unless asked for, so stderr carries only the log.
    if cli.verbose || std::env::var("RUST_LOG").is_ok() {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::EnvFilter::from_default_env()
        } else {
            tracing_subscriber::EnvFilter::new("debug")
        };
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
            .init();
    }

    match cli.command {
        Commands::Run { file, session, format, fail_on_error } => {
            commands::run::run(file, &session, OutputFormat::parse(&format), fail_on_error)
        }
        Commands::Check { file, format } => commands::check::run(file, OutputFormat::parse(&format)),
        Commands::Repl { session } => commands::repl::run(&session),
    }
}
