//! The interpreter: session state and statement dispatch.
//!
//! An [`Interpreter`] owns one session: the workspace of named tables, the
//! library manager behind `LIBNAME` aliases, macro variables and the
//! procedure registry. [`Interpreter::run`] segments a script and executes
//! its blocks in order. Each block runs inside its own error boundary: a
//! failure becomes a [`Diagnostic`] and the next block runs regardless, so
//! tables produced before a failure stay available.

use std::collections::BTreeMap;

use open_sas_lang_core::{normalize_line_endings, Diagnostic, PreprocessedSource, ScriptId, Severity, Span};
use tracing::{debug, error, info};

use crate::config::InterpreterConfig;
use crate::datastep::{self, DataStepSpec, StepError};
use crate::error::{Notice, StatementError};
use crate::expr::{Evaluator, FunctionRegistry};
use crate::library::{DirectoryLibrary, LibraryError, LibraryManager};
use crate::macros::{parse_let, parse_put, MacroTable};
use crate::procs::{ProcError, ProcRequest, ProcedureRegistry};
use crate::segment::{segment, strip_comments, BlockKind, StatementBlock};
use crate::table::{Table, TableRef};
use crate::text::{after_first_word, unquote, words};

// ---------------------------------------------------------------------------
//  Workspace
// ---------------------------------------------------------------------------

/// Tables of one session keyed by lower-cased qualified name (`work.t`).
/// Writing a name that exists replaces the table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workspace {
    tables: BTreeMap<String, Table>,
}

impl Workspace {
    /// Table stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Table> {
        self.tables.get(key)
    }

    /// Store `table` under `key`.
    pub fn insert(&mut self, key: String, table: Table) {
        self.tables.insert(key, table);
    }

    /// Remove every table.
    pub fn clear(&mut self) {
        self.tables.clear();
    }

    /// Stored keys, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    /// Number of tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether no table is stored.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Tables in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Table)> {
        self.tables.iter().map(|(k, t)| (k.as_str(), t))
    }
}

// ---------------------------------------------------------------------------
//  Interpreter
// ---------------------------------------------------------------------------

/// Counts from one [`Interpreter::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Blocks executed.
    pub statements: usize,
    /// Blocks that ended in an error or were skipped.
    pub failures: usize,
}

/// One interpreter session.
pub struct Interpreter {
    config: InterpreterConfig,
    workspace: Workspace,
    library: Box<dyn LibraryManager>,
    macros: MacroTable,
    functions: FunctionRegistry,
    procedures: ProcedureRegistry,
    last: Option<String>,
    output: Vec<String>,
    diagnostics: Vec<Diagnostic>,
    scripts: u32,
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("config", &self.config)
            .field("tables", &self.workspace.names())
            .field("libraries", &self.library.list_aliases())
            .field("macros", &self.macros)
            .field("diagnostics", &self.diagnostics.len())
            .finish()
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(InterpreterConfig::default())
    }
}

impl Interpreter {
    /// A session storing library tables on disk, with relative LIBNAME paths
    /// resolved against `config.library_root`.
    pub fn new(config: InterpreterConfig) -> Self {
        let library = match &config.library_root {
            Some(root) => DirectoryLibrary::with_root(root),
            None => DirectoryLibrary::new(),
        };
        Self::with_library(config, Box::new(library))
    }

    /// A session using the given library manager.
    pub fn with_library(config: InterpreterConfig, library: Box<dyn LibraryManager>) -> Self {
        Self {
            config,
            workspace: Workspace::default(),
            library,
            macros: MacroTable::new(),
            functions: FunctionRegistry::new(),
            procedures: ProcedureRegistry::with_builtins(),
            last: None,
            output: Vec::new(),
            diagnostics: Vec::new(),
            scripts: 0,
        }
    }

    /// Session configuration.
    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    /// Procedure registry, for registering additional procedures.
    pub fn procedures_mut(&mut self) -> &mut ProcedureRegistry {
        &mut self.procedures
    }

    /// Function registry used by expressions.
    pub fn functions_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.functions
    }

    /// Segment `script` and execute every block in order.
    pub fn run(&mut self, script: &str) -> RunSummary {
        let script_id = ScriptId(self.scripts);
        self.scripts += 1;
        let source = PreprocessedSource::new(&strip_comments(&normalize_line_endings(script)));
        let blocks = segment(&source.text);
        info!(blocks = blocks.len(), "running script");

        let mut summary = RunSummary::default();
        for mut block in blocks {
            block.span.script = script_id;
            let leading = block.text.len() - block.text.trim_start().len();
            let line = source.line_of(block.span.start + leading as u32);
            summary.statements += 1;
            if !self.dispatch(&block, Some(line)) {
                summary.failures += 1;
            }
        }
        summary
    }

    /// Execute one block. Returns `false` when the block failed; the failure
    /// is recorded in [`Interpreter::diagnostics`].
    pub fn execute_block(&mut self, block: &StatementBlock) -> bool {
        self.dispatch(block, None)
    }

    fn dispatch(&mut self, block: &StatementBlock, line: Option<u32>) -> bool {
        debug!(kind = ?block.kind, line = ?line, "dispatching statement");
        if !block.terminated {
            self.record(
                Notice::warning("osas::unterminated_block", "statement block not terminated before end of input"),
                block.span,
                line,
            );
        }
        match self.execute(block) {
            Ok(notices) => {
                for notice in notices {
                    self.record(notice, block.span, line);
                }
                true
            }
            Err(err) => {
                let code = err.code_string();
                error!(code = %code, line = ?line, "{err}");
                let diagnostic = match err.severity() {
                    Severity::Error => Diagnostic::error(code, err.to_string(), block.span),
                    Severity::Warning => Diagnostic::warning(code, err.to_string(), block.span),
                    Severity::Note => Diagnostic::note(code, err.to_string(), block.span),
                };
                self.diagnostics.push(match line {
                    Some(line) => diagnostic.at_line(line),
                    None => diagnostic,
                });
                false
            }
        }
    }

    fn record(&mut self, notice: Notice, span: Span, line: Option<u32>) {
        let diagnostic = match notice.severity {
            Severity::Note if !self.config.notes => return,
            Severity::Note => Diagnostic::note(notice.code, notice.message, span),
            Severity::Warning => Diagnostic::warning(notice.code, notice.message, span),
            Severity::Error => Diagnostic::error(notice.code, notice.message, span),
        };
        self.diagnostics.push(match line {
            Some(line) => diagnostic.at_line(line),
            None => diagnostic,
        });
    }

    fn execute(&mut self, block: &StatementBlock) -> Result<Vec<Notice>, StatementError> {
        if block.kind == BlockKind::Run {
            return Ok(Vec::new());
        }
        let text = self.macros.resolve_block(&block.text)?;
        match block.kind {
            BlockKind::DataStep => self.data_step(&text),
            BlockKind::Proc => self.proc_step(&text),
            BlockKind::Libname => self.libname(&text),
            BlockKind::MacroLet => {
                let (name, value) = parse_let(&text)?;
                info!(name = %name, "macro variable assigned");
                self.macros.set(&name, value);
                Ok(Vec::new())
            }
            BlockKind::MacroPut => {
                self.output.push(parse_put(&text));
                Ok(Vec::new())
            }
            BlockKind::Run => Ok(Vec::new()),
            BlockKind::Unrecognized => Err(StatementError::UnknownStatement {
                text: text.trim().lines().next().unwrap_or_default().to_string(),
            }),
        }
    }

    // -----------------------------------------------------------------------
    //  DATA step
    // -----------------------------------------------------------------------

    fn data_step(&mut self, text: &str) -> Result<Vec<Notice>, StatementError> {
        let spec = DataStepSpec::parse(text)?;
        debug!(?spec, "DATA step parsed");

        let mut notices = Vec::new();
        let input = match (&spec.datalines, spec.sources.first()) {
            (Some(lines), _) => {
                let input_spec = spec.input.as_ref().ok_or(StepError::DatalinesWithoutInput)?;
                let ingested = datastep::ingest(input_spec, lines)?;
                if ingested.dropped > 0 {
                    tracing::warn!(dropped = ingested.dropped, "datalines rows dropped");
                    notices.push(Notice::warning(
                        "osas::datalines_row_dropped",
                        format!(
                            "{} data line(s) did not match the {} INPUT variable(s) and were dropped",
                            ingested.dropped,
                            input_spec.variables.len()
                        ),
                    ));
                }
                ingested.table
            }
            (None, Some(source)) => self.resolve_table(source)?,
            (None, None) => Table::new(1),
        };

        let outcome = datastep::execute(&spec, input, &self.functions);
        notices.extend(outcome.notices);
        match &spec.output {
            Some(target) => {
                notices.push(self.store(target, outcome.table)?);
            }
            None => debug!("DATA _NULL_ step finished"),
        }
        Ok(notices)
    }

    // -----------------------------------------------------------------------
    //  PROC step
    // -----------------------------------------------------------------------

    fn proc_step(&mut self, text: &str) -> Result<Vec<Notice>, StatementError> {
        let mut request = ProcRequest::parse(text)?;
        debug!(procedure = %request.name, options = ?request.options, "PROC parsed");
        if !self.procedures.is_registered(&request.name) {
            return Err(ProcError::UnknownProcedure { name: request.name }.into());
        }

        let source = match request.data.clone() {
            Some(data) => data,
            None => self
                .last
                .as_deref()
                .and_then(TableRef::parse)
                .ok_or_else(|| StatementError::MissingSource { table: "_LAST_".into() })?,
        };
        request.data = Some(source.clone());
        let mut input = self.resolve_table(&source)?;

        let mut notices = Vec::new();
        for condition in request.take_statements("WHERE") {
            let (mask, fallbacks) = {
                let mut ev = Evaluator::new(&input, &self.functions);
                let mask = ev.mask(&condition);
                (mask, ev.take_fallbacks())
            };
            notices.extend(fallbacks.into_iter().map(|m| Notice::warning("osas::evaluation_fallback", m)));
            input = input.filter(&mask);
        }
        if request.name == "PRINT" && !request.has_option("OBS") {
            if let Some(max) = self.config.max_print_rows {
                request.options.insert("OBS".into(), max.to_string());
            }
        }

        let output = self.procedures.dispatch(&input, &request)?;
        if self.config.echo_reports {
            self.output.extend(output.report_lines);
        }
        if let Some(table) = output.output_table {
            let name = output.output_table_name.or_else(|| request.out.as_ref().map(ToString::to_string));
            match name {
                Some(name) => {
                    let target = TableRef::parse(&name)
                        .ok_or_else(|| ProcError::InvalidOption { option: "OUT".into(), value: name.clone() })?;
                    notices.push(self.store(&target, table)?);
                }
                None => debug!(procedure = %request.name, "output table has no name; discarded"),
            }
        }
        Ok(notices)
    }

    // -----------------------------------------------------------------------
    //  LIBNAME
    // -----------------------------------------------------------------------

    fn libname(&mut self, text: &str) -> Result<Vec<Notice>, StatementError> {
        let invalid = || StatementError::InvalidLibname { text: text.trim().to_string() };
        let body = text.trim().trim_end_matches(';');
        let args = words(after_first_word(body));
        let (name, location) = match args.as_slice() {
            [name, rest @ ..] if !rest.is_empty() => (*name, rest[rest.len() - 1]),
            _ => return Err(invalid()),
        };
        if !crate::table::is_sas_name(name) || name.len() > 8 {
            return Err(invalid());
        }
        if location.eq_ignore_ascii_case("clear") {
            self.library.remove_alias(name)?;
            let prefix = format!("{}.", name.to_ascii_lowercase());
            self.workspace.tables.retain(|key, _| !key.starts_with(&prefix));
            return Ok(vec![Notice::note("osas::libref_cleared", format!("Libref {} was cleared", name.to_uppercase()))]);
        }
        self.declare_library(name, &unquote(location))?;
        Ok(vec![Notice::note(
            "osas::libref_assigned",
            format!("Libref {} was successfully assigned", name.to_uppercase()),
        )])
    }

    /// Assign a library alias, as a `LIBNAME` statement does.
    pub fn declare_library(&mut self, name: &str, location: &str) -> Result<(), LibraryError> {
        info!(alias = %name, location = %location, "library assigned");
        self.library.create_alias(name, location)
    }

    // -----------------------------------------------------------------------
    //  Tables
    // -----------------------------------------------------------------------

    /// Find a table in the workspace, loading it from its library on first
    /// use. Loaded tables are cached in the workspace.
    fn resolve_table(&mut self, table: &TableRef) -> Result<Table, StatementError> {
        let default = self.config.default_library.as_str();
        let key = table.key(default);
        if let Some(found) = self.workspace.get(&key) {
            return Ok(found.clone());
        }
        if table.is_default_library(default) {
            return Err(StatementError::MissingSource { table: key });
        }
        let library = table.library_or(default).to_string();
        match self.library.load(&library, &table.name) {
            Ok(loaded) => {
                debug!(table = %key, rows = loaded.row_count(), "table loaded from library");
                self.workspace.insert(key, loaded.clone());
                Ok(loaded)
            }
            Err(LibraryError::NotFound { .. }) => Err(StatementError::MissingSource { table: key }),
            Err(err) => Err(err.into()),
        }
    }

    /// Bind `table` to `target`, saving it through the library manager when
    /// the target is library-qualified.
    fn store(&mut self, target: &TableRef, table: Table) -> Result<Notice, StatementError> {
        let default = self.config.default_library.clone();
        let key = target.key(&default);
        if !target.is_default_library(&default) {
            self.library.save(target.library_or(&default), &target.name, &table)?;
        }
        info!(table = %key, rows = table.row_count(), columns = table.column_count(), "table created");
        let notice = Notice::note(
            "osas::table_created",
            format!(
                "The data set {} has {} observations and {} variables",
                key.to_uppercase(),
                table.row_count(),
                table.column_count()
            ),
        );
        self.workspace.insert(key.clone(), table);
        self.last = Some(key);
        Ok(notice)
    }

    // -----------------------------------------------------------------------
    //  Accessors
    // -----------------------------------------------------------------------

    /// Table by name (`t`, `work.t` or `lib.t`), from the workspace only.
    pub fn table(&self, name: &str) -> Option<&Table> {
        let table = TableRef::parse(name)?;
        self.workspace.get(&table.key(&self.config.default_library))
    }

    /// All tables of the session.
    pub fn tables(&self) -> &Workspace {
        &self.workspace
    }

    /// Drop every table from the workspace. Library storage is untouched.
    pub fn clear_workspace(&mut self) {
        self.workspace.clear();
        self.last = None;
    }

    /// Workspace key of the most recently created table.
    pub fn last_table(&self) -> Option<&str> {
        self.last.as_deref()
    }

    /// Current value of a macro variable.
    pub fn macro_value(&self, name: &str) -> Option<&str> {
        self.macros.get(name)
    }

    /// Bind a macro variable, as `%LET` does.
    pub fn set_macro(&mut self, name: &str, value: impl Into<String>) {
        self.macros.set(name, value);
    }

    /// Declared library aliases and their locations.
    pub fn libraries(&self) -> Vec<(String, String)> {
        self.library.list_aliases()
    }

    /// The library manager.
    pub fn library(&self) -> &dyn LibraryManager {
        self.library.as_ref()
    }

    /// Report lines and `%PUT` output, in order.
    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// Take the output produced so far.
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    /// Diagnostics recorded so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Take the diagnostics recorded so far.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::MemoryLibrary;
    use crate::table::Value;

    fn session() -> Interpreter {
        Interpreter::with_library(InterpreterConfig::default(), Box::new(MemoryLibrary::new()))
    }

    fn codes(interp: &Interpreter) -> Vec<&str> {
        interp.diagnostics().iter().map(|d| d.code.as_str()).collect()
    }

    #[test]
    fn test_data_step_without_source() {
        let mut interp = session();
        let summary = interp.run("data x; a = 1; b = 'hi'; run;");
        assert_eq!(summary, RunSummary { statements: 1, failures: 0 });
        let table = interp.table("x").unwrap();
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.value(0, "a"), Value::Num(1.0));
        assert_eq!(interp.last_table(), Some("work.x"));
    }

    #[test]
    fn test_missing_source_is_isolated() {
        let mut interp = session();
        let summary = interp.run("data a; set nothere; run;\ndata b; x = 2; run;\n");
        assert_eq!(summary.failures, 1);
        assert!(interp.table("a").is_none());
        assert!(interp.table("b").is_some());
        let err = interp.diagnostics().iter().find(|d| d.is_error()).unwrap();
        assert_eq!(err.code, "osas::missing_source");
        assert_eq!(err.line, Some(1));
    }

    #[test]
    fn test_macro_let_and_put() {
        let mut interp = session();
        interp.run("%let n = 5;\n%put value is &n;\ndata t; x = &n; run;");
        assert_eq!(interp.macro_value("N"), Some("5"));
        assert_eq!(interp.output(), ["value is 5"]);
        assert_eq!(interp.table("t").unwrap().value(0, "x"), Value::Num(5.0));
    }

    #[test]
    fn test_unresolved_macro() {
        let mut interp = session();
        let summary = interp.run("data t; x = &nope; run;");
        assert_eq!(summary.failures, 1);
        assert_eq!(codes(&interp), vec!["osas::macro_unresolved"]);
    }

    #[test]
    fn test_unknown_statement_warns() {
        let mut interp = session();
        let summary = interp.run("bogus stuff;\ndata t; x = 1; run;");
        assert_eq!(summary.failures, 1);
        assert!(interp.diagnostics()[0].is_warning());
        assert_eq!(interp.diagnostics()[0].code, "osas::unknown_statement");
        assert!(interp.table("t").is_some());
    }

    #[test]
    fn test_proc_uses_last_table() {
        let mut interp = session();
        interp.run("data t; x = 1; run;\nproc print; run;");
        assert_eq!(interp.output()[0], "Obs  x");
    }

    #[test]
    fn test_proc_without_any_table() {
        let mut interp = session();
        interp.run("proc print; run;");
        assert_eq!(codes(&interp), vec!["osas::missing_source"]);
    }

    #[test]
    fn test_unknown_procedure() {
        let mut interp = session();
        interp.run("data t; x = 1; run;\nproc glm data=t; run;");
        assert!(codes(&interp).contains(&"osas::proc::unknown_procedure"));
    }

    #[test]
    fn test_libname_and_clear() {
        let mut interp = session();
        interp.run("libname mylib '/data/sas';");
        assert_eq!(interp.libraries(), vec![("mylib".to_string(), "/data/sas".to_string())]);
        interp.run("libname mylib clear;");
        assert!(interp.libraries().is_empty());
    }

    #[test]
    fn test_invalid_libname() {
        let mut interp = session();
        interp.run("libname onlyname;");
        assert_eq!(codes(&interp), vec!["osas::invalid_libname"]);
    }

    #[test]
    fn test_notes_can_be_disabled() {
        let config = InterpreterConfig { notes: false, ..InterpreterConfig::default() };
        let mut interp = Interpreter::with_library(config, Box::new(MemoryLibrary::new()));
        interp.run("data t; x = 1; run;");
        assert!(interp.diagnostics().is_empty());
    }

    #[test]
    fn test_unterminated_block_still_runs() {
        let mut interp = session();
        interp.run("data t; x = 1;");
        assert!(interp.table("t").is_some());
        assert!(codes(&interp).contains(&"osas::unterminated_block"));
    }
}
