//! End-to-end tests: whole scripts run through the interpreter.

use std::cell::RefCell;
use std::rc::Rc;

use open_sas_engine::{
    segment_script, BlockKind, ColumnData, DirectoryLibrary, Interpreter, InterpreterConfig, LibraryManager,
    MemoryLibrary, ProcError, ProcOutput, ProcRequest, ProcedureHandler, Table, Value, ValueKind,
};

fn session() -> Interpreter {
    Interpreter::with_library(InterpreterConfig::default(), Box::new(MemoryLibrary::new()))
}

fn error_codes(interp: &Interpreter) -> Vec<String> {
    interp
        .diagnostics()
        .iter()
        .filter(|d| d.is_error())
        .map(|d| d.code.clone())
        .collect()
}

/// A PRINT replacement that keeps every table it is handed.
struct RecordingPrint {
    seen: Rc<RefCell<Vec<Table>>>,
}

impl ProcedureHandler for RecordingPrint {
    fn name(&self) -> &str {
        "PRINT"
    }

    fn execute(&self, input: &Table, _request: &ProcRequest) -> Result<ProcOutput, ProcError> {
        self.seen.borrow_mut().push(input.clone());
        Ok(ProcOutput::default())
    }
}

const PEOPLE: &str = "\
data work.people;
  input name $ age;
  datalines;
ann 31
bob 17
cy 45
;
run;
";

// ─────── DATALINES and PROC hand-off ───────

#[test]
fn test_datalines_table_reaches_print_unmodified() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut interp = session();
    interp.procedures_mut().register(Box::new(RecordingPrint { seen: Rc::clone(&seen) }));

    let script = "data work.t;\n  input n $ v;\n  datalines;\nx 1\ny 2\n;\nrun;\nproc print data=work.t;\nrun;\n";
    let summary = interp.run(script);
    assert_eq!(summary.failures, 0, "{:?}", interp.diagnostics());

    let table = interp.table("work.t").unwrap();
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.column("n").unwrap().kind(), ValueKind::Text);
    assert_eq!(table.column("v").unwrap().data, ColumnData::Numeric(vec![Some(1.0), Some(2.0)]));
    assert_eq!(table.value(1, "n"), Value::Text("y".into()));

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(&seen[0], table);
}

#[test]
fn test_mismatched_datalines_rows_dropped() {
    let mut interp = session();
    interp.run("data t;\n input a b;\n datalines;\n1 2\n1 2 3\n4 5\n;\nrun;\n");
    assert_eq!(interp.table("t").unwrap().row_count(), 2);
    assert!(interp
        .diagnostics()
        .iter()
        .any(|d| d.code == "osas::datalines_row_dropped" && d.is_warning()));
}

#[test]
fn test_datalines_lines_are_literal() {
    let mut interp = session();
    interp.run("data t;\n input word $;\n cards;\na*b\n&notamacro\n;\nrun;\n");
    let table = interp.table("t").unwrap();
    assert_eq!(table.value(0, "word"), Value::Text("a*b".into()));
    assert_eq!(table.value(1, "word"), Value::Text("&notamacro".into()));
}

#[test]
fn test_datalines_closed_on_statement_line() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut interp = session();
    interp.procedures_mut().register(Box::new(RecordingPrint { seen: Rc::clone(&seen) }));

    let summary = interp.run("data work.t; input n $ v; datalines; x 1 y 2 ; run;\nproc print data=work.t; run;\n");
    assert_eq!(summary.failures, 0, "{:?}", interp.diagnostics());

    let table = interp.table("work.t").unwrap();
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.value(0, "n"), Value::Text("x".into()));
    assert_eq!(table.value(1, "n"), Value::Text("y".into()));
    assert_eq!(table.column("v").unwrap().data, ColumnData::Numeric(vec![Some(1.0), Some(2.0)]));
    assert_eq!(seen.borrow().len(), 1);
}

// ─────── DATA step semantics ───────

#[test]
fn test_masked_assignment_over_source() {
    let mut interp = session();
    interp.run("data s;\n input x;\n datalines;\n5\n15\n20\n;\nrun;\ndata t;\n set s;\n if x > 10 then y = 'Hi';\nrun;\n");
    let y = &interp.table("t").unwrap().column("y").unwrap().data;
    assert_eq!(y, &ColumnData::Text(vec![None, Some("Hi".into()), Some("Hi".into())]));
}

#[test]
fn test_keep_drop_rename_after_assignments() {
    let mut interp = session();
    interp.run("data t;\n rename a=z;\n drop b;\n a = 1;\n b = 2;\n c = 3;\nrun;\n");
    assert_eq!(interp.table("t").unwrap().column_names(), vec!["z", "c"]);
}

#[test]
fn test_quoted_semicolon_stays_in_one_block() {
    let script = "data work.t; x = \"a;b\"; run;";
    let blocks = segment_script(script);
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].kind, BlockKind::DataStep);

    let mut interp = session();
    interp.run(script);
    assert_eq!(interp.table("work.t").unwrap().value(0, "x"), Value::Text("a;b".into()));
}

#[test]
fn test_where_and_functions() {
    let mut interp = session();
    interp.run(PEOPLE);
    interp.run("data adults;\n set people;\n where age >= 18;\n tag = upcase(substr(name, 1, 1));\n older = ifn(age > 40, 1, 0);\nrun;\n");
    let t = interp.table("adults").unwrap();
    assert_eq!(t.row_count(), 2);
    assert_eq!(t.value(0, "tag"), Value::Text("A".into()));
    assert_eq!(t.value(1, "older"), Value::Num(1.0));
}

#[test]
fn test_unknown_function_falls_back_to_zero() {
    let mut interp = session();
    interp.run(PEOPLE);
    let summary = interp.run("data t; set people; z = frobnicate(age); run;");
    assert_eq!(summary.failures, 0);
    let z = &interp.table("t").unwrap().column("z").unwrap().data;
    assert_eq!(z, &ColumnData::Numeric(vec![Some(0.0); 3]));
    assert!(interp.diagnostics().iter().any(|d| d.code == "osas::evaluation_fallback"));
}

#[test]
fn test_comments_are_ignored() {
    let mut interp = session();
    let summary = interp.run("/* header\n   comment */\ndata t;\n x = 3; * set x;\n y = x; /* copy */\nrun;\n");
    assert_eq!(summary, open_sas_engine::RunSummary { statements: 1, failures: 0 });
    assert_eq!(interp.table("t").unwrap().value(0, "y"), Value::Num(3.0));
    assert!(interp.diagnostics().iter().all(|d| !d.is_warning()));
}

// ─────── Failure isolation ───────

#[test]
fn test_huge_substr_length_does_not_abort() {
    let mut interp = session();
    let summary = interp.run("data t; s = substr('abc', 2, 1e20); run;\ndata u; ok = 1; run;\n");
    assert_eq!(summary.failures, 0, "{:?}", interp.diagnostics());
    assert_eq!(interp.table("t").unwrap().value(0, "s"), Value::Text("bc".into()));
    assert!(interp.table("u").is_some());
}

#[test]
fn test_failures_do_not_stop_the_script() {
    let mut interp = session();
    let script = format!(
        "{PEOPLE}data a; set missing_table; run;\n%put &undefined;\nproc nosuch data=people; run;\ndata b; set people; run;\n"
    );
    let summary = interp.run(&script);
    assert_eq!(summary.statements, 5);
    assert_eq!(summary.failures, 3);
    assert_eq!(
        error_codes(&interp),
        vec!["osas::missing_source", "osas::macro_unresolved", "osas::proc::unknown_procedure"]
    );
    assert_eq!(interp.table("b").unwrap().row_count(), 3);
    assert!(interp.table("a").is_none());
}

// ─────── Libraries ───────

#[test]
fn test_library_round_trip_in_memory() {
    let mut interp = session();
    interp.run(PEOPLE);
    interp.run("libname lib './x';\ndata lib.t; set work.people; run;\n");
    assert_eq!(interp.library().list_tables("lib").unwrap(), vec!["t"]);

    interp.clear_workspace();
    assert!(interp.tables().is_empty());

    let seen = Rc::new(RefCell::new(Vec::new()));
    interp.procedures_mut().register(Box::new(RecordingPrint { seen: Rc::clone(&seen) }));
    let summary = interp.run("proc print data=lib.t; run;");
    assert_eq!(summary.failures, 0, "{:?}", interp.diagnostics());
    assert_eq!(seen.borrow()[0].row_count(), 3);
    assert!(interp.table("lib.t").is_some());
}

#[test]
fn test_library_round_trip_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let config = InterpreterConfig { library_root: Some(dir.path().to_path_buf()), ..InterpreterConfig::default() };
    let mut interp = Interpreter::new(config);
    interp.run(PEOPLE);
    interp.run("libname store 'tables';\ndata store.people; set people; run;\n");
    assert!(dir.path().join("tables").join("people.json").exists());

    // A fresh session sees the saved table.
    let mut other = DirectoryLibrary::with_root(dir.path());
    other.create_alias("store", "tables").unwrap();
    let loaded = other.load("store", "people").unwrap();
    assert_eq!(&loaded, interp.table("work.people").unwrap());
}

#[test]
fn test_unknown_libref() {
    let mut interp = session();
    interp.run(PEOPLE);
    interp.run("data nolib.t; set people; run;");
    assert_eq!(error_codes(&interp), vec!["osas::library::unknown_alias"]);
}

// ─────── Procedures ───────

#[test]
fn test_sort_then_print() {
    let mut interp = session();
    interp.run(PEOPLE);
    interp.run("proc sort data=people out=sorted;\n by descending age;\nrun;\nproc print data=sorted noobs;\n var name;\nrun;\n");
    let out: Vec<&str> = interp.output().iter().map(String::as_str).collect();
    let start = out.iter().position(|l| *l == "name").unwrap();
    assert_eq!(&out[start + 2..start + 5], &["cy", "ann", "bob"]);
    assert_eq!(interp.last_table(), Some("work.sorted"));
}

#[test]
fn test_proc_where_filters_input() {
    let mut interp = session();
    interp.run(PEOPLE);
    interp.run("proc means data=people n out=stats;\n var age;\n where age < 40;\nrun;\n");
    let stats = interp.table("stats").unwrap();
    assert_eq!(stats.value(0, "N"), Value::Num(2.0));
}

#[test]
fn test_max_print_rows() {
    let config = InterpreterConfig { max_print_rows: Some(1), ..InterpreterConfig::default() };
    let mut interp = Interpreter::with_library(config, Box::new(MemoryLibrary::new()));
    interp.run(PEOPLE);
    interp.run("proc print data=people; run;");
    assert_eq!(interp.output().len(), 3);
}

#[test]
fn test_macro_in_table_name() {
    let mut interp = session();
    interp.set_macro("src", "people");
    interp.run(PEOPLE);
    interp.run("%let out = copy;\ndata &out.; set &src; run;\n");
    assert_eq!(interp.table("copy").unwrap().row_count(), 3);
}
