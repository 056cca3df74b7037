//! Built-in functions callable from expressions.
//!
//! Each function works on one row's argument values. The evaluator decides
//! whether a call runs once (all arguments scalar) or once per row.
//!
//! Numeric functions return missing when a required argument is missing or
//! not numeric. The statistical functions (`SUM`, `MEAN`, `MIN`, `MAX`, `N`,
//! `NMISS`) skip missing arguments instead.

use std::collections::HashMap;

use miette::Diagnostic;
use thiserror::Error;

use crate::table::Value;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error, Diagnostic)]
pub enum FunctionError {
    #[error("unknown function: {0}")]
    #[diagnostic(code(osas::function::unknown))]
    UnknownFunction(String),

    #[error("wrong number of arguments for {name}: expected {expected}, got {got}")]
    #[diagnostic(code(osas::function::arg_count))]
    WrongArgCount {
        name: String,
        expected: String,
        got: usize,
    },
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

type BuiltinFn = fn(&[Value]) -> Result<Value, FunctionError>;

/// Registry of expression functions, keyed by upper-cased name.
#[derive(Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, BuiltinFn>,
}

impl FunctionRegistry {
    /// Create a registry pre-loaded with every built-in function.
    pub fn new() -> Self {
        let mut reg = Self { functions: HashMap::new() };

        // Statistical
        reg.register("SUM", fn_sum);
        reg.register("MEAN", fn_mean);
        reg.register("MIN", fn_min);
        reg.register("MAX", fn_max);
        reg.register("N", fn_n);
        reg.register("NMISS", fn_nmiss);

        // Numeric
        reg.register("ABS", fn_abs);
        reg.register("SQRT", fn_sqrt);
        reg.register("ROUND", fn_round);
        reg.register("INT", fn_int);
        reg.register("MOD", fn_mod);
        reg.register("EXP", fn_exp);
        reg.register("LOG", fn_log);
        reg.register("CEIL", fn_ceil);
        reg.register("FLOOR", fn_floor);

        // Character
        reg.register("LENGTH", fn_length);
        reg.register("SUBSTR", fn_substr);
        reg.register("INDEX", fn_index);
        reg.register("COMPRESS", fn_compress);
        reg.register("TRIM", fn_trim);
        reg.register("STRIP", fn_trim);
        reg.register("LEFT", fn_left);
        reg.register("UPCASE", fn_upcase);
        reg.register("LOWCASE", fn_lowcase);
        reg.register("REVERSE", fn_reverse);
        reg.register("CATS", fn_cats);
        reg.register("CATX", fn_catx);

        // Conditional
        reg.register("IFC", fn_ifc);
        reg.register("IFN", fn_ifn);
        reg.register("MISSING", fn_missing);

        reg
    }

    /// Register a function by name.
    pub fn register(&mut self, name: &str, func: BuiltinFn) {
        self.functions.insert(name.to_ascii_uppercase(), func);
    }

    /// Look up and invoke a function by name.
    pub fn invoke(&self, name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        let upper = name.to_ascii_uppercase();
        match self.functions.get(&upper) {
            Some(func) => func(args),
            None => Err(FunctionError::UnknownFunction(upper)),
        }
    }

    /// Check if a function exists.
    pub fn exists(&self, name: &str) -> bool {
        self.functions.contains_key(&name.to_ascii_uppercase())
    }

    /// List all registered function names.
    pub fn list_functions(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn check_args(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), FunctionError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max { min.to_string() } else { format!("{min}..{max}") };
        return Err(FunctionError::WrongArgCount { name: name.into(), expected, got: args.len() });
    }
    Ok(())
}

fn at_least(name: &str, args: &[Value], min: usize) -> Result<(), FunctionError> {
    check_args(name, args, min, usize::MAX)
}

fn text(v: &Value) -> String {
    v.as_text().unwrap_or_default()
}

fn numeric(args: &[Value], f: impl Fn(f64) -> f64) -> Value {
    match args[0].as_f64() {
        Some(x) => Value::number(f(x)),
        None => Value::Missing,
    }
}

fn present(args: &[Value]) -> Vec<f64> {
    args.iter().filter_map(Value::as_f64).collect()
}

// ---------------------------------------------------------------------------
// Statistical functions
// ---------------------------------------------------------------------------

fn fn_sum(args: &[Value]) -> Result<Value, FunctionError> {
    at_least("SUM", args, 1)?;
    let xs = present(args);
    if xs.is_empty() {
        return Ok(Value::Missing);
    }
    Ok(Value::number(xs.iter().sum()))
}

fn fn_mean(args: &[Value]) -> Result<Value, FunctionError> {
    at_least("MEAN", args, 1)?;
    let xs = present(args);
    if xs.is_empty() {
        return Ok(Value::Missing);
    }
    Ok(Value::number(xs.iter().sum::<f64>() / xs.len() as f64))
}

fn fn_min(args: &[Value]) -> Result<Value, FunctionError> {
    at_least("MIN", args, 1)?;
    Ok(present(args).into_iter().reduce(f64::min).map_or(Value::Missing, Value::Num))
}

fn fn_max(args: &[Value]) -> Result<Value, FunctionError> {
    at_least("MAX", args, 1)?;
    Ok(present(args).into_iter().reduce(f64::max).map_or(Value::Missing, Value::Num))
}

fn fn_n(args: &[Value]) -> Result<Value, FunctionError> {
    at_least("N", args, 1)?;
    Ok(Value::Num(present(args).len() as f64))
}

fn fn_nmiss(args: &[Value]) -> Result<Value, FunctionError> {
    at_least("NMISS", args, 1)?;
    Ok(Value::Num(args.iter().filter(|v| v.as_f64().is_none()).count() as f64))
}

// ---------------------------------------------------------------------------
// Numeric functions
// ---------------------------------------------------------------------------

fn fn_abs(args: &[Value]) -> Result<Value, FunctionError> {
    check_args("ABS", args, 1, 1)?;
    Ok(numeric(args, f64::abs))
}

fn fn_sqrt(args: &[Value]) -> Result<Value, FunctionError> {
    check_args("SQRT", args, 1, 1)?;
    Ok(numeric(args, f64::sqrt))
}

fn fn_round(args: &[Value]) -> Result<Value, FunctionError> {
    // ROUND(x [, unit]) rounds to the nearest multiple of unit (default 1).
    check_args("ROUND", args, 1, 2)?;
    let unit = match args.get(1) {
        Some(u) => match u.as_f64() {
            Some(u) if u > 0.0 => u,
            _ => return Ok(Value::Missing),
        },
        None => 1.0,
    };
    Ok(numeric(args, |x| {
        let r = (x / unit).round() * unit;
        // Trim representation noise such as 0.30000000000000004.
        (r * 1e10).round() / 1e10
    }))
}

fn fn_int(args: &[Value]) -> Result<Value, FunctionError> {
    check_args("INT", args, 1, 1)?;
    Ok(numeric(args, f64::trunc))
}

fn fn_mod(args: &[Value]) -> Result<Value, FunctionError> {
    check_args("MOD", args, 2, 2)?;
    match (args[0].as_f64(), args[1].as_f64()) {
        (Some(a), Some(b)) if b != 0.0 => Ok(Value::number(a % b)),
        _ => Ok(Value::Missing),
    }
}

fn fn_exp(args: &[Value]) -> Result<Value, FunctionError> {
    check_args("EXP", args, 1, 1)?;
    Ok(numeric(args, f64::exp))
}

fn fn_log(args: &[Value]) -> Result<Value, FunctionError> {
    check_args("LOG", args, 1, 1)?;
    Ok(numeric(args, f64::ln))
}

fn fn_ceil(args: &[Value]) -> Result<Value, FunctionError> {
    check_args("CEIL", args, 1, 1)?;
    Ok(numeric(args, f64::ceil))
}

fn fn_floor(args: &[Value]) -> Result<Value, FunctionError> {
    check_args("FLOOR", args, 1, 1)?;
    Ok(numeric(args, f64::floor))
}

// ---------------------------------------------------------------------------
// Character functions
// ---------------------------------------------------------------------------

fn fn_length(args: &[Value]) -> Result<Value, FunctionError> {
    // Trailing blanks do not count.
    check_args("LENGTH", args, 1, 1)?;
    Ok(Value::Num(text(&args[0]).trim_end().chars().count() as f64))
}

fn fn_substr(args: &[Value]) -> Result<Value, FunctionError> {
    // SUBSTR(string, start [, length]) with a 1-based start.
    check_args("SUBSTR", args, 2, 3)?;
    if args[0].is_missing() {
        return Ok(Value::Missing);
    }
    let chars: Vec<char> = text(&args[0]).chars().collect();
    let Some(start) = args[1].as_f64() else {
        return Ok(Value::Missing);
    };
    let start = (start.max(1.0) as usize - 1).min(chars.len());
    let end = match args.get(2).map(Value::as_f64) {
        // Clamp before converting so a huge length cannot overflow.
        Some(Some(len)) => start + len.clamp(0.0, chars.len() as f64) as usize,
        Some(None) => return Ok(Value::Missing),
        None => chars.len(),
    }
    .min(chars.len());
    Ok(Value::Text(chars[start..end].iter().collect()))
}

fn fn_index(args: &[Value]) -> Result<Value, FunctionError> {
    check_args("INDEX", args, 2, 2)?;
    let haystack = text(&args[0]);
    let needle = text(&args[1]);
    if needle.is_empty() {
        return Ok(Value::Num(0.0));
    }
    let position = haystack
        .find(&needle)
        .map_or(0, |byte| haystack[..byte].chars().count() + 1);
    Ok(Value::Num(position as f64))
}

fn fn_compress(args: &[Value]) -> Result<Value, FunctionError> {
    // COMPRESS(s) removes whitespace; COMPRESS(s, chars) removes those chars.
    check_args("COMPRESS", args, 1, 2)?;
    if args[0].is_missing() {
        return Ok(Value::Missing);
    }
    let s = text(&args[0]);
    let out: String = match args.get(1) {
        Some(set) => {
            let set = text(set);
            s.chars().filter(|c| !set.contains(*c)).collect()
        }
        None => s.chars().filter(|c| !c.is_whitespace()).collect(),
    };
    Ok(Value::Text(out))
}

fn text_map(name: &str, args: &[Value], f: impl Fn(&str) -> String) -> Result<Value, FunctionError> {
    check_args(name, args, 1, 1)?;
    match &args[0] {
        Value::Missing => Ok(Value::Missing),
        v => Ok(Value::Text(f(&text(v)))),
    }
}

fn fn_trim(args: &[Value]) -> Result<Value, FunctionError> {
    text_map("TRIM", args, |s| s.trim().to_string())
}

fn fn_left(args: &[Value]) -> Result<Value, FunctionError> {
    text_map("LEFT", args, |s| s.trim_start().to_string())
}

fn fn_upcase(args: &[Value]) -> Result<Value, FunctionError> {
    text_map("UPCASE", args, str::to_uppercase)
}

fn fn_lowcase(args: &[Value]) -> Result<Value, FunctionError> {
    text_map("LOWCASE", args, str::to_lowercase)
}

fn fn_reverse(args: &[Value]) -> Result<Value, FunctionError> {
    text_map("REVERSE", args, |s| s.chars().rev().collect())
}

fn fn_cats(args: &[Value]) -> Result<Value, FunctionError> {
    at_least("CATS", args, 1)?;
    let joined: String = args.iter().filter_map(Value::as_text).map(|s| s.trim().to_string()).collect();
    Ok(Value::Text(joined))
}

fn fn_catx(args: &[Value]) -> Result<Value, FunctionError> {
    // CATX(sep, a, b, ...) joins trimmed non-blank items with sep.
    at_least("CATX", args, 2)?;
    let sep = text(&args[0]);
    let parts: Vec<String> = args[1..]
        .iter()
        .filter_map(Value::as_text)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    Ok(Value::Text(parts.join(&sep)))
}

// ---------------------------------------------------------------------------
// Conditional functions
// ---------------------------------------------------------------------------

fn fn_ifc(args: &[Value]) -> Result<Value, FunctionError> {
    check_args("IFC", args, 3, 3)?;
    let chosen = if args[0].is_truthy() { &args[1] } else { &args[2] };
    Ok(chosen.as_text().map_or(Value::Missing, Value::Text))
}

fn fn_ifn(args: &[Value]) -> Result<Value, FunctionError> {
    check_args("IFN", args, 3, 3)?;
    let chosen = if args[0].is_truthy() { &args[1] } else { &args[2] };
    Ok(chosen.as_f64().map_or(Value::Missing, Value::Num))
}

fn fn_missing(args: &[Value]) -> Result<Value, FunctionError> {
    check_args("MISSING", args, 1, 1)?;
    let missing = match &args[0] {
        Value::Missing => true,
        Value::Text(s) => s.trim().is_empty(),
        Value::Num(_) => false,
    };
    Ok(Value::flag(missing))
}
