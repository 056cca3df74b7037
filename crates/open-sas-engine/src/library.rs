//! Library managers: where library-qualified tables live.
//!
//! A `LIBNAME` statement maps an alias to a location; `lib.table` then loads
//! from and saves to that location through a [`LibraryManager`].
//!
//! - [`DirectoryLibrary`] stores each table as `<location>/<table>.json`.
//! - [`MemoryLibrary`] keeps tables in memory, keyed by location, so two
//!   aliases for the same location share tables.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;
use tracing::debug;

use crate::table::Table;

/// Errors from library operations.
#[derive(Debug, Error, Diagnostic)]
pub enum LibraryError {
    /// No `LIBNAME` declared this alias.
    #[error("libref {alias} is not assigned")]
    #[diagnostic(code(osas::library::unknown_alias))]
    UnknownAlias {
        /// Requested alias.
        alias: String,
    },

    /// The library has no such table.
    #[error("table {alias}.{table} does not exist")]
    #[diagnostic(code(osas::library::not_found))]
    NotFound {
        /// Library alias.
        alias: String,
        /// Table name.
        table: String,
    },

    /// Reading or writing the backing store failed.
    #[error("I/O error on {}: {source}", path.display())]
    #[diagnostic(code(osas::library::io))]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A stored table could not be encoded or decoded.
    #[error("invalid table file {}: {source}", path.display())]
    #[diagnostic(code(osas::library::format))]
    Format {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

/// Storage behind library aliases.
pub trait LibraryManager {
    /// Map `name` to `location`, replacing any previous mapping.
    fn create_alias(&mut self, name: &str, location: &str) -> Result<(), LibraryError>;

    /// Forget an alias. Stored tables are kept.
    fn remove_alias(&mut self, name: &str) -> Result<(), LibraryError>;

    /// Load `alias.table`.
    fn load(&self, alias: &str, table: &str) -> Result<Table, LibraryError>;

    /// Store `data` as `alias.table`, replacing any previous table.
    fn save(&mut self, alias: &str, table: &str, data: &Table) -> Result<(), LibraryError>;

    /// Declared aliases and their locations, sorted by alias.
    fn list_aliases(&self) -> Vec<(String, String)>;

    /// Tables stored under an alias, sorted.
    fn list_tables(&self, alias: &str) -> Result<Vec<String>, LibraryError>;
}

// ---------------------------------------------------------------------------
//  In-memory library
// ---------------------------------------------------------------------------

/// Library manager that never touches the filesystem.
#[derive(Debug, Clone, Default)]
pub struct MemoryLibrary {
    aliases: BTreeMap<String, String>,
    tables: HashMap<(String, String), Table>,
}

impl MemoryLibrary {
    /// An empty library manager.
    pub fn new() -> Self {
        Self::default()
    }

    fn location(&self, alias: &str) -> Result<&str, LibraryError> {
        self.aliases
            .get(&alias.to_ascii_lowercase())
            .map(String::as_str)
            .ok_or_else(|| LibraryError::UnknownAlias { alias: alias.to_string() })
    }
}

impl LibraryManager for MemoryLibrary {
    fn create_alias(&mut self, name: &str, location: &str) -> Result<(), LibraryError> {
        self.aliases.insert(name.to_ascii_lowercase(), location.to_string());
        Ok(())
    }

    fn remove_alias(&mut self, name: &str) -> Result<(), LibraryError> {
        self.aliases
            .remove(&name.to_ascii_lowercase())
            .map(|_| ())
            .ok_or_else(|| LibraryError::UnknownAlias { alias: name.to_string() })
    }

    fn load(&self, alias: &str, table: &str) -> Result<Table, LibraryError> {
        let location = self.location(alias)?;
        self.tables
            .get(&(location.to_string(), table.to_ascii_lowercase()))
            .cloned()
            .ok_or_else(|| LibraryError::NotFound { alias: alias.to_string(), table: table.to_string() })
    }

    fn save(&mut self, alias: &str, table: &str, data: &Table) -> Result<(), LibraryError> {
        let location = self.location(alias)?.to_string();
        self.tables.insert((location, table.to_ascii_lowercase()), data.clone());
        Ok(())
    }

    fn list_aliases(&self) -> Vec<(String, String)> {
        self.aliases.iter().map(|(a, l)| (a.clone(), l.clone())).collect()
    }

    fn list_tables(&self, alias: &str) -> Result<Vec<String>, LibraryError> {
        let location = self.location(alias)?;
        let mut names: Vec<String> = self
            .tables
            .keys()
            .filter(|(loc, _)| loc == location)
            .map(|(_, name)| name.clone())
            .collect();
        names.sort();
        Ok(names)
    }
}

// ---------------------------------------------------------------------------
//  Directory library
// ---------------------------------------------------------------------------

/// Library manager storing one JSON file per table.
#[derive(Debug, Clone, Default)]
pub struct DirectoryLibrary {
    root: Option<PathBuf>,
    aliases: BTreeMap<String, PathBuf>,
}

impl DirectoryLibrary {
    /// Relative locations resolve against the current directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Relative locations resolve against `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: Some(root.into()), aliases: BTreeMap::new() }
    }

    /// Directory behind an alias.
    pub fn directory(&self, alias: &str) -> Result<&Path, LibraryError> {
        self.aliases
            .get(&alias.to_ascii_lowercase())
            .map(PathBuf::as_path)
            .ok_or_else(|| LibraryError::UnknownAlias { alias: alias.to_string() })
    }

    fn table_path(&self, alias: &str, table: &str) -> Result<PathBuf, LibraryError> {
        Ok(self.directory(alias)?.join(format!("{}.json", table.to_ascii_lowercase())))
    }
}

impl LibraryManager for DirectoryLibrary {
    fn create_alias(&mut self, name: &str, location: &str) -> Result<(), LibraryError> {
        let path = Path::new(location);
        let resolved = match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        };
        debug!(alias = %name, path = %resolved.display(), "library assigned");
        self.aliases.insert(name.to_ascii_lowercase(), resolved);
        Ok(())
    }

    fn remove_alias(&mut self, name: &str) -> Result<(), LibraryError> {
        self.aliases
            .remove(&name.to_ascii_lowercase())
            .map(|_| ())
            .ok_or_else(|| LibraryError::UnknownAlias { alias: name.to_string() })
    }

    fn load(&self, alias: &str, table: &str) -> Result<Table, LibraryError> {
        let path = self.table_path(alias, table)?;
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LibraryError::NotFound { alias: alias.to_string(), table: table.to_string() });
            }
            Err(source) => return Err(LibraryError::Io { path, source }),
        };
        serde_json::from_str(&text).map_err(|source| LibraryError::Format { path, source })
    }

    fn save(&mut self, alias: &str, table: &str, data: &Table) -> Result<(), LibraryError> {
        let dir = self.directory(alias)?.to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| LibraryError::Io { path: dir.clone(), source })?;
        let path = self.table_path(alias, table)?;
        let text = serde_json::to_string_pretty(data).map_err(|source| LibraryError::Format {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, text).map_err(|source| LibraryError::Io { path: path.clone(), source })?;
        debug!(path = %path.display(), rows = data.row_count(), "table saved");
        Ok(())
    }

    fn list_aliases(&self) -> Vec<(String, String)> {
        self.aliases
            .iter()
            .map(|(a, p)| (a.clone(), p.display().to_string()))
            .collect()
    }

    fn list_tables(&self, alias: &str) -> Result<Vec<String>, LibraryError> {
        let dir = self.directory(alias)?;
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(LibraryError::Io { path: dir.to_path_buf(), source }),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| LibraryError::Io { path: dir.to_path_buf(), source })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    fn sample() -> Table {
        Table::from_columns(vec![Column::text("n", &["x", "y"]), Column::numeric("v", &[1.0, 2.0])]).unwrap()
    }

    #[test]
    fn test_memory_round_trip() {
        let mut lib = MemoryLibrary::new();
        lib.create_alias("Mylib", "./x").unwrap();
        lib.save("mylib", "T", &sample()).unwrap();
        assert_eq!(lib.load("MYLIB", "t").unwrap(), sample());
        assert_eq!(lib.list_tables("mylib").unwrap(), vec!["t"]);
    }

    #[test]
    fn test_memory_shared_location() {
        let mut lib = MemoryLibrary::new();
        lib.create_alias("a", "/data").unwrap();
        lib.create_alias("b", "/data").unwrap();
        lib.save("a", "t", &sample()).unwrap();
        assert!(lib.load("b", "t").is_ok());
    }

    #[test]
    fn test_memory_errors() {
        let mut lib = MemoryLibrary::new();
        assert!(matches!(lib.load("nope", "t"), Err(LibraryError::UnknownAlias { .. })));
        lib.create_alias("a", "/data").unwrap();
        assert!(matches!(lib.load("a", "t"), Err(LibraryError::NotFound { .. })));
        lib.remove_alias("a").unwrap();
        assert!(matches!(lib.remove_alias("a"), Err(LibraryError::UnknownAlias { .. })));
    }

    #[test]
    fn test_directory_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut lib = DirectoryLibrary::with_root(dir.path());
        lib.create_alias("lib", "store").unwrap();
        lib.save("lib", "t", &sample()).unwrap();
        assert!(dir.path().join("store").join("t.json").exists());
        assert_eq!(lib.load("lib", "t").unwrap(), sample());
        assert_eq!(lib.list_tables("lib").unwrap(), vec!["t"]);
        assert!(matches!(lib.load("lib", "u"), Err(LibraryError::NotFound { .. })));
    }

    #[test]
    fn test_directory_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), "not json").unwrap();
        let mut lib = DirectoryLibrary::new();
        lib.create_alias("lib", dir.path().to_str().unwrap()).unwrap();
        assert!(matches!(lib.load("lib", "bad"), Err(LibraryError::Format { .. })));
    }
}
