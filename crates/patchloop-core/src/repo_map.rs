use ignore::WalkBuilder;
use serde::Serialize;
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::symbols::{extract_symbols, FileSymbols, Language};

/// Directories never walked: version control, virtual envs, build output, editor state
pub const EXCLUDED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".venv",
    "venv",
    "env",
    "__pycache__",
    "node_modules",
    "target",
    "build",
    "dist",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    ".idea",
    ".vscode",
];

/// Sentinel symbol line for files that could not be parsed
pub const PARSE_ERROR_MARKER: &str = "[parse error]";

/// Files above this size are listed by path only
const MAX_PARSE_BYTES: u64 = 1024 * 1024;

#[derive(Error, Debug)]
pub enum MapError {
    #[error("Cannot read repository root {path}: {source}")]
    UnreadableRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoMapEntry {
    /// Path relative to the root, `/`-separated
    pub path: String,
    pub symbols: Vec<String>,
}

/// Structural summary of a source tree, one entry per file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepoMap {
    pub entries: Vec<RepoMapEntry>,
}

impl RepoMap {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.path.as_str())
    }
}

impl fmt::Display for RepoMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{}", entry.path)?;
            for symbol in &entry.symbols {
                writeln!(f, "  {}", symbol)?;
            }
        }
        Ok(())
    }
}

pub(crate) fn is_excluded(name: &OsStr) -> bool {
    name.to_str()
        .map(|n| EXCLUDED_DIRS.contains(&n))
        .unwrap_or(false)
}

pub(crate) fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Build a map of every file under `root`, descending at most `max_depth`
/// levels (1 = files directly under `root`).
///
/// Only an unreadable root is an error; unreadable or unparsable files are
/// recorded with the [`PARSE_ERROR_MARKER`] line.
pub fn generate_map(root: &Path, max_depth: usize) -> Result<RepoMap, MapError> {
    std::fs::read_dir(root).map_err(|source| MapError::UnreadableRoot {
        path: root.to_path_buf(),
        source,
    })?;

    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .max_depth(Some(max_depth))
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(|entry| {
            !(entry.depth() > 0
                && entry.file_type().map(|t| t.is_dir()).unwrap_or(false)
                && is_excluded(entry.file_name()))
        })
        .build();

    let mut map = RepoMap::default();
    for result in walker {
        let entry = match result {
            Ok(entry) => entry,
            Err(e) => {
                debug!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }

        let path = entry.path();
        let symbols = match Language::from_path(path) {
            Some(language) => file_symbols(path, language),
            None => Vec::new(),
        };
        map.entries.push(RepoMapEntry {
            path: relative_path(root, path),
            symbols,
        });
    }

    debug!(files = map.len(), root = %root.display(), "Generated repository map");
    Ok(map)
}

fn file_symbols(path: &Path, language: Language) -> Vec<String> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > MAX_PARSE_BYTES => return Vec::new(),
        Ok(_) => {}
        Err(_) => return vec![PARSE_ERROR_MARKER.to_string()],
    }
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(_) => return vec![PARSE_ERROR_MARKER.to_string()],
    };
    match extract_symbols(&bytes, language) {
        FileSymbols::Parsed(lines) => lines,
        FileSymbols::ParseError => vec![PARSE_ERROR_MARKER.to_string()],
    }
}
