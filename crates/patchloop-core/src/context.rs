//! Deciding which existing files the generator gets to see.

use ignore::WalkBuilder;
use patchloop_llm::Generator;
use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

use crate::apply::resolve_relative;
use crate::config::ContextStrategy;
use crate::prompts::ChangePrompts;
use crate::repo_map::{generate_map, is_excluded, relative_path, RepoMap};

/// Source extensions read by the naive scan
const SOURCE_EXTENSIONS: &[&str] = &[
    "py", "rs", "js", "jsx", "mjs", "ts", "tsx", "go", "java", "rb", "c", "h", "cpp", "hpp", "cs",
    "sh", "toml", "yaml", "yml",
];

/// Extension-less or manifest files always included by the naive scan
const MANIFEST_FILES: &[&str] = &[
    "Dockerfile",
    "pyproject.toml",
    "requirements.txt",
    "Cargo.toml",
    "package.json",
    "go.mod",
];

const MAX_SCAN_FILE_BYTES: u64 = 256 * 1024;

/// Asks the backend which files of a repository map are relevant to a task
pub struct ContextSelector<'a> {
    generator: &'a dyn Generator,
}

impl<'a> ContextSelector<'a> {
    pub fn new(generator: &'a dyn Generator) -> Self {
        Self { generator }
    }

    /// Paths to read; empty when the backend fails or answers with anything
    /// other than a JSON array.
    pub async fn select_files(&self, task_text: &str, repo_map: &RepoMap) -> Vec<String> {
        let prompt = ChangePrompts::build_selection_prompt(&repo_map.to_string(), task_text);
        let response = self
            .generator
            .generate(ChangePrompts::selection_system_prompt(), &prompt)
            .await;
        let selected = parse_selection(&response);
        debug!(selected = ?selected, "File selection");
        selected
    }
}

/// Parse a JSON array of paths, tolerating a fenced code block around it
pub fn parse_selection(response: &str) -> Vec<String> {
    let body = strip_fences(response);
    let value: serde_json::Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "File selection is not valid JSON");
            return Vec::new();
        }
    };
    let Some(items) = value.as_array() else {
        debug!("File selection is not a JSON array");
        return Vec::new();
    };

    let mut paths: Vec<String> = Vec::new();
    for item in items {
        let Some(raw) = item.as_str() else { continue };
        let mut path = raw.trim();
        while let Some(rest) = path.strip_prefix("./") {
            path = rest;
        }
        if !path.is_empty() && !paths.iter().any(|p| p == path) {
            paths.push(path.to_string());
        }
    }
    paths
}

fn strip_fences(response: &str) -> &str {
    let mut text = response.trim();
    for marker in ["```json", "```JSON", "```"] {
        if let Some(rest) = text.strip_prefix(marker) {
            text = rest;
            break;
        }
    }
    text.strip_suffix("```").unwrap_or(text).trim()
}

/// Every readable source file and manifest under `root`, sorted, skipping
/// excluded directories and files over 256 KiB
pub fn naive_scan(root: &Path) -> Vec<String> {
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(|entry| {
            !(entry.depth() > 0
                && entry.file_type().map(|t| t.is_dir()).unwrap_or(false)
                && is_excluded(entry.file_name()))
        })
        .build();

    let mut files = Vec::new();
    for entry in walker.flatten() {
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let path = entry.path();
        if !is_scannable(path) {
            continue;
        }
        match entry.metadata() {
            Ok(meta) if meta.len() <= MAX_SCAN_FILE_BYTES => {
                files.push(relative_path(root, path));
            }
            Ok(meta) => debug!(path = %path.display(), bytes = meta.len(), "Skipping large file"),
            Err(_) => {}
        }
    }
    files
}

fn is_scannable(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    if MANIFEST_FILES.contains(&name) {
        return true;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| SOURCE_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

/// Where the files of a [`GatheredContext`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextSource {
    /// Backend selection over the repository map
    Selection,
    /// Full scan by configuration
    FullScan,
    /// Full scan because the map could not be built
    Fallback,
}

impl fmt::Display for ContextSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextSource::Selection => write!(f, "selection"),
            ContextSource::FullScan => write!(f, "full-scan"),
            ContextSource::Fallback => write!(f, "fallback-scan"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatheredContext {
    pub source: ContextSource,
    /// Files actually read
    pub files: Vec<String>,
    /// Rendered file contents in the edit annotation format
    pub text: String,
}

/// Builds the file context for one generation step
pub struct ContextGatherer<'a> {
    generator: &'a dyn Generator,
    root: PathBuf,
    strategy: ContextStrategy,
    max_depth: usize,
}

impl<'a> ContextGatherer<'a> {
    pub fn new(
        generator: &'a dyn Generator,
        root: impl Into<PathBuf>,
        strategy: ContextStrategy,
        max_depth: usize,
    ) -> Self {
        Self {
            generator,
            root: root.into(),
            strategy,
            max_depth,
        }
    }

    /// Gather context for `task_text`. The repository map is rebuilt on every call.
    pub async fn gather(&self, task_text: &str) -> GatheredContext {
        let (source, candidates) = match self.strategy {
            ContextStrategy::Full => (ContextSource::FullScan, naive_scan(&self.root)),
            ContextStrategy::Smart => match generate_map(&self.root, self.max_depth) {
                Ok(map) => {
                    let selector = ContextSelector::new(self.generator);
                    let mut selected = selector.select_files(task_text, &map).await;
                    let listed: HashSet<&str> = map.paths().collect();
                    selected.retain(|path| {
                        let known = listed.contains(path.as_str());
                        if !known {
                            debug!(path = %path, "Ignoring selected path missing from the map");
                        }
                        known
                    });
                    (ContextSource::Selection, selected)
                }
                Err(e) => {
                    warn!(error = %e, "Repository map unavailable, scanning all source files");
                    (ContextSource::Fallback, naive_scan(&self.root))
                }
            },
        };

        let (files, text) = render_files(&self.root, &candidates);
        info!(source = %source, files = files.len(), chars = text.len(), "Gathered context");
        GatheredContext { source, files, text }
    }
}

/// Read and render `paths`; missing, unreadable and private files are skipped
pub fn render_files(root: &Path, paths: &[String]) -> (Vec<String>, String) {
    let mut read = Vec::new();
    let mut text = String::new();
    for path in paths {
        let Some(full) = resolve_relative(root, path) else {
            debug!(path = %path, "Skipping path outside the working tree");
            continue;
        };
        if is_private(path) {
            debug!(path = %path, "Skipping hidden or excluded path");
            continue;
        }
        let content = match std::fs::read_to_string(&full) {
            Ok(content) => content,
            Err(e) => {
                debug!(path = %path, error = %e, "Skipping unreadable file");
                continue;
            }
        };
        let lang = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        text.push_str(&format!("\nFile: `{}`\n```{}\n{}", path, lang, content));
        if !content.ends_with('\n') {
            text.push('\n');
        }
        text.push_str("```\n");
        read.push(path.clone());
    }
    (read, text)
}

/// Dotfiles such as `.env`, and anything under a hidden or excluded
/// directory, never reach the backend
fn is_private(path: &str) -> bool {
    Path::new(path).components().any(|component| match component {
        Component::Normal(part) => {
            part.to_str().map_or(true, |name| name.starts_with('.')) || is_excluded(part)
        }
        _ => false,
    })
}
