use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

use crate::FileEdit;

#[derive(Error, Debug)]
pub enum ApplyError {
    /// Absolute, empty, escaping the root, or inside `.git`
    #[error("Refusing unsafe path: {0}")]
    UnsafePath(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of applying an edit set; every failure is kept
#[derive(Debug, Default)]
pub struct ApplyReport {
    pub applied: Vec<String>,
    pub failed: Vec<(String, ApplyError)>,
}

impl ApplyReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// `path: error` for each failed edit
    pub fn failure_messages(&self) -> Vec<String> {
        self.failed
            .iter()
            .map(|(path, e)| format!("{}: {}", path, e))
            .collect()
    }
}

/// Resolve `path` under `root`, or `None` when it would escape it
pub(crate) fn resolve_relative(root: &Path, path: &str) -> Option<PathBuf> {
    if path.trim().is_empty() {
        return None;
    }
    let mut resolved = root.to_path_buf();
    let mut normal = 0usize;
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => {
                if normal == 0 && part == ".git" {
                    return None;
                }
                resolved.push(part);
                normal += 1;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (normal > 0).then_some(resolved)
}

/// Writes edit sets into a working tree, one atomic replace per file.
///
/// A batch is all or nothing: unsafe paths are rejected before anything is
/// written, and an I/O failure partway through restores the files already
/// replaced.
pub struct EditApplier {
    root: PathBuf,
}

/// What a target looked like before the batch touched it
struct Prior {
    target: PathBuf,
    content: Option<Vec<u8>>,
    /// Topmost directory created for this edit
    created_dir: Option<PathBuf>,
}

impl EditApplier {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Apply the edit set. On any failure the tree is left as it was and
    /// `applied` is empty. Re-applying the same set leaves the tree unchanged.
    pub fn apply(&self, edits: &[FileEdit]) -> ApplyReport {
        let mut report = ApplyReport::default();

        let mut targets = Vec::with_capacity(edits.len());
        for edit in edits {
            match resolve_relative(&self.root, &edit.path) {
                Some(target) => targets.push(target),
                None => {
                    warn!(path = %edit.path, "Refusing unsafe edit path");
                    report
                        .failed
                        .push((edit.path.clone(), ApplyError::UnsafePath(edit.path.clone())));
                }
            }
        }
        if !report.failed.is_empty() {
            return report;
        }

        let mut written: Vec<Prior> = Vec::with_capacity(edits.len());
        for (edit, target) in edits.iter().zip(targets) {
            match self.write_one(&target, &edit.content) {
                Ok(prior) => {
                    debug!(path = %edit.path, bytes = edit.content.len(), "Applied edit");
                    written.push(prior);
                    report.applied.push(edit.path.clone());
                }
                Err(e) => {
                    warn!(path = %edit.path, error = %e, "Failed to apply edit, restoring batch");
                    report.failed.push((edit.path.clone(), e));
                    rollback(written);
                    report.applied.clear();
                    return report;
                }
            }
        }
        report
    }

    fn write_one(&self, target: &Path, content: &str) -> Result<Prior, ApplyError> {
        let parent = target
            .parent()
            .ok_or_else(|| ApplyError::UnsafePath(target.display().to_string()))?;
        let previous = match std::fs::read(target) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        let created_dir = first_missing_ancestor(&self.root, parent);

        let written = (|| -> Result<(), ApplyError> {
            std::fs::create_dir_all(parent)?;
            let mut tmp = NamedTempFile::new_in(parent)?;
            tmp.write_all(content.as_bytes())?;
            tmp.flush()?;
            tmp.persist(target).map_err(|e| e.error)?;
            Ok(())
        })();
        // A failed persist leaves the target untouched; only new directories go
        if let Err(e) = written {
            if let Some(dir) = &created_dir {
                let _ = std::fs::remove_dir_all(dir);
            }
            return Err(e);
        }
        Ok(Prior {
            target: target.to_path_buf(),
            content: previous,
            created_dir,
        })
    }
}

/// The outermost directory between `root` and `dir` that does not exist yet
fn first_missing_ancestor(root: &Path, dir: &Path) -> Option<PathBuf> {
    let mut missing = None;
    let mut current = Some(dir);
    while let Some(path) = current {
        if path == root || path.exists() {
            break;
        }
        missing = Some(path.to_path_buf());
        current = path.parent();
    }
    missing
}

/// Undo written edits, newest first
fn rollback(written: Vec<Prior>) {
    for prior in written.into_iter().rev() {
        let restored = match &prior.content {
            Some(bytes) => std::fs::write(&prior.target, bytes),
            None => match std::fs::remove_file(&prior.target) {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                other => other,
            },
        };
        if let Err(e) = restored {
            warn!(path = %prior.target.display(), error = %e, "Failed to restore file");
        }
        if let Some(dir) = &prior.created_dir {
            if let Err(e) = std::fs::remove_dir_all(dir) {
                debug!(path = %dir.display(), error = %e, "Created directory not removed");
            }
        }
    }
}
