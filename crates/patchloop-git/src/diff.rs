use git2::{DiffOptions, Repository, Status, StatusOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::GitError;

const MODIFIED: Status = Status::WT_MODIFIED
    .union(Status::INDEX_MODIFIED)
    .union(Status::WT_RENAMED)
    .union(Status::INDEX_RENAMED)
    .union(Status::WT_TYPECHANGE)
    .union(Status::INDEX_TYPECHANGE);

/// Uncommitted paths relative to the repository root
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitStatus {
    pub modified: Vec<String>,
    /// Staged new files
    pub added: Vec<String>,
    pub deleted: Vec<String>,
    pub untracked: Vec<String>,
}

impl GitStatus {
    pub fn is_clean(&self) -> bool {
        self.total_changes() == 0
    }

    pub fn total_changes(&self) -> usize {
        [&self.modified, &self.added, &self.deleted, &self.untracked]
            .iter()
            .map(|paths| paths.len())
            .sum()
    }
}

/// Size of the uncommitted change set, for logging
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiffSummary {
    pub files_changed: usize,
    pub insertions: usize,
    pub deletions: usize,
}

/// Inspects uncommitted changes in a working tree
pub struct DiffCapture {
    include_untracked: bool,
}

impl Default for DiffCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl DiffCapture {
    pub fn new() -> Self {
        Self {
            include_untracked: true,
        }
    }

    pub fn with_untracked(mut self, include: bool) -> Self {
        self.include_untracked = include;
        self
    }

    /// Paths with uncommitted changes, each in exactly one bucket.
    /// Renames and type changes count as modifications.
    pub fn capture_status(&self, working_dir: &Path) -> Result<GitStatus, GitError> {
        let repo = Repository::discover(working_dir)?;

        let mut opts = StatusOptions::new();
        opts.include_untracked(self.include_untracked)
            .recurse_untracked_dirs(true)
            .include_ignored(false);

        let mut status = GitStatus::default();
        for entry in repo.statuses(Some(&mut opts))?.iter() {
            let Some(path) = entry.path().map(str::to_string) else {
                continue;
            };
            let flags = entry.status();
            let bucket = if flags.intersects(Status::WT_DELETED | Status::INDEX_DELETED) {
                &mut status.deleted
            } else if flags.contains(Status::INDEX_NEW) {
                &mut status.added
            } else if flags.contains(Status::WT_NEW) {
                &mut status.untracked
            } else if flags.intersects(MODIFIED) {
                &mut status.modified
            } else {
                continue;
            };
            bucket.push(path);
        }

        debug!(changes = status.total_changes(), "Captured git status");
        Ok(status)
    }

    /// Line statistics of the working tree against HEAD, untracked files
    /// included when configured
    pub fn capture_summary(&self, working_dir: &Path) -> Result<DiffSummary, GitError> {
        let repo = Repository::discover(working_dir)?;

        let head_tree = match repo.head() {
            Ok(head) => Some(head.peel_to_tree()?),
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => None,
            Err(e) => return Err(GitError::GitOperationFailed(e)),
        };

        let mut opts = DiffOptions::new();
        opts.include_untracked(self.include_untracked)
            .recurse_untracked_dirs(true)
            .show_untracked_content(self.include_untracked);
        let diff = repo.diff_tree_to_workdir_with_index(head_tree.as_ref(), Some(&mut opts))?;

        let stats = diff.stats()?;

        Ok(DiffSummary {
            files_changed: stats.files_changed(),
            insertions: stats.insertions(),
            deletions: stats.deletions(),
        })
    }
}
