//! Boundary collaborators the pipeline consumes.
//!
//! The hosting platform and the local working tree are reached only through
//! these traits, so the pipeline can run against in-memory fakes.

use async_trait::async_trait;
use thiserror::Error;

use crate::Task;

#[derive(Error, Debug)]
pub enum StoreError {
    /// 401/403 from the hosting platform
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Push refused because the remote branch moved
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Git error: {0}")]
    Git(#[from] patchloop_git::GitError),

    #[error("Request failed: {0}")]
    Request(String),
}

/// Issue tracker
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Title and body of a task; `comments` is left empty
    async fn get(&self, task_url: &str) -> Result<Task, StoreError>;

    async fn get_comments(&self, task_url: &str) -> Result<Vec<String>, StoreError>;

    /// Post on a task or a change request
    async fn post_comment(&self, target_url: &str, body: &str) -> Result<(), StoreError>;

    async fn remove_label(&self, task_url: &str, name: &str) -> Result<(), StoreError>;
}

/// Branches, commits and pull requests
#[async_trait]
pub trait ChangeRequestStore: Send + Sync {
    /// Switch to the up-to-date base branch; new task branches start here
    async fn switch_to_base(&self, base: &str) -> Result<(), StoreError>;

    /// Create a branch at HEAD and switch to it, keeping working-tree changes
    async fn create_branch(&self, name: &str) -> Result<(), StoreError>;

    /// Stage everything and commit; `false` when there was nothing to commit
    async fn commit(&self, message: &str) -> Result<bool, StoreError>;

    /// Push the current branch and open a change request from it.
    /// Returns the address of the already-open request when one exists.
    async fn push_and_open(&self, title: &str, body: &str, base: &str)
        -> Result<String, StoreError>;

    /// Per-file unified patches of a change request
    async fn get_diff(&self, change_url: &str) -> Result<String, StoreError>;

    /// Inline and general comments, concatenated
    async fn get_comments(&self, change_url: &str) -> Result<String, StoreError>;

    /// Switch to the change request's source branch; returns its name
    async fn checkout(&self, change_url: &str) -> Result<String, StoreError>;
}
