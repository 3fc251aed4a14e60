//! # patchloop-git
//!
//! Local working-tree operations for the patchloop pipeline.
//!
//! ## Key Types
//!
//! - [`WorkTree`] - branch, checkout, commit, fetch and push on a local clone
//! - [`DiffCapture`] - status and line statistics of uncommitted changes
//! - [`GitStatus`] / [`DiffSummary`] - what changed, for logging and commit checks
//!
//! ## Usage
//!
//! ```rust,ignore
//! use patchloop_git::WorkTree;
//!
//! let tree = WorkTree::discover(Path::new("."))?;
//! tree.create_branch("fix/issue-42-1700000000000")?;
//! if tree.commit_all("Fix: Issue 42")? {
//!     tree.push("fix/issue-42-1700000000000", Some(&token))?;
//! }
//! ```
//!
//! Pushes never force: a non-fast-forward update surfaces as
//! [`GitError::PushRejected`].

mod diff;
mod error;
mod worktree;

pub use diff::{DiffCapture, DiffSummary, GitStatus};
pub use error::GitError;
pub use worktree::{authenticated_url, WorkTree};
