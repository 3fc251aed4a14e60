//! # patchloop-github
//!
//! GitHub as the task tracker and change-request host.
//!
//! [`GitHubClient`] wraps the REST API; [`GitHubProvider`] combines it with a
//! local [`patchloop_git::WorkTree`] to implement the core's
//! [`patchloop_core::TaskStore`] and [`patchloop_core::ChangeRequestStore`].

mod client;
mod error;
mod provider;
pub mod url;

pub use client::{
    GitHubClient, GitRef, Issue, IssueComment, PullFile, PullRequest, ReviewComment, User,
    DEFAULT_API_BASE,
};
pub use error::GitHubError;
pub use provider::GitHubProvider;
pub use url::{parse_item_url, parse_remote_url, ItemRef};
