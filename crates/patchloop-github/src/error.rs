use patchloop_core::StoreError;
use patchloop_git::GitError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GitHubError {
    #[error("Invalid GitHub address: {0}")]
    InvalidUrl(String),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// 401 or 403
    #[error("GitHub denied access ({status}): {message}")]
    PermissionDenied { status: u16, message: String },

    #[error("GitHub resource not found: {0}")]
    NotFound(String),

    #[error("GitHub API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error(transparent)]
    Git(#[from] GitError),
}

impl From<GitHubError> for StoreError {
    fn from(err: GitHubError) -> Self {
        match err {
            GitHubError::InvalidUrl(url) => StoreError::InvalidAddress(url),
            GitHubError::PermissionDenied { .. } => StoreError::PermissionDenied(err.to_string()),
            GitHubError::NotFound(what) => StoreError::NotFound(what),
            GitHubError::Git(GitError::PushRejected(stderr)) => StoreError::Conflict(stderr),
            GitHubError::Git(git) => StoreError::Git(git),
            GitHubError::Http(_) | GitHubError::Api { .. } => StoreError::Request(err.to_string()),
        }
    }
}
