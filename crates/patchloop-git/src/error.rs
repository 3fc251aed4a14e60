use thiserror::Error;

#[derive(Error, Debug)]
pub enum GitError {
    #[error("Not a git repository: {0}")]
    NotARepo(String),

    #[error("Git operation failed: {0}")]
    GitOperationFailed(#[from] git2::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Branch not found: {0}")]
    BranchNotFound(String),

    #[error("Remote '{0}' is not configured")]
    NoRemote(String),

    /// The remote refused the update (non-fast-forward or protected branch)
    #[error("Push rejected by remote: {0}")]
    PushRejected(String),

    #[error("git {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
}
