//! Isolated clones for webhook-dispatched flows.

use anyhow::{Context, Result};
use tracing::{debug, info};

use patchloop_core::RunOutcome;
use patchloop_git::WorkTree;

use crate::runner::FlowRunner;
use crate::webhook::Dispatch;

/// Clone the dispatch's repository into a fresh temporary directory, run the
/// flow there, and remove the clone afterwards
pub async fn run_isolated(runner: &FlowRunner, dispatch: &Dispatch) -> Result<RunOutcome> {
    let scratch = tempfile::Builder::new()
        .prefix("patchloop-")
        .tempdir()
        .context("Failed to create scratch directory")?;
    let dest = scratch.path().join("repo");
    let url = dispatch.clone_url.clone();
    let token = runner.settings().secrets.github_token.clone();

    info!(repository = %dispatch.repository, dest = %dest.display(), "Cloning repository");
    let tree = tokio::task::spawn_blocking(move || WorkTree::clone_into(&url, &dest, token.as_deref()))
        .await
        .context("Clone task panicked")?
        .with_context(|| format!("Failed to clone {}", dispatch.repository))?;

    let outcome = runner.run_on(tree, &dispatch.request).await;
    debug!(path = %scratch.path().display(), "Removing isolated clone");
    drop(scratch);
    outcome
}
