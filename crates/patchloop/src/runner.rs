//! Wiring of settings, backend and stores into one flow invocation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use patchloop_core::{ChangeLocks, FixLoop, Orchestrator, PipelineContext, ReviewRunner, RunOutcome};
use patchloop_git::WorkTree;
use patchloop_github::{GitHubClient, GitHubProvider};
use patchloop_logging::Logger;

use crate::config::Settings;

/// One pipeline flow and the addresses it acts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowRequest {
    CreateChange { task: String },
    ApplyFix { change: String, task: String },
    Review { change: String, task: String },
}

impl FlowRequest {
    pub fn name(&self) -> &'static str {
        match self {
            FlowRequest::CreateChange { .. } => "create-change",
            FlowRequest::ApplyFix { .. } => "apply-fix",
            FlowRequest::Review { .. } => "review",
        }
    }
}

/// Runs flows against a working tree with the configured backend
pub struct FlowRunner {
    settings: Arc<Settings>,
    logger: Arc<Logger>,
    locks: ChangeLocks,
}

impl FlowRunner {
    pub fn new(settings: Arc<Settings>, logger: Arc<Logger>) -> Self {
        Self {
            settings,
            logger,
            locks: ChangeLocks::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn github_client(&self) -> Result<GitHubClient> {
        let client = GitHubClient::new(self.settings.secrets.github_token.clone())
            .context("Failed to build GitHub client")?;
        Ok(match &self.settings.github.api_base {
            Some(base) => client.with_api_base(base.clone()),
            None => client,
        })
    }

    /// Run `request` on the repository containing `working_dir`
    pub async fn run(&self, working_dir: &Path, request: &FlowRequest) -> Result<RunOutcome> {
        let tree = WorkTree::discover(working_dir)
            .with_context(|| format!("{} is not inside a git repository", working_dir.display()))?;
        self.run_on(tree, request).await
    }

    pub async fn run_on(&self, tree: WorkTree, request: &FlowRequest) -> Result<RunOutcome> {
        let root: PathBuf = tree.root().to_path_buf();
        let config = self.settings.pipeline_config(root.clone());
        let llm = self.settings.llm_config(root)?;
        let generator = patchloop_llm::create_generator(&llm).context("Failed to create backend")?;
        info!(backend = generator.name(), flow = request.name(), "Starting flow");

        let provider = GitHubProvider::new(self.github_client()?, tree);
        let ctx = PipelineContext::new(
            &provider,
            &provider,
            generator.as_ref(),
            &config,
            self.logger.clone(),
        );

        let outcome = match request {
            FlowRequest::CreateChange { task } => Orchestrator::new(ctx).run(task).await,
            FlowRequest::ApplyFix { change, task } => {
                FixLoop::new(ctx, self.locks.clone()).run_fix(change, task).await
            }
            FlowRequest::Review { change, task } => ReviewRunner::new(ctx).review(change, task).await,
        };
        outcome.with_context(|| format!("{} failed", request.name()))
    }
}
