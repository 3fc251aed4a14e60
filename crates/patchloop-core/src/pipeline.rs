//! Collaborators and steps shared by the create-change, fix and review flows.

use patchloop_git::DiffCapture;
use patchloop_llm::Generator;
use patchloop_logging::{Flow, LogEvent, Logger};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::apply::EditApplier;
use crate::context::{ContextGatherer, GatheredContext};
use crate::error::PipelineError;
use crate::outcome::RunOutcome;
use crate::ports::{ChangeRequestStore, TaskStore};
use crate::{ChangeRequest, FileEdit, PipelineConfig, Task};

/// Everything a flow needs, borrowed for the duration of one invocation
#[derive(Clone)]
pub struct PipelineContext<'a> {
    pub tasks: &'a dyn TaskStore,
    pub changes: &'a dyn ChangeRequestStore,
    pub generator: &'a dyn Generator,
    pub config: &'a PipelineConfig,
    pub logger: Arc<Logger>,
}

impl<'a> PipelineContext<'a> {
    pub fn new(
        tasks: &'a dyn TaskStore,
        changes: &'a dyn ChangeRequestStore,
        generator: &'a dyn Generator,
        config: &'a PipelineConfig,
        logger: Arc<Logger>,
    ) -> Self {
        Self {
            tasks,
            changes,
            generator,
            config,
            logger,
        }
    }

    pub(crate) fn begin(&self, flow: Flow, target: &str) -> Instant {
        self.logger.log(&LogEvent::PipelineStarted {
            flow,
            target: target.to_string(),
            working_dir: self.config.working_dir.clone(),
        });
        Instant::now()
    }

    pub(crate) fn finish(
        &self,
        flow: Flow,
        started: Instant,
        result: &Result<RunOutcome, PipelineError>,
    ) {
        let status = match result {
            Ok(outcome) => outcome.status().to_string(),
            Err(e) => {
                self.logger.log(&LogEvent::ErrorEncountered {
                    stage: flow.to_string(),
                    error: e.to_string(),
                });
                "error".to_string()
            }
        };
        self.logger.log(&LogEvent::PipelineFinished {
            flow,
            status,
            duration_secs: started.elapsed().as_secs_f64(),
        });
    }

    /// The task with its comments appended
    pub(crate) async fn load_task(&self, task_url: &str) -> Result<Task, PipelineError> {
        let task = self
            .tasks
            .get(task_url)
            .await
            .map_err(PipelineError::store("fetch task"))?;
        let comments = self
            .tasks
            .get_comments(task_url)
            .await
            .map_err(PipelineError::store("fetch task comments"))?;
        Ok(task.with_comments(comments))
    }

    pub(crate) async fn gather_context(&self, task_text: &str) -> GatheredContext {
        let gatherer = ContextGatherer::new(
            self.generator,
            &self.config.working_dir,
            self.config.context_strategy,
            self.config.map_max_depth,
        );
        let context = gatherer.gather(task_text).await;
        self.logger.log(&LogEvent::ContextGathered {
            strategy: context.source.to_string(),
            files: context.files.len(),
            chars: context.text.len(),
        });
        context
    }

    /// Write edits to the working tree; any failed edit aborts the run
    pub(crate) fn apply_edits(&self, edits: &[FileEdit]) -> Result<Vec<String>, PipelineError> {
        self.logger.log(&LogEvent::EditsGenerated {
            paths: edits.iter().map(|e| e.path.clone()).collect(),
        });

        let report = EditApplier::new(&self.config.working_dir).apply(edits);
        let summary = DiffCapture::new()
            .capture_summary(&self.config.working_dir)
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to summarise working tree changes");
                Default::default()
            });
        self.logger.log(&LogEvent::EditsApplied {
            applied: report.applied.len(),
            failed: report.failed.len(),
            files_changed: summary.files_changed,
            insertions: summary.insertions,
            deletions: summary.deletions,
        });

        if !report.is_success() {
            return Err(PipelineError::EditsFailed(report.failure_messages()));
        }
        Ok(report.applied)
    }

    /// Commit everything; `false` when the edits left the tree unchanged
    pub(crate) async fn commit(&self, branch: &str, message: &str) -> Result<bool, PipelineError> {
        let committed = self
            .changes
            .commit(message)
            .await
            .map_err(PipelineError::store("commit changes"))?;
        self.logger.log(&LogEvent::ChangesCommitted {
            branch: branch.to_string(),
            committed,
        });
        if !committed {
            info!(branch, "Edits produced no difference, nothing to publish");
            self.logger.log(&LogEvent::NoChanges);
        }
        Ok(committed)
    }

    /// Push and open (or reuse) the change request. A failure is reported on
    /// `report_to` and becomes [`RunOutcome::PublishFailed`].
    pub(crate) async fn publish(
        &self,
        request: PublishRequest<'_>,
        files: Vec<String>,
    ) -> RunOutcome {
        match self
            .changes
            .push_and_open(request.title, request.body, &self.config.base_branch)
            .await
        {
            Ok(url) => {
                let change = ChangeRequest {
                    branch: request.branch.to_string(),
                    title: request.title.to_string(),
                    body: request.body.to_string(),
                    base: self.config.base_branch.clone(),
                    url,
                };
                info!(url = %change.url, branch = %change.branch, base = %change.base, "Change request published");
                self.logger.log(&LogEvent::ChangePublished {
                    url: change.url.clone(),
                });
                RunOutcome::Published {
                    change_url: change.url,
                    branch: change.branch,
                    files,
                }
            }
            Err(e) => {
                let error = e.to_string();
                self.logger.log(&LogEvent::PublishFailed {
                    branch: request.branch.to_string(),
                    error: error.clone(),
                });
                let comment = publish_failure_comment(request.branch, &error);
                if let Err(post_err) = self.tasks.post_comment(request.report_to, &comment).await {
                    warn!(error = %post_err, target = request.report_to, "Failed to report publish failure");
                }
                RunOutcome::PublishFailed {
                    branch: request.branch.to_string(),
                    error,
                }
            }
        }
    }
}

pub(crate) struct PublishRequest<'a> {
    pub branch: &'a str,
    pub title: &'a str,
    pub body: &'a str,
    /// Where a failure comment goes
    pub report_to: &'a str,
}

fn publish_failure_comment(branch: &str, error: &str) -> String {
    format!(
        "Code was generated and committed on branch `{}`, but submitting the change request failed.\n\n\
         Error:\n```\n{}\n```\n\n\
         Check that the configured token has write access to repository contents and pull requests.",
        branch, error
    )
}
