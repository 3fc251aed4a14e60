use patchloop_logging::{Flow, LogEvent};
use tracing::{info, warn};

use crate::budget::IterationBudget;
use crate::error::PipelineError;
use crate::generator::ChangeGenerator;
use crate::locks::ChangeLocks;
use crate::orchestrator::{change_body, change_title};
use crate::outcome::RunOutcome;
use crate::pipeline::{PipelineContext, PublishRequest};
use crate::prompts::ChangePrompts;

const FIX_COMMIT_MESSAGE: &str = "Address review feedback";

/// Revises an open change request from reviewer feedback, under the
/// iteration budget.
///
/// check budget → checkout → gather → generate → apply → commit → publish
pub struct FixLoop<'a> {
    ctx: PipelineContext<'a>,
    locks: ChangeLocks,
}

impl<'a> FixLoop<'a> {
    pub fn new(ctx: PipelineContext<'a>, locks: ChangeLocks) -> Self {
        Self { ctx, locks }
    }

    pub async fn run_fix(&self, change_url: &str, task_url: &str) -> Result<RunOutcome, PipelineError> {
        let _guard = self.locks.acquire(change_url).await;
        let started = self.ctx.begin(Flow::ApplyFix, change_url);
        let result = self.fix(change_url, task_url).await;
        self.ctx.finish(Flow::ApplyFix, started, &result);
        result
    }

    async fn fix(&self, change_url: &str, task_url: &str) -> Result<RunOutcome, PipelineError> {
        let history = self
            .ctx
            .changes
            .get_comments(change_url)
            .await
            .map_err(PipelineError::store("fetch change request comments"))?;

        let budget = IterationBudget::new(self.ctx.config.max_iterations);
        let status = budget.check(&history);
        self.ctx.logger.log(&LogEvent::BudgetChecked {
            rejections: status.rejections,
            max_iterations: status.max,
            exhausted: status.exhausted,
        });
        if status.exhausted {
            let comment = format!(
                "Automatic fixes stopped: the iteration limit ({}) was reached after {} requested revisions. \
                 This change request requires human intervention.",
                status.max, status.rejections
            );
            if let Err(e) = self.ctx.tasks.post_comment(change_url, &comment).await {
                warn!(error = %e, change = change_url, "Failed to post intervention comment");
            }
            return Ok(RunOutcome::BudgetExhausted {
                rejections: status.rejections,
                max_iterations: status.max,
            });
        }

        let branch = self
            .ctx
            .changes
            .checkout(change_url)
            .await
            .map_err(PipelineError::store("check out change request"))?;
        self.ctx.logger.log(&LogEvent::BranchCheckedOut {
            branch: branch.clone(),
        });

        let task = self.ctx.load_task(task_url).await?;
        let diff = self.ctx.changes.get_diff(change_url).await.unwrap_or_else(|e| {
            warn!(error = %e, change = change_url, "Failed to fetch change request diff");
            String::new()
        });
        let task_text = task.text();
        let context = self.ctx.gather_context(&task_text).await;

        let prompt = ChangePrompts::build_revision_prompt(&context.text, &diff, &task_text, &history);
        let edits = ChangeGenerator::new(self.ctx.generator)
            .generate_edits(ChangePrompts::system_prompt(), &prompt)
            .await;
        if edits.is_empty() {
            info!(change = change_url, "Backend proposed no revisions");
            self.ctx.logger.log(&LogEvent::NoChanges);
            return Ok(RunOutcome::NoChanges);
        }

        let files = self.ctx.apply_edits(&edits)?;
        if !self.ctx.commit(&branch, FIX_COMMIT_MESSAGE).await? {
            return Ok(RunOutcome::NoChanges);
        }

        let title = change_title(&task);
        let body = change_body(&task);
        let outcome = self
            .ctx
            .publish(
                PublishRequest {
                    branch: &branch,
                    title: &title,
                    body: &body,
                    report_to: change_url,
                },
                files,
            )
            .await;
        Ok(outcome)
    }
}
