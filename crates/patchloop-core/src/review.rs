use patchloop_logging::{Flow, LogEvent};
use patchloop_review::{ReviewEvaluator, ReviewInput};
use tracing::warn;

use crate::error::PipelineError;
use crate::outcome::RunOutcome;
use crate::pipeline::PipelineContext;

/// Reviews a change request against its task and posts the verdict
pub struct ReviewRunner<'a> {
    ctx: PipelineContext<'a>,
}

impl<'a> ReviewRunner<'a> {
    pub fn new(ctx: PipelineContext<'a>) -> Self {
        Self { ctx }
    }

    pub async fn review(&self, change_url: &str, task_url: &str) -> Result<RunOutcome, PipelineError> {
        let started = self.ctx.begin(Flow::Review, change_url);
        let result = self.run_review(change_url, task_url).await;
        self.ctx.finish(Flow::Review, started, &result);
        result
    }

    async fn run_review(&self, change_url: &str, task_url: &str) -> Result<RunOutcome, PipelineError> {
        let task = self.ctx.load_task(task_url).await?;
        let diff = self.ctx.changes.get_diff(change_url).await.unwrap_or_else(|e| {
            warn!(error = %e, change = change_url, "Failed to fetch change request diff");
            String::new()
        });

        let task_text = task.text();
        let verdict = ReviewEvaluator::new(self.ctx.generator)
            .evaluate(ReviewInput {
                task: &task_text,
                diff: &diff,
            })
            .await;

        self.ctx
            .tasks
            .post_comment(change_url, &verdict.to_comment())
            .await
            .map_err(PipelineError::store("post review comment"))?;
        self.ctx.logger.log(&LogEvent::ReviewCompleted {
            change_url: change_url.to_string(),
            verdict: verdict.short_description(),
        });

        Ok(RunOutcome::Reviewed {
            change_url: change_url.to_string(),
            decision: verdict.decision,
        })
    }
}
