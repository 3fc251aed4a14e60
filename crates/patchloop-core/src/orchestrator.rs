use chrono::Utc;
use patchloop_logging::{Flow, LogEvent};
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::generator::ChangeGenerator;
use crate::outcome::RunOutcome;
use crate::pipeline::{PipelineContext, PublishRequest};
use crate::prompts::ChangePrompts;
use crate::validate::TaskValidator;
use crate::Task;

/// Turns a new task into a published change request.
///
/// validate → context → generate → apply → branch → commit → publish
pub struct Orchestrator<'a> {
    ctx: PipelineContext<'a>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(ctx: PipelineContext<'a>) -> Self {
        Self { ctx }
    }

    pub async fn run(&self, task_url: &str) -> Result<RunOutcome, PipelineError> {
        let started = self.ctx.begin(Flow::CreateChange, task_url);
        let result = self.create_change(task_url).await;
        self.ctx.finish(Flow::CreateChange, started, &result);
        result
    }

    async fn create_change(&self, task_url: &str) -> Result<RunOutcome, PipelineError> {
        let config = self.ctx.config;
        let task = self.ctx.load_task(task_url).await?;

        let validation = TaskValidator::new(config.min_task_length).validate(&task.description());
        self.ctx.logger.log(&LogEvent::TaskValidated {
            accepted: validation.accepted,
            reason: validation.reason.clone(),
        });
        if !validation.accepted {
            self.reject(task_url, &validation.reason).await;
            return Ok(RunOutcome::Rejected {
                reason: validation.reason,
            });
        }

        // Context and edits are taken from the base branch, never from an
        // earlier task's branch left checked out in the same tree
        self.ctx
            .changes
            .switch_to_base(&config.base_branch)
            .await
            .map_err(PipelineError::store("switch to base branch"))?;
        self.ctx.logger.log(&LogEvent::BranchCheckedOut {
            branch: config.base_branch.clone(),
        });

        let task_text = task.text();
        let context = self.ctx.gather_context(&task_text).await;
        let prompt = ChangePrompts::build_initial_prompt(&context.text, &task_text);
        let edits = ChangeGenerator::new(self.ctx.generator)
            .generate_edits(ChangePrompts::system_prompt(), &prompt)
            .await;
        if edits.is_empty() {
            info!(task = task_url, "Backend proposed no edits");
            self.ctx.logger.log(&LogEvent::NoChanges);
            return Ok(RunOutcome::NoChanges);
        }

        let files = self.ctx.apply_edits(&edits)?;

        let branch = branch_name(&config.branch_prefix, task.number(), Utc::now().timestamp_millis());
        self.ctx
            .changes
            .create_branch(&branch)
            .await
            .map_err(PipelineError::store("create branch"))?;
        self.ctx.logger.log(&LogEvent::BranchCreated {
            branch: branch.clone(),
        });

        if !self.ctx.commit(&branch, &commit_message(&task)).await? {
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
                    report_to: task_url,
                },
                files,
            )
            .await;
        Ok(outcome)
    }

    async fn reject(&self, task_url: &str, reason: &str) {
        let comment = format!(
            "This task was not picked up automatically: {}.\n\n\
             Please describe the change in more detail and re-apply the `{}` label.",
            reason, self.ctx.config.ready_label
        );
        if let Err(e) = self.ctx.tasks.post_comment(task_url, &comment).await {
            warn!(error = %e, task = task_url, "Failed to post rejection comment");
        }
        if let Err(e) = self
            .ctx
            .tasks
            .remove_label(task_url, &self.ctx.config.ready_label)
            .await
        {
            warn!(error = %e, task = task_url, "Failed to remove ready label");
        }
    }
}

/// `<prefix>issue-<n>-<millis>`, or `<prefix>task-<millis>` without a number
pub fn branch_name(prefix: &str, number: Option<u64>, millis: i64) -> String {
    match number {
        Some(n) => format!("{}issue-{}-{}", prefix, n, millis),
        None => format!("{}task-{}", prefix, millis),
    }
}

fn commit_message(task: &Task) -> String {
    match task.number() {
        Some(n) => format!("Resolve #{}: {}", n, task.title),
        None => format!("Resolve task: {}", task.title),
    }
}

pub(crate) fn change_title(task: &Task) -> String {
    match task.number() {
        Some(n) => format!("Fix #{}: {}", n, task.title),
        None => task.title.clone(),
    }
}

pub(crate) fn change_body(task: &Task) -> String {
    let mut body = String::from("Changes generated automatically from the task description.");
    match task.number() {
        Some(n) => body.push_str(&format!("\n\nCloses #{}", n)),
        None => body.push_str(&format!("\n\nTask: {}", task.url)),
    }
    body
}
