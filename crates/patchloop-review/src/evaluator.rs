use patchloop_llm::Generator;
use tracing::{debug, info};

use crate::{ReviewPrompts, ReviewVerdict};

/// Inputs required for one review pass
#[derive(Clone, Copy)]
pub struct ReviewInput<'a> {
    /// Rendered task text (title, description, comments)
    pub task: &'a str,
    /// Per-file patches of the change request
    pub diff: &'a str,
}

/// Evaluator that asks the generative backend for a verdict
pub struct ReviewEvaluator<'a> {
    generator: &'a dyn Generator,
}

impl<'a> ReviewEvaluator<'a> {
    pub fn new(generator: &'a dyn Generator) -> Self {
        Self { generator }
    }

    /// Run one review pass. Never fails: backend failures produce an empty
    /// response, which parses as a rejection.
    pub async fn evaluate(&self, input: ReviewInput<'_>) -> ReviewVerdict {
        let prompt = ReviewPrompts::build_review_prompt(input.task, input.diff);

        debug!(
            prompt_len = prompt.len(),
            diff_len = input.diff.len(),
            backend = self.generator.name(),
            "Running review evaluation"
        );

        let response = self
            .generator
            .generate(ReviewPrompts::system_prompt(), &prompt)
            .await;
        let verdict = ReviewVerdict::parse(&response);

        info!(
            verdict = %verdict.short_description(),
            response_len = response.len(),
            "Review completed"
        );

        verdict
    }
}
