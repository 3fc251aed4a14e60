use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use crate::{BackendKind, Generator, GeneratorError, LlmConfig, ProcessSpawner};

/// Claude Code CLI used as a plain text generator (`claude --print`)
pub struct ClaudeCodeGenerator {
    binary_path: PathBuf,
    model: Option<String>,
    working_dir: PathBuf,
    timeout: Option<Duration>,
}

impl ClaudeCodeGenerator {
    pub fn new(working_dir: PathBuf) -> Self {
        Self {
            binary_path: PathBuf::from("claude"),
            model: None,
            working_dir,
            timeout: None,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            binary_path: config
                .binary_path
                .clone()
                .unwrap_or_else(|| PathBuf::from("claude")),
            model: non_default_model(config),
            working_dir: config.working_dir.clone(),
            timeout: config.timeout,
        }
    }

    pub fn with_binary_path(mut self, path: PathBuf) -> Self {
        self.binary_path = path;
        self
    }
}

/// CLI backends choose their own model unless one was set explicitly
pub(crate) fn non_default_model(config: &LlmConfig) -> Option<String> {
    if config.model.is_empty() || config.model == crate::traits::DEFAULT_MODEL {
        None
    } else {
        Some(config.model.clone())
    }
}

#[async_trait]
impl Generator for ClaudeCodeGenerator {
    fn name(&self) -> &str {
        "Claude Code"
    }

    fn backend(&self) -> BackendKind {
        BackendKind::ClaudeCode
    }

    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, GeneratorError> {
        let prompt = format!("{}\n\n{}", system_prompt, user_prompt);
        debug!(
            backend = self.name(),
            prompt_len = prompt.len(),
            "Requesting completion"
        );

        let mut args = vec!["--print"];

        let model_arg;
        if let Some(ref model) = self.model {
            args.push("--model");
            model_arg = model.clone();
            args.push(&model_arg);
        }

        // Everything after -- is the prompt, even if it starts with '-'
        args.push("--");
        args.push(&prompt);

        let output = ProcessSpawner::spawn(
            &self.binary_path,
            &args,
            &self.working_dir,
            &HashMap::new(),
            self.timeout,
        )
        .await?;

        if !output.success() {
            return Err(GeneratorError::ExecutionFailed(output.failure_summary()));
        }
        Ok(output.stdout)
    }
}
