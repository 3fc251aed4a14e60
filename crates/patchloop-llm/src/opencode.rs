use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use crate::claude::non_default_model;
use crate::{BackendKind, Generator, GeneratorError, LlmConfig, ProcessSpawner};

/// OpenCode CLI used as a plain text generator (`opencode run`)
pub struct OpenCodeGenerator {
    binary_path: PathBuf,
    model: Option<String>,
    working_dir: PathBuf,
    timeout: Option<Duration>,
}

impl OpenCodeGenerator {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            binary_path: config
                .binary_path
                .clone()
                .unwrap_or_else(|| PathBuf::from("opencode")),
            model: non_default_model(config),
            working_dir: config.working_dir.clone(),
            timeout: config.timeout,
        }
    }
}

#[async_trait]
impl Generator for OpenCodeGenerator {
    fn name(&self) -> &str {
        "OpenCode"
    }

    fn backend(&self) -> BackendKind {
        BackendKind::OpenCode
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

        let mut args = vec!["run"];

        let model_arg;
        if let Some(ref model) = self.model {
            args.push("--model");
            model_arg = model.clone();
            args.push(&model_arg);
        }

        args.push("--prompt");
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
