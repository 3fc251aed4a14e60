//! Configuration file and environment support for patchloop.
//!
//! Loads `patchloop.toml` from the working directory, falling back to
//! `<config_dir>/patchloop/config.toml`. Secrets are read from the environment
//! only and never from a file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use patchloop_core::{ContextStrategy, PipelineConfig};
use patchloop_llm::{BackendKind, LlmConfig};

/// The project config file name
pub const CONFIG_FILE_NAME: &str = "patchloop.toml";

/// Directory under the platform config dir holding the global config
pub const GLOBAL_CONFIG_DIR: &str = "patchloop";

/// Global config file name
pub const GLOBAL_CONFIG_FILE: &str = "config.toml";

pub const DEFAULT_BIND: &str = "0.0.0.0:8000";

/// Resolved settings, built once at start-up
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub github: GitHubSection,
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(skip)]
    pub secrets: Secrets,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct GitHubSection {
    /// REST API root, for GitHub Enterprise
    pub api_base: Option<String>,
    pub ready_label: Option<String>,
    pub base_branch: Option<String>,
    pub branch_prefix: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PipelineSection {
    pub max_iterations: Option<usize>,
    pub min_task_length: Option<usize>,
    pub context_strategy: Option<ContextStrategy>,
    pub map_max_depth: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct LlmSection {
    /// openai, yandex-gpt, claude-code or opencode; inferred when absent
    pub backend: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub folder_id: Option<String>,
    pub binary_path: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    pub bind: Option<String>,
}

/// Credentials taken from the environment
#[derive(Default)]
pub struct Secrets {
    pub github_token: Option<String>,
    pub llm_api_key: Option<String>,
    pub webhook_secret: Option<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |s: &Option<String>| s.as_ref().map(|_| "***");
        f.debug_struct("Secrets")
            .field("github_token", &mask(&self.github_token))
            .field("llm_api_key", &mask(&self.llm_api_key))
            .field("webhook_secret", &mask(&self.webhook_secret))
            .finish()
    }
}

impl Settings {
    /// Load settings and apply environment overrides.
    ///
    /// An explicit path must exist. Otherwise the project file wins over the
    /// global one, and defaults apply when neither exists.
    pub fn load(explicit: Option<&Path>, working_dir: &Path) -> Result<Self> {
        let mut settings = match find_config_file(explicit, working_dir)? {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Apply environment overrides, reading variables through `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| lookup(k))
                .find(|v| !v.trim().is_empty())
        };

        self.secrets.github_token = var(&["GITHUB_TOKEN", "GH_TOKEN"]);
        self.secrets.llm_api_key = var(&["LLM_API_KEY", "OPENAI_API_KEY"]);
        self.secrets.webhook_secret = var(&["GITHUB_WEBHOOK_SECRET"]);

        if let Some(url) = var(&["LLM_BASE_URL"]) {
            self.llm.base_url = Some(url);
        }
        if let Some(model) = var(&["LLM_MODEL"]) {
            self.llm.model = Some(model);
        }
        if let Some(backend) = var(&["LLM_BACKEND"]) {
            self.llm.backend = Some(backend);
        }
        if let Some(folder) = var(&["YC_FOLDER_ID"]) {
            self.llm.folder_id = Some(folder);
        }
        if let Some(max) = var(&["PATCHLOOP_MAX_ITERATIONS"]).and_then(|v| v.trim().parse().ok()) {
            self.pipeline.max_iterations = Some(max);
        }
    }

    pub fn pipeline_config(&self, working_dir: PathBuf) -> PipelineConfig {
        let defaults = PipelineConfig::new(working_dir);
        PipelineConfig {
            max_iterations: self.pipeline.max_iterations.unwrap_or(defaults.max_iterations),
            branch_prefix: self
                .github
                .branch_prefix
                .clone()
                .unwrap_or_else(|| defaults.branch_prefix.clone()),
            base_branch: self
                .github
                .base_branch
                .clone()
                .unwrap_or_else(|| defaults.base_branch.clone()),
            ready_label: self
                .github
                .ready_label
                .clone()
                .unwrap_or_else(|| defaults.ready_label.clone()),
            min_task_length: self.pipeline.min_task_length.unwrap_or(defaults.min_task_length),
            context_strategy: self.pipeline.context_strategy.unwrap_or(defaults.context_strategy),
            map_max_depth: self.pipeline.map_max_depth.unwrap_or(defaults.map_max_depth),
            ..defaults
        }
    }

    pub fn llm_config(&self, working_dir: PathBuf) -> Result<LlmConfig> {
        let mut config = LlmConfig::default().with_working_dir(working_dir);
        if let Some(name) = &self.llm.backend {
            let backend: BackendKind = name.parse().map_err(anyhow::Error::msg)?;
            config = config.with_backend(backend);
        }
        if let Some(key) = &self.secrets.llm_api_key {
            config = config.with_api_key(key.clone());
        }
        if let Some(url) = &self.llm.base_url {
            config.base_url = url.clone();
        }
        if let Some(model) = &self.llm.model {
            config = config.with_model(model.clone());
        }
        if let Some(secs) = self.llm.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(temperature) = self.llm.temperature {
            config.temperature = temperature;
        }
        if let Some(max_tokens) = self.llm.max_tokens {
            config.max_tokens = max_tokens;
        }
        config.folder_id = self.llm.folder_id.clone();
        config.binary_path = self.llm.binary_path.clone();
        Ok(config)
    }

    pub fn bind_addr(&self) -> &str {
        self.server.bind.as_deref().unwrap_or(DEFAULT_BIND)
    }
}

fn find_config_file(explicit: Option<&Path>, working_dir: &Path) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        return Ok(Some(path.to_path_buf()));
    }

    let project = working_dir.join(CONFIG_FILE_NAME);
    if project.exists() {
        return Ok(Some(project));
    }

    Ok(dirs::config_dir()
        .map(|dir| dir.join(GLOBAL_CONFIG_DIR).join(GLOBAL_CONFIG_FILE))
        .filter(|path| path.exists()))
}
