use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Errors that can occur while asking a backend for a completion
#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("Failed to spawn backend process: {0}")]
    SpawnFailed(#[from] std::io::Error),

    #[error("Backend timed out after {0:?}")]
    Timeout(Duration),

    #[error("Backend configuration error: {0}")]
    ConfigError(String),

    #[error("Backend execution failed: {0}")]
    ExecutionFailed(String),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected backend response: {0}")]
    InvalidResponse(String),
}

/// Supported generative backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Any OpenAI-compatible chat completions endpoint
    OpenAi,
    YandexGpt,
    ClaudeCode,
    OpenCode,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::OpenAi => write!(f, "openai"),
            BackendKind::YandexGpt => write!(f, "yandex-gpt"),
            BackendKind::ClaudeCode => write!(f, "claude-code"),
            BackendKind::OpenCode => write!(f, "opencode"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" | "open-ai" => Ok(BackendKind::OpenAi),
            "yandex" | "yandex-gpt" | "yandexgpt" => Ok(BackendKind::YandexGpt),
            "claude" | "claude-code" | "claudecode" => Ok(BackendKind::ClaudeCode),
            "opencode" | "open-code" => Ok(BackendKind::OpenCode),
            _ => Err(format!("Unknown backend: {}", s)),
        }
    }
}

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Backend selection and credentials, resolved once at start-up
#[derive(Clone)]
pub struct LlmConfig {
    /// Explicit backend; inferred from the other fields when absent
    pub backend: Option<BackendKind>,
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// YandexGPT folder id
    pub folder_id: Option<String>,
    /// Override for CLI backends (defaults to `claude` / `opencode` on PATH)
    pub binary_path: Option<PathBuf>,
    /// Working directory for CLI backends
    pub working_dir: PathBuf,
    /// Optional upper bound on a single completion (None = no limit)
    pub timeout: Option<Duration>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: None,
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            folder_id: None,
            binary_path: None,
            working_dir: PathBuf::from("."),
            timeout: None,
            temperature: 0.3,
            max_tokens: 8000,
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("backend", &self.resolved_backend())
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("folder_id", &self.folder_id)
            .field("binary_path", &self.binary_path)
            .field("working_dir", &self.working_dir)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl LlmConfig {
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_api_key(mut self, key: String) -> Self {
        self.api_key = Some(key);
        self
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = dir;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The backend to build.
    /// Priority: explicit backend > YandexGPT hints > OpenAI-compatible
    pub fn resolved_backend(&self) -> BackendKind {
        if let Some(backend) = self.backend {
            return backend;
        }
        let yandex_url = self.base_url.contains("api.cloud.yandex");
        let yandex_model = self.model.to_lowercase().contains("yandex");
        if self.folder_id.is_some() || (yandex_url && yandex_model) {
            BackendKind::YandexGpt
        } else {
            BackendKind::OpenAi
        }
    }
}

/// A text generation backend.
///
/// Implementations report failures through [`Generator::complete`]; pipeline
/// code calls [`Generator::generate`], which folds every failure into an empty
/// string so "no usable output" is handled uniformly.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Human-readable name (e.g. "OpenAI", "Claude Code")
    fn name(&self) -> &str;

    fn backend(&self) -> BackendKind;

    /// Ask the backend for a completion
    async fn complete(&self, system_prompt: &str, user_prompt: &str)
        -> Result<String, GeneratorError>;

    /// Like [`Generator::complete`], but never fails: errors are logged and
    /// reported as an empty response.
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> String {
        match self.complete(system_prompt, user_prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!(backend = self.name(), error = %e, "Generation failed, treating as empty output");
                String::new()
            }
        }
    }
}
