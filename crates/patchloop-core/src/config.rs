use serde::Deserialize;
use std::path::PathBuf;

/// How file context is gathered for generation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextStrategy {
    /// Repository map plus backend-selected files, naive scan as fallback
    #[default]
    Smart,
    /// Always read every source file
    Full,
}

impl std::fmt::Display for ContextStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContextStrategy::Smart => write!(f, "smart"),
            ContextStrategy::Full => write!(f, "full"),
        }
    }
}

/// Pipeline policy, resolved once at start-up
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub working_dir: PathBuf,
    /// Review rejections tolerated before the fix loop stops
    pub max_iterations: usize,
    pub branch_prefix: String,
    pub base_branch: String,
    /// Label that triggers the create-change flow; removed on rejection
    pub ready_label: String,
    pub min_task_length: usize,
    pub context_strategy: ContextStrategy,
    pub map_max_depth: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("."),
            max_iterations: 3,
            branch_prefix: "fix/".to_string(),
            base_branch: "main".to_string(),
            ready_label: "ready-to-code".to_string(),
            min_task_length: 10,
            context_strategy: ContextStrategy::Smart,
            map_max_depth: 8,
        }
    }
}

impl PipelineConfig {
    pub fn new(working_dir: PathBuf) -> Self {
        Self {
            working_dir,
            ..Default::default()
        }
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_context_strategy(mut self, strategy: ContextStrategy) -> Self {
        self.context_strategy = strategy;
        self
    }
}
