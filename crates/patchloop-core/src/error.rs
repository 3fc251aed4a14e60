use thiserror::Error;

use crate::ports::StoreError;

/// Failures that make a run meaningless. Expected terminal states (rejected
/// task, no changes, failed publish, exhausted budget) are outcomes, not errors.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to {action}: {source}")]
    Store {
        action: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("Failed to apply {} edit(s): {}", .0.len(), .0.join("; "))]
    EditsFailed(Vec<String>),
}

impl PipelineError {
    pub(crate) fn store(action: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| PipelineError::Store { action, source }
    }
}
