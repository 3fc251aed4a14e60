use patchloop_review::Decision;
use serde::Serialize;

/// Terminal state of one pipeline invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// A change request was opened or updated
    Published {
        change_url: String,
        branch: String,
        files: Vec<String>,
    },
    /// The task failed validation; a comment explains why
    Rejected { reason: String },
    /// Generation produced no edits; nothing was pushed
    NoChanges,
    /// Changes were committed locally but could not be submitted
    PublishFailed { branch: String, error: String },
    /// The fix loop hit its iteration limit
    BudgetExhausted {
        rejections: usize,
        max_iterations: usize,
    },
    /// A review verdict was posted
    Reviewed {
        change_url: String,
        decision: Decision,
    },
}

impl RunOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            Self::Published { .. } => "published",
            Self::Rejected { .. } => "rejected",
            Self::NoChanges => "no_changes",
            Self::PublishFailed { .. } => "publish_failed",
            Self::BudgetExhausted { .. } => "budget_exhausted",
            Self::Reviewed { .. } => "reviewed",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Published { .. } | Self::Reviewed { .. } | Self::NoChanges | Self::Rejected { .. } => 0,
            Self::BudgetExhausted { .. } => 1,
            Self::PublishFailed { .. } => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(RunOutcome::NoChanges.exit_code(), 0);
        assert_eq!(
            RunOutcome::Rejected {
                reason: "too short".into()
            }
            .exit_code(),
            0
        );
        assert_eq!(
            RunOutcome::BudgetExhausted {
                rejections: 3,
                max_iterations: 3
            }
            .exit_code(),
            1
        );
        assert_eq!(
            RunOutcome::PublishFailed {
                branch: "b".into(),
                error: "403".into()
            }
            .exit_code(),
            3
        );
    }

    #[test]
    fn test_serialized_status_tag() {
        let outcome = RunOutcome::Reviewed {
            change_url: "https://github.com/o/r/pull/2".into(),
            decision: Decision::RequestChanges,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "reviewed");
        assert_eq!(json["decision"], "request_changes");
        assert_eq!(json["status"], outcome.status());
    }
}
