use serde::Serialize;

/// Verbs that mark a task as actionable (case-insensitive substring match)
pub const ACTION_KEYWORDS: &[&str] = &[
    "create",
    "add",
    "implement",
    "fix",
    "update",
    "refactor",
    "change",
    "delete",
    "remove",
];

pub const DEFAULT_MIN_LENGTH: usize = 10;

/// Outcome of validating a task description
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Validation {
    pub accepted: bool,
    /// Every failed check, or "ok"
    pub reason: String,
}

/// Heuristic gate that rejects under-specified tasks before generation
#[derive(Debug, Clone)]
pub struct TaskValidator {
    min_length: usize,
}

impl Default for TaskValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_LENGTH)
    }
}

impl TaskValidator {
    pub fn new(min_length: usize) -> Self {
        Self { min_length }
    }

    pub fn validate(&self, task_text: &str) -> Validation {
        let body = strip_label(task_text);
        let mut failures = Vec::new();

        let length = body.chars().count();
        if length < self.min_length {
            failures.push(format!(
                "the description is too short ({} characters, at least {} required)",
                length, self.min_length
            ));
        }

        let lowered = body.to_lowercase();
        if !ACTION_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            failures.push(format!(
                "the description contains no actionable keyword (expected one of: {})",
                ACTION_KEYWORDS.join(", ")
            ));
        }

        if failures.is_empty() {
            Validation {
                accepted: true,
                reason: "ok".to_string(),
            }
        } else {
            Validation {
                accepted: false,
                reason: failures.join("; "),
            }
        }
    }
}

/// Drop a leading `Description:` label, case-insensitively
fn strip_label(text: &str) -> &str {
    const LABEL: &str = "description:";
    let trimmed = text.trim_start();
    match trimmed.get(..LABEL.len()) {
        Some(head) if head.eq_ignore_ascii_case(LABEL) => trimmed[LABEL.len()..].trim(),
        _ => trimmed.trim_end(),
    }
}
