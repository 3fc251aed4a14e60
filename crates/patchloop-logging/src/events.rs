use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Which pipeline an invocation runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flow {
    CreateChange,
    ApplyFix,
    Review,
}

impl std::fmt::Display for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Flow::CreateChange => write!(f, "create-change"),
            Flow::ApplyFix => write!(f, "apply-fix"),
            Flow::Review => write!(f, "review"),
        }
    }
}

/// Structured log events for the task-to-change pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    PipelineStarted {
        flow: Flow,
        target: String,
        working_dir: PathBuf,
    },
    TaskValidated {
        accepted: bool,
        reason: String,
    },
    BudgetChecked {
        rejections: usize,
        max_iterations: usize,
        exhausted: bool,
    },
    BranchCheckedOut {
        branch: String,
    },
    ContextGathered {
        strategy: String,
        files: usize,
        chars: usize,
    },
    EditsGenerated {
        paths: Vec<String>,
    },
    NoChanges,
    EditsApplied {
        applied: usize,
        failed: usize,
        files_changed: usize,
        insertions: usize,
        deletions: usize,
    },
    BranchCreated {
        branch: String,
    },
    ChangesCommitted {
        branch: String,
        committed: bool,
    },
    ChangePublished {
        url: String,
    },
    PublishFailed {
        branch: String,
        error: String,
    },
    ReviewCompleted {
        change_url: String,
        verdict: String,
    },
    PipelineFinished {
        flow: Flow,
        status: String,
        duration_secs: f64,
    },
    ErrorEncountered {
        stage: String,
        error: String,
    },
}

impl LogEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors and visual structure
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Logger for pipeline events - handles both console output and file logging
pub struct Logger {
    format: LogFormat,
    file_writer: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            file_writer: None,
        }
    }

    /// Create a logger that also appends JSON lines to `log_path`
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            file_writer: Some(Mutex::new(file)),
        })
    }

    pub fn log(&self, event: &LogEvent) {
        // File output is always JSON
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let json = event.with_timestamp();
                let _ = writeln!(file, "{}", json);
            }
        }

        let line = match self.format {
            LogFormat::Json => serde_json::to_string(event).ok(),
            LogFormat::Pretty => Self::render_pretty(event),
            LogFormat::Compact => Some(Self::render_compact(event)),
        };
        if let Some(line) = line {
            let _ = writeln!(std::io::stderr(), "{}", line);
        }
    }

    fn render_pretty(event: &LogEvent) -> Option<String> {
        let text = match event {
            LogEvent::PipelineStarted {
                flow,
                target,
                working_dir,
            } => {
                let rule = "─".repeat(69).bright_blue();
                format!(
                    "\n{}\n  {} {}\n  {} {}\n  {} {}\n{}\n",
                    rule,
                    "patchloop".bold().bright_white(),
                    flow.to_string().bright_cyan().bold(),
                    "Target:".dimmed(),
                    truncate(target, 60).dimmed(),
                    "Dir:".dimmed(),
                    truncate(&working_dir.display().to_string(), 63).dimmed(),
                    rule
                )
            }
            LogEvent::TaskValidated { accepted, reason } => {
                if *accepted {
                    format!("  {} Task accepted", "✓".bright_green())
                } else {
                    format!(
                        "  {} Task rejected: {}",
                        "✗".bright_red(),
                        reason.bright_red()
                    )
                }
            }
            LogEvent::BudgetChecked {
                rejections,
                max_iterations,
                exhausted,
            } => {
                let text = format!("Budget: {}/{} review rejections", rejections, max_iterations);
                if *exhausted {
                    format!("  {} {}", "⚠".bright_yellow(), text.bright_yellow())
                } else {
                    format!("  {} {}", "•".dimmed(), text)
                }
            }
            LogEvent::BranchCheckedOut { branch } => {
                format!("  {} Checked out {}", "⎇".bright_cyan(), branch.bold())
            }
            LogEvent::ContextGathered {
                strategy,
                files,
                chars,
            } => format!(
                "  {} Context: {} {} ({}, {} chars)",
                "▶".bright_cyan(),
                files,
                if *files == 1 { "file" } else { "files" },
                strategy,
                chars
            ),
            LogEvent::EditsGenerated { paths } => {
                let mut text = format!(
                    "  {} Generated {} {}",
                    "▶".bright_magenta(),
                    paths.len(),
                    if paths.len() == 1 { "edit" } else { "edits" }
                );
                for path in paths {
                    text.push_str(&format!("\n    {} {}", "│".dimmed(), path));
                }
                text
            }
            LogEvent::NoChanges => format!(
                "  {} {}",
                "•".dimmed(),
                "No changes generated, nothing to publish".dimmed()
            ),
            LogEvent::EditsApplied {
                applied,
                failed,
                files_changed,
                insertions,
                deletions,
            } => {
                let mut text = format!(
                    "  {} Applied {} ({} {}, {}, {})",
                    if *failed == 0 {
                        "✓".bright_green()
                    } else {
                        "✗".bright_red()
                    },
                    applied,
                    files_changed,
                    if *files_changed == 1 { "file" } else { "files" },
                    format!("+{}", insertions).green(),
                    format!("-{}", deletions).red(),
                );
                if *failed > 0 {
                    text.push_str(&format!(", {}", format!("{} failed", failed).bright_red()));
                }
                text
            }
            LogEvent::BranchCreated { branch } => {
                format!("  {} Branch {}", "⎇".bright_cyan(), branch.bold())
            }
            LogEvent::ChangesCommitted { branch, committed } => {
                if *committed {
                    format!("  {} Committed on {}", "✓".bright_green(), branch)
                } else {
                    format!("  {} {}", "•".dimmed(), "Nothing to commit".dimmed())
                }
            }
            LogEvent::ChangePublished { url } => {
                format!("  {} Published {}", "✓".bright_green(), url.underline())
            }
            LogEvent::PublishFailed { branch, error } => format!(
                "  {} Publishing {} failed: {}",
                "✗".bright_red(),
                branch,
                error.bright_red()
            ),
            LogEvent::ReviewCompleted { verdict, .. } => {
                let styled = if verdict.starts_with("[APPROVE]") {
                    format!("✓ Verdict: {}", verdict).bright_green().to_string()
                } else {
                    format!("→ Verdict: {}", verdict).bright_yellow().to_string()
                };
                format!("  {}", styled)
            }
            // The final outcome is printed by the binary
            LogEvent::PipelineFinished { .. } => return None,
            LogEvent::ErrorEncountered { stage, error } => format!(
                "\n{} Error during {}: {}",
                "✗".bright_red(),
                stage,
                error.bright_red()
            ),
        };
        Some(text)
    }

    fn render_compact(event: &LogEvent) -> String {
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let body = match event {
            LogEvent::PipelineStarted { flow, target, .. } => format!("{}:start {}", flow, target),
            LogEvent::TaskValidated { accepted, reason } => {
                if *accepted {
                    "validate:ok".to_string()
                } else {
                    format!("validate:rejected {}", reason)
                }
            }
            LogEvent::BudgetChecked {
                rejections,
                max_iterations,
                exhausted,
            } => format!(
                "budget:{}/{}{}",
                rejections,
                max_iterations,
                if *exhausted { " exhausted" } else { "" }
            ),
            LogEvent::BranchCheckedOut { branch } => format!("checkout:{}", branch),
            LogEvent::ContextGathered {
                strategy, files, ..
            } => format!("context:{} {}f", strategy, files),
            LogEvent::EditsGenerated { paths } => format!("generate:{}", paths.len()),
            LogEvent::NoChanges => "generate:none".to_string(),
            LogEvent::EditsApplied {
                applied,
                failed,
                insertions,
                deletions,
                ..
            } => format!("apply:{} failed={} +{} -{}", applied, failed, insertions, deletions),
            LogEvent::BranchCreated { branch } => format!("branch:{}", branch),
            LogEvent::ChangesCommitted { branch, committed } => {
                format!("commit:{} {}", branch, committed)
            }
            LogEvent::ChangePublished { url } => format!("publish:ok {}", url),
            LogEvent::PublishFailed { branch, error } => {
                format!("publish:failed {} {}", branch, error)
            }
            LogEvent::ReviewCompleted { verdict, .. } => format!("review:{}", verdict),
            LogEvent::PipelineFinished {
                flow,
                status,
                duration_secs,
            } => format!("{}:done {} {:.1}s", flow, status, duration_secs),
            LogEvent::ErrorEncountered { stage, error } => format!("error:{}:{}", stage, error),
        };
        format!("[{}] {}", timestamp, body)
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        s.to_string()
    }
}
