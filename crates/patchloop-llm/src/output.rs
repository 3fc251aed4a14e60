use std::time::Duration;

/// Output captured from a CLI backend run
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code from the process (-1 when killed by a signal)
    pub exit_code: i32,
    pub duration: Duration,
}

impl ProcessOutput {
    pub fn new(stdout: String, stderr: String, exit_code: i32, duration: Duration) -> Self {
        Self {
            stdout,
            stderr,
            exit_code,
            duration,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Short description of a failed run, preferring stderr
    pub fn failure_summary(&self) -> String {
        let detail = if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        };
        let detail: String = detail.chars().take(500).collect();
        format!("exit code {}: {}", self.exit_code, detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_summary_prefers_stderr() {
        let output = ProcessOutput::new(
            "partial".to_string(),
            "boom".to_string(),
            2,
            Duration::from_secs(1),
        );
        assert!(!output.success());
        assert_eq!(output.failure_summary(), "exit code 2: boom");
    }

    #[test]
    fn test_failure_summary_falls_back_to_stdout() {
        let output = ProcessOutput::new("oops".to_string(), "  ".to_string(), 1, Duration::ZERO);
        assert_eq!(output.failure_summary(), "exit code 1: oops");
    }
}
