use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

use crate::{GeneratorError, ProcessOutput};

/// Utility for running CLI backends to completion
pub struct ProcessSpawner;

impl ProcessSpawner {
    /// Spawn a process, wait for it and capture its output.
    ///
    /// The child is killed if `timeout` elapses first.
    pub async fn spawn(
        binary: &Path,
        args: &[&str],
        working_dir: &Path,
        env_vars: &HashMap<String, String>,
        timeout: Option<Duration>,
    ) -> Result<ProcessOutput, GeneratorError> {
        let start = Instant::now();

        debug!(
            binary = %binary.display(),
            arg_count = args.len(),
            working_dir = %working_dir.display(),
            "Spawning backend process"
        );

        let mut cmd = Command::new(binary);
        cmd.args(args)
            .current_dir(working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        for (key, value) in env_vars {
            cmd.env(key, value);
        }

        let child = cmd.spawn()?;

        let output = match timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| GeneratorError::Timeout(limit))??,
            None => child.wait_with_output().await?,
        };

        let duration = start.elapsed();
        let exit_code = output.status.code().unwrap_or(-1);

        debug!(
            exit_code,
            duration_ms = duration.as_millis(),
            "Backend process completed"
        );

        Ok(ProcessOutput::new(
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code,
            duration,
        ))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_captures_stdout_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let output = ProcessSpawner::spawn(
            Path::new("sh"),
            &["-c", "echo hello; echo oops 1>&2; exit 3"],
            dir.path(),
            &HashMap::new(),
            None,
        )
        .await
        .unwrap();

        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.stderr.trim(), "oops");
        assert_eq!(output.exit_code, 3);
    }

    #[tokio::test]
    async fn test_spawn_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let result = ProcessSpawner::spawn(
            Path::new("sh"),
            &["-c", "sleep 5"],
            dir.path(),
            &HashMap::new(),
            Some(Duration::from_millis(100)),
        )
        .await;

        assert!(matches!(result, Err(GeneratorError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_spawn_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let result = ProcessSpawner::spawn(
            Path::new("definitely-not-a-real-binary-xyz"),
            &[],
            dir.path(),
            &HashMap::new(),
            None,
        )
        .await;

        assert!(matches!(result, Err(GeneratorError::SpawnFailed(_))));
    }
}
