use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::{AgentConfig, AgentError, AgentOutput};

/// Utility for spawning agent processes
pub struct ProcessSpawner;

impl ProcessSpawner {
    /// Spawn `binary` with `args`, optionally feeding `input` on stdin, and
    /// collect its output. Honors `config.timeout`; a timed out child is killed.
    pub async fn spawn(
        binary: &Path,
        args: &[&str],
        input: Option<&str>,
        config: &AgentConfig,
    ) -> Result<AgentOutput, AgentError> {
        let start = Instant::now();

        debug!(
            binary = %binary.display(),
            args = ?args,
            stdin_len = input.map(str::len).unwrap_or(0),
            working_dir = %config.working_dir.display(),
            "Spawning agent process"
        );

        let mut cmd = Command::new(binary);
        cmd.args(args)
            .current_dir(&config.working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);

        for (key, value) in &config.env_vars {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn()?;

        // Feed stdin from a separate task so a chatty child can't deadlock us
        let writer = match (input, child.stdin.take()) {
            (Some(input), Some(mut stdin)) => {
                let input = input.to_owned();
                Some(tokio::spawn(async move {
                    if let Err(e) = stdin.write_all(input.as_bytes()).await {
                        warn!(error = %e, "Failed to write prompt to agent stdin");
                    }
                }))
            }
            _ => None,
        };

        let wait = child.wait_with_output();
        let output = match config.timeout {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .map_err(|_| AgentError::Timeout(limit))??,
            None => wait.await?,
        };

        if let Some(writer) = writer {
            let _ = writer.await;
        }

        let duration = start.elapsed();
        let exit_code = output.status.code().unwrap_or(-1);

        debug!(
            exit_code,
            duration_ms = duration.as_millis(),
            stdout_len = output.stdout.len(),
            "Agent process completed"
        );

        Ok(AgentOutput::new(
            String::from_utf8_lossy(&output.stdout).trim_end().to_string(),
            String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
            exit_code,
            duration,
        ))
    }
}
