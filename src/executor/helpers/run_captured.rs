use super::command::CommandBuilder;
use crate::executor::EXECUTOR_TARGET;
use crate::prelude::*;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use std::process::{ExitStatus, Output};
use std::time::{Duration, Instant};

/// Time left to a timed-out process group between SIGTERM and SIGKILL, and again to be
/// reaped after SIGKILL.
const TERMINATION_GRACE: Duration = Duration::from_secs(2);

/// Output of a subprocess that ran to completion.
#[derive(Debug)]
pub struct CapturedRun {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    /// Wall-clock time from spawn to exit
    pub elapsed: Duration,
}

impl CapturedRun {
    /// Describe a non-zero exit, with the last line of stderr (or stdout) as a hint.
    pub fn failure_reason(&self) -> String {
        let hint = last_line(&self.stderr).or_else(|| last_line(&self.stdout));
        match hint {
            Some(hint) => format!("exited with {}: {hint}", self.status),
            None => format!("exited with {}", self.status),
        }
    }
}

fn last_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).rfind(|line| !line.is_empty())
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("failed to launch `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to collect the output of `{command}`: {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("timed out after {timeout:?}")]
    TimedOut { timeout: Duration },
}

/// Run a command to completion, capturing its output.
///
/// The child leads its own process group. With a `timeout`, the whole group is terminated
/// once it expires, and reaped before this returns. Output is logged line by line at trace
/// level under the executor target.
pub async fn run_captured(
    cmd: CommandBuilder,
    timeout: Option<Duration>,
) -> std::result::Result<CapturedRun, RunError> {
    let command = cmd.as_command_line();
    debug!("Running: {command}");

    let start = Instant::now();
    let child = cmd.build().spawn().map_err(|source| RunError::Launch {
        command: command.clone(),
        source,
    })?;

    let pgid = child.id().map(|pid| Pid::from_raw(pid as i32));
    let output = child.wait_with_output();
    tokio::pin!(output);
    let output = match timeout {
        Some(timeout) => {
            let timed = tokio::time::timeout(timeout, &mut output).await;
            let Ok(result) = timed else {
                debug!("`{command}` timed out after {timeout:?}, terminating it");
                if let Some(pgid) = pgid {
                    terminate_group(pgid, &mut output).await;
                }
                return Err(RunError::TimedOut { timeout });
            };
            result
        }
        None => output.await,
    }
    .map_err(|source| RunError::Wait {
        command: command.clone(),
        source,
    })?;
    let elapsed = start.elapsed();

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    for line in stdout.lines() {
        trace!(target: EXECUTOR_TARGET, "{line}");
    }
    for line in stderr.lines() {
        trace!(target: EXECUTOR_TARGET, "[stderr]{line}");
    }
    debug!("`{command}` {} in {elapsed:?}", output.status);

    Ok(CapturedRun {
        status: output.status,
        stdout,
        stderr,
        elapsed,
    })
}

fn signal_group(pgid: Pid, signal: Signal) {
    if let Err(err) = killpg(pgid, signal) {
        debug!("Could not send {signal} to process group {pgid}: {err}");
    }
}

/// Stop every process of the group led by a timed-out child, then reap the child.
///
/// SIGTERM goes first since `sudo` relays it to the command it elevated, which SIGKILL
/// would leave running.
async fn terminate_group<F>(pgid: Pid, output: &mut std::pin::Pin<&mut F>)
where
    F: Future<Output = std::io::Result<Output>>,
{
    signal_group(pgid, Signal::SIGTERM);
    if tokio::time::timeout(TERMINATION_GRACE, output.as_mut())
        .await
        .is_ok()
    {
        return;
    }
    signal_group(pgid, Signal::SIGKILL);
    if tokio::time::timeout(TERMINATION_GRACE, output.as_mut())
        .await
        .is_err()
    {
        warn!("Process group {pgid} survived SIGKILL, abandoning it");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell(script: &str) -> CommandBuilder {
        let mut cmd = CommandBuilder::new("sh");
        cmd.args(["-c", script]);
        cmd
    }

    #[tokio::test]
    async fn test_captures_both_streams() {
        let run = run_captured(shell("echo out; echo err >&2"), None)
            .await
            .unwrap();
        assert!(run.status.success());
        assert_eq!(run.stdout, "out\n");
        assert_eq!(run.stderr, "err\n");
    }

    #[tokio::test]
    async fn test_failure_reason() {
        let run = run_captured(shell("echo 'bad ring dimension' >&2; exit 3"), None)
            .await
            .unwrap();
        assert!(!run.status.success());
        let reason = run.failure_reason();
        assert!(reason.contains("exit status: 3"), "{reason}");
        assert!(reason.ends_with("bad ring dimension"), "{reason}");
    }

    #[tokio::test]
    async fn test_timeout_kills_the_child() {
        let start = Instant::now();
        let err = run_captured(shell("sleep 5"), Some(Duration::from_millis(100)))
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::TimedOut { .. }));
        assert_eq!(err.to_string(), "timed out after 100ms");
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_timeout_stops_the_wrapped_process() {
        let dir = tempfile::TempDir::new().unwrap();
        let marker = dir.path().join("marker");
        // The wrapper forks the real work and does not relay SIGKILL to it
        let script = format!("sh -c 'sleep 1; touch {}'; true", marker.display());

        let err = run_captured(shell(&script), Some(Duration::from_millis(200)))
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::TimedOut { .. }));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists(), "the wrapped process outlived the timeout");
    }

    #[tokio::test]
    async fn test_timeout_waits_for_a_graceful_exit() {
        let dir = tempfile::TempDir::new().unwrap();
        let marker = dir.path().join("terminated");
        let script = format!(
            "trap 'touch {}; exit 143' TERM; sleep 5 & wait",
            marker.display()
        );

        let err = run_captured(shell(&script), Some(Duration::from_millis(200)))
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::TimedOut { .. }));
        // The handler ran before run_captured returned
        assert!(marker.exists());
    }

    #[tokio::test]
    async fn test_child_leads_its_own_process_group() {
        // Field 5 of /proc/<pid>/stat is the process group
        let run = run_captured(shell("echo $$; cut -d' ' -f5 /proc/$$/stat"), None)
            .await
            .unwrap();
        let ids: Vec<i32> = run
            .stdout
            .lines()
            .map(|line| line.trim().parse().unwrap())
            .collect();
        assert_eq!(ids[0], ids[1]);
        // A terminal interrupt sent to the engine's foreground group misses the child
        assert_ne!(ids[1], nix::unistd::getpgrp().as_raw());
    }

    #[tokio::test]
    async fn test_launch_error() {
        let err = run_captured(CommandBuilder::new("/nonexistent/subject"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Launch { .. }));
    }
}
