//! Bounded-time process execution
//!
//! Runs one diagnostic tool and captures what it produced:
//! - Start deadline: a program that cannot be launched in time counts as not started
//! - Completion deadline: a program still running afterwards is terminated
//! - Exit code, stdout and stderr decoded as text
//!
//! No retries happen here, escalation lives in [`crate::bridge`].

use process_control::{ChildExt, Control};
use serde::Serialize;
use std::io;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, SendError};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

pub const FAILED_TO_START: &str = "failed to start";
pub const TIMED_OUT: &str = "timeout";

/// Start and completion deadlines for one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub start: Duration,
    pub total: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            start: Duration::from_millis(500),
            total: Duration::from_millis(2000),
        }
    }
}

impl Timeouts {
    pub fn from_millis(start_ms: u64, total_ms: u64) -> Self {
        Self {
            start: Duration::from_millis(start_ms),
            total: Duration::from_millis(total_ms),
        }
    }
}

/// Outcome of one invocation attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub started: bool,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub invoked_program: String,
    pub invoked_args: Vec<String>,
    pub used_bridge: bool,
    pub execution_time_ms: u128,
}

impl ProbeResult {
    pub fn completed(
        program: &str,
        args: &[String],
        exit_code: i32,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self {
            started: true,
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
            invoked_program: program.to_string(),
            invoked_args: args.to_vec(),
            used_bridge: false,
            execution_time_ms: 0,
        }
    }

    pub fn not_started(program: &str, args: &[String]) -> Self {
        Self {
            started: false,
            ..Self::completed(program, args, -1, "", FAILED_TO_START)
        }
    }

    pub fn timed_out(program: &str, args: &[String]) -> Self {
        Self::completed(program, args, -1, "", TIMED_OUT)
    }

    pub fn with_bridge(mut self, used_bridge: bool) -> Self {
        self.used_bridge = used_bridge;
        self
    }

    fn with_elapsed(mut self, started_at: Instant) -> Self {
        self.execution_time_ms = started_at.elapsed().as_millis();
        self
    }

    /// Started and exited with 0
    pub fn succeeded(&self) -> bool {
        self.started && self.exit_code == 0
    }

    /// Program and arguments joined as they were actually invoked
    pub fn command_line(&self) -> String {
        if self.invoked_args.is_empty() {
            self.invoked_program.clone()
        } else {
            format!("{} {}", self.invoked_program, self.invoked_args.join(" "))
        }
    }

    /// Human-readable diagnostic blob attached to probe nodes
    pub fn details(&self) -> String {
        let stdout = self.stdout.trim();
        let stderr = self.stderr.trim();
        let stdout_block = if stdout.is_empty() {
            "\nStdout: <empty>".to_string()
        } else {
            format!("\nStdout:\n{}", stdout)
        };
        let stderr_block = if stderr.is_empty() {
            "\nStderr: <empty>".to_string()
        } else {
            format!("\nStderr:\n{}", stderr)
        };

        format!(
            "Command: {}\nExit: {}{}{}",
            self.command_line(),
            self.exit_code,
            stdout_block,
            stderr_block
        )
    }

    /// Error list entry for a subsystem that could not be queried
    pub fn unavailable_message(&self, label: &str) -> String {
        let stderr = self.stderr.trim();
        let detail = if !self.started {
            Some(format!("failed to start ({})", self.invoked_program))
        } else if !stderr.is_empty() {
            Some(stderr.to_string())
        } else if self.exit_code == crate::bridge::NOT_FOUND_EXIT {
            Some("command not found".to_string())
        } else {
            None
        };

        match detail {
            Some(detail) => format!("{}: unavailable ({})", label, detail),
            None => format!("{}: unavailable", label),
        }
    }
}

/// Anything able to run a program and report a [`ProbeResult`]
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[String], timeouts: Timeouts) -> ProbeResult;
}

/// Runs real processes on the local system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String], timeouts: Timeouts) -> ProbeResult {
        run_process(program, args, timeouts)
    }
}

#[derive(Debug, Error)]
enum InvokeError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} did not start within {limit:?}")]
    StartTimeout { program: String, limit: Duration },
    #[error("failed to wait for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Run `program` with `args`, bounded by `timeouts`
pub fn run_process(program: &str, args: &[String], timeouts: Timeouts) -> ProbeResult {
    let started_at = Instant::now();
    debug!(
        "Running {} {:?} (start: {:?}, total: {:?})",
        program, args, timeouts.start, timeouts.total
    );

    let child = match spawn_within(program, args, timeouts.start) {
        Ok(child) => child,
        Err(e) => {
            debug!("{}", e);
            return ProbeResult::not_started(program, args).with_elapsed(started_at);
        }
    };

    let output = child
        .controlled_with_output()
        .time_limit(timeouts.total)
        .terminate_for_timeout()
        .wait()
        .map_err(|source| InvokeError::Wait {
            program: program.to_string(),
            source,
        });

    let result = match output {
        Ok(Some(output)) => {
            let exit_code = output
                .status
                .code()
                .and_then(|code| i32::try_from(code).ok())
                .unwrap_or(-1);
            ProbeResult::completed(
                program,
                args,
                exit_code,
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr),
            )
        }
        Ok(None) => {
            debug!("{} timed out after {:?}", program, timeouts.total);
            ProbeResult::timed_out(program, args)
        }
        Err(e) => {
            debug!("{}", e);
            ProbeResult::completed(program, args, -1, "", e.to_string())
        }
    };

    let result = result.with_elapsed(started_at);
    debug!("{} exited with {} in {}ms", program, result.exit_code, result.execution_time_ms);
    result
}

fn spawn_within(program: &str, args: &[String], limit: Duration) -> Result<Child, InvokeError> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    spawn_bounded(program, limit, move || command.spawn())
}

/// Run `spawn` on a helper thread so a hung launch cannot exceed `limit`.
///
/// The hand-off channel has no buffer: a child is either received here before
/// the deadline or handed back to the helper thread, which kills and reaps it.
fn spawn_bounded<F>(program: &str, limit: Duration, spawn: F) -> Result<Child, InvokeError>
where
    F: FnOnce() -> io::Result<Child> + Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel(0);

    thread::spawn(move || {
        if let Err(SendError(Ok(mut late))) = tx.send(spawn()) {
            debug!("Killing child {} started after the deadline", late.id());
            let _ = late.kill();
            let _ = late.wait();
        }
    });

    match rx.recv_timeout(limit) {
        Ok(Ok(child)) => Ok(child),
        Ok(Err(source)) => Err(InvokeError::Spawn {
            program: program.to_string(),
            source,
        }),
        Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
            Err(InvokeError::StartTimeout {
                program: program.to_string(),
                limit,
            })
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[test]
    fn test_normal_completion() {
        let script = sh("echo hello; echo oops >&2; exit 3");
        let result = run_process("sh", &script, Timeouts::default());

        assert!(result.started);
        assert_eq!(result.exit_code, 3);
        assert_eq!(result.stdout.trim(), "hello");
        assert_eq!(result.stderr.trim(), "oops");
        assert_eq!(result.invoked_program, "sh");
        assert!(!result.used_bridge);
    }

    #[test]
    fn test_missing_program_does_not_start() {
        let result = run_process("definitely-not-a-real-binary-xyz", &[], Timeouts::default());

        assert!(!result.started);
        assert_eq!(result.exit_code, -1);
        assert_eq!(result.stderr, FAILED_TO_START);
    }

    #[test]
    fn test_timeout_terminates_process() {
        let timeouts = Timeouts::from_millis(500, 200);
        let result = run_process("sleep", &["5".to_string()], timeouts);

        assert!(result.started);
        assert_eq!(result.exit_code, -1);
        assert_eq!(result.stderr, TIMED_OUT);
        assert!(result.stdout.is_empty());
        assert!(result.execution_time_ms < 5000);
    }

    fn is_running(pid: u32) -> bool {
        Command::new("kill")
            .args(["-0", &pid.to_string()])
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    #[test]
    fn test_late_child_is_killed_and_reaped() {
        let (pid_tx, pid_rx) = mpsc::channel();
        let spawn = move || -> io::Result<Child> {
            thread::sleep(Duration::from_millis(300));
            let child = Command::new("sleep").arg("5").spawn()?;
            let _ = pid_tx.send(child.id());
            Ok(child)
        };

        let err = spawn_bounded("sleep", Duration::from_millis(50), spawn).unwrap_err();
        assert!(matches!(err, InvokeError::StartTimeout { .. }));

        let pid = pid_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        let gone = (0..40).any(|_| {
            thread::sleep(Duration::from_millis(50));
            !is_running(pid)
        });
        assert!(gone, "late child {} is still alive", pid);
    }

    #[test]
    fn test_spawn_failure_is_not_a_timeout() {
        let spawn = || -> io::Result<Child> {
            Err(io::Error::new(io::ErrorKind::NotFound, "no such file"))
        };
        let err = spawn_bounded("ghost", Duration::from_millis(500), spawn).unwrap_err();
        assert!(matches!(err, InvokeError::Spawn { .. }));
    }

    #[test]
    fn test_not_found_exit_code_is_reported() {
        let result = run_process("sh", &sh("exit 127"), Timeouts::default());
        assert!(result.started);
        assert_eq!(result.exit_code, 127);
    }

    #[test]
    fn test_details_formatting() {
        let args = vec!["status".to_string(), "--json".to_string()];
        let result = ProbeResult::completed("rpm-ostree", &args, 1, "  \n", "boom\n");

        assert_eq!(
            result.details(),
            "Command: rpm-ostree status --json\nExit: 1\nStdout: <empty>\nStderr:\nboom"
        );
    }

    #[test]
    fn test_unavailable_messages() {
        let not_started = ProbeResult::not_started("podman", &[]);
        assert_eq!(
            not_started.unavailable_message("podman"),
            "podman: unavailable (failed to start (podman))"
        );

        let not_found = ProbeResult::completed("toolbox", &[], 127, "", "");
        assert_eq!(
            not_found.unavailable_message("toolbox"),
            "toolbox: unavailable (command not found)"
        );

        let failed = ProbeResult::completed("flatpak", &[], 1, "", "");
        assert_eq!(failed.unavailable_message("flatpak (user)"), "flatpak (user): unavailable");

        let stderr = ProbeResult::completed("distrobox", &[], 2, "", " no podman \n");
        assert_eq!(stderr.unavailable_message("distrobox"), "distrobox: unavailable (no podman)");
    }
}
