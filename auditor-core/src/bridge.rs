//! Host bridge escalation
//!
//! When the auditor runs inside a sandbox (Flatpak, toolbox, distrobox) the
//! tools it queries usually live on the host. A direct attempt that cannot
//! start, or that exits with the shell's "command not found" code, is retried
//! through each bridge in turn. The order is fixed.

use crate::process::{CommandRunner, ProbeResult, Timeouts};
use tracing::debug;

/// Exit code conventionally meaning "command not found"
pub const NOT_FOUND_EXIT: i32 = 127;

/// A program that re-dispatches a command into the host context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bridge {
    pub program: &'static str,
    pub leading_args: &'static [&'static str],
}

impl Bridge {
    /// Argument vector handing `program args...` over to this bridge
    pub fn wrap(&self, program: &str, args: &[String]) -> Vec<String> {
        self.leading_args
            .iter()
            .map(|a| a.to_string())
            .chain(std::iter::once(program.to_string()))
            .chain(args.iter().cloned())
            .collect()
    }
}

pub const HOST_BRIDGES: [Bridge; 2] = [
    Bridge {
        program: "host-spawn",
        leading_args: &[],
    },
    Bridge {
        program: "flatpak-spawn",
        leading_args: &["--host"],
    },
];

fn needs_bridge(result: &ProbeResult) -> bool {
    !result.started || result.exit_code == NOT_FOUND_EXIT
}

/// Runs commands directly first, then through [`HOST_BRIDGES`]
pub struct BridgeEscalator {
    runner: Box<dyn CommandRunner>,
    timeouts: Timeouts,
}

impl BridgeEscalator {
    pub fn new(runner: impl CommandRunner + 'static, timeouts: Timeouts) -> Self {
        Self {
            runner: Box::new(runner),
            timeouts,
        }
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Run `program args...`, escalating through the bridges when the tool is
    /// unreachable. Returns the first attempt that started without the
    /// not-found code, otherwise the last attempt made.
    pub fn run_with_fallback(&self, program: &str, args: &[&str]) -> ProbeResult {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();

        let mut last = self.runner.run(program, &args, self.timeouts);
        if !needs_bridge(&last) {
            return last;
        }

        for bridge in HOST_BRIDGES.iter() {
            debug!(
                "{} unreachable (started: {}, exit: {}), retrying through {}",
                program, last.started, last.exit_code, bridge.program
            );
            let bridged_args = bridge.wrap(program, &args);
            let result = self.runner.run(bridge.program, &bridged_args, self.timeouts);
            let started = result.started;
            last = result.with_bridge(started);
            if !needs_bridge(&last) {
                return last;
            }
        }

        debug!("{}: every bridge exhausted", program);
        last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;

    fn escalator(runner: ScriptedRunner) -> BridgeEscalator {
        BridgeEscalator::new(runner, Timeouts::default())
    }

    #[test]
    fn test_direct_success_skips_bridges() {
        let runner = ScriptedRunner::new().respond("podman ps", 0, "[]", "");
        let calls = runner.calls();
        let result = escalator(runner).run_with_fallback("podman", &["ps"]);

        assert!(result.succeeded());
        assert!(!result.used_bridge);
        assert_eq!(calls.lock().len(), 1);
    }

    #[test]
    fn test_non_zero_exit_is_not_escalated() {
        let runner = ScriptedRunner::new().respond("flatpak list", 1, "", "denied");
        let calls = runner.calls();
        let result = escalator(runner).run_with_fallback("flatpak", &["list"]);

        assert_eq!(result.exit_code, 1);
        assert!(!result.used_bridge);
        assert_eq!(calls.lock().len(), 1);
    }

    #[test]
    fn test_not_found_escalates_to_first_bridge() {
        let runner = ScriptedRunner::new()
            .respond("toolbox list -c", NOT_FOUND_EXIT, "", "")
            .respond("host-spawn toolbox list -c", 0, "fedora running", "");
        let result = escalator(runner).run_with_fallback("toolbox", &["list", "-c"]);

        assert!(result.succeeded());
        assert!(result.used_bridge);
        assert_eq!(result.invoked_program, "host-spawn");
        assert_eq!(result.invoked_args, vec!["toolbox", "list", "-c"]);
        assert_eq!(result.stdout, "fedora running");
    }

    #[test]
    fn test_start_failure_escalates_to_second_bridge() {
        // Neither the tool nor host-spawn exist inside the sandbox
        let runner = ScriptedRunner::new().respond(
            "flatpak-spawn --host rpm-ostree status --json",
            0,
            "{}",
            "",
        );
        let calls = runner.calls();
        let result = escalator(runner).run_with_fallback("rpm-ostree", &["status", "--json"]);

        assert!(result.succeeded());
        assert!(result.used_bridge);
        assert_eq!(result.command_line(), "flatpak-spawn --host rpm-ostree status --json");
        assert_eq!(
            *calls.lock(),
            vec![
                "rpm-ostree status --json",
                "host-spawn rpm-ostree status --json",
                "flatpak-spawn --host rpm-ostree status --json",
            ]
        );
    }

    #[test]
    fn test_bridge_failure_other_than_not_found_is_returned() {
        let runner = ScriptedRunner::new().respond("host-spawn podman ps", 125, "", "podman error");
        let result = escalator(runner).run_with_fallback("podman", &["ps"]);

        assert_eq!(result.exit_code, 125);
        assert!(result.used_bridge);
        assert_eq!(result.invoked_program, "host-spawn");
    }

    #[test]
    fn test_all_bridges_fail_to_start() {
        let runner = ScriptedRunner::new();
        let result = escalator(runner).run_with_fallback("distrobox", &["list"]);

        assert!(!result.started);
        assert!(!result.used_bridge);
        assert_eq!(result.invoked_program, "flatpak-spawn");
        assert_eq!(result.invoked_args, vec!["--host", "distrobox", "list"]);
    }

    #[test]
    fn test_last_bridge_not_found_still_marks_bridge() {
        let runner = ScriptedRunner::new().respond(
            "flatpak-spawn --host distrobox list",
            NOT_FOUND_EXIT,
            "",
            "",
        );
        let result = escalator(runner).run_with_fallback("distrobox", &["list"]);

        assert!(result.started);
        assert_eq!(result.exit_code, NOT_FOUND_EXIT);
        assert!(result.used_bridge);
    }
}
