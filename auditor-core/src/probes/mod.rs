//! Subsystem probes
//!
//! Each probe queries one subsystem through the [`BridgeEscalator`] and
//! reduces the output to a small subtree:
//! - `deployment` : rpm-ostree deployments (JSON)
//! - `flatpak` : system and user applications (one id per line)
//! - `containers` : podman (JSON) and distrobox (table)
//! - `toolbox` : toolbox containers (table)
//!
//! Failures never abort a probe, they degrade node statuses and land in the
//! error list of the [`ProbeContext`].

mod containers;
mod deployment;
mod flatpak;
mod toolbox;

pub use containers::ContainersProbe;
pub use deployment::DeploymentProbe;
pub use flatpak::FlatpakProbe;
pub use toolbox::ToolboxProbe;

use crate::bridge::BridgeEscalator;
use crate::models::StatusNode;
use crate::process::ProbeResult;

pub const UNAVAILABLE: &str = "unavailable";
pub const UNKNOWN: &str = "unknown";
pub const PARSE_ERROR: &str = "parse error";

/// Shared state for one report build
pub struct ProbeContext<'a> {
    escalator: &'a BridgeEscalator,
    errors: Vec<String>,
    bridge_used: bool,
}

impl<'a> ProbeContext<'a> {
    pub fn new(escalator: &'a BridgeEscalator) -> Self {
        Self {
            escalator,
            errors: Vec::new(),
            bridge_used: false,
        }
    }

    /// Run a command with bridge fallback, remembering whether a bridge was used
    pub fn run(&mut self, program: &str, args: &[&str]) -> ProbeResult {
        let result = self.escalator.run_with_fallback(program, args);
        self.bridge_used |= result.used_bridge;
        result
    }

    pub fn push_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn bridge_used(&self) -> bool {
        self.bridge_used
    }

    pub fn into_parts(self) -> (Vec<String>, bool) {
        (self.errors, self.bridge_used)
    }
}

/// One subsystem of the host
pub trait Probe: Send + Sync {
    /// Label used for the subsystem's root node
    fn name(&self) -> &'static str;

    fn run(&self, ctx: &mut ProbeContext<'_>) -> StatusNode;
}

/// Probes in report order
pub fn default_probes() -> Vec<Box<dyn Probe>> {
    vec![
        Box::new(DeploymentProbe),
        Box::new(FlatpakProbe),
        Box::new(ContainersProbe),
        Box::new(ToolboxProbe),
    ]
}

fn non_empty_lines(output: &str) -> impl Iterator<Item = &str> {
    output.split('\n').filter(|line| !line.trim().is_empty())
}

/// Table listings: skip header lines, token 0 is the name, token 1 the status
fn parse_table(output: &str, prefix: &str, is_header: impl Fn(&str) -> bool) -> Vec<StatusNode> {
    non_empty_lines(output)
        .filter(|&line| !is_header(line))
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            let name = columns.next()?;
            let status = columns.next().unwrap_or_default();
            Some(StatusNode::new(format!("{}: {}", prefix, name), status).with_details(line.trim()))
        })
        .collect()
}
