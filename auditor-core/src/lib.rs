//! Immutable Auditor core - audit of an immutable host OS
//!
//! This crate gathers the state of the host through its diagnostic tools:
//! - Bounded-time process execution (start + completion deadlines)
//! - Escalation through host bridges when a tool is unreachable from a sandbox
//! - One probe per subsystem (rpm-ostree, flatpak, podman/distrobox, toolbox)
//! - Aggregation into a single status tree
//! - Expand/collapse state that survives refreshes, keyed by node path

pub mod bridge;
pub mod models;
pub mod probes;
pub mod process;
pub mod report;
pub mod tree;
pub mod view;

#[cfg(test)]
pub(crate) mod testing;

pub use bridge::{BridgeEscalator, NOT_FOUND_EXIT};
pub use models::StatusNode;
pub use process::{CommandRunner, ProbeResult, SystemRunner, Timeouts};
pub use report::{Report, ReportBuilder};
pub use tree::{TreeNode, TreeStore};
pub use view::{AuditorView, RowView};
