//! Report building
//!
//! Runs every probe in a fixed order and assembles their subtrees under a
//! single `System` root. A probe that fails completely still contributes its
//! (degraded) node, so the tree always has one child per subsystem.

use crate::bridge::BridgeEscalator;
use crate::models::StatusNode;
use crate::probes::{default_probes, Probe, ProbeContext};
use crate::process::{CommandRunner, Timeouts};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;
use tracing::{info, warn};

pub const ROOT_NAME: &str = "System";

/// Result of one full build
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub tree: StatusNode,
    pub errors: Vec<String>,
    pub bridge_used: bool,
    pub generated_at: DateTime<Utc>,
    pub duration_ms: u128,
}

impl Report {
    /// Report stamped with the current time, for trees built outside [`ReportBuilder`]
    pub fn new(tree: StatusNode, errors: Vec<String>, bridge_used: bool) -> Self {
        Self {
            tree,
            errors,
            bridge_used,
            generated_at: Utc::now(),
            duration_ms: 0,
        }
    }
}

pub struct ReportBuilder {
    escalator: BridgeEscalator,
    probes: Vec<Box<dyn Probe>>,
}

impl ReportBuilder {
    pub fn new(runner: impl CommandRunner + 'static, timeouts: Timeouts) -> Self {
        Self::with_probes(BridgeEscalator::new(runner, timeouts), default_probes())
    }

    pub fn with_probes(escalator: BridgeEscalator, probes: Vec<Box<dyn Probe>>) -> Self {
        Self { escalator, probes }
    }

    pub fn probe_names(&self) -> Vec<&'static str> {
        self.probes.iter().map(|p| p.name()).collect()
    }

    /// Query every subsystem sequentially. Never fails.
    pub fn build(&self) -> Report {
        let started_at = Instant::now();
        let mut ctx = ProbeContext::new(&self.escalator);

        let children: Vec<StatusNode> = self
            .probes
            .iter()
            .map(|probe| {
                let errors_before = ctx.errors().len();
                let node = probe.run(&mut ctx);
                for error in &ctx.errors()[errors_before..] {
                    warn!("{}: {}", probe.name(), error);
                }
                node
            })
            .collect();

        let (errors, bridge_used) = ctx.into_parts();
        let tree = StatusNode::new(ROOT_NAME, "").with_children(children);
        let mut report = Report::new(tree, errors, bridge_used);
        report.duration_ms = started_at.elapsed().as_millis();

        info!(
            "Report built in {}ms: {} nodes, {} errors, host bridge {}",
            report.duration_ms,
            report.tree.node_count(),
            report.errors.len(),
            if report.bridge_used { "used" } else { "not used" }
        );
        report
    }
}
