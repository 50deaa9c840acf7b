use super::{Probe, ProbeContext, UNAVAILABLE, UNKNOWN};
use crate::models::StatusNode;
use serde_json::{Map, Value};
use tracing::warn;

const LABEL: &str = "rpm-ostree";

/// One record of `rpm-ostree status --json`. Missing or wrong-typed fields read as absent.
#[derive(Debug, Clone, Copy)]
struct Deployment<'a>(&'a Map<String, Value>);

impl<'a> Deployment<'a> {
    fn flag(&self, key: &str) -> bool {
        self.0.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    fn text(&self, key: &str) -> Option<&'a str> {
        self.0.get(key).and_then(Value::as_str)
    }

    fn count(&self, key: &str) -> usize {
        self.0.get(key).and_then(Value::as_array).map_or(0, Vec::len)
    }

    fn version(&self) -> Option<&'a str> {
        self.text("version").filter(|v| !v.is_empty())
    }
}

/// Only a document that is not a JSON object is rejected
fn parse_document(stdout: &str) -> Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(stdout) {
        Ok(Value::Object(document)) => Ok(document),
        Ok(_) => Err("top-level value is not an object".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

/// Object records of `deployments`; anything else in or instead of the array is ignored
fn deployments(document: &Map<String, Value>) -> impl Iterator<Item = Deployment<'_>> {
    document
        .get("deployments")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
        .map(Deployment)
}

/// Booted and pending deployments of the base image
pub struct DeploymentProbe;

impl DeploymentProbe {
    fn summarize(document: &Map<String, Value>) -> (String, Vec<StatusNode>, String, String) {
        let mut booted = None;
        let mut pending = None;
        for deployment in deployments(document) {
            if deployment.flag("booted") {
                booted = Some(deployment);
            } else if deployment.flag("staged") {
                pending = Some(deployment);
            }
        }

        let mut children = Vec::new();
        let (status, layered, overrides) = match booted {
            Some(booted) => {
                let shown = booted
                    .version()
                    .or_else(|| booted.text("origin"))
                    .unwrap_or_default();
                children.push(StatusNode::new("Deployment: current", "committed"));
                (
                    format!("booted: {}", shown),
                    booted.count("packages").to_string(),
                    booted.count("overrides").to_string(),
                )
            }
            None => {
                children.push(StatusNode::new("Deployment: current", UNKNOWN));
                (
                    "no booted deployment".to_string(),
                    UNKNOWN.to_string(),
                    UNKNOWN.to_string(),
                )
            }
        };

        let pending_status = match pending {
            Some(pending) => pending.version().unwrap_or("staged"),
            None => "none",
        };
        children.push(StatusNode::new("Deployment: pending", pending_status));

        (status, children, layered, overrides)
    }
}

impl Probe for DeploymentProbe {
    fn name(&self) -> &'static str {
        "Root (rpm-ostree)"
    }

    fn run(&self, ctx: &mut ProbeContext<'_>) -> StatusNode {
        let result = ctx.run("rpm-ostree", &["status", "--json"]);

        let mut status = UNAVAILABLE.to_string();
        let mut children = Vec::new();
        let mut layered = UNKNOWN.to_string();
        let mut overrides = UNKNOWN.to_string();

        if result.succeeded() {
            match parse_document(&result.stdout) {
                Ok(document) => {
                    (status, children, layered, overrides) = Self::summarize(&document);
                }
                Err(e) => {
                    warn!("rpm-ostree output is not a status document: {}", e);
                    ctx.push_error(format!("{}: failed to parse JSON output", LABEL));
                }
            }
        } else {
            ctx.push_error(result.unavailable_message(LABEL));
        }

        children.push(StatusNode::new("Layered packages", layered));
        children.push(StatusNode::new("Overrides", overrides));

        StatusNode::new(self.name(), status)
            .with_details(result.details())
            .with_children(children)
    }
}
