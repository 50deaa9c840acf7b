use super::{parse_table, Probe, ProbeContext, PARSE_ERROR, UNAVAILABLE};
use crate::models::StatusNode;
use serde_json::Value;
use tracing::warn;

/// Podman containers (JSON) and distrobox boxes (table)
pub struct ContainersProbe;

fn str_field<'a>(item: &'a Value, key: &str) -> &'a str {
    item.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// One podman container, named after its first name or a short id
fn podman_node(item: &Value) -> StatusNode {
    let name = item
        .get("Names")
        .and_then(Value::as_array)
        .and_then(|names| names.first())
        .and_then(Value::as_str)
        .unwrap_or_else(|| str_field(item, "Name"));
    let name = if name.is_empty() {
        str_field(item, "Id").chars().take(12).collect()
    } else {
        name.to_string()
    };

    StatusNode::new(format!("podman: {}", name), str_field(item, "State")).with_details(format!(
        "Image: {}\nStatus: {}",
        str_field(item, "Image"),
        str_field(item, "Status")
    ))
}

impl ContainersProbe {
    /// Returns the podman node and whether the command itself succeeded
    fn podman(ctx: &mut ProbeContext<'_>) -> (StatusNode, bool) {
        let result = ctx.run("podman", &["ps", "-a", "--format", "json"]);
        let details = result.details();

        if !result.succeeded() {
            ctx.push_error(result.unavailable_message("podman"));
            return (StatusNode::new("Podman", UNAVAILABLE).with_details(details), false);
        }

        let node = match serde_json::from_str::<Value>(&result.stdout) {
            Ok(Value::Array(items)) => {
                let containers: Vec<StatusNode> = items.iter().map(podman_node).collect();
                StatusNode::new("Podman", containers.len().to_string())
                    .with_details(details)
                    .with_children(containers)
            }
            other => {
                if let Err(e) = other {
                    warn!("podman output is not JSON: {}", e);
                }
                ctx.push_error("podman: failed to parse JSON output");
                StatusNode::new("Podman", PARSE_ERROR).with_details(details)
            }
        };
        (node, true)
    }

    fn distrobox(ctx: &mut ProbeContext<'_>) -> (StatusNode, bool) {
        let result = ctx.run("distrobox", &["list", "--no-color"]);
        let details = result.details();

        if !result.succeeded() {
            ctx.push_error(result.unavailable_message("distrobox"));
            return (StatusNode::new("Distrobox", UNAVAILABLE).with_details(details), false);
        }

        let boxes = parse_table(&result.stdout, "distrobox", |line| {
            line.contains("NAME") && line.contains("STATUS")
        });
        let node = StatusNode::new("Distrobox", boxes.len().to_string())
            .with_details(details)
            .with_children(boxes);
        (node, true)
    }
}

impl Probe for ContainersProbe {
    fn name(&self) -> &'static str {
        "Containers"
    }

    fn run(&self, ctx: &mut ProbeContext<'_>) -> StatusNode {
        let (podman, podman_ok) = Self::podman(ctx);
        let (distrobox, distrobox_ok) = Self::distrobox(ctx);

        let status = match (podman_ok, distrobox_ok) {
            (true, true) => "ok",
            (false, false) => UNAVAILABLE,
            _ => "partial",
        };
        StatusNode::new(self.name(), status).with_children(vec![podman, distrobox])
    }
}
