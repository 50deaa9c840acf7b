use super::{parse_table, Probe, ProbeContext, UNAVAILABLE};
use crate::models::StatusNode;

/// Toolbox containers
pub struct ToolboxProbe;

impl Probe for ToolboxProbe {
    fn name(&self) -> &'static str {
        "Toolboxes"
    }

    fn run(&self, ctx: &mut ProbeContext<'_>) -> StatusNode {
        let result = ctx.run("toolbox", &["list", "-c"]);
        let details = result.details();

        let (status, listing) = if result.succeeded() {
            let items = parse_table(&result.stdout, "toolbox", |line| line.contains("CONTAINER"));
            let listing = StatusNode::new("toolboxes", items.len().to_string())
                .with_details(details)
                .with_children(items);
            ("ok", listing)
        } else {
            ctx.push_error(result.unavailable_message("toolbox"));
            (UNAVAILABLE, StatusNode::new("toolboxes", UNAVAILABLE).with_details(details))
        };

        StatusNode::new(self.name(), status).with_children(vec![listing])
    }
}
