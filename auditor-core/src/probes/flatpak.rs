use super::{non_empty_lines, Probe, ProbeContext, UNAVAILABLE};
use crate::models::StatusNode;

/// Installation scopes queried, with the labels used in the report
const SCOPES: [(&str, &str, &str); 2] = [
    ("--system", "System", "system"),
    ("--user", "User", "user"),
];

/// Flatpak applications, system-wide and per-user
pub struct FlatpakProbe;

impl Probe for FlatpakProbe {
    fn name(&self) -> &'static str {
        "Flatpak"
    }

    fn run(&self, ctx: &mut ProbeContext<'_>) -> StatusNode {
        let mut children = Vec::new();
        let mut any_ok = false;

        for (flag, label, scope) in SCOPES {
            let result = ctx.run("flatpak", &["list", "--app", "--columns=application", flag]);
            let details = result.details();

            if result.succeeded() {
                let apps: Vec<StatusNode> = non_empty_lines(&result.stdout)
                    .map(|line| StatusNode::new(format!("app: {}", line.trim()), scope))
                    .collect();
                children.push(
                    StatusNode::new(label, format!("{} apps", apps.len()))
                        .with_details(details)
                        .with_children(apps),
                );
                any_ok = true;
            } else {
                children.push(StatusNode::new(label, UNAVAILABLE).with_details(details));
                ctx.push_error(result.unavailable_message(&format!("flatpak ({})", scope)));
            }
        }

        let status = if any_ok { "ok" } else { UNAVAILABLE };
        StatusNode::new(self.name(), status).with_children(children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{BridgeEscalator, NOT_FOUND_EXIT};
    use crate::process::Timeouts;
    use crate::testing::ScriptedRunner;

    const SYSTEM: &str = "flatpak list --app --columns=application --system";
    const USER: &str = "flatpak list --app --columns=application --user";

    fn probe(runner: ScriptedRunner) -> (StatusNode, Vec<String>, bool) {
        let escalator = BridgeEscalator::new(runner, Timeouts::default());
        let mut ctx = ProbeContext::new(&escalator);
        let node = FlatpakProbe.run(&mut ctx);
        let (errors, bridged) = ctx.into_parts();
        (node, errors, bridged)
    }

    #[test]
    fn test_system_missing_user_ok() {
        let runner = ScriptedRunner::new()
            .respond(SYSTEM, NOT_FOUND_EXIT, "", "")
            .respond(&format!("host-spawn {}", SYSTEM), NOT_FOUND_EXIT, "", "")
            .respond(&format!("flatpak-spawn --host {}", SYSTEM), NOT_FOUND_EXIT, "", "")
            .respond(USER, 0, "org.gnome.Maps\norg.mozilla.firefox\ncom.valvesoftware.Steam\n", "");
        let (node, errors, _) = probe(runner);

        assert_eq!(node.status, "ok");
        assert_eq!(node.child("System").unwrap().status, "unavailable");
        let user = node.child("User").unwrap();
        assert_eq!(user.status, "3 apps");
        assert_eq!(user.children[1].name, "app: org.mozilla.firefox");
        assert_eq!(user.children[1].status, "user");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("flatpak (system)"));
    }

    #[test]
    fn test_both_scopes_unavailable() {
        let (node, errors, bridged) = probe(ScriptedRunner::new());

        assert_eq!(node.status, "unavailable");
        assert_eq!(node.children.len(), 2);
        assert!(node.children.iter().all(|c| c.status == "unavailable" && c.is_leaf()));
        assert_eq!(errors.len(), 2);
        assert!(errors[1].starts_with("flatpak (user): unavailable (failed to start"));
        assert!(!bridged);
    }

    #[test]
    fn test_bridge_use_is_recorded() {
        let runner = ScriptedRunner::new()
            .respond(&format!("host-spawn {}", SYSTEM), 0, "org.gnome.Calculator\n", "")
            .respond(&format!("host-spawn {}", USER), 0, "", "");
        let (node, errors, bridged) = probe(runner);

        assert!(bridged);
        assert!(errors.is_empty());
        assert_eq!(node.child("System").unwrap().status, "1 apps");
        assert_eq!(node.child("User").unwrap().status, "0 apps");
    }
}
