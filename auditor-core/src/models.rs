use serde::{Deserialize, Serialize};

/// One reportable fact: a subsystem, a category within it, or a single item.
///
/// Children keep the order in which the subsystem enumerated them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusNode {
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub details: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<StatusNode>,
}

impl StatusNode {
    pub fn new(name: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: status.into(),
            details: String::new(),
            children: Vec::new(),
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }

    pub fn with_children(mut self, children: Vec<StatusNode>) -> Self {
        self.children = children;
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// First direct child with the given name
    pub fn child(&self, name: &str) -> Option<&StatusNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Total number of nodes in this subtree, itself included
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(StatusNode::node_count).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_lookup() {
        let node = StatusNode::new("Flatpak", "ok").with_children(vec![
            StatusNode::new("System", "2 apps"),
            StatusNode::new("User", "unavailable").with_details("Command: flatpak"),
        ]);

        assert!(!node.is_leaf());
        assert_eq!(node.node_count(), 3);
        assert_eq!(node.child("User").map(|c| c.details.as_str()), Some("Command: flatpak"));
        assert!(node.child("Missing").is_none());
    }

    #[test]
    fn test_serialization_skips_empty_fields() {
        let json = serde_json::to_value(StatusNode::new("System", "")).unwrap();
        assert_eq!(json, serde_json::json!({ "name": "System", "status": "" }));
    }
}
