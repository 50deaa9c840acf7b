//! Tree state store
//!
//! Flattens a [`StatusNode`] tree into an arena of [`TreeNode`] records and
//! keeps the visible projection (depth-first, collapsed subtrees omitted).
//! Expand state is keyed by node path, so it survives a refresh as long as
//! the path still exists. Siblings sharing a name share a path, and therefore
//! share their expand state.

use crate::models::StatusNode;
use std::collections::HashMap;

pub const PATH_SEPARATOR: &str = "/";

/// Nodes shallower than this start expanded
const DEFAULT_EXPANDED_DEPTH: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub name: String,
    pub status: String,
    pub details: String,
    pub path: String,
    pub depth: usize,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub expanded: bool,
}

impl TreeNode {
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

/// Owns one generation of nodes and its visible rows
#[derive(Debug)]
pub struct TreeStore {
    nodes: Vec<TreeNode>,
    visible: Vec<usize>,
    preserve_expanded: bool,
}

impl Default for TreeStore {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            visible: Vec::new(),
            preserve_expanded: true,
        }
    }
}

impl TreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn preserve_expanded(&self) -> bool {
        self.preserve_expanded
    }

    /// When disabled, every ingest resets expand state to the depth default
    pub fn set_preserve_expanded(&mut self, preserve: bool) {
        self.preserve_expanded = preserve;
    }

    /// Replace the current generation with `tree`
    pub fn ingest(&mut self, tree: &StatusNode) {
        let prior = self.snapshot_expanded();
        self.nodes.clear();
        self.add_node(tree, None, 0, "", &prior);
        self.rebuild_visible();
    }

    fn snapshot_expanded(&self) -> HashMap<String, bool> {
        if !self.preserve_expanded {
            return HashMap::new();
        }
        self.nodes
            .iter()
            .map(|node| (node.path.clone(), node.expanded))
            .collect()
    }

    /// Append `source` and its subtree, returning the new node's index
    fn add_node(
        &mut self,
        source: &StatusNode,
        parent: Option<usize>,
        depth: usize,
        parent_path: &str,
        prior: &HashMap<String, bool>,
    ) -> usize {
        let path = if parent_path.is_empty() {
            source.name.clone()
        } else {
            format!("{}{}{}", parent_path, PATH_SEPARATOR, source.name)
        };
        let expanded = prior
            .get(&path)
            .copied()
            .unwrap_or(depth < DEFAULT_EXPANDED_DEPTH);

        let index = self.nodes.len();
        self.nodes.push(TreeNode {
            name: source.name.clone(),
            status: source.status.clone(),
            details: source.details.clone(),
            path,
            depth,
            parent,
            children: Vec::with_capacity(source.children.len()),
            expanded,
        });

        let node_path = self.nodes[index].path.clone();
        for child in &source.children {
            let child_index = self.add_node(child, Some(index), depth + 1, &node_path, prior);
            self.nodes[index].children.push(child_index);
        }

        index
    }

    fn rebuild_visible(&mut self) {
        self.visible.clear();

        let mut stack: Vec<usize> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.parent.is_none())
            .map(|(index, _)| index)
            .rev()
            .collect();

        while let Some(index) = stack.pop() {
            self.visible.push(index);
            let node = &self.nodes[index];
            if node.expanded {
                stack.extend(node.children.iter().rev());
            }
        }
    }

    /// All nodes of the current generation, in pre-order
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Rows currently shown. Indices are only valid until the next mutation.
    pub fn visible_rows(&self) -> impl ExactSizeIterator<Item = &TreeNode> + '_ {
        self.visible.iter().map(move |&index| &self.nodes[index])
    }

    pub fn visible_len(&self) -> usize {
        self.visible.len()
    }

    pub fn visible_row(&self, row: usize) -> Option<&TreeNode> {
        self.visible.get(row).map(|&index| &self.nodes[index])
    }

    /// Flip the node at visible `row`. Returns false for leaves and out-of-range rows.
    pub fn toggle_expanded(&mut self, row: usize) -> bool {
        let Some(&index) = self.visible.get(row) else {
            return false;
        };
        let node = &mut self.nodes[index];
        if !node.has_children() {
            return false;
        }
        node.expanded = !node.expanded;
        self.rebuild_visible();
        true
    }

    pub fn find(&self, path: &str) -> Option<&TreeNode> {
        self.nodes.iter().find(|node| node.path == path)
    }

    /// Set expand state by path. Returns false if no parent node has that path.
    pub fn set_expanded(&mut self, path: &str, expanded: bool) -> bool {
        let mut changed = false;
        for node in self.nodes.iter_mut().filter(|n| n.path == path && n.has_children()) {
            node.expanded = expanded;
            changed = true;
        }
        if changed {
            self.rebuild_visible();
        }
        changed
    }

    pub fn expand_all(&mut self) {
        self.set_all(true);
    }

    pub fn collapse_all(&mut self) {
        self.set_all(false);
    }

    fn set_all(&mut self, expanded: bool) {
        for node in self.nodes.iter_mut().filter(|n| n.has_children()) {
            node.expanded = expanded;
        }
        self.rebuild_visible();
    }
}
