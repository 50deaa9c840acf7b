//! Presentation adapter
//!
//! Row-indexed, read-only view over the [`TreeStore`] for a rendering layer,
//! plus the observable state of the last build (loading, errors, bridge use).

use crate::report::{Report, ReportBuilder};
use crate::tree::{TreeNode, TreeStore};
use std::sync::Arc;
use tracing::debug;

/// Fixed per-row fields exposed to the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowView<'a> {
    pub name: &'a str,
    pub status: &'a str,
    pub details: &'a str,
    pub depth: usize,
    pub has_children: bool,
    pub expanded: bool,
}

impl<'a> From<&'a TreeNode> for RowView<'a> {
    fn from(node: &'a TreeNode) -> Self {
        Self {
            name: &node.name,
            status: &node.status,
            details: &node.details,
            depth: node.depth,
            has_children: node.has_children(),
            expanded: node.expanded,
        }
    }
}

pub struct AuditorView {
    builder: Arc<ReportBuilder>,
    store: TreeStore,
    loading: bool,
    errors: Vec<String>,
    bridge_used: bool,
}

impl AuditorView {
    pub fn new(builder: Arc<ReportBuilder>) -> Self {
        Self {
            builder,
            store: TreeStore::new(),
            loading: false,
            errors: Vec::new(),
            bridge_used: false,
        }
    }

    /// Builder shared with callers that run the build elsewhere
    pub fn builder(&self) -> Arc<ReportBuilder> {
        Arc::clone(&self.builder)
    }

    /// One full synchronous build, then ingest
    pub fn refresh(&mut self) -> Report {
        self.begin_refresh();
        let report = self.builder.build();
        self.apply(&report);
        report
    }

    /// Mark a build as in progress
    pub fn begin_refresh(&mut self) {
        self.loading = true;
        self.bridge_used = false;
    }

    /// Ingest a finished build
    pub fn apply(&mut self, report: &Report) {
        self.store.ingest(&report.tree);
        self.errors = report.errors.clone();
        self.bridge_used = report.bridge_used;
        self.loading = false;
        debug!("View updated: {} visible rows", self.store.visible_len());
    }

    pub fn row_count(&self) -> usize {
        self.store.visible_len()
    }

    pub fn row(&self, row: usize) -> Option<RowView<'_>> {
        self.store.visible_row(row).map(RowView::from)
    }

    pub fn rows(&self) -> impl Iterator<Item = RowView<'_>> + '_ {
        self.store.visible_rows().map(RowView::from)
    }

    pub fn toggle_expanded(&mut self, row: usize) -> bool {
        self.store.toggle_expanded(row)
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn bridge_used(&self) -> bool {
        self.bridge_used
    }

    pub fn preserve_expanded(&self) -> bool {
        self.store.preserve_expanded()
    }

    pub fn set_preserve_expanded(&mut self, preserve: bool) {
        self.store.set_preserve_expanded(preserve);
    }

    pub fn store(&self) -> &TreeStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut TreeStore {
        &mut self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Timeouts;
    use crate::testing::ScriptedRunner;

    fn view(runner: ScriptedRunner) -> AuditorView {
        AuditorView::new(Arc::new(ReportBuilder::new(runner, Timeouts::default())))
    }

    fn row_index(view: &AuditorView, name: &str) -> usize {
        view.rows().position(|r| r.name == name).unwrap()
    }

    #[test]
    fn test_refresh_populates_rows_and_state() {
        let runner = ScriptedRunner::new().respond("host-spawn toolbox list -c", 0, "", "");
        let mut view = view(runner);
        assert_eq!(view.row_count(), 0);
        assert!(view.preserve_expanded());

        let report = view.refresh();
        assert!(!view.loading());
        assert!(view.bridge_used());
        assert_eq!(view.errors(), report.errors.as_slice());

        let root = view.row(0).unwrap();
        assert_eq!(root.name, "System");
        assert_eq!(root.depth, 0);
        assert!(root.has_children && root.expanded);
        assert_eq!(view.rows().filter(|r| r.depth == 1).count(), 4);
        assert!(view.row(view.row_count()).is_none());
    }

    #[test]
    fn test_collapsed_subsystem_survives_refresh() {
        let mut view = view(ScriptedRunner::new());
        view.refresh();

        let containers = row_index(&view, "Containers");
        assert!(view.toggle_expanded(containers));
        view.refresh();
        assert!(!view.row(row_index(&view, "Containers")).unwrap().expanded);

        view.set_preserve_expanded(false);
        view.refresh();
        assert!(view.row(row_index(&view, "Containers")).unwrap().expanded);
    }

    #[test]
    fn test_begin_refresh_clears_bridge_flag() {
        let runner =
            ScriptedRunner::new().respond("host-spawn podman ps -a --format json", 0, "[]", "");
        let mut view = view(runner);
        let report = view.refresh();
        assert!(view.bridge_used());

        view.begin_refresh();
        assert!(view.loading());
        assert!(!view.bridge_used());
        view.apply(&report);
        assert!(!view.loading());
    }
}
