//! Terminal rendering of the visible rows

use auditor_core::{AuditorView, RowView};
use std::fmt::Write;

const INDENT: &str = "  ";

fn marker(row: &RowView<'_>) -> &'static str {
    match (row.has_children, row.expanded) {
        (true, true) => "▾ ",
        (true, false) => "▸ ",
        (false, _) => "  ",
    }
}

fn label(row: &RowView<'_>) -> String {
    format!("{}{}{}", INDENT.repeat(row.depth), marker(row), row.name)
}

/// Indented tree with a status column, optionally followed by each row's details
pub fn render_rows<'a>(rows: impl Iterator<Item = RowView<'a>>, show_details: bool) -> String {
    let rows: Vec<(String, RowView<'a>)> = rows.map(|row| (label(&row), row)).collect();
    let width = rows.iter().map(|(label, _)| label.chars().count()).max().unwrap_or(0);

    let mut out = String::new();
    for (label, row) in &rows {
        let pad = width - label.chars().count();
        let line = format!("{}{}  {}", label, " ".repeat(pad), row.status);
        let _ = writeln!(out, "{}", line.trim_end());
        if show_details && !row.details.is_empty() {
            let prefix = format!("{}│ ", INDENT.repeat(row.depth + 2));
            for line in row.details.lines() {
                let _ = writeln!(out, "{}{}", prefix, line);
            }
        }
    }
    out
}

/// Full report: tree, errors and host bridge notice
pub fn render_view(view: &AuditorView, show_details: bool) -> String {
    let mut out = render_rows(view.rows(), show_details);

    if !view.errors().is_empty() {
        let _ = writeln!(out, "\nErrors ({}):", view.errors().len());
        for error in view.errors() {
            let _ = writeln!(out, "  - {}", error);
        }
    }

    if view.bridge_used() {
        let _ = writeln!(
            out,
            "\nSome commands ran on the host through a bridge (host-spawn / flatpak-spawn)."
        );
    }
    out
}
