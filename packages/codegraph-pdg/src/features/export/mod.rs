//! PDG exporters (DOT, JSON)
//!
//! Both exporters walk nodes in creation order and edges in derivation
//! order, so identical input gives byte-identical output.

pub mod dot;
pub mod json;

pub use dot::to_dot;
pub use json::{to_json, JsonEdge, JsonNode, JsonPdg};

use crate::config::{ExportConfig, ExportFormat};
use crate::features::pdg::{PDGNode, ProgramDependenceGraph};
use crate::shared::models::Result;

/// Render in the configured format
pub fn export(pdg: &ProgramDependenceGraph, options: &ExportConfig) -> Result<String> {
    match options.format {
        ExportFormat::Dot => Ok(to_dot(pdg, options)),
        ExportFormat::Json => to_json(pdg, options),
    }
}

/// Node text as shown to users: `"<line>: <label>"` for statements
pub fn node_text(node: &PDGNode, show_line_numbers: bool) -> String {
    if show_line_numbers && !node.is_entry() && !node.is_exit() && !node.span.is_zero() {
        format!("{}: {}", node.span.start_line, node.label)
    } else {
        node.label.clone()
    }
}

pub(crate) fn is_visible(node: &PDGNode, options: &ExportConfig) -> bool {
    options.include_unreachable || node.reachable
}
