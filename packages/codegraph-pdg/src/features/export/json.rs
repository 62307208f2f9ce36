use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{is_visible, node_text};
use crate::config::ExportConfig;
use crate::features::flow_graph::domain::{NodeId, NodeKind};
use crate::features::pdg::{DependencyType, ProgramDependenceGraph};
use crate::shared::models::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonNode {
    pub id: NodeId,
    pub label: String,
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub reachable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub kind: DependencyType,
    pub label: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub approximate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonPdg {
    pub procedure: String,
    pub nodes: Vec<JsonNode>,
    pub edges: Vec<JsonEdge>,
}

fn default_true() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

impl JsonPdg {
    pub fn from_pdg(pdg: &ProgramDependenceGraph, options: &ExportConfig) -> Self {
        let mut visible: HashSet<NodeId> = HashSet::new();
        let nodes = pdg
            .nodes()
            .filter(|node| is_visible(node, options))
            .map(|node| {
                visible.insert(node.node_id);
                JsonNode {
                    id: node.node_id,
                    label: node_text(node, options.show_line_numbers),
                    kind: node.kind,
                    line: (!node.span.is_zero()).then_some(node.span.start_line),
                    reachable: node.reachable,
                }
            })
            .collect();

        let edges = pdg
            .edges()
            .filter(|e| visible.contains(&e.from_node) && visible.contains(&e.to_node))
            .map(|e| JsonEdge {
                from: e.from_node,
                to: e.to_node,
                kind: e.dependency_type,
                label: e.label.clone(),
                approximate: e.approximate,
            })
            .collect();

        Self {
            procedure: pdg.procedure_id.clone(),
            nodes,
            edges,
        }
    }
}

/// Pretty-printed JSON document for one procedure
pub fn to_json(pdg: &ProgramDependenceGraph, options: &ExportConfig) -> Result<String> {
    let mut json = serde_json::to_string_pretty(&JsonPdg::from_pdg(pdg, options))?;
    json.push('\n');
    Ok(json)
}
