use std::collections::HashSet;
use std::fmt::Write;

use super::{is_visible, node_text};
use crate::config::ExportConfig;
use crate::features::flow_graph::domain::NodeId;
use crate::features::pdg::{DependencyType, ProgramDependenceGraph};

const UNCONDITIONAL: &str = "unconditional";

/// Export to DOT format for visualization
pub fn to_dot(pdg: &ProgramDependenceGraph, options: &ExportConfig) -> String {
    let mut dot = String::from("digraph PDG {\n");
    let _ = writeln!(dot, "  // {}", escape(&pdg.procedure_id));
    dot.push_str("  // ENTRY and EXIT nodes are included\n");
    dot.push_str("  rankdir=TB;\n");
    dot.push_str("  node [shape=box];\n\n");

    let mut visible: HashSet<NodeId> = HashSet::new();
    for node in pdg.nodes() {
        if !is_visible(node, options) {
            continue;
        }
        visible.insert(node.node_id);

        let label = escape(&node_text(node, options.show_line_numbers));
        if node.reachable {
            let _ = writeln!(dot, "  node{} [label=\"{}\"];", node.node_id, label);
        } else {
            let _ = writeln!(
                dot,
                "  node{} [label=\"{}\", style=dashed, color=gray];",
                node.node_id, label
            );
        }
    }
    dot.push('\n');

    for edge in pdg.edges() {
        if !visible.contains(&edge.from_node) || !visible.contains(&edge.to_node) {
            continue;
        }

        let mut attrs = Vec::with_capacity(3);
        match edge.dependency_type {
            DependencyType::Control => {
                if edge.label != UNCONDITIONAL {
                    attrs.push(format!("label=\"{}\"", escape(&edge.label)));
                }
                attrs.push("color=blue".to_string());
            }
            DependencyType::Data => {
                attrs.push(format!("label=\"data: {}\"", escape(&edge.label)));
                attrs.push("color=red".to_string());
                attrs.push(if edge.approximate { "style=dotted" } else { "style=dashed" }.to_string());
            }
        }
        let _ = writeln!(
            dot,
            "  node{} -> node{} [{}];",
            edge.from_node,
            edge.to_node,
            attrs.join(", ")
        );
    }

    dot.push_str("}\n");
    dot
}

/// Escape a string for use inside a double-quoted DOT ID
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::flow_graph::domain::NodeKind;
    use crate::features::pdg::{PDGEdge, PDGNode};
    use crate::shared::models::Span;
    use pretty_assertions::assert_eq;

    fn sample() -> ProgramDependenceGraph {
        let mut pdg = ProgramDependenceGraph::new("Demo.run()");
        pdg.add_node(PDGNode::new(NodeId(0), "ENTRY: run()", NodeKind::Entry, Span::zero()));
        pdg.add_node(PDGNode::new(NodeId(1), "EXIT: run()", NodeKind::Exit, Span::zero()));
        pdg.add_node(PDGNode::new(NodeId(2), "x = \"a\";", NodeKind::Assignment, Span::line(3)));
        pdg.add_node(PDGNode::new(NodeId(3), "if (x != null)", NodeKind::Condition, Span::line(4)));
        pdg.add_edge(PDGEdge::control(NodeId(0), NodeId(2), "unconditional"));
        pdg.add_edge(PDGEdge::control(NodeId(0), NodeId(3), "unconditional"));
        pdg.add_edge(PDGEdge::data(NodeId(2), NodeId(3), "x", false));
        pdg
    }

    #[test]
    fn test_dot_layout() {
        let dot = to_dot(&sample(), &ExportConfig::default());
        let expected = r#"digraph PDG {
  // Demo.run()
  // ENTRY and EXIT nodes are included
  rankdir=TB;
  node [shape=box];

  node0 [label="ENTRY: run()"];
  node1 [label="EXIT: run()"];
  node2 [label="3: x = \"a\";"];
  node3 [label="4: if (x != null)"];

  node0 -> node2 [color=blue];
  node0 -> node3 [color=blue];
  node2 -> node3 [label="data: x", color=red, style=dashed];
}
"#;
        assert_eq!(dot, expected);
    }

    #[test]
    fn test_approximate_edge_dotted() {
        let mut pdg = sample();
        pdg.add_edge(PDGEdge::data(NodeId(0), NodeId(3), "y", true));
        let dot = to_dot(&pdg, &ExportConfig::default());
        assert!(dot.contains("node0 -> node3 [label=\"data: y\", color=red, style=dotted];"));
    }

    #[test]
    fn test_unreachable_nodes_hidden_on_request() {
        let mut pdg = sample();
        let mut dead = PDGNode::new(NodeId(4), "y = 2;", NodeKind::Assignment, Span::line(6));
        dead.reachable = false;
        pdg.add_node(dead);

        let shown = to_dot(&pdg, &ExportConfig::default());
        assert!(shown.contains("node4 [label=\"6: y = 2;\", style=dashed, color=gray];"));

        let hidden = to_dot(&pdg, &ExportConfig::default().include_unreachable(false));
        assert!(!hidden.contains("node4"));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape(r#"say("hi\n")"#), r#"say(\"hi\\n\")"#);
    }
}
