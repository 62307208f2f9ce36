//! Custom assertions for PDG verification

use codegraph_pdg::features::flow_graph::NodeId;
use codegraph_pdg::features::pdg::{DependencyType, PDGEdge, ProgramDependenceGraph};

/// Id of the first node whose label is exactly `label`
pub fn node_id(pdg: &ProgramDependenceGraph, label: &str) -> NodeId {
    pdg.nodes()
        .find(|n| n.label == label)
        .map(|n| n.node_id)
        .unwrap_or_else(|| {
            panic!(
                "no node labeled {:?}; labels: {:?}",
                label,
                pdg.nodes().map(|n| n.label.as_str()).collect::<Vec<_>>()
            )
        })
}

pub fn data_edges(pdg: &ProgramDependenceGraph) -> Vec<&PDGEdge> {
    pdg.edges()
        .filter(|e| e.dependency_type == DependencyType::Data)
        .collect()
}

pub fn control_edges(pdg: &ProgramDependenceGraph) -> Vec<&PDGEdge> {
    pdg.edges()
        .filter(|e| e.dependency_type == DependencyType::Control)
        .collect()
}

/// Labels of the nodes feeding `variable` into the node labeled `to`
pub fn data_sources(pdg: &ProgramDependenceGraph, to: &str, variable: &str) -> Vec<String> {
    let target = node_id(pdg, to);
    let mut sources: Vec<String> = data_edges(pdg)
        .into_iter()
        .filter(|e| e.to_node == target && e.label == variable)
        .filter_map(|e| pdg.get_node(e.from_node).map(|n| n.label.clone()))
        .collect();
    sources.sort();
    sources
}

/// Assert a data edge `from -variable-> to` exists
pub fn assert_data_edge(pdg: &ProgramDependenceGraph, from: &str, to: &str, variable: &str) {
    let (from_id, to_id) = (node_id(pdg, from), node_id(pdg, to));
    assert!(
        data_edges(pdg)
            .iter()
            .any(|e| e.from_node == from_id && e.to_node == to_id && e.label == variable),
        "expected data edge {:?} -{}-> {:?}, edges: {:?}",
        from,
        variable,
        to,
        data_edges(pdg)
    );
}

/// Assert a control edge `from -label-> to` exists
pub fn assert_control_edge(pdg: &ProgramDependenceGraph, from: &str, to: &str, label: &str) {
    let (from_id, to_id) = (node_id(pdg, from), node_id(pdg, to));
    assert!(
        control_edges(pdg)
            .iter()
            .any(|e| e.from_node == from_id && e.to_node == to_id && e.label == label),
        "expected control edge {:?} -{}-> {:?}, edges: {:?}",
        from,
        label,
        to,
        control_edges(pdg)
    );
}
