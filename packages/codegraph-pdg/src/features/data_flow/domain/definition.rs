//! Definitions, uses and the data dependences derived from them

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::features::flow_graph::domain::{ControlFlowGraph, NodeId};
use crate::features::syntax::domain::Variable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DefId(pub u32);

impl DefId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A static write: `(node, variable, strength)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    pub id: DefId,
    pub node: NodeId,
    pub var: Variable,
    pub strong: bool,
}

/// Every static definition of a procedure, numbered in node order
#[derive(Debug, Clone, Default)]
pub struct DefinitionTable {
    defs: Vec<Definition>,
    by_var: HashMap<Variable, Vec<DefId>>,
}

impl DefinitionTable {
    pub fn from_cfg(cfg: &ControlFlowGraph) -> Self {
        let mut table = Self {
            defs: Vec::new(),
            by_var: HashMap::new(),
        };
        for node in cfg.nodes() {
            for def in &node.defs {
                let id = DefId(table.defs.len() as u32);
                table.defs.push(Definition {
                    id,
                    node: node.id,
                    var: def.var.clone(),
                    strong: def.strong,
                });
                table.by_var.entry(def.var.clone()).or_default().push(id);
            }
        }
        table
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn get(&self, id: DefId) -> &Definition {
        &self.defs[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Definition> {
        self.defs.iter()
    }

    pub fn of_var(&self, var: &Variable) -> &[DefId] {
        self.by_var.get(var).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// `to` reads `variable` as written at `from`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataDependenceEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub variable: String,
    /// Derived by the name-based fallback for an unresolved use
    pub approximate: bool,
}
