//! The module graph produced by a scan.
//!
//! Nodes are source units addressed by dense [`UnitId`]s in first-discovered
//! order; edges are the units' import records, each resolved to an
//! [`ImportTarget`]. The graph is immutable once the scanner returns it and
//! is owned by exactly one build.

mod traversal;

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::module_id::ModuleId;
use crate::unit::{ImportRecord, LocalSymbolId, SourceUnit};

/// Dense index of a unit in the graph, assigned in discovery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub u32);

impl UnitId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Build-wide handle of a symbol: the owning unit plus its local index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolRef {
    pub unit: UnitId,
    pub symbol: LocalSymbolId,
}

impl SymbolRef {
    pub fn new(unit: UnitId, symbol: LocalSymbolId) -> Self {
        Self { unit, symbol }
    }
}

/// Where one import record points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportTarget {
    Unit(UnitId),
    /// Left as an import of this path in the output.
    External(String),
    /// Failed to resolve inside a dead branch; never followed.
    Unresolved,
}

impl ImportTarget {
    pub fn unit(&self) -> Option<UnitId> {
        match self {
            Self::Unit(id) => Some(*id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModuleNode {
    pub unit: Arc<SourceUnit>,
    /// One target per entry in `unit.import_records`.
    pub targets: Vec<ImportTarget>,
    /// `Some(false)` when the resolver asserted the unit side-effect free.
    pub side_effects: Option<bool>,
    pub is_entry: bool,
    /// Importer through which the unit was first discovered.
    pub parent: Option<UnitId>,
}

#[derive(Debug, Clone, Default)]
pub struct ModuleGraph {
    nodes: Vec<ModuleNode>,
    entries: Vec<UnitId>,
    index: FxHashMap<ModuleId, UnitId>,
}

impl ModuleGraph {
    /// Assemble a graph. `nodes` must be in discovery order and every
    /// [`ImportTarget::Unit`] must point inside it.
    pub(crate) fn from_nodes(nodes: Vec<ModuleNode>, entries: Vec<UnitId>) -> Self {
        let index = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.unit.id.clone(), UnitId(i as u32)))
            .collect();
        Self {
            nodes,
            entries,
            index,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn unit(&self, id: UnitId) -> &SourceUnit {
        &self.nodes[id.index()].unit
    }

    pub fn node(&self, id: UnitId) -> &ModuleNode {
        &self.nodes[id.index()]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (UnitId, &ModuleNode)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (UnitId(i as u32), node))
    }

    pub fn unit_ids(&self) -> impl Iterator<Item = UnitId> + '_ {
        (0..self.nodes.len() as u32).map(UnitId)
    }

    /// Entry units in the order the entry points were given. An entry listed
    /// twice appears twice.
    pub fn entries(&self) -> &[UnitId] {
        &self.entries
    }

    pub fn lookup(&self, id: &ModuleId) -> Option<UnitId> {
        self.index.get(id).copied()
    }

    pub fn target(&self, unit: UnitId, record: usize) -> &ImportTarget {
        &self.nodes[unit.index()].targets[record]
    }

    /// Outgoing edges of a unit in source order.
    pub fn edges(
        &self,
        unit: UnitId,
    ) -> impl Iterator<Item = (usize, &ImportRecord, &ImportTarget)> + '_ {
        let node = &self.nodes[unit.index()];
        node.unit
            .import_records
            .iter()
            .zip(node.targets.iter())
            .enumerate()
            .map(|(i, (record, target))| (i, record, target))
    }

    /// Units with at least one edge into `unit`, in discovery order.
    pub fn importers(&self, unit: UnitId) -> Vec<UnitId> {
        self.unit_ids()
            .filter(|&from| {
                self.nodes[from.index()]
                    .targets
                    .iter()
                    .any(|target| target.unit() == Some(unit))
            })
            .collect()
    }

    /// The resolver asserted the unit has no side effects.
    pub fn is_side_effect_free(&self, unit: UnitId) -> bool {
        self.nodes[unit.index()].side_effects == Some(false)
    }
}
