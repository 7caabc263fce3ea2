//! Reachability over parts.
//!
//! One trace runs per root (entry or dynamic-import target). A trace
//! includes units through their static import edges and seeds the parts of
//! each included unit that have side effects; marking a part then pulls in
//! its intra-unit dependencies, the declarations of every symbol it
//! references (through the binder's links) and, for namespace objects, the
//! whole export surface. The union of all traces is the live set; which
//! traces reached a part is its owner set.

use knit_graph::{
    ImportKind, ImportTarget, ModuleGraph, Part, PartId, PartKind, SymbolRef, UnitId,
};

use super::binder::Surfaces;
use super::symbols::SymbolTable;

/// Dense numbering of every part in the graph.
#[derive(Debug, Clone)]
pub struct PartIndex {
    offsets: Vec<usize>,
    len: usize,
}

impl PartIndex {
    pub fn new(graph: &ModuleGraph) -> Self {
        let mut offsets = Vec::with_capacity(graph.len());
        let mut len = 0;
        for unit in graph.unit_ids() {
            offsets.push(len);
            len += graph.unit(unit).parts.len();
        }
        Self { offsets, len }
    }

    pub fn flat(&self, unit: UnitId, part: PartId) -> usize {
        self.offsets[unit.index()] + part.index()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Parts reached from one root.
#[derive(Debug, Clone)]
pub(crate) struct Trace {
    pub(crate) parts: Vec<bool>,
    /// Units loaded through `import()` while splitting, in discovery order.
    pub(crate) dynamic: Vec<UnitId>,
}

pub(crate) struct Shaker<'a> {
    pub(crate) graph: &'a ModuleGraph,
    pub(crate) table: &'a SymbolTable,
    pub(crate) surfaces: &'a Surfaces,
    pub(crate) index: &'a PartIndex,
    pub(crate) tree_shaking: bool,
    pub(crate) splitting: bool,
}

struct TraceState {
    root: UnitId,
    parts: Vec<bool>,
    included: Vec<bool>,
    pending_units: Vec<UnitId>,
    pending_parts: Vec<(UnitId, PartId)>,
    dynamic: Vec<UnitId>,
}

impl Shaker<'_> {
    pub(crate) fn trace(&self, root: UnitId) -> Trace {
        let mut state = TraceState {
            root,
            parts: vec![false; self.index.len()],
            included: vec![false; self.graph.len()],
            pending_units: Vec::new(),
            pending_parts: Vec::new(),
            dynamic: Vec::new(),
        };

        self.include_unit(root, &mut state);
        // a root keeps its whole export surface
        for &symbol in self.surfaces[root.index()].values() {
            self.mark_symbol(symbol, &mut state);
        }

        loop {
            if let Some(unit) = state.pending_units.pop() {
                self.seed_unit(unit, &mut state);
            } else if let Some((unit, part)) = state.pending_parts.pop() {
                self.process(unit, part, &mut state);
            } else {
                break;
            }
        }

        Trace {
            parts: state.parts,
            dynamic: state.dynamic,
        }
    }

    fn include_unit(&self, unit: UnitId, state: &mut TraceState) {
        if !std::mem::replace(&mut state.included[unit.index()], true) {
            state.pending_units.push(unit);
        }
    }

    fn seed_unit(&self, unit: UnitId, state: &mut TraceState) {
        let source = self.graph.unit(unit);
        // a root runs because it was asked for, whatever its package says
        let side_effect_free = unit != state.root && self.graph.is_side_effect_free(unit);

        for (part_id, part) in source.part_ids().zip(&source.parts) {
            if part.kind == PartKind::Namespace {
                continue;
            }
            let keep = if self.tree_shaking {
                (!part.can_be_removed_if_unused && !side_effect_free)
                    || self.loads_external(unit, part)
            } else {
                true
            };
            if keep {
                self.mark_part(unit, part_id, state);
            }
        }

        for (_, record, target) in self.graph.edges(unit) {
            if !record.kind.is_static() {
                continue;
            }
            if let ImportTarget::Unit(to) = target
                && (!self.tree_shaking || !self.graph.is_side_effect_free(*to))
            {
                self.include_unit(*to, state);
            }
        }
    }

    /// Bare `import "ext"` and `export * from "ext"` run or expose code the
    /// bundle cannot see, so they stay whether or not anything is used.
    fn loads_external(&self, unit: UnitId, part: &Part) -> bool {
        let source = self.graph.unit(unit);
        part.records.iter().any(|&record| {
            matches!(self.graph.target(unit, record), ImportTarget::External(_))
                && (source.import_records[record].kind == ImportKind::SideEffect
                    || source.star_exports.contains(&record))
        })
    }

    fn mark_part(&self, unit: UnitId, part: PartId, state: &mut TraceState) {
        let flat = self.index.flat(unit, part);
        if !std::mem::replace(&mut state.parts[flat], true) {
            state.pending_parts.push((unit, part));
            self.include_unit(unit, state);
        }
    }

    fn mark_symbol(&self, symbol: SymbolRef, state: &mut TraceState) {
        let canonical = self.table.canonical(symbol);
        let declared_by = &self.graph.unit(canonical.unit).symbol(canonical.symbol).declared_by;
        for &part in declared_by {
            self.mark_part(canonical.unit, part, state);
        }
    }

    fn process(&self, unit: UnitId, part_id: PartId, state: &mut TraceState) {
        let source = self.graph.unit(unit);
        let part = source.part(part_id);

        for &dep in &part.deps {
            self.mark_part(unit, dep, state);
        }
        for &symbol in &part.referenced {
            self.mark_symbol(SymbolRef::new(unit, symbol), state);
        }
        if part.kind == PartKind::Namespace {
            for &symbol in self.surfaces[unit.index()].values() {
                self.mark_symbol(symbol, state);
            }
        }

        for &record in &part.records {
            if source.import_records[record].kind != ImportKind::Dynamic {
                continue;
            }
            let ImportTarget::Unit(to) = self.graph.target(unit, record) else {
                continue;
            };
            if self.splitting {
                if !state.dynamic.contains(to) {
                    state.dynamic.push(*to);
                }
            } else {
                // inlined: the import resolves to the target's namespace
                let namespace = self.graph.unit(*to).namespace_symbol;
                self.mark_symbol(SymbolRef::new(*to, namespace), state);
            }
        }
    }
}
