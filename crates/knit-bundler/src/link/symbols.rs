//! Build-wide symbol table with union-find links.
//!
//! Every unit's local symbols are laid out in one flat arena; a
//! [`SymbolRef`] maps to `offsets[unit] + symbol`. Binding an import links
//! its slot to the slot of the declaration it resolves to. After binding,
//! [`SymbolTable::compress`] points every slot straight at its root so the
//! renderer can read canonical symbols without mutation.

use knit_graph::{LocalSymbolId, ModuleGraph, SymbolRef};

#[derive(Debug, Clone)]
pub struct SymbolTable {
    offsets: Vec<u32>,
    /// Slot -> parent slot; roots point at themselves.
    parents: Vec<u32>,
    /// Slot -> owning symbol, for turning slots back into refs.
    refs: Vec<SymbolRef>,
}

impl SymbolTable {
    pub fn new(graph: &ModuleGraph) -> Self {
        let mut offsets = Vec::with_capacity(graph.len());
        let mut refs = Vec::new();
        for unit in graph.unit_ids() {
            offsets.push(refs.len() as u32);
            let count = graph.unit(unit).symbols.len() as u32;
            refs.extend((0..count).map(|i| SymbolRef::new(unit, LocalSymbolId(i))));
        }
        let parents = (0..refs.len() as u32).collect();
        Self {
            offsets,
            parents,
            refs,
        }
    }

    fn slot(&self, symbol: SymbolRef) -> u32 {
        self.offsets[symbol.unit.index()] + symbol.symbol.0
    }

    fn root(&mut self, slot: u32) -> u32 {
        let mut root = slot;
        while self.parents[root as usize] != root {
            root = self.parents[root as usize];
        }
        // path compression
        let mut current = slot;
        while self.parents[current as usize] != root {
            let next = self.parents[current as usize];
            self.parents[current as usize] = root;
            current = next;
        }
        root
    }

    /// Make `from` an alias of `to`. Linking a symbol to itself (directly or
    /// through existing links) is a no-op, so no cycle can form.
    pub fn link(&mut self, from: SymbolRef, to: SymbolRef) {
        let from = self.root(self.slot(from));
        let to = self.root(self.slot(to));
        if from != to {
            self.parents[from as usize] = to;
        }
    }

    pub fn find(&mut self, symbol: SymbolRef) -> SymbolRef {
        let root = self.root(self.slot(symbol));
        self.refs[root as usize]
    }

    /// Point every slot directly at its root.
    pub fn compress(&mut self) {
        for slot in 0..self.parents.len() as u32 {
            self.root(slot);
        }
    }

    /// Canonical declaration of `symbol`. Exact after [`Self::compress`].
    pub fn canonical(&self, symbol: SymbolRef) -> SymbolRef {
        let mut slot = self.slot(symbol);
        while self.parents[slot as usize] != slot {
            slot = self.parents[slot as usize];
        }
        self.refs[slot as usize]
    }

    pub fn is_canonical(&self, symbol: SymbolRef) -> bool {
        self.canonical(symbol) == symbol
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}
