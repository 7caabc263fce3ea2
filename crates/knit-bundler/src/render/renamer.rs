//! Final names for the symbols of one chunk.
//!
//! Merging units into one scope can make two top-level names collide, or
//! make a nested binding in one unit capture a reference that used to
//! point at another unit's top-level symbol. Names are handed out in
//! discovery order; a name is taken only when it is free in the chunk, is
//! not a global some member unit reads, and cannot be captured in any unit
//! that refers to the symbol. Otherwise `$1`, `$2`, … is appended.

use knit_graph::{ModuleGraph, PartKind, SymbolRef, UnitId};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::chunk::Chunk;
use crate::link::LinkOutput;

const RESERVED: &[&str] = &[
    "arguments", "await", "break", "case", "catch", "class", "const", "continue", "debugger",
    "default", "delete", "do", "else", "enum", "eval", "export", "extends", "false", "finally",
    "for", "function", "if", "implements", "import", "in", "instanceof", "interface", "let",
    "new", "null", "package", "private", "protected", "public", "return", "static", "super",
    "switch", "this", "throw", "true", "try", "typeof", "undefined", "var", "void", "while",
    "with", "yield", "Infinity", "NaN",
];

/// Names the output wrappers themselves rely on.
const FORMAT_RESERVED: &[&str] = &["exports", "module", "require", "Object", "Promise"];

pub(crate) type Names = FxHashMap<SymbolRef, String>;

pub(crate) struct Renamer<'a> {
    graph: &'a ModuleGraph,
    linked: &'a LinkOutput,
    globals: FxHashSet<&'a str>,
    /// Canonical symbol -> units that mention it, with their local name.
    references: FxHashMap<SymbolRef, Vec<(UnitId, &'a str)>>,
    used: FxHashSet<String>,
    names: Names,
}

impl<'a> Renamer<'a> {
    pub(crate) fn new(graph: &'a ModuleGraph, linked: &'a LinkOutput) -> Self {
        Self {
            graph,
            linked,
            globals: FxHashSet::default(),
            references: FxHashMap::default(),
            used: FxHashSet::default(),
            names: FxHashMap::default(),
        }
    }

    /// Name every symbol the chunk declares, imports or exports.
    pub(crate) fn assign(mut self, chunk: &Chunk) -> Names {
        let graph = self.graph;
        let linked = self.linked;
        for &unit in &chunk.units {
            self.globals
                .extend(graph.unit(unit).globals.iter().map(String::as_str));
        }
        for &(unit, part) in &chunk.parts {
            let source = graph.unit(unit);
            for occurrence in &source.part(part).occurrences {
                let local = &source.symbol(occurrence.symbol).name;
                let canonical = linked.canonical(SymbolRef::new(unit, occurrence.symbol));
                let refs = self.references.entry(canonical).or_default();
                if !refs.iter().any(|(u, name)| *u == unit && *name == local.as_str()) {
                    refs.push((unit, local.as_str()));
                }
            }
        }

        // parts arrive in execution order; names go to units in the order
        // they were discovered, namespace objects first within each unit
        let mut ordered = chunk.parts.clone();
        ordered.sort_by_key(|&(unit, part)| {
            let namespace = graph.unit(unit).part(part).kind == PartKind::Namespace;
            (unit, !namespace, part)
        });

        for &(unit, part_id) in &ordered {
            let source = graph.unit(unit);
            let part = source.part(part_id);
            let reexport = matches!(part.kind, PartKind::Import | PartKind::ReExport);
            for &symbol in &part.declared {
                let symbol = SymbolRef::new(unit, symbol);
                let canonical = linked.canonical(symbol);
                // bindings resolved elsewhere are named where they are used
                if !reexport || canonical == symbol {
                    self.name(canonical);
                }
            }
        }
        for &(unit, part_id) in &ordered {
            let part = graph.unit(unit).part(part_id);
            for occurrence in &part.occurrences {
                self.name(linked.canonical(SymbolRef::new(unit, occurrence.symbol)));
            }
            if part.kind == PartKind::Namespace {
                for &symbol in linked.surfaces[unit.index()].values() {
                    self.name(symbol);
                }
            }
        }

        for import in &chunk.imports {
            for &symbol in &import.symbols {
                self.name(symbol);
            }
        }
        for &symbol in &chunk.exports {
            self.name(symbol);
        }
        if let Some(root) = chunk.root {
            let unit = linked.roots[root].unit;
            for &symbol in linked.surfaces[unit.index()].values() {
                self.name(symbol);
            }
        }

        self.names
    }

    fn name(&mut self, symbol: SymbolRef) {
        if self.names.contains_key(&symbol) {
            return;
        }
        let base = &self.graph.unit(symbol.unit).symbol(symbol.symbol).name;
        let mut candidate = base.clone();
        let mut suffix = 1;
        while !self.acceptable(&candidate, symbol) {
            candidate = format!("{base}${suffix}");
            suffix += 1;
        }
        self.used.insert(candidate.clone());
        self.names.insert(symbol, candidate);
    }

    fn acceptable(&self, candidate: &str, symbol: SymbolRef) -> bool {
        if RESERVED.contains(&candidate)
            || FORMAT_RESERVED.contains(&candidate)
            || self.globals.contains(candidate)
            || self.used.contains(candidate)
        {
            return false;
        }
        // a nested binding of the same name would capture the reference,
        // unless the unit already used that name at top level
        self.references.get(&symbol).is_none_or(|refs| {
            refs.iter().all(|(unit, local)| {
                *local == candidate || !self.graph.unit(*unit).nested_names.contains(candidate)
            })
        })
    }
}
