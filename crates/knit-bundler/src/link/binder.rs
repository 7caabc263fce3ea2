//! Binding imports to the declarations they refer to.
//!
//! Every import-kind symbol (plain imports and `export … from` aliases) is
//! resolved against the export surface of the unit its record points at,
//! following re-export chains until a real declaration is reached. The
//! symbol is then linked to that declaration in the [`SymbolTable`].
//!
//! Explicit hops are followed in a loop; only `export *` fan-out recurses.
//! A `(unit, name)` pair seen twice on one path is a cycle: through explicit
//! re-exports it is an error, through `export *` it just contributes
//! nothing.
//!
//! Answers are memoized per `(unit, name)` unless they depended on a hop
//! above them on the current path, so barrel diamonds resolve in linear
//! time.

use std::cell::{Cell, RefCell};

use indexmap::{IndexMap, IndexSet};
use knit_graph::{
    Diagnostic, DiagnosticContext, DiagnosticKind, ImportName, ImportTarget, LocalSymbolId,
    ModuleGraph, SymbolRef, UnitId,
};
use rustc_hash::{FxHashMap, FxHashSet};

use super::symbols::SymbolTable;

/// Outcome of looking a name up on a unit's export surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Resolved {
    Symbol(SymbolRef),
    Missing,
    /// Two `export *` sources provide different declarations.
    Ambiguous(Vec<SymbolRef>),
    /// Explicit re-exports loop back on themselves.
    Cycle(Vec<(UnitId, String)>),
}

/// One hop on the current resolution path.
struct Hop {
    unit: UnitId,
    name: String,
    via_star: bool,
}

/// Exported names of every unit mapped to canonical symbols.
pub type Surfaces = Vec<IndexMap<String, SymbolRef>>;

pub(crate) struct Binder<'g> {
    graph: &'g ModuleGraph,
    diagnostics: Vec<Diagnostic>,
    /// Sorted members of cycles already reported.
    reported_cycles: FxHashSet<Vec<(UnitId, String)>>,
    resolved: RefCell<FxHashMap<(UnitId, String), Resolved>>,
    /// Lowest path position a cycle check has hit in the current lookup.
    cycle_floor: Cell<usize>,
}

impl<'g> Binder<'g> {
    pub(crate) fn new(graph: &'g ModuleGraph) -> Self {
        Self {
            graph,
            diagnostics: Vec::new(),
            reported_cycles: FxHashSet::default(),
            resolved: RefCell::new(FxHashMap::default()),
            cycle_floor: Cell::new(usize::MAX),
        }
    }

    /// Link every import in the graph and compute export surfaces.
    pub(crate) fn bind(mut self) -> (SymbolTable, Surfaces, Vec<Diagnostic>) {
        let graph = self.graph;
        let mut table = SymbolTable::new(graph);

        for unit in graph.unit_ids() {
            let source = graph.unit(unit);
            for (index, symbol) in source.symbols.iter().enumerate() {
                let Some(binding) = &symbol.import else {
                    continue;
                };
                let ImportTarget::Unit(target) = graph.target(unit, binding.record) else {
                    // externals and dead imports stay bound to themselves
                    continue;
                };
                let from = SymbolRef::new(unit, LocalSymbolId(index as u32));
                let name = match &binding.imported {
                    ImportName::Namespace => {
                        let namespace = graph.unit(*target).namespace_symbol;
                        table.link(from, SymbolRef::new(*target, namespace));
                        continue;
                    }
                    ImportName::Named(name) => name,
                };

                match self.resolve(*target, name) {
                    Resolved::Symbol(to) => table.link(from, to),
                    Resolved::Missing => self.missing(unit, binding.record, *target, name),
                    Resolved::Ambiguous(candidates) => {
                        self.ambiguous(unit, binding.record, name, &candidates)
                    }
                    Resolved::Cycle(chain) => self.cycle(unit, binding.record, name, chain),
                }
            }
        }
        table.compress();

        let surfaces = graph
            .unit_ids()
            .map(|unit| self.surface(unit, &table))
            .collect();
        (table, surfaces, self.diagnostics)
    }

    /// Resolve `name` as exported by `unit`.
    pub(crate) fn resolve(&self, unit: UnitId, name: &str) -> Resolved {
        let mut path = Vec::new();
        self.resolve_from(unit, name, &mut path, false)
    }

    fn resolve_from(
        &self,
        unit: UnitId,
        name: &str,
        path: &mut Vec<Hop>,
        via_star: bool,
    ) -> Resolved {
        let key = (unit, name.to_string());
        if let Some(hit) = self.resolved.borrow().get(&key) {
            return hit.clone();
        }

        let depth = path.len();
        let outer_floor = self.cycle_floor.replace(usize::MAX);
        let resolved = self.follow(unit, name.to_string(), path, via_star);
        path.truncate(depth);

        let floor = self.cycle_floor.get();
        if floor >= depth {
            self.resolved.borrow_mut().insert(key, resolved.clone());
        }
        self.cycle_floor.set(outer_floor.min(floor));
        resolved
    }

    fn follow(
        &self,
        mut unit: UnitId,
        mut name: String,
        path: &mut Vec<Hop>,
        mut via_star: bool,
    ) -> Resolved {
        loop {
            if let Some(pos) = path.iter().position(|hop| hop.unit == unit && hop.name == name) {
                self.cycle_floor.set(self.cycle_floor.get().min(pos));
                let through_star = via_star || path[pos + 1..].iter().any(|hop| hop.via_star);
                if through_star {
                    return Resolved::Missing;
                }
                let mut chain: Vec<(UnitId, String)> = path[pos..]
                    .iter()
                    .map(|hop| (hop.unit, hop.name.clone()))
                    .collect();
                chain.push((unit, name));
                return Resolved::Cycle(chain);
            }
            path.push(Hop {
                unit,
                name: name.clone(),
                via_star,
            });

            let source = self.graph.unit(unit);
            if let Some(&local) = source.exports.get(&name) {
                let symbol = source.symbol(local);
                let Some(binding) = &symbol.import else {
                    return Resolved::Symbol(SymbolRef::new(unit, local));
                };
                match (self.graph.target(unit, binding.record), &binding.imported) {
                    (ImportTarget::Unit(to), ImportName::Namespace) => {
                        let namespace = self.graph.unit(*to).namespace_symbol;
                        return Resolved::Symbol(SymbolRef::new(*to, namespace));
                    }
                    (ImportTarget::Unit(to), ImportName::Named(next)) => {
                        unit = *to;
                        name = next.clone();
                        via_star = false;
                        continue;
                    }
                    _ => return Resolved::Symbol(SymbolRef::new(unit, local)),
                }
            }

            // `export *` never forwards a default export
            if name == "default" {
                return Resolved::Missing;
            }

            let mut found: Vec<SymbolRef> = Vec::new();
            for &record in &source.star_exports {
                let ImportTarget::Unit(to) = self.graph.target(unit, record) else {
                    continue;
                };
                match self.resolve_from(*to, &name, path, true) {
                    Resolved::Symbol(symbol) => push_unique(&mut found, symbol),
                    Resolved::Ambiguous(symbols) => {
                        for symbol in symbols {
                            push_unique(&mut found, symbol);
                        }
                    }
                    Resolved::Cycle(chain) => return Resolved::Cycle(chain),
                    Resolved::Missing => {}
                }
            }
            return match found.as_slice() {
                [] => Resolved::Missing,
                [symbol] => Resolved::Symbol(*symbol),
                _ => Resolved::Ambiguous(found),
            };
        }
    }

    /// Explicit exports in source order, then names reached through
    /// `export *` in first-seen order. Names that do not resolve to exactly
    /// one declaration are left out.
    fn surface(&self, unit: UnitId, table: &SymbolTable) -> IndexMap<String, SymbolRef> {
        let mut names: IndexSet<String> = self.graph.unit(unit).exports.keys().cloned().collect();

        let mut visited = vec![false; self.graph.len()];
        let mut stack = vec![unit];
        while let Some(current) = stack.pop() {
            if std::mem::replace(&mut visited[current.index()], true) {
                continue;
            }
            let source = self.graph.unit(current);
            if current != unit {
                names.extend(
                    source
                        .exports
                        .keys()
                        .filter(|name| name.as_str() != "default")
                        .cloned(),
                );
            }
            for &record in source.star_exports.iter().rev() {
                if let ImportTarget::Unit(to) = self.graph.target(current, record) {
                    stack.push(*to);
                }
            }
        }

        names
            .into_iter()
            .filter_map(|name| match self.resolve(unit, &name) {
                Resolved::Symbol(symbol) => Some((name, table.canonical(symbol))),
                _ => None,
            })
            .collect()
    }

    fn located(
        &self,
        kind: DiagnosticKind,
        message: String,
        unit: UnitId,
        record: usize,
    ) -> Diagnostic {
        let source = self.graph.unit(unit);
        let offset = source.import_records[record].source_span.0;
        let (line, column) = source.line_column(offset);
        Diagnostic::error(kind, message).at(&source.id, line, column)
    }

    fn missing(&mut self, unit: UnitId, record: usize, target: UnitId, name: &str) {
        let importer = self.graph.unit(unit).id.to_string();
        let module_id = self.graph.unit(target).id.to_string();
        let mut diagnostic = self
            .located(
                DiagnosticKind::MissingExport,
                format!("No matching export in \"{module_id}\" for import \"{name}\""),
                unit,
                record,
            )
            .with_context(DiagnosticContext::MissingExport {
                export_name: name.to_string(),
                module_id,
                importer,
            });
        if name == "default" && !self.graph.unit(target).star_exports.is_empty() {
            diagnostic = diagnostic.with_note("`export *` does not re-export default exports");
        }
        self.diagnostics.push(diagnostic);
    }

    fn ambiguous(&mut self, unit: UnitId, record: usize, name: &str, candidates: &[SymbolRef]) {
        let mut diagnostic = self.located(
            DiagnosticKind::AmbiguousExport,
            format!("Ambiguous import \"{name}\" has multiple matching exports"),
            unit,
            record,
        );
        for candidate in candidates {
            diagnostic = diagnostic.with_note(format!(
                "one match is declared in \"{}\"",
                self.graph.unit(candidate.unit).id
            ));
        }
        self.diagnostics.push(diagnostic);
    }

    fn cycle(&mut self, unit: UnitId, record: usize, name: &str, chain: Vec<(UnitId, String)>) {
        let mut members = chain.clone();
        members.sort();
        members.dedup();
        if !self.reported_cycles.insert(members) {
            return;
        }

        let cycle: Vec<(String, String)> = chain
            .into_iter()
            .map(|(unit, name)| (self.graph.unit(unit).id.to_string(), name))
            .collect();
        let rendered = cycle
            .iter()
            .map(|(module, name)| format!("\"{name}\" in {module}"))
            .collect::<Vec<_>>()
            .join(" -> ");
        let diagnostic = self
            .located(
                DiagnosticKind::CircularReexport,
                format!("Detected cycle while resolving import \"{name}\""),
                unit,
                record,
            )
            .with_note(format!("re-export chain: {rendered}"))
            .with_context(DiagnosticContext::CircularReExport { cycle });
        self.diagnostics.push(diagnostic);
    }
}

fn push_unique(found: &mut Vec<SymbolRef>, symbol: SymbolRef) {
    if !found.contains(&symbol) {
        found.push(symbol);
    }
}
