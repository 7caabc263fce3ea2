//! Linking: binding, tree shaking and ownership.
//!
//! This is the one single-threaded phase of a build. It needs the whole
//! graph at once: re-export chains cross files, and a part's owner set
//! depends on every root's trace.

mod binder;
mod shake;
mod symbols;

pub use binder::Surfaces;
pub use shake::PartIndex;
pub use symbols::SymbolTable;

use knit_graph::{Diagnostic, ModuleGraph, PartId, SymbolRef, UnitId};
use tracing::debug;

use binder::Binder;
use shake::Shaker;

/// Linker switches taken from the build options.
#[derive(Debug, Clone, Copy)]
pub struct LinkOptions {
    pub tree_shaking: bool,
    pub splitting: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootKind {
    /// Index into the build's entry points.
    Entry(usize),
    /// Target of an `import()` that gets its own chunk.
    Dynamic,
}

/// Starting point of a reachability trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Root {
    pub unit: UnitId,
    pub kind: RootKind,
}

/// Everything the chunker and renderer need from linking.
#[derive(Debug)]
pub struct LinkOutput {
    pub symbols: SymbolTable,
    pub surfaces: Surfaces,
    pub parts: PartIndex,
    /// Entries in order, then dynamic roots in discovery order.
    pub roots: Vec<Root>,
    /// Per flat part, the roots that reach it in ascending order. Empty for
    /// dead parts.
    pub owners: Vec<Vec<u32>>,
    pub exec_order: Vec<UnitId>,
}

impl LinkOutput {
    pub fn is_live(&self, unit: UnitId, part: PartId) -> bool {
        !self.owners[self.parts.flat(unit, part)].is_empty()
    }

    pub fn owners(&self, unit: UnitId, part: PartId) -> &[u32] {
        &self.owners[self.parts.flat(unit, part)]
    }

    pub fn canonical(&self, symbol: SymbolRef) -> SymbolRef {
        self.symbols.canonical(symbol)
    }

    /// Root index of the chunk a dynamic import of `unit` loads.
    pub fn root_of(&self, unit: UnitId) -> Option<usize> {
        self.roots.iter().position(|root| root.unit == unit)
    }
}

/// Bind every import, then trace each root.
///
/// Binding errors fail the link; nothing is traced for a graph whose
/// imports do not bind.
pub fn link(graph: &ModuleGraph, options: LinkOptions) -> Result<LinkOutput, Vec<Diagnostic>> {
    let (symbols, surfaces, diagnostics) = Binder::new(graph).bind();
    if diagnostics.iter().any(Diagnostic::is_error) {
        return Err(diagnostics);
    }

    let parts = PartIndex::new(graph);
    let shaker = Shaker {
        graph,
        table: &symbols,
        surfaces: &surfaces,
        index: &parts,
        tree_shaking: options.tree_shaking,
        splitting: options.splitting,
    };

    let mut roots: Vec<Root> = graph
        .entries()
        .iter()
        .enumerate()
        .map(|(index, &unit)| Root {
            unit,
            kind: RootKind::Entry(index),
        })
        .collect();
    let mut owners = vec![Vec::new(); parts.len()];

    let mut next = 0;
    while next < roots.len() {
        let root = roots[next];
        let trace = shaker.trace(root.unit);
        for (flat, reached) in trace.parts.iter().enumerate() {
            if *reached {
                owners[flat].push(next as u32);
            }
        }
        for unit in trace.dynamic {
            if !roots.iter().any(|root| root.unit == unit) {
                roots.push(Root {
                    unit,
                    kind: RootKind::Dynamic,
                });
            }
        }
        next += 1;
    }

    let live = owners.iter().filter(|owners| !owners.is_empty()).count();
    debug!(
        roots = roots.len(),
        parts = parts.len(),
        live,
        "linked module graph"
    );

    Ok(LinkOutput {
        symbols,
        surfaces,
        parts,
        roots,
        owners,
        exec_order: graph.exec_order(),
    })
}

#[cfg(test)]
mod tests {
    use knit_graph::{
        DiagnosticKind, MemoryRuntime, ModuleGraph, ModuleId, ScanInput, ScanOptions, Scanner,
        SymbolKind,
    };

    use super::*;

    fn graph(runtime: &MemoryRuntime, entries: &[&str]) -> ModuleGraph {
        let inputs: Vec<ScanInput> = entries
            .iter()
            .map(|entry| ScanInput::Path(entry.to_string()))
            .collect();
        Scanner::new(runtime, &ScanOptions::default())
            .scan(&inputs)
            .unwrap()
    }

    fn options() -> LinkOptions {
        LinkOptions {
            tree_shaking: true,
            splitting: false,
        }
    }

    fn unit(graph: &ModuleGraph, path: &str) -> UnitId {
        graph.lookup(&ModuleId::new(path).unwrap()).unwrap()
    }

    fn declared(graph: &ModuleGraph, unit: UnitId, name: &str) -> SymbolRef {
        let source = graph.unit(unit);
        let index = source
            .symbols
            .iter()
            .position(|symbol| symbol.name == name && symbol.kind != SymbolKind::Import)
            .unwrap();
        SymbolRef::new(unit, knit_graph::LocalSymbolId(index as u32))
    }

    #[test]
    fn union_find_links_terminate_at_one_root() {
        let runtime = MemoryRuntime::new("/p")
            .with_file("a.js", "export const x = 1;")
            .with_file("b.js", "export { x } from './a';")
            .with_file("c.js", "import { x } from './b'; console.log(x);");
        let graph = graph(&runtime, &["c.js"]);
        let linked = link(&graph, options()).unwrap();

        let a = unit(&graph, "/p/a.js");
        let c = unit(&graph, "/p/c.js");
        let x = declared(&graph, a, "x");
        let import = graph
            .unit(c)
            .symbols
            .iter()
            .position(|symbol| symbol.kind == SymbolKind::Import)
            .map(|index| SymbolRef::new(c, knit_graph::LocalSymbolId(index as u32)))
            .unwrap();
        assert_eq!(linked.canonical(import), x);
        assert!(linked.symbols.is_canonical(x));
    }

    #[test]
    fn star_exports_prefer_explicit_and_skip_default() {
        let runtime = MemoryRuntime::new("/p")
            .with_file("a.js", "export const x = 1; export const y = 2; export default 3;")
            .with_file("b.js", "export * from './a'; export const y = 'own';")
            .with_file("c.js", "import * as b from './b'; console.log(b);");
        let graph = graph(&runtime, &["c.js"]);
        let linked = link(&graph, options()).unwrap();

        let b = unit(&graph, "/p/b.js");
        let names: Vec<&str> = linked.surfaces[b.index()]
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(names, ["y", "x"]);
        assert_eq!(linked.surfaces[b.index()]["y"], declared(&graph, b, "y"));
    }

    #[test]
    fn conflicting_star_exports_are_excluded_or_ambiguous() {
        let runtime = MemoryRuntime::new("/p")
            .with_file("a.js", "export const x = 1;")
            .with_file("b.js", "export const x = 2;")
            .with_file("both.js", "export * from './a'; export * from './b';")
            .with_file("quiet.js", "import * as ns from './both'; console.log(ns);")
            .with_file("loud.js", "import { x } from './both'; console.log(x);");

        let quiet = graph(&runtime, &["quiet.js"]);
        let linked = link(&quiet, options()).unwrap();
        let both = unit(&quiet, "/p/both.js");
        assert!(linked.surfaces[both.index()].is_empty());

        let loud = graph(&runtime, &["loud.js"]);
        let errors = link(&loud, options()).unwrap_err();
        assert_eq!(errors[0].kind, DiagnosticKind::AmbiguousExport);
    }

    #[test]
    fn star_cycles_contribute_nothing() {
        let runtime = MemoryRuntime::new("/p")
            .with_file("a.js", "export * from './b'; export const a = 1;")
            .with_file("b.js", "export * from './a'; export const b = 2;")
            .with_file("main.js", "import { a, b } from './a'; console.log(a, b);");
        let graph = graph(&runtime, &["main.js"]);
        let linked = link(&graph, options()).unwrap();
        let a = unit(&graph, "/p/a.js");
        let names: Vec<&str> = linked.surfaces[a.index()]
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn explicit_reexport_cycle_is_reported_once() {
        let runtime = MemoryRuntime::new("/p")
            .with_file("a.js", "export { x } from './b';")
            .with_file("b.js", "export { x } from './a';")
            .with_file("main.js", "import { x } from './a'; console.log(x);");
        let graph = graph(&runtime, &["main.js"]);
        let errors = link(&graph, options()).unwrap_err();

        let cycles: Vec<_> = errors
            .iter()
            .filter(|d| d.kind == DiagnosticKind::CircularReexport)
            .collect();
        assert_eq!(cycles.len(), 1);
        assert!(cycles[0].notes[0].starts_with("re-export chain: "));
    }

    #[test]
    fn side_effect_free_units_are_not_seeded() {
        let runtime = MemoryRuntime::new("/p")
            .with_file("index.js", "import './pure'; import './effect';")
            .with_file("pure.js", "console.log('pure');")
            .with_file("effect.js", "console.log('effect');");
        runtime.set_side_effects("pure.js", false);
        let graph = graph(&runtime, &["index.js"]);
        let linked = link(&graph, options()).unwrap();

        let pure = unit(&graph, "/p/pure.js");
        let effect = unit(&graph, "/p/effect.js");
        assert!(!linked.is_live(pure, PartId(0)));
        assert!(linked.is_live(effect, PartId(0)));
    }

    #[test]
    fn dynamic_targets_become_roots_when_splitting() {
        let runtime = MemoryRuntime::new("/p")
            .with_file("index.js", "import('./lazy').then(console.log);")
            .with_file("lazy.js", "export const value = 1;");
        let graph = graph(&runtime, &["index.js"]);

        let split = link(
            &graph,
            LinkOptions {
                tree_shaking: true,
                splitting: true,
            },
        )
        .unwrap();
        assert_eq!(split.roots.len(), 2);
        assert_eq!(split.roots[1].kind, RootKind::Dynamic);
        let lazy = unit(&graph, "/p/lazy.js");
        assert_eq!(split.owners(lazy, PartId(0)), &[1]);

        let inlined = link(&graph, options()).unwrap();
        assert_eq!(inlined.roots.len(), 1);
        assert_eq!(inlined.owners(lazy, PartId(0)), &[0]);
        assert!(inlined.is_live(lazy, graph.unit(lazy).namespace_part));
    }
}
