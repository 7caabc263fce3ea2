//! Chunk assignment.
//!
//! Live parts are grouped by owner set. With splitting, every root gets a
//! chunk holding the parts only it reaches, and each other distinct owner
//! set becomes a shared chunk:
//!
//! ```text
//!   owners {e1}      -> chunk of e1
//!   owners {e2}      -> chunk of e2
//!   owners {e1, e2}  -> shared chunk, imported by e1 and e2
//! ```
//!
//! A part's declarations are reached from every root that reaches the part
//! itself, so a chunk only ever imports from chunks whose owner set is a
//! superset of its own. The chunk graph is acyclic by construction.
//!
//! Without splitting, each entry chunk receives every part it owns, and
//! dynamic imports were already inlined by the linker.

mod naming;

use indexmap::{IndexMap, IndexSet};
use knit_graph::{Diagnostic, DiagnosticKind, ModuleGraph, PartId, PartKind, SymbolRef, UnitId};
use rustc_hash::FxHashMap;

use crate::link::{LinkOutput, RootKind};
use crate::options::BuildOptions;

pub(crate) use naming::Namer;

pub type ChunkId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    /// Chunk of the entry point at this index.
    Entry(usize),
    /// Chunk loaded by `import()`.
    DynamicEntry,
    Shared,
}

/// Symbols one chunk takes from another.
#[derive(Debug, Clone)]
pub struct ChunkImport {
    pub chunk: ChunkId,
    /// Canonical symbols, in first-use order. Empty for an import kept only
    /// for evaluation order.
    pub symbols: Vec<SymbolRef>,
}

#[derive(Debug, Clone)]
pub struct Chunk {
    pub kind: ChunkKind,
    /// Index into the link roots; `None` for shared chunks.
    pub root: Option<usize>,
    /// Roots reaching this chunk's parts.
    pub owners: Vec<u32>,
    /// Parts in emission order: units in execution order, then part order.
    pub parts: Vec<(UnitId, PartId)>,
    /// Units with at least one part here, in execution order.
    pub units: Vec<UnitId>,
    /// Output path relative to the output directory.
    pub file_name: String,
    pub imports: Vec<ChunkImport>,
    /// Canonical symbols other chunks import from this one.
    pub exports: Vec<SymbolRef>,
}

impl Chunk {
    fn new(kind: ChunkKind, root: Option<usize>, owners: Vec<u32>) -> Self {
        Self {
            kind,
            root,
            owners,
            parts: Vec::new(),
            units: Vec::new(),
            file_name: String::new(),
            imports: Vec::new(),
            exports: Vec::new(),
        }
    }

    fn push(&mut self, unit: UnitId, part: PartId) {
        if self.units.last() != Some(&unit) {
            self.units.push(unit);
        }
        self.parts.push((unit, part));
    }

    pub fn is_entry(&self) -> bool {
        matches!(self.kind, ChunkKind::Entry(_))
    }
}

/// All chunks of a build, root chunks first.
#[derive(Debug, Clone)]
pub struct ChunkGraph {
    pub chunks: Vec<Chunk>,
    /// Chunk of each link root.
    pub root_chunks: Vec<ChunkId>,
    /// Flat part -> chunk, when splitting.
    part_chunk: FxHashMap<usize, ChunkId>,
}

impl ChunkGraph {
    /// Chunk holding a part. Only meaningful when splitting: otherwise a
    /// part can sit in several entry chunks.
    pub fn chunk_of(&self, linked: &LinkOutput, unit: UnitId, part: PartId) -> Option<ChunkId> {
        self.part_chunk.get(&linked.parts.flat(unit, part)).copied()
    }

    /// Assign live parts to chunks, wire cross-chunk imports and name every
    /// chunk.
    ///
    /// `templates` holds each entry point's own output template, if any.
    pub fn build(
        graph: &ModuleGraph,
        linked: &LinkOutput,
        options: &BuildOptions,
        templates: &[Option<String>],
    ) -> Result<Self, Vec<Diagnostic>> {
        let mut chunks: Vec<Chunk> = linked
            .roots
            .iter()
            .enumerate()
            .map(|(index, root)| {
                let kind = match root.kind {
                    RootKind::Entry(entry) => ChunkKind::Entry(entry),
                    RootKind::Dynamic => ChunkKind::DynamicEntry,
                };
                Chunk::new(kind, Some(index), vec![index as u32])
            })
            .collect();
        let root_chunks: Vec<ChunkId> = (0..chunks.len()).collect();

        let mut shared: FxHashMap<Vec<u32>, ChunkId> = FxHashMap::default();
        let mut part_chunk = FxHashMap::default();
        let mut assigned = 0usize;

        for &unit in &linked.exec_order {
            for part in graph.unit(unit).part_ids() {
                let owners = linked.owners(unit, part);
                if owners.is_empty() {
                    continue;
                }
                assigned += 1;
                if !options.splitting {
                    for &owner in owners {
                        chunks[root_chunks[owner as usize]].push(unit, part);
                    }
                    continue;
                }

                let chunk = match owners {
                    [only] => root_chunks[*only as usize],
                    _ => *shared.entry(owners.to_vec()).or_insert_with(|| {
                        chunks.push(Chunk::new(ChunkKind::Shared, None, owners.to_vec()));
                        chunks.len() - 1
                    }),
                };
                chunks[chunk].push(unit, part);
                part_chunk.insert(linked.parts.flat(unit, part), chunk);
            }
        }

        let live = linked.owners.iter().filter(|o| !o.is_empty()).count();
        if assigned != live {
            return Err(vec![Diagnostic::internal(format!(
                "{live} parts are live but {assigned} were assigned to chunks"
            ))]);
        }

        let mut chunk_graph = Self {
            chunks,
            root_chunks,
            part_chunk,
        };
        if options.splitting {
            chunk_graph.wire(graph, linked)?;
        }
        chunk_graph.name(graph, linked, options, templates)?;
        Ok(chunk_graph)
    }

    /// Derive cross-chunk imports from symbol references.
    fn wire(&mut self, graph: &ModuleGraph, linked: &LinkOutput) -> Result<(), Vec<Diagnostic>> {
        let mut errors = Vec::new();
        let mut imports: Vec<IndexMap<ChunkId, IndexSet<SymbolRef>>> =
            vec![IndexMap::new(); self.chunks.len()];
        let mut exports: Vec<IndexSet<SymbolRef>> = vec![IndexSet::new(); self.chunks.len()];

        for (id, chunk) in self.chunks.iter().enumerate() {
            let mut needed: Vec<SymbolRef> = Vec::new();
            for &(unit, part_id) in &chunk.parts {
                let part = graph.unit(unit).part(part_id);
                needed.extend(
                    part.referenced
                        .iter()
                        .map(|&symbol| linked.canonical(SymbolRef::new(unit, symbol))),
                );
                if part.kind == PartKind::Namespace {
                    needed.extend(linked.surfaces[unit.index()].values().copied());
                }
            }
            // a root chunk re-exports its unit's whole surface
            if let Some(root) = chunk.root {
                let unit = linked.roots[root].unit;
                needed.extend(linked.surfaces[unit.index()].values().copied());
            }

            for symbol in needed {
                match self.declaring_chunk(graph, linked, symbol) {
                    Some(home) if home == id => {}
                    Some(home) => {
                        imports[id].entry(home).or_default().insert(symbol);
                        exports[home].insert(symbol);
                    }
                    None => errors.push(
                        Diagnostic::internal(format!(
                            "symbol \"{}\" of {} is referenced but never declared in a chunk",
                            graph.unit(symbol.unit).symbol(symbol.symbol).name,
                            graph.unit(symbol.unit).id
                        ))
                        .in_file(&graph.unit(symbol.unit).id),
                    ),
                }
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        // Chunks sharing owners with a smaller set run first: import them
        // even when no symbol crosses over.
        let owner_sets: Vec<Vec<u32>> = self.chunks.iter().map(|c| c.owners.clone()).collect();
        for (id, owners) in owner_sets.iter().enumerate() {
            for (other, other_owners) in owner_sets.iter().enumerate() {
                let covers = other_owners.len() > owners.len()
                    && owners.iter().all(|owner| other_owners.contains(owner));
                if covers && self.chunks[other].kind == ChunkKind::Shared {
                    imports[id].entry(other).or_default();
                }
            }
        }

        for (id, chunk) in self.chunks.iter_mut().enumerate() {
            let mut edges: Vec<ChunkImport> = std::mem::take(&mut imports[id])
                .into_iter()
                .map(|(chunk, symbols)| ChunkImport {
                    chunk,
                    symbols: symbols.into_iter().collect(),
                })
                .collect();
            edges.sort_by_key(|edge| edge.chunk);
            chunk.imports = edges;
            chunk.exports = std::mem::take(&mut exports[id]).into_iter().collect();
        }
        Ok(())
    }

    fn declaring_chunk(
        &self,
        graph: &ModuleGraph,
        linked: &LinkOutput,
        symbol: SymbolRef,
    ) -> Option<ChunkId> {
        graph
            .unit(symbol.unit)
            .symbol(symbol.symbol)
            .declared_by
            .iter()
            .find_map(|&part| self.chunk_of(linked, symbol.unit, part))
    }

    fn name(
        &mut self,
        graph: &ModuleGraph,
        linked: &LinkOutput,
        options: &BuildOptions,
        templates: &[Option<String>],
    ) -> Result<(), Vec<Diagnostic>> {
        let namer = Namer::new(graph, options.outbase.as_deref(), &options.out_extension);

        for chunk in &mut self.chunks {
            let hash = namer.hash(&chunk.parts);
            chunk.file_name = match (chunk.kind, chunk.root) {
                (ChunkKind::Entry(entry), Some(root)) => {
                    let template = templates
                        .get(entry)
                        .and_then(Option::as_deref)
                        .unwrap_or(&options.entry_names);
                    namer.root_path(linked.roots[root].unit, template, &hash)
                }
                (ChunkKind::DynamicEntry, Some(root)) => {
                    namer.root_path(linked.roots[root].unit, &options.chunk_names, &hash)
                }
                _ => namer.shared_path(&options.chunk_names, &hash),
            };
        }

        let mut seen: FxHashMap<&str, ChunkId> = FxHashMap::default();
        let mut errors = Vec::new();
        for (id, chunk) in self.chunks.iter().enumerate() {
            if let Some(&first) = seen.get(chunk.file_name.as_str()) {
                errors.push(
                    Diagnostic::error(
                        DiagnosticKind::DuplicateOutputPath,
                        format!(
                            "Two output files share the same path \"{}\"",
                            chunk.file_name
                        ),
                    )
                    .with_note(format!("chunks {first} and {id} both map to this path"))
                    .with_help("give one of the entry points its own output name"),
                );
            } else {
                seen.insert(&chunk.file_name, id);
            }
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Relative import specifier from one chunk file to another.
pub fn relative_import(from: &str, to: &str) -> String {
    let from_dir: Vec<&str> = match from.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    let to_parts: Vec<&str> = to.split('/').collect();
    let (to_dir, file) = to_parts.split_at(to_parts.len() - 1);

    let shared = from_dir
        .iter()
        .zip(to_dir)
        .take_while(|(a, b)| a == b)
        .count();
    let mut segments: Vec<&str> = vec![".."; from_dir.len() - shared];
    segments.extend(&to_dir[shared..]);
    segments.extend(file);

    let joined = segments.join("/");
    if joined.starts_with("..") {
        joined
    } else {
        format!("./{joined}")
    }
}
