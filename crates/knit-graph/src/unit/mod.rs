//! Source units: one parsed input file, split into tree-shakable parts.
//!
//! A [`SourceUnit`] keeps the source text and the tables extracted from the
//! AST, never the AST itself. That keeps units `Send + Sync`, lets the
//! scanner parse on worker threads and hand units back to the coordinator,
//! and lets a [`UnitCache`](crate::cache::UnitCache) reuse them across
//! builds.
//!
//! ```text
//! source text ──parse──▶ Program ──semantic──▶ Scoping
//!                              │                  │
//!                              └──── extract ─────┘
//!                                       │
//!                                       ▼
//!             SourceUnit { parts, symbols, exports, import_records, .. }
//! ```

mod define;
mod line_index;
mod parse;
mod side_effects;

pub use line_index::LineIndex;
pub use parse::{ParseOptions, parse_unit};

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::cache::ContentHash;
use crate::loader::Loader;
use crate::module_id::ModuleId;

/// Index of a [`Part`] within its unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartId(pub u32);

impl PartId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a [`Symbol`] within its unit's symbol arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocalSymbolId(pub u32);

impl LocalSymbolId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Variable,
    Function,
    Class,
    /// Local name bound by an import or a named re-export.
    Import,
    /// Synthesized binding for `export default <expr>`.
    DefaultExport,
    /// The unit's namespace object (`import * as ns`).
    Namespace,
}

/// What an import-kind symbol refers to in another unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportBinding {
    /// Index into [`SourceUnit::import_records`].
    pub record: usize,
    pub imported: ImportName,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImportName {
    Named(String),
    Namespace,
}

/// One top-level binding of a unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    /// Name as written in the source (or synthesized).
    pub name: String,
    pub kind: SymbolKind,
    /// Parts containing a declaration of this symbol.
    pub declared_by: Vec<PartId>,
    /// Set for import-kind symbols; the binder follows it.
    pub import: Option<ImportBinding>,
}

/// Kind of dependency edge recorded in the module graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImportKind {
    /// `import { a } from "./x"` / `import x from` / `import * as ns from`
    Static,
    /// `export { a } from "./x"` / `export * from "./x"`
    ReExport,
    /// `import "./x"`
    SideEffect,
    /// `import("./x")`
    Dynamic,
}

impl ImportKind {
    /// Static edges take part in linking and execution order.
    pub fn is_static(self) -> bool {
        !matches!(self, Self::Dynamic)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Static => "import-statement",
            Self::ReExport => "re-export",
            Self::SideEffect => "side-effect-import",
            Self::Dynamic => "dynamic-import",
        }
    }
}

/// One dependency edge out of a unit, in source order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRecord {
    pub specifier: String,
    pub kind: ImportKind,
    /// Span of the whole statement (or the `import()` call).
    pub span: (u32, u32),
    /// Span of the specifier string literal, quotes included.
    pub source_span: (u32, u32),
    /// Names imported across this edge (`*` for namespace/wildcard edges).
    pub names: Vec<String>,
    /// Dynamic import inside a branch that can never run.
    pub in_dead_branch: bool,
}

/// How the renderer reproduces a part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartKind {
    /// Copied as written.
    Statement,
    /// `export <declaration>`; only the declaration text is copied.
    ExportDecl { body: (u32, u32) },
    /// `export default <expr>`; becomes `var <name> = <expr>;`.
    DefaultExpr { expr: (u32, u32) },
    /// `export default function () {}` / `export default class {}`;
    /// becomes `<keyword> <name>` followed by the `rest` text.
    DefaultAnonymous { keyword: String, rest: (u32, u32) },
    /// Import declaration; dropped.
    Import,
    /// `export … from`; dropped.
    ReExport,
    /// `export { a, b as c }`; dropped.
    ExportList,
    /// Synthesized namespace object.
    Namespace,
    /// Stylesheet text for the `.css` sidecar.
    Css,
}

/// One identifier in a part that refers to a top-level symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub span: (u32, u32),
    pub symbol: LocalSymbolId,
    /// `{ a }` shorthand; renaming must expand it to `{ a: b }`.
    pub shorthand: bool,
}

/// Minimal unit of tree shaking: one top-level statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    pub span: (u32, u32),
    pub kind: PartKind,
    pub declared: Vec<LocalSymbolId>,
    pub referenced: Vec<LocalSymbolId>,
    /// Other parts of the same unit this one needs.
    pub deps: Vec<PartId>,
    pub can_be_removed_if_unused: bool,
    /// Import records owned by this part.
    pub records: Vec<usize>,
    pub occurrences: Vec<Occurrence>,
    /// The copied text does not end in `;` and needs one in the output.
    pub needs_semicolon: bool,
}

impl Part {
    pub(crate) fn new(span: (u32, u32), kind: PartKind) -> Self {
        Self {
            span,
            kind,
            declared: Vec::new(),
            referenced: Vec::new(),
            deps: Vec::new(),
            can_be_removed_if_unused: true,
            records: Vec::new(),
            occurrences: Vec::new(),
            needs_semicolon: false,
        }
    }
}

/// Immutable parsed representation of one input file.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub id: ModuleId,
    pub loader: Loader,
    /// Text that spans point into (synthesized for JSON/text units).
    pub source: String,
    /// Hash of the loaded text, before any synthesis.
    pub content_hash: ContentHash,
    pub parts: Vec<Part>,
    pub symbols: Vec<Symbol>,
    /// Explicit exports in source order.
    pub exports: IndexMap<String, LocalSymbolId>,
    /// Records of `export * from` edges.
    pub star_exports: Vec<usize>,
    pub import_records: Vec<ImportRecord>,
    pub namespace_symbol: LocalSymbolId,
    pub namespace_part: PartId,
    /// Names bound in any nested scope.
    pub nested_names: FxHashSet<String>,
    /// Free names that resolve to globals.
    pub globals: FxHashSet<String>,
    pub line_index: LineIndex,
}

impl SourceUnit {
    pub fn symbol(&self, id: LocalSymbolId) -> &Symbol {
        &self.symbols[id.index()]
    }

    pub fn part(&self, id: PartId) -> &Part {
        &self.parts[id.index()]
    }

    /// Part ids in source order.
    pub fn part_ids(&self) -> impl Iterator<Item = PartId> + '_ {
        (0..self.parts.len() as u32).map(PartId)
    }

    /// Whether the unit uses ES module syntax at all.
    pub fn has_module_syntax(&self) -> bool {
        !self.import_records.is_empty() || !self.exports.is_empty() || !self.star_exports.is_empty()
    }

    /// Source text of a span.
    pub fn text(&self, span: (u32, u32)) -> &str {
        self.source
            .get(span.0 as usize..span.1 as usize)
            .unwrap_or_default()
    }

    /// 1-based line and 0-based column of an offset, for diagnostics.
    pub fn line_column(&self, offset: u32) -> (u32, u32) {
        self.line_index.line_column(offset, &self.source)
    }
}
