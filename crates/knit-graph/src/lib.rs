//! # knit-graph
//!
//! Source units and the module graph for the knit bundler.
//!
//! This crate turns files into [`SourceUnit`]s (parts, symbols, import
//! records and export maps extracted with oxc) and discovers every unit
//! reachable from a set of entry points into a [`ModuleGraph`]. It does no
//! linking and emits no code; `knit-bundler` consumes the graph.
//!
//! ## Architecture
//!
//! ```text
//!            ┌─────────────┐
//!            │   Runtime   │  resolve / load / cwd
//!            └──────┬──────┘
//!                   │
//!            ┌──────▼──────┐      ┌────────────┐
//!            │   Scanner   │◀────▶│ UnitCache  │
//!            └──────┬──────┘      └────────────┘
//!                   │ parse_unit (rayon, per frontier)
//!            ┌──────▼──────┐
//!            │ ModuleGraph │  Arc<SourceUnit> + resolved targets
//!            └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use knit_graph::{MemoryRuntime, ScanInput, ScanOptions, Scanner};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let runtime = MemoryRuntime::new("/project")
//!     .with_file("src/index.js", "import { greet } from './greet'; greet();")
//!     .with_file("src/greet.js", "export function greet() {}");
//!
//! let options = ScanOptions::default();
//! let graph = Scanner::new(&runtime, &options)
//!     .scan(&[ScanInput::Path("src/index.js".into())])?;
//!
//! assert_eq!(graph.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod dependency_chain;
pub mod diagnostic;
pub mod graph;
pub mod loader;
pub mod module_id;
pub mod runtime;
pub mod scanner;
pub mod unit;

pub use cache::{ContentHash, UnitCache};
pub use dependency_chain::DependencyChain;
pub use diagnostic::{
    Diagnostic, DiagnosticContext, DiagnosticKind, DiagnosticSeverity, Location,
    format_diagnostics,
};
pub use graph::{ImportTarget, ModuleGraph, ModuleNode, SymbolRef, UnitId};
pub use loader::Loader;
pub use module_id::{ModuleId, ModuleIdError, to_identifier};
#[cfg(not(target_family = "wasm"))]
pub use runtime::NativeRuntime;
pub use runtime::{
    LoadedSource, MemoryRuntime, ResolveRequest, Resolution, Runtime, RuntimeError,
    RuntimeResult,
};
pub use scanner::{CancelToken, ScanError, ScanInput, ScanOptions, Scanner};
pub use unit::{
    ImportBinding, ImportKind, ImportName, ImportRecord, LocalSymbolId, Occurrence, ParseOptions,
    Part, PartId, PartKind, SourceUnit, Symbol, SymbolKind, parse_unit,
};

// Re-export the parser stack so consumers match versions.
pub use oxc_allocator;
pub use oxc_ast;
pub use oxc_parser;
pub use oxc_semantic;
pub use oxc_span;
