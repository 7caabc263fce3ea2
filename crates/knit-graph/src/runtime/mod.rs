//! Host boundary for loading and resolving modules.
//!
//! The scanner never touches the filesystem directly. Everything it needs
//! from the outside world goes through the [`Runtime`] trait: turning a
//! specifier into a canonical [`ModuleId`] (or marking it external) and
//! loading a unit's text. [`NativeRuntime`] resolves against the real
//! filesystem and `node_modules`; [`MemoryRuntime`] serves virtual files
//! with relative-path probing only.

pub mod memory;
#[cfg(not(target_family = "wasm"))]
pub mod native;

pub use memory::MemoryRuntime;
#[cfg(not(target_family = "wasm"))]
pub use native::NativeRuntime;

use std::path::{Path, PathBuf};

use path_clean::PathClean;

use crate::loader::Loader;
use crate::module_id::ModuleId;
use crate::unit::ImportKind;

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors that can occur during runtime operations
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(String),

    /// Module resolution failed
    #[error("Could not resolve '{specifier}' from '{from}': {reason}")]
    ResolutionFailed {
        specifier: String,
        from: String,
        reason: String,
    },

    /// Other runtime error
    #[error("Runtime error: {0}")]
    Other(String),
}

/// One resolution question asked by the scanner.
#[derive(Debug, Clone, Copy)]
pub struct ResolveRequest<'a> {
    /// Specifier as written in the source (`./util`, `react`, ...).
    pub specifier: &'a str,
    /// Unit containing the import; `None` for entry points.
    pub importer: Option<&'a ModuleId>,
    /// Directory relative specifiers resolve against.
    pub resolve_dir: &'a Path,
    /// Kind of edge that produced the request.
    pub kind: ImportKind,
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A unit that becomes part of the graph.
    Module {
        id: ModuleId,
        /// `Some(false)` asserts the unit has no side effects
        /// (package.json `sideEffects: false`).
        side_effects: Option<bool>,
    },
    /// Left as an import in the output.
    External { path: String },
}

/// Text of a loaded unit.
#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub contents: String,
    /// Overrides the extension-based loader when set.
    pub loader: Option<Loader>,
}

impl LoadedSource {
    pub fn new(contents: impl Into<String>) -> Self {
        Self {
            contents: contents.into(),
            loader: None,
        }
    }
}

/// Platform runtime trait.
///
/// Implementations must be callable from worker threads: the scanner
/// resolves and loads each frontier in parallel.
pub trait Runtime: Send + Sync + std::fmt::Debug {
    /// Map a specifier to a unit identity or an external.
    fn resolve(&self, request: &ResolveRequest<'_>) -> RuntimeResult<Resolution>;

    /// Load the text of a resolved unit.
    fn load(&self, id: &ModuleId) -> RuntimeResult<LoadedSource>;

    /// Directory entry points and virtual units resolve against.
    fn cwd(&self) -> RuntimeResult<PathBuf>;
}

/// Extensions probed, in order, when a specifier has none.
pub const RESOLVE_EXTENSIONS: &[&str] = &["js", "mjs", "jsx", "json", "css", "txt"];

/// Whether a specifier is a path rather than a package name.
pub fn is_path_specifier(specifier: &str) -> bool {
    specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier == "."
        || specifier == ".."
        || Path::new(specifier).is_absolute()
}

/// Relative-path resolution for runtimes without a package resolver.
///
/// Tries the path itself, then each of [`RESOLVE_EXTENSIONS`], then
/// `index.<ext>` inside it. `is_file` decides what exists.
pub(crate) fn probe_path(
    request: &ResolveRequest<'_>,
    is_file: impl Fn(&Path) -> bool,
) -> RuntimeResult<PathBuf> {
    let from = || {
        request
            .importer
            .map(|id| id.to_string())
            .unwrap_or_else(|| "<entry>".to_string())
    };

    if !is_path_specifier(request.specifier) {
        return Err(RuntimeError::ResolutionFailed {
            specifier: request.specifier.to_string(),
            from: from(),
            reason: "bare specifiers need a package resolver; mark the package as external"
                .to_string(),
        });
    }

    let base = request.resolve_dir.join(request.specifier).clean();
    if is_file(&base) {
        return Ok(base);
    }

    for ext in RESOLVE_EXTENSIONS {
        let mut candidate = base.clone().into_os_string();
        candidate.push(".");
        candidate.push(ext);
        let candidate = PathBuf::from(candidate);
        if is_file(&candidate) {
            return Ok(candidate);
        }
    }

    for ext in RESOLVE_EXTENSIONS {
        let candidate = base.join(format!("index.{ext}"));
        if is_file(&candidate) {
            return Ok(candidate);
        }
    }

    Err(RuntimeError::ResolutionFailed {
        specifier: request.specifier.to_string(),
        from: from(),
        reason: format!("no file at '{}'", base.display()),
    })
}
