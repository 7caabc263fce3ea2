//! Build results.

use knit_graph::Diagnostic;

/// What an output file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    Js,
    Css,
    SourceMap,
}

/// One file produced by a build. Nothing is written to disk; hosts place
/// `path` under the configured output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    /// `/`-separated path relative to the output directory.
    pub path: String,
    pub contents: Vec<u8>,
    pub kind: OutputKind,
}

impl OutputFile {
    /// Contents as text. Every output knit produces is UTF-8.
    pub fn text(&self) -> &str {
        std::str::from_utf8(&self.contents).unwrap_or_default()
    }
}

/// Everything a build produced.
///
/// `outputs` is empty whenever `diagnostics` holds an error: a build either
/// publishes every file or none.
#[derive(Debug, Clone, Default)]
pub struct BuildResult {
    /// Chunks in chunk order, each followed by its source map and stylesheet.
    pub outputs: Vec<OutputFile>,
    pub diagnostics: Vec<Diagnostic>,
    /// esbuild-style metafile JSON, when requested.
    pub metafile: Option<String>,
}

impl BuildResult {
    pub fn is_success(&self) -> bool {
        !self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> + '_ {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> + '_ {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }

    /// Output file at `path`.
    pub fn output(&self, path: &str) -> Option<&OutputFile> {
        self.outputs.iter().find(|file| file.path == path)
    }

    /// JavaScript outputs, in chunk order.
    pub fn chunks(&self) -> impl Iterator<Item = &OutputFile> + '_ {
        self.outputs
            .iter()
            .filter(|file| file.kind == OutputKind::Js)
    }
}
