#![cfg_attr(docsrs, feature(doc_cfg))]

//! # knit-bundler
//!
//! Knit bundler - linking, tree shaking, chunking and rendering on top of
//! the `knit-graph` foundation.
//!
//! A build runs in four phases:
//!
//! ```text
//!   scan    (knit-graph, parallel per frontier)  -> ModuleGraph
//!   link    (single-threaded)                    -> bindings, live parts, owner sets
//!   chunk   (single-threaded)                    -> ChunkGraph
//!   render  (parallel per chunk)                 -> OutputFile + source maps
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use knit_bundler::{BuildOptions, Bundler, EntryPoint, MemoryRuntime};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let runtime = MemoryRuntime::new("/project")
//!     .with_file("src/index.js", "import { greet } from './greet'; greet();")
//!     .with_file("src/greet.js", "export function greet() {} export const unused = 1;");
//!
//! let bundler = Bundler::new(Arc::new(runtime), BuildOptions::default());
//! let result = bundler.build(&[EntryPoint::path("src/index.js")])?.into_result()?;
//!
//! for file in &result.outputs {
//!     println!("{}:\n{}", file.path, file.text());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### From a config file
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use knit_bundler::{BuildOptions, Bundler, ConfigLoader, NativeRuntime};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::new(".").load()?;
//! let (options, entries) = BuildOptions::from_config(&config)?;
//! let _result = Bundler::new(Arc::new(NativeRuntime::new()), options).build(&entries)?;
//! # Ok(())
//! # }
//! ```

mod bundler;
mod chunk;
pub mod link;
pub mod metafile;
mod options;
mod output;
mod render;

// Logging utilities (optional, enabled with "logging" feature)
#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub mod logging;

#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub use logging::{LogLevel, init_logging, init_logging_from_config, init_logging_from_env};

pub use bundler::{Bundler, EntryInput, EntryPoint};
pub use chunk::{Chunk, ChunkGraph, ChunkId, ChunkImport, ChunkKind};
pub use options::BuildOptions;
pub use output::{BuildResult, OutputFile, OutputKind};

pub use knit_config::{ConfigLoader, Format, KnitConfig, SourceMapMode};
#[cfg(not(target_family = "wasm"))]
pub use knit_graph::NativeRuntime;
pub use knit_graph::{
    CancelToken, Diagnostic, DiagnosticContext, DiagnosticKind, DiagnosticSeverity, Loader,
    Location, MemoryRuntime, ModuleGraph, Runtime, RuntimeError, UnitCache, format_diagnostics,
};

/// Error types for knit-bundler operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The build's cancel token fired.
    #[error("Build cancelled")]
    Cancelled,

    /// The runtime could not answer a basic query (working directory).
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// The build produced error diagnostics.
    #[error("Build failed with {} error(s)", .diagnostics.iter().filter(|d| d.is_error()).count())]
    Build { diagnostics: Vec<Diagnostic> },
}

/// Result type alias for knit-bundler operations.
pub type Result<T> = std::result::Result<T, Error>;

impl miette::Diagnostic for Error {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match self {
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Cancelled => "CANCELLED",
            Error::Runtime(_) => "RUNTIME_ERROR",
            Error::Build { .. } => "BUILD_FAILED",
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            Error::InvalidConfig(msg) => Some(Box::new(format!(
                "Check your knit.toml / knit.json and KNIT_* variables.\nError: {}",
                msg
            ))),
            Error::Build { diagnostics } if diagnostics.len() == 1 => diagnostics[0]
                .help
                .as_ref()
                .map(|h| Box::new(h.clone()) as Box<dyn std::fmt::Display>),
            _ => None,
        }
    }

    fn related(&self) -> Option<Box<dyn Iterator<Item = &dyn miette::Diagnostic> + '_>> {
        match self {
            Error::Build { diagnostics } => Some(Box::new(
                diagnostics
                    .iter()
                    .map(|diagnostic| diagnostic as &dyn miette::Diagnostic),
            )),
            _ => None,
        }
    }
}

impl BuildResult {
    /// `Err(Error::Build)` when any diagnostic is an error.
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::Build {
                diagnostics: self.diagnostics,
            })
        }
    }
}
