//! The build pipeline: scan, link, chunk, render.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use knit_graph::{
    CancelToken, Diagnostic, Loader, ModuleGraph, Runtime, ScanError, ScanInput, Scanner,
    UnitCache,
};
use path_clean::PathClean;
use tracing::{debug, info, info_span};

use crate::chunk::{ChunkGraph, ChunkKind};
use crate::link::{self, LinkOptions};
use crate::metafile::MetafileBuilder;
use crate::options::BuildOptions;
use crate::output::{BuildResult, OutputFile, OutputKind};
use crate::render::{self, RenderContext, RenderedChunk, sidecar_path};
use crate::{Error, Result};

/// A root of the build.
#[derive(Debug, Clone)]
pub struct EntryPoint {
    /// Output path template for this entry alone; `entry_names` otherwise.
    pub output: Option<String>,
    pub input: EntryInput,
}

impl EntryPoint {
    pub fn path(specifier: impl Into<String>) -> Self {
        Self {
            output: None,
            input: EntryInput::Path(specifier.into()),
        }
    }

    /// Literal JavaScript under a virtual name, like stdin.
    pub fn source(name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            output: None,
            input: EntryInput::Source {
                name: name.into(),
                contents: contents.into(),
                loader: Loader::Js,
                resolve_dir: None,
            },
        }
    }

    pub fn with_output(mut self, template: impl Into<String>) -> Self {
        self.output = Some(template.into());
        self
    }
}

#[derive(Debug, Clone)]
pub enum EntryInput {
    /// Specifier resolved against the runtime's working directory.
    Path(String),
    Source {
        name: String,
        contents: String,
        loader: Loader,
        resolve_dir: Option<PathBuf>,
    },
}

impl From<&EntryInput> for ScanInput {
    fn from(input: &EntryInput) -> Self {
        match input {
            EntryInput::Path(path) => ScanInput::Path(path.clone()),
            EntryInput::Source {
                name,
                contents,
                loader,
                resolve_dir,
            } => ScanInput::Source {
                name: name.clone(),
                contents: contents.clone(),
                loader: *loader,
                resolve_dir: resolve_dir.clone(),
            },
        }
    }
}

/// Runs builds against one runtime.
///
/// A bundler holds no graph between builds: each [`build`](Self::build)
/// scans, links and renders from scratch. Only the unit cache is shared, and
/// it hands back a unit only while the file's content hash is unchanged.
#[derive(Debug)]
pub struct Bundler {
    runtime: Arc<dyn Runtime>,
    options: BuildOptions,
    cache: UnitCache,
    cancel: CancelToken,
}

impl Bundler {
    pub fn new(runtime: Arc<dyn Runtime>, options: BuildOptions) -> Self {
        Self {
            runtime,
            options,
            cache: UnitCache::new(),
            cancel: CancelToken::new(),
        }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn cache(&self) -> &UnitCache {
        &self.cache
    }

    /// Token that aborts the build in progress. Every build starts
    /// uncancelled.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Build `entries`.
    ///
    /// Diagnostics come back in the [`BuildResult`]; when any is an error,
    /// no outputs are returned. `Err` is reserved for invalid options, a
    /// failing runtime and cancellation.
    pub fn build(&self, entries: &[EntryPoint]) -> Result<BuildResult> {
        let started = Instant::now();
        self.cancel.reset();
        self.options.check()?;
        if entries.is_empty() {
            return Err(Error::InvalidConfig("no entry points given".into()));
        }

        let cwd = self.runtime.cwd()?;
        let out_dir = cwd.join(&self.options.outdir).clean();

        let graph = match self.scan(entries) {
            Ok(graph) => graph,
            Err(ScanError::Cancelled) => return Err(Error::Cancelled),
            Err(ScanError::Runtime(err)) => return Err(Error::Runtime(err)),
            Err(ScanError::Failed(diagnostics)) => return Ok(failed(diagnostics)),
        };
        self.check_cancelled()?;

        let linked = {
            let _span = info_span!("link", units = graph.len()).entered();
            let options = LinkOptions {
                tree_shaking: self.options.tree_shaking,
                splitting: self.options.splitting,
            };
            match link::link(&graph, options) {
                Ok(linked) => linked,
                Err(diagnostics) => return Ok(failed(diagnostics)),
            }
        };
        self.check_cancelled()?;

        let templates: Vec<Option<String>> =
            entries.iter().map(|entry| entry.output.clone()).collect();
        let chunks = match ChunkGraph::build(&graph, &linked, &self.options, &templates) {
            Ok(chunks) => chunks,
            Err(diagnostics) => return Ok(failed(diagnostics)),
        };
        debug!(chunks = chunks.chunks.len(), "chunks assigned");

        let rendered = {
            let _span = info_span!("render", chunks = chunks.chunks.len()).entered();
            let ctx = RenderContext {
                graph: &graph,
                linked: &linked,
                chunks: &chunks,
                options: &self.options,
                out_dir: &out_dir,
            };
            match render::render(&ctx) {
                Ok(rendered) => rendered,
                Err(diagnostics) => return Ok(failed(diagnostics)),
            }
        };
        self.check_cancelled()?;

        let mut metafile = self
            .options
            .metafile
            .then(|| MetafileBuilder::new(&graph, &cwd, &out_dir));
        if let Some(meta) = &mut metafile {
            meta.add_inputs();
        }

        let mut outputs = Vec::new();
        for (chunk, rendered) in chunks.chunks.iter().zip(rendered) {
            if let Some(meta) = &mut metafile {
                let entry = match chunk.kind {
                    ChunkKind::Entry(_) | ChunkKind::DynamicEntry => {
                        chunk.root.map(|root| linked.roots[root].unit)
                    }
                    ChunkKind::Shared => None,
                };
                meta.add_chunk(&rendered, entry);
            }
            self.push_outputs(&mut outputs, rendered, metafile.as_mut());
        }

        let metafile = match metafile {
            Some(meta) => Some(meta.to_json().map_err(|err| {
                Error::Build {
                    diagnostics: vec![Diagnostic::internal(format!(
                        "failed to serialize the metafile: {err}"
                    ))],
                }
            })?),
            None => None,
        };

        info!(
            outputs = outputs.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "build finished"
        );
        Ok(BuildResult {
            outputs,
            diagnostics: Vec::new(),
            metafile,
        })
    }

    fn scan(&self, entries: &[EntryPoint]) -> std::result::Result<ModuleGraph, ScanError> {
        let _span = info_span!("scan", entries = entries.len()).entered();
        let inputs: Vec<ScanInput> = entries.iter().map(|entry| (&entry.input).into()).collect();
        let options = self.options.scan_options();
        Scanner::new(self.runtime.as_ref(), &options)
            .with_cache(&self.cache)
            .with_cancel_token(self.cancel.clone())
            .scan(&inputs)
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// The chunk, then its source map and stylesheet.
    fn push_outputs(
        &self,
        outputs: &mut Vec<OutputFile>,
        rendered: RenderedChunk,
        mut metafile: Option<&mut MetafileBuilder<'_>>,
    ) {
        let RenderedChunk {
            file_name,
            code,
            map,
            css,
            ..
        } = rendered;

        outputs.push(OutputFile {
            path: file_name.clone(),
            contents: code.into_bytes(),
            kind: OutputKind::Js,
        });
        if let Some(map) = map {
            let path = format!("{file_name}.map");
            if let Some(meta) = metafile.as_deref_mut() {
                meta.add_file(&path, map.len());
            }
            outputs.push(OutputFile {
                path,
                contents: map,
                kind: OutputKind::SourceMap,
            });
        }
        if let Some(css) = css {
            let path = sidecar_path(&file_name, &self.options.out_extension);
            if let Some(meta) = metafile.as_deref_mut() {
                meta.add_file(&path, css.len());
            }
            outputs.push(OutputFile {
                path,
                contents: css.into_bytes(),
                kind: OutputKind::Css,
            });
        }
    }
}

fn failed(diagnostics: Vec<Diagnostic>) -> BuildResult {
    BuildResult {
        outputs: Vec::new(),
        diagnostics,
        metafile: None,
    }
}
