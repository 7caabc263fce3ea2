//! Chunk rendering.
//!
//! Every chunk is renamed and emitted independently on the rayon pool.
//! Names are assigned for all chunks first, since a chunk importing from
//! another needs the exporting chunk's names.

mod css;
mod emit;
mod format;
mod renamer;

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use indexmap::IndexMap;
use knit_config::SourceMapMode;
use knit_graph::{Diagnostic, ImportKind, ImportTarget, ModuleGraph, PartKind, UnitId};
use rayon::prelude::*;
use tracing::debug;

use crate::chunk::{ChunkGraph, ChunkId};
use crate::link::LinkOutput;
use crate::options::BuildOptions;

use emit::{CodeWriter, PartEmitter, relative_path};
use format::{Externals, Wrapper};
use renamer::{Names, Renamer};

pub(crate) use css::sidecar_path;

/// Read-only view of a finished link, shared by every render task.
pub(crate) struct RenderContext<'a> {
    pub(crate) graph: &'a ModuleGraph,
    pub(crate) linked: &'a LinkOutput,
    pub(crate) chunks: &'a ChunkGraph,
    pub(crate) options: &'a BuildOptions,
    /// Absolute output directory.
    pub(crate) out_dir: &'a Path,
}

impl RenderContext<'_> {
    /// How an output file refers to a unit: relative to the file's own
    /// directory, or the virtual identity.
    pub(crate) fn source_name(&self, file_name: &str, unit: UnitId) -> String {
        let id = &self.graph.unit(unit).id;
        if id.is_virtual() {
            return id.to_string();
        }
        let output = self.out_dir.join(file_name);
        let dir = output.parent().unwrap_or(self.out_dir);
        relative_path(dir, id.as_path())
    }
}

/// One chunk's rendered text and its side files.
#[derive(Debug, Clone)]
pub(crate) struct RenderedChunk {
    pub(crate) file_name: String,
    pub(crate) code: String,
    /// Contents of the `.map` file, when the mode writes one.
    pub(crate) map: Option<Vec<u8>>,
    pub(crate) css: Option<String>,
    /// Bytes of emitted code per contributing unit.
    pub(crate) inputs: Vec<(UnitId, usize)>,
    /// `(path, kind, external)` for every import statement or call left in
    /// the output.
    pub(crate) imports: Vec<(String, &'static str, bool)>,
    pub(crate) exports: Vec<String>,
}

/// Render every chunk. Errors from all chunks are collected.
pub(crate) fn render(ctx: &RenderContext<'_>) -> Result<Vec<RenderedChunk>, Vec<Diagnostic>> {
    let names: Vec<Names> = ctx
        .chunks
        .chunks
        .par_iter()
        .map(|chunk| Renamer::new(ctx.graph, ctx.linked).assign(chunk))
        .collect();

    let results: Vec<Result<RenderedChunk, Vec<Diagnostic>>> = (0..ctx.chunks.chunks.len())
        .into_par_iter()
        .map(|id| render_chunk(ctx, &names, id))
        .collect();

    let mut rendered = Vec::with_capacity(results.len());
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(chunk) => rendered.push(chunk),
            Err(diagnostics) => errors.extend(diagnostics),
        }
    }
    if errors.is_empty() {
        Ok(rendered)
    } else {
        Err(errors)
    }
}

fn render_chunk(
    ctx: &RenderContext<'_>,
    names: &[Names],
    id: ChunkId,
) -> Result<RenderedChunk, Vec<Diagnostic>> {
    let chunk = &ctx.chunks.chunks[id];
    let emitter = PartEmitter {
        ctx,
        chunk: id,
        names: &names[id],
    };
    let externals = Externals::collect(&emitter)?;
    let wrapper = Wrapper::new(&emitter, names, &externals);

    let base_name = chunk
        .file_name
        .rsplit('/')
        .next()
        .unwrap_or(&chunk.file_name)
        .to_string();
    let mut out = CodeWriter::new(
        ctx.options.sourcemap.map(|_| base_name.as_str()),
        ctx.options.sources_content,
    );
    if let Some(root) = &ctx.options.source_root {
        out.set_source_root(root);
    }
    for &unit in &chunk.units {
        let source = ctx.graph.unit(unit);
        if source.loader.is_script() {
            out.add_source(unit, source, &ctx.source_name(&chunk.file_name, unit));
        }
    }

    if let Some(banner) = &ctx.options.banner {
        out.push(banner);
        out.push("\n");
    }
    wrapper.prologue(&mut out);

    let mut inputs: IndexMap<UnitId, usize> = IndexMap::new();
    let (namespaces, others): (Vec<_>, Vec<_>) = chunk
        .parts
        .iter()
        .partition(|(unit, part)| ctx.graph.unit(*unit).part(*part).kind == PartKind::Namespace);
    for &(unit, _) in namespaces {
        let before = out.len();
        emitter.emit_namespace(&mut out, unit);
        *inputs.entry(unit).or_default() += out.len() - before;
    }
    for &(unit, part) in others {
        let before = out.len();
        emitter.emit_part(&mut out, unit, ctx.graph.unit(unit).part(part));
        *inputs.entry(unit).or_default() += out.len() - before;
    }

    wrapper.epilogue(&mut out);
    if let Some(footer) = &ctx.options.footer {
        out.push(footer);
        out.push("\n");
    }

    let (mut code, map) = out.finish();
    let mut map_file = None;
    if let (Some(mode), Some(map)) = (ctx.options.sourcemap, map) {
        let mut bytes = Vec::new();
        map.to_writer(&mut bytes).map_err(|err| {
            vec![Diagnostic::internal(format!(
                "failed to serialize the source map of {}: {err}",
                chunk.file_name
            ))]
        })?;
        if mode.inlines() {
            code.push_str("//# sourceMappingURL=data:application/json;base64,");
            code.push_str(&STANDARD.encode(&bytes));
            code.push('\n');
        } else if mode == SourceMapMode::Linked {
            code.push_str(&format!("//# sourceMappingURL={base_name}.map\n"));
        }
        if mode.writes_file() {
            map_file = Some(bytes);
        }
    }

    let imports = output_imports(ctx, id, &externals);
    let exports = wrapper
        .export_surface()
        .into_iter()
        .map(|(export, _)| export)
        .collect();
    debug!(
        chunk = %chunk.file_name,
        parts = chunk.parts.len(),
        bytes = code.len(),
        "rendered chunk"
    );

    Ok(RenderedChunk {
        file_name: chunk.file_name.clone(),
        code,
        map: map_file,
        css: css::stylesheet(ctx, id),
        inputs: inputs.into_iter().filter(|(_, bytes)| *bytes > 0).collect(),
        imports,
        exports,
    })
}

fn output_imports(
    ctx: &RenderContext<'_>,
    id: ChunkId,
    externals: &Externals,
) -> Vec<(String, &'static str, bool)> {
    let chunk = &ctx.chunks.chunks[id];
    let mut imports: Vec<(String, &'static str, bool)> = chunk
        .imports
        .iter()
        .map(|import| {
            (
                ctx.chunks.chunks[import.chunk].file_name.clone(),
                "import-statement",
                false,
            )
        })
        .collect();
    let kind = match ctx.options.format {
        knit_config::Format::Cjs => "require-call",
        _ => "import-statement",
    };
    imports.extend(externals.paths().map(|path| (path.to_string(), kind, true)));

    for &(unit, part) in &chunk.parts {
        let source = ctx.graph.unit(unit);
        for &record in &source.part(part).records {
            if source.import_records[record].kind != ImportKind::Dynamic {
                continue;
            }
            let entry = match ctx.graph.target(unit, record) {
                ImportTarget::External(path) => (path.clone(), "dynamic-import", true),
                ImportTarget::Unit(target) if ctx.options.splitting => {
                    let Some(root) = ctx.linked.root_of(*target) else {
                        continue;
                    };
                    let file = &ctx.chunks.chunks[ctx.chunks.root_chunks[root]].file_name;
                    (file.clone(), "dynamic-import", false)
                }
                _ => continue,
            };
            if !imports.contains(&entry) {
                imports.push(entry);
            }
        }
    }
    imports
}
