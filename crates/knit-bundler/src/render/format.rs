//! Module wrappers: the import and export statements each output format
//! puts around a chunk's parts.

use indexmap::IndexMap;
use knit_config::Format;
use knit_graph::{
    Diagnostic, DiagnosticKind, ImportName, ImportTarget, ModuleGraph, PartKind, SymbolRef, UnitId,
};

use super::emit::{CodeWriter, PartEmitter, property_key};
use super::renamer::Names;
use crate::chunk::relative_import;

/// Bindings a chunk takes from one external module.
#[derive(Debug, Default)]
struct ExternalImport {
    namespaces: Vec<String>,
    /// `(imported, local)`
    named: Vec<(String, String)>,
}

/// External modules a chunk depends on, in first-use order.
#[derive(Debug, Default)]
pub(crate) struct Externals {
    imports: IndexMap<String, ExternalImport>,
    /// External `export * from "…"` reachable from the chunk's root unit.
    stars: Vec<String>,
}

impl Externals {
    pub(crate) fn paths(&self) -> impl Iterator<Item = &str> + '_ {
        self.imports
            .keys()
            .chain(self.stars.iter())
            .map(String::as_str)
    }

    /// Gather the live import parts of a chunk that target externals.
    ///
    /// The iife format has no way to load a module, so any external there
    /// is an error.
    pub(crate) fn collect(emitter: &PartEmitter<'_>) -> Result<Self, Vec<Diagnostic>> {
        let ctx = emitter.ctx;
        let chunk = &ctx.chunks.chunks[emitter.chunk];
        let root_unit = chunk.root.map(|root| ctx.linked.roots[root].unit);
        let mut externals = Self::default();
        let mut errors = Vec::new();

        for &(unit, part_id) in &chunk.parts {
            let source = ctx.graph.unit(unit);
            let part = source.part(part_id);
            if !matches!(part.kind, PartKind::Import | PartKind::ReExport) {
                continue;
            }
            for &record in &part.records {
                let ImportTarget::External(path) = ctx.graph.target(unit, record) else {
                    continue;
                };
                if ctx.options.format == Format::Iife {
                    let (line, column) =
                        source.line_column(source.import_records[record].source_span.0);
                    errors.push(
                        Diagnostic::error(
                            DiagnosticKind::Unsupported,
                            format!("Cannot use the external module \"{path}\" in the iife format"),
                        )
                        .at(&source.id, line, column)
                        .with_help("bundle the module instead, or use the esm or cjs format"),
                    );
                    continue;
                }

                // surfaced below, whichever unit of the chunk holds them
                if source.star_exports.contains(&record) {
                    continue;
                }

                let entry = externals.imports.entry(path.clone()).or_default();
                for &symbol in &part.declared {
                    let Some(binding) = &source.symbol(symbol).import else {
                        continue;
                    };
                    if binding.record != record {
                        continue;
                    }
                    let local = emitter.final_name(SymbolRef::new(unit, symbol)).to_string();
                    match &binding.imported {
                        ImportName::Namespace => {
                            if !entry.namespaces.contains(&local) {
                                entry.namespaces.push(local);
                            }
                        }
                        ImportName::Named(imported) => {
                            if !entry.named.iter().any(|(_, seen)| *seen == local) {
                                entry.named.push((imported.clone(), local));
                            }
                        }
                    }
                }
            }
        }

        if let Some(root) = root_unit
            && ctx.options.format != Format::Iife
        {
            let mut visited = vec![false; ctx.graph.len()];
            collect_stars(ctx.graph, root, &mut visited, &mut externals.stars);
        }

        if errors.is_empty() {
            Ok(externals)
        } else {
            Err(errors)
        }
    }
}

/// External `export *` targets of `unit` and of every unit it star-exports,
/// depth first in source order.
fn collect_stars(
    graph: &ModuleGraph,
    unit: UnitId,
    visited: &mut [bool],
    stars: &mut Vec<String>,
) {
    if std::mem::replace(&mut visited[unit.index()], true) {
        return;
    }
    let source = graph.unit(unit);
    for &record in &source.star_exports {
        match graph.target(unit, record) {
            ImportTarget::External(path) => {
                if !stars.contains(path) {
                    stars.push(path.clone());
                }
            }
            ImportTarget::Unit(to) => collect_stars(graph, *to, visited, stars),
            ImportTarget::Unresolved => {}
        }
    }
}

/// Writes the format-specific statements before and after a chunk's parts.
pub(crate) struct Wrapper<'a> {
    emitter: &'a PartEmitter<'a>,
    /// Names of every chunk, for cross-chunk imports.
    names: &'a [Names],
    externals: &'a Externals,
}

impl<'a> Wrapper<'a> {
    pub(crate) fn new(
        emitter: &'a PartEmitter<'a>,
        names: &'a [Names],
        externals: &'a Externals,
    ) -> Self {
        Self {
            emitter,
            names,
            externals,
        }
    }

    pub(crate) fn prologue(&self, out: &mut CodeWriter) {
        match self.emitter.ctx.options.format {
            Format::Esm => {
                self.esm_imports(out);
            }
            Format::Cjs => {
                out.push("\"use strict\";\n");
                self.cjs_exports(out);
                self.cjs_requires(out);
            }
            Format::Iife => self.iife_open(out),
        }
    }

    pub(crate) fn epilogue(&self, out: &mut CodeWriter) {
        match self.emitter.ctx.options.format {
            Format::Esm => self.esm_exports(out),
            Format::Cjs => {}
            Format::Iife => self.iife_close(out),
        }
    }

    /// Export name and local name of every binding the chunk exposes.
    pub(crate) fn export_surface(&self) -> Vec<(String, String)> {
        let ctx = self.emitter.ctx;
        let chunk = &ctx.chunks.chunks[self.emitter.chunk];
        let mut surface: Vec<(String, String)> = Vec::new();
        if let Some(root) = chunk.root {
            let unit = ctx.linked.roots[root].unit;
            for (export, &symbol) in &ctx.linked.surfaces[unit.index()] {
                surface.push((export.clone(), self.emitter.final_name(symbol).to_string()));
            }
        }
        for &symbol in &chunk.exports {
            let local = self.emitter.final_name(symbol).to_string();
            if !surface.iter().any(|(export, _)| *export == local) {
                surface.push((local.clone(), local));
            }
        }
        surface
    }

    fn esm_imports(&self, out: &mut CodeWriter) {
        for (path, import) in &self.externals.imports {
            for namespace in &import.namespaces {
                out.push(&format!("import * as {namespace} from \"{path}\";\n"));
            }
            if !import.named.is_empty() {
                let default = import
                    .named
                    .iter()
                    .position(|(imported, _)| imported == "default");
                let specifiers: Vec<String> = import
                    .named
                    .iter()
                    .enumerate()
                    .filter(|(index, _)| Some(*index) != default)
                    .map(|(_, (imported, local))| specifier(imported, local))
                    .collect();
                let clause = match default {
                    Some(index) if specifiers.is_empty() => import.named[index].1.clone(),
                    Some(index) => {
                        format!("{}, {{ {} }}", import.named[index].1, specifiers.join(", "))
                    }
                    None => format!("{{ {} }}", specifiers.join(", ")),
                };
                out.push(&format!("import {clause} from \"{path}\";\n"));
            } else if import.namespaces.is_empty() {
                out.push(&format!("import \"{path}\";\n"));
            }
        }

        let ctx = self.emitter.ctx;
        let chunk = &ctx.chunks.chunks[self.emitter.chunk];
        for import in &chunk.imports {
            let target = &ctx.chunks.chunks[import.chunk].file_name;
            let path = relative_import(&chunk.file_name, target);
            if import.symbols.is_empty() {
                out.push(&format!("import \"{path}\";\n"));
                continue;
            }
            let home = &self.names[import.chunk];
            let specifiers: Vec<String> = import
                .symbols
                .iter()
                .map(|symbol| {
                    let local = self.emitter.final_name(*symbol);
                    let exported = home.get(symbol).map(String::as_str).unwrap_or(local);
                    specifier(exported, local)
                })
                .collect();
            out.push(&format!(
                "import {{ {} }} from \"{path}\";\n",
                specifiers.join(", ")
            ));
        }
    }

    fn esm_exports(&self, out: &mut CodeWriter) {
        let surface = self.export_surface();
        if !surface.is_empty() {
            let specifiers: Vec<String> = surface
                .iter()
                .map(|(export, local)| {
                    if export == local {
                        local.clone()
                    } else {
                        format!("{local} as {}", property_key(export))
                    }
                })
                .collect();
            out.push(&format!("export {{ {} }};\n", specifiers.join(", ")));
        }
        for path in &self.externals.stars {
            out.push(&format!("export * from \"{path}\";\n"));
        }
    }

    fn cjs_exports(&self, out: &mut CodeWriter) {
        let surface = self.export_surface();
        if surface.is_empty() && self.externals.stars.is_empty() {
            return;
        }
        out.push("Object.defineProperty(exports, \"__esModule\", { value: true });\n");
        for (export, local) in &surface {
            let key = serde_json::to_string(export).unwrap_or_else(|_| format!("\"{export}\""));
            out.push(&format!(
                "Object.defineProperty(exports, {key}, {{ enumerable: true, get: () => {local} }});\n"
            ));
        }
        for path in &self.externals.stars {
            out.push(&format!(
                "Object.keys(require(\"{path}\")).forEach((key) => {{ if (key !== \"default\" && !(key in exports)) Object.defineProperty(exports, key, {{ enumerable: true, get: () => require(\"{path}\")[key] }}); }});\n"
            ));
        }
    }

    fn cjs_requires(&self, out: &mut CodeWriter) {
        for (path, import) in &self.externals.imports {
            for namespace in &import.namespaces {
                out.push(&format!("const {namespace} = require(\"{path}\");\n"));
            }
            if !import.named.is_empty() {
                let fields: Vec<String> = import
                    .named
                    .iter()
                    .map(|(imported, local)| {
                        if imported == local {
                            local.clone()
                        } else {
                            format!("{}: {local}", property_key(imported))
                        }
                    })
                    .collect();
                out.push(&format!(
                    "const {{ {} }} = require(\"{path}\");\n",
                    fields.join(", ")
                ));
            } else if import.namespaces.is_empty() {
                out.push(&format!("require(\"{path}\");\n"));
            }
        }
    }

    fn iife_open(&self, out: &mut CodeWriter) {
        let Some(global) = &self.emitter.ctx.options.global_name else {
            out.push("(() => {\n");
            return;
        };
        let segments: Vec<&str> = global.split('.').collect();
        for depth in 1..segments.len() {
            let path = segments[..depth].join(".");
            if depth == 1 {
                out.push(&format!("var {path} = {path} || {{}};\n"));
            } else {
                out.push(&format!("{path} = {path} || {{}};\n"));
            }
        }
        if segments.len() == 1 {
            out.push(&format!("var {global} = (() => {{\n"));
        } else {
            out.push(&format!("{global} = (() => {{\n"));
        }
    }

    fn iife_close(&self, out: &mut CodeWriter) {
        if self.emitter.ctx.options.global_name.is_some() {
            let getters: Vec<String> = self
                .export_surface()
                .iter()
                .map(|(export, local)| {
                    format!("  get {}() {{ return {local}; }}", property_key(export))
                })
                .collect();
            if getters.is_empty() {
                out.push("return {};\n");
            } else {
                out.push(&format!("return {{\n{}\n}};\n", getters.join(",\n")));
            }
        }
        out.push("})();\n");
    }
}

fn specifier(imported: &str, local: &str) -> String {
    if imported == local {
        local.to_string()
    } else {
        format!("{} as {local}", property_key(imported))
    }
}
