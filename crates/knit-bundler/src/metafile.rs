//! Build metadata in the shape esbuild's metafile uses, so existing
//! bundle analyzers can read it.

use std::collections::BTreeMap;
use std::path::Path;

use knit_graph::{ImportTarget, ModuleGraph, UnitId};
use serde::Serialize;

use crate::render::RenderedChunk;

#[derive(Debug, Default, Serialize)]
pub struct Metafile {
    pub inputs: BTreeMap<String, MetaInput>,
    pub outputs: BTreeMap<String, MetaOutput>,
}

#[derive(Debug, Serialize)]
pub struct MetaInput {
    pub bytes: usize,
    pub imports: Vec<MetaImport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetaImport {
    pub path: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub external: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaOutput {
    pub bytes: usize,
    pub inputs: BTreeMap<String, MetaOutputInput>,
    pub imports: Vec<MetaImport>,
    pub exports: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaOutputInput {
    pub bytes_in_output: usize,
}

/// Collects metafile entries; paths are relative to the working directory.
pub(crate) struct MetafileBuilder<'a> {
    graph: &'a ModuleGraph,
    cwd: &'a Path,
    out_dir: &'a Path,
    metafile: Metafile,
}

impl<'a> MetafileBuilder<'a> {
    pub(crate) fn new(graph: &'a ModuleGraph, cwd: &'a Path, out_dir: &'a Path) -> Self {
        Self {
            graph,
            cwd,
            out_dir,
            metafile: Metafile::default(),
        }
    }

    fn input_path(&self, unit: UnitId) -> String {
        let id = &self.graph.unit(unit).id;
        if id.is_virtual() {
            id.to_string()
        } else {
            relative_to(self.cwd, id.as_path())
        }
    }

    /// Output file path as the metafile names it.
    pub(crate) fn output_path(&self, file_name: &str) -> String {
        relative_to(self.cwd, &self.out_dir.join(file_name))
    }

    pub(crate) fn add_inputs(&mut self) {
        for unit in self.graph.unit_ids() {
            let source = self.graph.unit(unit);
            let imports = source
                .import_records
                .iter()
                .enumerate()
                .filter_map(|(index, record)| {
                    let (path, external) = match self.graph.target(unit, index) {
                        ImportTarget::Unit(target) => (self.input_path(*target), false),
                        ImportTarget::External(path) => (path.clone(), true),
                        ImportTarget::Unresolved => return None,
                    };
                    Some(MetaImport {
                        path,
                        kind: record.kind.as_str(),
                        external,
                    })
                })
                .collect();
            let input = MetaInput {
                bytes: source.source.len(),
                imports,
            };
            let path = self.input_path(unit);
            self.metafile.inputs.insert(path, input);
        }
    }

    /// Record one rendered chunk. `entry` is the unit of an entry chunk.
    pub(crate) fn add_chunk(&mut self, chunk: &RenderedChunk, entry: Option<UnitId>) {
        let inputs = chunk
            .inputs
            .iter()
            .map(|&(unit, bytes)| {
                (
                    self.input_path(unit),
                    MetaOutputInput {
                        bytes_in_output: bytes,
                    },
                )
            })
            .collect();
        let imports = chunk
            .imports
            .iter()
            .map(|(path, kind, external)| MetaImport {
                path: if *external {
                    path.clone()
                } else {
                    self.output_path(path)
                },
                kind: *kind,
                external: *external,
            })
            .collect();
        let output = MetaOutput {
            bytes: chunk.code.len(),
            inputs,
            imports,
            exports: chunk.exports.clone(),
            entry_point: entry.map(|unit| self.input_path(unit)),
        };
        let path = self.output_path(&chunk.file_name);
        self.metafile.outputs.insert(path, output);
    }

    /// Record a side file (source map or stylesheet) of `bytes` length.
    pub(crate) fn add_file(&mut self, file_name: &str, bytes: usize) {
        let output = MetaOutput {
            bytes,
            inputs: BTreeMap::new(),
            imports: Vec::new(),
            exports: Vec::new(),
            entry_point: None,
        };
        let path = self.output_path(file_name);
        self.metafile.outputs.insert(path, output);
    }

    pub(crate) fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.metafile)
    }
}

fn relative_to(base: &Path, path: &Path) -> String {
    match path.strip_prefix(base) {
        Ok(rel) => rel
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.to_string_lossy().into_owned(),
    }
}
