//! Text emission with source-map tracking.
//!
//! [`CodeWriter`] keeps the generated line and UTF-16 column as text is
//! appended. Text copied from a unit is mapped at every token start back to
//! the same offset in the unit; a replaced identifier is mapped to the
//! identifier it replaces, carrying its original name.

use std::path::{Component, Path};

use knit_graph::{
    ImportKind, ImportTarget, Part, PartKind, SourceUnit, SymbolKind, SymbolRef, UnitId,
};
use rustc_hash::FxHashMap;
use sourcemap::{SourceMap, SourceMapBuilder};

use super::RenderContext;
use super::renamer::Names;
use crate::chunk::{ChunkId, relative_import};

/// Replacement of one span of a unit's text.
#[derive(Debug, Clone)]
pub(crate) struct Edit {
    pub(crate) span: (u32, u32),
    pub(crate) text: String,
    /// Original identifier, recorded in the source map.
    pub(crate) name: Option<String>,
}

pub(crate) struct CodeWriter {
    code: String,
    line: u32,
    column: u32,
    map: Option<SourceMapBuilder>,
    sources: FxHashMap<UnitId, u32>,
    sources_content: bool,
}

impl CodeWriter {
    pub(crate) fn new(file: Option<&str>, sources_content: bool) -> Self {
        Self {
            code: String::new(),
            line: 0,
            column: 0,
            map: file.map(|file| SourceMapBuilder::new(Some(file))),
            sources: FxHashMap::default(),
            sources_content,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.code.len()
    }

    pub(crate) fn push(&mut self, text: &str) {
        for ch in text.chars() {
            if ch == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += ch.len_utf16() as u32;
            }
        }
        self.code.push_str(text);
    }

    pub(crate) fn set_source_root(&mut self, root: &str) {
        if let Some(map) = &mut self.map {
            map.set_source_root(Some(root));
        }
    }

    /// Register `unit` as a source under `name` (idempotent).
    pub(crate) fn add_source(&mut self, unit: UnitId, source: &SourceUnit, name: &str) {
        let Some(map) = &mut self.map else {
            return;
        };
        if self.sources.contains_key(&unit) {
            return;
        }
        let id = map.add_source(name);
        if self.sources_content {
            map.set_source_contents(id, Some(&source.source));
        }
        self.sources.insert(unit, id);
    }

    /// Map the current output position to `offset` in `unit`.
    fn mark(&mut self, unit: UnitId, source: &SourceUnit, offset: u32, name: Option<&str>) {
        let (Some(map), Some(&source_id)) = (&mut self.map, self.sources.get(&unit)) else {
            return;
        };
        let (src_line, src_col) = source.line_index.position(offset, &source.source);
        let name_id = name.map(|name| map.add_name(name));
        map.add_raw(
            self.line,
            self.column,
            src_line,
            src_col,
            Some(source_id),
            name_id,
            false,
        );
    }

    /// Copy `span` of the unit, applying `edits` that fall inside it.
    pub(crate) fn copy(
        &mut self,
        unit: UnitId,
        source: &SourceUnit,
        span: (u32, u32),
        edits: &[Edit],
    ) {
        let mut cursor = span.0;
        for edit in edits {
            if edit.span.0 < cursor || edit.span.1 > span.1 {
                continue;
            }
            self.copy_plain(unit, source, cursor, edit.span.0);
            self.mark(unit, source, edit.span.0, edit.name.as_deref());
            self.push(&edit.text);
            cursor = edit.span.1;
        }
        self.copy_plain(unit, source, cursor, span.1);
    }

    fn copy_plain(&mut self, unit: UnitId, source: &SourceUnit, start: u32, end: u32) {
        let text = source.text((start, end));
        let mut last = 0;
        for token in token_starts(text) {
            self.push(&text[last..token]);
            self.mark(unit, source, start + token as u32, None);
            last = token;
        }
        self.push(&text[last..]);
    }

    pub(crate) fn finish(self) -> (String, Option<SourceMap>) {
        (self.code, self.map.map(SourceMapBuilder::into_sourcemap))
    }
}

/// Byte offsets where tokens start. Comments and whitespace are skipped;
/// string and template literals count as one token.
pub(crate) fn token_starts(text: &str) -> Vec<usize> {
    let bytes = text.as_bytes();
    let mut starts = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let byte = bytes[i];
        match byte {
            b' ' | b'\t' | b'\n' | b'\r' => i += 1,
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
            }
            b'"' | b'\'' | b'`' => {
                starts.push(i);
                i += 1;
                while i < bytes.len() && bytes[i] != byte {
                    if bytes[i] == b'\\' {
                        i += 1;
                    } else if bytes[i] == b'\n' && byte != b'`' {
                        break;
                    }
                    i += 1;
                }
                i = (i + 1).min(bytes.len());
            }
            b'0'..=b'9' => {
                starts.push(i);
                while i < bytes.len() && (is_ident_byte(bytes[i]) || bytes[i] == b'.') {
                    i += 1;
                }
            }
            _ if is_ident_byte(byte) || byte >= 0x80 => {
                starts.push(i);
                while i < bytes.len() && (is_ident_byte(bytes[i]) || bytes[i] >= 0x80) {
                    i += 1;
                }
            }
            _ => {
                starts.push(i);
                i += 1;
            }
        }
    }
    // escapes can step past the end or into a multi-byte char
    starts.retain(|&start| text.is_char_boundary(start));
    starts
}

fn is_ident_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'$'
}

/// Whether `name` can be written as a bare identifier.
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// `name` as an object key or export name.
pub(crate) fn property_key(name: &str) -> String {
    if is_identifier(name) {
        name.to_string()
    } else {
        serde_json::to_string(name).unwrap_or_else(|_| format!("\"{name}\""))
    }
}

/// `/`-separated path from `from_dir` to `to`.
pub(crate) fn relative_path(from_dir: &Path, to: &Path) -> String {
    let from: Vec<Component<'_>> = from_dir.components().collect();
    let target: Vec<Component<'_>> = to.components().collect();
    let shared = from
        .iter()
        .zip(&target)
        .take_while(|(a, b)| a == b)
        .count();

    let mut segments: Vec<String> = vec!["..".to_string(); from.len() - shared];
    segments.extend(
        target[shared..]
            .iter()
            .map(|component| component.as_os_str().to_string_lossy().into_owned()),
    );
    segments.join("/")
}

/// Emits the parts of one chunk.
pub(crate) struct PartEmitter<'a> {
    pub(crate) ctx: &'a RenderContext<'a>,
    pub(crate) chunk: ChunkId,
    pub(crate) names: &'a Names,
}

impl PartEmitter<'_> {
    pub(crate) fn final_name(&self, symbol: SymbolRef) -> &str {
        let canonical = self.ctx.linked.canonical(symbol);
        self.names
            .get(&canonical)
            .map(String::as_str)
            .unwrap_or_else(|| {
                self.ctx
                    .graph
                    .unit(canonical.unit)
                    .symbol(canonical.symbol)
                    .name
                    .as_str()
            })
    }

    /// Identifier renames and dynamic-import rewrites for one part, sorted.
    pub(crate) fn edits(&self, unit: UnitId, part: &Part) -> Vec<Edit> {
        let source = self.ctx.graph.unit(unit);
        let mut edits = Vec::new();

        for occurrence in &part.occurrences {
            let original = source.text(occurrence.span);
            let renamed = self.final_name(SymbolRef::new(unit, occurrence.symbol));
            if renamed == original {
                continue;
            }
            let text = if occurrence.shorthand {
                format!("{original}: {renamed}")
            } else {
                renamed.to_string()
            };
            edits.push(Edit {
                span: occurrence.span,
                text,
                name: Some(original.to_string()),
            });
        }

        for &record in &part.records {
            let import = &source.import_records[record];
            if import.kind != ImportKind::Dynamic {
                continue;
            }
            let ImportTarget::Unit(target) = self.ctx.graph.target(unit, record) else {
                continue;
            };
            let text = if self.ctx.options.splitting {
                let Some(chunk) = self
                    .ctx
                    .linked
                    .root_of(*target)
                    .map(|root| self.ctx.chunks.root_chunks[root])
                else {
                    continue;
                };
                let from = &self.ctx.chunks.chunks[self.chunk].file_name;
                let to = &self.ctx.chunks.chunks[chunk].file_name;
                format!("import(\"{}\")", relative_import(from, to))
            } else {
                let namespace = self.ctx.graph.unit(*target).namespace_symbol;
                format!(
                    "Promise.resolve().then(() => {})",
                    self.final_name(SymbolRef::new(*target, namespace))
                )
            };
            edits.push(Edit {
                span: import.span,
                text,
                name: None,
            });
        }

        edits.sort_by_key(|edit| edit.span);
        edits
    }

    /// Emit one part. Parts with no runtime code write nothing.
    pub(crate) fn emit_part(&self, out: &mut CodeWriter, unit: UnitId, part: &Part) {
        let source = self.ctx.graph.unit(unit);
        match &part.kind {
            PartKind::Statement => {
                let edits = self.edits(unit, part);
                out.copy(unit, source, part.span, &edits);
                finish_statement(out, part);
            }
            PartKind::ExportDecl { body } => {
                let edits = self.edits(unit, part);
                out.copy(unit, source, *body, &edits);
                finish_statement(out, part);
            }
            PartKind::DefaultExpr { expr } => {
                let name = self.default_name(unit, part);
                out.mark(unit, source, part.span.0, None);
                out.push(&format!("var {name} = "));
                let edits = self.edits(unit, part);
                out.copy(unit, source, *expr, &edits);
                out.push(";\n");
            }
            PartKind::DefaultAnonymous { keyword, rest } => {
                let name = self.default_name(unit, part);
                out.mark(unit, source, part.span.0, None);
                out.push(&format!("{keyword} {name}"));
                let edits = self.edits(unit, part);
                out.copy(unit, source, *rest, &edits);
                out.push("\n");
            }
            PartKind::Import
            | PartKind::ReExport
            | PartKind::ExportList
            | PartKind::Namespace
            | PartKind::Css => {}
        }
    }

    fn default_name(&self, unit: UnitId, part: &Part) -> String {
        let source = self.ctx.graph.unit(unit);
        part.declared
            .iter()
            .find(|&&symbol| source.symbol(symbol).kind == SymbolKind::DefaultExport)
            .map(|&symbol| self.final_name(SymbolRef::new(unit, symbol)).to_string())
            .unwrap_or_else(|| format!("{}_default", source.id.stem()))
    }

    /// `var ns = Object.freeze({ … })` for a unit's namespace object.
    pub(crate) fn emit_namespace(&self, out: &mut CodeWriter, unit: UnitId) {
        let source = self.ctx.graph.unit(unit);
        let name = self.final_name(SymbolRef::new(unit, source.namespace_symbol));
        let getters: Vec<String> = self.ctx.linked.surfaces[unit.index()]
            .iter()
            .map(|(export, &symbol)| {
                format!(
                    "  get {}() {{ return {}; }}",
                    property_key(export),
                    self.final_name(symbol)
                )
            })
            .collect();
        if getters.is_empty() {
            out.push(&format!("var {name} = Object.freeze({{ __proto__: null }});\n"));
        } else {
            out.push(&format!(
                "var {name} = Object.freeze({{\n  __proto__: null,\n{}\n}});\n",
                getters.join(",\n")
            ));
        }
    }
}

fn finish_statement(out: &mut CodeWriter, part: &Part) {
    if part.needs_semicolon {
        out.push(";");
    }
    out.push("\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_skip_comments_and_whitespace() {
        let text = "const a = 'x y'; // note\n/* block */ f(a.b, 1.5);";
        let tokens: Vec<&str> = token_starts(text)
            .into_iter()
            .map(|start| &text[start..start + 1])
            .collect();
        assert_eq!(
            tokens,
            ["c", "a", "=", "'", ";", "f", "(", "a", ".", "b", ",", "1", ")", ";"]
        );
    }

    #[test]
    fn tokens_stay_on_char_boundaries() {
        let text = "const é = \"😀\\\"\"; ünï";
        for start in token_starts(text) {
            assert!(text.is_char_boundary(start));
        }
    }

    #[test]
    fn writer_tracks_utf16_columns() {
        let mut out = CodeWriter::new(None, false);
        out.push("😀a\nbc");
        assert_eq!((out.line, out.column), (1, 2));
        assert_eq!(out.len(), "😀a\nbc".len());
    }

    #[test]
    fn property_keys_are_quoted_when_needed() {
        assert_eq!(property_key("default"), "default");
        assert_eq!(property_key("a-b"), "\"a-b\"");
        assert_eq!(property_key("$ok_1"), "$ok_1");
    }

    #[test]
    fn relative_paths_between_dirs() {
        assert_eq!(
            relative_path(Path::new("/p/dist"), Path::new("/p/src/a.js")),
            "../src/a.js"
        );
        assert_eq!(
            relative_path(Path::new("/p"), Path::new("/p/src/a.js")),
            "src/a.js"
        );
    }
}
