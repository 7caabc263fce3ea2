//! Stylesheet sidecars.

use knit_graph::PartKind;

use super::RenderContext;
use crate::chunk::ChunkId;

/// Concatenated css of a chunk's units in execution order, if it has any.
pub(crate) fn stylesheet(ctx: &RenderContext<'_>, chunk: ChunkId) -> Option<String> {
    let chunk_ref = &ctx.chunks.chunks[chunk];
    let mut out = String::new();
    for &(unit, part) in &chunk_ref.parts {
        let source = ctx.graph.unit(unit);
        let part = source.part(part);
        if part.kind != PartKind::Css {
            continue;
        }
        out.push_str(&format!(
            "/* {} */\n",
            ctx.source_name(&chunk_ref.file_name, unit)
        ));
        out.push_str(source.text(part.span).trim_end());
        out.push('\n');
    }
    (!out.is_empty()).then_some(out)
}

/// `index.js` -> `index.css`
pub(crate) fn sidecar_path(file_name: &str, out_extension: &str) -> String {
    let stem = file_name.strip_suffix(out_extension).unwrap_or(file_name);
    format!("{stem}.css")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidecar_replaces_the_output_extension() {
        assert_eq!(sidecar_path("admin/page.js", ".js"), "admin/page.css");
        assert_eq!(sidecar_path("index.mjs", ".mjs"), "index.css");
    }
}
