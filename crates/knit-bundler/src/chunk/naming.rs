//! Output paths for chunks.
//!
//! Templates use `[name]`, `[dir]` and `[hash]`. `[dir]` is the entry's
//! directory relative to the output base; `[hash]` is the first eight hex
//! digits of a blake3 digest over the chunk's membership, so a chunk keeps
//! its name for as long as it holds the same parts.

use std::path::{Component, Path, PathBuf};

use knit_graph::{ModuleGraph, ModuleId, PartId, UnitId};

const HASH_LEN: usize = 8;

#[derive(Debug)]
pub(crate) struct Namer<'a> {
    graph: &'a ModuleGraph,
    outbase: Option<PathBuf>,
    out_extension: &'a str,
}

impl<'a> Namer<'a> {
    pub(crate) fn new(
        graph: &'a ModuleGraph,
        outbase: Option<&Path>,
        out_extension: &'a str,
    ) -> Self {
        let outbase = outbase
            .map(Path::to_path_buf)
            .or_else(|| common_ancestor(graph));
        Self {
            graph,
            outbase,
            out_extension,
        }
    }

    /// Path of a unit relative to the output base, `/`-separated.
    pub(crate) fn relative(&self, id: &ModuleId) -> String {
        if id.is_virtual() {
            return id.to_string();
        }
        match &self.outbase {
            Some(base) => match id.as_path().strip_prefix(base) {
                Ok(rel) => slashed(rel),
                Err(_) => id.to_string(),
            },
            None => id.to_string(),
        }
    }

    /// `[dir]` for a unit: its directory below the output base.
    fn dir(&self, id: &ModuleId) -> String {
        match (&self.outbase, id.resolve_dir()) {
            (Some(base), Some(dir)) => dir.strip_prefix(base).map(slashed).unwrap_or_default(),
            _ => String::new(),
        }
    }

    fn name(&self, id: &ModuleId) -> String {
        let text = id.to_string();
        let file = text.rsplit(['/', '\\', ':']).next().unwrap_or(&text);
        match file.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem.to_string(),
            _ => file.to_string(),
        }
    }

    pub(crate) fn hash(&self, parts: &[(UnitId, PartId)]) -> String {
        let mut hasher = blake3::Hasher::new();
        for (unit, part) in parts {
            hasher.update(self.relative(&self.graph.unit(*unit).id).as_bytes());
            hasher.update(format!(":{}\n", part.0).as_bytes());
        }
        let hex = hasher.finalize().to_hex();
        hex.as_str()[..HASH_LEN].to_string()
    }

    /// File name of a chunk rooted at `unit` (entry or dynamic entry).
    pub(crate) fn root_path(&self, unit: UnitId, template: &str, hash: &str) -> String {
        let id = &self.graph.unit(unit).id;
        self.fill(template, &self.name(id), &self.dir(id), hash)
    }

    /// File name of a shared chunk.
    pub(crate) fn shared_path(&self, template: &str, hash: &str) -> String {
        self.fill(template, "chunk", "", hash)
    }

    fn fill(&self, template: &str, name: &str, dir: &str, hash: &str) -> String {
        let filled = template
            .replace("[name]", name)
            .replace("[dir]", dir)
            .replace("[hash]", hash);
        let mut path = normalize(&filled);
        path.push_str(self.out_extension);
        path
    }
}

/// Deepest directory containing every non-virtual entry.
fn common_ancestor(graph: &ModuleGraph) -> Option<PathBuf> {
    let mut dirs = graph
        .entries()
        .iter()
        .filter_map(|&entry| graph.unit(entry).id.resolve_dir());
    let first = dirs.next()?;
    let mut common: Vec<Component<'_>> = first.components().collect();
    for dir in dirs {
        let shared = common
            .iter()
            .zip(dir.components())
            .take_while(|(a, b)| **a == *b)
            .count();
        common.truncate(shared);
    }
    Some(common.iter().collect())
}

fn slashed(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Drop empty and `.` segments left by empty placeholders.
fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}
