//! Parallel construction of the module graph.
//!
//! The scanner works in frontiers. Every unit discovered in the previous
//! round is loaded and parsed in parallel; then every distinct
//! `(directory, specifier)` pair those units import is resolved in
//! parallel. Only the coordinating thread touches the graph under
//! construction: workers return values, the coordinator folds them in in
//! frontier order, so unit ids and therefore every later decision keyed on
//! them are independent of thread scheduling.
//!
//! ```text
//!   entries ──▶ [frontier] ──par load/parse──▶ units
//!                   ▲                            │
//!                   │                 par resolve unique specifiers
//!                   │                            │
//!                   └──── newly discovered ◀─────┘
//! ```

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use path_clean::PathClean;
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::cache::{ContentHash, UnitCache};
use crate::dependency_chain::DependencyChain;
use crate::diagnostic::{Diagnostic, DiagnosticContext, DiagnosticKind};
use crate::graph::{ImportTarget, ModuleGraph, ModuleNode, UnitId};
use crate::loader::Loader;
use crate::module_id::ModuleId;
use crate::runtime::{
    LoadedSource, ResolveRequest, Resolution, Runtime, RuntimeError, is_path_specifier,
};
use crate::unit::{ImportKind, ParseOptions, SourceUnit, parse_unit};

/// Shared flag used to abandon a build.
///
/// Workers check it before each parse and the coordinator between
/// frontiers. Nothing outside the scan observes a cancelled scan's state.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear the flag so the next build can run.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Options that affect discovery.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Specifiers left as imports. Exact names, or one `*` wildcard;
    /// a package name also covers its subpaths.
    pub external: Vec<String>,
    /// Treat every bare specifier as external.
    pub packages_external: bool,
    /// Loader overrides keyed by extension without the dot.
    pub loaders: FxHashMap<String, Loader>,
    /// Specifier prefixes rewritten before the external check and
    /// resolution.
    pub alias: FxHashMap<String, String>,
    pub parse: ParseOptions,
}

impl ScanOptions {
    pub fn is_external(&self, specifier: &str) -> bool {
        if self.packages_external && !is_path_specifier(specifier) {
            return true;
        }
        self.external
            .iter()
            .any(|pattern| external_matches(pattern, specifier))
    }

    /// `specifier` with its longest matching alias applied. Relative
    /// targets are anchored at `cwd` so every importer gets the same file.
    pub fn aliased<'s>(&self, specifier: &'s str, cwd: &Path) -> Cow<'s, str> {
        let matched = self
            .alias
            .iter()
            .filter_map(|(from, to)| {
                let rest = specifier.strip_prefix(from.as_str())?;
                (rest.is_empty() || rest.starts_with('/')).then_some((from.len(), to, rest))
            })
            .max_by_key(|(len, _, _)| *len);
        let Some((_, to, rest)) = matched else {
            return Cow::Borrowed(specifier);
        };

        let target = format!("{to}{rest}");
        if target.starts_with("./") || target.starts_with("../") {
            Cow::Owned(cwd.join(target).clean().to_string_lossy().into_owned())
        } else {
            Cow::Owned(target)
        }
    }

    fn loader_for(&self, id: &ModuleId) -> Loader {
        id.as_path()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.loaders.get(ext).copied())
            .unwrap_or_else(|| Loader::from_path(id.as_path()))
    }
}

fn external_matches(pattern: &str, specifier: &str) -> bool {
    match pattern.split_once('*') {
        Some((prefix, suffix)) => {
            specifier.len() >= prefix.len() + suffix.len()
                && specifier.starts_with(prefix)
                && specifier.ends_with(suffix)
        }
        None => {
            specifier == pattern
                || specifier
                    .strip_prefix(pattern)
                    .is_some_and(|rest| rest.starts_with('/'))
        }
    }
}

/// One root handed to the scanner.
#[derive(Debug, Clone)]
pub enum ScanInput {
    /// A specifier resolved against the runtime's working directory.
    Path(String),
    /// Literal source text under a virtual identity.
    Source {
        name: String,
        contents: String,
        loader: Loader,
        /// Directory its imports resolve against (defaults to the cwd).
        resolve_dir: Option<PathBuf>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("build cancelled")]
    Cancelled,

    #[error("scan failed with {} error(s)", .0.len())]
    Failed(Vec<Diagnostic>),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// A unit known by identity whose text may not be loaded yet.
struct Slot {
    id: ModuleId,
    resolve_dir: PathBuf,
    provided: Option<LoadedSource>,
    side_effects: Option<bool>,
    is_entry: bool,
    parent: Option<UnitId>,
    unit: Option<Arc<SourceUnit>>,
    targets: Vec<ImportTarget>,
}

pub struct Scanner<'a> {
    runtime: &'a dyn Runtime,
    options: &'a ScanOptions,
    cache: Option<&'a UnitCache>,
    cancel: CancelToken,
}

impl<'a> Scanner<'a> {
    pub fn new(runtime: &'a dyn Runtime, options: &'a ScanOptions) -> Self {
        Self {
            runtime,
            options,
            cache: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cache(mut self, cache: &'a UnitCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Discover every unit reachable from `inputs`.
    ///
    /// All load, parse and resolution failures are collected before
    /// returning [`ScanError::Failed`].
    pub fn scan(&self, inputs: &[ScanInput]) -> Result<ModuleGraph, ScanError> {
        let span = tracing::debug_span!("scan", entries = inputs.len());
        let _guard = span.enter();

        let cwd = self.runtime.cwd()?;
        let mut state = ScanState::default();
        let mut diagnostics = Vec::new();
        let mut entries = Vec::with_capacity(inputs.len());

        for input in inputs {
            match self.entry_slot(input, &cwd) {
                Ok(slot) => {
                    let unit = state.discover(slot);
                    state.slots[unit.index()].is_entry = true;
                    entries.push(unit);
                }
                Err(diagnostic) => diagnostics.push(*diagnostic),
            }
        }

        let mut frontier: Vec<UnitId> = state.take_new();
        let mut resolutions: FxHashMap<(PathBuf, String), Result<Resolution, String>> =
            FxHashMap::default();

        while !frontier.is_empty() {
            if self.cancel.is_cancelled() {
                return Err(ScanError::Cancelled);
            }
            tracing::debug!(units = frontier.len(), "scanning frontier");

            let parsed: Vec<Option<Result<Arc<SourceUnit>, Vec<Diagnostic>>>> = frontier
                .par_iter()
                .map(|&unit| {
                    if self.cancel.is_cancelled() {
                        return None;
                    }
                    Some(self.load_and_parse(&state.slots[unit.index()]))
                })
                .collect();

            let mut requests: Vec<(PathBuf, String, ImportKind, ModuleId)> = Vec::new();
            for (&unit, result) in frontier.iter().zip(parsed) {
                match result {
                    None => return Err(ScanError::Cancelled),
                    Some(Err(errors)) => diagnostics.extend(errors),
                    Some(Ok(source_unit)) => {
                        let slot = &mut state.slots[unit.index()];
                        for record in &source_unit.import_records {
                            let specifier = self.options.aliased(&record.specifier, &cwd);
                            let key = (slot.resolve_dir.clone(), specifier.into_owned());
                            if !self.options.is_external(&key.1)
                                && !resolutions.contains_key(&key)
                            {
                                requests.push((key.0, key.1, record.kind, slot.id.clone()));
                            }
                        }
                        slot.unit = Some(source_unit);
                    }
                }
            }

            requests.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
            requests.dedup_by(|a, b| a.0 == b.0 && a.1 == b.1);
            let resolved: Vec<Result<Resolution, String>> = requests
                .par_iter()
                .map(|(dir, specifier, kind, importer)| {
                    let request = ResolveRequest {
                        specifier,
                        importer: Some(importer),
                        resolve_dir: dir,
                        kind: *kind,
                    };
                    self.runtime
                        .resolve(&request)
                        .map_err(|err| err.to_string())
                })
                .collect();
            for ((dir, specifier, _, _), result) in requests.into_iter().zip(resolved) {
                resolutions.insert((dir, specifier), result);
            }

            for &unit in &frontier {
                self.link_records(unit, &cwd, &mut state, &resolutions, &mut diagnostics);
            }
            frontier = state.take_new();
        }

        if diagnostics.iter().any(Diagnostic::is_error) {
            return Err(ScanError::Failed(diagnostics));
        }

        let mut nodes = Vec::with_capacity(state.slots.len());
        for slot in state.slots {
            let Some(unit) = slot.unit else {
                return Err(ScanError::Failed(vec![
                    Diagnostic::internal(format!(
                        "unit {} was discovered but never parsed",
                        slot.id
                    ))
                    .in_file(&slot.id),
                ]));
            };
            nodes.push(ModuleNode {
                unit,
                targets: slot.targets,
                side_effects: slot.side_effects,
                is_entry: slot.is_entry,
                parent: slot.parent,
            });
        }

        tracing::debug!(units = nodes.len(), "scan complete");
        Ok(ModuleGraph::from_nodes(nodes, entries))
    }

    fn entry_slot(&self, input: &ScanInput, cwd: &Path) -> Result<Slot, Box<Diagnostic>> {
        match input {
            ScanInput::Path(specifier) => {
                let specifier = if is_path_specifier(specifier) {
                    specifier.clone()
                } else {
                    format!("./{specifier}")
                };
                let request = ResolveRequest {
                    specifier: &specifier,
                    importer: None,
                    resolve_dir: cwd,
                    kind: ImportKind::Static,
                };
                match self.runtime.resolve(&request) {
                    Ok(Resolution::Module { id, side_effects }) => Ok(Slot::new(
                        id.resolve_dir().unwrap_or(cwd).to_path_buf(),
                        id,
                        side_effects,
                        None,
                    )),
                    Ok(Resolution::External { path }) => Err(Box::new(Diagnostic::error(
                        DiagnosticKind::Unsupported,
                        format!("Entry point \"{path}\" cannot be marked as external"),
                    ))),
                    Err(err) => Err(Box::new(
                        Diagnostic::error(
                            DiagnosticKind::UnresolvedImport,
                            format!("Could not resolve entry point \"{specifier}\""),
                        )
                        .with_note(err.to_string()),
                    )),
                }
            }
            ScanInput::Source {
                name,
                contents,
                loader,
                resolve_dir,
            } => {
                let id = ModuleId::new_virtual(name.clone()).map_err(|err| {
                    Box::new(Diagnostic::error(DiagnosticKind::LoadFailed, err.to_string()))
                })?;
                let mut slot = Slot::new(
                    resolve_dir.clone().unwrap_or_else(|| cwd.to_path_buf()),
                    id,
                    None,
                    None,
                );
                slot.provided = Some(LoadedSource {
                    contents: contents.clone(),
                    loader: Some(*loader),
                });
                Ok(slot)
            }
        }
    }

    fn load_and_parse(&self, slot: &Slot) -> Result<Arc<SourceUnit>, Vec<Diagnostic>> {
        let loaded = match &slot.provided {
            Some(provided) => provided.clone(),
            None => self.runtime.load(&slot.id).map_err(|err| {
                vec![
                    Diagnostic::error(DiagnosticKind::LoadFailed, err.to_string())
                        .in_file(&slot.id),
                ]
            })?,
        };

        let hash = ContentHash::of(&loaded.contents);
        if let Some(unit) = self.cache.and_then(|cache| cache.get(&slot.id, hash)) {
            tracing::trace!(unit = %slot.id, "reused cached unit");
            return Ok(unit);
        }

        let loader = loaded
            .loader
            .unwrap_or_else(|| self.options.loader_for(&slot.id));
        let unit = Arc::new(parse_unit(
            slot.id.clone(),
            loader,
            &loaded.contents,
            &self.options.parse,
        )?);
        tracing::debug!(
            unit = %slot.id,
            parts = unit.parts.len(),
            records = unit.import_records.len(),
            "parsed unit"
        );

        if let Some(cache) = self.cache {
            cache.insert(unit.clone());
        }
        Ok(unit)
    }

    /// Resolve the targets of one parsed unit's records, discovering new
    /// units in record order.
    fn link_records(
        &self,
        unit: UnitId,
        cwd: &Path,
        state: &mut ScanState,
        resolutions: &FxHashMap<(PathBuf, String), Result<Resolution, String>>,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        let Some(source_unit) = state.slots[unit.index()].unit.clone() else {
            return;
        };
        let resolve_dir = state.slots[unit.index()].resolve_dir.clone();

        let mut targets = Vec::with_capacity(source_unit.import_records.len());
        for record in &source_unit.import_records {
            let specifier = self.options.aliased(&record.specifier, cwd);
            if self.options.is_external(&specifier) {
                targets.push(ImportTarget::External(specifier.into_owned()));
                continue;
            }

            let key = (resolve_dir.clone(), specifier.into_owned());
            let target = match resolutions.get(&key) {
                Some(Ok(Resolution::External { path })) => ImportTarget::External(path.clone()),
                Some(Ok(Resolution::Module { id, side_effects })) => {
                    let to = match state.lookup(id) {
                        Some(existing) => existing,
                        None => {
                            let dir = id
                                .resolve_dir()
                                .map(Path::to_path_buf)
                                .unwrap_or_else(|| resolve_dir.clone());
                            state.discover(Slot::new(dir, id.clone(), *side_effects, Some(unit)))
                        }
                    };
                    ImportTarget::Unit(to)
                }
                Some(Err(_)) | None if record.in_dead_branch => ImportTarget::Unresolved,
                failure => {
                    let reason = match failure {
                        Some(Err(reason)) => reason.clone(),
                        _ => "resolver produced no answer".to_string(),
                    };
                    diagnostics.push(self.unresolved(state, unit, &source_unit, record, reason));
                    ImportTarget::Unresolved
                }
            };
            targets.push(target);
        }

        state.slots[unit.index()].targets = targets;
    }

    fn unresolved(
        &self,
        state: &ScanState,
        unit: UnitId,
        source_unit: &SourceUnit,
        record: &crate::unit::ImportRecord,
        reason: String,
    ) -> Diagnostic {
        let chain = state.chain(unit);
        let (line, column) = source_unit.line_column(record.source_span.0);
        let mut diagnostic = Diagnostic::error(
            DiagnosticKind::UnresolvedImport,
            format!("Could not resolve \"{}\"", record.specifier),
        )
        .at(&source_unit.id, line, column)
        .with_note(reason);

        if chain.depth > 0 {
            diagnostic = diagnostic.with_note(format!("import chain: {}", chain.format_chain()));
        }
        if !is_path_specifier(&record.specifier) {
            diagnostic = diagnostic.with_help(format!(
                "mark \"{}\" as external to leave the import in place",
                record.specifier
            ));
        }
        diagnostic.with_context(DiagnosticContext::UnresolvedImport {
            specifier: record.specifier.clone(),
            from_file: source_unit.id.to_string(),
            chain: chain.to_strings(),
        })
    }
}

impl Slot {
    fn new(
        resolve_dir: PathBuf,
        id: ModuleId,
        side_effects: Option<bool>,
        parent: Option<UnitId>,
    ) -> Self {
        Self {
            id,
            resolve_dir,
            provided: None,
            side_effects,
            is_entry: false,
            parent,
            unit: None,
            targets: Vec::new(),
        }
    }
}

#[derive(Default)]
struct ScanState {
    slots: Vec<Slot>,
    index: FxHashMap<ModuleId, UnitId>,
    /// Discovered since the last `take_new`.
    pending: Vec<UnitId>,
}

impl ScanState {
    fn lookup(&self, id: &ModuleId) -> Option<UnitId> {
        self.index.get(id).copied()
    }

    /// Register a slot unless its identity is already known.
    fn discover(&mut self, slot: Slot) -> UnitId {
        if let Some(existing) = self.lookup(&slot.id) {
            return existing;
        }
        let unit = UnitId(self.slots.len() as u32);
        self.index.insert(slot.id.clone(), unit);
        self.slots.push(slot);
        self.pending.push(unit);
        unit
    }

    fn take_new(&mut self) -> Vec<UnitId> {
        std::mem::take(&mut self.pending)
    }

    fn chain(&self, unit: UnitId) -> DependencyChain {
        let mut path = vec![self.slots[unit.index()].id.clone()];
        let mut current = self.slots[unit.index()].parent;
        while let Some(parent) = current {
            path.push(self.slots[parent.index()].id.clone());
            current = self.slots[parent.index()].parent;
        }
        path.reverse();
        DependencyChain::new(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_patterns() {
        assert!(external_matches("react", "react"));
        assert!(external_matches("react", "react/jsx-runtime"));
        assert!(!external_matches("react", "react-dom"));
        assert!(external_matches("@scope/*", "@scope/pkg"));
        assert!(external_matches("*.png", "./img/logo.png"));
        assert!(!external_matches("*.png", "./img/logo.svg"));

        let options = ScanOptions {
            packages_external: true,
            ..ScanOptions::default()
        };
        assert!(options.is_external("lodash"));
        assert!(!options.is_external("./local"));
    }

    #[test]
    fn aliases_take_the_longest_prefix() {
        let options = ScanOptions {
            alias: [
                ("@app".to_string(), "./src".to_string()),
                ("@app/ui".to_string(), "design-system".to_string()),
                ("lodash".to_string(), "lodash-es".to_string()),
            ]
            .into_iter()
            .collect(),
            ..ScanOptions::default()
        };
        let cwd = Path::new("/p");
        assert_eq!(options.aliased("@app/util", cwd), "/p/src/util");
        assert_eq!(options.aliased("@app", cwd), "/p/src");
        assert_eq!(options.aliased("@app/ui/button", cwd), "design-system/button");
        assert_eq!(options.aliased("lodash/map", cwd), "lodash-es/map");
        assert_eq!(options.aliased("lodash-fp", cwd), "lodash-fp");
        assert!(matches!(options.aliased("./local", cwd), Cow::Borrowed(_)));
    }

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
        token.reset();
        assert!(!clone.is_cancelled());
    }
}
