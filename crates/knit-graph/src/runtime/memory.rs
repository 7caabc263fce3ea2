//! In-memory runtime.
//!
//! Holds a virtual file system keyed by absolute, cleaned paths. Hosts use
//! it to bundle generated sources; the test suites use it everywhere.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use path_clean::PathClean;
use rustc_hash::FxHashMap;

use super::{
    LoadedSource, ResolveRequest, Resolution, Runtime, RuntimeError, RuntimeResult, probe_path,
};
use crate::module_id::ModuleId;

/// Runtime backed by a map of virtual files.
#[derive(Debug, Clone)]
pub struct MemoryRuntime {
    files: Arc<RwLock<FxHashMap<PathBuf, String>>>,
    side_effects: Arc<RwLock<FxHashMap<PathBuf, bool>>>,
    externals: Arc<RwLock<Vec<String>>>,
    cwd: PathBuf,
}

impl MemoryRuntime {
    /// Create an empty runtime rooted at `cwd`.
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            files: Arc::new(RwLock::new(FxHashMap::default())),
            side_effects: Arc::new(RwLock::new(FxHashMap::default())),
            externals: Arc::new(RwLock::new(Vec::new())),
            cwd: cwd.into(),
        }
    }

    /// Builder-style [`MemoryRuntime::add_file`].
    pub fn with_file(self, path: impl AsRef<Path>, contents: impl Into<String>) -> Self {
        self.add_file(path, contents);
        self
    }

    /// Add (or replace) a virtual file. Relative paths are joined to the cwd.
    pub fn add_file(&self, path: impl AsRef<Path>, contents: impl Into<String>) {
        let normalized = self.normalize(path.as_ref());
        self.files.write().insert(normalized, contents.into());
    }

    /// Remove a virtual file, returning its previous contents.
    pub fn remove_file(&self, path: impl AsRef<Path>) -> Option<String> {
        let normalized = self.normalize(path.as_ref());
        self.files.write().remove(&normalized)
    }

    /// Assert whether a file has side effects (`false` = safe to drop when unused).
    pub fn set_side_effects(&self, path: impl AsRef<Path>, side_effects: bool) {
        let normalized = self.normalize(path.as_ref());
        self.side_effects.write().insert(normalized, side_effects);
    }

    /// Treat a bare specifier as external instead of failing to resolve it.
    pub fn add_external(&self, specifier: impl Into<String>) {
        self.externals.write().push(specifier.into());
    }

    /// Check whether a virtual file exists.
    pub fn has_file(&self, path: &Path) -> bool {
        self.files.read().contains_key(&self.normalize(path))
    }

    fn normalize(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.clean()
        } else {
            self.cwd.join(path).clean()
        }
    }
}

impl Runtime for MemoryRuntime {
    fn resolve(&self, request: &ResolveRequest<'_>) -> RuntimeResult<Resolution> {
        if self
            .externals
            .read()
            .iter()
            .any(|ext| ext == request.specifier)
        {
            return Ok(Resolution::External {
                path: request.specifier.to_string(),
            });
        }

        let files = self.files.read();
        let path = probe_path(request, |candidate| files.contains_key(candidate))?;
        let side_effects = self.side_effects.read().get(&path).copied();
        let id = ModuleId::new(&path).map_err(|e| RuntimeError::Other(e.to_string()))?;

        Ok(Resolution::Module { id, side_effects })
    }

    fn load(&self, id: &ModuleId) -> RuntimeResult<LoadedSource> {
        self.files
            .read()
            .get(id.as_path())
            .map(|contents| LoadedSource::new(contents.clone()))
            .ok_or_else(|| RuntimeError::FileNotFound(id.as_path().to_path_buf()))
    }

    fn cwd(&self) -> RuntimeResult<PathBuf> {
        Ok(self.cwd.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::ImportKind;

    fn request<'a>(specifier: &'a str, dir: &'a Path) -> ResolveRequest<'a> {
        ResolveRequest {
            specifier,
            importer: None,
            resolve_dir: dir,
            kind: ImportKind::Static,
        }
    }

    #[test]
    fn resolves_with_extension_probing() {
        let runtime = MemoryRuntime::new("/p")
            .with_file("src/a.js", "")
            .with_file("src/lib/index.js", "");
        let dir = Path::new("/p/src");

        let Resolution::Module { id, side_effects } = runtime.resolve(&request("./a", dir)).unwrap()
        else {
            panic!("expected module");
        };
        assert_eq!(id.as_path(), Path::new("/p/src/a.js"));
        assert_eq!(side_effects, None);

        let Resolution::Module { id, .. } = runtime.resolve(&request("./lib", dir)).unwrap() else {
            panic!("expected module");
        };
        assert_eq!(id.as_path(), Path::new("/p/src/lib/index.js"));
    }

    #[test]
    fn reports_missing_files_and_bare_specifiers() {
        let runtime = MemoryRuntime::new("/p");
        let dir = Path::new("/p");
        assert!(matches!(
            runtime.resolve(&request("./missing", dir)),
            Err(RuntimeError::ResolutionFailed { .. })
        ));
        assert!(matches!(
            runtime.resolve(&request("react", dir)),
            Err(RuntimeError::ResolutionFailed { .. })
        ));

        runtime.add_external("react");
        assert_eq!(
            runtime.resolve(&request("react", dir)).unwrap(),
            Resolution::External {
                path: "react".to_string()
            }
        );
    }

    #[test]
    fn side_effect_overrides_are_reported() {
        let runtime = MemoryRuntime::new("/p").with_file("pure.js", "export const a = 1;");
        runtime.set_side_effects("pure.js", false);

        let Resolution::Module { side_effects, .. } =
            runtime.resolve(&request("./pure.js", Path::new("/p"))).unwrap()
        else {
            panic!("expected module");
        };
        assert_eq!(side_effects, Some(false));
    }

    #[test]
    fn load_reads_virtual_contents() {
        let runtime = MemoryRuntime::new("/p").with_file("a.js", "export {}");
        let id = ModuleId::new("/p/a.js").unwrap();
        assert_eq!(runtime.load(&id).unwrap().contents, "export {}");

        runtime.remove_file("a.js");
        assert!(matches!(
            runtime.load(&id),
            Err(RuntimeError::FileNotFound(_))
        ));
    }
}
