//! Native Runtime Implementation
//!
//! Resolves specifiers with `oxc_resolver` (node_modules lookup,
//! package.json `exports` and main fields, conditions) and reads files
//! through `std::fs`.
//!
//! ```text
//! NativeRuntime
//! ┌─────────────────┐
//! │  .resolve()     │────▶ oxc_resolver::Resolver + package.json sideEffects
//! │  .load()        │────▶ std::fs::read_to_string()
//! │  .cwd()         │────▶ std::env::current_dir()
//! └─────────────────┘
//! ```

// NativeRuntime is platform-specific and wraps std::fs by design
#![allow(clippy::disallowed_methods)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::trace;

use super::{
    LoadedSource, RESOLVE_EXTENSIONS, ResolveRequest, Resolution, Runtime, RuntimeError,
    RuntimeResult,
};
use crate::module_id::ModuleId;

/// Native filesystem runtime.
///
/// Bare specifiers resolve through `node_modules` the way Node does for
/// `import`. Names listed with [`NativeRuntime::external`] are left alone.
#[derive(Debug, Clone)]
pub struct NativeRuntime {
    resolver: Arc<oxc_resolver::Resolver>,
    cwd: Option<PathBuf>,
    externals: Vec<String>,
    /// Package directory -> boolean `sideEffects` of its package.json.
    side_effects: Arc<Mutex<FxHashMap<PathBuf, Option<bool>>>>,
}

impl Default for NativeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeRuntime {
    /// Runtime rooted at the process working directory.
    pub fn new() -> Self {
        let resolver = oxc_resolver::Resolver::new(oxc_resolver::ResolveOptions {
            condition_names: vec!["import".into(), "module".into(), "default".into()],
            extensions: RESOLVE_EXTENSIONS
                .iter()
                .map(|ext| format!(".{ext}"))
                .collect(),
            main_fields: vec!["module".into(), "main".into()],
            ..Default::default()
        });

        Self {
            resolver: Arc::new(resolver),
            cwd: None,
            externals: Vec::new(),
            side_effects: Arc::default(),
        }
    }

    /// Runtime rooted at an explicit directory.
    pub fn with_cwd(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: Some(cwd.into()),
            ..Self::new()
        }
    }

    /// Treat a bare specifier as external.
    pub fn external(mut self, specifier: impl Into<String>) -> Self {
        self.externals.push(specifier.into());
        self
    }

    /// `sideEffects` of the package holding `path`, for files under
    /// `node_modules`. Only the boolean form is understood.
    fn package_side_effects(&self, path: &Path) -> Option<bool> {
        let in_node_modules = path
            .components()
            .any(|component| component.as_os_str() == "node_modules");
        if !in_node_modules {
            return None;
        }
        let package_dir = path
            .ancestors()
            .skip(1)
            .find(|dir| dir.join("package.json").is_file())?;

        if let Some(cached) = self.side_effects.lock().get(package_dir) {
            return *cached;
        }
        let flag = std::fs::read_to_string(package_dir.join("package.json"))
            .ok()
            .and_then(|text| serde_json::from_str::<serde_json::Value>(&text).ok())
            .and_then(|json| json.get("sideEffects").and_then(serde_json::Value::as_bool));
        self.side_effects
            .lock()
            .insert(package_dir.to_path_buf(), flag);
        flag
    }
}

impl Runtime for NativeRuntime {
    fn resolve(&self, request: &ResolveRequest<'_>) -> RuntimeResult<Resolution> {
        if self.externals.iter().any(|ext| ext == request.specifier) {
            return Ok(Resolution::External {
                path: request.specifier.to_string(),
            });
        }

        let resolved = self
            .resolver
            .resolve(request.resolve_dir, request.specifier)
            .map_err(|e| RuntimeError::ResolutionFailed {
                specifier: request.specifier.to_string(),
                from: request
                    .importer
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "<entry>".to_string()),
                reason: e.to_string(),
            })?;

        let path = resolved.path().to_path_buf();
        trace!(specifier = request.specifier, path = %path.display(), "resolved");
        let side_effects = self.package_side_effects(&path);
        let id = ModuleId::new(path).map_err(|e| RuntimeError::Other(e.to_string()))?;

        Ok(Resolution::Module { id, side_effects })
    }

    fn load(&self, id: &ModuleId) -> RuntimeResult<LoadedSource> {
        let path = id.as_path();
        std::fs::read_to_string(path)
            .map(LoadedSource::new)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RuntimeError::FileNotFound(path.to_path_buf())
                } else {
                    RuntimeError::Io(format!("Failed to read {}: {}", path.display(), e))
                }
            })
    }

    fn cwd(&self) -> RuntimeResult<PathBuf> {
        match &self.cwd {
            Some(cwd) => Ok(cwd.clone()),
            None => std::env::current_dir()
                .map_err(|e| RuntimeError::Io(format!("Failed to read cwd: {e}"))),
        }
    }
}
