//! Configuration for the knit bundler.
//!
//! A [`KnitConfig`] is assembled from up to four layers, later layers
//! winning field by field:
//!
//! 1. built-in defaults,
//! 2. `knit.toml` or `knit.json` in the project root (or an explicit file),
//! 3. `KNIT_*` environment variables (`KNIT_TREE_SHAKING=false`),
//! 4. programmatic overrides.
//!
//! The result is checked with [`KnitConfig::validate`] before a bundler
//! turns it into build options.

mod defaults;
mod error;
mod loading;
mod types;
mod validation;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use defaults::*;
pub use error::{ConfigError, Result};
pub use loading::{CONFIG_FILE_NAMES, ConfigLoader, env_key_to_field};
pub use types::*;
pub use validation::{validate_global_name, validate_template};

/// Knit configuration, loaded from `knit.toml`/`knit.json`, the environment
/// or code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct KnitConfig {
    /// Entry points. `out=src/index.js` pins the entry's output path.
    #[serde(default)]
    pub entry: Vec<String>,

    /// Output format (esm, cjs, iife)
    #[serde(default = "default_format")]
    pub format: Format,

    #[serde(default = "default_outdir")]
    pub outdir: PathBuf,

    /// Base directory for `[dir]`; defaults to the entries' common ancestor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbase: Option<PathBuf>,

    #[serde(default = "default_true")]
    pub tree_shaking: bool,

    /// Split shared and dynamically imported code into separate chunks.
    #[serde(default)]
    pub splitting: bool,

    #[serde(default = "default_entry_names")]
    pub entry_names: String,

    #[serde(default = "default_chunk_names")]
    pub chunk_names: String,

    #[serde(default = "default_out_extension")]
    pub out_extension: String,

    /// Specifiers left as imports; one `*` wildcard allowed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external: Vec<String>,

    /// Treat every bare package specifier as external.
    #[serde(default)]
    pub packages_external: bool,

    /// Loader overrides by extension, e.g. `{ "svg" = "text" }`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub loaders: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sourcemap: Option<SourceMapMode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_root: Option<String>,

    /// Embed original sources in generated source maps.
    #[serde(default = "default_true")]
    pub sources_content: bool,

    /// Global variable assigned by IIFE bundles; dotted paths allowed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,

    /// Produce an esbuild-style metafile alongside the outputs.
    #[serde(default)]
    pub metafile: bool,

    /// Ignore `/* @__PURE__ */` annotations.
    #[serde(default)]
    pub ignore_annotations: bool,

    /// Callee names whose calls are side-effect free.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pure: Vec<String>,

    /// Compile-time constants: a global name or dotted path mapped to the
    /// expression text that replaces it, e.g. `"process.env.NODE_ENV" =
    /// "\"production\""`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub define: BTreeMap<String, String>,

    /// Import specifiers rewritten before resolution. A key also covers
    /// its subpaths; relative targets resolve against the cwd.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub alias: BTreeMap<String, String>,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Maximum diagnostics printed; 0 means unlimited.
    #[serde(default = "default_log_limit")]
    pub log_limit: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
}

impl Default for KnitConfig {
    fn default() -> Self {
        Self {
            entry: Vec::new(),
            format: default_format(),
            outdir: default_outdir(),
            outbase: None,
            tree_shaking: true,
            splitting: false,
            entry_names: default_entry_names(),
            chunk_names: default_chunk_names(),
            out_extension: default_out_extension(),
            external: Vec::new(),
            packages_external: false,
            loaders: BTreeMap::new(),
            sourcemap: None,
            source_root: None,
            sources_content: true,
            global_name: None,
            banner: None,
            footer: None,
            metafile: false,
            ignore_annotations: false,
            pure: Vec::new(),
            define: BTreeMap::new(),
            alias: BTreeMap::new(),
            log_level: default_log_level(),
            log_limit: default_log_limit(),
            cwd: None,
        }
    }
}

impl KnitConfig {
    /// Entries split into output pin and input specifier.
    pub fn entries(&self) -> Vec<EntrySpec> {
        self.entry.iter().map(|raw| EntrySpec::parse(raw)).collect()
    }

    /// Example `knit.toml` content.
    pub fn example_toml() -> Result<String> {
        let example = Self {
            entry: vec!["src/index.js".to_string(), "admin=src/admin.js".to_string()],
            splitting: true,
            external: vec!["react".to_string(), "react-dom/*".to_string()],
            sourcemap: Some(SourceMapMode::Linked),
            define: BTreeMap::from([(
                "process.env.NODE_ENV".to_string(),
                "\"production\"".to_string(),
            )]),
            ..Self::default()
        };
        toml::to_string_pretty(&example).map_err(|e| ConfigError::InvalidValue {
            field: "config".to_string(),
            value: String::new(),
            hint: e.to_string(),
        })
    }
}
