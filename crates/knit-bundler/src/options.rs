//! Options for one build, and their conversion from [`KnitConfig`].

use std::path::PathBuf;
use std::str::FromStr;

use knit_config::{Format, KnitConfig, SourceMapMode};
use knit_graph::{Loader, ParseOptions, ScanOptions};
use rustc_hash::FxHashMap;

use crate::bundler::{EntryInput, EntryPoint};
use crate::{Error, Result};

/// Settings that shape linking and output.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub format: Format,
    pub tree_shaking: bool,
    /// Shared and dynamically imported code in separate chunks (esm only).
    pub splitting: bool,
    /// Directory output paths are relative to. Nothing is written; hosts
    /// use it to place [`OutputFile`](crate::OutputFile)s.
    pub outdir: PathBuf,
    /// Base for `[dir]`; the entries' common ancestor when unset.
    pub outbase: Option<PathBuf>,
    pub entry_names: String,
    pub chunk_names: String,
    pub out_extension: String,
    pub external: Vec<String>,
    pub packages_external: bool,
    pub loaders: FxHashMap<String, Loader>,
    pub sourcemap: Option<SourceMapMode>,
    pub source_root: Option<String>,
    pub sources_content: bool,
    pub global_name: Option<String>,
    pub banner: Option<String>,
    pub footer: Option<String>,
    pub metafile: bool,
    pub ignore_annotations: bool,
    pub pure: Vec<String>,
    /// Global names or dotted paths replaced by expression text.
    pub define: FxHashMap<String, String>,
    /// Specifier prefixes rewritten before resolution.
    pub alias: FxHashMap<String, String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            format: Format::Esm,
            tree_shaking: true,
            splitting: false,
            outdir: knit_config::default_outdir(),
            outbase: None,
            entry_names: knit_config::default_entry_names(),
            chunk_names: knit_config::default_chunk_names(),
            out_extension: knit_config::default_out_extension(),
            external: Vec::new(),
            packages_external: false,
            loaders: FxHashMap::default(),
            sourcemap: None,
            source_root: None,
            sources_content: true,
            global_name: None,
            banner: None,
            footer: None,
            metafile: false,
            ignore_annotations: false,
            pure: Vec::new(),
            define: FxHashMap::default(),
            alias: FxHashMap::default(),
        }
    }
}

impl BuildOptions {
    /// Convert a validated config into options plus its entry points.
    pub fn from_config(config: &KnitConfig) -> Result<(Self, Vec<EntryPoint>)> {
        config
            .validate()
            .map_err(|err| Error::InvalidConfig(err.to_string()))?;

        let mut loaders = FxHashMap::default();
        for (ext, name) in &config.loaders {
            let loader = Loader::from_str(name).map_err(Error::InvalidConfig)?;
            loaders.insert(ext.clone(), loader);
        }

        let options = Self {
            format: config.format,
            tree_shaking: config.tree_shaking,
            splitting: config.splitting,
            outdir: config.outdir.clone(),
            outbase: config.outbase.clone(),
            entry_names: config.entry_names.clone(),
            chunk_names: config.chunk_names.clone(),
            out_extension: config.out_extension.clone(),
            external: config.external.clone(),
            packages_external: config.packages_external,
            loaders,
            sourcemap: config.sourcemap,
            source_root: config.source_root.clone(),
            sources_content: config.sources_content,
            global_name: config.global_name.clone(),
            banner: config.banner.clone(),
            footer: config.footer.clone(),
            metafile: config.metafile,
            ignore_annotations: config.ignore_annotations,
            pure: config.pure.clone(),
            define: config
                .define
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
            alias: config
                .alias
                .iter()
                .map(|(from, to)| (from.clone(), to.clone()))
                .collect(),
        };

        let entries = config
            .entries()
            .into_iter()
            .map(|spec| EntryPoint {
                output: spec.output,
                input: EntryInput::Path(spec.input),
            })
            .collect();
        Ok((options, entries))
    }

    /// Combinations the linker and renderer cannot honour.
    pub fn check(&self) -> Result<()> {
        if self.splitting && self.format != Format::Esm {
            return Err(Error::InvalidConfig(format!(
                "code splitting requires the esm format, not {}",
                self.format
            )));
        }
        if !self.out_extension.starts_with('.') {
            return Err(Error::InvalidConfig(format!(
                "output extension '{}' must start with '.'",
                self.out_extension
            )));
        }
        if let Some(name) = &self.global_name {
            knit_config::validate_global_name(name)
                .map_err(|err| Error::InvalidConfig(err.to_string()))?;
        }
        for (field, template) in [
            ("entryNames", &self.entry_names),
            ("chunkNames", &self.chunk_names),
        ] {
            knit_config::validate_template(field, template)
                .map_err(|err| Error::InvalidConfig(err.to_string()))?;
        }
        Ok(())
    }

    pub(crate) fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            external: self.external.clone(),
            packages_external: self.packages_external,
            loaders: self.loaders.clone(),
            alias: self.alias.clone(),
            parse: ParseOptions {
                ignore_annotations: self.ignore_annotations,
                pure_functions: self.pure.clone(),
                define: self.define.clone(),
            },
        }
    }
}
