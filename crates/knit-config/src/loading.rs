use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format as _, Json, Serialized, Toml};
use figment::value::Uncased;

use crate::KnitConfig;
use crate::error::{ConfigError, Result};

/// Files probed in the project root, in order.
pub const CONFIG_FILE_NAMES: &[&str] = &["knit.toml", "knit.json"];

/// Fields settable from the environment, as camelCase keys.
const ENV_FIELDS: &[&str] = &[
    "entry",
    "format",
    "outdir",
    "outbase",
    "treeShaking",
    "splitting",
    "entryNames",
    "chunkNames",
    "outExtension",
    "external",
    "packagesExternal",
    "sourcemap",
    "sourceRoot",
    "sourcesContent",
    "globalName",
    "banner",
    "footer",
    "metafile",
    "ignoreAnnotations",
    "pure",
    "logLevel",
    "logLimit",
];

/// Layered loader for [`KnitConfig`].
///
/// Priority: overrides > environment > config file > defaults.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    root: PathBuf,
    file: Option<PathBuf>,
    env_prefix: Option<String>,
    overrides: Option<serde_json::Value>,
}

impl ConfigLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            file: None,
            env_prefix: Some("KNIT_".to_string()),
            overrides: None,
        }
    }

    /// Use this file instead of probing the root. Relative paths are taken
    /// from the root.
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    pub fn without_env(mut self) -> Self {
        self.env_prefix = None;
        self
    }

    /// Partial config object merged last, e.g. from command-line flags.
    pub fn overrides(mut self, overrides: serde_json::Value) -> Self {
        self.overrides = Some(overrides);
        self
    }

    /// First config file present in the root.
    pub fn find(&self) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| self.root.join(name))
            .find(|path| path.is_file())
    }

    pub fn load(&self) -> Result<KnitConfig> {
        let mut figment = Figment::new().merge(Serialized::defaults(KnitConfig::default()));

        let file = match &self.file {
            Some(path) => {
                let path = if path.is_absolute() {
                    path.clone()
                } else {
                    self.root.join(path)
                };
                if !path.is_file() {
                    return Err(ConfigError::NotFound(path));
                }
                Some(path)
            }
            None => self.find(),
        };

        if let Some(path) = file {
            tracing::debug!(path = %path.display(), "loading config file");
            figment = merge_file(figment, &path)?;
        }

        if let Some(prefix) = &self.env_prefix {
            figment = figment.merge(
                Env::prefixed(prefix.as_str())
                    .lowercase(false)
                    .filter(|key| ENV_FIELDS.contains(&env_key_to_field(key.as_str()).as_str()))
                    .map(|key| Uncased::from(env_key_to_field(key.as_str()))),
            );
        }

        if let Some(overrides) = &self.overrides {
            figment = figment.merge(Serialized::defaults(overrides));
        }

        figment
            .extract()
            .map_err(|e| ConfigError::Load(e.to_string()))
    }
}

fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => Ok(figment.merge(Toml::file(path))),
        Some("json") => Ok(figment.merge(Json::file(path))),
        _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// `TREE_SHAKING` -> `treeShaking`.
pub fn env_key_to_field(key: &str) -> String {
    let mut field = String::with_capacity(key.len());
    for (i, word) in key.split('_').filter(|w| !w.is_empty()).enumerate() {
        let word = word.to_ascii_lowercase();
        if i == 0 {
            field.push_str(&word);
        } else {
            let mut chars = word.chars();
            if let Some(first) = chars.next() {
                field.push(first.to_ascii_uppercase());
                field.push_str(chars.as_str());
            }
        }
    }
    field
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_become_camel_case() {
        assert_eq!(env_key_to_field("TREE_SHAKING"), "treeShaking");
        assert_eq!(env_key_to_field("format"), "format");
        assert_eq!(env_key_to_field("LOG__LIMIT"), "logLimit");
    }

    #[test]
    fn every_env_field_is_a_config_field() {
        let value = serde_json::to_value(KnitConfig {
            outbase: Some("src".into()),
            external: vec!["x".into()],
            sourcemap: Some(crate::SourceMapMode::Linked),
            source_root: Some("/".into()),
            global_name: Some("g".into()),
            banner: Some(String::new()),
            footer: Some(String::new()),
            pure: vec!["p".into()],
            ..KnitConfig::default()
        })
        .unwrap();
        for field in ENV_FIELDS {
            assert!(value.get(field).is_some(), "{field} is not a config field");
        }
    }
}
