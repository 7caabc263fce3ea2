use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};

use path_clean::PathClean;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

const VIRTUAL_PREFIX: &str = "virtual:";

/// Canonical identifier for a source unit in the knit graph.
///
/// Real files are identified by a cleaned absolute path. The identifier never
/// touches the filesystem itself: the [`Runtime`](crate::runtime::Runtime) is
/// responsible for handing out canonical paths, so two specifiers that land on
/// the same file produce equal ids. Literal input (stdin, generated entries)
/// uses a `virtual:` identity instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(PathBuf);

impl ModuleId {
    /// Create a module identifier from a resolved filesystem path.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, ModuleIdError> {
        let path = path.as_ref();

        if path.as_os_str().is_empty() {
            return Err(ModuleIdError::EmptyPath);
        }

        if path.to_string_lossy().starts_with(VIRTUAL_PREFIX) {
            return Self::new_virtual(path.to_string_lossy().into_owned());
        }

        if !path.is_absolute() {
            return Err(ModuleIdError::RelativePath(path.to_path_buf()));
        }

        Ok(Self(path.clean()))
    }

    /// Create a module identifier for literal input (e.g. `virtual:stdin`).
    pub fn new_virtual(id: impl Into<String>) -> Result<Self, ModuleIdError> {
        let id = id.into();
        let name = id.strip_prefix(VIRTUAL_PREFIX).unwrap_or(&id);

        if name.is_empty() {
            return Err(ModuleIdError::EmptyVirtualName);
        }

        Ok(Self(PathBuf::from(format!("{VIRTUAL_PREFIX}{name}"))))
    }

    /// Returns the underlying path representation.
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Returns `true` if the identifier represents literal (virtual) input.
    pub fn is_virtual(&self) -> bool {
        self.path_string().starts_with(VIRTUAL_PREFIX)
    }

    /// Borrow the identifier as a string for logging/serialization.
    pub fn path_string(&self) -> Cow<'_, str> {
        self.0.to_string_lossy()
    }

    /// Directory that relative specifiers in this unit resolve against.
    ///
    /// Virtual units have none; the scanner falls back to the build's
    /// working directory or the entry's own resolve dir.
    pub fn resolve_dir(&self) -> Option<&Path> {
        if self.is_virtual() {
            None
        } else {
            self.0.parent()
        }
    }

    /// File stem turned into a valid identifier fragment.
    ///
    /// Used as the base of synthesized names like `util_default`.
    pub fn stem(&self) -> String {
        let raw = if self.is_virtual() {
            let text = self.path_string();
            let name = text.trim_start_matches(VIRTUAL_PREFIX);
            Path::new(name)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| name.to_string())
        } else {
            self.0
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        };

        let stem = to_identifier(&raw);
        if stem.is_empty() {
            "module".to_string()
        } else {
            stem
        }
    }
}

/// Replace every character that cannot appear in an identifier with `_`.
///
/// An empty input stays empty; a leading digit gets a `_` prefix.
pub fn to_identifier(raw: &str) -> String {
    let mut ident: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '$' { c } else { '_' })
        .collect();
    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    ident
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path_string())
    }
}

impl Serialize for ModuleId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.path_string())
    }
}

impl<'de> Deserialize<'de> for ModuleId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        ModuleId::new(value).map_err(serde::de::Error::custom)
    }
}

/// Error type for `ModuleId` construction failures.
#[derive(Debug, Error)]
pub enum ModuleIdError {
    /// The provided path was empty.
    #[error("module id path is empty")]
    EmptyPath,

    /// Real module ids must be absolute; resolution happens before identity.
    #[error("module id path '{0}' is not absolute")]
    RelativePath(PathBuf),

    /// `virtual:` with nothing after it.
    #[error("virtual module id has an empty name")]
    EmptyVirtualName,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleans_dot_segments() {
        let id = ModuleId::new("/src/lib/../util/./a.js").unwrap();
        assert_eq!(id.as_path(), Path::new("/src/util/a.js"));
        assert_eq!(id.resolve_dir(), Some(Path::new("/src/util")));
    }

    #[test]
    fn rejects_relative_and_empty_paths() {
        assert!(matches!(ModuleId::new(""), Err(ModuleIdError::EmptyPath)));
        assert!(matches!(
            ModuleId::new("src/a.js"),
            Err(ModuleIdError::RelativePath(_))
        ));
        assert!(matches!(
            ModuleId::new_virtual("virtual:"),
            Err(ModuleIdError::EmptyVirtualName)
        ));
    }

    #[test]
    fn virtual_ids_have_no_resolve_dir() {
        let id = ModuleId::new_virtual("stdin").unwrap();
        assert!(id.is_virtual());
        assert_eq!(id.to_string(), "virtual:stdin");
        assert_eq!(id.resolve_dir(), None);
        assert_eq!(ModuleId::new("virtual:stdin").unwrap(), id);
    }

    #[test]
    fn stem_is_identifier_safe() {
        assert_eq!(ModuleId::new("/a/my-util.js").unwrap().stem(), "my_util");
        assert_eq!(ModuleId::new("/a/1st.js").unwrap().stem(), "_1st");
        assert_eq!(ModuleId::new_virtual("stdin").unwrap().stem(), "stdin");
        assert_eq!(to_identifier("a-b c"), "a_b_c");
    }

    #[test]
    fn serde_roundtrip_keeps_identity() {
        let id = ModuleId::new("/project/src/index.js").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"/project/src/index.js\"");
        let back: ModuleId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
