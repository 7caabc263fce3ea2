//! How a file's text is turned into a source unit.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Loader applied to a file's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Loader {
    /// ECMAScript module.
    Js,
    /// ECMAScript module with JSX syntax (kept as-is in the output).
    Jsx,
    /// JSON document exposed as the default export.
    Json,
    /// Plain text exposed as a default-exported string.
    Text,
    /// Stylesheet; emitted into the chunk's `.css` sidecar.
    Css,
}

impl Loader {
    /// Pick a loader from a file extension (without the dot).
    ///
    /// TypeScript extensions map onto the JS loaders: type stripping is the
    /// runtime's job, the graph only ever sees plain JS.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "js" | "mjs" | "cjs" | "ts" | "mts" | "cts" => Some(Self::Js),
            "jsx" | "tsx" => Some(Self::Jsx),
            "json" => Some(Self::Json),
            "txt" => Some(Self::Text),
            "css" => Some(Self::Css),
            _ => None,
        }
    }

    /// Loader for `path`, defaulting to [`Loader::Js`] for unknown extensions.
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
            .unwrap_or(Self::Js)
    }

    /// Whether units with this loader go through the JS parser.
    pub fn is_script(self) -> bool {
        !matches!(self, Self::Css)
    }
}

impl fmt::Display for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Js => "js",
            Self::Jsx => "jsx",
            Self::Json => "json",
            Self::Text => "text",
            Self::Css => "css",
        };
        f.write_str(name)
    }
}

impl FromStr for Loader {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "js" => Ok(Self::Js),
            "jsx" => Ok(Self::Jsx),
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            "css" => Ok(Self::Css),
            _ => Err(format!(
                "Invalid loader: '{s}'. Valid values: js, jsx, json, text, css"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_loader_from_extension() {
        assert_eq!(Loader::from_path(Path::new("/a/b.mjs")), Loader::Js);
        assert_eq!(Loader::from_path(Path::new("/a/b.tsx")), Loader::Jsx);
        assert_eq!(Loader::from_path(Path::new("/a/data.json")), Loader::Json);
        assert_eq!(Loader::from_path(Path::new("/a/style.css")), Loader::Css);
        assert_eq!(Loader::from_path(Path::new("/a/README")), Loader::Js);
    }

    #[test]
    fn parses_loader_names() {
        assert_eq!("TEXT".parse::<Loader>().unwrap(), Loader::Text);
        assert!("yaml".parse::<Loader>().is_err());
        assert_eq!(Loader::Css.to_string(), "css");
    }
}
