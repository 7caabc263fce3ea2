use std::fmt;

use serde::{Deserialize, Serialize};

/// Output format for bundled code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Esm,
    Cjs,
    Iife,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Esm => "esm",
            Self::Cjs => "cjs",
            Self::Iife => "iife",
        })
    }
}

/// Source map generation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMapMode {
    /// `.map` file plus a `sourceMappingURL` comment.
    Linked,
    /// `.map` file without the comment.
    External,
    /// Data URL comment, no `.map` file.
    Inline,
    /// Data URL comment and a `.map` file.
    Both,
}

impl SourceMapMode {
    pub fn writes_file(self) -> bool {
        matches!(self, Self::Linked | Self::External | Self::Both)
    }

    pub fn inlines(self) -> bool {
        matches!(self, Self::Inline | Self::Both)
    }
}

/// One `entry` item, split on the first `=`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySpec {
    /// Output path template (without extension) when pinned.
    pub output: Option<String>,
    pub input: String,
}

impl EntrySpec {
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('=') {
            Some((output, input)) if !output.is_empty() && !input.is_empty() => Self {
                output: Some(output.to_string()),
                input: input.to_string(),
            },
            _ => Self {
                output: None,
                input: raw.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_spec_splits_output_pin() {
        assert_eq!(
            EntrySpec::parse("admin/main=src/admin.js"),
            EntrySpec {
                output: Some("admin/main".to_string()),
                input: "src/admin.js".to_string(),
            }
        );
        assert_eq!(EntrySpec::parse("src/index.js").output, None);
        assert_eq!(EntrySpec::parse("=src/index.js").input, "=src/index.js");
    }

    #[test]
    fn enums_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&Format::Iife).unwrap(), "\"iife\"");
        assert_eq!(
            serde_json::to_string(&SourceMapMode::Both).unwrap(),
            "\"both\""
        );
        assert!(SourceMapMode::Both.inlines() && SourceMapMode::Both.writes_file());
        assert!(!SourceMapMode::Inline.writes_file());
    }
}
