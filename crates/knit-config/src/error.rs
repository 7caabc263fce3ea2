//! Error types for configuration loading and validation.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("unsupported configuration format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// A layer failed to parse or did not match the schema.
    #[error("failed to load configuration: {0}")]
    Load(String),

    #[error("missing required field `{field}`: {hint}")]
    MissingField { field: String, hint: String },

    #[error("invalid value for `{field}` ({value:?}): {hint}")]
    InvalidValue {
        field: String,
        value: String,
        hint: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, value: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            value: value.into(),
            hint: hint.into(),
        }
    }
}
