use crate::KnitConfig;
use crate::error::{ConfigError, Result};
use crate::types::Format;

const LOADER_NAMES: &[&str] = &["js", "jsx", "json", "text", "css"];
const LOG_LEVELS: &[&str] = &["silent", "error", "warn", "info", "debug"];
const PLACEHOLDERS: &[&str] = &["[name]", "[dir]", "[hash]"];

/// Check that a global name is an identifier or a dotted identifier path.
pub fn validate_global_name(name: &str) -> Result<()> {
    validate_dotted_name("globalName", name)
}

fn validate_dotted_name(field: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ConfigError::invalid(field, name, "Name cannot be empty"));
    }

    for segment in name.split('.') {
        let mut chars = segment.chars();
        let Some(first) = chars.next() else {
            return Err(ConfigError::invalid(
                field,
                name,
                "Dotted names cannot have empty segments",
            ));
        };
        if !first.is_alphabetic() && first != '_' && first != '$' {
            return Err(ConfigError::invalid(
                field,
                name,
                format!("Must start with letter, underscore, or dollar sign (got '{first}')"),
            ));
        }
        if let Some(c) = chars.find(|c| !c.is_alphanumeric() && *c != '_' && *c != '$') {
            return Err(ConfigError::invalid(
                field,
                name,
                format!("Invalid character '{c}' in identifier"),
            ));
        }
    }

    Ok(())
}

/// Check an output path template: relative, non-empty, known placeholders.
pub fn validate_template(field: &str, template: &str) -> Result<()> {
    if template.is_empty() {
        return Err(ConfigError::invalid(field, template, "Template cannot be empty"));
    }
    if template.starts_with('/') || template.split('/').any(|seg| seg == "..") {
        return Err(ConfigError::invalid(
            field,
            template,
            "Template must stay inside the output directory",
        ));
    }

    let mut rest = template;
    while let Some(start) = rest.find('[') {
        let Some(len) = rest[start..].find(']') else {
            return Err(ConfigError::invalid(field, template, "Unclosed placeholder"));
        };
        let placeholder = &rest[start..start + len + 1];
        if !PLACEHOLDERS.contains(&placeholder) {
            return Err(ConfigError::invalid(
                field,
                template,
                format!("Unknown placeholder {placeholder}; use [name], [dir] or [hash]"),
            ));
        }
        rest = &rest[start + len + 1..];
    }
    Ok(())
}

impl KnitConfig {
    /// Validate configuration for logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.entry.is_empty() {
            return Err(ConfigError::MissingField {
                field: "entry".to_string(),
                hint: "Provide at least one entry point".to_string(),
            });
        }
        for entry in self.entries() {
            if entry.input.trim().is_empty() {
                return Err(ConfigError::invalid("entry", entry.input, "Entry cannot be empty"));
            }
            if let Some(output) = &entry.output {
                validate_template("entry", output)?;
            }
        }

        if self.splitting && self.format != Format::Esm {
            return Err(ConfigError::invalid(
                "splitting",
                "true",
                format!("Code splitting requires format esm (got {})", self.format),
            ));
        }

        if let Some(name) = &self.global_name {
            validate_global_name(name)?;
            if self.format != Format::Iife {
                tracing::warn!(format = %self.format, "globalName is only used by iife output");
            }
        }

        validate_template("entryNames", &self.entry_names)?;
        validate_template("chunkNames", &self.chunk_names)?;

        if !self.out_extension.starts_with('.') || self.out_extension.len() < 2 {
            return Err(ConfigError::invalid(
                "outExtension",
                &self.out_extension,
                "Extension must start with '.' (e.g. \".mjs\")",
            ));
        }

        for pattern in &self.external {
            if pattern.matches('*').count() > 1 {
                return Err(ConfigError::invalid(
                    "external",
                    pattern,
                    "At most one '*' wildcard is supported",
                ));
            }
        }

        for (ext, loader) in &self.loaders {
            if ext.is_empty() || ext.starts_with('.') {
                return Err(ConfigError::invalid(
                    "loaders",
                    ext,
                    "Extensions are written without the leading dot",
                ));
            }
            if !LOADER_NAMES.contains(&loader.to_ascii_lowercase().as_str()) {
                return Err(ConfigError::invalid(
                    "loaders",
                    loader,
                    format!("Valid loaders: {}", LOADER_NAMES.join(", ")),
                ));
            }
        }

        for (name, value) in &self.define {
            validate_dotted_name("define", name)?;
            if value.trim().is_empty() {
                return Err(ConfigError::invalid(
                    "define",
                    name,
                    "Replacement cannot be empty",
                ));
            }
        }

        for (from, to) in &self.alias {
            if from.is_empty() || from.ends_with('/') || from.starts_with('.') {
                return Err(ConfigError::invalid(
                    "alias",
                    from,
                    "Alias keys are package-like names without a trailing '/'",
                ));
            }
            if to.is_empty() {
                return Err(ConfigError::invalid("alias", from, "Alias target cannot be empty"));
            }
        }

        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::invalid(
                "logLevel",
                &self.log_level,
                format!("Valid levels: {}", LOG_LEVELS.join(", ")),
            ));
        }

        Ok(())
    }
}
