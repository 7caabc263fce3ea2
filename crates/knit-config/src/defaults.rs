use std::path::PathBuf;

use crate::types::Format;

pub fn default_format() -> Format {
    Format::Esm
}

pub fn default_outdir() -> PathBuf {
    PathBuf::from("dist")
}

pub fn default_entry_names() -> String {
    "[dir]/[name]".to_string()
}

pub fn default_chunk_names() -> String {
    "[name]-[hash]".to_string()
}

pub fn default_out_extension() -> String {
    ".js".to_string()
}

pub fn default_log_level() -> String {
    "warn".to_string()
}

pub fn default_log_limit() -> usize {
    10
}

pub(crate) fn default_true() -> bool {
    true
}
