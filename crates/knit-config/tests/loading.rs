use std::fs;
use std::path::PathBuf;

use knit_config::{ConfigError, ConfigLoader, Format, KnitConfig, SourceMapMode};
use serde_json::json;
use tempfile::TempDir;

fn loader(dir: &TempDir) -> ConfigLoader {
    ConfigLoader::new(dir.path()).without_env()
}

#[test]
fn defaults_without_any_file() {
    let dir = TempDir::new().unwrap();
    let config = loader(&dir).load().unwrap();
    assert_eq!(config, KnitConfig::default());
    assert_eq!(config.entry_names, "[dir]/[name]");
    assert_eq!(config.chunk_names, "[name]-[hash]");
    assert!(config.tree_shaking);
}

#[test]
fn toml_file_is_discovered() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("knit.toml"),
        r#"
entry = ["src/index.js", "admin=src/admin.js"]
format = "cjs"
treeShaking = false
sourcemap = "inline"

[loaders]
svg = "text"

[define]
"process.env.NODE_ENV" = '"production"'

[alias]
"@app" = "./src"
"#,
    )
    .unwrap();

    let config = loader(&dir).load().unwrap();
    assert_eq!(config.format, Format::Cjs);
    assert!(!config.tree_shaking);
    assert_eq!(config.sourcemap, Some(SourceMapMode::Inline));
    assert_eq!(config.loaders.get("svg").map(String::as_str), Some("text"));
    assert_eq!(config.define["process.env.NODE_ENV"], "\"production\"");
    assert_eq!(config.alias["@app"], "./src");

    let entries = config.entries();
    assert_eq!(entries[1].output.as_deref(), Some("admin"));
    assert_eq!(entries[1].input, "src/admin.js");
    config.validate().unwrap();
}

#[test]
fn toml_wins_over_json() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("knit.toml"), "format = \"iife\"\n").unwrap();
    fs::write(dir.path().join("knit.json"), r#"{ "format": "cjs" }"#).unwrap();

    let config = loader(&dir).load().unwrap();
    assert_eq!(config.format, Format::Iife);
}

#[test]
fn explicit_json_file_and_overrides() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("conf")).unwrap();
    fs::write(
        dir.path().join("conf/build.json"),
        r#"{ "entry": ["a.js"], "splitting": true, "logLimit": 3 }"#,
    )
    .unwrap();

    let config = loader(&dir)
        .file("conf/build.json")
        .overrides(json!({ "logLimit": 0, "outdir": "out" }))
        .load()
        .unwrap();
    assert!(config.splitting);
    assert_eq!(config.entry, ["a.js"]);
    assert_eq!(config.log_limit, 0);
    assert_eq!(config.outdir, PathBuf::from("out"));
}

#[test]
fn missing_explicit_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let err = loader(&dir).file("nope.toml").load().unwrap_err();
    assert!(matches!(err, ConfigError::NotFound(_)));
}

#[test]
fn unknown_fields_are_rejected() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("knit.json"), r#"{ "minify": true }"#).unwrap();
    let err = loader(&dir).load().unwrap_err();
    assert!(matches!(err, ConfigError::Load(_)));
}

#[test]
fn unsupported_extension_is_an_error() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("knit.yaml"), "format: esm").unwrap();
    let err = loader(&dir).file("knit.yaml").load().unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
}

#[test]
fn example_toml_parses_back() {
    let text = KnitConfig::example_toml().unwrap();
    let parsed: KnitConfig = toml::from_str(&text).unwrap();
    assert!(parsed.splitting);
    parsed.validate().unwrap();
}
