//! Shared test utilities for knit-bundler tests
//!
//! Every build runs against a [`MemoryRuntime`] rooted at `/p`, with the
//! default output directory `/p/dist`.

#![allow(dead_code)]

use std::sync::Arc;

use knit_bundler::{
    BuildOptions, BuildResult, Bundler, DiagnosticKind, EntryPoint, MemoryRuntime,
    format_diagnostics,
};

pub fn runtime(files: &[(&str, &str)]) -> MemoryRuntime {
    files
        .iter()
        .fold(MemoryRuntime::new("/p"), |runtime, (path, contents)| {
            runtime.with_file(path, *contents)
        })
}

pub fn build_with(files: &[(&str, &str)], entries: &[&str], options: BuildOptions) -> BuildResult {
    let bundler = Bundler::new(Arc::new(runtime(files)), options);
    let entries: Vec<EntryPoint> = entries.iter().map(|entry| EntryPoint::path(*entry)).collect();
    bundler.build(&entries).expect("build should not abort")
}

/// Build and assert there were no errors.
pub fn bundle(files: &[(&str, &str)], entries: &[&str], options: BuildOptions) -> BuildResult {
    let result = build_with(files, entries, options);
    assert!(
        result.is_success(),
        "build failed:\n{}",
        format_diagnostics(&result.diagnostics, 0)
    );
    result
}

/// Text of the output at `path`.
pub fn output<'a>(result: &'a BuildResult, path: &str) -> &'a str {
    match result.output(path) {
        Some(file) => file.text(),
        None => panic!(
            "no output {path}; have {:?}",
            result.outputs.iter().map(|f| &f.path).collect::<Vec<_>>()
        ),
    }
}

/// The single JavaScript output of a one-chunk build.
pub fn only_chunk(result: &BuildResult) -> &str {
    let chunks: Vec<_> = result.chunks().collect();
    assert_eq!(chunks.len(), 1, "expected one chunk, got {}", chunks.len());
    chunks[0].text()
}

/// Assert the build failed with a diagnostic of `kind` and produced nothing.
pub fn assert_fails_with(result: &BuildResult, kind: DiagnosticKind) {
    assert!(
        result.outputs.is_empty(),
        "failed builds must not publish outputs"
    );
    assert!(
        result.errors().any(|d| d.kind == kind),
        "expected a {kind} error, got:\n{}",
        format_diagnostics(&result.diagnostics, 0)
    );
}

pub fn esm() -> BuildOptions {
    BuildOptions::default()
}

pub fn splitting() -> BuildOptions {
    BuildOptions {
        splitting: true,
        ..BuildOptions::default()
    }
}
