use std::path::PathBuf;
use std::sync::Arc;

use knit_graph::{
    CancelToken, DiagnosticContext, DiagnosticKind, ImportTarget, Loader, MemoryRuntime,
    ModuleGraph, ModuleId, ScanError, ScanInput, ScanOptions, Scanner, UnitCache, UnitId,
};

fn scan(runtime: &MemoryRuntime, entries: &[&str]) -> Result<ModuleGraph, ScanError> {
    scan_with(runtime, &ScanOptions::default(), entries)
}

fn scan_with(
    runtime: &MemoryRuntime,
    options: &ScanOptions,
    entries: &[&str],
) -> Result<ModuleGraph, ScanError> {
    let inputs: Vec<ScanInput> = entries
        .iter()
        .map(|entry| ScanInput::Path(entry.to_string()))
        .collect();
    Scanner::new(runtime, options).scan(&inputs)
}

fn unit_named(graph: &ModuleGraph, path: &str) -> UnitId {
    graph
        .lookup(&ModuleId::new(path).unwrap())
        .unwrap_or_else(|| panic!("{path} not in graph"))
}

#[test]
fn discovers_each_unit_once() {
    let runtime = MemoryRuntime::new("/p")
        .with_file("index.js", "import './a'; import './b';")
        .with_file("a.js", "import './shared';")
        .with_file("b.js", "import './shared.js';")
        .with_file("shared.js", "console.log('shared');");

    let graph = scan(&runtime, &["index.js"]).unwrap();
    assert_eq!(graph.len(), 4);
    assert_eq!(graph.entries(), &[UnitId(0)]);

    // Discovery order is frontier order, then record order.
    let order: Vec<String> = graph
        .unit_ids()
        .map(|id| graph.unit(id).id.to_string())
        .collect();
    assert_eq!(order, ["/p/index.js", "/p/a.js", "/p/b.js", "/p/shared.js"]);

    let shared = unit_named(&graph, "/p/shared.js");
    assert_eq!(
        graph.importers(shared),
        vec![unit_named(&graph, "/p/a.js"), unit_named(&graph, "/p/b.js")]
    );
    assert_eq!(
        graph.dependency_chain(shared).format_chain(),
        "/p/index.js -> /p/a.js -> /p/shared.js"
    );
}

#[test]
fn cycles_terminate_and_order_dependencies_first() {
    let runtime = MemoryRuntime::new("/p")
        .with_file("a.js", "import { b } from './b'; export const a = 1;")
        .with_file("b.js", "import { a } from './a'; export const b = 2;");

    let graph = scan(&runtime, &["a.js"]).unwrap();
    assert_eq!(graph.len(), 2);

    let a = unit_named(&graph, "/p/a.js");
    let b = unit_named(&graph, "/p/b.js");
    assert_eq!(graph.exec_order(), vec![b, a]);
    assert_eq!(graph.target(b, 0), &ImportTarget::Unit(a));
}

#[test]
fn dynamic_imports_are_ordered_after_static_graph() {
    let runtime = MemoryRuntime::new("/p")
        .with_file("index.js", "import './dep'; import('./lazy');")
        .with_file("dep.js", "export const dep = 1;")
        .with_file("lazy.js", "import './dep'; export default 2;");

    let graph = scan(&runtime, &["index.js"]).unwrap();
    let order: Vec<String> = graph
        .exec_order()
        .into_iter()
        .map(|id| graph.unit(id).id.to_string())
        .collect();
    assert_eq!(order, ["/p/dep.js", "/p/index.js", "/p/lazy.js"]);

    let lazy = unit_named(&graph, "/p/lazy.js");
    let closure = graph.static_closure(lazy);
    assert_eq!(closure.len(), 2);
}

#[test]
fn unresolved_import_reports_chain() {
    let runtime = MemoryRuntime::new("/p")
        .with_file("index.js", "import './mid';")
        .with_file("mid.js", "\nimport { x } from './missing';");

    let Err(ScanError::Failed(diagnostics)) = scan(&runtime, &["index.js"]) else {
        panic!("expected scan failure");
    };
    assert_eq!(diagnostics.len(), 1);

    let diagnostic = &diagnostics[0];
    assert_eq!(diagnostic.kind, DiagnosticKind::UnresolvedImport);
    assert_eq!(diagnostic.message, "Could not resolve \"./missing\"");
    let location = diagnostic.location.as_ref().unwrap();
    assert_eq!(location.file, "/p/mid.js");
    assert_eq!(location.line, 2);
    assert!(
        diagnostic
            .notes
            .iter()
            .any(|note| note == "import chain: /p/index.js -> /p/mid.js")
    );
    match &diagnostic.context {
        Some(DiagnosticContext::UnresolvedImport { specifier, chain, .. }) => {
            assert_eq!(specifier, "./missing");
            assert_eq!(chain.len(), 2);
        }
        other => panic!("unexpected context {other:?}"),
    }
}

#[test]
fn every_failure_is_collected() {
    let runtime = MemoryRuntime::new("/p")
        .with_file("index.js", "import './nope'; import 'left-pad'; import './broken';")
        .with_file("broken.js", "export const = ;");

    let Err(ScanError::Failed(diagnostics)) = scan(&runtime, &["index.js"]) else {
        panic!("expected scan failure");
    };
    let kinds: Vec<DiagnosticKind> = diagnostics.iter().map(|d| d.kind).collect();
    assert_eq!(
        kinds.iter().filter(|k| **k == DiagnosticKind::UnresolvedImport).count(),
        2
    );
    assert!(kinds.contains(&DiagnosticKind::SyntaxError));

    let bare = diagnostics
        .iter()
        .find(|d| d.message.contains("left-pad"))
        .unwrap();
    assert!(bare.help.as_deref().unwrap().contains("external"));
}

#[test]
fn externals_are_not_followed() {
    let runtime = MemoryRuntime::new("/p").with_file(
        "index.js",
        "import React from 'react'; import { jsx } from 'react/jsx-runtime'; import '@scope/x';",
    );
    let options = ScanOptions {
        external: vec!["react".into(), "@scope/*".into()],
        ..ScanOptions::default()
    };

    let graph = scan_with(&runtime, &options, &["index.js"]).unwrap();
    assert_eq!(graph.len(), 1);
    let targets: Vec<&ImportTarget> = graph.edges(UnitId(0)).map(|(_, _, t)| t).collect();
    assert_eq!(
        targets,
        [
            &ImportTarget::External("react".into()),
            &ImportTarget::External("react/jsx-runtime".into()),
            &ImportTarget::External("@scope/x".into()),
        ]
    );
}

#[test]
fn runtime_externals_and_side_effect_flags_are_kept() {
    let runtime = MemoryRuntime::new("/p")
        .with_file("index.js", "import 'lodash'; import './pure';")
        .with_file("pure.js", "export const x = 1;");
    runtime.add_external("lodash");
    runtime.set_side_effects("pure.js", false);

    let graph = scan(&runtime, &["index.js"]).unwrap();
    assert_eq!(graph.target(UnitId(0), 0), &ImportTarget::External("lodash".into()));
    let pure = unit_named(&graph, "/p/pure.js");
    assert!(graph.is_side_effect_free(pure));
    assert!(!graph.is_side_effect_free(UnitId(0)));
}

#[test]
fn dead_branch_failures_are_silent() {
    let runtime = MemoryRuntime::new("/p").with_file(
        "index.js",
        "if (false) { import('./never'); }\nexport const ok = true;",
    );

    let graph = scan(&runtime, &["index.js"]).unwrap();
    assert_eq!(graph.len(), 1);
    assert_eq!(graph.target(UnitId(0), 0), &ImportTarget::Unresolved);
}

#[test]
fn source_inputs_use_their_resolve_dir() {
    let runtime = MemoryRuntime::new("/p").with_file("lib/util.js", "export const u = 1;");
    let options = ScanOptions::default();
    let input = ScanInput::Source {
        name: "stdin".into(),
        contents: "import { u } from './util'; console.log(u);".into(),
        loader: Loader::Js,
        resolve_dir: Some(PathBuf::from("/p/lib")),
    };

    let graph = Scanner::new(&runtime, &options).scan(&[input]).unwrap();
    assert_eq!(graph.len(), 2);
    assert!(graph.unit(UnitId(0)).id.is_virtual());
    assert_eq!(graph.unit(UnitId(1)).id.to_string(), "/p/lib/util.js");
}

#[test]
fn external_entry_is_rejected() {
    let runtime = MemoryRuntime::new("/p");
    runtime.add_external("./index.js");

    let Err(ScanError::Failed(diagnostics)) = scan(&runtime, &["index.js"]) else {
        panic!("expected scan failure");
    };
    assert_eq!(diagnostics[0].kind, DiagnosticKind::Unsupported);
}

#[test]
fn cancelled_scan_returns_no_graph() {
    let runtime = MemoryRuntime::new("/p").with_file("index.js", "export {};");
    let options = ScanOptions::default();
    let token = CancelToken::new();
    token.cancel();

    let result = Scanner::new(&runtime, &options)
        .with_cancel_token(token)
        .scan(&[ScanInput::Path("index.js".into())]);
    assert!(matches!(result, Err(ScanError::Cancelled)));
}

#[test]
fn cache_reuses_unchanged_units() {
    let runtime = MemoryRuntime::new("/p")
        .with_file("index.js", "import { a } from './a'; console.log(a);")
        .with_file("a.js", "export const a = 1;");
    let options = ScanOptions::default();
    let cache = UnitCache::new();
    let inputs = [ScanInput::Path("index.js".into())];

    let first = Scanner::new(&runtime, &options)
        .with_cache(&cache)
        .scan(&inputs)
        .unwrap();
    assert_eq!(cache.len(), 2);

    runtime.add_file("index.js", "import { a } from './a'; console.log(a + 1);");
    let second = Scanner::new(&runtime, &options)
        .with_cache(&cache)
        .scan(&inputs)
        .unwrap();

    let a = unit_named(&first, "/p/a.js");
    let a_again = unit_named(&second, "/p/a.js");
    assert!(Arc::ptr_eq(&first.node(a).unit, &second.node(a_again).unit));
    assert!(!Arc::ptr_eq(
        &first.node(UnitId(0)).unit,
        &second.node(UnitId(0)).unit
    ));
}
