//! Binding and tree shaking, observed through the rendered output.

mod helpers;

use helpers::{assert_fails_with, build_with, bundle, esm, only_chunk, runtime};
use knit_bundler::{BuildOptions, Bundler, DiagnosticContext, DiagnosticKind, EntryPoint};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[test]
fn reexport_chain_binds_to_the_declaration() {
    let result = bundle(
        &[
            ("a.js", "export const x = 'from-a';\nexport const unused = 'drop-me';\n"),
            ("b.js", "export { x } from './a';\n"),
            ("c.js", "import { x } from './b';\nconsole.log(x);\n"),
        ],
        &["c.js"],
        esm(),
    );
    let code = only_chunk(&result);
    assert!(code.contains("const x = 'from-a'"), "{code}");
    assert!(code.contains("console.log(x)"), "{code}");
    assert!(!code.contains("drop-me"), "{code}");
    assert!(!code.contains("import"), "{code}");
    assert!(!code.contains("export"), "{code}");
}

#[test]
fn star_reexports_resolve_through_the_barrel() {
    let result = bundle(
        &[
            ("util.js", "export function helper() { return 'helped'; }\n"),
            ("index.js", "export * from './util';\n"),
            ("main.js", "import { helper } from './index';\nconsole.log(helper());\n"),
        ],
        &["main.js"],
        esm(),
    );
    let code = only_chunk(&result);
    assert!(code.contains("function helper()"), "{code}");
    assert!(code.contains("console.log(helper())"), "{code}");
}

#[test]
fn circular_imports_build() {
    let result = bundle(
        &[
            (
                "a.js",
                "import { b } from './b';\nexport const a = 'value-a';\nexport function readB() { return b; }\n",
            ),
            (
                "b.js",
                "import { a } from './a';\nexport const b = 'value-b';\nexport function readA() { return a; }\n",
            ),
            (
                "main.js",
                "import { readB } from './a';\nimport { readA } from './b';\nconsole.log(readA(), readB());\n",
            ),
        ],
        &["main.js"],
        esm(),
    );
    let code = only_chunk(&result);
    for needle in ["value-a", "value-b", "function readA()", "function readB()"] {
        assert!(code.contains(needle), "missing {needle}:\n{code}");
    }
    assert_eq!(code.matches("value-a").count(), 1);
}

#[test]
fn unused_side_effect_free_exports_are_dropped() {
    let result = bundle(
        &[
            (
                "lib.js",
                "export function used() { return 1; }\nexport function unused() { return 'unused-body'; }\nexport const table = { key: 'table-body' };\n",
            ),
            ("main.js", "import { used } from './lib';\nused();\n"),
        ],
        &["main.js"],
        esm(),
    );
    let code = only_chunk(&result);
    assert!(code.contains("function used()"), "{code}");
    assert!(!code.contains("unused-body"), "{code}");
    assert!(!code.contains("table-body"), "{code}");
}

#[test]
fn side_effects_survive_without_imports_being_used() {
    let result = bundle(
        &[
            ("polyfill.js", "globalThis.patched = 'patched';\nexport const marker = 1;\n"),
            ("main.js", "import './polyfill';\nconsole.log('main');\n"),
        ],
        &["main.js"],
        esm(),
    );
    let code = only_chunk(&result);
    assert!(code.contains("globalThis.patched = 'patched'"), "{code}");
    assert!(!code.contains("const marker"), "{code}");
    // imported modules run first
    assert!(code.find("patched").unwrap() < code.find("'main'").unwrap());
}

#[test]
fn side_effect_free_assertion_drops_unused_modules() {
    let runtime = runtime(&[
        ("lib.js", "console.log('lib-effect');\nexport const value = 1;\n"),
        ("main.js", "import { value } from './lib';\nconsole.log('main');\n"),
    ]);
    runtime.set_side_effects("lib.js", false);
    let bundler = Bundler::new(Arc::new(runtime), esm());
    let result = bundler.build(&[EntryPoint::path("main.js")]).unwrap();
    let code = only_chunk(&result);
    assert!(!code.contains("lib-effect"), "{code}");
}

#[test]
fn side_effect_free_entry_still_runs() {
    let runtime = runtime(&[
        ("main.js", "import { value } from './lib';\nconsole.log('run');\nexport const x = value;\n"),
        ("lib.js", "console.log('lib-effect');\nexport const value = 1;\n"),
    ]);
    runtime.set_side_effects("main.js", false);
    runtime.set_side_effects("lib.js", false);
    let bundler = Bundler::new(Arc::new(runtime), esm());
    let result = bundler.build(&[EntryPoint::path("main.js")]).unwrap();
    let code = only_chunk(&result);
    assert!(code.contains("console.log('run')"), "{code}");
    assert!(code.contains("const value = 1"), "{code}");
    // only the root is exempt
    assert!(!code.contains("lib-effect"), "{code}");
}

#[test]
fn star_reexport_diamonds_bind_once_and_quickly() {
    const LAYERS: usize = 40;
    let mut files: Vec<(String, String)> = Vec::new();
    for layer in 0..LAYERS {
        for side in 0..2 {
            let text = if layer + 1 == LAYERS {
                "export * from './leaf';\n".to_string()
            } else {
                let next = layer + 1;
                format!("export * from './b{next}_0';\nexport * from './b{next}_1';\n")
            };
            files.push((format!("b{layer}_{side}.js"), text));
        }
    }
    files.push(("leaf.js".into(), "export const leaf = 'leaf';\n".into()));
    files.push((
        "main.js".into(),
        "import { leaf } from './b0_0';\nimport * as all from './b0_1';\nconsole.log(leaf, all);\n"
            .into(),
    ));
    let files: Vec<(&str, &str)> = files
        .iter()
        .map(|(path, text)| (path.as_str(), text.as_str()))
        .collect();

    let started = Instant::now();
    let result = bundle(&files, &["main.js"], esm());
    let elapsed = started.elapsed();

    let code = only_chunk(&result);
    assert_eq!(code.matches("'leaf'").count(), 1, "{code}");
    assert!(code.contains("console.log(leaf, "), "{code}");
    // every (unit, name) pair resolves once; without that this doubles per layer
    assert!(elapsed < Duration::from_secs(10), "took {elapsed:?}");
}

#[test]
fn defines_feed_side_effects_and_dead_branches() {
    const LIB: &str = "export const mode = process.env.NODE_ENV;\nexport const other = 'other';\n";
    let defined = BuildOptions {
        define: [("process.env.NODE_ENV".to_string(), "\"production\"".to_string())]
            .into_iter()
            .collect(),
        ..esm()
    };

    let result = bundle(
        &[
            ("lib.js", LIB),
            (
                "main.js",
                "import { other } from './lib';\nif (process.env.NODE_ENV !== 'production') {\n  import('./devtools');\n}\nconsole.log(other);\n",
            ),
        ],
        &["main.js"],
        defined,
    );
    let code = only_chunk(&result);
    assert!(code.contains("if (\"production\" !== 'production')"), "{code}");
    assert!(!code.contains("process.env"), "{code}");
    assert!(!code.contains("const mode"), "{code}");

    // an unknown global read may throw, so the same part stays without it
    let result = bundle(
        &[
            ("lib.js", LIB),
            ("main.js", "import { other } from './lib';\nconsole.log(other);\n"),
        ],
        &["main.js"],
        esm(),
    );
    assert!(only_chunk(&result).contains("const mode = process.env.NODE_ENV"));
}

#[test]
fn aliases_rewrite_specifiers_before_resolution() {
    let result = bundle(
        &[
            ("src/util.js", "export const util = 'util';\n"),
            (
                "nested/main.js",
                "import { util } from '@app/util';\nimport { join } from 'node-path';\nconsole.log(util, join);\n",
            ),
        ],
        &["nested/main.js"],
        BuildOptions {
            alias: [
                ("@app".to_string(), "./src".to_string()),
                ("node-path".to_string(), "path".to_string()),
            ]
            .into_iter()
            .collect(),
            external: vec!["path".into()],
            ..esm()
        },
    );
    let code = only_chunk(&result);
    assert!(code.contains("const util = 'util'"), "{code}");
    assert!(code.contains("import { join } from \"path\";"), "{code}");
    assert!(!code.contains("node-path"), "{code}");
}

#[test]
fn disabling_tree_shaking_keeps_every_part() {
    let result = bundle(
        &[
            ("lib.js", "export const used = 1;\nexport const unused = 'kept-anyway';\n"),
            ("main.js", "import { used } from './lib';\nconsole.log(used);\n"),
        ],
        &["main.js"],
        BuildOptions {
            tree_shaking: false,
            ..esm()
        },
    );
    assert!(only_chunk(&result).contains("kept-anyway"));
}

#[test]
fn entry_exports_are_kept_and_reexported() {
    let result = bundle(
        &[
            ("lib.js", "export const version = '1.0';\n"),
            (
                "index.js",
                "export { version } from './lib';\nexport default function main() { return 'main-body'; }\n",
            ),
        ],
        &["index.js"],
        esm(),
    );
    let code = only_chunk(&result);
    assert!(code.contains("const version = '1.0'"), "{code}");
    assert!(code.contains("function main()"), "{code}");
    assert!(code.contains("main as default"), "{code}");
    assert!(code.contains("version"), "{code}");
}

#[test]
fn missing_export_is_reported_at_the_import() {
    let result = build_with(
        &[
            ("a.js", "export const x = 1;\n"),
            ("main.js", "import { nope } from './a';\nconsole.log(nope);\n"),
        ],
        &["main.js"],
        esm(),
    );
    assert_fails_with(&result, DiagnosticKind::MissingExport);
    let diagnostic = result.errors().next().unwrap();
    assert!(diagnostic.message.contains("nope"));
    let location = diagnostic.location.as_ref().unwrap();
    assert_eq!(location.file, "/p/main.js");
    assert_eq!(location.line, 1);
    assert!(matches!(
        &diagnostic.context,
        Some(DiagnosticContext::MissingExport { export_name, .. }) if export_name == "nope"
    ));
}

#[test]
fn every_binding_error_is_collected() {
    let result = build_with(
        &[
            ("a.js", "export const x = 1;\n"),
            (
                "main.js",
                "import { one } from './a';\nimport { two } from './a';\nconsole.log(one, two);\n",
            ),
        ],
        &["main.js"],
        esm(),
    );
    assert_fails_with(&result, DiagnosticKind::MissingExport);
    assert_eq!(result.errors().count(), 2);
}

#[test]
fn circular_reexport_is_an_error() {
    let result = build_with(
        &[
            ("a.js", "export { x } from './b';\n"),
            ("b.js", "export { x } from './a';\n"),
            ("main.js", "import { x } from './a';\nconsole.log(x);\n"),
        ],
        &["main.js"],
        esm(),
    );
    assert_fails_with(&result, DiagnosticKind::CircularReexport);
}

#[test]
fn ambiguous_star_import_is_an_error() {
    let result = build_with(
        &[
            ("a.js", "export const dup = 'a';\n"),
            ("b.js", "export const dup = 'b';\n"),
            ("barrel.js", "export * from './a';\nexport * from './b';\n"),
            ("main.js", "import { dup } from './barrel';\nconsole.log(dup);\n"),
        ],
        &["main.js"],
        esm(),
    );
    assert_fails_with(&result, DiagnosticKind::AmbiguousExport);
}

#[test]
fn unresolved_imports_fail_the_build() {
    let result = build_with(
        &[("main.js", "import './missing';\nimport './also-missing';\n")],
        &["main.js"],
        esm(),
    );
    assert_fails_with(&result, DiagnosticKind::UnresolvedImport);
    assert_eq!(result.errors().count(), 2);
}

#[test]
fn syntax_errors_carry_their_file() {
    let result = build_with(
        &[
            ("broken.js", "export const = ;\n"),
            ("main.js", "import './broken';\n"),
        ],
        &["main.js"],
        esm(),
    );
    assert_fails_with(&result, DiagnosticKind::SyntaxError);
    let diagnostic = result.errors().next().unwrap();
    assert_eq!(diagnostic.location.as_ref().unwrap().file, "/p/broken.js");
}
