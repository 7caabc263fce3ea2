//! Code splitting, dynamic imports and output naming.

mod helpers;

use helpers::{assert_fails_with, build_with, bundle, esm, only_chunk, output, splitting};
use knit_bundler::{BuildOptions, DiagnosticKind, Format};

fn shared_files() -> Vec<(&'static str, &'static str)> {
    vec![
        ("shared.js", "export const shared = 'shared-body';\n"),
        (
            "e1.js",
            "import { shared } from './shared';\nconsole.log('e1', shared);\n",
        ),
        (
            "e2.js",
            "import { shared } from './shared';\nconsole.log('e2', shared);\n",
        ),
    ]
}

#[test]
fn shared_code_moves_to_its_own_chunk() {
    let result = bundle(&shared_files(), &["e1.js", "e2.js"], splitting());
    let chunks: Vec<_> = result.chunks().collect();
    assert_eq!(chunks.len(), 3);

    let shared = chunks
        .iter()
        .find(|file| file.path.starts_with("chunk-"))
        .expect("a shared chunk");
    assert!(shared.text().contains("shared-body"));
    assert!(shared.text().contains("export { shared }"), "{}", shared.text());

    for entry in ["e1.js", "e2.js"] {
        let code = output(&result, entry);
        assert!(!code.contains("shared-body"), "{code}");
        assert!(
            code.contains("import { shared } from \"./chunk-"),
            "{code}"
        );
    }
}

#[test]
fn without_splitting_each_entry_is_self_contained() {
    let result = bundle(&shared_files(), &["e1.js", "e2.js"], esm());
    assert_eq!(result.chunks().count(), 2);
    for entry in ["e1.js", "e2.js"] {
        let code = output(&result, entry);
        assert!(code.contains("shared-body"), "{code}");
        assert!(!code.contains("import"), "{code}");
    }
}

#[test]
fn chunk_names_are_stable_across_builds() {
    let first = bundle(&shared_files(), &["e1.js", "e2.js"], splitting());
    let second = bundle(&shared_files(), &["e1.js", "e2.js"], splitting());
    let paths = |result: &knit_bundler::BuildResult| {
        result
            .outputs
            .iter()
            .map(|file| (file.path.clone(), file.contents.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(paths(&first), paths(&second));
}

#[test]
fn dynamic_import_becomes_its_own_chunk() {
    let files = [
        ("lazy.js", "export function run() { return 'lazy-body'; }\n"),
        (
            "main.js",
            "export async function start() {\n  const mod = await import('./lazy');\n  return mod.run();\n}\n",
        ),
    ];
    let result = bundle(&files, &["main.js"], splitting());
    let main = output(&result, "main.js");
    assert!(main.contains("import(\"./lazy-"), "{main}");
    assert!(!main.contains("lazy-body"), "{main}");

    let lazy = result
        .chunks()
        .find(|file| file.path.starts_with("lazy-"))
        .expect("a chunk for the dynamic import");
    assert!(lazy.text().contains("lazy-body"));
    assert!(lazy.text().contains("export { run }"), "{}", lazy.text());
}

#[test]
fn dynamic_import_is_inlined_without_splitting() {
    let files = [
        ("lazy.js", "export function run() { return 'lazy-body'; }\n"),
        (
            "main.js",
            "export async function start() {\n  const mod = await import('./lazy');\n  return mod.run();\n}\n",
        ),
    ];
    let result = bundle(&files, &["main.js"], esm());
    let code = only_chunk(&result);
    assert!(code.contains("lazy-body"), "{code}");
    assert!(code.contains("Promise.resolve().then(() => lazy_ns)"), "{code}");
    assert!(code.contains("get run()"), "{code}");
}

#[test]
fn entry_names_follow_the_template() {
    let files = [
        ("src/pages/home.js", "console.log('home');\n"),
        ("src/admin.js", "console.log('admin');\n"),
    ];
    let result = bundle(&files, &["src/pages/home.js", "src/admin.js"], esm());
    assert!(result.output("pages/home.js").is_some());
    assert!(result.output("admin.js").is_some());

    let result = bundle(
        &files,
        &["src/pages/home.js", "src/admin.js"],
        BuildOptions {
            entry_names: "[name]-[hash]".into(),
            out_extension: ".mjs".into(),
            ..esm()
        },
    );
    for file in result.chunks() {
        assert!(file.path.ends_with(".mjs"), "{}", file.path);
        let stem = file.path.trim_end_matches(".mjs");
        let (_, hash) = stem.rsplit_once('-').unwrap();
        assert_eq!(hash.len(), 8);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}

#[test]
fn colliding_output_paths_are_an_error() {
    let result = build_with(
        &[
            ("src/a/index.js", "console.log('a');\n"),
            ("src/b/index.js", "console.log('b');\n"),
        ],
        &["src/a/index.js", "src/b/index.js"],
        BuildOptions {
            entry_names: "[name]".into(),
            ..esm()
        },
    );
    assert_fails_with(&result, DiagnosticKind::DuplicateOutputPath);
}

#[test]
fn splitting_requires_esm() {
    let bundler = knit_bundler::Bundler::new(
        std::sync::Arc::new(helpers::runtime(&[("main.js", "1;\n")])),
        BuildOptions {
            splitting: true,
            format: Format::Cjs,
            ..esm()
        },
    );
    let err = bundler
        .build(&[knit_bundler::EntryPoint::path("main.js")])
        .unwrap_err();
    assert!(matches!(err, knit_bundler::Error::InvalidConfig(_)));
}
