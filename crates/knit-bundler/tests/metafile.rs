//! The metafile describes inputs, outputs and the edges between them.

mod helpers;

use helpers::{bundle, esm, splitting};
use knit_bundler::BuildOptions;
use serde_json::Value;

fn metafile(result: &knit_bundler::BuildResult) -> Value {
    let text = result.metafile.as_deref().expect("metafile requested");
    serde_json::from_str(text).unwrap()
}

const MAIN: &str = "import { lib } from './lib';\nimport 'left-pad';\nconsole.log(lib);\n";

#[test]
fn inputs_and_outputs_are_listed() {
    let result = bundle(
        &[
            ("src/lib.js", "export const lib = 'lib';\nexport const dead = 'dead';\n"),
            ("src/main.js", MAIN),
        ],
        &["src/main.js"],
        BuildOptions {
            metafile: true,
            external: vec!["left-pad".into()],
            ..esm()
        },
    );
    let meta = metafile(&result);

    let main = &meta["inputs"]["src/main.js"];
    assert_eq!(main["bytes"], MAIN.len());
    assert_eq!(main["imports"][0]["path"], "src/lib.js");
    assert_eq!(main["imports"][0]["kind"], "import-statement");
    assert_eq!(main["imports"][1]["path"], "left-pad");
    assert_eq!(main["imports"][1]["kind"], "side-effect-import");
    assert_eq!(main["imports"][1]["external"], true);
    assert!(main["imports"][0].get("external").is_none());

    let output = &meta["outputs"]["dist/main.js"];
    assert_eq!(output["entryPoint"], "src/main.js");
    assert_eq!(output["bytes"], result.output("main.js").unwrap().contents.len());
    assert!(output["inputs"]["src/lib.js"]["bytesInOutput"].as_u64().unwrap() > 0);
    assert_eq!(output["imports"][0]["path"], "left-pad");
}

#[test]
fn shared_chunks_are_linked_from_entries() {
    let result = bundle(
        &[
            ("shared.js", "export const shared = 'shared';\n"),
            ("a.js", "import { shared } from './shared';\nconsole.log(shared);\n"),
            ("b.js", "import { shared } from './shared';\nconsole.log(shared);\n"),
        ],
        &["a.js", "b.js"],
        BuildOptions {
            metafile: true,
            ..splitting()
        },
    );
    let meta = metafile(&result);
    let outputs = meta["outputs"].as_object().unwrap();
    let (shared_path, shared) = outputs
        .iter()
        .find(|(path, _)| path.starts_with("dist/chunk-"))
        .expect("shared chunk in the metafile");
    assert!(shared.get("entryPoint").is_none());
    assert_eq!(shared["exports"][0], "shared");

    let entry = &outputs["dist/a.js"];
    assert_eq!(entry["entryPoint"], "a.js");
    assert_eq!(entry["imports"][0]["path"], shared_path.as_str());
    assert_eq!(entry["imports"][0]["kind"], "import-statement");
}

#[test]
fn source_maps_are_listed_as_outputs() {
    let result = bundle(
        &[("main.js", "console.log(1);\n")],
        &["main.js"],
        BuildOptions {
            metafile: true,
            sourcemap: Some(knit_bundler::SourceMapMode::Linked),
            ..esm()
        },
    );
    let meta = metafile(&result);
    let map = &meta["outputs"]["dist/main.js.map"];
    assert_eq!(map["bytes"], result.output("main.js.map").unwrap().contents.len());
}

#[test]
fn metafile_is_opt_in() {
    let result = bundle(&[("main.js", "console.log(1);\n")], &["main.js"], esm());
    assert!(result.metafile.is_none());
}
