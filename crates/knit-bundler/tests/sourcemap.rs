//! Source maps point generated tokens back at their original text.

mod helpers;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use helpers::{bundle, esm, output};
use knit_bundler::{BuildOptions, OutputKind, SourceMapMode};
use sourcemap::SourceMap;

const A: &str = "export const greeting = 'hello';\nexport function shout(text) {\n  return text.toUpperCase();\n}\n";
const MAIN: &str = "import { greeting, shout } from './a';\n\nconsole.log(shout(greeting));\n";

fn with_maps(mode: SourceMapMode) -> BuildOptions {
    BuildOptions {
        sourcemap: Some(mode),
        ..esm()
    }
}

fn line_text(text: &str, line: u32) -> &str {
    text.lines().nth(line as usize).unwrap_or("")
}

#[test]
fn external_maps_are_separate_files() {
    let result = bundle(
        &[("a.js", A), ("main.js", MAIN)],
        &["main.js"],
        with_maps(SourceMapMode::External),
    );
    let code = output(&result, "main.js");
    assert!(!code.contains("sourceMappingURL"), "{code}");

    let file = result.output("main.js.map").expect("map output");
    assert_eq!(file.kind, OutputKind::SourceMap);
    let map = SourceMap::from_slice(&file.contents).unwrap();
    assert_eq!(map.get_file(), Some("main.js"));
    let sources: Vec<_> = map.sources().collect();
    assert_eq!(sources, ["../a.js", "../main.js"]);
    assert_eq!(map.get_source_contents(0), Some(A));
}

#[test]
fn tokens_map_back_to_matching_text() {
    let result = bundle(
        &[("a.js", A), ("main.js", MAIN)],
        &["main.js"],
        with_maps(SourceMapMode::External),
    );
    let code = output(&result, "main.js");
    let map = SourceMap::from_slice(&result.output("main.js.map").unwrap().contents).unwrap();

    let mut checked = 0;
    for token in map.tokens() {
        let original = match token.get_source() {
            Some("../a.js") => A,
            Some("../main.js") => MAIN,
            other => panic!("unexpected source {other:?}"),
        };
        let generated = &line_text(code, token.get_dst_line())[token.get_dst_col() as usize..];
        let source = &line_text(original, token.get_src_line())[token.get_src_col() as usize..];
        assert_eq!(
            generated.chars().next(),
            source.chars().next(),
            "token {token} maps {generated:?} to {source:?}"
        );
        checked += 1;
    }
    assert!(checked > 10, "only {checked} tokens");

    // the call in main.js lands on its original line
    let (line, column) = code
        .lines()
        .enumerate()
        .find_map(|(line, text)| text.find("console").map(|col| (line as u32, col as u32)))
        .unwrap();
    let token = map.lookup_token(line, column).unwrap();
    assert_eq!(token.get_source(), Some("../main.js"));
    assert_eq!(token.get_src_line(), 2);
    assert_eq!(token.get_src_col(), 0);
}

#[test]
fn linked_maps_add_a_comment() {
    let result = bundle(
        &[("main.js", MAIN), ("a.js", A)],
        &["main.js"],
        with_maps(SourceMapMode::Linked),
    );
    let code = output(&result, "main.js");
    assert!(code.ends_with("//# sourceMappingURL=main.js.map\n"), "{code}");
    assert!(result.output("main.js.map").is_some());
}

#[test]
fn inline_maps_are_embedded() {
    let result = bundle(
        &[("main.js", MAIN), ("a.js", A)],
        &["main.js"],
        with_maps(SourceMapMode::Inline),
    );
    assert!(result.output("main.js.map").is_none());

    let code = output(&result, "main.js");
    let prefix = "//# sourceMappingURL=data:application/json;base64,";
    let encoded = code
        .lines()
        .find_map(|line| line.strip_prefix(prefix))
        .expect("inline map comment");
    let bytes = STANDARD.decode(encoded).unwrap();
    let map = SourceMap::from_slice(&bytes).unwrap();
    assert_eq!(map.get_source_count(), 2);
}

#[test]
fn sources_content_and_root_are_configurable() {
    let result = bundle(
        &[("main.js", MAIN), ("a.js", A)],
        &["main.js"],
        BuildOptions {
            sources_content: false,
            source_root: Some("https://example.com/src/".into()),
            ..with_maps(SourceMapMode::External)
        },
    );
    let map = SourceMap::from_slice(&result.output("main.js.map").unwrap().contents).unwrap();
    assert_eq!(map.get_source_root(), Some("https://example.com/src/"));
    assert_eq!(map.get_source_contents(0), None);
}

#[test]
fn no_maps_by_default() {
    let result = bundle(&[("main.js", MAIN), ("a.js", A)], &["main.js"], esm());
    assert!(result.output("main.js.map").is_none());
    assert!(!output(&result, "main.js").contains("sourceMappingURL"));
}
