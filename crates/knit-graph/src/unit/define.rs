//! Compile-time constants.
//!
//! A define maps a global identifier (`DEBUG`) or a dotted member path
//! rooted at one (`process.env.NODE_ENV`) to expression text. Matches are
//! replaced in the source before it is analysed, so the constant takes part
//! in side-effect classification and dead-branch detection like any literal
//! written by hand. Bindings that shadow the root name are left alone, as
//! are assignment targets.

use oxc_allocator::Allocator;
use oxc_ast::ast::{Expression, ObjectProperty, PropertyKind};
use oxc_ast_visit::{Visit, walk};
use oxc_parser::Parser;
use oxc_semantic::{Scoping, SemanticBuilder};
use oxc_span::{GetSpan, SourceType, Span};
use rustc_hash::FxHashMap;

/// `source` with every define applied, or `None` when nothing matched or
/// the text does not parse (the real parse reports that).
pub(super) fn apply_defines(
    source: &str,
    source_type: SourceType,
    defines: &FxHashMap<String, String>,
) -> Option<String> {
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, source, source_type).parse();
    if parsed.panicked || !parsed.errors.is_empty() {
        return None;
    }
    let built = SemanticBuilder::new().build(&parsed.program);

    let mut finder = DefineFinder {
        scoping: built.semantic.scoping(),
        defines,
        edits: Vec::new(),
    };
    finder.visit_program(&parsed.program);
    if finder.edits.is_empty() {
        return None;
    }

    let mut edits = finder.edits;
    edits.sort_by_key(|(span, _)| span.start);
    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for (span, text) in edits {
        let start = span.start as usize;
        if start < cursor {
            continue;
        }
        out.push_str(&source[cursor..start]);
        out.push_str(&text);
        cursor = span.end as usize;
    }
    out.push_str(&source[cursor..]);
    Some(out)
}

/// Define values are pasted as written; anything beyond a single token is
/// parenthesized so it cannot bind to its surroundings.
fn replacement(value: &str) -> String {
    let single_token = value
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '$' | '.' | '"' | '\''));
    if single_token {
        value.to_string()
    } else {
        format!("({value})")
    }
}

struct DefineFinder<'s> {
    scoping: &'s Scoping,
    defines: &'s FxHashMap<String, String>,
    edits: Vec<(Span, String)>,
}

impl DefineFinder<'_> {
    /// Dotted path of an expression rooted at an unbound identifier.
    fn global_path(&self, expr: &Expression<'_>) -> Option<String> {
        match expr {
            Expression::Identifier(ident) => {
                let global = ident
                    .reference_id
                    .get()
                    .is_some_and(|id| self.scoping.get_reference(id).symbol_id().is_none());
                global.then(|| ident.name.to_string())
            }
            Expression::StaticMemberExpression(member) if !member.optional => {
                let object = self.global_path(&member.object)?;
                Some(format!("{object}.{}", member.property.name))
            }
            _ => None,
        }
    }

    fn lookup(&self, expr: &Expression<'_>) -> Option<(String, &str)> {
        let path = self.global_path(expr)?;
        let value = self.defines.get(&path)?;
        Some((path, value.as_str()))
    }
}

impl<'a> Visit<'a> for DefineFinder<'_> {
    fn visit_expression(&mut self, it: &Expression<'a>) {
        if let Some((_, value)) = self.lookup(it) {
            let text = replacement(value);
            self.edits.push((it.span(), text));
            return;
        }
        walk::walk_expression(self, it);
    }

    fn visit_object_property(&mut self, it: &ObjectProperty<'a>) {
        // `{ DEBUG }` keeps its key
        if it.shorthand
            && it.kind == PropertyKind::Init
            && let Some((name, value)) = self.lookup(&it.value)
        {
            let text = format!("{name}: {}", replacement(value));
            self.edits.push((it.span, text));
            return;
        }
        walk::walk_object_property(self, it);
    }
}
