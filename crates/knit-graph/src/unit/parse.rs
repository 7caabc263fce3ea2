//! Turning source text into a [`SourceUnit`].
//!
//! The program is parsed with `oxc_parser`, scoped with `oxc_semantic`, and
//! then walked once per top-level statement. Each statement becomes a
//! [`Part`]; root-scope bindings become [`Symbol`]s; import and export
//! statements are lowered into [`ImportRecord`]s, import bindings and the
//! export map. The AST is dropped before returning.

use indexmap::IndexMap;
use indexmap::map::Entry;
use oxc_allocator::Allocator;
use oxc_ast::ast::{
    AssignmentTargetPropertyIdentifier, BindingIdentifier, BindingProperty,
    ConditionalExpression, Declaration, ExportAllDeclaration, ExportDefaultDeclaration,
    ExportDefaultDeclarationKind, ExportNamedDeclaration, Expression, IdentifierReference,
    BinaryOperator, IfStatement, ImportDeclaration, ImportDeclarationSpecifier, ImportExpression,
    LogicalOperator, ModuleExportName, ObjectProperty, Statement, StringLiteral, UnaryOperator,
};
use oxc_ast_visit::{Visit, walk};
use oxc_ecmascript::side_effects::MayHaveSideEffects;
use oxc_parser::Parser;
use oxc_semantic::{ScopeFlags, Scoping, SemanticBuilder, SymbolFlags, SymbolId};
use oxc_span::{GetSpan, SourceType, Span};
use rustc_hash::{FxHashMap, FxHashSet};

use super::define::apply_defines;
use super::side_effects::SideEffectContext;
use super::{
    ImportBinding, ImportKind, ImportName, ImportRecord, LineIndex, LocalSymbolId, Occurrence,
    Part, PartId, PartKind, SourceUnit, Symbol, SymbolKind,
};
use crate::cache::ContentHash;
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::loader::Loader;
use crate::module_id::{ModuleId, to_identifier};

/// Knobs that change how parts are classified.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Ignore `/* @__PURE__ */` and `/* #__NO_SIDE_EFFECTS__ */` annotations.
    pub ignore_annotations: bool,
    /// Callee names whose calls are side-effect free.
    pub pure_functions: Vec<String>,
    /// Global identifiers or dotted paths replaced by expression text.
    pub define: FxHashMap<String, String>,
}

/// Parse `text` into a source unit.
///
/// Every syntax, semantic and export-shape error found is returned; the
/// unit is only produced when there are none.
pub fn parse_unit(
    id: ModuleId,
    loader: Loader,
    text: &str,
    options: &ParseOptions,
) -> Result<SourceUnit, Vec<Diagnostic>> {
    let content_hash = ContentHash::of(text);

    let source = match loader {
        Loader::Css => return Ok(css_unit(id, text, content_hash)),
        Loader::Json => {
            if let Err(err) = serde_json::from_str::<serde_json::Value>(text) {
                let diagnostic =
                    Diagnostic::error(DiagnosticKind::SyntaxError, format!("Invalid JSON: {err}"))
                        .at(&id, err.line() as u32, err.column().saturating_sub(1) as u32);
                return Err(vec![diagnostic]);
            }
            format!("export default {};\n", text.trim())
        }
        Loader::Text => {
            let literal = serde_json::to_string(text).map_err(|err| {
                vec![Diagnostic::internal(format!("failed to quote text: {err}")).in_file(&id)]
            })?;
            format!("export default {literal};\n")
        }
        Loader::Js | Loader::Jsx => text.to_string(),
    };
    let source_type = match loader {
        Loader::Jsx => SourceType::jsx(),
        _ => SourceType::mjs(),
    };
    let source = if options.define.is_empty() {
        source
    } else {
        apply_defines(&source, source_type, &options.define).unwrap_or(source)
    };

    let line_index = LineIndex::new(&source);
    let located = |message: &str, offset: Option<usize>| {
        let kind = if message.starts_with("Duplicated export") {
            DiagnosticKind::DuplicateExport
        } else {
            DiagnosticKind::SyntaxError
        };
        let diagnostic = Diagnostic::error(kind, message);
        match offset {
            Some(offset) => {
                let (line, column) = line_index.line_column(offset as u32, &source);
                diagnostic.at(&id, line, column)
            }
            None => diagnostic.in_file(&id),
        }
    };

    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, &source, source_type).parse();
    if parsed.panicked || !parsed.errors.is_empty() {
        let mut errors: Vec<Diagnostic> = parsed
            .errors
            .iter()
            .map(|error| {
                let offset = error
                    .labels
                    .as_ref()
                    .and_then(|labels| labels.first())
                    .map(|label| label.offset());
                located(&error.message, offset)
            })
            .collect();
        if errors.is_empty() {
            errors.push(located("Unexpected end of input", None));
        }
        return Err(errors);
    }

    let built = SemanticBuilder::new()
        .with_check_syntax_error(true)
        .build(&parsed.program);
    if !built.errors.is_empty() {
        return Err(built
            .errors
            .iter()
            .map(|error| {
                let offset = error
                    .labels
                    .as_ref()
                    .and_then(|labels| labels.first())
                    .map(|label| label.offset());
                located(&error.message, offset)
            })
            .collect());
    }
    let scoping = built.semantic.scoping();

    let mut extractor = Extractor::new(&id, &source, scoping, options, line_index);
    for statement in &parsed.program.body {
        extractor.statement(statement);
    }
    extractor.finish(id.clone(), loader, source.clone(), content_hash)
}

fn css_unit(id: ModuleId, text: &str, content_hash: ContentHash) -> SourceUnit {
    let mut css = Part::new((0, text.len() as u32), PartKind::Css);
    css.can_be_removed_if_unused = false;

    let namespace_symbol = LocalSymbolId(0);
    let mut namespace = Part::new((0, 0), PartKind::Namespace);
    namespace.declared.push(namespace_symbol);

    SourceUnit {
        symbols: vec![Symbol {
            name: format!("{}_ns", id.stem()),
            kind: SymbolKind::Namespace,
            declared_by: vec![PartId(1)],
            import: None,
        }],
        id,
        loader: Loader::Css,
        source: text.to_string(),
        content_hash,
        parts: vec![css, namespace],
        exports: IndexMap::new(),
        star_exports: Vec::new(),
        import_records: Vec::new(),
        namespace_symbol,
        namespace_part: PartId(1),
        nested_names: FxHashSet::default(),
        globals: FxHashSet::default(),
        line_index: LineIndex::new(text),
    }
}

fn range(span: Span) -> (u32, u32) {
    (span.start, span.end)
}

fn extend_unique<T: PartialEq + Copy>(target: &mut Vec<T>, items: impl IntoIterator<Item = T>) {
    for item in items {
        if !target.contains(&item) {
            target.push(item);
        }
    }
}

/// Literal truthiness of a branch test, when it is known without evaluation.
fn static_truthiness(expr: &Expression<'_>) -> Option<bool> {
    match expr.without_parentheses() {
        Expression::BooleanLiteral(lit) => Some(lit.value),
        Expression::NullLiteral(_) => Some(false),
        Expression::NumericLiteral(lit) => Some(lit.value != 0.0 && !lit.value.is_nan()),
        Expression::StringLiteral(lit) => Some(!lit.value.is_empty()),
        Expression::UnaryExpression(unary) if unary.operator == UnaryOperator::LogicalNot => {
            static_truthiness(&unary.argument).map(|value| !value)
        }
        Expression::BinaryExpression(binary) => {
            let (left, right) = (primitive(&binary.left)?, primitive(&binary.right)?);
            let same_type = std::mem::discriminant(&left) == std::mem::discriminant(&right);
            match binary.operator {
                BinaryOperator::StrictEquality => Some(left == right),
                BinaryOperator::StrictInequality => Some(left != right),
                // loose comparison across types coerces; not worth modelling
                BinaryOperator::Equality if same_type => Some(left == right),
                BinaryOperator::Inequality if same_type => Some(left != right),
                _ => None,
            }
        }
        Expression::LogicalExpression(logical) => {
            let left = static_truthiness(&logical.left)?;
            match (logical.operator, left) {
                (LogicalOperator::And, false) => Some(false),
                (LogicalOperator::Or, true) => Some(true),
                (LogicalOperator::And | LogicalOperator::Or, _) => {
                    static_truthiness(&logical.right)
                }
                (LogicalOperator::Coalesce, _) => None,
            }
        }
        _ => None,
    }
}

#[derive(Debug, PartialEq)]
enum Primitive<'e> {
    String(&'e str),
    Number(f64),
    Boolean(bool),
    Null,
}

fn primitive<'e>(expr: &'e Expression<'_>) -> Option<Primitive<'e>> {
    match expr.without_parentheses() {
        Expression::StringLiteral(lit) => Some(Primitive::String(lit.value.as_str())),
        Expression::NumericLiteral(lit) => Some(Primitive::Number(lit.value)),
        Expression::BooleanLiteral(lit) => Some(Primitive::Boolean(lit.value)),
        Expression::NullLiteral(_) => Some(Primitive::Null),
        _ => None,
    }
}

fn ends_with_semicolon(text: &str) -> bool {
    text.trim_end().ends_with(';')
}

fn statement_needs_semicolon(statement: &Statement<'_>, text: &str) -> bool {
    matches!(
        statement,
        Statement::ExpressionStatement(_)
            | Statement::VariableDeclaration(_)
            | Statement::ThrowStatement(_)
            | Statement::ReturnStatement(_)
            | Statement::DebuggerStatement(_)
            | Statement::BreakStatement(_)
            | Statement::ContinueStatement(_)
            | Statement::DoWhileStatement(_)
    ) && !ends_with_semicolon(text)
}

struct DynamicImport {
    specifier: String,
    span: (u32, u32),
    source_span: (u32, u32),
    dead: bool,
}

/// Identifiers, bindings and dynamic imports found inside one part.
struct PartVisitor<'s> {
    scoping: &'s Scoping,
    symbol_map: &'s FxHashMap<SymbolId, LocalSymbolId>,
    occurrences: Vec<Occurrence>,
    declared: Vec<LocalSymbolId>,
    referenced: Vec<LocalSymbolId>,
    dynamic_imports: Vec<DynamicImport>,
    shorthand: bool,
    dead_depth: u32,
}

impl<'s> PartVisitor<'s> {
    fn new(scoping: &'s Scoping, symbol_map: &'s FxHashMap<SymbolId, LocalSymbolId>) -> Self {
        Self {
            scoping,
            symbol_map,
            occurrences: Vec::new(),
            declared: Vec::new(),
            referenced: Vec::new(),
            dynamic_imports: Vec::new(),
            shorthand: false,
            dead_depth: 0,
        }
    }

    fn in_branch(&mut self, dead: bool, visit: impl FnOnce(&mut Self)) {
        if dead {
            self.dead_depth += 1;
        }
        visit(self);
        if dead {
            self.dead_depth -= 1;
        }
    }

    fn record(&mut self, span: Span, symbol: LocalSymbolId) {
        let shorthand = std::mem::take(&mut self.shorthand);
        self.occurrences.push(Occurrence {
            span: range(span),
            symbol,
            shorthand,
        });
    }
}

impl<'a> Visit<'a> for PartVisitor<'_> {
    fn visit_identifier_reference(&mut self, it: &IdentifierReference<'a>) {
        let symbol = it
            .reference_id
            .get()
            .and_then(|id| self.scoping.get_reference(id).symbol_id())
            .and_then(|id| self.symbol_map.get(&id).copied());
        match symbol {
            Some(symbol) => {
                self.record(it.span, symbol);
                extend_unique(&mut self.referenced, [symbol]);
            }
            None => self.shorthand = false,
        }
    }

    fn visit_binding_identifier(&mut self, it: &BindingIdentifier<'a>) {
        let symbol = it
            .symbol_id
            .get()
            .and_then(|id| self.symbol_map.get(&id).copied());
        match symbol {
            Some(symbol) => {
                self.record(it.span, symbol);
                extend_unique(&mut self.declared, [symbol]);
            }
            None => self.shorthand = false,
        }
    }

    fn visit_object_property(&mut self, it: &ObjectProperty<'a>) {
        self.shorthand = it.shorthand;
        walk::walk_object_property(self, it);
        self.shorthand = false;
    }

    fn visit_binding_property(&mut self, it: &BindingProperty<'a>) {
        self.shorthand = it.shorthand;
        walk::walk_binding_property(self, it);
        self.shorthand = false;
    }

    fn visit_assignment_target_property_identifier(
        &mut self,
        it: &AssignmentTargetPropertyIdentifier<'a>,
    ) {
        self.shorthand = true;
        self.visit_identifier_reference(&it.binding);
        self.shorthand = false;
        if let Some(init) = &it.init {
            self.visit_expression(init);
        }
    }

    fn visit_import_expression(&mut self, it: &ImportExpression<'a>) {
        if let Expression::StringLiteral(lit) = &it.source {
            self.dynamic_imports.push(DynamicImport {
                specifier: lit.value.to_string(),
                span: range(it.span),
                source_span: range(lit.span),
                dead: self.dead_depth > 0,
            });
        }
        walk::walk_import_expression(self, it);
    }

    fn visit_if_statement(&mut self, it: &IfStatement<'a>) {
        let truthy = static_truthiness(&it.test);
        self.visit_expression(&it.test);
        self.in_branch(truthy == Some(false), |v| v.visit_statement(&it.consequent));
        if let Some(alternate) = &it.alternate {
            self.in_branch(truthy == Some(true), |v| v.visit_statement(alternate));
        }
    }

    fn visit_conditional_expression(&mut self, it: &ConditionalExpression<'a>) {
        let truthy = static_truthiness(&it.test);
        self.visit_expression(&it.test);
        self.in_branch(truthy == Some(false), |v| v.visit_expression(&it.consequent));
        self.in_branch(truthy == Some(true), |v| v.visit_expression(&it.alternate));
    }
}

struct Collected {
    occurrences: Vec<Occurrence>,
    declared: Vec<LocalSymbolId>,
    referenced: Vec<LocalSymbolId>,
    dynamic_imports: Vec<DynamicImport>,
}

struct Extractor<'s> {
    id: &'s ModuleId,
    source: &'s str,
    scoping: &'s Scoping,
    ctx: SideEffectContext<'s>,
    symbols: Vec<Symbol>,
    symbol_map: FxHashMap<SymbolId, LocalSymbolId>,
    parts: Vec<Part>,
    exports: IndexMap<String, LocalSymbolId>,
    star_exports: Vec<usize>,
    import_records: Vec<ImportRecord>,
    errors: Vec<Diagnostic>,
    line_index: LineIndex,
}

impl<'s> Extractor<'s> {
    fn new(
        id: &'s ModuleId,
        source: &'s str,
        scoping: &'s Scoping,
        options: &'s ParseOptions,
        line_index: LineIndex,
    ) -> Self {
        let root = scoping.root_scope_id();
        let mut symbols = Vec::new();
        let mut symbol_map = FxHashMap::default();

        for symbol_id in scoping.symbol_ids() {
            if scoping.symbol_scope_id(symbol_id) != root {
                continue;
            }
            let flags = scoping.symbol_flags(symbol_id);
            let kind = if flags.contains(SymbolFlags::Import) {
                SymbolKind::Import
            } else if flags.contains(SymbolFlags::Function) {
                SymbolKind::Function
            } else if flags.contains(SymbolFlags::Class) {
                SymbolKind::Class
            } else {
                SymbolKind::Variable
            };
            symbol_map.insert(symbol_id, LocalSymbolId(symbols.len() as u32));
            symbols.push(Symbol {
                name: scoping.symbol_name(symbol_id).to_string(),
                kind,
                declared_by: Vec::new(),
                import: None,
            });
        }

        Self {
            id,
            source,
            scoping,
            ctx: SideEffectContext {
                scoping,
                annotations: !options.ignore_annotations,
                pure_functions: &options.pure_functions,
            },
            symbols,
            symbol_map,
            parts: Vec::new(),
            exports: IndexMap::new(),
            star_exports: Vec::new(),
            import_records: Vec::new(),
            errors: Vec::new(),
            line_index,
        }
    }

    fn line_column(&self, offset: u32) -> (u32, u32) {
        self.line_index.line_column(offset, self.source)
    }

    fn text(&self, span: Span) -> &'s str {
        self.source
            .get(span.start as usize..span.end as usize)
            .unwrap_or_default()
    }

    fn add_symbol(&mut self, name: String, kind: SymbolKind) -> LocalSymbolId {
        let id = LocalSymbolId(self.symbols.len() as u32);
        self.symbols.push(Symbol {
            name,
            kind,
            declared_by: Vec::new(),
            import: None,
        });
        id
    }

    fn binding_symbol(&self, ident: &BindingIdentifier<'_>) -> Option<LocalSymbolId> {
        ident
            .symbol_id
            .get()
            .and_then(|id| self.symbol_map.get(&id).copied())
    }

    fn reference_symbol(&self, ident: &IdentifierReference<'_>) -> Option<LocalSymbolId> {
        ident
            .reference_id
            .get()
            .and_then(|id| self.scoping.get_reference(id).symbol_id())
            .and_then(|id| self.symbol_map.get(&id).copied())
    }

    fn add_record(
        &mut self,
        source: &StringLiteral<'_>,
        kind: ImportKind,
        span: Span,
        names: Vec<String>,
    ) -> usize {
        self.import_records.push(ImportRecord {
            specifier: source.value.to_string(),
            kind,
            span: range(span),
            source_span: range(source.span),
            names,
            in_dead_branch: false,
        });
        self.import_records.len() - 1
    }

    fn add_export(&mut self, name: String, symbol: LocalSymbolId, span: Span) {
        let (line, column) = self.line_column(span.start);
        match self.exports.entry(name) {
            Entry::Occupied(entry) => {
                self.errors.push(
                    Diagnostic::error(
                        DiagnosticKind::DuplicateExport,
                        format!("Duplicated export '{}'", entry.key()),
                    )
                    .at(self.id, line, column),
                );
            }
            Entry::Vacant(entry) => {
                entry.insert(symbol);
            }
        }
    }

    /// Run a [`PartVisitor`] and fold its findings into `part`.
    fn collect(&mut self, part: &mut Part, visit: impl FnOnce(&mut PartVisitor<'_>)) {
        let collected = {
            let mut visitor = PartVisitor::new(self.scoping, &self.symbol_map);
            visit(&mut visitor);
            Collected {
                occurrences: visitor.occurrences,
                declared: visitor.declared,
                referenced: visitor.referenced,
                dynamic_imports: visitor.dynamic_imports,
            }
        };

        part.occurrences.extend(collected.occurrences);
        extend_unique(&mut part.declared, collected.declared);
        extend_unique(&mut part.referenced, collected.referenced);
        for dynamic in collected.dynamic_imports {
            self.import_records.push(ImportRecord {
                specifier: dynamic.specifier,
                kind: ImportKind::Dynamic,
                span: dynamic.span,
                source_span: dynamic.source_span,
                names: vec!["*".to_string()],
                in_dead_branch: dynamic.dead,
            });
            part.records.push(self.import_records.len() - 1);
        }
    }

    fn statement(&mut self, statement: &Statement<'_>) {
        let part_id = PartId(self.parts.len() as u32);
        let part = match statement {
            Statement::ImportDeclaration(decl) => self.import_declaration(decl),
            Statement::ExportAllDeclaration(decl) => self.export_all(decl),
            Statement::ExportNamedDeclaration(decl) => self.export_named(decl),
            Statement::ExportDefaultDeclaration(decl) => self.export_default(decl),
            _ => {
                let span = statement.span();
                let mut part = Part::new(range(span), PartKind::Statement);
                self.collect(&mut part, |v| v.visit_statement(statement));
                part.can_be_removed_if_unused = !statement.may_have_side_effects(&self.ctx);
                part.needs_semicolon = statement_needs_semicolon(statement, self.text(span));
                part
            }
        };

        for &symbol in &part.declared {
            self.symbols[symbol.index()].declared_by.push(part_id);
        }
        self.parts.push(part);
    }

    fn import_declaration(&mut self, decl: &ImportDeclaration<'_>) -> Part {
        let mut part = Part::new(range(decl.span), PartKind::Import);
        let side_effect_only = decl.specifiers.as_ref().is_none_or(|s| s.is_empty());
        let kind = if side_effect_only {
            ImportKind::SideEffect
        } else {
            ImportKind::Static
        };

        let mut bindings = Vec::new();
        if let Some(specifiers) = &decl.specifiers {
            for specifier in specifiers.iter() {
                let (local, imported) = match specifier {
                    ImportDeclarationSpecifier::ImportSpecifier(spec) => (
                        &spec.local,
                        ImportName::Named(spec.imported.name().to_string()),
                    ),
                    ImportDeclarationSpecifier::ImportDefaultSpecifier(spec) => {
                        (&spec.local, ImportName::Named("default".to_string()))
                    }
                    ImportDeclarationSpecifier::ImportNamespaceSpecifier(spec) => {
                        (&spec.local, ImportName::Namespace)
                    }
                };
                if let Some(symbol) = self.binding_symbol(local) {
                    bindings.push((symbol, imported));
                }
            }
        }

        let names = bindings
            .iter()
            .map(|(_, imported)| match imported {
                ImportName::Named(name) => name.clone(),
                ImportName::Namespace => "*".to_string(),
            })
            .collect();
        let record = self.add_record(&decl.source, kind, decl.span, names);
        part.records.push(record);

        for (symbol, imported) in bindings {
            self.symbols[symbol.index()].import = Some(ImportBinding { record, imported });
            extend_unique(&mut part.declared, [symbol]);
        }
        part
    }

    fn export_all(&mut self, decl: &ExportAllDeclaration<'_>) -> Part {
        let mut part = Part::new(range(decl.span), PartKind::ReExport);
        let record = self.add_record(
            &decl.source,
            ImportKind::ReExport,
            decl.span,
            vec!["*".to_string()],
        );
        part.records.push(record);

        match &decl.exported {
            Some(exported) => {
                let name = exported.name().to_string();
                let symbol = self.add_symbol(to_identifier(&name), SymbolKind::Import);
                self.symbols[symbol.index()].import = Some(ImportBinding {
                    record,
                    imported: ImportName::Namespace,
                });
                part.declared.push(symbol);
                self.add_export(name, symbol, exported.span());
            }
            None => self.star_exports.push(record),
        }
        part
    }

    fn export_named(&mut self, decl: &ExportNamedDeclaration<'_>) -> Part {
        if let Some(source) = &decl.source {
            let mut part = Part::new(range(decl.span), PartKind::ReExport);
            let names = decl
                .specifiers
                .iter()
                .map(|spec| spec.local.name().to_string())
                .collect();
            let record = self.add_record(source, ImportKind::ReExport, decl.span, names);
            part.records.push(record);

            for spec in decl.specifiers.iter() {
                let exported = spec.exported.name().to_string();
                let symbol = self.add_symbol(to_identifier(&exported), SymbolKind::Import);
                self.symbols[symbol.index()].import = Some(ImportBinding {
                    record,
                    imported: ImportName::Named(spec.local.name().to_string()),
                });
                part.declared.push(symbol);
                self.add_export(exported, symbol, spec.exported.span());
            }
            return part;
        }

        if let Some(declaration) = &decl.declaration {
            let body = declaration.span();
            let mut part = Part::new(
                range(decl.span),
                PartKind::ExportDecl {
                    body: (body.start, decl.span.end.max(body.end)),
                },
            );
            self.collect(&mut part, |v| v.visit_declaration(declaration));
            part.can_be_removed_if_unused = !declaration.may_have_side_effects(&self.ctx);
            part.needs_semicolon = matches!(declaration, Declaration::VariableDeclaration(_))
                && !ends_with_semicolon(self.text(decl.span));
            for symbol in part.declared.clone() {
                let name = self.symbols[symbol.index()].name.clone();
                self.add_export(name, symbol, body);
            }
            return part;
        }

        let part = Part::new(range(decl.span), PartKind::ExportList);
        for spec in decl.specifiers.iter() {
            let exported = spec.exported.name().to_string();
            let local = match &spec.local {
                ModuleExportName::IdentifierReference(ident) => self.reference_symbol(ident),
                _ => None,
            };
            match local {
                Some(symbol) => self.add_export(exported, symbol, spec.span),
                None => {
                    let (line, column) = self.line_column(spec.span.start);
                    self.errors.push(
                        Diagnostic::error(
                            DiagnosticKind::MissingExport,
                            format!(
                                "Export '{}' is not defined in this module",
                                spec.local.name()
                            ),
                        )
                        .at(self.id, line, column),
                    );
                }
            }
        }
        part
    }

    fn export_default(&mut self, decl: &ExportDefaultDeclaration<'_>) -> Part {
        let synthetic_name = format!("{}_default", self.id.stem());

        match &decl.declaration {
            ExportDefaultDeclarationKind::FunctionDeclaration(func) => {
                if let Some(symbol) = func.id.as_ref().and_then(|id| self.binding_symbol(id)) {
                    let mut part = Part::new(
                        range(decl.span),
                        PartKind::ExportDecl {
                            body: range(func.span),
                        },
                    );
                    self.collect(&mut part, |v| v.visit_function(func, ScopeFlags::Function));
                    self.add_export("default".to_string(), symbol, decl.span);
                    return part;
                }

                let mut keyword = String::new();
                if func.r#async {
                    keyword.push_str("async ");
                }
                keyword.push_str("function");
                if func.generator {
                    keyword.push('*');
                }
                let mut part = Part::new(
                    range(decl.span),
                    PartKind::DefaultAnonymous {
                        keyword,
                        rest: (func.params.span.start, func.span.end),
                    },
                );
                self.collect(&mut part, |v| v.visit_function(func, ScopeFlags::Function));
                let symbol = self.add_symbol(synthetic_name, SymbolKind::DefaultExport);
                part.declared.push(symbol);
                self.add_export("default".to_string(), symbol, decl.span);
                part
            }
            ExportDefaultDeclarationKind::ClassDeclaration(class) => {
                let removable = !class.may_have_side_effects(&self.ctx);
                if let Some(symbol) = class.id.as_ref().and_then(|id| self.binding_symbol(id)) {
                    let mut part = Part::new(
                        range(decl.span),
                        PartKind::ExportDecl {
                            body: range(class.span),
                        },
                    );
                    self.collect(&mut part, |v| v.visit_class(class));
                    part.can_be_removed_if_unused = removable;
                    self.add_export("default".to_string(), symbol, decl.span);
                    return part;
                }

                let kind = if class.decorators.is_empty()
                    && self.text(class.span).starts_with("class")
                {
                    PartKind::DefaultAnonymous {
                        keyword: "class".to_string(),
                        rest: (class.span.start + 5, class.span.end),
                    }
                } else {
                    PartKind::DefaultExpr {
                        expr: range(class.span),
                    }
                };
                let mut part = Part::new(range(decl.span), kind);
                self.collect(&mut part, |v| v.visit_class(class));
                part.can_be_removed_if_unused = removable;
                let symbol = self.add_symbol(synthetic_name, SymbolKind::DefaultExport);
                part.declared.push(symbol);
                self.add_export("default".to_string(), symbol, decl.span);
                part
            }
            ExportDefaultDeclarationKind::TSInterfaceDeclaration(_) => {
                Part::new(range(decl.span), PartKind::ExportList)
            }
            other => {
                let Some(expr) = other.as_expression() else {
                    return Part::new(range(decl.span), PartKind::ExportList);
                };
                let mut part = Part::new(
                    range(decl.span),
                    PartKind::DefaultExpr {
                        expr: range(expr.span()),
                    },
                );
                self.collect(&mut part, |v| v.visit_expression(expr));
                part.can_be_removed_if_unused = !expr.may_have_side_effects(&self.ctx);
                let symbol = self.add_symbol(synthetic_name, SymbolKind::DefaultExport);
                part.declared.push(symbol);
                self.add_export("default".to_string(), symbol, decl.span);
                part
            }
        }
    }

    fn finish(
        mut self,
        id: ModuleId,
        loader: Loader,
        source: String,
        content_hash: ContentHash,
    ) -> Result<SourceUnit, Vec<Diagnostic>> {
        if !self.errors.is_empty() {
            return Err(self.errors);
        }

        let namespace_symbol = self.add_symbol(format!("{}_ns", id.stem()), SymbolKind::Namespace);
        let namespace_part = PartId(self.parts.len() as u32);
        let mut namespace = Part::new((0, 0), PartKind::Namespace);
        namespace.declared.push(namespace_symbol);
        self.symbols[namespace_symbol.index()]
            .declared_by
            .push(namespace_part);
        self.parts.push(namespace);

        // Intra-unit dependencies come from the symbols each part references.
        let symbols = &self.symbols;
        for (index, part) in self.parts.iter_mut().enumerate() {
            let mut deps: Vec<PartId> = part
                .referenced
                .iter()
                .flat_map(|symbol| symbols[symbol.index()].declared_by.iter().copied())
                .filter(|dep| dep.index() != index)
                .collect();
            deps.sort_unstable();
            deps.dedup();
            part.deps = deps;
        }

        let root = self.scoping.root_scope_id();
        let nested_names = self
            .scoping
            .symbol_ids()
            .filter(|&symbol| self.scoping.symbol_scope_id(symbol) != root)
            .map(|symbol| self.scoping.symbol_name(symbol).to_string())
            .collect();
        let globals = self
            .scoping
            .root_unresolved_references()
            .keys()
            .map(|name| name.to_string())
            .collect();

        Ok(SourceUnit {
            id,
            loader,
            source,
            content_hash,
            parts: self.parts,
            symbols: self.symbols,
            exports: self.exports,
            star_exports: self.star_exports,
            import_records: self.import_records,
            namespace_symbol,
            namespace_part,
            nested_names,
            globals,
            line_index: self.line_index,
        })
    }
}
