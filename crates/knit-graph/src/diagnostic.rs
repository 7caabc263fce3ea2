//! Build diagnostics.
//!
//! Every phase collects problems as [`Diagnostic`] values instead of
//! returning on the first failure, so a single build reports every broken
//! import or export at once.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::module_id::ModuleId;

/// One problem found during a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: DiagnosticSeverity,
    pub message: String,
    /// Originating file and position, when known.
    pub location: Option<Location>,
    /// Extra lines shown under the message (import chains, hints).
    #[serde(default)]
    pub notes: Vec<String>,
    pub help: Option<String>,
    /// Structured context for the diagnostic (if available)
    pub context: Option<DiagnosticContext>,
}

/// File position of a diagnostic. `line` is 1-based, `column` 0-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

/// Structured context for different diagnostic kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DiagnosticContext {
    UnresolvedImport {
        specifier: String,
        from_file: String,
        /// Import chain from an entry point down to the importer.
        chain: Vec<String>,
    },
    MissingExport {
        export_name: String,
        /// Module that lacks the export.
        module_id: String,
        /// Module that asked for it.
        importer: String,
    },
    CircularReExport {
        /// `(module, name)` hops in the order they were followed.
        cycle: Vec<(String, String)>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    SyntaxError,
    LoadFailed,
    UnresolvedImport,
    MissingExport,
    AmbiguousExport,
    CircularReexport,
    DuplicateExport,
    DuplicateOutputPath,
    Unsupported,
    Internal,
}

impl DiagnosticKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SyntaxError => "syntax_error",
            Self::LoadFailed => "load_failed",
            Self::UnresolvedImport => "unresolved_import",
            Self::MissingExport => "missing_export",
            Self::AmbiguousExport => "ambiguous_export",
            Self::CircularReexport => "circular_reexport",
            Self::DuplicateExport => "duplicate_export",
            Self::DuplicateOutputPath => "duplicate_output_path",
            Self::Unsupported => "unsupported",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Warning,
    Error,
}

impl Diagnostic {
    pub fn error(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: DiagnosticSeverity::Error,
            message: message.into(),
            location: None,
            notes: Vec::new(),
            help: None,
            context: None,
        }
    }

    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            ..Self::error(kind, message)
        }
    }

    /// Generic internal-error diagnostic for violated invariants.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::error(DiagnosticKind::Internal, message)
            .with_help("This is a bug in knit; please report it with the input that triggered it.")
    }

    pub fn at(mut self, file: &ModuleId, line: u32, column: u32) -> Self {
        self.location = Some(Location {
            file: file.to_string(),
            line,
            column,
        });
        self
    }

    /// Attach the file without a position.
    pub fn in_file(mut self, file: &ModuleId) -> Self {
        self.location = Some(Location {
            file: file.to_string(),
            line: 0,
            column: 0,
        });
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn with_context(mut self, context: DiagnosticContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) if loc.line > 0 => write!(
                f,
                "{}:{}:{}: {}",
                loc.file, loc.line, loc.column, self.message
            ),
            Some(loc) => write!(f, "{}: {}", loc.file, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for Diagnostic {}

impl miette::Diagnostic for Diagnostic {
    fn code(&self) -> Option<Box<dyn fmt::Display + '_>> {
        Some(Box::new(format!("knit::{}", self.kind)))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(match self.severity {
            DiagnosticSeverity::Error => miette::Severity::Error,
            DiagnosticSeverity::Warning => miette::Severity::Warning,
        })
    }

    fn help(&self) -> Option<Box<dyn fmt::Display + '_>> {
        let mut lines: Vec<&str> = self.notes.iter().map(String::as_str).collect();
        if let Some(help) = &self.help {
            lines.push(help);
        }
        if lines.is_empty() {
            None
        } else {
            Some(Box::new(lines.join("\n")))
        }
    }
}

/// Render diagnostics as a plain-text report.
///
/// `limit` caps how many are printed (0 = unlimited); the remainder is
/// summarized on a final line.
pub fn format_diagnostics(diagnostics: &[Diagnostic], limit: usize) -> String {
    let shown = if limit == 0 {
        diagnostics.len()
    } else {
        limit.min(diagnostics.len())
    };

    let mut out = String::new();
    for diagnostic in &diagnostics[..shown] {
        let label = match diagnostic.severity {
            DiagnosticSeverity::Error => "error",
            DiagnosticSeverity::Warning => "warning",
        };
        out.push_str(&format!("{label}[{}]: {diagnostic}\n", diagnostic.kind));
        for note in &diagnostic.notes {
            out.push_str(&format!("  note: {note}\n"));
        }
        if let Some(help) = &diagnostic.help {
            out.push_str(&format!("  help: {help}\n"));
        }
    }

    let hidden = diagnostics.len() - shown;
    if hidden > 0 {
        out.push_str(&format!(
            "{hidden} more diagnostic{} not shown\n",
            if hidden == 1 { "" } else { "s" }
        ));
    }
    out
}
