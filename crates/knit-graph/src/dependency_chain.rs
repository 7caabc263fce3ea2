//! Import chains from an entry point down to a unit.
//!
//! Used to explain how a failing import was reached: every unresolved
//! import diagnostic carries the chain of importers that led to it.

use serde::{Deserialize, Serialize};

use crate::module_id::ModuleId;

/// One path through the module graph, entry first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyChain {
    /// The path of module IDs from entry to target
    pub path: Vec<ModuleId>,
    /// Depth of this chain (path length - 1)
    pub depth: usize,
}

impl DependencyChain {
    pub fn new(path: Vec<ModuleId>) -> Self {
        let depth = path.len().saturating_sub(1);
        Self { path, depth }
    }

    /// Get the entry point (first module in the chain).
    pub fn entry_point(&self) -> Option<&ModuleId> {
        self.path.first()
    }

    /// Get the target (last module in the chain).
    pub fn target(&self) -> Option<&ModuleId> {
        self.path.last()
    }

    /// Format the chain as a human-readable string.
    ///
    /// Example: "entry.js -> utils.js -> helper.js"
    pub fn format_chain(&self) -> String {
        self.path
            .iter()
            .map(|id| id.path_string())
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    /// Chain as plain strings, for [`DiagnosticContext`](crate::diagnostic::DiagnosticContext).
    pub fn to_strings(&self) -> Vec<String> {
        self.path.iter().map(ToString::to_string).collect()
    }
}
