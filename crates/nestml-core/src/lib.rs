//! # nestml-core
//!
//! Shared types for the NESTML compiler front-end.
//!
//! ## Scope
//!
//! This crate owns the things every phase of the pipeline (C1-C9) needs and
//! that must not depend on any one phase: source spans, the diagnostics log,
//! the severity taxonomy, and the package/artifact naming rule derived from
//! a source file's path relative to a model root.
//!
//! ## Design philosophy
//!
//! 1. Diagnostics are append-only and carry enough information to point a
//!    user at the offending source range.
//! 2. The log is shared across compilation units processed in parallel, so
//!    it is lock-guarded rather than assuming single-threaded access.
//! 3. Nothing in this crate knows about tokens, ASTs, or units — those are
//!    owned by downstream crates.

use std::fmt;
use std::path::Path;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A position in a source file (1-based line, 0-based column; matches the
/// convention most editors and LSP clients expect).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourcePosition {
    pub line: u32,
    pub column: u32,
}

impl SourcePosition {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    pub const fn start() -> Self {
        Self { line: 1, column: 0 }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A half-open `[start, end)` range within one source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRange {
    pub start: SourcePosition,
    pub end: SourcePosition,
}

impl SourceRange {
    pub fn new(start: SourcePosition, end: SourcePosition) -> Self {
        Self { start, end }
    }

    /// A zero-width range, used for diagnostics that don't have a better
    /// anchor (e.g. whole-unit errors raised before any token was read).
    pub fn point(pos: SourcePosition) -> Self {
        Self { start: pos, end: pos }
    }

    pub const fn unknown() -> Self {
        Self {
            start: SourcePosition { line: 0, column: 0 },
            end: SourcePosition { line: 0, column: 0 },
        }
    }
}

impl fmt::Display for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Diagnostic severity, ordered so `severity >= Severity::Error` is a valid
/// comparison for the orchestrator's phase-gating rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warn,
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        };
        write!(f, "{s}")
    }
}

/// A single diagnostic, the unit of communication between every phase and
/// the user. `code` is a short machine-stable identifier (e.g.
/// `"CoCoConvolveNotCorrectlyProvided"`) so tests can assert on it without
/// string-matching the human message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub range: SourceRange,
    pub message: String,
}

impl Diagnostic {
    pub fn new(severity: Severity, code: impl Into<String>, range: SourceRange, message: impl Into<String>) -> Self {
        Self {
            severity,
            code: code.into(),
            range,
            message: message.into(),
        }
    }

    pub fn info(code: impl Into<String>, range: SourceRange, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, code, range, message)
    }

    pub fn warn(code: impl Into<String>, range: SourceRange, message: impl Into<String>) -> Self {
        Self::new(Severity::Warn, code, range, message)
    }

    pub fn error(code: impl Into<String>, range: SourceRange, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, range, message)
    }

    pub fn fatal(code: impl Into<String>, range: SourceRange, message: impl Into<String>) -> Self {
        Self::new(Severity::Fatal, code, range, message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({}): {}", self.severity, self.code, self.range, self.message)
    }
}

/// Counts of diagnostics by severity, returned by [`DiagnosticLog::summary`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticSummary {
    pub info: usize,
    pub warn: usize,
    pub error: usize,
    pub fatal: usize,
}

impl DiagnosticSummary {
    pub fn total(&self) -> usize {
        self.info + self.warn + self.error + self.fatal
    }

    /// Exit-code policy from the external-interfaces contract: 0 on success,
    /// 1 on any ERROR, 2 on FATAL.
    pub fn exit_code(&self) -> i32 {
        if self.fatal > 0 {
            2
        } else if self.error > 0 {
            1
        } else {
            0
        }
    }
}

/// Append-only diagnostics collector, safe to share across compilation units
/// processed in parallel.
#[derive(Debug, Default)]
pub struct DiagnosticLog {
    entries: Mutex<Vec<Diagnostic>>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, diagnostic: Diagnostic) {
        self.entries.lock().expect("diagnostic log mutex poisoned").push(diagnostic);
    }

    pub fn extend(&self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.entries
            .lock()
            .expect("diagnostic log mutex poisoned")
            .extend(diagnostics);
    }

    /// Merge another unit's locally-buffered diagnostics into this shared
    /// log. Used by the orchestrator when units are processed on separate
    /// threads and each accumulates into its own `Vec` first.
    pub fn merge(&self, mut other: Vec<Diagnostic>) {
        self.entries
            .lock()
            .expect("diagnostic log mutex poisoned")
            .append(&mut other);
    }

    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.entries.lock().expect("diagnostic log mutex poisoned").clone()
    }

    pub fn has_error_or_worse(&self) -> bool {
        self.entries
            .lock()
            .expect("diagnostic log mutex poisoned")
            .iter()
            .any(|d| d.severity >= Severity::Error)
    }

    pub fn summary(&self) -> DiagnosticSummary {
        let entries = self.entries.lock().expect("diagnostic log mutex poisoned");
        let mut summary = DiagnosticSummary::default();
        for d in entries.iter() {
            match d.severity {
                Severity::Info => summary.info += 1,
                Severity::Warn => summary.warn += 1,
                Severity::Error => summary.error += 1,
                Severity::Fatal => summary.fatal += 1,
            }
        }
        summary
    }
}

/// Internal/invariant-violation errors, always FATAL when surfaced as
/// diagnostics.
#[derive(Debug, Error)]
pub enum NestmlError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("internal invariant violated: {0}")]
    Invariant(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, NestmlError>;

/// Derive `(package_name, artifact_name)` for a source file:
///
/// `FILE = ROOT/a/b/c.nestml`, model root `ROOT` -> package `a.b`, artifact `c`.
///
/// Without a model root, the full path stem is used to derive both,
/// doubling as package and artifact name; the caller is responsible for
/// surfacing the WARN this ambiguity implies.
pub fn derive_package_and_artifact(file: &Path, model_root: Option<&Path>) -> (String, String) {
    let stem = file.file_stem().and_then(|s| s.to_str()).unwrap_or("unknown").to_string();

    let relative_dir = model_root.and_then(|root| file.parent().and_then(|dir| dir.strip_prefix(root).ok()));

    match (model_root, relative_dir) {
        (Some(_), Some(rel)) => {
            let package_name = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join(".");
            (package_name, stem)
        }
        // Outside the model root, or no root configured: the whole stem
        // doubles as both package and artifact name.
        _ => (stem.clone(), stem),
    }
}

/// Returns true when a model root was configured but `file` falls outside
/// of it — the ambiguous case that should be surfaced as a WARN.
pub fn package_naming_is_ambiguous(file: &Path, model_root: Option<&Path>) -> bool {
    match model_root {
        None => false,
        Some(root) => file.parent().map(|dir| dir.strip_prefix(root).is_err()).unwrap_or(true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn naming_with_model_root() {
        let root = PathBuf::from("/models");
        let file = PathBuf::from("/models/a/b/c.nestml");
        let (package, artifact) = derive_package_and_artifact(&file, Some(&root));
        assert_eq!(package, "a.b");
        assert_eq!(artifact, "c");
        assert!(!package_naming_is_ambiguous(&file, Some(&root)));
    }

    #[test]
    fn naming_at_model_root() {
        let root = PathBuf::from("/models");
        let file = PathBuf::from("/models/c.nestml");
        let (package, artifact) = derive_package_and_artifact(&file, Some(&root));
        assert_eq!(package, "");
        assert_eq!(artifact, "c");
    }

    #[test]
    fn naming_without_model_root_uses_stem_for_both() {
        let file = PathBuf::from("/elsewhere/c.nestml");
        let (package, artifact) = derive_package_and_artifact(&file, None);
        assert_eq!(package, "c");
        assert_eq!(artifact, "c");
    }

    #[test]
    fn naming_outside_model_root_is_ambiguous() {
        let root = PathBuf::from("/models");
        let file = PathBuf::from("/other/c.nestml");
        assert!(package_naming_is_ambiguous(&file, Some(&root)));
        let (package, artifact) = derive_package_and_artifact(&file, Some(&root));
        assert_eq!(package, "c");
        assert_eq!(artifact, "c");
    }

    #[test]
    fn diagnostic_log_is_thread_safe_and_counts_severities() {
        let log = DiagnosticLog::new();
        log.push(Diagnostic::error("E1", SourceRange::unknown(), "boom"));
        log.push(Diagnostic::warn("W1", SourceRange::unknown(), "careful"));
        let summary = log.summary();
        assert_eq!(summary.error, 1);
        assert_eq!(summary.warn, 1);
        assert_eq!(summary.exit_code(), 1);
        assert!(log.has_error_or_worse());
    }

    #[test]
    fn exit_code_policy() {
        let mut s = DiagnosticSummary::default();
        assert_eq!(s.exit_code(), 0);
        s.error = 1;
        assert_eq!(s.exit_code(), 1);
        s.fatal = 1;
        assert_eq!(s.exit_code(), 2);
    }
}
