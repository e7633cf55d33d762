//! Diagnostic messages produced by the compilation pipeline.

use std::fmt;

use crate::error::{CompilationError, CompilationWarning, InternalError};
use crate::span::Span;

/// The severity level of a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Stops the pipeline at the end of the current stage.
    Error,
    /// Reported but never blocks progression.
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A single diagnostic message.
///
/// ```text
/// src/app/Main.ks:10:5: error[20]: use of unassigned local variable 'i'
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Stable identifier of the error or warning kind. `0` marks an internal fault.
    pub id: u32,
    pub severity: Severity,
    /// Source file the diagnostic refers to. Empty for diagnostics with no file.
    pub file: String,
    /// 1-based line, `0` when unknown.
    pub line: u32,
    /// 1-based column, `0` when unknown.
    pub col: u32,
    pub message: String,
}

impl Diagnostic {
    pub fn error(file: &str, span: Span, error: &CompilationError) -> Self {
        Self {
            id: error.id(),
            severity: Severity::Error,
            file: file.to_string(),
            line: span.line,
            col: span.col,
            message: error.to_string(),
        }
    }

    pub fn warning(file: &str, span: Span, warning: &CompilationWarning) -> Self {
        Self {
            id: warning.id(),
            severity: Severity::Warning,
            file: file.to_string(),
            line: span.line,
            col: span.col,
            message: warning.to_string(),
        }
    }

    pub fn internal(error: &InternalError) -> Self {
        Self {
            id: InternalError::ID,
            severity: Severity::Error,
            file: String::new(),
            line: 0,
            col: 0,
            message: error.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.file.is_empty() {
            write!(f, "{}:{}:{}: ", self.file, self.line, self.col)?;
        }
        write!(f, "{}[{}]: {}", self.severity, self.id, self.message)
    }
}

/// An ordered collection of diagnostics for one compilation run.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        if diagnostic.is_error() {
            self.error_count += 1;
        }
        self.diagnostics.push(diagnostic);
    }

    /// Record a user code error at `span` in `file`.
    pub fn error(&mut self, file: &str, span: Span, error: CompilationError) {
        self.push(Diagnostic::error(file, span, &error));
    }

    /// Record a warning at `span` in `file`.
    pub fn warning(&mut self, file: &str, span: Span, warning: CompilationWarning) {
        self.push(Diagnostic::warning(file, span, &warning));
    }

    /// Returns `true` if any error has been recorded.
    ///
    /// Tracked incrementally so stage gating doesn't rescan the list.
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics.len() - self.error_count
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn clear(&mut self) {
        self.diagnostics.clear();
        self.error_count = 0;
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, diagnostic) in self.diagnostics.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", diagnostic)?;
        }
        Ok(())
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.diagnostics.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_tracking() {
        let mut diagnostics = Diagnostics::new();
        assert!(!diagnostics.has_errors());

        diagnostics.warning(
            "Main.ks",
            Span::new(3, 9, 1),
            CompilationWarning::LocalNeverUsed {
                name: "i".to_string(),
            },
        );
        assert!(!diagnostics.has_errors());

        diagnostics.error(
            "Main.ks",
            Span::new(4, 16, 1),
            CompilationError::UnassignedLocal {
                name: "i".to_string(),
            },
        );
        assert!(diagnostics.has_errors());
        assert_eq!(diagnostics.error_count(), 1);
        assert_eq!(diagnostics.warning_count(), 1);
    }

    #[test]
    fn display_includes_location_and_id() {
        let diagnostic = Diagnostic::error(
            "Main.ks",
            Span::new(10, 5, 1),
            &CompilationError::UnassignedLocal {
                name: "i".to_string(),
            },
        );
        assert_eq!(
            diagnostic.to_string(),
            "Main.ks:10:5: error[20]: use of unassigned local variable 'i'"
        );
    }

    #[test]
    fn internal_diagnostic_has_id_zero() {
        let diagnostic = Diagnostic::internal(&InternalError::other("boom"));
        assert_eq!(diagnostic.id, 0);
        assert!(diagnostic.is_error());
        assert_eq!(diagnostic.to_string(), "error[0]: internal error: boom");
    }

    #[test]
    fn clear_resets_error_state() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.error("a.ks", Span::default(), CompilationError::NotAssignable);
        diagnostics.clear();
        assert!(diagnostics.is_empty());
        assert!(!diagnostics.has_errors());
    }
}
