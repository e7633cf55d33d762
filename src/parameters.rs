//! Per-run compiler configuration.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::progress::ProgressTracker;

/// Options of one [`Compiler::compile`](crate::Compiler::compile) call.
///
/// ```ignore
/// let params = CompilerParameters::new()
///     .class_path("lib/runtime.klib")
///     .symbol("DEBUG")
///     .generate_binary(true);
/// ```
#[derive(Clone, Default)]
pub struct CompilerParameters {
    /// Pre-compiled libraries handed to the [`LibraryLoader`](crate::LibraryLoader).
    pub class_path: Vec<PathBuf>,
    /// Preprocessor symbols. Recorded for collaborators; the pipeline ignores them.
    pub symbols: Vec<String>,
    /// External annotations for library types.
    pub annotated_library_path: Option<PathBuf>,
    /// Run BytecodeGeneration and fill the binary map.
    pub generate_binary: bool,
    /// Where the [`DocumentationSink`](crate::DocumentationSink) writes.
    pub documentation_path: Option<PathBuf>,
    pub progress: Option<Arc<dyn ProgressTracker>>,
}

impl CompilerParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn class_path(mut self, entry: impl Into<PathBuf>) -> Self {
        self.class_path.push(entry.into());
        self
    }

    pub fn symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbols.push(symbol.into());
        self
    }

    pub fn annotated_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.annotated_library_path = Some(path.into());
        self
    }

    pub fn generate_binary(mut self, enabled: bool) -> Self {
        self.generate_binary = enabled;
        self
    }

    pub fn documentation_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.documentation_path = Some(path.into());
        self
    }

    pub fn progress(mut self, tracker: Arc<dyn ProgressTracker>) -> Self {
        self.progress = Some(tracker);
        self
    }

    pub fn documentation(&self) -> Option<&Path> {
        self.documentation_path.as_deref()
    }
}

impl fmt::Debug for CompilerParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompilerParameters")
            .field("class_path", &self.class_path)
            .field("symbols", &self.symbols)
            .field("annotated_library_path", &self.annotated_library_path)
            .field("generate_binary", &self.generate_binary)
            .field("documentation_path", &self.documentation_path)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::CancellationToken;

    #[test]
    fn defaults_produce_no_binaries() {
        let params = CompilerParameters::default();
        assert!(!params.generate_binary);
        assert!(params.class_path.is_empty());
        assert!(params.progress.is_none());
    }

    #[test]
    fn setters_accumulate() {
        let params = CompilerParameters::new()
            .class_path("a.klib")
            .class_path("b.klib")
            .symbol("DEBUG")
            .generate_binary(true)
            .documentation_path("out/doc.xml")
            .progress(Arc::new(CancellationToken::new()));
        assert_eq!(params.class_path.len(), 2);
        assert_eq!(params.symbols, vec!["DEBUG".to_string()]);
        assert_eq!(params.documentation(), Some(Path::new("out/doc.xml")));
        assert!(format!("{:?}", params).contains("progress: true"));
    }
}
