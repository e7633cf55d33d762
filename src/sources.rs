//! Collaborators the compiler consumes: declaration sources, library
//! loaders and documentation sinks.

use std::io;
use std::path::Path;

use kestrel_compiler::CompilationSession;
use kestrel_core::IngestError;
use kestrel_core::ast::CompilationUnit;
use kestrel_types::TypeSystem;

/// One input of a compilation.
///
/// Lexing and parsing happen behind this trait. A [`IngestError::Recoverable`]
/// failure is reported and the input skipped; [`IngestError::Fatal`] aborts
/// the whole run.
pub trait DeclarationSource {
    /// File name used in diagnostics.
    fn file_name(&self) -> &str;

    fn parse(&self) -> Result<CompilationUnit, IngestError>;
}

/// A source whose declaration tree is already built.
#[derive(Debug, Clone)]
pub struct ParsedSource {
    unit: CompilationUnit,
}

impl ParsedSource {
    pub fn new(unit: CompilationUnit) -> Self {
        Self { unit }
    }

    pub fn boxed(unit: CompilationUnit) -> Box<dyn DeclarationSource> {
        Box::new(Self::new(unit))
    }
}

impl DeclarationSource for ParsedSource {
    fn file_name(&self) -> &str {
        &self.unit.file
    }

    fn parse(&self) -> Result<CompilationUnit, IngestError> {
        Ok(self.unit.clone())
    }
}

/// Adds pre-compiled types to the type system before TypesDefinition.
pub trait LibraryLoader {
    /// Load one class-path entry, returning the number of types defined.
    fn load(&mut self, entry: &Path, types: &mut TypeSystem) -> Result<usize, IngestError>;

    /// Apply external annotations to already loaded library types.
    fn load_annotations(&mut self, _path: &Path, _types: &mut TypeSystem) -> Result<(), IngestError> {
        Ok(())
    }
}

/// Receives the validated program when a documentation path is configured.
pub trait DocumentationSink {
    fn write(&mut self, path: &Path, session: &CompilationSession) -> io::Result<()>;
}
