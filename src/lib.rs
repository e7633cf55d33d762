//! Kestrel
//!
//! Semantic analysis and bytecode generation for the Kestrel language.
//!
//! The [`Compiler`] takes already-parsed declaration sources through the
//! staged pipeline and returns a [`CompilerResults`] carrying the stage
//! reached, the diagnostics and, when requested, one binary per type.
//!
//! # Example
//!
//! ```ignore
//! use kestrel::{Compiler, CompilerParameters, ParsedSource};
//!
//! kestrel::logging::init_logging();
//!
//! let sources = vec![ParsedSource::boxed(unit)];
//! let params = CompilerParameters::new().generate_binary(true);
//! let results = Compiler::new().compile(&sources, &params);
//! for diagnostic in &results.diagnostics {
//!     eprintln!("{diagnostic}");
//! }
//! let bytes = &results.binaries["app.Main"];
//! ```

pub mod compiler;
pub mod logging;
pub mod parameters;
pub mod progress;
pub mod sources;

pub use compiler::{Compiler, CompilerResults};
pub use parameters::CompilerParameters;
pub use progress::{CancellationToken, ProgressTracker};
pub use sources::{DeclarationSource, DocumentationSink, LibraryLoader, ParsedSource};

pub use kestrel_compiler::{BinaryEmitter, BodyValidator, ClassWriter, CompilationSession, CompilationStage, DefaultValidator};
pub use kestrel_core::{Diagnostic, Severity};
