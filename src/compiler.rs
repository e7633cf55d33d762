//! The compilation driver.
//!
//! [`Compiler::compile`] ingests every source, then runs the stages in order:
//!
//! ```text
//! Parsing → TypesDefinition → SuperTypesDefinition → MembersDefinition
//!         → AnnotationsDefinition → CodeValidation → (BytecodeGeneration) → Success
//! ```
//!
//! A stage only starts when no error has been recorded. The stage reported in
//! [`CompilerResults`] is the one that was running when the run stopped.

use kestrel_compiler::{
    AnnotationsPass, BinaryEmitter, BodyValidator, BytecodeGenerationPass, ClassWriter, CodeValidationPass,
    CompilationSession, CompilationStage, DefaultValidator, MembersDefinitionPass, PassOutput, SuperTypesPass,
    TypesDefinitionPass,
};
use kestrel_core::{CompilationError, Diagnostic, IngestError, InternalError, Span};
use rustc_hash::FxHashMap;
use tracing::{debug, info_span, warn};

use crate::parameters::CompilerParameters;
use crate::sources::{DeclarationSource, DocumentationSink, LibraryLoader};

/// Outcome of one run.
#[derive(Debug, Clone)]
pub struct CompilerResults {
    /// Stage the run stopped at, [`CompilationStage::Success`] when complete.
    pub stage: CompilationStage,
    /// Errors and warnings in the order they were reported.
    pub diagnostics: Vec<Diagnostic>,
    /// Fully qualified type name to emitted bytes.
    pub binaries: FxHashMap<String, Vec<u8>>,
    /// A progress tracker stopped the run early.
    pub cancelled: bool,
}

impl CompilerResults {
    pub fn is_success(&self) -> bool {
        self.stage == CompilationStage::Success
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }
}

/// Why a run stopped before `Success`.
enum Stop {
    /// Errors were recorded in the session.
    Failed,
    Cancelled,
    Fatal(IngestError),
    Internal(InternalError),
}

/// Drives the pipeline over a reusable [`CompilationSession`].
pub struct Compiler {
    session: CompilationSession,
    validator: Box<dyn BodyValidator>,
    emitter: Box<dyn BinaryEmitter>,
    loader: Option<Box<dyn LibraryLoader>>,
    documentation: Option<Box<dyn DocumentationSink>>,
    stage: CompilationStage,
    binaries: FxHashMap<String, Vec<u8>>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            session: CompilationSession::new(),
            validator: Box::new(DefaultValidator),
            emitter: Box::new(ClassWriter::new()),
            loader: None,
            documentation: None,
            stage: CompilationStage::Parsing,
            binaries: FxHashMap::default(),
        }
    }

    pub fn with_validator(mut self, validator: impl BodyValidator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    pub fn with_emitter(mut self, emitter: impl BinaryEmitter + 'static) -> Self {
        self.emitter = Box::new(emitter);
        self
    }

    pub fn with_library_loader(mut self, loader: impl LibraryLoader + 'static) -> Self {
        self.loader = Some(Box::new(loader));
        self
    }

    pub fn with_documentation_sink(mut self, sink: impl DocumentationSink + 'static) -> Self {
        self.documentation = Some(Box::new(sink));
        self
    }

    /// State left by the last run, for inspection.
    pub fn session(&self) -> &CompilationSession {
        &self.session
    }

    /// Compile `sources`. Never panics on bad input: user errors and
    /// internal faults both end up in the returned diagnostics.
    pub fn compile(&mut self, sources: &[Box<dyn DeclarationSource>], params: &CompilerParameters) -> CompilerResults {
        let span = info_span!("compile", sources = sources.len());
        let _enter = span.enter();

        self.session.reset();
        self.binaries.clear();
        self.stage = CompilationStage::Parsing;

        let mut cancelled = false;
        match self.run(sources, params) {
            Ok(()) => self.stage = CompilationStage::Success,
            Err(Stop::Failed) => {}
            Err(Stop::Cancelled) => cancelled = true,
            Err(Stop::Fatal(error)) => {
                warn!(%error, "ingestion aborted");
                let file = match &error {
                    IngestError::Fatal { file, .. } | IngestError::Recoverable { file, .. } => file.clone(),
                };
                self.session.diagnostics.error(
                    &file,
                    Span::default(),
                    CompilationError::ParseFailure {
                        message: error.to_string(),
                    },
                );
            }
            Err(Stop::Internal(error)) => {
                warn!(%error, stage = %self.stage, "internal compiler error");
                self.session.diagnostics.push(Diagnostic::internal(&error));
                self.binaries.clear();
            }
        }

        debug!(
            stage = %self.stage,
            errors = self.session.diagnostics.error_count(),
            warnings = self.session.diagnostics.warning_count(),
            cancelled,
            "compilation finished"
        );
        CompilerResults {
            stage: self.stage,
            diagnostics: self.session.diagnostics.iter().cloned().collect(),
            binaries: std::mem::take(&mut self.binaries),
            cancelled,
        }
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    fn run(&mut self, sources: &[Box<dyn DeclarationSource>], params: &CompilerParameters) -> Result<(), Stop> {
        if !params.symbols.is_empty() {
            debug!(symbols = ?params.symbols, "preprocessor symbols");
        }
        self.ingest(sources)?;
        self.load_libraries(params)?;
        self.finish_stage(params)?;

        self.enter(CompilationStage::TypesDefinition);
        let output = TypesDefinitionPass::new(&mut self.session).run();
        self.finish_pass(output, params)?;

        self.enter(CompilationStage::SuperTypesDefinition);
        let output = SuperTypesPass::new(&mut self.session).run();
        self.finish_pass(output, params)?;

        self.enter(CompilationStage::MembersDefinition);
        let output = MembersDefinitionPass::new(&mut self.session).run();
        self.finish_pass(output, params)?;

        self.enter(CompilationStage::AnnotationsDefinition);
        let output = AnnotationsPass::new(&mut self.session).run();
        self.finish_pass(output, params)?;

        self.enter(CompilationStage::CodeValidation);
        let output = CodeValidationPass::with_validator(&mut self.session, Box::new(&mut *self.validator)).run();
        self.finish_pass(output, params)?;
        self.write_documentation(params);

        if params.generate_binary {
            self.enter(CompilationStage::BytecodeGeneration);
            self.generate()?;
            self.finish_stage(params)?;
        }
        Ok(())
    }

    fn enter(&mut self, stage: CompilationStage) {
        debug!(%stage, "stage started");
        self.stage = stage;
    }

    fn finish_pass(&mut self, output: PassOutput, params: &CompilerParameters) -> Result<(), Stop> {
        debug!(stage = %self.stage, processed = output.processed, "stage complete");
        self.finish_stage(params)
    }

    /// Gate on recorded errors, then poll the progress tracker.
    fn finish_stage(&mut self, params: &CompilerParameters) -> Result<(), Stop> {
        if self.session.has_errors() {
            return Err(Stop::Failed);
        }
        if let Some(progress) = &params.progress {
            progress.stage_completed(self.stage);
            if progress.is_cancelled() {
                debug!(stage = %self.stage, "cancelled");
                return Err(Stop::Cancelled);
            }
        }
        Ok(())
    }

    fn ingest(&mut self, sources: &[Box<dyn DeclarationSource>]) -> Result<(), Stop> {
        for source in sources {
            match source.parse() {
                Ok(unit) => self.session.add_unit(unit),
                Err(IngestError::Recoverable {
                    file,
                    line,
                    col,
                    message,
                }) => {
                    debug!(file = %file, "input skipped after parse failure");
                    self.session.diagnostics.error(
                        &file,
                        Span::new(line, col, 0),
                        CompilationError::ParseFailure { message },
                    );
                }
                Err(fatal) => return Err(Stop::Fatal(fatal)),
            }
        }
        debug!(units = self.session.units.len(), "sources ingested");
        Ok(())
    }

    fn load_libraries(&mut self, params: &CompilerParameters) -> Result<(), Stop> {
        let Some(loader) = self.loader.as_mut() else {
            if !params.class_path.is_empty() {
                warn!(entries = params.class_path.len(), "class path ignored, no library loader configured");
            }
            return Ok(());
        };
        for entry in &params.class_path {
            match loader.load(entry, &mut self.session.types) {
                Ok(count) => debug!(entry = %entry.display(), types = count, "library loaded"),
                Err(error) => Self::library_error(&mut self.session, error)?,
            }
        }
        if let Some(path) = &params.annotated_library_path {
            if let Err(error) = loader.load_annotations(path, &mut self.session.types) {
                Self::library_error(&mut self.session, error)?;
            }
        }
        Ok(())
    }

    fn library_error(session: &mut CompilationSession, error: IngestError) -> Result<(), Stop> {
        match error {
            IngestError::Recoverable {
                file,
                line,
                col,
                message,
            } => {
                session.diagnostics.error(
                    &file,
                    Span::new(line, col, 0),
                    CompilationError::ParseFailure { message },
                );
                Ok(())
            }
            fatal => Err(Stop::Fatal(fatal)),
        }
    }

    fn write_documentation(&mut self, params: &CompilerParameters) {
        let Some(path) = params.documentation() else {
            return;
        };
        match self.documentation.as_mut() {
            Some(sink) => {
                if let Err(error) = sink.write(path, &self.session) {
                    warn!(path = %path.display(), %error, "documentation not written");
                }
            }
            None => warn!(path = %path.display(), "documentation path ignored, no sink configured"),
        }
    }

    fn generate(&mut self) -> Result<(), Stop> {
        let generated = BytecodeGenerationPass::new(&self.session).run().map_err(Stop::Internal)?;
        for ty in &generated {
            let bytes = self.emitter.emit(&self.session.types, ty).map_err(Stop::Internal)?;
            self.binaries.insert(ty.name.clone(), bytes);
        }
        debug!(binaries = self.binaries.len(), "binaries emitted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use kestrel_core::ast::AstBuilder;

    use super::*;
    use crate::progress::{CancellationToken, ProgressTracker};
    use crate::sources::ParsedSource;

    struct CancelAfter(CompilationStage, CancellationToken);

    impl ProgressTracker for CancelAfter {
        fn stage_completed(&self, stage: CompilationStage) {
            if stage == self.0 {
                self.1.cancel();
            }
        }

        fn is_cancelled(&self) -> bool {
            self.1.is_cancelled()
        }
    }

    struct Broken;

    impl DeclarationSource for Broken {
        fn file_name(&self) -> &str {
            "Broken.ks"
        }

        fn parse(&self) -> Result<kestrel_core::ast::CompilationUnit, IngestError> {
            Err(IngestError::Recoverable {
                file: "Broken.ks".to_string(),
                line: 3,
                col: 7,
                message: "expected ';'".to_string(),
            })
        }
    }

    fn sources(b: &AstBuilder) -> Vec<Box<dyn DeclarationSource>> {
        vec![ParsedSource::boxed(b.unit("A.ks", Some("app"), vec![b.class("A")]))]
    }

    #[test]
    fn empty_run_succeeds() {
        let results = Compiler::new().compile(&[], &CompilerParameters::new());
        assert!(results.is_success());
        assert!(results.diagnostics.is_empty());
        assert!(results.binaries.is_empty());
    }

    #[test]
    fn binaries_only_when_requested() {
        let b = AstBuilder::new();
        let mut compiler = Compiler::new();
        let results = compiler.compile(&sources(&b), &CompilerParameters::new());
        assert!(results.is_success());
        assert!(results.binaries.is_empty());

        let results = compiler.compile(&sources(&b), &CompilerParameters::new().generate_binary(true));
        assert!(results.is_success());
        assert!(results.binaries.contains_key("app.A"));
    }

    #[test]
    fn parse_failures_are_reported_then_gate() {
        let b = AstBuilder::new();
        let mut inputs = sources(&b);
        inputs.push(Box::new(Broken));
        let mut compiler = Compiler::new();
        let results = compiler.compile(&inputs, &CompilerParameters::new());
        assert_eq!(results.stage, CompilationStage::Parsing);
        let error = results.errors().next().unwrap();
        assert_eq!((error.file.as_str(), error.line, error.col), ("Broken.ks", 3, 7));
        // The well-formed input was still ingested.
        assert_eq!(compiler.session().units.len(), 1);
    }

    #[test]
    fn cancellation_stops_after_the_polled_stage() {
        let b = AstBuilder::new();
        let tracker = CancelAfter(CompilationStage::MembersDefinition, CancellationToken::new());
        let params = CompilerParameters::new().progress(Arc::new(tracker));
        let results = Compiler::new().compile(&sources(&b), &params);
        assert!(results.cancelled);
        assert_eq!(results.stage, CompilationStage::MembersDefinition);
        assert!(!results.has_errors());
    }

    #[test]
    fn internal_faults_become_id_zero_diagnostics() {
        struct Failing;

        impl BinaryEmitter for Failing {
            fn emit(
                &self,
                _types: &kestrel_types::TypeSystem,
                _generated: &kestrel_compiler::GeneratedType,
            ) -> Result<Vec<u8>, InternalError> {
                Err(InternalError::other("emitter offline"))
            }
        }

        let b = AstBuilder::new();
        let results = Compiler::new()
            .with_emitter(Failing)
            .compile(&sources(&b), &CompilerParameters::new().generate_binary(true));
        assert_eq!(results.stage, CompilationStage::BytecodeGeneration);
        let error = results.errors().next().unwrap();
        assert_eq!(error.id, InternalError::ID);
        assert!(results.binaries.is_empty());
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<std::sync::Mutex<Vec<String>>>);

    impl Recorder {
        fn entries(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    impl LibraryLoader for Recorder {
        fn load(&mut self, entry: &Path, _types: &mut kestrel_types::TypeSystem) -> Result<usize, IngestError> {
            let name = entry.display().to_string();
            self.0.lock().unwrap().push(name.clone());
            if name.ends_with(".bad") {
                return Err(IngestError::Recoverable {
                    file: name,
                    line: 1,
                    col: 1,
                    message: "not a library".to_string(),
                });
            }
            Ok(0)
        }
    }

    impl DocumentationSink for Recorder {
        fn write(&mut self, path: &Path, session: &CompilationSession) -> std::io::Result<()> {
            self.0
                .lock()
                .unwrap()
                .push(format!("{}:{}", path.display(), session.units.len()));
            Ok(())
        }
    }

    #[test]
    fn class_path_entries_reach_the_loader_and_docs_the_sink() {
        let b = AstBuilder::new();
        let loader = Recorder::default();
        let sink = Recorder::default();
        let params = CompilerParameters::new()
            .class_path("lib/core.klib")
            .class_path("lib/extra.klib")
            .documentation_path("out/docs");
        let results = Compiler::new()
            .with_library_loader(loader.clone())
            .with_documentation_sink(sink.clone())
            .compile(&sources(&b), &params);
        assert!(results.is_success());
        assert_eq!(loader.entries(), ["lib/core.klib", "lib/extra.klib"]);
        assert_eq!(sink.entries(), ["out/docs:1"]);
    }

    #[test]
    fn unreadable_libraries_gate_before_type_definition() {
        let b = AstBuilder::new();
        let params = CompilerParameters::new().class_path("lib/broken.bad");
        let results = Compiler::new()
            .with_library_loader(Recorder::default())
            .compile(&sources(&b), &params);
        assert_eq!(results.stage, CompilationStage::Parsing);
        assert_eq!(results.errors().count(), 1);
    }
}
