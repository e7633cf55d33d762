// tests/test_harness.rs
//! Shared helpers for the integration suites.
//!
//! Declaration trees are built with [`AstBuilder`], run through the public
//! [`Compiler`] facade, and inspected through [`TestResult`]. Code generation
//! tests drive the stages directly to reach the generated instructions.

#![allow(dead_code)]

use kestrel::{Compiler, CompilerParameters, CompilerResults, DeclarationSource, ParsedSource};
use kestrel_compiler::{
    AnnotationsPass, BytecodeGenerationPass, CodeValidationPass, CompilationSession, CompilationStage,
    GeneratedMethod, GeneratedType, MembersDefinitionPass, SuperTypesPass, TypesDefinitionPass,
};
use kestrel_core::ast::{AstBuilder, CompilationUnit};
use kestrel_core::{CompilationError, CompilationWarning, Diagnostic};

/// Builds declaration trees and compiles them.
pub struct TestHarness {
    pub b: AstBuilder,
}

impl TestHarness {
    pub fn new() -> Self {
        Self { b: AstBuilder::new() }
    }

    pub fn compile(&self, units: Vec<CompilationUnit>) -> TestResult {
        self.compile_with(units, &CompilerParameters::new())
    }

    pub fn compile_binary(&self, units: Vec<CompilationUnit>) -> TestResult {
        self.compile_with(units, &CompilerParameters::new().generate_binary(true))
    }

    pub fn compile_with(&self, units: Vec<CompilationUnit>, params: &CompilerParameters) -> TestResult {
        let sources: Vec<Box<dyn DeclarationSource>> = units.into_iter().map(ParsedSource::boxed).collect();
        TestResult {
            results: Compiler::new().compile(&sources, params),
        }
    }

    /// Run every stage up to generation without going through the facade.
    pub fn generate(&self, units: Vec<CompilationUnit>) -> Generated {
        let mut session = CompilationSession::new();
        for unit in units {
            session.add_unit(unit);
        }
        TypesDefinitionPass::new(&mut session).run();
        SuperTypesPass::new(&mut session).run();
        MembersDefinitionPass::new(&mut session).run();
        AnnotationsPass::new(&mut session).run();
        CodeValidationPass::new(&mut session).run();
        if session.has_errors() {
            for diagnostic in session.diagnostics.iter() {
                eprintln!("{}", diagnostic);
            }
            panic!("expected valid code, got {} errors", session.diagnostics.error_count());
        }
        let types = BytecodeGenerationPass::new(&session)
            .run()
            .unwrap_or_else(|e| panic!("generation failed: {}", e));
        Generated { session, types }
    }
}

/// Outcome of a facade run.
pub struct TestResult {
    pub results: CompilerResults,
}

impl TestResult {
    pub fn dump(&self) {
        for diagnostic in &self.results.diagnostics {
            eprintln!("{}", diagnostic);
        }
    }

    pub fn assert_success(&self) {
        if !self.results.is_success() {
            self.dump();
            panic!("expected success, stopped at {}", self.results.stage);
        }
    }

    pub fn assert_stopped_at(&self, stage: CompilationStage) {
        if self.results.stage != stage {
            self.dump();
            panic!("expected to stop at {}, got {}", stage, self.results.stage);
        }
    }

    pub fn errors(&self) -> Vec<&Diagnostic> {
        self.results.errors().collect()
    }

    pub fn warnings(&self) -> Vec<&Diagnostic> {
        self.results.warnings().collect()
    }

    /// Number of errors with the id of `error`.
    pub fn error_count(&self, error: &CompilationError) -> usize {
        self.results.errors().filter(|d| d.id == error.id()).count()
    }

    pub fn warning_count(&self, warning: &CompilationWarning) -> usize {
        self.results.warnings().filter(|d| d.id == warning.id()).count()
    }
}

/// Generated code together with the session that produced it.
pub struct Generated {
    pub session: CompilationSession,
    pub types: Vec<GeneratedType>,
}

impl Generated {
    pub fn ty(&self, name: &str) -> &GeneratedType {
        self.types
            .iter()
            .find(|t| t.name == name)
            .unwrap_or_else(|| panic!("no generated type {}", name))
    }

    pub fn method(&self, ty: &str, name: &str) -> &GeneratedMethod {
        self.ty(ty)
            .methods
            .iter()
            .find(|m| m.name == name)
            .unwrap_or_else(|| panic!("no method {}.{}", ty, name))
    }

    /// Instructions of a method as text, e.g. `iload 1`.
    pub fn listing(&self, ty: &str, name: &str) -> Vec<String> {
        let code = self.method(ty, name).code.as_ref().expect("method has a body");
        code.instructions.iter().map(|i| i.to_string()).collect()
    }
}
