//! Compilation stages.
//!
//! Each stage is a pass object created over the session and consumed by
//! `run`. Stages run strictly in order and the driver stops after the first
//! one that records an error:
//!
//! ```text
//! Parsing → TypesDefinition → SuperTypesDefinition → MembersDefinition
//!         → AnnotationsDefinition → CodeValidation → BytecodeGeneration → Success
//! ```

mod annotations;
mod bytecode_generation;
mod code_validation;
mod members_definition;
mod partials;
mod super_types;
mod types_definition;

use std::fmt;

use kestrel_core::ast::{CompilationUnit, TypeDecl, TypeDeclKind};
use kestrel_types::TypeKind;

pub use annotations::AnnotationsPass;
pub use bytecode_generation::{BytecodeGenerationPass, GeneratedMethod, GeneratedType};
pub use code_validation::CodeValidationPass;
pub use members_definition::MembersDefinitionPass;
pub use super_types::SuperTypesPass;
pub use types_definition::TypesDefinitionPass;

/// The stage a compilation reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CompilationStage {
    Parsing,
    TypesDefinition,
    SuperTypesDefinition,
    MembersDefinition,
    AnnotationsDefinition,
    CodeValidation,
    BytecodeGeneration,
    Success,
}

impl CompilationStage {
    pub fn name(self) -> &'static str {
        match self {
            CompilationStage::Parsing => "parsing",
            CompilationStage::TypesDefinition => "types definition",
            CompilationStage::SuperTypesDefinition => "super types definition",
            CompilationStage::MembersDefinition => "members definition",
            CompilationStage::AnnotationsDefinition => "annotations definition",
            CompilationStage::CodeValidation => "code validation",
            CompilationStage::BytecodeGeneration => "bytecode generation",
            CompilationStage::Success => "success",
        }
    }
}

impl fmt::Display for CompilationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Summary returned by every pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassOutput {
    /// Declarations, members or bodies the pass processed.
    pub processed: usize,
}

/// Every type declaration of a unit, outer types before their nested types.
pub(crate) fn type_decls(unit: &CompilationUnit) -> Vec<&TypeDecl> {
    fn collect<'a>(decl: &'a TypeDecl, out: &mut Vec<&'a TypeDecl>) {
        out.push(decl);
        for nested in decl.nested_types() {
            collect(nested, out);
        }
    }
    let mut out = Vec::new();
    for decl in &unit.types {
        collect(decl, &mut out);
    }
    out
}

pub(crate) fn type_kind(kind: TypeDeclKind) -> TypeKind {
    match kind {
        TypeDeclKind::Class => TypeKind::Class,
        TypeDeclKind::Interface => TypeKind::Interface,
        TypeDeclKind::Enum => TypeKind::Enum,
        TypeDeclKind::Delegate => TypeKind::Delegate,
        TypeDeclKind::Annotation => TypeKind::Annotation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_core::ast::AstBuilder;

    #[test]
    fn stages_are_ordered() {
        assert!(CompilationStage::TypesDefinition < CompilationStage::CodeValidation);
        assert!(CompilationStage::BytecodeGeneration < CompilationStage::Success);
        assert_eq!(CompilationStage::MembersDefinition.to_string(), "members definition");
    }

    #[test]
    fn nested_declarations_follow_their_outer_type() {
        let b = AstBuilder::new();
        let mut outer = b.class("Outer");
        outer
            .members
            .push(kestrel_core::ast::MemberDecl::Type(b.class("Inner")));
        let unit = b.unit("A.ks", None, vec![outer, b.class("Other")]);
        let names: Vec<&str> = type_decls(&unit).iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Outer", "Inner", "Other"]);
    }
}
