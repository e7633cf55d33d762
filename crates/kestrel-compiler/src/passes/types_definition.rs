//! TypesDefinition stage - create a type definition per declaration.
//!
//! ## Responsibilities
//!
//! - Define classes, interfaces, enums, delegates and annotation types,
//!   recursing into nested types
//! - Merge partial type parts by qualified name
//! - Apply declared and implied modifiers
//! - Create generic type parameters (their bounds come later)
//!
//! Members and supertypes are not looked at here, so any type may refer to
//! any other regardless of declaration order.

use std::rc::Rc;

use kestrel_core::ast::{CompilationUnit, TypeDecl, TypeDeclKind};
use kestrel_core::{CompilationError, Modifiers};
use kestrel_types::{TypeDefId, TypeParamOwner, TypeSystemError};
use tracing::debug;

use super::partials::PartialTypes;
use super::{PassOutput, type_kind};
use crate::node_tables::Builder;
use crate::session::CompilationSession;

pub struct TypesDefinitionPass<'s> {
    session: &'s mut CompilationSession,
    partials: PartialTypes,
    defined: usize,
}

impl<'s> TypesDefinitionPass<'s> {
    pub fn new(session: &'s mut CompilationSession) -> Self {
        Self {
            session,
            partials: PartialTypes::default(),
            defined: 0,
        }
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run(mut self) -> PassOutput {
        for unit in self.session.units() {
            for decl in &unit.types {
                self.define(&unit, decl, None);
            }
        }
        debug!(types = self.defined, "types defined");
        PassOutput {
            processed: self.defined,
        }
    }

    fn define(&mut self, unit: &Rc<CompilationUnit>, decl: &TypeDecl, enclosing: Option<TypeDefId>) {
        let ts = &mut self.session.types;
        let package = unit.package.clone().unwrap_or_default();
        let full_name = match enclosing {
            Some(outer) => format!("{}.{}", ts.def(outer).full_name, decl.name),
            None if package.is_empty() => decl.name.clone(),
            None => format!("{}.{}", package, decl.name),
        };

        if decl.modifiers.contains(Modifiers::ABSTRACT | Modifiers::FINAL) {
            self.session.diagnostics.error(
                &unit.file,
                decl.span,
                CompilationError::IllegalModifiers {
                    name: full_name.clone(),
                    first: "abstract",
                    second: "final",
                },
            );
        }

        // A further part of a partial type.
        if decl.modifiers.contains(Modifiers::PARTIAL) {
            if let Some(existing) = ts.find_type(&full_name).filter(|&d| self.partials.is_partial(d)) {
                if let Err(error) = self.partials.merge(existing, decl.kind, &full_name) {
                    self.session.diagnostics.error(&unit.file, decl.span, error);
                    return;
                }
                let merged = ts.def(existing).modifiers | implied_modifiers(decl, enclosing.is_some());
                ts.def_mut(existing).modifiers = merged;
                self.session.tables.set_builder(decl.id, Builder::Type(existing));
                for nested in decl.nested_types() {
                    self.define(unit, nested, Some(existing));
                }
                return;
            }
        }

        let modifiers = implied_modifiers(decl, enclosing.is_some());
        let def = match ts.define_type(&decl.name, &package, type_kind(decl.kind), modifiers, enclosing) {
            Ok(def) => def,
            Err(TypeSystemError::DuplicateType { name }) => {
                self.session
                    .diagnostics
                    .error(&unit.file, decl.span, CompilationError::DuplicateType { name });
                return;
            }
        };
        self.defined += 1;
        if decl.modifiers.contains(Modifiers::PARTIAL) {
            self.partials.register(def, decl.kind);
        }
        self.session.tables.set_builder(decl.id, Builder::Type(def));

        for (index, param) in decl.type_params.iter().enumerate() {
            let ts = &mut self.session.types;
            let ty = ts.new_type_param(&param.name, TypeParamOwner::Type(def), index as u32);
            ts.def_mut(def).type_params.push(ty);
        }

        for nested in decl.nested_types() {
            self.define(unit, nested, Some(def));
        }
    }
}

/// Declared modifiers plus those the declaration kind implies.
fn implied_modifiers(decl: &TypeDecl, nested: bool) -> Modifiers {
    let mut modifiers = decl.modifiers;
    match decl.kind {
        TypeDeclKind::Interface | TypeDeclKind::Annotation => {
            modifiers |= Modifiers::ABSTRACT;
            if nested {
                modifiers |= Modifiers::STATIC;
            }
        }
        TypeDeclKind::Enum => {
            modifiers |= Modifiers::FINAL;
            if nested {
                modifiers |= Modifiers::STATIC;
            }
        }
        TypeDeclKind::Delegate => modifiers |= Modifiers::FINAL,
        TypeDeclKind::Class => {}
    }
    modifiers
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_core::ast::{AstBuilder, MemberDecl};
    use kestrel_types::TypeKind;

    fn run(units: Vec<CompilationUnit>) -> CompilationSession {
        let mut session = CompilationSession::new();
        for unit in units {
            session.add_unit(unit);
        }
        TypesDefinitionPass::new(&mut session).run();
        session
    }

    #[test]
    fn defines_nested_types_with_qualified_names() {
        let b = AstBuilder::new();
        let mut outer = b.class("Outer");
        outer.members.push(MemberDecl::Type(b.enum_type("Color", &["RED"])));
        let session = run(vec![b.unit("Outer.ks", Some("app"), vec![outer])]);
        let color = session.types.find_type("app.Outer.Color").unwrap();
        assert_eq!(session.types.def(color).kind, TypeKind::Enum);
        assert!(session.types.def(color).modifiers.is_static());
    }

    #[test]
    fn duplicate_type_is_an_error() {
        let b = AstBuilder::new();
        let session = run(vec![
            b.unit("A.ks", Some("app"), vec![b.class("A")]),
            b.unit("B.ks", Some("app"), vec![b.class("A")]),
        ]);
        assert_eq!(session.diagnostics.error_count(), 1);
        assert_eq!(session.diagnostics.errors().next().unwrap().id, 2);
    }

    #[test]
    fn partial_parts_merge_into_one_definition() {
        let b = AstBuilder::new();
        let mut first = b.class("Shape");
        first.modifiers |= Modifiers::PARTIAL;
        let mut second = b.class("Shape");
        second.modifiers |= Modifiers::PARTIAL | Modifiers::ABSTRACT;
        let (first_id, second_id) = (first.id, second.id);
        let session = run(vec![b.unit("S.ks", Some("geo"), vec![first, second])]);
        assert!(!session.has_errors());
        let def = session.tables.type_builder(first_id).unwrap();
        assert_eq!(session.tables.type_builder(second_id), Some(def));
        assert!(session.types.def(def).modifiers.is_abstract());
    }

    #[test]
    fn partial_parts_must_share_a_kind() {
        let b = AstBuilder::new();
        let mut first = b.class("Shape");
        first.modifiers |= Modifiers::PARTIAL;
        let mut second = b.interface("Shape");
        second.modifiers |= Modifiers::PARTIAL;
        let session = run(vec![b.unit("S.ks", Some("geo"), vec![first, second])]);
        assert_eq!(session.diagnostics.errors().next().unwrap().id, 11);
    }

    #[test]
    fn abstract_final_is_rejected() {
        let b = AstBuilder::new();
        let mut class = b.class("Broken");
        class.modifiers |= Modifiers::ABSTRACT | Modifiers::FINAL;
        let session = run(vec![b.unit("B.ks", None, vec![class])]);
        assert_eq!(session.diagnostics.errors().next().unwrap().id, 10);
    }

    #[test]
    fn type_parameters_are_created() {
        let b = AstBuilder::new();
        let mut class = b.class("Box");
        class.type_params.push(b.type_param("T", None));
        let session = run(vec![b.unit("Box.ks", Some("app"), vec![class])]);
        let def = session.types.find_type("app.Box").unwrap();
        assert_eq!(session.types.def(def).type_params.len(), 1);
    }
}
