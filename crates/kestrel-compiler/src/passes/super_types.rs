//! SuperTypesDefinition stage - resolve base types and interfaces.
//!
//! ## Rules
//!
//! - a class has at most one base class, listed before any interface
//! - interfaces, enums, delegates and annotation types only list interfaces
//! - a final type cannot be derived from
//! - a type may not derive from a type less accessible than itself
//! - inheritance must be acyclic
//!
//! Types without an explicit base get the platform default: `Object` for
//! classes, `Enum` for enums, `Delegate` for delegates. Annotation types
//! implement the `Annotation` interface.
//!
//! Generic parameter bounds are resolved here too, since bounds may name any
//! type and are needed before members are defined.

use kestrel_core::CompilationError;
use kestrel_core::ast::{TypeDecl, TypeDeclKind};
use kestrel_types::{TypeDefId, TypeId};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::FxHashMap;
use tracing::debug;

use super::{PassOutput, type_decls};
use crate::session::CompilationSession;
use crate::type_resolver::TypeResolver;

pub struct SuperTypesPass<'s> {
    session: &'s mut CompilationSession,
    /// Source types in definition order, for cycle detection.
    resolved: Vec<(TypeDefId, String, kestrel_core::Span)>,
}

impl<'s> SuperTypesPass<'s> {
    pub fn new(session: &'s mut CompilationSession) -> Self {
        Self {
            session,
            resolved: Vec::new(),
        }
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run(mut self) -> PassOutput {
        let units = self.session.units();
        for unit in &units {
            for decl in type_decls(unit) {
                let Some(def) = self.session.tables.type_builder(decl.id) else {
                    continue;
                };
                self.resolve_bases(unit, decl, def);
            }
        }
        for unit in &units {
            for decl in type_decls(unit) {
                if let Some(def) = self.session.tables.type_builder(decl.id) {
                    self.resolve_bounds(unit, decl, def);
                }
            }
        }
        self.detect_cycles();
        debug!(types = self.resolved.len(), "super types resolved");
        PassOutput {
            processed: self.resolved.len(),
        }
    }

    // ==========================================================================
    // Bases
    // ==========================================================================

    fn resolve_bases(&mut self, unit: &kestrel_core::ast::CompilationUnit, decl: &TypeDecl, def: TypeDefId) {
        let file = unit.file.as_str();
        let mut base: Option<TypeId> = self.session.types.def(def).base;
        let mut interfaces: Vec<TypeId> = self.session.types.def(def).interfaces.clone();
        let mut seen_interface = false;

        for base_ref in &decl.bases {
            let resolved = TypeResolver::new(&self.session.types, unit, def).resolve(base_ref);
            let ty = match resolved {
                Ok(ty) => ty,
                Err(error) => {
                    self.session.diagnostics.error(file, base_ref.span, error);
                    continue;
                }
            };
            let ts = &self.session.types;
            let name = ts.def(def).full_name.clone();
            let Some(base_def) = ts.def_of(ty) else {
                self.session.diagnostics.error(
                    file,
                    base_ref.span,
                    CompilationError::NotAnInterface { name: ts.display(ty) },
                );
                continue;
            };
            let base_entry = ts.def(base_def);

            if base_entry.is_interface() {
                seen_interface = true;
                if !interfaces.contains(&ty) {
                    interfaces.push(ty);
                }
            } else if decl.kind != TypeDeclKind::Class {
                self.session.diagnostics.error(
                    file,
                    base_ref.span,
                    CompilationError::NotAnInterface {
                        name: base_entry.full_name.clone(),
                    },
                );
                continue;
            } else if seen_interface {
                self.session.diagnostics.error(
                    file,
                    base_ref.span,
                    CompilationError::BaseClassNotFirst {
                        base: base_entry.full_name.clone(),
                    },
                );
                continue;
            } else if base.is_some_and(|existing| existing != ty) {
                self.session
                    .diagnostics
                    .error(file, base_ref.span, CompilationError::MultipleBaseClasses { name });
                continue;
            } else if base_entry.modifiers.is_final() {
                self.session.diagnostics.error(
                    file,
                    base_ref.span,
                    CompilationError::FinalBaseType {
                        name,
                        base: base_entry.full_name.clone(),
                    },
                );
                continue;
            } else {
                base = Some(ty);
            }

            if ts.effective_visibility(def) > ts.effective_visibility(base_def) {
                self.session.diagnostics.error(
                    file,
                    base_ref.span,
                    CompilationError::InconsistentAccessibility {
                        name: ts.def(def).full_name.clone(),
                        base: ts.def(base_def).full_name.clone(),
                    },
                );
            }
        }

        let ts = &self.session.types;
        let platform = ts.platform();
        match decl.kind {
            TypeDeclKind::Class => {
                base.get_or_insert_with(|| ts.object_type());
            }
            TypeDeclKind::Enum => base = Some(ts.raw_type(platform.enum_base)),
            TypeDeclKind::Delegate => base = Some(ts.raw_type(platform.delegate)),
            TypeDeclKind::Annotation => {
                let annotation = ts.raw_type(platform.annotation);
                if !interfaces.contains(&annotation) {
                    interfaces.push(annotation);
                }
            }
            TypeDeclKind::Interface => {}
        }

        let entry = self.session.types.def_mut(def);
        entry.base = base;
        entry.interfaces = interfaces;
        if !self.resolved.iter().any(|(d, _, _)| *d == def) {
            self.resolved.push((def, file.to_string(), decl.span));
        }
    }

    fn resolve_bounds(&mut self, unit: &kestrel_core::ast::CompilationUnit, decl: &TypeDecl, def: TypeDefId) {
        for (index, param) in decl.type_params.iter().enumerate() {
            let Some(bound) = &param.bound else {
                continue;
            };
            let Some(&ty) = self.session.types.def(def).type_params.get(index) else {
                continue;
            };
            match TypeResolver::new(&self.session.types, unit, def).resolve(bound) {
                Ok(resolved) => self.session.types.set_type_param_bounds(ty, vec![resolved]),
                Err(error) => self.session.diagnostics.error(&unit.file, bound.span, error),
            }
        }
    }

    // ==========================================================================
    // Cycles
    // ==========================================================================

    fn detect_cycles(&mut self) {
        let ts = &self.session.types;
        let mut graph: DiGraph<TypeDefId, ()> = DiGraph::new();
        let mut nodes: FxHashMap<TypeDefId, NodeIndex> = FxHashMap::default();
        for (def, _, _) in &self.resolved {
            nodes.insert(*def, graph.add_node(*def));
        }
        for (def, _, _) in &self.resolved {
            let entry = ts.def(*def);
            for sup in entry.base.iter().chain(&entry.interfaces) {
                if let Some(target) = ts.def_of(*sup).and_then(|d| nodes.get(&d)) {
                    graph.add_edge(nodes[def], *target, ());
                }
            }
        }

        let mut cyclic = Vec::new();
        for component in tarjan_scc(&graph) {
            let self_loop = component.len() == 1 && graph.contains_edge(component[0], component[0]);
            if component.len() > 1 || self_loop {
                cyclic.extend(component.iter().map(|&n| graph[n]));
            }
        }

        for def in cyclic {
            if let Some((_, file, span)) = self.resolved.iter().find(|(d, _, _)| *d == def) {
                let name = self.session.types.def(def).full_name.clone();
                self.session
                    .diagnostics
                    .error(file, *span, CompilationError::CyclicInheritance { name });
            }
            // Leave an acyclic hierarchy behind for any later walk.
            let object = self.session.types.object_type();
            let entry = self.session.types.def_mut(def);
            entry.base = Some(object);
            entry.interfaces.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::TypesDefinitionPass;
    use kestrel_core::Modifiers;
    use kestrel_core::ast::{AstBuilder, CompilationUnit};

    fn run(units: Vec<CompilationUnit>) -> CompilationSession {
        let mut session = CompilationSession::new();
        for unit in units {
            session.add_unit(unit);
        }
        TypesDefinitionPass::new(&mut session).run();
        SuperTypesPass::new(&mut session).run();
        session
    }

    fn first_error(session: &CompilationSession) -> u32 {
        session.diagnostics.errors().next().map_or(0, |d| d.id)
    }

    #[test]
    fn defaults_follow_declaration_kind() {
        let b = AstBuilder::new();
        let session = run(vec![b.unit(
            "A.ks",
            Some("app"),
            vec![
                b.class("C"),
                b.enum_type("E", &["X"]),
                b.annotation_type("Marker"),
            ],
        )]);
        let ts = &session.types;
        let c = ts.find_type("app.C").unwrap();
        let e = ts.find_type("app.E").unwrap();
        let marker = ts.find_type("app.Marker").unwrap();
        assert_eq!(ts.def(c).base, Some(ts.object_type()));
        assert_eq!(ts.def(e).base, Some(ts.raw_type(ts.platform().enum_base)));
        assert_eq!(
            ts.def(marker).interfaces,
            vec![ts.raw_type(ts.platform().annotation)]
        );
    }

    #[test]
    fn base_class_must_come_first() {
        let b = AstBuilder::new();
        let mut derived = b.class("D");
        derived.bases = vec![b.named("I"), b.named("B")];
        let session = run(vec![b.unit(
            "A.ks",
            Some("app"),
            vec![b.interface("I"), b.class("B"), derived],
        )]);
        assert_eq!(first_error(&session), 6);
    }

    #[test]
    fn interfaces_cannot_extend_classes() {
        let b = AstBuilder::new();
        let mut iface = b.interface("I");
        iface.bases = vec![b.named("B")];
        let session = run(vec![b.unit("A.ks", Some("app"), vec![b.class("B"), iface])]);
        assert_eq!(first_error(&session), 4);
    }

    #[test]
    fn final_base_is_rejected() {
        let b = AstBuilder::new();
        let mut derived = b.class("D");
        derived.bases = vec![b.named("String")];
        let session = run(vec![b.unit("A.ks", Some("app"), vec![derived])]);
        assert_eq!(first_error(&session), 7);
    }

    #[test]
    fn public_type_cannot_derive_from_package_type() {
        let b = AstBuilder::new();
        let mut hidden = b.class("Hidden");
        hidden.modifiers = Modifiers::empty();
        let mut derived = b.class("Visible");
        derived.bases = vec![b.named("Hidden")];
        let session = run(vec![b.unit("A.ks", Some("app"), vec![hidden, derived])]);
        assert_eq!(first_error(&session), 8);
    }

    #[test]
    fn cycles_are_reported_for_each_member() {
        let b = AstBuilder::new();
        let mut a = b.class("A");
        a.bases = vec![b.named("B")];
        let mut bb = b.class("B");
        bb.bases = vec![b.named("A")];
        let session = run(vec![b.unit("A.ks", Some("app"), vec![a, bb])]);
        let cyclic: Vec<u32> = session.diagnostics.errors().map(|d| d.id).collect();
        assert_eq!(cyclic, vec![9, 9]);
    }

    #[test]
    fn bounds_are_resolved() {
        let b = AstBuilder::new();
        let mut class = b.class("Box");
        class.type_params.push(b.type_param("T", Some(b.named("String"))));
        let session = run(vec![b.unit("Box.ks", Some("app"), vec![class])]);
        let ts = &session.types;
        let def = ts.find_type("app.Box").unwrap();
        let t = ts.def(def).type_params[0];
        assert_eq!(ts.type_param_bounds(t), &[ts.string_type()]);
    }
}
