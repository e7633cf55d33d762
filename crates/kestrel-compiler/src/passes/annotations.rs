//! AnnotationsDefinition stage - annotation element types, defaults and usages.
//!
//! Elements of an annotation type are its methods. An element's type must be
//! a primitive, `String`, an enum, an annotation type, or a one-dimensional
//! array of one of these. Every annotation usage on a type, field, method,
//! accessor, constructor, parameter or enum constant is resolved, its
//! arguments are folded to constants and the result is recorded on the
//! definition it decorates.

use kestrel_core::ast::{AnnotationUse, CompilationUnit, Expr, ExprKind, MemberDecl, ParamDecl, TypeDecl, TypeDeclKind};
use kestrel_core::{CompilationError, Modifiers, Span};
use kestrel_types::{AnnotationInstance, ConstantValue, FieldId, MethodId, TypeDefId, TypeId, TypeKind};
use tracing::debug;

use super::{PassOutput, type_decls};
use crate::constant_eval::{DeclarationConstants, convert_constant, dotted_name};
use crate::node_tables::Builder;
use crate::session::CompilationSession;
use crate::type_resolver::TypeResolver;

/// What an annotation usage decorates.
#[derive(Debug, Clone, Copy)]
enum Target {
    Type(TypeDefId),
    Field(FieldId),
    Method(MethodId),
    /// Checked but not recorded.
    Parameter,
}

pub struct AnnotationsPass<'s> {
    session: &'s mut CompilationSession,
    applied: usize,
}

impl<'s> AnnotationsPass<'s> {
    pub fn new(session: &'s mut CompilationSession) -> Self {
        Self { session, applied: 0 }
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run(mut self) -> PassOutput {
        let units = self.session.units();
        // Element defaults first, so usages anywhere may rely on them.
        for unit in &units {
            for decl in type_decls(unit) {
                if decl.kind != TypeDeclKind::Annotation {
                    continue;
                }
                if let Some(def) = self.session.tables.type_builder(decl.id) {
                    self.define_elements(unit, decl, def);
                }
            }
        }
        for unit in &units {
            for decl in type_decls(unit) {
                if let Some(def) = self.session.tables.type_builder(decl.id) {
                    self.apply_declaration(unit, decl, def);
                }
            }
        }
        debug!(annotations = self.applied, "annotations applied");
        PassOutput {
            processed: self.applied,
        }
    }

    // ==========================================================================
    // Elements
    // ==========================================================================

    fn define_elements(&mut self, unit: &CompilationUnit, decl: &TypeDecl, def: TypeDefId) {
        for member in &decl.members {
            let MemberDecl::Method(element) = member else {
                continue;
            };
            let Some(method) = self.session.tables.method_builder(element.id) else {
                continue;
            };
            let ty = self.session.types.method(method).return_type;
            if !self.is_element_type(ty) {
                let ty = self.session.types.display(ty);
                self.session.diagnostics.error(
                    &unit.file,
                    element.return_type.span,
                    CompilationError::InvalidAnnotationElementType {
                        element: element.name.clone(),
                        ty,
                    },
                );
                continue;
            }
            if let Some(default) = &element.default_value {
                let value = self.value(unit, def, default, ty, &element.name);
                self.session.types.method_mut(method).default_value = value;
            }
        }
    }

    fn is_element_type(&self, ty: TypeId) -> bool {
        let ts = &self.session.types;
        let scalar = |ty: TypeId| {
            (ty.is_primitive() && !ty.is_void())
                || ts.is_string(ty)
                || ts
                    .def_of(ty)
                    .is_some_and(|d| matches!(ts.def(d).kind, TypeKind::Enum | TypeKind::Annotation))
        };
        match ts.element_type(ty) {
            Some(element) => scalar(element),
            None => scalar(ty),
        }
    }

    // ==========================================================================
    // Usages
    // ==========================================================================

    fn apply_declaration(&mut self, unit: &CompilationUnit, decl: &TypeDecl, def: TypeDefId) {
        self.apply(unit, def, &decl.annotations, Target::Type(def));

        for member in &decl.members {
            match member {
                MemberDecl::Field(field) => {
                    if let Some(id) = self.session.tables.field_builder(field.id) {
                        self.apply(unit, def, &field.annotations, Target::Field(id));
                    }
                }
                MemberDecl::Method(method) => {
                    if let Some(id) = self.session.tables.method_builder(method.id) {
                        self.apply(unit, def, &method.annotations, Target::Method(id));
                    }
                    self.apply_params(unit, def, &method.params);
                }
                MemberDecl::Property(property) => {
                    if let Some(Builder::Property { getter, setter }) = self.session.tables.builder(property.id) {
                        for accessor in getter.into_iter().chain(setter) {
                            self.apply(unit, def, &property.annotations, Target::Method(accessor));
                        }
                    }
                }
                MemberDecl::Indexer(indexer) => {
                    if let Some(Builder::Indexer { getter, setter }) = self.session.tables.builder(indexer.id) {
                        for accessor in getter.into_iter().chain(setter) {
                            self.apply(unit, def, &indexer.annotations, Target::Method(accessor));
                        }
                    }
                    self.apply_params(unit, def, &indexer.params);
                }
                MemberDecl::Constructor(ctor) => {
                    if let Some(id) = self.session.tables.method_builder(ctor.id) {
                        self.apply(unit, def, &ctor.annotations, Target::Method(id));
                    }
                    self.apply_params(unit, def, &ctor.params);
                }
                MemberDecl::Type(_) => {}
            }
        }

        for constant in &decl.enum_constants {
            if let Some(id) = self.session.tables.field_builder(constant.id) {
                self.apply(unit, def, &constant.annotations, Target::Field(id));
            }
        }
        if let Some(signature) = &decl.delegate {
            self.apply_params(unit, def, &signature.params);
        }
    }

    fn apply_params(&mut self, unit: &CompilationUnit, scope: TypeDefId, params: &[ParamDecl]) {
        for param in params {
            self.apply(unit, scope, &param.annotations, Target::Parameter);
        }
    }

    fn apply(&mut self, unit: &CompilationUnit, scope: TypeDefId, uses: &[AnnotationUse], target: Target) {
        for annotation in uses {
            let Some(instance) = self.instantiate(unit, scope, annotation) else {
                continue;
            };
            self.applied += 1;
            let deprecated = instance.ty == self.session.types.platform().deprecated;
            let ts = &mut self.session.types;
            match target {
                Target::Type(def) => ts.def_mut(def).annotations.push(instance),
                Target::Field(field) => {
                    let entry = ts.field_mut(field);
                    entry.deprecated |= deprecated;
                    entry.annotations.push(instance);
                }
                Target::Method(method) => {
                    let entry = ts.method_mut(method);
                    entry.deprecated |= deprecated;
                    entry.annotations.push(instance);
                }
                Target::Parameter => {}
            }
        }
    }

    /// Resolve one usage and bind every element of its annotation type.
    fn instantiate(
        &mut self,
        unit: &CompilationUnit,
        scope: TypeDefId,
        annotation: &AnnotationUse,
    ) -> Option<AnnotationInstance> {
        let file = unit.file.as_str();
        let resolved = TypeResolver::new(&self.session.types, unit, scope).resolve(&annotation.ty);
        let ty = match resolved {
            Ok(ty) => ty,
            Err(error) => {
                self.session.diagnostics.error(file, annotation.ty.span, error);
                return None;
            }
        };
        let ts = &self.session.types;
        let Some(def) = ts.def_of(ty).filter(|&d| ts.def(d).kind == TypeKind::Annotation) else {
            let name = ts.display(ty);
            self.session
                .diagnostics
                .error(file, annotation.span, CompilationError::NotAnAnnotationType { name });
            return None;
        };
        let annotation_name = ts.def(def).full_name.clone();
        let elements: Vec<(String, TypeId, Option<ConstantValue>)> = ts
            .def(def)
            .methods
            .iter()
            .map(|&m| ts.method(m))
            .filter(|m| m.is_plain() && !m.is_static())
            .map(|m| (m.name.clone(), m.return_type, m.default_value.clone()))
            .collect();

        let shorthand = annotation.args.len() == 1 && annotation.args[0].name.is_none();
        let mut given: Vec<(String, ConstantValue)> = Vec::new();
        let mut valid = true;
        for arg in &annotation.args {
            let name = match &arg.name {
                Some(name) => name.clone(),
                None if shorthand => "value".to_string(),
                None => {
                    self.unknown_element(file, arg.span, &annotation_name, "value");
                    valid = false;
                    continue;
                }
            };
            let Some((_, element_type, _)) = elements.iter().find(|(n, _, _)| *n == name) else {
                self.unknown_element(file, arg.span, &annotation_name, &name);
                valid = false;
                continue;
            };
            match self.value(unit, scope, &arg.value, *element_type, &name) {
                Some(value) => given.push((name, value)),
                None => valid = false,
            }
        }

        let mut values = Vec::with_capacity(elements.len());
        for (name, _, default) in elements {
            let value = match given.iter().position(|(n, _)| *n == name) {
                Some(index) => Some(given.swap_remove(index).1),
                None => default,
            };
            match value {
                Some(value) => values.push((name, value)),
                None => {
                    self.session.diagnostics.error(
                        file,
                        annotation.span,
                        CompilationError::MissingAnnotationElement {
                            annotation: annotation_name.clone(),
                            element: name,
                        },
                    );
                    valid = false;
                }
            }
        }
        valid.then_some(AnnotationInstance { ty: def, values })
    }

    fn unknown_element(&mut self, file: &str, span: Span, annotation: &str, element: &str) {
        self.session.diagnostics.error(
            file,
            span,
            CompilationError::UnknownAnnotationElement {
                annotation: annotation.to_string(),
                element: element.to_string(),
            },
        );
    }

    // ==========================================================================
    // Values
    // ==========================================================================

    /// Fold `expr` to a constant of element type `ty`, reporting why it cannot be.
    fn value(
        &mut self,
        unit: &CompilationUnit,
        scope: TypeDefId,
        expr: &Expr,
        ty: TypeId,
        element: &str,
    ) -> Option<ConstantValue> {
        let ts = &self.session.types;
        if let Some(item_type) = ts.element_type(ty) {
            return match &expr.kind {
                ExprKind::ArrayInit(items) => {
                    let mut values = Vec::with_capacity(items.len());
                    for item in items {
                        values.push(self.value(unit, scope, item, item_type, element)?);
                    }
                    Some(ConstantValue::Array(values))
                }
                _ => self
                    .value(unit, scope, expr, item_type, element)
                    .map(|v| ConstantValue::Array(vec![v])),
            };
        }

        let kind = ts.def_of(ty).map(|d| ts.def(d).kind);
        match kind {
            Some(TypeKind::Annotation) => {
                let ExprKind::Annotation(nested) = &expr.kind else {
                    return self.non_constant(unit, expr.span, element);
                };
                let instance = self.instantiate(unit, scope, nested)?;
                if Some(instance.ty) != self.session.types.def_of(ty) {
                    let found = self.session.types.raw_type(instance.ty);
                    return self.mismatch(unit, expr.span, found, ty);
                }
                Some(ConstantValue::Annotation(instance))
            }
            Some(TypeKind::Enum) => {
                let Some(def) = ts.def_of(ty) else {
                    return self.non_constant(unit, expr.span, element);
                };
                match self.enum_constant(unit, scope, expr, def) {
                    Some(name) => Some(ConstantValue::Enum { ty: def, name }),
                    None => self.non_constant(unit, expr.span, element),
                }
            }
            _ => {
                let Some((value, source)) = DeclarationConstants::new(ts, unit, scope).evaluate(expr) else {
                    return self.non_constant(unit, expr.span, element);
                };
                match convert_constant(ts, &value, source, ty) {
                    Ok(value) => Some(value),
                    Err(error) => {
                        self.session.diagnostics.error(&unit.file, expr.span, error);
                        None
                    }
                }
            }
        }
    }

    /// Name of the enum constant `expr` refers to: `RED` or `Color.RED`.
    fn enum_constant(&self, unit: &CompilationUnit, scope: TypeDefId, expr: &Expr, def: TypeDefId) -> Option<String> {
        let ts = &self.session.types;
        let name = match &expr.kind {
            ExprKind::Ident { name, .. } => name,
            ExprKind::Member { object, name, .. } => {
                let qualifier = dotted_name(object)?;
                let owner = TypeResolver::new(ts, unit, scope).resolve_name(&qualifier)?;
                if owner != def {
                    return None;
                }
                name
            }
            _ => return None,
        };
        ts.def(def)
            .fields
            .iter()
            .map(|&f| ts.field(f))
            .find(|f| f.name == *name && f.modifiers.contains(Modifiers::ENUM))
            .map(|f| f.name.clone())
    }

    fn non_constant(&mut self, unit: &CompilationUnit, span: Span, element: &str) -> Option<ConstantValue> {
        self.session.diagnostics.error(
            &unit.file,
            span,
            CompilationError::NonConstantAnnotationValue {
                element: element.to_string(),
            },
        );
        None
    }

    fn mismatch(&mut self, unit: &CompilationUnit, span: Span, from: TypeId, to: TypeId) -> Option<ConstantValue> {
        let from = self.session.types.display(from);
        let to = self.session.types.display(to);
        self.session
            .diagnostics
            .error(&unit.file, span, CompilationError::TypeMismatch { from, to });
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::{MembersDefinitionPass, SuperTypesPass, TypesDefinitionPass};
    use kestrel_core::ast::{AstBuilder, CompilationUnit as Unit, TypeRef};

    fn run(units: Vec<Unit>) -> CompilationSession {
        let mut session = CompilationSession::new();
        for unit in units {
            session.add_unit(unit);
        }
        TypesDefinitionPass::new(&mut session).run();
        SuperTypesPass::new(&mut session).run();
        MembersDefinitionPass::new(&mut session).run();
        AnnotationsPass::new(&mut session).run();
        session
    }

    fn element(b: &AstBuilder, name: &str, ty: TypeRef, default: Option<Expr>) -> MemberDecl {
        let mut method = b.method(name, ty, vec![], None);
        method.default_value = default;
        MemberDecl::Method(method)
    }

    fn first_error(session: &CompilationSession) -> Option<u32> {
        session.diagnostics.errors().next().map(|d| d.id)
    }

    #[test]
    fn shorthand_binds_value_and_defaults_fill_the_rest() {
        let b = AstBuilder::new();
        let mut info = b.annotation_type("Info");
        info.members.push(element(&b, "value", b.named("String"), None));
        info.members.push(element(&b, "level", b.int_type(), Some(b.int(3))));
        let mut class = b.class("A");
        class
            .annotations
            .push(b.annotation(b.named("Info"), vec![b.annotation_arg(None, b.string("hello"))]));

        let session = run(vec![b.unit("A.ks", Some("app"), vec![info, class])]);
        assert!(!session.has_errors());
        let ts = &session.types;
        let def = ts.find_type("app.A").unwrap();
        let instance = &ts.def(def).annotations[0];
        assert_eq!(
            instance.values,
            vec![
                ("value".to_string(), ConstantValue::String("hello".to_string())),
                ("level".to_string(), ConstantValue::Int(3)),
            ]
        );
    }

    #[test]
    fn element_types_are_restricted() {
        let b = AstBuilder::new();
        let mut info = b.annotation_type("Info");
        info.members.push(element(&b, "target", b.named("Object"), None));
        let session = run(vec![b.unit("A.ks", None, vec![info])]);
        assert_eq!(first_error(&session), Some(18));
    }

    #[test]
    fn usages_must_name_annotation_types() {
        let b = AstBuilder::new();
        let mut class = b.class("A");
        class.annotations.push(b.annotation(b.named("String"), vec![]));
        let session = run(vec![b.unit("A.ks", None, vec![class])]);
        assert_eq!(first_error(&session), Some(14));
    }

    #[test]
    fn unknown_and_missing_elements_are_reported() {
        let b = AstBuilder::new();
        let mut info = b.annotation_type("Info");
        info.members.push(element(&b, "level", b.int_type(), None));
        let mut class = b.class("A");
        class.annotations.push(b.annotation(
            b.named("Info"),
            vec![b.annotation_arg(Some("colour"), b.int(1))],
        ));
        let session = run(vec![b.unit("A.ks", None, vec![info, class])]);
        let errors: Vec<u32> = session.diagnostics.errors().map(|d| d.id).collect();
        assert_eq!(errors, vec![15, 16]);
    }

    #[test]
    fn values_must_be_constant_and_in_range() {
        let b = AstBuilder::new();
        let mut info = b.annotation_type("Info");
        info.members.push(element(&b, "small", b.prim(kestrel_core::PrimitiveKind::Byte), None));
        let mut first = b.class("A");
        first.annotations.push(b.annotation(
            b.named("Info"),
            vec![b.annotation_arg(Some("small"), b.int(300))],
        ));
        let mut second = b.class("B");
        second.annotations.push(b.annotation(
            b.named("Info"),
            vec![b.annotation_arg(Some("small"), b.call(b.ident("f"), vec![]))],
        ));
        let session = run(vec![b.unit("A.ks", None, vec![info, first, second])]);
        let errors: Vec<u32> = session.diagnostics.errors().map(|d| d.id).collect();
        assert_eq!(errors, vec![19, 17]);
    }

    #[test]
    fn enum_values_and_arrays() {
        let b = AstBuilder::new();
        let color = b.enum_type("Color", &["RED", "GREEN"]);
        let mut info = b.annotation_type("Info");
        info.members.push(element(&b, "colors", b.array_of(b.named("Color")), None));
        let mut class = b.class("A");
        class.annotations.push(b.annotation(
            b.named("Info"),
            vec![b.annotation_arg(
                None,
                b.array_init(vec![b.ident("RED"), b.member(b.ident("Color"), "GREEN")]),
            )],
        ));
        let session = run(vec![b.unit("A.ks", Some("app"), vec![color, info, class])]);
        assert!(!session.has_errors(), "{:?}", session.diagnostics.errors().collect::<Vec<_>>());
        let ts = &session.types;
        let color = ts.find_type("app.Color").unwrap();
        let class = ts.find_type("app.A").unwrap();
        let ConstantValue::Array(items) = &ts.def(class).annotations[0].values[0].1 else {
            panic!("expected an array value");
        };
        assert_eq!(
            items,
            &vec![
                ConstantValue::Enum {
                    ty: color,
                    name: "RED".to_string()
                },
                ConstantValue::Enum {
                    ty: color,
                    name: "GREEN".to_string()
                },
            ]
        );
    }

    #[test]
    fn deprecated_marks_members() {
        let b = AstBuilder::new();
        let mut class = b.class("A");
        let mut method = b.method("old", b.void_type(), vec![], Some(b.block(vec![])));
        method.annotations.push(b.annotation(b.named("Deprecated"), vec![]));
        let method_id = method.id;
        class.members.push(MemberDecl::Method(method));
        let session = run(vec![b.unit("A.ks", None, vec![class])]);
        assert!(!session.has_errors());
        let method = session.tables.method_builder(method_id).unwrap();
        assert!(session.types.method(method).deprecated);
    }
}
