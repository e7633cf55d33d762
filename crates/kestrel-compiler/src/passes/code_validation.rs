//! CodeValidation stage - type checking and flow analysis of every body.
//!
//! Bodies are field initializers, methods, property and indexer accessors,
//! constructors (explicit and implicit) and enum constant constructions.
//! Each is handed to the [`BodyValidator`], then to [`FlowAnalysis`], and
//! its local table is recorded under the body's node for code generation.

use kestrel_core::ast::{
    Block, CompilationUnit, ConstructorDecl, ConstructorInitializerKind, MemberDecl, NodeId, ParamDecl, TypeDecl,
    TypeDeclKind,
};
use kestrel_core::{Modifiers, Span};
use kestrel_types::{MethodId, TypeDefId, TypeId};
use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use super::{PassOutput, type_decls};
use crate::flow::FlowAnalysis;
use crate::session::CompilationSession;
use crate::validate::{BodyRef, BodyValidator, ConstructorCall, DefaultValidator, MethodContext, ValidationEnv};

/// Leading parameters every enum constructor receives.
const ENUM_HIDDEN_PARAMS: usize = 2;

pub struct CodeValidationPass<'s> {
    session: &'s mut CompilationSession,
    validator: Box<dyn BodyValidator + 's>,
    /// Types whose implicit constructor has been checked; partial types have several declarations.
    implicit_done: FxHashSet<TypeDefId>,
    validated: usize,
}

impl<'s> CodeValidationPass<'s> {
    pub fn new(session: &'s mut CompilationSession) -> Self {
        Self::with_validator(session, Box::new(DefaultValidator))
    }

    pub fn with_validator(session: &'s mut CompilationSession, validator: Box<dyn BodyValidator + 's>) -> Self {
        Self {
            session,
            validator,
            implicit_done: FxHashSet::default(),
            validated: 0,
        }
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run(mut self) -> PassOutput {
        let units = self.session.units();
        for unit in &units {
            for decl in type_decls(unit) {
                if let Some(def) = self.session.tables.type_builder(decl.id) {
                    self.validate_declaration(unit, decl, def);
                }
            }
        }
        debug!(bodies = self.validated, "bodies validated");
        PassOutput {
            processed: self.validated,
        }
    }

    fn validate_declaration(&mut self, unit: &CompilationUnit, decl: &TypeDecl, def: TypeDefId) {
        for member in &decl.members {
            match member {
                MemberDecl::Field(field) => {
                    let (Some(init), Some(id)) = (&field.init, self.session.tables.field_builder(field.id)) else {
                        continue;
                    };
                    let entry = self.session.types.field(id);
                    let ctx = self.context(unit, def, None, entry.is_static(), TypeId::VOID, field.id);
                    let body = BodyRef::Initializer {
                        expr: init,
                        target: entry.ty,
                    };
                    self.check(ctx, body, None, field.span);
                }
                MemberDecl::Method(method) => {
                    let (Some(block), Some(id)) = (&method.body, self.session.tables.method_builder(method.id)) else {
                        continue;
                    };
                    let ctx = MethodContext {
                        params: &method.params,
                        ..self.method_context(unit, def, id, block)
                    };
                    self.check(ctx, BodyRef::Block(block), Some(&method.name), method.span);
                }
                MemberDecl::Property(property) => {
                    for accessor in property.getter.iter().chain(&property.setter) {
                        self.accessor(unit, def, accessor.id, accessor.body.as_ref(), &[], accessor.span);
                    }
                }
                MemberDecl::Indexer(indexer) => {
                    for accessor in indexer.getter.iter().chain(&indexer.setter) {
                        self.accessor(unit, def, accessor.id, accessor.body.as_ref(), &indexer.params, accessor.span);
                    }
                }
                MemberDecl::Constructor(ctor) => self.constructor(unit, decl.kind, def, ctor),
                MemberDecl::Type(_) => {}
            }
        }

        if matches!(decl.kind, TypeDeclKind::Class | TypeDeclKind::Enum) && self.implicit_done.insert(def) {
            self.implicit_constructor(unit, decl, def);
        }

        for constant in &decl.enum_constants {
            let ctx = self.context(unit, def, None, true, TypeId::VOID, constant.id);
            let call = ConstructorCall {
                node: constant.id,
                span: constant.span,
                target: def,
                args: &constant.args,
                hidden: ENUM_HIDDEN_PARAMS,
            };
            self.check(ctx, BodyRef::Call(call), None, constant.span);
        }
    }

    fn accessor(
        &mut self,
        unit: &CompilationUnit,
        def: TypeDefId,
        node: NodeId,
        body: Option<&Block>,
        params: &[ParamDecl],
        span: Span,
    ) {
        let (Some(block), Some(id)) = (body, self.session.tables.method_builder(node)) else {
            return;
        };
        let name = self.session.types.method(id).name.clone();
        let ctx = MethodContext {
            params,
            ..self.method_context(unit, def, id, block)
        };
        self.check(ctx, BodyRef::Block(block), Some(&name), span);
    }

    fn constructor(&mut self, unit: &CompilationUnit, kind: TypeDeclKind, def: TypeDefId, ctor: &ConstructorDecl) {
        let Some(id) = self.session.tables.method_builder(ctor.id) else {
            return;
        };
        let hidden = if kind == TypeDeclKind::Enum { ENUM_HIDDEN_PARAMS } else { 0 };
        let ctx = MethodContext {
            params: &ctor.params,
            hidden_params: hidden,
            ..self.method_context(unit, def, id, &ctor.body)
        };
        let call = match &ctor.initializer {
            Some(init) => {
                let target = match init.kind {
                    ConstructorInitializerKind::This => Some(def),
                    ConstructorInitializerKind::Super => self.base_of(def),
                };
                target.map(|target| ConstructorCall {
                    node: init.id,
                    span: init.span,
                    target,
                    args: &init.args,
                    hidden,
                })
            }
            None => self.base_of(def).map(|target| ConstructorCall {
                node: ctor.id,
                span: ctor.span,
                target,
                args: &[],
                hidden,
            }),
        };
        let body = match call {
            Some(call) => BodyRef::Constructor {
                call,
                block: &ctor.body,
            },
            None => BodyRef::Block(&ctor.body),
        };
        self.check(ctx, body, Some("<init>"), ctor.span);
    }

    /// The synthesized constructor calls the base constructor without arguments.
    fn implicit_constructor(&mut self, unit: &CompilationUnit, decl: &TypeDecl, def: TypeDefId) {
        let ts = &self.session.types;
        let Some(ctor) = ts
            .constructors(def)
            .find(|ctor| ctor.modifiers.contains(Modifiers::SYNTHETIC))
            .map(|ctor| ctor.id)
        else {
            return;
        };
        let Some(base) = self.base_of(def) else {
            return;
        };
        let hidden = if decl.kind == TypeDeclKind::Enum { ENUM_HIDDEN_PARAMS } else { 0 };
        let ctx = MethodContext {
            hidden_params: hidden,
            ..self.context(unit, def, Some(ctor), false, TypeId::VOID, decl.id)
        };
        let call = ConstructorCall {
            node: decl.id,
            span: decl.span,
            target: base,
            args: &[],
            hidden,
        };
        self.check(ctx, BodyRef::Call(call), None, decl.span);
    }

    fn base_of(&self, def: TypeDefId) -> Option<TypeDefId> {
        let ts = &self.session.types;
        ts.def(def).base.and_then(|base| ts.def_of(base))
    }

    fn context<'a>(
        &self,
        unit: &'a CompilationUnit,
        def: TypeDefId,
        method: Option<MethodId>,
        is_static: bool,
        return_type: TypeId,
        body_id: NodeId,
    ) -> MethodContext<'a> {
        MethodContext {
            unit,
            def,
            method,
            is_static,
            return_type,
            params: &[],
            body_id,
            hidden_params: 0,
        }
    }

    fn method_context<'a>(
        &self,
        unit: &'a CompilationUnit,
        def: TypeDefId,
        method: MethodId,
        block: &Block,
    ) -> MethodContext<'a> {
        let entry = self.session.types.method(method);
        self.context(unit, def, Some(method), entry.is_static(), entry.return_type, block.id)
    }

    fn check(&mut self, ctx: MethodContext<'_>, body: BodyRef<'_>, name: Option<&str>, span: Span) {
        let session = &mut *self.session;
        let mut env = ValidationEnv {
            ts: &session.types,
            members: &session.members,
            tables: &mut session.tables,
            diagnostics: &mut session.diagnostics,
        };
        let mut locals = self.validator.validate(&mut env, &ctx, body);
        FlowAnalysis::new(&session.tables, &mut session.diagnostics, &ctx.unit.file, &mut locals).run(
            body,
            name,
            ctx.return_type,
            span,
        );
        trace!(body = ctx.body_id.0, locals = locals.len(), "body validated");
        session.tables.set_body(ctx.body_id, locals);
        self.validated += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::test_support::define;
    use kestrel_core::ast::AstBuilder;

    fn error_ids(session: &CompilationSession) -> Vec<u32> {
        session.diagnostics.errors().map(|d| d.id).collect()
    }

    fn class_with_int_constructor(b: &AstBuilder, name: &str) -> TypeDecl {
        let mut class = b.class(name);
        let ctor = b.constructor(vec![b.param(b.int_type(), "x")], None, b.block(vec![]));
        class.members.push(MemberDecl::Constructor(ctor));
        class
    }

    #[test]
    fn implicit_constructors_need_an_argumentless_base_constructor() {
        let b = AstBuilder::new();
        let base = class_with_int_constructor(&b, "Base");
        let mut derived = b.class("Derived");
        derived.bases.push(b.named("Base"));
        let mut session = define(vec![b.unit("A.ks", Some("app"), vec![base, derived])]);
        CodeValidationPass::new(&mut session).run();
        assert_eq!(error_ids(&session), vec![32]);
    }

    #[test]
    fn explicit_base_calls_select_a_constructor() {
        let b = AstBuilder::new();
        let base = class_with_int_constructor(&b, "Base");
        let mut derived = b.class("Derived");
        derived.bases.push(b.named("Base"));
        let init = b.ctor_init(ConstructorInitializerKind::Super, vec![b.int(3)]);
        let init_id = init.id;
        derived
            .members
            .push(MemberDecl::Constructor(b.constructor(vec![], Some(init), b.block(vec![]))));
        let mut session = define(vec![b.unit("A.ks", Some("app"), vec![base, derived])]);
        CodeValidationPass::new(&mut session).run();
        assert!(!session.has_errors());

        let target = session.tables.constructor_target(init_id).unwrap();
        let ts = &session.types;
        assert_eq!(ts.def(ts.method(target).declaring).name, "Base");
    }

    #[test]
    fn enum_constants_pass_arguments_after_the_hidden_ones() {
        let b = AstBuilder::new();
        let mut planet = b.enum_type("Planet", &["EARTH", "MARS"]);
        planet.enum_constants[0].args.push(b.int(3));
        planet.enum_constants[1].args.push(b.boolean(true));
        let ctor = b.constructor(vec![b.param(b.int_type(), "order")], None, b.block(vec![]));
        planet.members.push(MemberDecl::Constructor(ctor));
        let earth = planet.enum_constants[0].id;
        let mut session = define(vec![b.unit("A.ks", Some("app"), vec![planet])]);
        CodeValidationPass::new(&mut session).run();

        assert_eq!(error_ids(&session), vec![32]);
        let target = session.tables.constructor_target(earth).unwrap();
        assert_eq!(session.types.method(target).params.len(), 3);
    }

    #[test]
    fn every_body_gets_a_local_table() {
        let b = AstBuilder::new();
        let mut class = b.class("T");
        let field = b.field(b.int_type(), "count", Some(b.int(1)));
        let field_id = field.id;
        class.members.push(MemberDecl::Field(field));
        let getter = b.accessor(Some(b.block(vec![b.ret(Some(b.ident("count")))])));
        let getter_body = getter.body.as_ref().unwrap().id;
        let setter = b.accessor(Some(b.block(vec![b.expr_stmt(b.assign(b.ident("count"), b.ident("value")))])));
        let setter_body = setter.body.as_ref().unwrap().id;
        class
            .members
            .push(MemberDecl::Property(b.property(b.int_type(), "size", Some(getter), Some(setter))));
        let class_id = class.id;
        let mut session = define(vec![b.unit("A.ks", Some("app"), vec![class])]);
        let output = CodeValidationPass::new(&mut session).run();

        assert!(!session.has_errors());
        assert_eq!(output.processed, 4);
        for node in [field_id, getter_body, setter_body, class_id] {
            assert!(session.tables.body(node).is_some());
        }
        let setter_locals = session.tables.body(setter_body).unwrap();
        assert_eq!(setter_locals.iter().next().unwrap().name, "value");
    }
}
