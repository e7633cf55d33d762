//! Body validation - type checking of statements and expressions.
//!
//! A [`BodyValidator`] is handed one body at a time together with the
//! [`MethodContext`] describing where the body lives. It records an
//! [`ExpressionInfo`](crate::expr_info::ExpressionInfo) for every expression
//! and a local id for every declaration in the node tables, reports user
//! errors to the diagnostic bag and returns the body's [`LocalTable`].
//!
//! The crate ships [`DefaultValidator`]; reachability and definite assignment
//! run afterwards over the recorded results (see [`crate::flow`]).

mod calls;
mod expr;
mod stmt;

use kestrel_core::ast::{Block, CompilationUnit, Expr, NodeId, ParamDecl};
use kestrel_core::{CompilationError, CompilationWarning, Diagnostics, Span};
use kestrel_types::{Member, MemberModel, MethodId, TypeDefId, TypeId, TypeSystem};

use crate::node_tables::NodeTables;
use crate::scope::{LocalTable, ScopeStack};
use crate::type_resolver::TypeResolver;

/// Where a body lives.
#[derive(Debug, Clone, Copy)]
pub struct MethodContext<'a> {
    pub unit: &'a CompilationUnit,
    pub def: TypeDefId,
    /// The method, constructor or accessor; `None` for field initializers.
    pub method: Option<MethodId>,
    pub is_static: bool,
    pub return_type: TypeId,
    /// Source parameters, matched to the definition's parameters after the hidden ones.
    pub params: &'a [ParamDecl],
    /// Node the body's local table is recorded under.
    pub body_id: NodeId,
    /// Leading synthesized parameters (`$name`, `$ordinal` of enum constructors).
    pub hidden_params: usize,
}

/// A `super(...)`/`this(...)` call or an enum constant's construction.
#[derive(Debug, Clone, Copy)]
pub struct ConstructorCall<'a> {
    /// Node the resolved constructor is recorded under.
    pub node: NodeId,
    pub span: Span,
    /// Type whose constructors are candidates.
    pub target: TypeDefId,
    pub args: &'a [Expr],
    /// Leading arguments supplied by the compiler rather than the source.
    pub hidden: usize,
}

/// The body to validate.
#[derive(Debug, Clone, Copy)]
pub enum BodyRef<'a> {
    Block(&'a Block),
    /// A field initializer converted to `target`.
    Initializer { expr: &'a Expr, target: TypeId },
    /// A constructor call on its own: implicit constructors and enum constants.
    Call(ConstructorCall<'a>),
    /// A constructor: its base or sibling constructor call, then its block.
    Constructor { call: ConstructorCall<'a>, block: &'a Block },
}

/// What a validator may read and write.
pub struct ValidationEnv<'a> {
    pub ts: &'a TypeSystem,
    pub members: &'a MemberModel,
    pub tables: &'a mut NodeTables,
    pub diagnostics: &'a mut Diagnostics,
}

/// Type checks one body.
pub trait BodyValidator {
    fn validate(&mut self, env: &mut ValidationEnv<'_>, ctx: &MethodContext<'_>, body: BodyRef<'_>) -> LocalTable;
}

impl<V: BodyValidator + ?Sized> BodyValidator for &mut V {
    fn validate(&mut self, env: &mut ValidationEnv<'_>, ctx: &MethodContext<'_>, body: BodyRef<'_>) -> LocalTable {
        (**self).validate(env, ctx, body)
    }
}

/// The validator used unless the driver is given another.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultValidator;

impl BodyValidator for DefaultValidator {
    fn validate(&mut self, env: &mut ValidationEnv<'_>, ctx: &MethodContext<'_>, body: BodyRef<'_>) -> LocalTable {
        let mut checker = BodyChecker::new(env, ctx);
        checker.declare_params();
        match body {
            BodyRef::Block(block) => checker.block(block),
            BodyRef::Initializer { expr, target } => {
                checker.expr_to(expr, target);
            }
            BodyRef::Call(call) => checker.constructor_call(&call),
            BodyRef::Constructor { call, block } => {
                checker.constructor_call(&call);
                checker.block(block);
            }
        }
        checker.locals
    }
}

/// Type checking state for one body.
pub(crate) struct BodyChecker<'a> {
    pub(crate) ts: &'a TypeSystem,
    pub(crate) members: &'a MemberModel,
    pub(crate) tables: &'a mut NodeTables,
    pub(crate) diagnostics: &'a mut Diagnostics,
    pub(crate) ctx: &'a MethodContext<'a>,
    pub(crate) locals: LocalTable,
    pub(crate) scopes: ScopeStack,
}

impl<'a> BodyChecker<'a> {
    pub(crate) fn new(env: &'a mut ValidationEnv<'_>, ctx: &'a MethodContext<'a>) -> Self {
        Self {
            ts: env.ts,
            members: env.members,
            tables: &mut *env.tables,
            diagnostics: &mut *env.diagnostics,
            ctx,
            locals: LocalTable::new(!ctx.is_static),
            scopes: ScopeStack::new(),
        }
    }

    /// Declare every parameter of the definition, hidden and synthesized ones included.
    fn declare_params(&mut self) {
        let Some(method) = self.ctx.method else {
            return;
        };
        let hidden = self.ctx.hidden_params;
        for (index, param) in self.ts.method(method).params.iter().enumerate() {
            let source = index.checked_sub(hidden).and_then(|i| self.ctx.params.get(i));
            let (span, node) = match source {
                Some(decl) => (decl.span, decl.id),
                None => (Span::default(), self.ctx.body_id),
            };
            let id = self.locals.declare(&param.name, param.ty, span, node, true);
            if let Err(error) = self.scopes.bind(&param.name, id) {
                self.error(span, error);
            }
            if let Some(decl) = source {
                self.tables.set_local(decl.id, id);
            }
        }
    }

    // ==========================================================================
    // Shared helpers
    // ==========================================================================

    pub(crate) fn file(&self) -> &'a str {
        &self.ctx.unit.file
    }

    pub(crate) fn error(&mut self, span: Span, error: CompilationError) {
        let file = self.file();
        self.diagnostics.error(file, span, error);
    }

    pub(crate) fn warning(&mut self, span: Span, warning: CompilationWarning) {
        let file = self.file();
        self.diagnostics.warning(file, span, warning);
    }

    pub(crate) fn resolver(&self) -> TypeResolver<'a> {
        let resolver = TypeResolver::new(self.ts, self.ctx.unit, self.ctx.def);
        match self.ctx.method {
            Some(method) => resolver.in_method(method),
            None => resolver,
        }
    }

    pub(crate) fn type_name_of(&self, def: TypeDefId) -> String {
        self.ts.def(def).full_name.clone()
    }

    /// Warn when `member` is deprecated and declared outside this type nest.
    pub(crate) fn check_deprecated(&mut self, span: Span, member: &Member) {
        let ts = self.ts;
        if !member.is_deprecated(ts) {
            return;
        }
        let foreign = member
            .declaring_type(ts)
            .is_none_or(|declaring| ts.top_level(declaring) != ts.top_level(self.ctx.def));
        if foreign {
            let name = member.name(ts);
            self.warning(span, CompilationWarning::DeprecatedUsage { name });
        }
    }

    pub(crate) fn mismatch(&mut self, span: Span, from: TypeId, to: TypeId) {
        let from = self.ts.display(from);
        let to = self.ts.display(to);
        self.error(span, CompilationError::TypeMismatch { from, to });
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Builds a session through member definition and validates one method body.

    use super::*;
    use crate::passes::{AnnotationsPass, MembersDefinitionPass, SuperTypesPass, TypesDefinitionPass};
    use crate::session::CompilationSession;
    use kestrel_core::ast::{AstBuilder, MemberDecl, TypeDecl, TypeRef};

    pub(crate) fn define(units: Vec<CompilationUnit>) -> CompilationSession {
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

    /// A class `T` in package `app` with an instance method `run` holding `stmts`.
    pub(crate) fn method_class(b: &AstBuilder, return_type: TypeRef, stmts: Vec<kestrel_core::ast::Stmt>) -> TypeDecl {
        let mut class = b.class("T");
        class
            .members
            .push(MemberDecl::Method(b.method("run", return_type, vec![], Some(b.block(stmts)))));
        class
    }
}
