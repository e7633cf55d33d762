//! Invocations, object creation and overload resolution.
//!
//! Resolution runs in two phases: candidates applicable without boxing win
//! over candidates that need it. Among the applicable ones the most specific
//! is chosen; when none is strictly more specific the first declared wins.

use std::collections::BTreeSet;

use kestrel_core::ast::{Expr, ExprKind, TypeRef};
use kestrel_core::{CompilationError, Span};
use kestrel_types::{Bindings, Member, MethodId, Type, TypeDefId, TypeId, TypeKind, TypeSystem};

use super::expr::{Access, Receiver, receiver_of};
use super::{BodyChecker, ConstructorCall};
use crate::conversion::assignment_conversion;
use crate::expr_info::ExpressionInfo;

/// An overload candidate with its parameter types substituted for the call.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub member: Member,
    pub params: Vec<TypeId>,
    pub bindings: Bindings,
}

impl Candidate {
    /// A candidate whose parameters only depend on its owner's type arguments.
    pub(crate) fn plain(ts: &TypeSystem, member: Member) -> Self {
        let params = member.parameter_types(ts);
        let bindings = member.owner().map(|o| ts.bindings_of(o)).unwrap_or_default();
        Self {
            member,
            params,
            bindings,
        }
    }
}

impl<'a> BodyChecker<'a> {
    pub(crate) fn check_call(&mut self, expr: &Expr, callee: &Expr, args: &[Expr]) -> Option<ExpressionInfo> {
        match &callee.kind {
            ExprKind::Ident { name, type_args } if self.scopes.lookup(name).is_none() => {
                let explicit = self.resolve_type_args(callee.span, type_args)?;
                let mut current = Some(self.ctx.def);
                while let Some(def) = current {
                    let ty = self.ts.this_type(def);
                    let outer = def != self.ctx.def;
                    if let Some(info) = self.call_on(expr, callee, None, ty, name, &explicit, args, outer) {
                        return info;
                    }
                    current = self.ts.def(def).enclosing;
                }
                if !type_args.is_empty() {
                    self.error(callee.span, CompilationError::NoApplicableMethod {
                        name: name.clone(),
                        arity: args.len(),
                    });
                    return None;
                }
            }
            ExprKind::Member { object, name, type_args } => {
                let object_info = self.qualifier(object)?;
                let explicit = self.resolve_type_args(callee.span, type_args)?;
                if !object_info.ty.is_primitive() && !object_info.ty.is_null() {
                    let qualifier = Some((object.as_ref(), &object_info));
                    if let Some(info) =
                        self.call_on(expr, callee, qualifier, object_info.ty, name, &explicit, args, false)
                    {
                        return info;
                    }
                }
                if !type_args.is_empty() {
                    self.error(callee.span, CompilationError::NoApplicableMethod {
                        name: name.clone(),
                        arity: args.len(),
                    });
                    return None;
                }
                // A field or property holding a delegate.
                let receiver = receiver_of(object, &object_info);
                let callee_info = self.member_value(callee, &object_info, receiver, name)?;
                return self.invoke_delegate(expr, callee, callee_info, args);
            }
            _ => {}
        }
        let callee_info = self.value(callee)?;
        self.invoke_delegate(expr, callee, callee_info, args)
    }

    fn member_value(
        &mut self,
        callee: &Expr,
        object: &ExpressionInfo,
        receiver: Receiver,
        name: &str,
    ) -> Option<ExpressionInfo> {
        let info = self.member_access(callee.span, object, receiver, name, Access::Read)?;
        self.tables.set_expression(callee.id, info.clone());
        Some(info)
    }

    /// Methods named `name` on `ty`, resolved against `args`.
    ///
    /// `None` when `ty` has no such method, so callers can try elsewhere.
    #[allow(clippy::too_many_arguments)]
    fn call_on(
        &mut self,
        expr: &Expr,
        callee: &Expr,
        qualifier: Option<(&Expr, &ExpressionInfo)>,
        ty: TypeId,
        name: &str,
        explicit: &[TypeId],
        args: &[Expr],
        outer: bool,
    ) -> Option<Option<ExpressionInfo>> {
        let ts = self.ts;
        let methods = self.method_candidates(ty, name, explicit.len());
        if methods.is_empty() {
            let excluded = self.excluded_partial(ty, name, args.len())?;
            // Calls to unimplemented partial methods are dropped with their arguments.
            let info = ExpressionInfo::member(
                TypeId::VOID,
                Member::Method {
                    id: excluded,
                    owner: ty,
                },
            );
            self.tables.set_expression(callee.id, info.clone());
            return Some(Some(info));
        }

        let Some(arg_infos) = self.check_args(args) else {
            return Some(None);
        };
        let candidates = methods
            .into_iter()
            .filter_map(|member| self.instantiate_candidate(member, explicit, &arg_infos))
            .collect();
        let Some(chosen) = self.select(expr.span, name, candidates, args, &arg_infos) else {
            return Some(None);
        };
        let Member::Method { id, owner } = chosen.member else {
            return Some(None);
        };
        let method = ts.method(id);

        let static_context = match qualifier {
            None => !method.is_static() && (self.ctx.is_static || outer),
            Some((_, info)) => info.is_type && !method.is_static(),
        };
        if static_context {
            self.error(callee.span, CompilationError::InstanceMemberFromStatic { name: name.to_string() });
            return Some(None);
        }
        if let Some((object, _)) = qualifier {
            if matches!(object.kind, ExprKind::Super) && method.modifiers.is_abstract() {
                self.error(callee.span, CompilationError::NoApplicableMethod {
                    name: name.to_string(),
                    arity: args.len(),
                });
                return Some(None);
            }
        }

        let member = Member::Method { id, owner };
        self.check_deprecated(callee.span, &member);
        let return_type = ts.substitute(method.return_type, &chosen.bindings);
        let info = ExpressionInfo::member(return_type, member);
        self.tables.set_expression(callee.id, info.clone());
        Some(Some(info))
    }

    /// Plain methods named `name`: generic ones of any arity unless type
    /// arguments were given explicitly.
    fn method_candidates(&self, ty: TypeId, name: &str, explicit: usize) -> Vec<Member> {
        let ts = self.ts;
        let arities: BTreeSet<u32> = if explicit > 0 {
            BTreeSet::from([explicit as u32])
        } else {
            ts.supertype_closure(ty)
                .into_iter()
                .filter_map(|level| ts.def_of(level))
                .flat_map(|def| ts.def(def).methods.iter().copied())
                .map(|m| ts.method(m))
                .filter(|m| m.is_plain() && m.name == name)
                .map(|m| m.type_params.len() as u32)
                .collect()
        };
        arities
            .into_iter()
            .flat_map(|arity| self.members.lookup_members(ts, self.ctx.def, ty, name, arity))
            .filter(|m| matches!(m, Member::Method { .. }))
            .collect()
    }

    /// An unimplemented partial method named `name` taking `arity` arguments.
    fn excluded_partial(&self, ty: TypeId, name: &str, arity: usize) -> Option<MethodId> {
        let ts = self.ts;
        ts.supertype_closure(ty)
            .into_iter()
            .filter_map(|level| ts.def_of(level))
            .flat_map(|def| ts.def(def).methods.iter().copied())
            .find(|&m| {
                let method = ts.method(m);
                method.excluded && method.name == name && method.params.len() == arity
            })
    }

    fn resolve_type_args(&mut self, span: Span, type_args: &[TypeRef]) -> Option<Vec<TypeId>> {
        let resolver = self.resolver();
        let mut resolved = Vec::with_capacity(type_args.len());
        for arg in type_args {
            match resolver.resolve(arg) {
                Ok(ty) if !ty.is_primitive() => resolved.push(ty),
                Ok(ty) => {
                    let to = self.ts.display(self.ts.object_type());
                    let from = self.ts.display(ty);
                    self.error(span, CompilationError::TypeMismatch { from, to });
                    return None;
                }
                Err(error) => {
                    self.error(span, error);
                    return None;
                }
            }
        }
        Some(resolved)
    }

    /// Bind owner and method type parameters for one candidate.
    ///
    /// Method type parameters take the explicit arguments, or else are
    /// inferred from the argument types; unconstrained ones erase.
    fn instantiate_candidate(&self, member: Member, explicit: &[TypeId], args: &[ExpressionInfo]) -> Option<Candidate> {
        let ts = self.ts;
        let Member::Method { id, owner } = member else {
            return None;
        };
        let method = ts.method(id);
        let mut bindings = ts.bindings_of(owner);
        let vars = &method.type_params;
        if !vars.is_empty() {
            if explicit.is_empty() {
                let mut inferred = Bindings::default();
                for (param, arg) in method.params.iter().zip(args) {
                    let param = ts.substitute(param.ty, &bindings);
                    infer(ts, vars, param, arg.ty, &mut inferred);
                }
                for &var in vars {
                    let bound = inferred.get(&var).copied().unwrap_or_else(|| ts.erasure(var));
                    bindings.insert(var, bound);
                }
            } else {
                for (&var, &arg) in vars.iter().zip(explicit) {
                    bindings.insert(var, arg);
                }
            }
        }
        let params = method
            .params
            .iter()
            .map(|p| ts.substitute(p.ty, &bindings))
            .collect();
        Some(Candidate {
            member: Member::Method { id, owner },
            params,
            bindings,
        })
    }

    /// Pick the best candidate and convert the arguments to its parameters.
    pub(crate) fn select(
        &mut self,
        span: Span,
        name: &str,
        candidates: Vec<Candidate>,
        args: &[Expr],
        infos: &[ExpressionInfo],
    ) -> Option<Candidate> {
        let Some(chosen) = self.choose(candidates, infos) else {
            self.error(span, CompilationError::NoApplicableMethod {
                name: name.to_string(),
                arity: args.len(),
            });
            return None;
        };
        self.convert_args(args, infos, &chosen);
        Some(chosen)
    }

    fn choose(&self, candidates: Vec<Candidate>, infos: &[ExpressionInfo]) -> Option<Candidate> {
        let ts = self.ts;
        let applicable = |allow_boxing: bool| -> Vec<&Candidate> {
            candidates
                .iter()
                .filter(|c| {
                    c.params.len() == infos.len()
                        && c.params.iter().zip(infos).all(|(&param, info)| {
                            assignment_conversion(ts, param, info.ty, info.constant.as_ref(), allow_boxing).is_some()
                        })
                })
                .collect()
        };
        let mut found = applicable(false);
        if found.is_empty() {
            found = applicable(true);
        }
        let first = *found.first()?;
        let more_specific = |a: &Candidate, b: &Candidate| {
            a.params
                .iter()
                .zip(&b.params)
                .all(|(&pa, &pb)| assignment_conversion(ts, pb, pa, None, false).is_some())
        };
        let chosen = found
            .iter()
            .copied()
            .find(|&c| found.iter().all(|&other| std::ptr::eq(c, other) || more_specific(c, other)))
            .unwrap_or(first);
        Some(chosen.clone())
    }

    fn convert_args(&mut self, args: &[Expr], infos: &[ExpressionInfo], chosen: &Candidate) {
        for ((arg, info), &param) in args.iter().zip(infos).zip(&chosen.params) {
            self.convert(arg, info, param);
        }
    }

    fn invoke_delegate(
        &mut self,
        expr: &Expr,
        callee: &Expr,
        callee_info: ExpressionInfo,
        args: &[Expr],
    ) -> Option<ExpressionInfo> {
        let ts = self.ts;
        let delegate_def = ts.def_of(callee_info.ty).filter(|&d| ts.def(d).kind == TypeKind::Delegate);
        let Some(_) = delegate_def else {
            let name = match &callee.kind {
                ExprKind::Ident { name, .. } | ExprKind::Member { name, .. } => name.clone(),
                kind => kind.describe().to_string(),
            };
            self.error(callee.span, CompilationError::NoApplicableMethod {
                name,
                arity: args.len(),
            });
            return None;
        };
        let arg_infos = self.check_args(args)?;
        let candidates = self
            .members
            .lookup_members(ts, self.ctx.def, callee_info.ty, "invoke", 0)
            .into_iter()
            .filter(|m| matches!(m, Member::Method { .. }))
            .map(|m| Candidate::plain(ts, m))
            .collect();
        let chosen = self.select(expr.span, "invoke", candidates, args, &arg_infos)?;
        let return_type = chosen.member.member_type(ts);
        Some(ExpressionInfo::member(return_type, chosen.member))
    }

    // ==========================================================================
    // Object creation
    // ==========================================================================

    pub(crate) fn check_new(&mut self, expr: &Expr, ty: &TypeRef, args: &[Expr]) -> Option<ExpressionInfo> {
        let ts = self.ts;
        let created = match self.resolver().resolve(ty) {
            Ok(created) => created,
            Err(error) => {
                self.error(expr.span, error);
                return None;
            }
        };
        let def = match ts.def_of(created) {
            Some(def) if is_instantiable(ts, def) => def,
            _ => {
                let name = ts.display(created);
                self.error(expr.span, CompilationError::AbstractInstantiation { name });
                return None;
            }
        };
        let arg_infos = self.check_args(args)?;
        let bindings = ts.bindings_of(created);
        let candidates: Vec<Candidate> = ts
            .constructors(def)
            .filter(|ctor| ts.can_access(self.ctx.def, def, ctor.modifiers.visibility()))
            .map(|ctor| Candidate {
                member: Member::Method {
                    id: ctor.id,
                    owner: created,
                },
                params: ctor.params.iter().map(|p| ts.substitute(p.ty, &bindings)).collect(),
                bindings: bindings.clone(),
            })
            .collect();
        let chosen = self.select_constructor(expr.span, def, candidates, args, &arg_infos)?;
        self.check_deprecated(expr.span, &chosen.member);
        Some(ExpressionInfo::member(created, chosen.member))
    }

    /// Resolve a `super(...)`/`this(...)` call or an enum constant's construction.
    pub(crate) fn constructor_call(&mut self, call: &ConstructorCall<'_>) {
        let ts = self.ts;
        let Some(arg_infos) = self.check_args(call.args) else {
            return;
        };
        let this = ts.this_type(self.ctx.def);
        let owner = if call.target == self.ctx.def {
            this
        } else {
            ts.as_super(this, call.target)
                .unwrap_or_else(|| ts.raw_type(call.target))
        };
        let bindings = ts.bindings_of(owner);
        let candidates: Vec<Candidate> = ts
            .constructors(call.target)
            .filter(|ctor| ctor.params.len() >= call.hidden)
            .filter(|ctor| ts.can_access(self.ctx.def, call.target, ctor.modifiers.visibility()))
            .map(|ctor| Candidate {
                member: Member::Method { id: ctor.id, owner },
                params: ctor.params[call.hidden..]
                    .iter()
                    .map(|p| ts.substitute(p.ty, &bindings))
                    .collect(),
                bindings: bindings.clone(),
            })
            .collect();
        if let Some(chosen) = self.select_constructor(call.span, call.target, candidates, call.args, &arg_infos) {
            if let Member::Method { id, .. } = chosen.member {
                self.tables.set_constructor_target(call.node, id);
            }
        }
    }

    fn select_constructor(
        &mut self,
        span: Span,
        def: TypeDefId,
        candidates: Vec<Candidate>,
        args: &[Expr],
        infos: &[ExpressionInfo],
    ) -> Option<Candidate> {
        let Some(chosen) = self.choose(candidates, infos) else {
            let base = self.type_name_of(def);
            self.error(span, CompilationError::NoAccessibleConstructor {
                base,
                arity: args.len(),
            });
            return None;
        };
        self.convert_args(args, infos, &chosen);
        Some(chosen)
    }
}

fn is_instantiable(ts: &TypeSystem, def: TypeDefId) -> bool {
    let entry = ts.def(def);
    entry.kind == TypeKind::Class && !entry.modifiers.is_abstract()
}

/// Bind method type variables occurring in `param` from the argument type.
fn infer(ts: &TypeSystem, vars: &[TypeId], param: TypeId, arg: TypeId, out: &mut Bindings) {
    if arg.is_null() || arg.is_void() {
        return;
    }
    if vars.contains(&param) {
        let arg = match arg.as_primitive() {
            Some(kind) => match ts.boxed_type(kind) {
                Some(boxed) => boxed,
                None => return,
            },
            None => arg,
        };
        out.entry(param).or_insert(arg);
        return;
    }
    match ts.get(param) {
        Type::Array(element) => {
            if let Some(arg_element) = ts.element_type(arg) {
                infer(ts, vars, element, arg_element, out);
            }
        }
        Type::Reference { def, args } if !args.is_empty() => {
            if let Some(instance) = ts.as_super(arg, def) {
                for (p, a) in args.into_iter().zip(ts.type_args(instance)) {
                    infer(ts, vars, p, a, out);
                }
            }
        }
        _ => {}
    }
}
