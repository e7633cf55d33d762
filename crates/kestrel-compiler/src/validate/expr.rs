//! Expression checking: names, member access, operators, assignments and casts.

use kestrel_core::ast::{AssignOp, BinaryOp, Expr, ExprKind, PostfixOp, UnaryOp};
use kestrel_core::{CompilationError, Span};
use kestrel_types::{Member, TypeDefId, TypeId};

use super::BodyChecker;
use crate::constant_eval::dotted_name;
use crate::conversion::{Conversion, assignment_conversion, cast_conversion};
use crate::expr_info::{BoxingKind, ExpressionInfo};
use crate::operators::{binary_types, cast_constant, fold_binary, fold_unary, literal_constant, literal_type, unary_types};

/// How a name, member access or element access is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Access {
    Read,
    Write,
    /// Compound assignment and increments.
    ReadWrite,
}

impl Access {
    fn reads(self) -> bool {
        self != Access::Write
    }

    fn writes(self) -> bool {
        self != Access::Read
    }
}

/// What a member access was qualified with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Receiver {
    /// A simple name; `outer` when found on an enclosing type.
    Implicit { outer: bool },
    This,
    Super,
    Type,
    Instance,
}

/// Outcome of looking up a simple name among the members in scope.
enum Named {
    Found { member: Member, outer: bool },
    Inaccessible,
    Missing,
}

impl<'a> BodyChecker<'a> {
    /// Check `expr` and record its info. `None` once an error was reported.
    pub(crate) fn check(&mut self, expr: &Expr) -> Option<ExpressionInfo> {
        let info = self.check_kind(expr)?;
        self.tables.set_expression(expr.id, info.clone());
        Some(info)
    }

    /// Check an expression used as a value.
    pub(crate) fn value(&mut self, expr: &Expr) -> Option<ExpressionInfo> {
        let info = self.check(expr)?;
        if info.is_type {
            let name = dotted_name(expr).unwrap_or_else(|| expr.kind.describe().to_string());
            self.error(expr.span, CompilationError::UnresolvedName { name });
            return None;
        }
        Some(info)
    }

    /// Check `expr` and convert it to `target` by assignment conversion.
    pub(crate) fn expr_to(&mut self, expr: &Expr, target: TypeId) -> Option<ExpressionInfo> {
        let info = self.value(expr)?;
        self.convert(expr, &info, target)?;
        Some(info)
    }

    /// Apply assignment conversion to an already checked expression.
    pub(crate) fn convert(&mut self, expr: &Expr, info: &ExpressionInfo, target: TypeId) -> Option<Conversion> {
        match assignment_conversion(self.ts, target, info.ty, info.constant.as_ref(), true) {
            Some(conversion) => {
                self.mark_boxing(expr, conversion.boxing());
                Some(conversion)
            }
            None => {
                self.mismatch(expr.span, info.ty, target);
                None
            }
        }
    }

    fn mark_boxing(&mut self, expr: &Expr, boxing: BoxingKind) {
        if boxing == BoxingKind::None {
            return;
        }
        if let Some(info) = self.tables.expression_mut(expr.id) {
            info.boxing = boxing;
        }
    }

    /// Check an assignable expression and record its info.
    pub(crate) fn target(&mut self, expr: &Expr, access: Access) -> Option<ExpressionInfo> {
        let info = match &expr.kind {
            ExprKind::Ident { .. } | ExprKind::Member { .. } | ExprKind::Index { .. } => self.access(expr, access)?,
            _ => {
                self.check(expr);
                self.error(expr.span, CompilationError::NotAssignable);
                return None;
            }
        };
        if info.is_type || matches!(info.member, Some(Member::NestedType { .. })) {
            self.error(expr.span, CompilationError::NotAssignable);
            return None;
        }
        self.tables.set_expression(expr.id, info.clone());
        Some(info)
    }

    fn check_kind(&mut self, expr: &Expr) -> Option<ExpressionInfo> {
        let ts = self.ts;
        match &expr.kind {
            ExprKind::Literal(literal) => Some(ExpressionInfo::constant(
                literal_type(ts, literal),
                literal_constant(literal),
            )),
            ExprKind::Ident { .. } | ExprKind::Member { .. } | ExprKind::Index { .. } => self.access(expr, Access::Read),
            ExprKind::Call { callee, args } => self.check_call(expr, callee, args),
            ExprKind::New { ty, args } => self.check_new(expr, ty, args),
            ExprKind::NewArray { element, size } => {
                let element = match self.resolver().resolve(element) {
                    Ok(element) if !element.is_void() => element,
                    Ok(_) => {
                        self.error(expr.span, CompilationError::UnresolvedType { name: "void".to_string() });
                        return None;
                    }
                    Err(error) => {
                        self.error(expr.span, error);
                        return None;
                    }
                };
                self.expr_to(size, TypeId::INT)?;
                Some(ExpressionInfo::value(ts.array_of(element)))
            }
            ExprKind::ArrayInit(_) | ExprKind::Annotation(_) => {
                self.error(
                    expr.span,
                    CompilationError::TypeMismatch {
                        from: expr.kind.describe().to_string(),
                        to: "expression".to_string(),
                    },
                );
                None
            }
            ExprKind::Assign { op, target, value } => self.check_assign(*op, target, value),
            ExprKind::Unary { op, operand } => self.check_unary(expr.span, *op, operand),
            ExprKind::Postfix { op, operand } => {
                let as_prefix = match op {
                    PostfixOp::PostInc => UnaryOp::PreInc,
                    PostfixOp::PostDec => UnaryOp::PreDec,
                };
                self.check_increment(expr.span, as_prefix, op.as_str(), operand)
            }
            ExprKind::Binary { op, left, right } => self.check_binary(expr.span, *op, left, right),
            ExprKind::Cast { ty, expr: operand } => self.check_cast(expr.span, ty, operand),
            ExprKind::This => {
                if self.ctx.is_static {
                    self.error(
                        expr.span,
                        CompilationError::InstanceMemberFromStatic {
                            name: "this".to_string(),
                        },
                    );
                    return None;
                }
                Some(ExpressionInfo::value(ts.this_type(self.ctx.def)))
            }
            ExprKind::Super => {
                self.error(
                    expr.span,
                    CompilationError::UnresolvedName {
                        name: "super".to_string(),
                    },
                );
                None
            }
        }
    }

    // ==========================================================================
    // Names and member access
    // ==========================================================================

    /// Resolve a name, member access or element access without recording it.
    fn access(&mut self, expr: &Expr, access: Access) -> Option<ExpressionInfo> {
        match &expr.kind {
            ExprKind::Ident { name, type_args } => {
                if !type_args.is_empty() {
                    self.error(expr.span, CompilationError::UnresolvedName { name: name.clone() });
                    return None;
                }
                self.name_access(expr.span, name, access)
            }
            ExprKind::Member { object, name, type_args } => {
                if !type_args.is_empty() {
                    self.error(expr.span, CompilationError::UnresolvedName { name: name.clone() });
                    return None;
                }
                let object_info = self.qualifier(object)?;
                let receiver = receiver_of(object, &object_info);
                self.member_access(expr.span, &object_info, receiver, name, access)
            }
            ExprKind::Index { object, indexes } => self.index_access(expr.span, object, indexes, access),
            _ => self.check_kind(expr),
        }
    }

    fn name_access(&mut self, span: Span, name: &str, access: Access) -> Option<ExpressionInfo> {
        if let Some(id) = self.scopes.lookup(name) {
            let ty = self.locals.get(id).ty;
            let member = Member::Local {
                id,
                name: name.to_string(),
                ty,
            };
            return Some(ExpressionInfo::member(ty, member));
        }
        match self.find_named(name) {
            Named::Found { member, outer } => self.use_member(span, member, Receiver::Implicit { outer }, access),
            Named::Inaccessible => {
                let from = self.type_name_of(self.ctx.def);
                self.error(
                    span,
                    CompilationError::InaccessibleMember {
                        member: name.to_string(),
                        from,
                    },
                );
                None
            }
            Named::Missing => {
                if access == Access::Read {
                    if let Some(def) = self.resolver().resolve_name(name) {
                        return Some(self.type_info(def));
                    }
                }
                self.error(span, CompilationError::UnresolvedName { name: name.to_string() });
                None
            }
        }
    }

    /// Fields, properties and nested types named `name` on this type, its
    /// supertypes and its enclosing types.
    fn find_named(&self, name: &str) -> Named {
        let ts = self.ts;
        let mut inaccessible = false;
        let mut current = Some(self.ctx.def);
        while let Some(def) = current {
            let ty = ts.this_type(def);
            let found = self.members.lookup_members(ts, self.ctx.def, ty, name, 0);
            if let Some(member) = found.into_iter().find(|m| !matches!(m, Member::Method { .. })) {
                return Named::Found {
                    member,
                    outer: def != self.ctx.def,
                };
            }
            let raw = self.members.raw_members(ts, ty, name, 0);
            inaccessible |= raw.iter().any(|m| !matches!(m, Member::Method { .. }));
            current = ts.def(def).enclosing;
        }
        if inaccessible { Named::Inaccessible } else { Named::Missing }
    }

    /// Whether a simple name denotes a local or a member rather than a type.
    pub(crate) fn names_value(&self, name: &str) -> bool {
        self.scopes.lookup(name).is_some() || matches!(self.find_named(name), Named::Found { .. })
    }

    fn type_info(&self, def: TypeDefId) -> ExpressionInfo {
        let ts = self.ts;
        let mut info = ExpressionInfo::type_name(ts.raw_type(def));
        if let Some(owner) = ts.def(def).enclosing {
            info.member = Some(Member::NestedType {
                def,
                owner: ts.raw_type(owner),
            });
        }
        info
    }

    /// Check the qualifier of a member access or invocation.
    ///
    /// Dotted names are tried as type names first unless their head names a
    /// local or a member; `super` is accepted here only.
    pub(crate) fn qualifier(&mut self, object: &Expr) -> Option<ExpressionInfo> {
        if let Some(name) = dotted_name(object) {
            let head = name.split('.').next().unwrap_or_default();
            if !self.names_value(head) {
                if let Some(def) = self.resolver().resolve_name(&name) {
                    let info = self.type_info(def);
                    self.tables.set_expression(object.id, info.clone());
                    return Some(info);
                }
            }
        }
        if matches!(object.kind, ExprKind::Super) {
            let ts = self.ts;
            if self.ctx.is_static {
                self.error(
                    object.span,
                    CompilationError::InstanceMemberFromStatic {
                        name: "super".to_string(),
                    },
                );
                return None;
            }
            let base = ts.def(self.ctx.def).base.unwrap_or_else(|| ts.object_type());
            let info = ExpressionInfo::value(base);
            self.tables.set_expression(object.id, info.clone());
            return Some(info);
        }
        self.check(object)
    }

    pub(crate) fn member_access(
        &mut self,
        span: Span,
        object: &ExpressionInfo,
        receiver: Receiver,
        name: &str,
        access: Access,
    ) -> Option<ExpressionInfo> {
        let ts = self.ts;
        if !object.is_type && ts.is_array(object.ty) && name == "length" {
            if access.writes() {
                self.error(span, CompilationError::ReadOnly { name: name.to_string() });
                return None;
            }
            return Some(ExpressionInfo::value(TypeId::INT));
        }
        if object.ty.is_primitive() || object.ty.is_null() {
            self.error(span, CompilationError::UnresolvedName { name: name.to_string() });
            return None;
        }
        let found = self.members.lookup_members(ts, self.ctx.def, object.ty, name, 0);
        match found.into_iter().find(|m| !matches!(m, Member::Method { .. })) {
            Some(member) => self.use_member(span, member, receiver, access),
            None => {
                let raw = self.members.raw_members(ts, object.ty, name, 0);
                if raw.iter().any(|m| !matches!(m, Member::Method { .. })) {
                    let from = self.type_name_of(self.ctx.def);
                    self.error(
                        span,
                        CompilationError::InaccessibleMember {
                            member: name.to_string(),
                            from,
                        },
                    );
                } else {
                    let name = format!("{}.{}", ts.display(object.ty), name);
                    self.error(span, CompilationError::UnresolvedName { name });
                }
                None
            }
        }
    }

    /// Checks shared by every use of a field, property or nested type.
    fn use_member(&mut self, span: Span, member: Member, receiver: Receiver, access: Access) -> Option<ExpressionInfo> {
        let ts = self.ts;
        let name = member.name(ts);
        if let Member::NestedType { def, .. } = member {
            return Some(self.type_info(def));
        }

        let is_static = member.is_static(ts);
        let needs_instance = match receiver {
            Receiver::Implicit { outer } => !is_static && (self.ctx.is_static || outer),
            Receiver::Type => !is_static,
            _ => false,
        };
        if needs_instance {
            self.error(span, CompilationError::InstanceMemberFromStatic { name });
            return None;
        }

        match &member {
            Member::Property { getter, setter, .. } => {
                if access.reads() && !self.accessor_usable(span, &name, *getter) {
                    return None;
                }
                if access.writes() {
                    if setter.is_none() {
                        self.error(span, CompilationError::ReadOnly { name });
                        return None;
                    }
                    if !self.accessor_usable(span, &name, *setter) {
                        return None;
                    }
                }
            }
            Member::Field { id, .. } if access.writes() => {
                let field = ts.field(*id);
                if field.modifiers.is_final() && !self.may_initialize(field.declaring, field.is_static(), receiver) {
                    self.error(span, CompilationError::ReadOnly { name });
                    return None;
                }
            }
            _ => {}
        }

        self.check_deprecated(span, &member);
        let mut info = ExpressionInfo::member(member.member_type(ts), member.clone());
        if let Member::Field { id, .. } = member {
            if access == Access::Read {
                info.constant = ts.field(id).constant.clone();
            }
        }
        Some(info)
    }

    /// A `final` instance field may be assigned by its own type's constructors.
    fn may_initialize(&self, declaring: TypeDefId, is_static: bool, receiver: Receiver) -> bool {
        let in_constructor = self
            .ctx
            .method
            .is_some_and(|m| self.ts.method(m).is_constructor());
        !is_static
            && in_constructor
            && declaring == self.ctx.def
            && matches!(receiver, Receiver::Implicit { outer: false } | Receiver::This)
    }

    /// Report a missing or inaccessible accessor.
    pub(crate) fn accessor_usable(&mut self, span: Span, name: &str, accessor: Option<kestrel_types::MethodId>) -> bool {
        let ts = self.ts;
        let Some(accessor) = accessor else {
            self.error(
                span,
                CompilationError::NoApplicableMethod {
                    name: name.to_string(),
                    arity: 0,
                },
            );
            return false;
        };
        let method = ts.method(accessor);
        if ts.can_access(self.ctx.def, method.declaring, method.modifiers.visibility()) {
            return true;
        }
        let from = self.type_name_of(self.ctx.def);
        self.error(
            span,
            CompilationError::InaccessibleMember {
                member: name.to_string(),
                from,
            },
        );
        false
    }

    fn index_access(&mut self, span: Span, object: &Expr, indexes: &[Expr], access: Access) -> Option<ExpressionInfo> {
        let ts = self.ts;
        let object_info = self.value(object)?;
        if let Some(element) = ts.element_type(object_info.ty) {
            if indexes.len() != 1 {
                self.error(
                    span,
                    CompilationError::NoApplicableMethod {
                        name: "this[]".to_string(),
                        arity: indexes.len(),
                    },
                );
                return None;
            }
            self.expr_to(&indexes[0], TypeId::INT)?;
            return Some(ExpressionInfo::value(element));
        }

        let args = self.check_args(indexes)?;
        let indexers = self
            .members
            .lookup_indexers(ts, self.ctx.def, object_info.ty, indexes.len() as u32);
        let candidates = indexers
            .into_iter()
            .map(|member| super::calls::Candidate::plain(ts, member))
            .collect();
        let chosen = self.select(span, "this[]", candidates, indexes, &args)?;
        let member = chosen.member;
        let (getter, setter) = match &member {
            Member::Indexer { getter, setter, .. } => (*getter, *setter),
            _ => (None, None),
        };
        if access.reads() && !self.accessor_usable(span, "this[]", getter) {
            return None;
        }
        if access.writes() {
            if setter.is_none() {
                self.error(
                    span,
                    CompilationError::ReadOnly {
                        name: "this[]".to_string(),
                    },
                );
                return None;
            }
            if !self.accessor_usable(span, "this[]", setter) {
                return None;
            }
        }
        self.check_deprecated(span, &member);
        Some(ExpressionInfo::member(member.member_type(ts), member))
    }

    // ==========================================================================
    // Assignment
    // ==========================================================================

    fn check_assign(&mut self, op: AssignOp, target: &Expr, value: &Expr) -> Option<ExpressionInfo> {
        let ts = self.ts;
        let Some(op) = op.binary_op() else {
            let target_info = self.target(target, Access::Write);
            let target_info = target_info?;
            self.expr_to(value, target_info.ty)?;
            return Some(ExpressionInfo::value(target_info.ty));
        };

        let target_info = self.target(target, Access::ReadWrite);
        let value_info = self.value(value);
        let (target_info, value_info) = (target_info?, value_info?);
        let target_ty = target_info.ty;

        if op == BinaryOp::Add && ts.is_string(target_ty) {
            if value_info.ty.is_void() {
                self.mismatch(value.span, value_info.ty, target_ty);
                return None;
            }
            return Some(ExpressionInfo::value(target_ty));
        }
        if ts.is_delegate(target_ty) && matches!(op, BinaryOp::Add | BinaryOp::Sub) {
            self.convert(value, &value_info, target_ty)?;
            return Some(ExpressionInfo::value(target_ty));
        }
        let Some(types) = binary_types(ts, op, target_ty, value_info.ty) else {
            self.invalid_binary(target.span, op, target_ty, value_info.ty);
            return None;
        };
        if cast_conversion(ts, target_ty, types.result).is_none() {
            self.mismatch(value.span, types.result, target_ty);
            return None;
        }
        Some(ExpressionInfo::value(target_ty))
    }

    // ==========================================================================
    // Operators
    // ==========================================================================

    fn check_unary(&mut self, span: Span, op: UnaryOp, operand: &Expr) -> Option<ExpressionInfo> {
        if op.is_increment() {
            return self.check_increment(span, op, op.as_str(), operand);
        }
        let ts = self.ts;
        let info = self.value(operand)?;
        let Some(types) = unary_types(ts, op, info.ty) else {
            self.error(
                span,
                CompilationError::InvalidUnaryOperand {
                    op: op.as_str(),
                    operand: ts.display(info.ty),
                },
            );
            return None;
        };
        if !info.ty.is_primitive() {
            self.mark_boxing(operand, BoxingKind::Unbox);
        }
        let constant = info
            .constant
            .as_ref()
            .and_then(|value| fold_unary(op, value, types));
        Some(match constant {
            Some(value) => ExpressionInfo::constant(types.result, value),
            None => ExpressionInfo::value(types.result),
        })
    }

    fn check_increment(&mut self, span: Span, op: UnaryOp, text: &'static str, operand: &Expr) -> Option<ExpressionInfo> {
        let ts = self.ts;
        let info = self.target(operand, Access::ReadWrite)?;
        if unary_types(ts, op, info.ty).is_none() {
            self.error(
                span,
                CompilationError::InvalidUnaryOperand {
                    op: text,
                    operand: ts.display(info.ty),
                },
            );
            return None;
        }
        Some(ExpressionInfo::value(info.ty))
    }

    fn check_binary(&mut self, span: Span, op: BinaryOp, left: &Expr, right: &Expr) -> Option<ExpressionInfo> {
        let ts = self.ts;
        let left_info = self.value(left);
        let right_info = self.value(right);
        let (left_info, right_info) = (left_info?, right_info?);
        let Some(types) = binary_types(ts, op, left_info.ty, right_info.ty) else {
            self.invalid_binary(span, op, left_info.ty, right_info.ty);
            return None;
        };
        if types.operand.is_primitive() {
            for (expr, info) in [(left, &left_info), (right, &right_info)] {
                if !info.ty.is_primitive() {
                    self.mark_boxing(expr, BoxingKind::Unbox);
                }
            }
        }
        let constant = match (&left_info.constant, &right_info.constant) {
            (Some(l), Some(r)) => fold_binary(ts, op, l, r, types),
            _ => None,
        };
        Some(match constant {
            Some(value) => ExpressionInfo::constant(types.result, value),
            None => ExpressionInfo::value(types.result),
        })
    }

    fn invalid_binary(&mut self, span: Span, op: BinaryOp, left: TypeId, right: TypeId) {
        let ts = self.ts;
        self.error(
            span,
            CompilationError::InvalidBinaryOperands {
                op: op.as_str(),
                left: ts.display(left),
                right: ts.display(right),
            },
        );
    }

    fn check_cast(&mut self, span: Span, ty: &kestrel_core::ast::TypeRef, operand: &Expr) -> Option<ExpressionInfo> {
        let ts = self.ts;
        let target = match self.resolver().resolve(ty) {
            Ok(target) => target,
            Err(error) => {
                self.error(span, error);
                return None;
            }
        };
        let info = self.value(operand)?;
        let Some(conversion) = cast_conversion(ts, target, info.ty) else {
            self.mismatch(span, info.ty, target);
            return None;
        };
        self.mark_boxing(operand, conversion.boxing());
        let constant = match (&info.constant, target.as_primitive()) {
            (Some(value), Some(kind)) if info.ty.is_primitive() => cast_constant(value, kind),
            (Some(value), None) if ts.is_string(target) && ts.is_string(info.ty) => Some(value.clone()),
            _ => None,
        };
        Some(match constant {
            Some(value) => ExpressionInfo::constant(target, value),
            None => ExpressionInfo::value(target),
        })
    }

    /// Check every argument, reporting all failures.
    pub(crate) fn check_args(&mut self, args: &[Expr]) -> Option<Vec<ExpressionInfo>> {
        let infos: Vec<Option<ExpressionInfo>> = args.iter().map(|arg| self.value(arg)).collect();
        infos.into_iter().collect()
    }
}

pub(crate) fn receiver_of(object: &Expr, info: &ExpressionInfo) -> Receiver {
    match object.kind {
        ExprKind::This => Receiver::This,
        ExprKind::Super => Receiver::Super,
        _ if info.is_type => Receiver::Type,
        _ => Receiver::Instance,
    }
}
