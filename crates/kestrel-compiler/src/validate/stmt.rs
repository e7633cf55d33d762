//! Statement checking.

use kestrel_core::ast::{Block, Expr, ExprKind, Stmt, StmtKind, SwitchLabel, SwitchSection, VarDecl};
use kestrel_core::{CompilationError, Modifiers, PrimitiveKind, Span};
use kestrel_types::{ConstantValue, Member, TypeDefId, TypeId, TypeKind};

use super::BodyChecker;
use crate::constant_eval::convert_constant;
use crate::expr_info::ExpressionInfo;
use crate::operators::primitive_of;

/// What a switch selects on.
#[derive(Debug, Clone, Copy)]
enum Selector {
    /// `int` and narrower integral types, labels stored as `int`.
    Integral(TypeId),
    String,
    Enum(TypeDefId),
}

impl<'a> BodyChecker<'a> {
    pub(crate) fn block(&mut self, block: &Block) {
        self.scopes.push();
        for stmt in &block.stmts {
            self.stmt(stmt);
        }
        self.scopes.pop();
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Block(block) => self.block(block),
            StmtKind::VarDecl(decl) => self.var_decl(stmt, decl),
            StmtKind::Expr(expr) => {
                self.value(expr);
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.expr_to(condition, TypeId::BOOLEAN);
                self.nested(then_branch);
                if let Some(else_branch) = else_branch {
                    self.nested(else_branch);
                }
            }
            StmtKind::While { condition, body } => {
                self.expr_to(condition, TypeId::BOOLEAN);
                self.nested(body);
            }
            StmtKind::Switch { selector, sections } => self.switch(selector, sections),
            StmtKind::Return(value) => self.ret(stmt.span, value.as_ref()),
            StmtKind::Break | StmtKind::Continue | StmtKind::Empty => {}
        }
    }

    /// A branch or loop body gets its own scope even without braces.
    fn nested(&mut self, stmt: &Stmt) {
        self.scopes.push();
        self.stmt(stmt);
        self.scopes.pop();
    }

    fn var_decl(&mut self, stmt: &Stmt, decl: &VarDecl) {
        let ts = self.ts;
        let resolved = match self.resolver().resolve(&decl.ty) {
            Ok(ty) if ty.is_void() => {
                self.mismatch(stmt.span, ty, ts.object_type());
                None
            }
            Ok(ty) => Some(ty),
            Err(error) => {
                self.error(stmt.span, error);
                None
            }
        };
        let ty = resolved.unwrap_or_else(|| ts.object_type());
        let id = self.locals.declare(&decl.name, ty, stmt.span, stmt.id, false);
        self.tables.set_local(stmt.id, id);
        if let Err(error) = self.scopes.bind(&decl.name, id) {
            self.error(stmt.span, error);
        }
        if let Some(init) = &decl.init {
            match resolved {
                Some(ty) => {
                    self.expr_to(init, ty);
                }
                None => {
                    self.value(init);
                }
            }
        }
    }

    fn ret(&mut self, span: Span, value: Option<&Expr>) {
        let ts = self.ts;
        let expected = self.ctx.return_type;
        match (value, expected.is_void()) {
            (None, true) => {}
            (Some(value), false) => {
                self.expr_to(value, expected);
            }
            (None, false) => {
                let message = format!("a value of type '{}' must be returned", ts.display(expected));
                self.error(span, CompilationError::InvalidReturn { message });
            }
            (Some(value), true) => {
                self.check(value);
                let message = "a method returning void cannot return a value".to_string();
                self.error(span, CompilationError::InvalidReturn { message });
            }
        }
    }

    // ==========================================================================
    // Switch
    // ==========================================================================

    fn switch(&mut self, selector: &Expr, sections: &[SwitchSection]) {
        let kind = self.selector(selector);
        let mut seen: Vec<ConstantValue> = Vec::new();
        let mut has_default = false;
        for section in sections {
            for label in &section.labels {
                match label {
                    SwitchLabel::Default => {
                        if has_default {
                            self.error(section.span, CompilationError::DuplicateCaseLabel {
                                value: "default".to_string(),
                            });
                        }
                        has_default = true;
                    }
                    SwitchLabel::Case(expr) => {
                        let Some(kind) = kind else {
                            self.check(expr);
                            continue;
                        };
                        if let Some(value) = self.case_label(expr, kind) {
                            if seen.contains(&value) {
                                self.error(expr.span, CompilationError::DuplicateCaseLabel {
                                    value: value.to_string(),
                                });
                            } else {
                                seen.push(value);
                            }
                        }
                    }
                }
            }
            self.scopes.push();
            for stmt in &section.stmts {
                self.stmt(stmt);
            }
            self.scopes.pop();
        }
    }

    fn selector(&mut self, selector: &Expr) -> Option<Selector> {
        let ts = self.ts;
        let info = self.value(selector)?;
        let integral = primitive_of(ts, info.ty).filter(|kind| {
            matches!(
                kind,
                PrimitiveKind::Int | PrimitiveKind::Short | PrimitiveKind::Byte | PrimitiveKind::Char
            )
        });
        if let Some(kind) = integral {
            let ty = TypeId::primitive(kind);
            self.convert(selector, &info, ty)?;
            return Some(Selector::Integral(ty));
        }
        if ts.is_string(info.ty) {
            return Some(Selector::String);
        }
        if let Some(def) = ts.def_of(info.ty).filter(|&d| ts.def(d).kind == TypeKind::Enum) {
            return Some(Selector::Enum(def));
        }
        self.error(selector.span, CompilationError::InvalidSwitchType { ty: ts.display(info.ty) });
        None
    }

    /// Check a case label and record its constant, converted to the selector type.
    fn case_label(&mut self, label: &Expr, kind: Selector) -> Option<ConstantValue> {
        let ts = self.ts;
        let (value, info) = match kind {
            Selector::Enum(def) => {
                let field = match &label.kind {
                    ExprKind::Ident { name, type_args } if type_args.is_empty() => ts
                        .def(def)
                        .fields
                        .iter()
                        .copied()
                        .find(|&f| ts.field(f).name == *name && ts.field(f).modifiers.contains(Modifiers::ENUM)),
                    _ => None,
                };
                let Some(field) = field else {
                    let name = match &label.kind {
                        ExprKind::Ident { name, .. } => name.clone(),
                        kind => kind.describe().to_string(),
                    };
                    self.error(label.span, CompilationError::UnresolvedName { name });
                    return None;
                };
                let value = ConstantValue::Enum {
                    ty: def,
                    name: ts.field(field).name.clone(),
                };
                let owner = ts.raw_type(def);
                let mut info = ExpressionInfo::member(owner, Member::Field { id: field, owner });
                info.constant = Some(value.clone());
                (value, info)
            }
            Selector::Integral(_) | Selector::String => {
                let target = match kind {
                    Selector::Integral(ty) => ty,
                    _ => ts.string_type(),
                };
                let info = self.value(label)?;
                let Some(constant) = info.constant.clone() else {
                    self.error(label.span, CompilationError::TypeMismatch {
                        from: "non-constant expression".to_string(),
                        to: ts.display(target),
                    });
                    return None;
                };
                let value = match convert_constant(ts, &constant, info.ty, target) {
                    Ok(value) => value,
                    Err(error) => {
                        self.error(label.span, error);
                        return None;
                    }
                };
                (value.clone(), ExpressionInfo::constant(target, value))
            }
        };
        self.tables.set_expression(label.id, info);
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{define, method_class};
    use crate::passes::CodeValidationPass;
    use kestrel_core::ast::{AstBuilder, SwitchLabel};

    fn error_ids(session: &crate::session::CompilationSession) -> Vec<u32> {
        session.diagnostics.errors().map(|d| d.id).collect()
    }

    #[test]
    fn duplicate_case_labels_are_rejected() {
        let b = AstBuilder::new();
        let switch = b.switch_stmt(
            b.ident("x"),
            vec![
                b.section(vec![SwitchLabel::Case(b.int(1))], vec![b.break_stmt()]),
                b.section(vec![SwitchLabel::Case(b.int(1)), SwitchLabel::Default], vec![b.break_stmt()]),
            ],
        );
        let class = method_class(&b, b.void_type(), vec![b.local(b.int_type(), "x", Some(b.int(0))), switch]);
        let mut session = define(vec![b.unit("T.ks", Some("app"), vec![class])]);
        CodeValidationPass::new(&mut session).run();
        assert_eq!(error_ids(&session), vec![36]);
    }

    #[test]
    fn switch_needs_an_integral_string_or_enum_selector() {
        let b = AstBuilder::new();
        let switch = b.switch_stmt(b.double(1.5), vec![b.section(vec![SwitchLabel::Default], vec![])]);
        let class = method_class(&b, b.void_type(), vec![switch]);
        let mut session = define(vec![b.unit("T.ks", Some("app"), vec![class])]);
        CodeValidationPass::new(&mut session).run();
        assert_eq!(error_ids(&session), vec![40]);
    }

    #[test]
    fn enum_labels_name_constants() {
        let b = AstBuilder::new();
        let color = b.enum_type("Color", &["RED", "GREEN"]);
        let switch = b.switch_stmt(
            b.ident("c"),
            vec![
                b.section(vec![SwitchLabel::Case(b.ident("RED"))], vec![b.ret(Some(b.int(1)))]),
                b.section(vec![SwitchLabel::Case(b.ident("BLUE"))], vec![b.ret(Some(b.int(2)))]),
            ],
        );
        let class = method_class(&b, b.int_type(), vec![
            b.local(b.named("Color"), "c", Some(b.member(b.ident("Color"), "GREEN"))),
            switch,
            b.ret(Some(b.int(0))),
        ]);
        let mut session = define(vec![b.unit("T.ks", Some("app"), vec![color, class])]);
        CodeValidationPass::new(&mut session).run();
        assert_eq!(error_ids(&session), vec![21]);
    }

    #[test]
    fn return_must_match_the_method() {
        let b = AstBuilder::new();
        let class = method_class(&b, b.void_type(), vec![b.ret(Some(b.int(1)))]);
        let mut session = define(vec![b.unit("T.ks", Some("app"), vec![class])]);
        CodeValidationPass::new(&mut session).run();
        assert_eq!(error_ids(&session), vec![35]);
    }

    #[test]
    fn locals_cannot_shadow_enclosing_locals() {
        let b = AstBuilder::new();
        let inner = b.block_stmt(vec![b.local(b.int_type(), "x", Some(b.int(2)))]);
        let class = method_class(&b, b.void_type(), vec![b.local(b.int_type(), "x", Some(b.int(1))), inner]);
        let mut session = define(vec![b.unit("T.ks", Some("app"), vec![class])]);
        CodeValidationPass::new(&mut session).run();
        assert_eq!(error_ids(&session), vec![29]);
    }
}
