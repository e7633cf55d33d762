//! Statements.

use kestrel_core::ast::{Block, Expr, ExprKind, Stmt, StmtKind, SwitchLabel, SwitchSection, VarDecl};
use kestrel_core::{InternalError, Modifiers};
use kestrel_types::{ConstantValue, Member, TypeDefId, TypeId, TypeKind};
use tracing::trace;

use super::{BodyGenerator, Result, return_opcode};
use crate::bytecode::{Label, Opcode, SwitchTable};
use crate::operators::primitive_of;

impl<'a> BodyGenerator<'a> {
    /// A method or accessor body; void bodies get a trailing `return`.
    pub fn method_body(&mut self, block: &Block) -> Result<()> {
        self.block(block)?;
        if self.emitter.is_reachable() {
            if !self.return_type.is_void() {
                return Err(InternalError::other("non-void body can complete normally"));
            }
            self.emitter.emit(Opcode::Return);
        }
        Ok(())
    }

    pub(crate) fn block(&mut self, block: &Block) -> Result<()> {
        for stmt in &block.stmts {
            self.stmt(stmt)?;
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<()> {
        // Dead code after a jump is dropped; validation already warned.
        if !self.emitter.is_reachable() {
            trace!(node = stmt.id.0, "skipping unreachable statement");
            return Ok(());
        }
        match &stmt.kind {
            StmtKind::Block(block) => self.block(block)?,
            StmtKind::VarDecl(decl) => self.var_decl(stmt, decl)?,
            StmtKind::Expr(expr) => self.expr_stmt(expr)?,
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => self.if_stmt(condition, then_branch, else_branch.as_deref())?,
            StmtKind::While { condition, body } => self.while_stmt(condition, body)?,
            StmtKind::Switch { selector, sections } => self.switch(selector, sections)?,
            StmtKind::Break => {
                let target = self
                    .jumps
                    .break_target()
                    .ok_or_else(|| InternalError::other("break outside a loop or switch"))?;
                self.emitter.emit_jump(Opcode::Goto, target);
            }
            StmtKind::Continue => {
                let target = self
                    .jumps
                    .continue_target()
                    .ok_or_else(|| InternalError::other("continue outside a loop"))?;
                self.emitter.emit_jump(Opcode::Goto, target);
            }
            StmtKind::Return(value) => {
                if let Some(value) = value {
                    self.expr_to(value, self.return_type)?;
                }
                self.emitter.emit(return_opcode(self.return_type));
            }
            StmtKind::Empty => {}
        }
        self.release_temps();
        Ok(())
    }

    fn var_decl(&mut self, stmt: &Stmt, decl: &VarDecl) -> Result<()> {
        let id = self
            .tables
            .local(stmt.id)
            .ok_or(InternalError::MissingBuilder { node: stmt.id.0 })?;
        let Some(init) = &decl.init else {
            return Ok(());
        };
        let ty = self.local_type(id)?;
        match self.slots.get(id.index()).copied().flatten() {
            Some(slot) => {
                self.expr_to(init, ty)?;
                self.store(ty, slot);
            }
            None => {
                // Unused local: keep the initializer's side effects.
                let value = self.expr(init)?;
                self.pop(value);
            }
        }
        Ok(())
    }

    fn expr_stmt(&mut self, expr: &Expr) -> Result<()> {
        match &expr.kind {
            ExprKind::Assign { .. } | ExprKind::Postfix { .. } => self.update(expr, false),
            ExprKind::Unary { op, .. } if op.is_increment() => self.update(expr, false),
            _ => {
                let ty = self.expr(expr)?;
                self.pop(ty);
                Ok(())
            }
        }
    }

    fn if_stmt(&mut self, condition: &Expr, then_branch: &Stmt, else_branch: Option<&Stmt>) -> Result<()> {
        let otherwise = self.emitter.new_label();
        self.branch(condition, otherwise, false)?;
        self.stmt(then_branch)?;
        match else_branch {
            Some(else_branch) => {
                let end = self.emitter.new_label();
                if self.emitter.is_reachable() {
                    self.emitter.emit_jump(Opcode::Goto, end);
                }
                self.emitter.bind(otherwise);
                self.stmt(else_branch)?;
                self.emitter.bind(end);
            }
            None => self.emitter.bind(otherwise),
        }
        Ok(())
    }

    fn while_stmt(&mut self, condition: &Expr, body: &Stmt) -> Result<()> {
        let start = self.emitter.new_label();
        let end = self.emitter.new_label();
        self.emitter.bind(start);
        self.branch(condition, end, false)?;
        self.jumps.enter_loop(end, start);
        self.stmt(body)?;
        self.jumps.exit();
        if self.emitter.is_reachable() {
            self.emitter.emit_jump(Opcode::Goto, start);
        }
        self.emitter.bind(end);
        Ok(())
    }

    // ==========================================================================
    // Switch
    // ==========================================================================

    fn switch(&mut self, selector: &Expr, sections: &[SwitchSection]) -> Result<()> {
        let ts = self.ts;
        let end = self.emitter.new_label();
        let labels: Vec<Label> = sections.iter().map(|_| self.emitter.new_label()).collect();
        let default = sections
            .iter()
            .position(|s| s.labels.iter().any(|l| matches!(l, SwitchLabel::Default)))
            .map_or(end, |i| labels[i]);
        let cases = sections
            .iter()
            .zip(&labels)
            .flat_map(|(section, &label)| {
                section.labels.iter().filter_map(move |l| match l {
                    SwitchLabel::Case(expr) => Some((expr, label)),
                    SwitchLabel::Default => None,
                })
            })
            .collect::<Vec<_>>();

        let selector_ty = self.info(selector)?.ty;
        if ts.is_string(selector_ty) {
            self.string_dispatch(selector, &cases, default)?;
        } else if let Some(def) = ts.def_of(selector_ty).filter(|&d| ts.def(d).kind == TypeKind::Enum) {
            self.expr(selector)?;
            let ordinal = self.find_method(ts.platform().enum_base, "ordinal", &[])?;
            self.invoke(ordinal, false);
            let mut table = Vec::with_capacity(cases.len());
            for &(expr, label) in &cases {
                table.push((self.enum_ordinal(def, expr)?, label));
            }
            self.table_switch(table, default);
        } else {
            if primitive_of(ts, selector_ty).is_none() {
                return Err(InternalError::other(format!("cannot switch on {}", ts.display(selector_ty))));
            }
            self.expr_to(selector, TypeId::INT)?;
            let mut table = Vec::with_capacity(cases.len());
            for &(expr, label) in &cases {
                let key = self
                    .info(expr)?
                    .constant
                    .as_ref()
                    .and_then(ConstantValue::as_i64)
                    .and_then(|v| i32::try_from(v).ok())
                    .ok_or_else(|| InternalError::other("case label is not an int constant"))?;
                table.push((key, label));
            }
            self.table_switch(table, default);
        }

        self.jumps.enter_switch(end);
        for (section, &label) in sections.iter().zip(&labels) {
            self.emitter.bind(label);
            for stmt in &section.stmts {
                self.stmt(stmt)?;
            }
            // Sections never fall through.
            if self.emitter.is_reachable() {
                self.emitter.emit_jump(Opcode::Goto, end);
            }
        }
        self.jumps.exit();
        self.emitter.bind(end);
        Ok(())
    }

    fn table_switch(&mut self, mut cases: Vec<(i32, Label)>, default: Label) {
        cases.sort_by_key(|&(key, _)| key);
        self.emitter.emit_switch(SwitchTable { default, cases });
    }

    /// `"case".equals(selector)` per label; a null selector reaches the default.
    fn string_dispatch(&mut self, selector: &Expr, cases: &[(&Expr, Label)], default: Label) -> Result<()> {
        let ts = self.ts;
        let string = ts.string_type();
        self.expr_to(selector, string)?;
        let temp = self.temp(string);
        self.store(string, temp);
        let equals = self.find_method(ts.platform().object, "equals", &[ts.object_type()])?;
        for &(expr, label) in cases {
            let Some(ConstantValue::String(text)) = &self.info(expr)?.constant else {
                return Err(InternalError::other("case label is not a string constant"));
            };
            self.emitter.emit_string(text);
            self.load(string, temp);
            self.invoke(equals, false);
            self.emitter.emit_jump(Opcode::Ifne, label);
        }
        self.emitter.emit_jump(Opcode::Goto, default);
        Ok(())
    }

    /// Declaration index of the enum constant named by a case label.
    fn enum_ordinal(&self, def: TypeDefId, label: &Expr) -> Result<i32> {
        let ts = self.ts;
        let Some(Member::Field { id, .. }) = &self.info(label)?.member else {
            return Err(InternalError::other("enum case label is not a constant"));
        };
        ts.def(def)
            .fields
            .iter()
            .filter(|&&f| ts.field(f).modifiers.contains(Modifiers::ENUM))
            .position(|&f| f == *id)
            .and_then(|i| i32::try_from(i).ok())
            .ok_or_else(|| InternalError::other(format!("{} is not a constant of the enum", ts.field(*id).name)))
    }
}

#[cfg(test)]
mod tests {
    use kestrel_core::ast::{AssignOp, AstBuilder, BinaryOp, MemberDecl, PostfixOp, SwitchLabel};

    use super::super::test_support::{generate, generate_in, listing};
    use crate::bytecode::{Opcode, Operand};

    #[test]
    fn while_loops_test_at_the_top() {
        let b = AstBuilder::new();
        let code = generate(&b, b.int_type(), vec![
            b.local(b.int_type(), "i", Some(b.int(0))),
            b.local(b.int_type(), "sum", Some(b.int(0))),
            b.while_stmt(
                b.binary(BinaryOp::Less, b.ident("i"), b.int(10)),
                b.block_stmt(vec![
                    b.expr_stmt(b.compound(AssignOp::AddAssign, b.ident("sum"), b.ident("i"))),
                    b.expr_stmt(b.postfix(PostfixOp::PostInc, b.ident("i"))),
                ]),
            ),
            b.ret(Some(b.ident("sum"))),
        ]);
        let text = listing(&code);
        assert_eq!(text[4..7], [
            "iload 1".to_string(),
            "bipush 10".to_string(),
            "if_icmpge L1".to_string(),
        ]);
        assert!(text.contains(&"iinc 1 1".to_string()));
        assert!(text.contains(&"goto L0".to_string()));
        assert_eq!(code.label_position(crate::bytecode::Label(0)), Some(4));
    }

    #[test]
    fn integral_switches_sort_their_keys() {
        let b = AstBuilder::new();
        let code = generate(&b, b.int_type(), vec![
            b.local(b.int_type(), "k", Some(b.int(2))),
            b.switch_stmt(b.ident("k"), vec![
                b.section(vec![SwitchLabel::Case(b.int(3))], vec![b.ret(Some(b.int(30)))]),
                b.section(vec![SwitchLabel::Case(b.int(1)), SwitchLabel::Case(b.int(2))], vec![
                    b.break_stmt(),
                ]),
                b.section(vec![SwitchLabel::Default], vec![b.ret(Some(b.int(-1)))]),
            ]),
            b.ret(Some(b.int(0))),
        ]);
        let switch = code
            .instructions
            .iter()
            .find(|i| i.opcode == Opcode::Tableswitch)
            .expect("tableswitch");
        let Operand::Switch(table) = &switch.operand else {
            panic!("switch operand");
        };
        let keys: Vec<i32> = table.cases.iter().map(|&(key, _)| key).collect();
        assert_eq!(keys, vec![1, 2, 3]);
        assert_eq!(table.cases[0].1, table.cases[1].1);
    }

    #[test]
    fn string_switches_compare_with_equals() {
        let b = AstBuilder::new();
        let code = generate(&b, b.int_type(), vec![
            b.local(b.named("String"), "s", Some(b.string("b"))),
            b.switch_stmt(b.ident("s"), vec![
                b.section(vec![SwitchLabel::Case(b.string("a"))], vec![b.ret(Some(b.int(1)))]),
                b.section(vec![SwitchLabel::Case(b.string("b"))], vec![b.ret(Some(b.int(2)))]),
            ]),
            b.ret(Some(b.int(0))),
        ]);
        let text = listing(&code);
        let equals = text
            .iter()
            .filter(|i| *i == "invokevirtual kestrel/lang/Object.equals(Lkestrel/lang/Object;)Z")
            .count();
        assert_eq!(equals, 2);
        assert_eq!(code.max_locals, 3);
    }

    #[test]
    fn enum_switches_use_declaration_order() {
        let b = AstBuilder::new();
        let color = b.enum_type("Color", &["RED", "GREEN", "BLUE"]);
        let mut class = b.class("T");
        class.members.push(MemberDecl::Method(b.method(
            "run",
            b.int_type(),
            vec![b.param(b.named("Color"), "c")],
            Some(b.block(vec![
                b.switch_stmt(b.ident("c"), vec![b.section(
                    vec![SwitchLabel::Case(b.ident("BLUE"))],
                    vec![b.ret(Some(b.int(1)))],
                )]),
                b.ret(Some(b.int(0))),
            ])),
        )));
        class.members.push(MemberDecl::Type(color));
        let code = generate_in(&b, class, "run");
        let text = listing(&code);
        assert!(text.contains(&"invokevirtual kestrel/lang/Enum.ordinal()I".to_string()));
        let switch = code
            .instructions
            .iter()
            .find(|i| matches!(i.opcode, Opcode::Tableswitch | Opcode::Lookupswitch))
            .expect("switch");
        let Operand::Switch(table) = &switch.operand else {
            panic!("switch operand");
        };
        assert_eq!(table.cases.iter().map(|&(k, _)| k).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn unreachable_statements_are_dropped() {
        let b = AstBuilder::new();
        let code = generate(&b, b.int_type(), vec![b.ret(Some(b.int(1))), b.ret(Some(b.int(2)))]);
        assert_eq!(listing(&code), vec!["iconst_1", "ireturn"]);
    }
}
