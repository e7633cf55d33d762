//! Conditions compiled to jumps.

use kestrel_core::ast::{BinaryOp, Expr, ExprKind, Literal, UnaryOp};
use kestrel_core::InternalError;
use kestrel_types::{ConstantValue, TypeId};

use super::{BodyGenerator, Result, computational};
use crate::bytecode::{Label, Opcode};
use crate::operators::binary_types;

impl<'a> BodyGenerator<'a> {
    /// Jump to `target` when `cond` evaluates to `when`; fall through otherwise.
    pub(crate) fn branch(&mut self, cond: &Expr, target: Label, when: bool) -> Result<()> {
        let info = self.info(cond)?;
        if let Some(ConstantValue::Bool(value)) = info.constant {
            if value == when {
                self.emitter.emit_jump(Opcode::Goto, target);
            }
            return Ok(());
        }
        match &cond.kind {
            ExprKind::Unary {
                op: UnaryOp::LogicalNot,
                operand,
            } => self.branch(operand, target, !when),
            ExprKind::Binary { op, left, right } if op.is_logical() => {
                // `a && b` jumps when both hold; `a || b` when either does.
                let short_circuit = *op == BinaryOp::LogicalOr;
                if short_circuit == when {
                    self.branch(left, target, when)?;
                    self.branch(right, target, when)
                } else {
                    let skip = self.emitter.new_label();
                    self.branch(left, skip, !when)?;
                    self.branch(right, target, when)?;
                    self.emitter.bind(skip);
                    Ok(())
                }
            }
            ExprKind::Binary { op, left, right } if op.is_comparison() => {
                self.compare(*op, left, right, target, when)
            }
            _ => {
                self.expr_to(cond, TypeId::BOOLEAN)?;
                let opcode = if when { Opcode::Ifne } else { Opcode::Ifeq };
                self.emitter.emit_jump(opcode, target);
                Ok(())
            }
        }
    }

    /// Push a condition as `0` or `1`.
    pub(crate) fn bool_value(&mut self, cond: &Expr) -> Result<()> {
        let when_false = self.emitter.new_label();
        let end = self.emitter.new_label();
        self.branch(cond, when_false, false)?;
        self.emitter.emit_int(1);
        self.emitter.emit_jump(Opcode::Goto, end);
        self.emitter.bind(when_false);
        self.emitter.emit_int(0);
        self.emitter.bind(end);
        Ok(())
    }

    fn compare(&mut self, op: BinaryOp, left: &Expr, right: &Expr, target: Label, when: bool) -> Result<()> {
        let ts = self.ts;
        let left_ty = self.info(left)?.ty;
        let right_ty = self.info(right)?.ty;
        let types = binary_types(ts, op, left_ty, right_ty).ok_or_else(|| InternalError::UnsupportedOperator {
            op: op.as_str(),
            ty: ts.display(left_ty),
        })?;
        let operand = types.operand;

        if !operand.is_primitive() {
            // `x == null` tests the other side directly.
            let other = match (is_null_literal(left), is_null_literal(right)) {
                (_, true) => Some(left),
                (true, _) => Some(right),
                _ => None,
            };
            let opcode = match other {
                Some(other) => {
                    self.expr(other)?;
                    if op == BinaryOp::Equal { Opcode::Ifnull } else { Opcode::Ifnonnull }
                }
                None => {
                    self.expr(left)?;
                    self.expr(right)?;
                    if op == BinaryOp::Equal { Opcode::IfAcmpeq } else { Opcode::IfAcmpne }
                }
            };
            return self.jump_when(opcode, target, when);
        }

        self.expr_to(left, operand)?;
        self.expr_to(right, operand)?;
        let opcode = match computational(operand) {
            TypeId::INT => int_compare(op),
            wide => {
                // NaN makes `<` and `<=` false, so those use the `g` variant.
                let nan_is_greater = matches!(op, BinaryOp::Less | BinaryOp::LessEqual);
                let cmp = match wide {
                    TypeId::LONG => Opcode::Lcmp,
                    TypeId::FLOAT if nan_is_greater => Opcode::Fcmpg,
                    TypeId::FLOAT => Opcode::Fcmpl,
                    TypeId::DOUBLE if nan_is_greater => Opcode::Dcmpg,
                    TypeId::DOUBLE => Opcode::Dcmpl,
                    _ => {
                        return Err(InternalError::UnsupportedOperator {
                            op: op.as_str(),
                            ty: ts.display(operand),
                        });
                    }
                };
                self.emitter.emit(cmp);
                zero_compare(op)
            }
        };
        self.jump_when(opcode, target, when)
    }

    fn jump_when(&mut self, opcode: Opcode, target: Label, when: bool) -> Result<()> {
        let opcode = if when {
            opcode
        } else {
            opcode
                .negate()
                .ok_or_else(|| InternalError::other(format!("{} has no negation", opcode.mnemonic())))?
        };
        self.emitter.emit_jump(opcode, target);
        Ok(())
    }
}

fn is_null_literal(expr: &Expr) -> bool {
    matches!(expr.kind, ExprKind::Literal(Literal::Null))
}

fn int_compare(op: BinaryOp) -> Opcode {
    match op {
        BinaryOp::Equal => Opcode::IfIcmpeq,
        BinaryOp::NotEqual => Opcode::IfIcmpne,
        BinaryOp::Less => Opcode::IfIcmplt,
        BinaryOp::LessEqual => Opcode::IfIcmple,
        BinaryOp::Greater => Opcode::IfIcmpgt,
        _ => Opcode::IfIcmpge,
    }
}

fn zero_compare(op: BinaryOp) -> Opcode {
    match op {
        BinaryOp::Equal => Opcode::Ifeq,
        BinaryOp::NotEqual => Opcode::Ifne,
        BinaryOp::Less => Opcode::Iflt,
        BinaryOp::LessEqual => Opcode::Ifle,
        BinaryOp::Greater => Opcode::Ifgt,
        _ => Opcode::Ifge,
    }
}

#[cfg(test)]
mod tests {
    use kestrel_core::PrimitiveKind;
    use kestrel_core::ast::{AstBuilder, BinaryOp, UnaryOp};

    use super::super::test_support::{generate, listing};
    use crate::bytecode::Opcode;

    #[test]
    fn comparisons_jump_on_the_negated_condition() {
        let b = AstBuilder::new();
        let code = generate(&b, b.int_type(), vec![
            b.local(b.int_type(), "x", Some(b.int(9))),
            b.if_stmt(
                b.binary(BinaryOp::Less, b.ident("x"), b.int(10)),
                b.ret(Some(b.int(1))),
                None,
            ),
            b.ret(Some(b.int(0))),
        ]);
        assert_eq!(listing(&code)[2..5], [
            "iload 1".to_string(),
            "bipush 10".to_string(),
            "if_icmpge L0".to_string(),
        ]);
    }

    #[test]
    fn floating_less_than_uses_the_g_compare() {
        let b = AstBuilder::new();
        let code = generate(&b, b.prim(PrimitiveKind::Boolean), vec![
            b.local(b.prim(PrimitiveKind::Double), "d", Some(b.double(0.5))),
            b.ret(Some(b.binary(BinaryOp::Less, b.ident("d"), b.double(1.5)))),
        ]);
        let ops = code.opcodes();
        assert!(ops.contains(&Opcode::Dcmpg));
        assert!(ops.contains(&Opcode::Ifge));
    }

    #[test]
    fn logical_operators_short_circuit() {
        let b = AstBuilder::new();
        let code = generate(&b, b.void_type(), vec![
            b.local(b.prim(PrimitiveKind::Boolean), "p", Some(b.boolean(true))),
            b.local(b.prim(PrimitiveKind::Boolean), "q", Some(b.boolean(false))),
            b.if_stmt(
                b.binary(
                    BinaryOp::LogicalOr,
                    b.ident("p"),
                    b.unary(UnaryOp::LogicalNot, b.ident("q")),
                ),
                b.expr_stmt(b.assign(b.ident("p"), b.boolean(false))),
                None,
            ),
        ]);
        let ops = code.opcodes();
        // p jumps into the body when true; !q falls out when q is true.
        assert!(ops.contains(&Opcode::Ifne));
        assert_eq!(ops.iter().filter(|&&op| op == Opcode::Ifne).count(), 2);
        assert!(!ops.contains(&Opcode::Ixor));
    }

    #[test]
    fn null_checks_use_ifnull() {
        let b = AstBuilder::new();
        let code = generate(&b, b.prim(PrimitiveKind::Boolean), vec![
            b.local(b.named("Object"), "o", Some(b.null())),
            b.ret(Some(b.binary(BinaryOp::NotEqual, b.ident("o"), b.null()))),
        ]);
        let ops = code.opcodes();
        assert!(ops.contains(&Opcode::Ifnull));
        assert!(!ops.contains(&Opcode::IfAcmpne));
    }
}
