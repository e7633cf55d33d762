//! Emitting conversions between stack types.

use kestrel_core::{InternalError, PrimitiveKind};
use kestrel_types::{TypeId, unbox_method_name};

use super::{BodyGenerator, Result, computational};
use crate::bytecode::{MethodRef, Opcode};
use crate::conversion::{Conversion, assignment_conversion, cast_conversion, operand_conversion};

impl<'a> BodyGenerator<'a> {
    /// Convert the value on the stack from `source` to `target`.
    ///
    /// Implicit conversions are tried first so that boxing and widening pick
    /// the same path the validator accepted; casts and wrapper operands cover
    /// the rest.
    pub(crate) fn coerce(&mut self, source: TypeId, target: TypeId) -> Result<()> {
        if source == target || target.is_void() {
            return Ok(());
        }
        let ts = self.ts;
        let conversion = assignment_conversion(ts, target, source, None, true)
            .or_else(|| cast_conversion(ts, target, source))
            .or_else(|| operand_conversion(ts, target, source))
            .ok_or_else(|| {
                InternalError::other(format!(
                    "no conversion from {} to {}",
                    ts.display(source),
                    ts.display(target)
                ))
            })?;
        self.conversion(conversion, target)
    }

    pub(crate) fn conversion(&mut self, conversion: Conversion, target: TypeId) -> Result<()> {
        match conversion {
            Conversion::Identity | Conversion::Reference | Conversion::NarrowConstant { .. } => {}
            Conversion::Primitive { from, to } => self.primitive(from, to),
            Conversion::Checked => self.checkcast(target),
            Conversion::Box { kind } => self.box_value(kind)?,
            Conversion::ConvertAndBox { from, kind } => {
                self.primitive(from, kind);
                self.box_value(kind)?;
            }
            Conversion::Unbox { kind, to } => {
                self.unbox(kind)?;
                self.primitive(kind, to);
            }
            Conversion::CheckedUnbox { kind } => {
                let ts = self.ts;
                let wrapper = ts
                    .boxed_type(kind)
                    .ok_or_else(|| InternalError::other(format!("no wrapper for {}", kind)))?;
                self.checkcast(wrapper);
                self.unbox(kind)?;
            }
        }
        Ok(())
    }

    /// Cast the reference on the stack, unless `target` erases to `Object`.
    pub(crate) fn checkcast(&mut self, target: TypeId) {
        let ts = self.ts;
        let erased = ts.erasure(target);
        if ts.is_object(erased) {
            return;
        }
        let operand = self.type_operand(erased);
        self.emitter.emit_type(Opcode::Checkcast, operand);
    }

    /// Cast a value read through an erased declaration back to its use type.
    pub(crate) fn restore_erased(&mut self, declared: TypeId, used: TypeId) {
        if declared.is_primitive() || used.is_primitive() || used.is_null() {
            return;
        }
        if self.erased(declared) != self.erased(used) {
            self.checkcast(used);
        }
    }

    /// Widening or narrowing between two primitives on the stack.
    pub(crate) fn primitive(&mut self, from: PrimitiveKind, to: PrimitiveKind) {
        use PrimitiveKind::*;
        let source = from.computational();
        let widened = to.computational();
        let step = match (source, widened) {
            (Int, Long) => Some(Opcode::I2l),
            (Int, Float) => Some(Opcode::I2f),
            (Int, Double) => Some(Opcode::I2d),
            (Long, Int) => Some(Opcode::L2i),
            (Long, Float) => Some(Opcode::L2f),
            (Long, Double) => Some(Opcode::L2d),
            (Float, Int) => Some(Opcode::F2i),
            (Float, Long) => Some(Opcode::F2l),
            (Float, Double) => Some(Opcode::F2d),
            (Double, Int) => Some(Opcode::D2i),
            (Double, Long) => Some(Opcode::D2l),
            (Double, Float) => Some(Opcode::D2f),
            _ => None,
        };
        if let Some(opcode) = step {
            self.emitter.emit(opcode);
        }
        // Sub-int targets are truncated from int, unless the source already fits.
        let truncate = match to {
            Byte if from != Byte => Some(Opcode::I2b),
            Short if !matches!(from, Byte | Short) => Some(Opcode::I2s),
            Char if from != Char => Some(Opcode::I2c),
            _ => None,
        };
        if let Some(opcode) = truncate {
            self.emitter.emit(opcode);
        }
    }

    /// `Wrapper.valueOf(prim)`
    pub(crate) fn box_value(&mut self, kind: PrimitiveKind) -> Result<()> {
        let ts = self.ts;
        let wrapper = ts
            .platform()
            .wrapper(kind)
            .ok_or_else(|| InternalError::other(format!("no wrapper for {}", kind)))?;
        let owner = ts.internal_name(wrapper);
        let descriptor = format!("({})L{};", kind.descriptor(), owner);
        self.emitter
            .emit_invoke(Opcode::Invokestatic, MethodRef::new(owner, "valueOf", descriptor));
        Ok(())
    }

    /// `wrapper.kindValue()`
    pub(crate) fn unbox(&mut self, kind: PrimitiveKind) -> Result<()> {
        let ts = self.ts;
        let wrapper = ts
            .platform()
            .wrapper(kind)
            .ok_or_else(|| InternalError::other(format!("no wrapper for {}", kind)))?;
        let descriptor = format!("(){}", kind.descriptor());
        let method = MethodRef::new(ts.internal_name(wrapper), unbox_method_name(kind), descriptor);
        self.emitter.emit_invoke(Opcode::Invokevirtual, method);
        Ok(())
    }

    /// Unbox a wrapper operand so it can take part in a primitive operation.
    pub(crate) fn to_operand(&mut self, source: TypeId, operand: TypeId) -> Result<()> {
        if computational(source) == computational(operand) && source.is_primitive() {
            return Ok(());
        }
        self.coerce(source, operand)
    }
}

#[cfg(test)]
mod tests {
    use kestrel_core::PrimitiveKind;
    use kestrel_core::ast::AstBuilder;

    use super::super::test_support::{generate, listing};
    use crate::bytecode::Opcode;

    #[test]
    fn locals_widen_and_box_on_assignment() {
        let b = AstBuilder::new();
        let code = generate(&b, b.int_type(), vec![
            b.local(b.int_type(), "i", Some(b.int(7))),
            b.local(b.prim(PrimitiveKind::Long), "l", Some(b.ident("i"))),
            b.local(b.named("Object"), "o", Some(b.ident("i"))),
            b.expr_stmt(b.call(b.member(b.ident("o"), "hashCode"), vec![])),
            b.ret(Some(b.cast(b.int_type(), b.ident("l")))),
        ]);
        let text = listing(&code);
        assert!(text.contains(&"i2l".to_string()), "{:?}", text);
        assert!(text.contains(&"l2i".to_string()), "{:?}", text);
        assert!(
            text.iter().any(|i| i.starts_with("invokestatic kestrel/lang/Integer.valueOf(I)")),
            "{:?}",
            text
        );
    }

    #[test]
    fn explicit_casts_truncate_through_int() {
        let b = AstBuilder::new();
        let code = generate(&b, b.prim(PrimitiveKind::Byte), vec![
            b.local(b.prim(PrimitiveKind::Long), "l", Some(b.long(300))),
            b.ret(Some(b.cast(b.prim(PrimitiveKind::Byte), b.ident("l")))),
        ]);
        let ops = code.opcodes();
        let at = ops.iter().position(|&op| op == Opcode::L2i).expect("l2i");
        assert_eq!(ops[at + 1], Opcode::I2b);
        assert_eq!(ops.last(), Some(&Opcode::Ireturn));
    }
}
