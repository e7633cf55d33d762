//! String concatenation through `StringBuilder`.

use kestrel_core::ast::{BinaryOp, Expr, ExprKind};
use kestrel_types::TypeId;

use super::{BodyGenerator, Result};
use crate::bytecode::Opcode;

impl<'a> BodyGenerator<'a> {
    /// `a + b + c` on strings: one builder appends every operand in order.
    pub(crate) fn concat(&mut self, expr: &Expr) -> Result<()> {
        let mut operands = Vec::new();
        self.flatten(expr, &mut operands)?;
        self.new_builder(None)?;
        for operand in operands {
            self.append(operand)?;
        }
        self.builder_to_string()
    }

    /// Concatenate `rhs` onto the string value on top of the stack.
    pub(crate) fn concat_onto(&mut self, rhs: &Expr) -> Result<()> {
        let ts = self.ts;
        let string = ts.platform().string;
        let object = ts.object_type();
        // `String.valueOf` turns a null left side into "null".
        let value_of = self.find_method(string, "valueOf", &[object])?;
        self.invoke(value_of, false);
        self.new_builder(Some(ts.string_type()))?;
        let mut operands = Vec::new();
        self.flatten(rhs, &mut operands)?;
        for operand in operands {
            self.append(operand)?;
        }
        self.builder_to_string()
    }

    /// Collect the operands of nested non-constant string additions.
    fn flatten<'e>(&self, expr: &'e Expr, out: &mut Vec<&'e Expr>) -> Result<()> {
        let info = self.info(expr)?;
        match &expr.kind {
            ExprKind::Binary {
                op: BinaryOp::Add,
                left,
                right,
            } if info.constant.is_none() && self.ts.is_string(info.ty) => {
                self.flatten(left, out)?;
                self.flatten(right, out)
            }
            _ => {
                out.push(expr);
                Ok(())
            }
        }
    }

    /// `new StringBuilder()`, or `new StringBuilder(s)` consuming the string
    /// on top of the stack when `initial` is given.
    fn new_builder(&mut self, initial: Option<TypeId>) -> Result<()> {
        let ts = self.ts;
        let builder = ts.platform().string_builder;
        let params: Vec<TypeId> = initial.into_iter().collect();
        let init = self.find_method(builder, "<init>", &params)?;
        self.emitter.emit_type(Opcode::New, ts.internal_name(builder));
        if initial.is_some() {
            // [s, sb] → [sb, sb, s]
            self.emitter.emit(Opcode::DupX1);
            self.emitter.emit(Opcode::Swap);
        } else {
            self.emitter.emit(Opcode::Dup);
        }
        self.invoke(init, false);
        Ok(())
    }

    fn append(&mut self, operand: &Expr) -> Result<()> {
        let ts = self.ts;
        let ty = self.info(operand)?.ty;
        let param = match ty {
            TypeId::BYTE | TypeId::SHORT => TypeId::INT,
            TypeId::BOOLEAN | TypeId::CHAR | TypeId::INT | TypeId::LONG | TypeId::FLOAT | TypeId::DOUBLE => ty,
            _ if ts.is_string(ty) => ts.string_type(),
            _ => ts.object_type(),
        };
        self.expr_to(operand, param)?;
        let append = self.find_method(ts.platform().string_builder, "append", &[param])?;
        self.invoke(append, false);
        Ok(())
    }

    fn builder_to_string(&mut self) -> Result<()> {
        let to_string = self.find_method(self.ts.platform().string_builder, "toString", &[])?;
        self.invoke(to_string, false);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use kestrel_core::PrimitiveKind;
    use kestrel_core::ast::{AssignOp, AstBuilder, BinaryOp};

    use super::super::test_support::{generate, listing};
    use crate::bytecode::Opcode;

    #[test]
    fn chains_share_one_builder() {
        let b = AstBuilder::new();
        let code = generate(&b, b.named("String"), vec![
            b.local(b.int_type(), "n", Some(b.int(2))),
            b.local(b.prim(PrimitiveKind::Short), "s", Some(b.int(3))),
            b.ret(Some(b.binary(
                BinaryOp::Add,
                b.binary(BinaryOp::Add, b.binary(BinaryOp::Add, b.string("n="), b.ident("n")), b.string(", s=")),
                b.ident("s"),
            ))),
        ]);
        let text = listing(&code);
        assert_eq!(text.iter().filter(|i| i.starts_with("new ")).count(), 1);
        assert_eq!(
            text.iter().filter(|i| i.contains("StringBuilder.append")).count(),
            4,
            "{:?}",
            text
        );
        // The short is appended as an int.
        assert!(!text.iter().any(|i| i.contains("append(S)")));
        assert_eq!(code.opcodes().last(), Some(&Opcode::Areturn));
    }

    #[test]
    fn constant_strings_are_not_rebuilt() {
        let b = AstBuilder::new();
        let code = generate(&b, b.named("String"), vec![b.ret(Some(b.binary(
            BinaryOp::Add,
            b.string("a"),
            b.int(1),
        )))]);
        assert_eq!(listing(&code), vec!["ldc \"a1\"", "areturn"]);
    }

    #[test]
    fn compound_concatenation_keeps_null_left_sides() {
        let b = AstBuilder::new();
        let code = generate(&b, b.void_type(), vec![
            b.local(b.named("String"), "s", Some(b.null())),
            b.expr_stmt(b.compound(AssignOp::AddAssign, b.ident("s"), b.character('!'))),
        ]);
        let text = listing(&code);
        assert!(text.iter().any(|i| i.starts_with("invokestatic kestrel/lang/String.valueOf")));
        assert!(text.contains(&"dup_x1".to_string()));
        assert!(text.iter().any(|i| i.ends_with("append(C)Lkestrel/lang/StringBuilder;")));
    }
}
