//! Expressions used as values.

use kestrel_core::ast::{BinaryOp, Expr, ExprKind, UnaryOp};
use kestrel_core::{InternalError, Modifiers, PrimitiveKind};
use kestrel_types::{ConstantValue, FieldId, Member, MethodId, TypeId};

use super::{BodyGenerator, Result, array_load_opcode, computational};
use crate::bytecode::{FieldRef, Instruction, MethodRef, Opcode, Operand};
use crate::expr_info::ExpressionInfo;
use crate::operators::{binary_types, cast_constant, primitive_of};

impl<'a> BodyGenerator<'a> {
    /// Push the value of `expr` and return its static type.
    pub(crate) fn expr(&mut self, expr: &Expr) -> Result<TypeId> {
        let info = self.info(expr)?;
        if let Some(value) = &info.constant {
            if self.push_constant(value, info.ty)? {
                return Ok(info.ty);
            }
        }
        match &expr.kind {
            ExprKind::Literal(_) => {
                return Err(InternalError::MissingExpressionInfo { node: expr.id.0 });
            }
            ExprKind::Ident { .. } => self.read(None, info)?,
            ExprKind::Member { object, .. } => self.read(Some(object), info)?,
            ExprKind::Index { object, indexes } => self.read_element(object, indexes, info)?,
            ExprKind::Call { callee, args } => self.call(expr, callee, args, info)?,
            ExprKind::New { args, .. } => self.new_object(expr, args, info)?,
            ExprKind::NewArray { size, .. } => self.new_array(size, info.ty)?,
            ExprKind::Assign { .. } | ExprKind::Postfix { .. } => self.update(expr, true)?,
            ExprKind::Unary { op, .. } if op.is_increment() => self.update(expr, true)?,
            ExprKind::Unary { op, operand } => self.unary(*op, operand, info.ty)?,
            ExprKind::Binary { op, left, right } => self.binary(expr, *op, left, right, info.ty)?,
            ExprKind::Cast { expr: operand, .. } => {
                let source = self.expr(operand)?;
                self.coerce(source, info.ty)?;
            }
            ExprKind::This | ExprKind::Super => self.emitter.emit_local(Opcode::Aload, 0),
            ExprKind::ArrayInit(_) | ExprKind::Annotation(_) => {
                return Err(InternalError::UnsupportedTarget {
                    kind: expr.kind.describe(),
                });
            }
        }
        Ok(info.ty)
    }

    /// Push `expr` converted to `target`.
    pub(crate) fn expr_to(&mut self, expr: &Expr, target: TypeId) -> Result<()> {
        let info = self.info(expr)?;
        if let Some(value) = &info.constant {
            let inlinable = info.ty.is_primitive() || info.ty.is_null() || self.ts.is_string(info.ty);
            if inlinable && self.push_constant(value, target)? {
                return Ok(());
            }
        }
        let ty = self.expr(expr)?;
        self.coerce(ty, target)
    }

    /// Push a literal-like constant converted to `ty`.
    ///
    /// Returns `false` for constants that have no literal form (enum,
    /// array and annotation values), which are evaluated normally.
    pub(crate) fn push_constant(&mut self, value: &ConstantValue, ty: TypeId) -> Result<bool> {
        let converted = match ty.as_primitive() {
            Some(kind) if kind != PrimitiveKind::Void => cast_constant(value, kind).unwrap_or_else(|| value.clone()),
            _ => value.clone(),
        };
        let pushed = match &converted {
            ConstantValue::Null => {
                self.emitter.emit_null();
                TypeId::NULL
            }
            ConstantValue::Bool(b) => {
                self.emitter.emit_int(i32::from(*b));
                TypeId::BOOLEAN
            }
            ConstantValue::Int(v) => {
                self.emitter.emit_int(*v);
                TypeId::INT
            }
            ConstantValue::Long(v) => {
                self.emitter.emit_long(*v);
                TypeId::LONG
            }
            ConstantValue::Float(v) => {
                self.emitter.emit_float(v.0);
                TypeId::FLOAT
            }
            ConstantValue::Double(v) => {
                self.emitter.emit_double(v.0);
                TypeId::DOUBLE
            }
            ConstantValue::Char(c) => {
                self.emitter.emit_int(i32::from(*c));
                TypeId::CHAR
            }
            ConstantValue::String(s) => {
                self.emitter.emit_string(s);
                self.ts.string_type()
            }
            ConstantValue::Enum { .. } | ConstantValue::Array(_) | ConstantValue::Annotation(_) => {
                return Ok(false);
            }
        };
        if !ty.is_primitive() || computational(pushed) != computational(ty) {
            self.coerce(pushed, ty)?;
        }
        Ok(true)
    }

    // ==========================================================================
    // Member reads
    // ==========================================================================

    /// Push the instance a member is used on, if it needs one.
    ///
    /// A type qualifier is never evaluated; an instance qualifier of a static
    /// member is evaluated and discarded. Returns whether the access goes
    /// through `super`.
    pub(crate) fn receiver(&mut self, object: Option<&Expr>, is_static: bool) -> Result<bool> {
        let Some(object) = object else {
            if !is_static {
                self.emitter.emit_local(Opcode::Aload, 0);
            }
            return Ok(false);
        };
        let info = self.info(object)?;
        if info.is_type {
            return Ok(false);
        }
        if matches!(object.kind, ExprKind::Super) {
            if !is_static {
                self.emitter.emit_local(Opcode::Aload, 0);
            }
            return Ok(true);
        }
        let ty = self.expr(object)?;
        if is_static {
            self.pop(ty);
        }
        Ok(false)
    }

    /// A name or member access read as a value.
    fn read(&mut self, object: Option<&Expr>, info: &ExpressionInfo) -> Result<()> {
        let ts = self.ts;
        match &info.member {
            Some(Member::Local { id, ty, .. }) => {
                let slot = self.slot(*id)?;
                self.load(*ty, slot);
            }
            Some(Member::Field { id, .. }) => {
                let is_static = ts.field(*id).is_static();
                self.receiver(object, is_static)?;
                self.get_field(*id);
                self.restore_erased(ts.field(*id).ty, info.ty);
            }
            Some(Member::Property { getter: Some(getter), .. }) => {
                let via_super = self.receiver(object, ts.method(*getter).is_static())?;
                self.invoke(*getter, via_super);
                self.restore_erased(ts.method(*getter).return_type, info.ty);
            }
            None => match object {
                // `array.length` is the only member without a definition.
                Some(object) => {
                    self.expr(object)?;
                    self.emitter.emit(Opcode::Arraylength);
                }
                None => return Err(InternalError::MissingExpressionInfo { node: u32::MAX }),
            },
            Some(member) => {
                return Err(InternalError::UnsupportedTarget {
                    kind: member.kind_name(),
                });
            }
        }
        Ok(())
    }

    fn read_element(&mut self, object: &Expr, indexes: &[Expr], info: &ExpressionInfo) -> Result<()> {
        let ts = self.ts;
        match &info.member {
            None => {
                let array = self.expr(object)?;
                let element = ts
                    .element_type(array)
                    .ok_or_else(|| InternalError::other(format!("{} is not an array", ts.display(array))))?;
                let [index] = indexes else {
                    return Err(InternalError::other("array access takes one index"));
                };
                self.expr_to(index, TypeId::INT)?;
                self.emitter.emit(array_load_opcode(ts.erasure(element)));
                self.restore_erased(element, info.ty);
            }
            Some(Member::Indexer { getter: Some(getter), .. }) => {
                self.expr(object)?;
                self.args(*getter, 0, indexes)?;
                self.invoke(*getter, false);
                self.restore_erased(ts.method(*getter).return_type, info.ty);
            }
            Some(member) => {
                return Err(InternalError::UnsupportedTarget {
                    kind: member.kind_name(),
                });
            }
        }
        Ok(())
    }

    pub(crate) fn field_ref(&self, id: FieldId) -> FieldRef {
        let ts = self.ts;
        let field = ts.field(id);
        FieldRef::new(ts.internal_name(field.declaring), field.name.clone(), ts.descriptor(field.ty))
    }

    /// `getstatic` or `getfield`; the instance is already on the stack.
    pub(crate) fn get_field(&mut self, id: FieldId) {
        let opcode = if self.ts.field(id).is_static() {
            Opcode::Getstatic
        } else {
            Opcode::Getfield
        };
        let field = self.field_ref(id);
        self.emitter.emit_field(opcode, field);
    }

    pub(crate) fn put_field(&mut self, id: FieldId) {
        let opcode = if self.ts.field(id).is_static() {
            Opcode::Putstatic
        } else {
            Opcode::Putfield
        };
        let field = self.field_ref(id);
        self.emitter.emit_field(opcode, field);
    }

    // ==========================================================================
    // Invocation
    // ==========================================================================

    pub(crate) fn method_ref(&self, id: MethodId) -> MethodRef {
        let ts = self.ts;
        let method = ts.method(id);
        let reference = MethodRef::new(ts.internal_name(method.declaring), method.name.clone(), ts.method_descriptor(id));
        if ts.def(method.declaring).is_interface() {
            reference.on_interface()
        } else {
            reference
        }
    }

    /// Invoke `id` with its receiver and arguments on the stack.
    pub(crate) fn invoke(&mut self, id: MethodId, via_super: bool) {
        let method = self.ts.method(id);
        let opcode = if method.is_static() {
            Opcode::Invokestatic
        } else if via_super || method.is_constructor() || method.modifiers.contains(Modifiers::PRIVATE) {
            Opcode::Invokespecial
        } else {
            Opcode::Invokevirtual
        };
        let reference = self.method_ref(id);
        self.emitter.emit_invoke(opcode, reference);
    }

    /// Push `args` converted to the erased parameters of `id`, skipping `skip` leading ones.
    pub(crate) fn args(&mut self, id: MethodId, skip: usize, args: &[Expr]) -> Result<()> {
        let ts = self.ts;
        let params = &ts.method(id).params;
        if params.len() != skip + args.len() {
            return Err(InternalError::other(format!(
                "{} takes {} arguments, {} given",
                ts.method_signature(id),
                params.len(),
                skip + args.len()
            )));
        }
        for (arg, param) in args.iter().zip(&params[skip..]) {
            self.expr_to(arg, ts.erasure(param.ty))?;
        }
        Ok(())
    }

    fn call(&mut self, expr: &Expr, callee: &Expr, args: &[Expr], info: &ExpressionInfo) -> Result<()> {
        let ts = self.ts;
        let callee_info = self.info(callee)?;
        let direct = match (&callee.kind, &callee_info.member) {
            (ExprKind::Ident { .. } | ExprKind::Member { .. }, Some(Member::Method { id, .. })) => Some(*id),
            _ => None,
        };
        match direct {
            Some(id) => {
                let method = ts.method(id);
                // Unimplemented partial methods vanish with their arguments.
                if method.excluded {
                    return Ok(());
                }
                let object = match &callee.kind {
                    ExprKind::Member { object, .. } => Some(object.as_ref()),
                    _ => None,
                };
                let via_super = self.receiver(object, method.is_static())?;
                self.args(id, 0, args)?;
                self.invoke(id, via_super);
                self.restore_erased(method.return_type, info.ty);
            }
            None => {
                let Some(Member::Method { id: invoke, .. }) = &info.member else {
                    return Err(InternalError::MissingExpressionInfo { node: expr.id.0 });
                };
                self.expr(callee)?;
                self.args(*invoke, 0, args)?;
                self.invoke(*invoke, false);
                self.restore_erased(ts.method(*invoke).return_type, info.ty);
            }
        }
        Ok(())
    }

    fn new_object(&mut self, expr: &Expr, args: &[Expr], info: &ExpressionInfo) -> Result<()> {
        let Some(Member::Method { id, .. }) = &info.member else {
            return Err(InternalError::MissingExpressionInfo { node: expr.id.0 });
        };
        let created = self.type_operand(info.ty);
        self.emitter.emit_type(Opcode::New, created);
        self.emitter.emit(Opcode::Dup);
        self.args(*id, 0, args)?;
        self.invoke(*id, false);
        Ok(())
    }

    fn new_array(&mut self, size: &Expr, ty: TypeId) -> Result<()> {
        let ts = self.ts;
        let element = ts
            .element_type(ty)
            .ok_or_else(|| InternalError::other(format!("{} is not an array", ts.display(ty))))?;
        self.expr_to(size, TypeId::INT)?;
        match ts.erasure(element).as_primitive() {
            Some(kind) => {
                let code = array_type_code(kind)?;
                self.emitter.push(Instruction::new(Opcode::Newarray, Operand::Int(code)));
            }
            None => {
                let operand = self.type_operand(element);
                self.emitter.emit_type(Opcode::Anewarray, operand);
            }
        }
        Ok(())
    }

    // ==========================================================================
    // Operators
    // ==========================================================================

    fn unary(&mut self, op: UnaryOp, operand: &Expr, ty: TypeId) -> Result<()> {
        match op {
            UnaryOp::Plus => self.expr_to(operand, ty)?,
            UnaryOp::Neg => {
                self.expr_to(operand, ty)?;
                let opcode = match computational(ty) {
                    TypeId::INT => Opcode::Ineg,
                    TypeId::LONG => Opcode::Lneg,
                    TypeId::FLOAT => Opcode::Fneg,
                    TypeId::DOUBLE => Opcode::Dneg,
                    _ => {
                        return Err(InternalError::UnsupportedOperator {
                            op: op.as_str(),
                            ty: self.ts.display(ty),
                        });
                    }
                };
                self.emitter.emit(opcode);
            }
            UnaryOp::BitwiseNot => {
                self.expr_to(operand, ty)?;
                // Stack: [value, -1] → value ^ -1
                if ty == TypeId::LONG {
                    self.emitter.emit_long(-1);
                    self.emitter.emit(Opcode::Lxor);
                } else {
                    self.emitter.emit_int(-1);
                    self.emitter.emit(Opcode::Ixor);
                }
            }
            UnaryOp::LogicalNot => {
                self.expr_to(operand, TypeId::BOOLEAN)?;
                self.emitter.emit_int(1);
                self.emitter.emit(Opcode::Ixor);
            }
            UnaryOp::PreInc | UnaryOp::PreDec => {
                return Err(InternalError::UnsupportedOperator {
                    op: op.as_str(),
                    ty: self.ts.display(ty),
                });
            }
        }
        Ok(())
    }

    fn binary(&mut self, expr: &Expr, op: BinaryOp, left: &Expr, right: &Expr, ty: TypeId) -> Result<()> {
        let ts = self.ts;
        if op == BinaryOp::Add && ts.is_string(ty) {
            return self.concat(expr);
        }
        if op.is_logical() || op.is_comparison() {
            return self.bool_value(expr);
        }
        let left_ty = self.info(left)?.ty;
        let right_ty = self.info(right)?.ty;
        let types = binary_types(ts, op, left_ty, right_ty).ok_or_else(|| InternalError::UnsupportedOperator {
            op: op.as_str(),
            ty: ts.display(left_ty),
        })?;
        self.expr_to(left, types.operand)?;
        if op.is_shift() {
            self.shift_count(right)?;
        } else {
            self.expr_to(right, types.operand)?;
        }
        let opcode = arithmetic_opcode(op, types.operand)?;
        self.emitter.emit(opcode);
        Ok(())
    }

    /// Push a shift distance as an `int`.
    pub(crate) fn shift_count(&mut self, count: &Expr) -> Result<()> {
        let ts = self.ts;
        let ty = self.info(count)?.ty;
        let promoted = primitive_of(ts, ty)
            .and_then(|kind| ts.unary_numeric_promotion(TypeId::primitive(kind)))
            .unwrap_or(TypeId::INT);
        self.expr_to(count, promoted)?;
        if promoted == TypeId::LONG {
            self.emitter.emit(Opcode::L2i);
        }
        Ok(())
    }
}

/// Opcode performing `op` on two operands of type `ty`.
pub(crate) fn arithmetic_opcode(op: BinaryOp, ty: TypeId) -> Result<Opcode> {
    use Opcode::*;
    let lane = match computational(ty) {
        TypeId::INT | TypeId::BOOLEAN => 0,
        TypeId::LONG => 1,
        TypeId::FLOAT => 2,
        TypeId::DOUBLE => 3,
        _ => 4,
    };
    let row: [Option<Opcode>; 4] = match op {
        BinaryOp::Add => [Some(Iadd), Some(Ladd), Some(Fadd), Some(Dadd)],
        BinaryOp::Sub => [Some(Isub), Some(Lsub), Some(Fsub), Some(Dsub)],
        BinaryOp::Mul => [Some(Imul), Some(Lmul), Some(Fmul), Some(Dmul)],
        BinaryOp::Div => [Some(Idiv), Some(Ldiv), Some(Fdiv), Some(Ddiv)],
        BinaryOp::Mod => [Some(Irem), Some(Lrem), Some(Frem), Some(Drem)],
        BinaryOp::ShiftLeft => [Some(Ishl), Some(Lshl), None, None],
        BinaryOp::ShiftRight => [Some(Ishr), Some(Lshr), None, None],
        BinaryOp::ShiftRightUnsigned => [Some(Iushr), Some(Lushr), None, None],
        BinaryOp::BitwiseAnd => [Some(Iand), Some(Land), None, None],
        BinaryOp::BitwiseOr => [Some(Ior), Some(Lor), None, None],
        BinaryOp::BitwiseXor => [Some(Ixor), Some(Lxor), None, None],
        _ => [None; 4],
    };
    row.get(lane)
        .copied()
        .flatten()
        .ok_or_else(|| InternalError::UnsupportedOperator {
            op: op.as_str(),
            ty: format!("{:?}", ty),
        })
}

/// `newarray` operand for a primitive element type.
fn array_type_code(kind: PrimitiveKind) -> Result<i32> {
    Ok(match kind {
        PrimitiveKind::Boolean => 4,
        PrimitiveKind::Char => 5,
        PrimitiveKind::Float => 6,
        PrimitiveKind::Double => 7,
        PrimitiveKind::Byte => 8,
        PrimitiveKind::Short => 9,
        PrimitiveKind::Int => 10,
        PrimitiveKind::Long => 11,
        PrimitiveKind::Void => {
            return Err(InternalError::UnsupportedTarget { kind: "void array" });
        }
    })
}
