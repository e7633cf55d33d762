//! Assignments, compound assignments and increments.
//!
//! Every form follows the same shape: [`BodyGenerator::prepare`] pushes the
//! target's prefix (receiver, array and index) once, a read-modify-write
//! duplicates that prefix before loading, and a nested use duplicates the
//! new value below the prefix so it survives the store.

use kestrel_core::ast::{AssignOp, BinaryOp, Expr, ExprKind, PostfixOp, UnaryOp};
use kestrel_core::InternalError;
use kestrel_types::{ConstantValue, FieldId, Member, MethodId, TypeId};

use super::expr::arithmetic_opcode;
use super::{BodyGenerator, Result, array_load_opcode, array_store_opcode, computational};
use crate::bytecode::Opcode;
use crate::operators::{binary_types, primitive_of};

/// A storage location whose prefix is on the stack.
struct Place {
    kind: PlaceKind,
    /// Type of the target expression.
    ty: TypeId,
}

enum PlaceKind {
    Local {
        slot: u16,
    },
    Field {
        id: FieldId,
        is_static: bool,
    },
    Property {
        getter: Option<MethodId>,
        setter: Option<MethodId>,
        is_static: bool,
        via_super: bool,
    },
    Array {
        element: TypeId,
    },
    /// `spill` holds the receiver and index temporaries when the prefix
    /// is too wide to duplicate on the stack.
    Indexer {
        getter: Option<MethodId>,
        setter: Option<MethodId>,
        spill: Option<Vec<(u16, TypeId)>>,
    },
}

impl Place {
    /// Stack slots taken by the prefix.
    fn width(&self) -> u16 {
        match &self.kind {
            PlaceKind::Local { .. } => 0,
            PlaceKind::Field { is_static, .. } => u16::from(!is_static),
            PlaceKind::Property { is_static, .. } => u16::from(!is_static),
            PlaceKind::Array { .. } => 2,
            PlaceKind::Indexer { spill: Some(_), .. } => 0,
            PlaceKind::Indexer { spill: None, .. } => 2,
        }
    }
}

impl<'a> BodyGenerator<'a> {
    /// Emit an assignment or increment. With `nested`, the assigned value
    /// (or the old value for postfix forms) stays on the stack.
    pub(crate) fn update(&mut self, expr: &Expr, nested: bool) -> Result<()> {
        match &expr.kind {
            ExprKind::Assign {
                op: AssignOp::Assign,
                target,
                value,
            } => self.assign(target, value, nested),
            ExprKind::Assign { op, target, value } => {
                let binary = op
                    .binary_op()
                    .ok_or_else(|| InternalError::other("compound assignment without operator"))?;
                self.compound(binary, target, value, nested)
            }
            ExprKind::Unary { op, operand } if op.is_increment() => {
                self.increment(operand, *op == UnaryOp::PreInc, false, nested)
            }
            ExprKind::Postfix { op, operand } => self.increment(operand, *op == PostfixOp::PostInc, true, nested),
            _ => Err(InternalError::UnsupportedTarget {
                kind: expr.kind.describe(),
            }),
        }
    }

    fn assign(&mut self, target: &Expr, value: &Expr, nested: bool) -> Result<()> {
        let place = self.prepare(target)?;
        self.expr_to(value, place.ty)?;
        if nested {
            self.dup_under(place.ty, place.width())?;
        }
        self.store_place(&place)
    }

    fn compound(&mut self, op: BinaryOp, target: &Expr, value: &Expr, nested: bool) -> Result<()> {
        let ts = self.ts;
        let target_ty = self.info(target)?.ty;
        if op == BinaryOp::Add && ts.is_string(target_ty) {
            let place = self.prepare(target)?;
            self.reload(&place)?;
            self.concat_onto(value)?;
            return self.finish_update(&place, nested);
        }
        if ts.is_delegate(target_ty) && matches!(op, BinaryOp::Add | BinaryOp::Sub) {
            let place = self.prepare(target)?;
            self.reload(&place)?;
            self.expr_to(value, place.ty)?;
            let delegate = ts.platform().delegate;
            let raw = ts.raw_type(delegate);
            let name = if op == BinaryOp::Add { "combine" } else { "remove" };
            let method = self.find_method(delegate, name, &[raw, raw])?;
            self.invoke(method, false);
            self.checkcast(place.ty);
            return self.finish_update(&place, nested);
        }
        if let Some(delta) = self.iinc_delta(target, op, value)? {
            return self.iinc(target, delta, nested, false);
        }

        let value_ty = self.info(value)?.ty;
        let types = binary_types(ts, op, target_ty, value_ty).ok_or_else(|| InternalError::UnsupportedOperator {
            op: op.as_str(),
            ty: ts.display(target_ty),
        })?;
        let place = self.prepare(target)?;
        self.reload(&place)?;
        self.to_operand(place.ty, types.operand)?;
        if op.is_shift() {
            self.shift_count(value)?;
        } else {
            self.expr_to(value, types.operand)?;
        }
        self.emitter.emit(arithmetic_opcode(op, types.operand)?);
        // The implicit cast back to the target type.
        self.coerce(types.operand, place.ty)?;
        self.finish_update(&place, nested)
    }

    fn increment(&mut self, operand: &Expr, increment: bool, postfix: bool, nested: bool) -> Result<()> {
        let ts = self.ts;
        if self.int_local(operand)?.is_some() {
            let delta = if increment { 1 } else { -1 };
            return self.iinc(operand, delta, nested, postfix);
        }
        let place = self.prepare(operand)?;
        self.reload(&place)?;
        if postfix && nested {
            self.dup_under(place.ty, place.width())?;
        }
        let promoted = primitive_of(ts, place.ty)
            .and_then(|kind| ts.unary_numeric_promotion(TypeId::primitive(kind)))
            .ok_or_else(|| InternalError::UnsupportedOperator {
                op: if increment { "++" } else { "--" },
                ty: ts.display(place.ty),
            })?;
        self.to_operand(place.ty, promoted)?;
        self.push_constant(&ConstantValue::Int(1), promoted)?;
        let op = if increment { BinaryOp::Add } else { BinaryOp::Sub };
        self.emitter.emit(arithmetic_opcode(op, promoted)?);
        self.coerce(promoted, place.ty)?;
        if !postfix && nested {
            self.dup_under(place.ty, place.width())?;
        }
        self.store_place(&place)
    }

    /// Duplicate the new value for a nested use, then store it.
    fn finish_update(&mut self, place: &Place, nested: bool) -> Result<()> {
        if nested {
            self.dup_under(place.ty, place.width())?;
        }
        self.store_place(place)
    }

    // ==========================================================================
    // iinc
    // ==========================================================================

    /// Slot of `target` when it is an `int` local.
    fn int_local(&self, target: &Expr) -> Result<Option<u16>> {
        match &self.info(target)?.member {
            Some(Member::Local { id, ty, .. }) if *ty == TypeId::INT => Ok(Some(self.slot(*id)?)),
            _ => Ok(None),
        }
    }

    /// Delta for `local += c` / `local -= c` with a small int constant.
    fn iinc_delta(&self, target: &Expr, op: BinaryOp, value: &Expr) -> Result<Option<i16>> {
        if self.int_local(target)?.is_none() || !matches!(op, BinaryOp::Add | BinaryOp::Sub) {
            return Ok(None);
        }
        let info = self.info(value)?;
        if !info.ty.is_primitive() || computational(info.ty) != TypeId::INT {
            return Ok(None);
        }
        let Some(value) = info.constant.as_ref().and_then(ConstantValue::as_i64) else {
            return Ok(None);
        };
        let delta = if op == BinaryOp::Sub { value.checked_neg() } else { Some(value) };
        Ok(delta.and_then(|d| i16::try_from(d).ok()))
    }

    fn iinc(&mut self, target: &Expr, delta: i16, nested: bool, postfix: bool) -> Result<()> {
        let slot = self
            .int_local(target)?
            .ok_or_else(|| InternalError::other("iinc on a non-int local"))?;
        if nested && postfix {
            self.load(TypeId::INT, slot);
        }
        self.emitter.emit_iinc(slot, delta);
        if nested && !postfix {
            self.load(TypeId::INT, slot);
        }
        Ok(())
    }

    // ==========================================================================
    // Places
    // ==========================================================================

    /// Push the prefix of `target` and describe how to read and write it.
    fn prepare(&mut self, target: &Expr) -> Result<Place> {
        let ts = self.ts;
        let info = self.info(target)?;
        let ty = info.ty;
        let object = match &target.kind {
            ExprKind::Member { object, .. } => Some(object.as_ref()),
            _ => None,
        };
        let kind = match (&target.kind, &info.member) {
            (_, Some(Member::Local { id, .. })) => PlaceKind::Local { slot: self.slot(*id)? },
            (_, Some(Member::Field { id, .. })) => {
                let is_static = ts.field(*id).is_static();
                self.receiver(object, is_static)?;
                PlaceKind::Field { id: *id, is_static }
            }
            (_, Some(Member::Property { getter, setter, .. })) => {
                let accessor = getter.or(*setter).ok_or_else(|| InternalError::other("property without accessors"))?;
                let is_static = ts.method(accessor).is_static();
                let via_super = self.receiver(object, is_static)?;
                PlaceKind::Property {
                    getter: *getter,
                    setter: *setter,
                    is_static,
                    via_super,
                }
            }
            (ExprKind::Index { object, indexes }, None) => {
                let array = self.expr(object)?;
                let element = ts
                    .element_type(array)
                    .ok_or_else(|| InternalError::other(format!("{} is not an array", ts.display(array))))?;
                let [index] = indexes.as_slice() else {
                    return Err(InternalError::other("array access takes one index"));
                };
                self.expr_to(index, TypeId::INT)?;
                PlaceKind::Array { element }
            }
            (ExprKind::Index { object, indexes }, Some(Member::Indexer { getter, setter, .. })) => {
                let accessor = setter.or(*getter).ok_or_else(|| InternalError::other("indexer without accessors"))?;
                let params: Vec<TypeId> = ts
                    .method(accessor)
                    .param_types()
                    .take(indexes.len())
                    .map(|p| ts.erasure(p))
                    .collect();
                let object_ty = self.expr(object)?;
                let spill = indexes.len() != 1 || params.first().is_some_and(|p| p.slots() == 2);
                if spill {
                    let object_slot = self.temp(object_ty);
                    let mut temps = vec![(object_slot, object_ty)];
                    for (index, param) in indexes.iter().zip(&params) {
                        self.expr_to(index, *param)?;
                        temps.push((self.temp(*param), *param));
                    }
                    // Stack: [object, i0, i1, ...], stored back to front.
                    for &(slot, ty) in temps.iter().rev() {
                        self.store(ty, slot);
                    }
                    PlaceKind::Indexer {
                        getter: *getter,
                        setter: *setter,
                        spill: Some(temps),
                    }
                } else {
                    for (index, param) in indexes.iter().zip(&params) {
                        self.expr_to(index, *param)?;
                    }
                    PlaceKind::Indexer {
                        getter: *getter,
                        setter: *setter,
                        spill: None,
                    }
                }
            }
            (kind, _) => {
                return Err(InternalError::UnsupportedTarget { kind: kind.describe() });
            }
        };
        Ok(Place { kind, ty })
    }

    /// Duplicate the prefix and read the current value.
    fn reload(&mut self, place: &Place) -> Result<()> {
        self.dup_slots(place.width())?;
        self.load_place(place)
    }

    fn spilled_prefix(&mut self, temps: &[(u16, TypeId)]) {
        for &(slot, ty) in temps {
            self.load(ty, slot);
        }
    }

    /// Read the value, consuming the prefix.
    fn load_place(&mut self, place: &Place) -> Result<()> {
        let ts = self.ts;
        match &place.kind {
            PlaceKind::Local { slot } => self.load(place.ty, *slot),
            PlaceKind::Field { id, .. } => {
                self.get_field(*id);
                self.restore_erased(ts.field(*id).ty, place.ty);
            }
            PlaceKind::Property { getter, via_super, .. } => {
                let getter = getter.ok_or_else(|| InternalError::other("property has no getter"))?;
                self.invoke(getter, *via_super);
                self.restore_erased(ts.method(getter).return_type, place.ty);
            }
            PlaceKind::Array { element } => {
                self.emitter.emit(array_load_opcode(ts.erasure(*element)));
                self.restore_erased(*element, place.ty);
            }
            PlaceKind::Indexer { getter, spill, .. } => {
                let getter = getter.ok_or_else(|| InternalError::other("indexer has no getter"))?;
                if let Some(temps) = spill {
                    self.spilled_prefix(temps);
                }
                self.invoke(getter, false);
                self.restore_erased(ts.method(getter).return_type, place.ty);
            }
        }
        Ok(())
    }

    /// Write the value on top of the stack, consuming it and the prefix.
    fn store_place(&mut self, place: &Place) -> Result<()> {
        match &place.kind {
            PlaceKind::Local { slot } => self.store(place.ty, *slot),
            PlaceKind::Field { id, .. } => self.put_field(*id),
            PlaceKind::Property { setter, via_super, .. } => {
                let setter = setter.ok_or_else(|| InternalError::other("property has no setter"))?;
                self.invoke(setter, *via_super);
            }
            PlaceKind::Array { element } => {
                self.emitter.emit(array_store_opcode(self.ts.erasure(*element)));
            }
            PlaceKind::Indexer { setter, spill, .. } => {
                let setter = setter.ok_or_else(|| InternalError::other("indexer has no setter"))?;
                if let Some(temps) = spill {
                    let value = self.temp(place.ty);
                    self.store(place.ty, value);
                    self.spilled_prefix(temps);
                    self.load(place.ty, value);
                }
                self.invoke(setter, false);
            }
        }
        Ok(())
    }
}
