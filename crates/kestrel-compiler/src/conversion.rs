//! Implicit and explicit conversions between types.
//!
//! The validator classifies a conversion once; the code generator asks for the
//! same classification again and emits its instructions, so both stages always
//! agree on what a conversion does.

use kestrel_core::PrimitiveKind;
use kestrel_types::{ConstantValue, TypeId, TypeSystem};

use crate::expr_info::BoxingKind;

/// How a value of one type becomes a value of another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    Identity,
    /// Primitive widening or (explicit) narrowing.
    Primitive { from: PrimitiveKind, to: PrimitiveKind },
    /// An `int` constant that fits a narrower integral type. No code.
    NarrowConstant { to: PrimitiveKind },
    /// Reference widening. No code.
    Reference,
    /// Reference narrowing, checked at run time.
    Checked,
    /// Box a primitive into its wrapper.
    Box { kind: PrimitiveKind },
    /// Unbox a wrapper, then widen to `to`.
    Unbox { kind: PrimitiveKind, to: PrimitiveKind },
    /// Cast a reference to a wrapper type, then unbox.
    CheckedUnbox { kind: PrimitiveKind },
    /// Convert a primitive to the wrapper's kind, then box.
    ConvertAndBox { from: PrimitiveKind, kind: PrimitiveKind },
}

impl Conversion {
    pub fn boxing(self) -> BoxingKind {
        match self {
            Conversion::Box { .. } | Conversion::ConvertAndBox { .. } => BoxingKind::Box,
            Conversion::Unbox { .. } | Conversion::CheckedUnbox { .. } => BoxingKind::Unbox,
            _ => BoxingKind::None,
        }
    }

    pub fn is_boxing(self) -> bool {
        self.boxing() != BoxingKind::None
    }
}

/// Assignment conversion of `source` to `target`.
///
/// `constant` enables narrowing of `int` constants that fit the target;
/// `allow_boxing` is off during the first overload resolution phase.
pub fn assignment_conversion(
    ts: &TypeSystem,
    target: TypeId,
    source: TypeId,
    constant: Option<&ConstantValue>,
    allow_boxing: bool,
) -> Option<Conversion> {
    if target == source {
        return Some(Conversion::Identity);
    }
    if target.is_void() || source.is_void() {
        return None;
    }
    match (target.as_primitive(), source.as_primitive()) {
        (Some(to), Some(from)) => {
            if to.widens_from(from) {
                return Some(Conversion::Primitive { from, to });
            }
            let narrowable = matches!(to, PrimitiveKind::Byte | PrimitiveKind::Short | PrimitiveKind::Char)
                && matches!(
                    from,
                    PrimitiveKind::Int | PrimitiveKind::Short | PrimitiveKind::Char | PrimitiveKind::Byte
                );
            match constant {
                Some(value) if narrowable && value.narrow_to(to).is_some() => {
                    Some(Conversion::NarrowConstant { to })
                }
                _ => None,
            }
        }
        (None, Some(from)) => {
            if !allow_boxing {
                return None;
            }
            let boxed = ts.boxed_type(from)?;
            ts.is_assignable_from(target, boxed)
                .then_some(Conversion::Box { kind: from })
        }
        (Some(to), None) => {
            if !allow_boxing {
                return None;
            }
            let kind = ts.unboxed_type(source)?;
            to.widens_from(kind).then_some(Conversion::Unbox { kind, to })
        }
        (None, None) => ts
            .is_assignable_from(target, source)
            .then_some(Conversion::Reference),
    }
}

/// Conversion performed by an explicit cast `(target) source`.
pub fn cast_conversion(ts: &TypeSystem, target: TypeId, source: TypeId) -> Option<Conversion> {
    if let Some(conversion) = assignment_conversion(ts, target, source, None, true) {
        return Some(conversion);
    }
    match (target.as_primitive(), source.as_primitive()) {
        (Some(to), Some(from)) => {
            (to.is_numeric() && from.is_numeric()).then_some(Conversion::Primitive { from, to })
        }
        (Some(to), None) => {
            // `(int) obj` checks the object is an `Integer` before unboxing.
            let boxed = ts.boxed_type(to)?;
            ts.is_assignable_from(source, boxed)
                .then_some(Conversion::CheckedUnbox { kind: to })
        }
        (None, Some(_)) => None,
        (None, None) => {
            let related = ts.is_assignable_from(source, target)
                || is_interface(ts, target)
                || is_interface(ts, source)
                || ts.is_type_param(target)
                || ts.is_type_param(source);
            related.then_some(Conversion::Checked)
        }
    }
}

/// Conversion between a numeric operand and a numeric wrapper.
///
/// Arithmetic on a wrapper unboxes it into the promoted operand type, and the
/// result of a compound assignment or increment is stored back through the
/// same wrapper. Neither direction is an assignment conversion (`Character`
/// does not widen to `int`, `int` does not box to `Byte`), so code generation
/// asks for this once the ordinary conversions fail.
pub fn operand_conversion(ts: &TypeSystem, target: TypeId, source: TypeId) -> Option<Conversion> {
    match (target.as_primitive(), source.as_primitive()) {
        (Some(to), None) if to.is_numeric() => {
            let kind = ts.unboxed_type(source).filter(|k| k.is_numeric())?;
            Some(Conversion::Unbox { kind, to })
        }
        (None, Some(from)) if from.is_numeric() => {
            let kind = ts.unboxed_type(target).filter(|k| k.is_numeric())?;
            Some(Conversion::ConvertAndBox { from, kind })
        }
        _ => None,
    }
}

fn is_interface(ts: &TypeSystem, ty: TypeId) -> bool {
    ts.def_of(ty).is_some_and(|def| ts.def(def).is_interface())
}
