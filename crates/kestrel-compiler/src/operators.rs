//! Operator typing and constant folding.
//!
//! Shared by body validation, declaration-level constant evaluation (field
//! constants, annotation values) and code generation, so every stage agrees
//! on the operand and result type of an operator.

use kestrel_core::PrimitiveKind;
use kestrel_core::ast::{BinaryOp, Literal, UnaryOp};
use kestrel_types::{ConstantValue, TypeId, TypeSystem};
use ordered_float::OrderedFloat;

/// Types an operator works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorTypes {
    /// Both operands are converted to this type before the operation.
    /// Shift counts are the exception: they are always `int`.
    pub operand: TypeId,
    pub result: TypeId,
}

impl OperatorTypes {
    fn same(ty: TypeId) -> Self {
        Self {
            operand: ty,
            result: ty,
        }
    }
}

/// Primitive kind of `ty` after unboxing.
pub fn primitive_of(ts: &TypeSystem, ty: TypeId) -> Option<PrimitiveKind> {
    ty.as_primitive()
        .filter(|kind| *kind != PrimitiveKind::Void)
        .or_else(|| ts.unboxed_type(ty))
}

fn numeric(ts: &TypeSystem, ty: TypeId) -> Option<TypeId> {
    primitive_of(ts, ty)
        .filter(|kind| kind.is_numeric())
        .map(TypeId::primitive)
}

fn integral(ts: &TypeSystem, ty: TypeId) -> Option<TypeId> {
    primitive_of(ts, ty)
        .filter(|kind| kind.is_integral())
        .map(TypeId::primitive)
}

fn is_boolean(ts: &TypeSystem, ty: TypeId) -> bool {
    primitive_of(ts, ty) == Some(PrimitiveKind::Boolean)
}

/// Typing of a unary operator, `None` when the operand does not apply.
pub fn unary_types(ts: &TypeSystem, op: UnaryOp, operand: TypeId) -> Option<OperatorTypes> {
    match op {
        UnaryOp::LogicalNot => is_boolean(ts, operand).then(|| OperatorTypes::same(TypeId::BOOLEAN)),
        UnaryOp::BitwiseNot => {
            let promoted = ts.unary_numeric_promotion(integral(ts, operand)?)?;
            Some(OperatorTypes::same(promoted))
        }
        UnaryOp::Neg | UnaryOp::Plus => {
            let promoted = ts.unary_numeric_promotion(numeric(ts, operand)?)?;
            Some(OperatorTypes::same(promoted))
        }
        UnaryOp::PreInc | UnaryOp::PreDec => {
            let kind = numeric(ts, operand)?;
            Some(OperatorTypes {
                operand: ts.unary_numeric_promotion(kind)?,
                result: operand,
            })
        }
    }
}

/// Typing of a binary operator, `None` when the operands do not apply.
pub fn binary_types(ts: &TypeSystem, op: BinaryOp, left: TypeId, right: TypeId) -> Option<OperatorTypes> {
    match op {
        BinaryOp::Add if ts.is_string(left) || ts.is_string(right) => {
            (!left.is_void() && !right.is_void()).then(|| OperatorTypes::same(ts.string_type()))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            let promoted = ts.binary_numeric_promotion(numeric(ts, left)?, numeric(ts, right)?)?;
            Some(OperatorTypes::same(promoted))
        }
        BinaryOp::ShiftLeft | BinaryOp::ShiftRight | BinaryOp::ShiftRightUnsigned => {
            let promoted = ts.unary_numeric_promotion(integral(ts, left)?)?;
            integral(ts, right)?;
            Some(OperatorTypes::same(promoted))
        }
        BinaryOp::BitwiseAnd | BinaryOp::BitwiseOr | BinaryOp::BitwiseXor => {
            if is_boolean(ts, left) && is_boolean(ts, right) {
                return Some(OperatorTypes::same(TypeId::BOOLEAN));
            }
            let promoted = ts.binary_numeric_promotion(integral(ts, left)?, integral(ts, right)?)?;
            Some(OperatorTypes::same(promoted))
        }
        BinaryOp::LogicalAnd | BinaryOp::LogicalOr => {
            (is_boolean(ts, left) && is_boolean(ts, right)).then(|| OperatorTypes::same(TypeId::BOOLEAN))
        }
        BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
            let promoted = ts.binary_numeric_promotion(numeric(ts, left)?, numeric(ts, right)?)?;
            Some(OperatorTypes {
                operand: promoted,
                result: TypeId::BOOLEAN,
            })
        }
        BinaryOp::Equal | BinaryOp::NotEqual => equality_types(ts, left, right),
    }
}

fn equality_types(ts: &TypeSystem, left: TypeId, right: TypeId) -> Option<OperatorTypes> {
    let comparison = |operand| {
        Some(OperatorTypes {
            operand,
            result: TypeId::BOOLEAN,
        })
    };
    // Two references compare by identity, even when both are wrappers.
    let both_references = !left.is_primitive() && !right.is_primitive();
    if !both_references {
        if is_boolean(ts, left) && is_boolean(ts, right) {
            return comparison(TypeId::BOOLEAN);
        }
        let promoted = ts.binary_numeric_promotion(numeric(ts, left)?, numeric(ts, right)?)?;
        return comparison(promoted);
    }
    let related = left.is_null()
        || right.is_null()
        || ts.is_assignable_from(left, right)
        || ts.is_assignable_from(right, left)
        || ts.is_type_param(left)
        || ts.is_type_param(right)
        || is_interface(ts, left)
        || is_interface(ts, right);
    if related {
        comparison(ts.object_type())
    } else {
        None
    }
}

fn is_interface(ts: &TypeSystem, ty: TypeId) -> bool {
    ts.def_of(ty).is_some_and(|def| ts.def(def).is_interface())
}

// ============================================================================
// Folding
// ============================================================================

/// The constant a literal denotes.
pub fn literal_constant(literal: &Literal) -> ConstantValue {
    match literal {
        Literal::Null => ConstantValue::Null,
        Literal::Bool(b) => ConstantValue::Bool(*b),
        Literal::Int(v) => ConstantValue::Int(*v),
        Literal::Long(v) => ConstantValue::Long(*v),
        Literal::Float(v) => ConstantValue::Float(*v),
        Literal::Double(v) => ConstantValue::Double(*v),
        Literal::Char(c) => ConstantValue::Char(*c),
        Literal::String(s) => ConstantValue::String(s.clone()),
    }
}

/// The static type of a literal.
pub fn literal_type(ts: &TypeSystem, literal: &Literal) -> TypeId {
    match literal {
        Literal::Null => TypeId::NULL,
        Literal::Bool(_) => TypeId::BOOLEAN,
        Literal::Int(_) => TypeId::INT,
        Literal::Long(_) => TypeId::LONG,
        Literal::Float(_) => TypeId::FLOAT,
        Literal::Double(_) => TypeId::DOUBLE,
        Literal::Char(_) => TypeId::CHAR,
        Literal::String(_) => ts.string_type(),
    }
}

/// Explicit primitive conversion of a constant; integral narrowing wraps.
pub fn cast_constant(value: &ConstantValue, target: PrimitiveKind) -> Option<ConstantValue> {
    if target == PrimitiveKind::Boolean {
        return value.as_bool().map(ConstantValue::Bool);
    }
    let integral = match value {
        ConstantValue::Float(v) => Some(saturate(f64::from(v.0))),
        ConstantValue::Double(v) => Some(saturate(v.0)),
        other => other.as_i64(),
    };
    Some(match target {
        PrimitiveKind::Byte => ConstantValue::Int(i32::from(integral? as i8)),
        PrimitiveKind::Short => ConstantValue::Int(i32::from(integral? as i16)),
        PrimitiveKind::Char => ConstantValue::Char(integral? as u16),
        PrimitiveKind::Int => ConstantValue::Int(match value {
            ConstantValue::Float(v) => v.0 as i32,
            ConstantValue::Double(v) => v.0 as i32,
            _ => integral? as i32,
        }),
        PrimitiveKind::Long => ConstantValue::Long(integral?),
        PrimitiveKind::Float => ConstantValue::Float(OrderedFloat(value.as_f64()? as f32)),
        PrimitiveKind::Double => ConstantValue::Double(OrderedFloat(value.as_f64()?)),
        PrimitiveKind::Boolean | PrimitiveKind::Void => return None,
    })
}

fn saturate(value: f64) -> i64 {
    // `as` saturates and maps NaN to zero, which is the required semantics.
    value as i64
}

/// Fold a unary operator over a constant of the operand type.
pub fn fold_unary(op: UnaryOp, operand: &ConstantValue, types: OperatorTypes) -> Option<ConstantValue> {
    let kind = types.operand.as_primitive()?;
    let value = cast_constant(operand, kind)?;
    match (op, value) {
        (UnaryOp::LogicalNot, ConstantValue::Bool(b)) => Some(ConstantValue::Bool(!b)),
        (UnaryOp::Plus, value) => Some(value),
        (UnaryOp::Neg, ConstantValue::Int(v)) => Some(ConstantValue::Int(v.wrapping_neg())),
        (UnaryOp::Neg, ConstantValue::Long(v)) => Some(ConstantValue::Long(v.wrapping_neg())),
        (UnaryOp::Neg, ConstantValue::Float(v)) => Some(ConstantValue::Float(-v)),
        (UnaryOp::Neg, ConstantValue::Double(v)) => Some(ConstantValue::Double(-v)),
        (UnaryOp::BitwiseNot, ConstantValue::Int(v)) => Some(ConstantValue::Int(!v)),
        (UnaryOp::BitwiseNot, ConstantValue::Long(v)) => Some(ConstantValue::Long(!v)),
        _ => None,
    }
}

/// Fold a binary operator. Integral division by zero is left to run time.
pub fn fold_binary(
    ts: &TypeSystem,
    op: BinaryOp,
    left: &ConstantValue,
    right: &ConstantValue,
    types: OperatorTypes,
) -> Option<ConstantValue> {
    if ts.is_string(types.result) {
        return Some(ConstantValue::String(format!(
            "{}{}",
            constant_text(left)?,
            constant_text(right)?
        )));
    }
    if types.operand == ts.object_type() {
        // Reference equality folds only for null against null.
        return match (left, right, op) {
            (ConstantValue::Null, ConstantValue::Null, BinaryOp::Equal) => Some(ConstantValue::Bool(true)),
            (ConstantValue::Null, ConstantValue::Null, BinaryOp::NotEqual) => Some(ConstantValue::Bool(false)),
            _ => None,
        };
    }
    let kind = types.operand.as_primitive()?;
    let l = cast_constant(left, kind)?;
    if op.is_shift() {
        let count = right.as_i64()?;
        return match l {
            ConstantValue::Int(v) => {
                let count = (count & 0x1f) as u32;
                Some(ConstantValue::Int(match op {
                    BinaryOp::ShiftLeft => v.wrapping_shl(count),
                    BinaryOp::ShiftRight => v.wrapping_shr(count),
                    _ => ((v as u32) >> count) as i32,
                }))
            }
            ConstantValue::Long(v) => {
                let count = (count & 0x3f) as u32;
                Some(ConstantValue::Long(match op {
                    BinaryOp::ShiftLeft => v.wrapping_shl(count),
                    BinaryOp::ShiftRight => v.wrapping_shr(count),
                    _ => ((v as u64) >> count) as i64,
                }))
            }
            _ => None,
        };
    }
    let r = cast_constant(right, kind)?;
    match (l, r) {
        (ConstantValue::Bool(a), ConstantValue::Bool(b)) => fold_bool(op, a, b),
        (ConstantValue::Int(a), ConstantValue::Int(b)) => fold_int(op, a, b),
        (ConstantValue::Long(a), ConstantValue::Long(b)) => fold_long(op, a, b),
        (ConstantValue::Float(a), ConstantValue::Float(b)) => {
            fold_float(op, f64::from(a.0), f64::from(b.0)).map(|v| match v {
                ConstantValue::Double(d) => ConstantValue::Float(OrderedFloat(d.0 as f32)),
                other => other,
            })
        }
        (ConstantValue::Double(a), ConstantValue::Double(b)) => fold_float(op, a.0, b.0),
        _ => None,
    }
}

fn fold_bool(op: BinaryOp, a: bool, b: bool) -> Option<ConstantValue> {
    let value = match op {
        BinaryOp::LogicalAnd | BinaryOp::BitwiseAnd => a && b,
        BinaryOp::LogicalOr | BinaryOp::BitwiseOr => a || b,
        BinaryOp::BitwiseXor | BinaryOp::NotEqual => a != b,
        BinaryOp::Equal => a == b,
        _ => return None,
    };
    Some(ConstantValue::Bool(value))
}

fn compare<T: PartialOrd>(op: BinaryOp, a: T, b: T) -> Option<ConstantValue> {
    let value = match op {
        BinaryOp::Equal => a == b,
        BinaryOp::NotEqual => a != b,
        BinaryOp::Less => a < b,
        BinaryOp::LessEqual => a <= b,
        BinaryOp::Greater => a > b,
        BinaryOp::GreaterEqual => a >= b,
        _ => return None,
    };
    Some(ConstantValue::Bool(value))
}

fn fold_int(op: BinaryOp, a: i32, b: i32) -> Option<ConstantValue> {
    if op.is_comparison() {
        return compare(op, a, b);
    }
    let value = match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Sub => a.wrapping_sub(b),
        BinaryOp::Mul => a.wrapping_mul(b),
        BinaryOp::Div if b != 0 => a.wrapping_div(b),
        BinaryOp::Mod if b != 0 => a.wrapping_rem(b),
        BinaryOp::BitwiseAnd => a & b,
        BinaryOp::BitwiseOr => a | b,
        BinaryOp::BitwiseXor => a ^ b,
        _ => return None,
    };
    Some(ConstantValue::Int(value))
}

fn fold_long(op: BinaryOp, a: i64, b: i64) -> Option<ConstantValue> {
    if op.is_comparison() {
        return compare(op, a, b);
    }
    let value = match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Sub => a.wrapping_sub(b),
        BinaryOp::Mul => a.wrapping_mul(b),
        BinaryOp::Div if b != 0 => a.wrapping_div(b),
        BinaryOp::Mod if b != 0 => a.wrapping_rem(b),
        BinaryOp::BitwiseAnd => a & b,
        BinaryOp::BitwiseOr => a | b,
        BinaryOp::BitwiseXor => a ^ b,
        _ => return None,
    };
    Some(ConstantValue::Long(value))
}

fn fold_float(op: BinaryOp, a: f64, b: f64) -> Option<ConstantValue> {
    if op.is_comparison() {
        return compare(op, a, b);
    }
    let value = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Mod => a % b,
        _ => return None,
    };
    Some(ConstantValue::Double(OrderedFloat(value)))
}

/// String form of a constant as concatenation renders it.
pub fn constant_text(value: &ConstantValue) -> Option<String> {
    Some(match value {
        ConstantValue::Null => "null".to_string(),
        ConstantValue::Bool(b) => b.to_string(),
        ConstantValue::Int(v) => v.to_string(),
        ConstantValue::Long(v) => v.to_string(),
        ConstantValue::Float(v) => float_text(f64::from(v.0), format!("{:e}", v.0)),
        ConstantValue::Double(v) => float_text(v.0, format!("{:e}", v.0)),
        ConstantValue::Char(c) => char::from_u32(u32::from(*c))?.to_string(),
        ConstantValue::String(s) => s.clone(),
        _ => return None,
    })
}

/// Text of a float as `StringBuilder.append` renders it: the shortest digits
/// that round-trip, plain between `1e-3` and `1e7`, `d.dddE±n` outside.
fn float_text(value: f64, shortest: String) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        let text = if value > 0.0 { "Infinity" } else { "-Infinity" };
        return text.to_string();
    }
    let sign = if value.is_sign_negative() { "-" } else { "" };
    if value == 0.0 {
        return format!("{}0.0", sign);
    }
    // `shortest` is Rust's `{:e}` form, e.g. `-1.25e-4`.
    let (mantissa, exponent) = shortest.split_once('e').unwrap_or((shortest.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let magnitude = value.abs();
    if (1e-3..1e7).contains(&magnitude) {
        let text = if exponent >= 0 {
            let point = exponent as usize + 1;
            let mut whole = digits.clone();
            while whole.len() < point {
                whole.push('0');
            }
            let fraction = &whole[point..];
            let fraction = if fraction.is_empty() { "0" } else { fraction };
            format!("{}.{}", &whole[..point], fraction)
        } else {
            format!("0.{}{}", "0".repeat((-exponent - 1) as usize), digits)
        };
        format!("{}{}", sign, text)
    } else {
        let rest = if digits.len() > 1 { &digits[1..] } else { "0" };
        format!("{}{}.{}E{}", sign, &digits[..1], rest, exponent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_concatenation_wins_over_arithmetic() {
        let ts = TypeSystem::new();
        let types = binary_types(&ts, BinaryOp::Add, ts.string_type(), TypeId::INT).unwrap();
        assert_eq!(types.result, ts.string_type());
        let folded = fold_binary(
            &ts,
            BinaryOp::Add,
            &ConstantValue::String("n=".into()),
            &ConstantValue::Int(3),
            types,
        );
        assert_eq!(folded, Some(ConstantValue::String("n=3".into())));
    }

    #[test]
    fn arithmetic_promotes_and_wraps() {
        let ts = TypeSystem::new();
        let types = binary_types(&ts, BinaryOp::Add, TypeId::BYTE, TypeId::SHORT).unwrap();
        assert_eq!(types.result, TypeId::INT);
        let folded = fold_binary(
            &ts,
            BinaryOp::Add,
            &ConstantValue::Int(i32::MAX),
            &ConstantValue::Int(1),
            types,
        );
        assert_eq!(folded, Some(ConstantValue::Int(i32::MIN)));
    }

    #[test]
    fn division_by_zero_is_not_folded() {
        let ts = TypeSystem::new();
        let types = binary_types(&ts, BinaryOp::Div, TypeId::INT, TypeId::INT).unwrap();
        assert_eq!(
            fold_binary(&ts, BinaryOp::Div, &ConstantValue::Int(1), &ConstantValue::Int(0), types),
            None
        );
    }

    #[test]
    fn wrappers_unbox_for_arithmetic_but_compare_by_identity() {
        let ts = TypeSystem::new();
        let integer = ts.boxed_type(PrimitiveKind::Int).unwrap();
        let sum = binary_types(&ts, BinaryOp::Add, integer, TypeId::LONG).unwrap();
        assert_eq!(sum.result, TypeId::LONG);
        let eq = binary_types(&ts, BinaryOp::Equal, integer, integer).unwrap();
        assert_eq!(eq.operand, ts.object_type());
    }

    #[test]
    fn shifts_mask_their_count() {
        let ts = TypeSystem::new();
        let types = binary_types(&ts, BinaryOp::ShiftLeft, TypeId::INT, TypeId::LONG).unwrap();
        assert_eq!(types.result, TypeId::INT);
        assert_eq!(
            fold_binary(&ts, BinaryOp::ShiftLeft, &ConstantValue::Int(1), &ConstantValue::Long(33), types),
            Some(ConstantValue::Int(2))
        );
    }

    #[test]
    fn casts_wrap_integral_values() {
        assert_eq!(
            cast_constant(&ConstantValue::Int(300), PrimitiveKind::Byte),
            Some(ConstantValue::Int(44))
        );
        assert_eq!(
            cast_constant(&ConstantValue::Double(OrderedFloat(3.9)), PrimitiveKind::Int),
            Some(ConstantValue::Int(3))
        );
        assert_eq!(constant_text(&ConstantValue::Double(OrderedFloat(2.0))).unwrap(), "2.0");
    }

    #[test]
    fn folded_floats_render_like_the_runtime_append() {
        let text = |value: ConstantValue| constant_text(&value).unwrap();
        assert_eq!(text(ConstantValue::Float(OrderedFloat(0.1))), "0.1");
        assert_eq!(text(ConstantValue::Double(OrderedFloat(1e10))), "1.0E10");
        assert_eq!(text(ConstantValue::Double(OrderedFloat(1234567.0))), "1234567.0");
        assert_eq!(text(ConstantValue::Double(OrderedFloat(1.5e7))), "1.5E7");
        assert_eq!(text(ConstantValue::Double(OrderedFloat(0.001))), "0.001");
        assert_eq!(text(ConstantValue::Double(OrderedFloat(-2.5e-4))), "-2.5E-4");
        assert_eq!(text(ConstantValue::Double(OrderedFloat(123.456))), "123.456");
        assert_eq!(text(ConstantValue::Float(OrderedFloat(-0.0))), "-0.0");
        assert_eq!(text(ConstantValue::Double(OrderedFloat(f64::NAN))), "NaN");

        let ts = TypeSystem::new();
        let types = binary_types(&ts, BinaryOp::Add, ts.string_type(), TypeId::FLOAT).unwrap();
        let folded = fold_binary(
            &ts,
            BinaryOp::Add,
            &ConstantValue::String("f=".to_string()),
            &ConstantValue::Float(OrderedFloat(0.1)),
            types,
        );
        assert_eq!(folded, Some(ConstantValue::String("f=0.1".to_string())));
    }

    #[test]
    fn boolean_operators_require_booleans() {
        let ts = TypeSystem::new();
        assert!(binary_types(&ts, BinaryOp::LogicalAnd, TypeId::INT, TypeId::BOOLEAN).is_none());
        assert!(unary_types(&ts, UnaryOp::LogicalNot, TypeId::BOOLEAN).is_some());
        assert!(unary_types(&ts, UnaryOp::BitwiseNot, TypeId::DOUBLE).is_none());
    }
}
