//! Compile-time constant values.

use std::fmt;

use kestrel_core::PrimitiveKind;
use ordered_float::OrderedFloat;

use crate::ids::TypeDefId;

/// A compile-time constant: literals, folded expressions and annotation values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstantValue {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(OrderedFloat<f32>),
    Double(OrderedFloat<f64>),
    Char(u16),
    String(String),
    /// An enum constant, usable as an annotation value.
    Enum { ty: TypeDefId, name: String },
    Array(Vec<ConstantValue>),
    Annotation(AnnotationInstance),
}

/// A validated annotation applied to a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnnotationInstance {
    pub ty: TypeDefId,
    /// Element values in declaration order of the annotation type, defaults included.
    pub values: Vec<(String, ConstantValue)>,
}

impl ConstantValue {
    /// Integral value of an integral or char constant.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConstantValue::Int(v) => Some(i64::from(*v)),
            ConstantValue::Long(v) => Some(*v),
            ConstantValue::Char(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConstantValue::Float(v) => Some(f64::from(v.0)),
            ConstantValue::Double(v) => Some(v.0),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConstantValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The primitive kind of a primitive constant.
    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match self {
            ConstantValue::Bool(_) => Some(PrimitiveKind::Boolean),
            ConstantValue::Int(_) => Some(PrimitiveKind::Int),
            ConstantValue::Long(_) => Some(PrimitiveKind::Long),
            ConstantValue::Float(_) => Some(PrimitiveKind::Float),
            ConstantValue::Double(_) => Some(PrimitiveKind::Double),
            ConstantValue::Char(_) => Some(PrimitiveKind::Char),
            _ => None,
        }
    }

    /// Convert a numeric constant to `target`, checking integral ranges.
    ///
    /// Returns `None` when the value does not fit.
    pub fn narrow_to(&self, target: PrimitiveKind) -> Option<ConstantValue> {
        match target {
            PrimitiveKind::Byte | PrimitiveKind::Short | PrimitiveKind::Int => {
                let value = self.as_i64()?;
                let (min, max) = target.integral_range()?;
                (min..=max)
                    .contains(&value)
                    .then(|| ConstantValue::Int(value as i32))
            }
            PrimitiveKind::Char => {
                let value = self.as_i64()?;
                u16::try_from(value).ok().map(ConstantValue::Char)
            }
            PrimitiveKind::Long => self.as_i64().map(ConstantValue::Long),
            PrimitiveKind::Float => self.as_f64().map(|v| ConstantValue::Float(OrderedFloat(v as f32))),
            PrimitiveKind::Double => self.as_f64().map(|v| ConstantValue::Double(OrderedFloat(v))),
            PrimitiveKind::Boolean => self.as_bool().map(ConstantValue::Bool),
            PrimitiveKind::Void => None,
        }
    }
}

impl fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantValue::Null => write!(f, "null"),
            ConstantValue::Bool(b) => write!(f, "{}", b),
            ConstantValue::Int(v) => write!(f, "{}", v),
            ConstantValue::Long(v) => write!(f, "{}L", v),
            ConstantValue::Float(v) => write!(f, "{}f", v),
            ConstantValue::Double(v) => write!(f, "{}", v),
            ConstantValue::Char(v) => write!(f, "'\\u{:04x}'", v),
            ConstantValue::String(s) => write!(f, "\"{}\"", s),
            ConstantValue::Enum { name, .. } => write!(f, "{}", name),
            ConstantValue::Array(values) => {
                write!(f, "{{")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, "}}")
            }
            ConstantValue::Annotation(_) => write!(f, "@annotation"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_narrows_to_byte_only_in_range() {
        assert_eq!(
            ConstantValue::Int(127).narrow_to(PrimitiveKind::Byte),
            Some(ConstantValue::Int(127))
        );
        assert_eq!(ConstantValue::Int(128).narrow_to(PrimitiveKind::Byte), None);
        assert_eq!(ConstantValue::Int(-129).narrow_to(PrimitiveKind::Byte), None);
    }

    #[test]
    fn int_narrows_to_short_and_char_ranges() {
        assert!(ConstantValue::Int(-32768).narrow_to(PrimitiveKind::Short).is_some());
        assert!(ConstantValue::Int(32768).narrow_to(PrimitiveKind::Short).is_none());
        assert_eq!(
            ConstantValue::Int(65535).narrow_to(PrimitiveKind::Char),
            Some(ConstantValue::Char(65535))
        );
        assert!(ConstantValue::Int(-1).narrow_to(PrimitiveKind::Char).is_none());
    }

    #[test]
    fn widening_constant_conversions() {
        assert_eq!(
            ConstantValue::Int(3).narrow_to(PrimitiveKind::Long),
            Some(ConstantValue::Long(3))
        );
        assert_eq!(
            ConstantValue::Int(3).narrow_to(PrimitiveKind::Double),
            Some(ConstantValue::Double(OrderedFloat(3.0)))
        );
        assert_eq!(ConstantValue::Bool(true).narrow_to(PrimitiveKind::Int), None);
    }
}
