//! Primitive type kinds for Kestrel's built-in numeric, character and boolean types.

use std::fmt;

/// Primitive type kinds.
///
/// `Long` and `Double` are category-2 values: they occupy two operand-stack
/// and local-variable slots on the target machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveKind {
    Void,
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl PrimitiveKind {
    /// All non-void primitives, in declaration order.
    pub const VALUES: [PrimitiveKind; 8] = [
        PrimitiveKind::Boolean,
        PrimitiveKind::Byte,
        PrimitiveKind::Char,
        PrimitiveKind::Short,
        PrimitiveKind::Int,
        PrimitiveKind::Long,
        PrimitiveKind::Float,
        PrimitiveKind::Double,
    ];

    /// Source-level keyword for this primitive.
    pub const fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Void => "void",
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Char => "char",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
        }
    }

    /// Descriptor character used in binary signatures.
    pub const fn descriptor(self) -> char {
        match self {
            PrimitiveKind::Void => 'V',
            PrimitiveKind::Boolean => 'Z',
            PrimitiveKind::Byte => 'B',
            PrimitiveKind::Char => 'C',
            PrimitiveKind::Short => 'S',
            PrimitiveKind::Int => 'I',
            PrimitiveKind::Long => 'J',
            PrimitiveKind::Float => 'F',
            PrimitiveKind::Double => 'D',
        }
    }

    /// Number of stack/local slots a value of this kind occupies.
    pub const fn slots(self) -> u16 {
        match self {
            PrimitiveKind::Void => 0,
            PrimitiveKind::Long | PrimitiveKind::Double => 2,
            _ => 1,
        }
    }

    pub const fn is_category2(self) -> bool {
        self.slots() == 2
    }

    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            PrimitiveKind::Byte
                | PrimitiveKind::Char
                | PrimitiveKind::Short
                | PrimitiveKind::Int
                | PrimitiveKind::Long
                | PrimitiveKind::Float
                | PrimitiveKind::Double
        )
    }

    pub const fn is_integral(self) -> bool {
        matches!(
            self,
            PrimitiveKind::Byte
                | PrimitiveKind::Char
                | PrimitiveKind::Short
                | PrimitiveKind::Int
                | PrimitiveKind::Long
        )
    }

    /// Position on the widening lattice `byte < short < int < long < float < double`.
    ///
    /// `char` and `boolean` sit outside the lattice and widen only to themselves.
    pub const fn widening_rank(self) -> Option<u8> {
        match self {
            PrimitiveKind::Byte => Some(0),
            PrimitiveKind::Short => Some(1),
            PrimitiveKind::Int => Some(2),
            PrimitiveKind::Long => Some(3),
            PrimitiveKind::Float => Some(4),
            PrimitiveKind::Double => Some(5),
            _ => None,
        }
    }

    /// Whether a value of `source` widens implicitly to `self`.
    pub fn widens_from(self, source: PrimitiveKind) -> bool {
        if self == source {
            return true;
        }
        match (self.widening_rank(), source.widening_rank()) {
            (Some(target), Some(source)) => source <= target,
            _ => false,
        }
    }

    /// The kind arithmetic on this kind is performed in on the stack machine.
    ///
    /// Sub-int integral kinds compute as `int`.
    pub const fn computational(self) -> PrimitiveKind {
        match self {
            PrimitiveKind::Byte
            | PrimitiveKind::Char
            | PrimitiveKind::Short
            | PrimitiveKind::Boolean => PrimitiveKind::Int,
            other => other,
        }
    }

    /// Inclusive value range of an integral kind, used for constant narrowing.
    pub const fn integral_range(self) -> Option<(i64, i64)> {
        match self {
            PrimitiveKind::Byte => Some((i8::MIN as i64, i8::MAX as i64)),
            PrimitiveKind::Short => Some((i16::MIN as i64, i16::MAX as i64)),
            PrimitiveKind::Char => Some((0, u16::MAX as i64)),
            PrimitiveKind::Int => Some((i32::MIN as i64, i32::MAX as i64)),
            PrimitiveKind::Long => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }

    /// Look up a primitive by its source keyword.
    pub fn from_name(name: &str) -> Option<PrimitiveKind> {
        match name {
            "void" => Some(PrimitiveKind::Void),
            "boolean" => Some(PrimitiveKind::Boolean),
            "byte" => Some(PrimitiveKind::Byte),
            "char" => Some(PrimitiveKind::Char),
            "short" => Some(PrimitiveKind::Short),
            "int" => Some(PrimitiveKind::Int),
            "long" => Some(PrimitiveKind::Long),
            "float" => Some(PrimitiveKind::Float),
            "double" => Some(PrimitiveKind::Double),
            _ => None,
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widening_follows_numeric_lattice() {
        assert!(PrimitiveKind::Long.widens_from(PrimitiveKind::Byte));
        assert!(PrimitiveKind::Double.widens_from(PrimitiveKind::Long));
        assert!(!PrimitiveKind::Int.widens_from(PrimitiveKind::Long));
        assert!(!PrimitiveKind::Short.widens_from(PrimitiveKind::Float));
    }

    #[test]
    fn char_and_boolean_only_widen_to_themselves() {
        assert!(PrimitiveKind::Char.widens_from(PrimitiveKind::Char));
        assert!(!PrimitiveKind::Int.widens_from(PrimitiveKind::Char));
        assert!(!PrimitiveKind::Char.widens_from(PrimitiveKind::Byte));
        assert!(!PrimitiveKind::Int.widens_from(PrimitiveKind::Boolean));
    }

    #[test]
    fn category2_kinds() {
        assert!(PrimitiveKind::Long.is_category2());
        assert!(PrimitiveKind::Double.is_category2());
        assert!(!PrimitiveKind::Float.is_category2());
        assert_eq!(PrimitiveKind::Void.slots(), 0);
    }

    #[test]
    fn keyword_round_trip() {
        for kind in PrimitiveKind::VALUES {
            assert_eq!(PrimitiveKind::from_name(kind.name()), Some(kind));
        }
    }
}
