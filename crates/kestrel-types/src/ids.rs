//! Handles into the [`TypeSystem`](crate::TypeSystem) tables.
//!
//! Every handle is a `u32` index. Handles are only meaningful for the type
//! system that issued them.

use std::fmt;

use kestrel_core::PrimitiveKind;

/// Interned type identity.
///
/// Two `TypeId`s are equal iff the types they denote are semantically
/// identical, so identity checks are plain `==`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) u32);

impl TypeId {
    // ========================================================================
    // Reserved TypeIds, interned at these indices by TypeSystem::new()
    // ========================================================================

    pub const VOID: TypeId = TypeId(0);
    pub const BOOLEAN: TypeId = TypeId(1);
    pub const BYTE: TypeId = TypeId(2);
    pub const CHAR: TypeId = TypeId(3);
    pub const SHORT: TypeId = TypeId(4);
    pub const INT: TypeId = TypeId(5);
    pub const LONG: TypeId = TypeId(6);
    pub const FLOAT: TypeId = TypeId(7);
    pub const DOUBLE: TypeId = TypeId(8);
    /// Type of the `null` literal.
    pub const NULL: TypeId = TypeId(9);

    /// First non-reserved index.
    pub const FIRST_DYNAMIC: u32 = 10;

    pub fn index(self) -> u32 {
        self.0
    }

    pub const fn primitive(kind: PrimitiveKind) -> TypeId {
        match kind {
            PrimitiveKind::Void => TypeId::VOID,
            PrimitiveKind::Boolean => TypeId::BOOLEAN,
            PrimitiveKind::Byte => TypeId::BYTE,
            PrimitiveKind::Char => TypeId::CHAR,
            PrimitiveKind::Short => TypeId::SHORT,
            PrimitiveKind::Int => TypeId::INT,
            PrimitiveKind::Long => TypeId::LONG,
            PrimitiveKind::Float => TypeId::FLOAT,
            PrimitiveKind::Double => TypeId::DOUBLE,
        }
    }

    /// The primitive kind of a reserved primitive id.
    pub const fn as_primitive(self) -> Option<PrimitiveKind> {
        match self.0 {
            0 => Some(PrimitiveKind::Void),
            1 => Some(PrimitiveKind::Boolean),
            2 => Some(PrimitiveKind::Byte),
            3 => Some(PrimitiveKind::Char),
            4 => Some(PrimitiveKind::Short),
            5 => Some(PrimitiveKind::Int),
            6 => Some(PrimitiveKind::Long),
            7 => Some(PrimitiveKind::Float),
            8 => Some(PrimitiveKind::Double),
            _ => None,
        }
    }

    #[inline]
    pub fn is_primitive(self) -> bool {
        self.0 <= TypeId::DOUBLE.0
    }

    #[inline]
    pub fn is_void(self) -> bool {
        self == TypeId::VOID
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self == TypeId::NULL
    }

    #[inline]
    pub fn is_numeric(self) -> bool {
        self.as_primitive().is_some_and(PrimitiveKind::is_numeric)
    }

    #[inline]
    pub fn is_integral(self) -> bool {
        self.as_primitive().is_some_and(PrimitiveKind::is_integral)
    }

    /// Operand stack slots used by a value of this type.
    #[inline]
    pub fn slots(self) -> u16 {
        match self.as_primitive() {
            Some(kind) => kind.slots(),
            None => 1,
        }
    }

    #[inline]
    pub fn is_category2(self) -> bool {
        self == TypeId::LONG || self == TypeId::DOUBLE
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_primitive() {
            Some(kind) => write!(f, "TypeId({})", kind),
            None if self.is_null() => write!(f, "TypeId(null)"),
            None => write!(f, "TypeId({})", self.0),
        }
    }
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
        pub struct $name(pub(crate) u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

define_id!(
    /// A class, interface, enum, delegate or annotation definition.
    TypeDefId
);
define_id!(
    /// A method, constructor or accessor.
    MethodId
);
define_id!(FieldId);
define_id!(
    /// A generic type parameter of a type or method.
    TypeParamId
);
define_id!(
    /// A local variable or parameter within one body.
    LocalId
);

impl LocalId {
    pub fn new(index: u32) -> Self {
        LocalId(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_primitives_round_trip() {
        for kind in PrimitiveKind::VALUES {
            assert_eq!(TypeId::primitive(kind).as_primitive(), Some(kind));
        }
        assert_eq!(TypeId::NULL.as_primitive(), None);
    }

    #[test]
    fn category2_slots() {
        assert_eq!(TypeId::LONG.slots(), 2);
        assert_eq!(TypeId::DOUBLE.slots(), 2);
        assert_eq!(TypeId::INT.slots(), 1);
        assert_eq!(TypeId(42).slots(), 1);
    }
}
