//! Interned type shapes.

use kestrel_core::PrimitiveKind;

use crate::ids::{MethodId, TypeDefId, TypeId, TypeParamId};

/// The shape of an interned type. Child types are referenced by [`TypeId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Primitive(PrimitiveKind),
    /// The type of `null`.
    Null,
    /// A class, interface, enum, delegate or annotation type.
    ///
    /// `args` is empty for non-generic definitions and for raw uses of a
    /// generic definition.
    Reference { def: TypeDefId, args: Vec<TypeId> },
    Array(TypeId),
    TypeParam(TypeParamId),
    Wildcard(WildcardKind),
}

/// A wildcard type argument. Only valid in variance checks, never instantiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WildcardKind {
    /// `?`
    Unbounded,
    /// `? extends B`
    Extends(TypeId),
    /// `? super B`
    Super(TypeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeParamOwner {
    Type(TypeDefId),
    Method(MethodId),
}

/// A declared generic parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeParamDef {
    pub name: String,
    pub owner: TypeParamOwner,
    pub index: u32,
    /// Empty when unbounded. Filled in once supertypes are resolved.
    pub bounds: Vec<TypeId>,
}

impl Type {
    pub fn is_reference_like(&self) -> bool {
        matches!(
            self,
            Type::Null | Type::Reference { .. } | Type::Array(_) | Type::TypeParam(_)
        )
    }
}
