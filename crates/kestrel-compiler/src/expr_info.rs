//! Per-expression results of body validation.
//!
//! `ExpressionInfo` is written once by the validator and read unchanged by the
//! code generator.

use kestrel_types::{ConstantValue, Member, TypeId};

/// Implicit boxing applied to an expression's value at its use site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoxingKind {
    #[default]
    None,
    /// Primitive value wrapped into its platform wrapper.
    Box,
    /// Wrapper value converted to its primitive.
    Unbox,
}

/// Result of validating one expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionInfo {
    /// The static type of the expression.
    pub ty: TypeId,
    /// Folded compile-time value, if the expression is constant.
    pub constant: Option<ConstantValue>,
    /// The member a name, member access, element access or invocation resolved to.
    pub member: Option<Member>,
    pub boxing: BoxingKind,
    /// The expression names a type rather than a value (`Math.max`, `Color.RED`).
    pub is_type: bool,
}

impl ExpressionInfo {
    /// A plain value of type `ty`.
    ///
    /// # Example
    /// ```ignore
    /// let info = ExpressionInfo::value(TypeId::INT);
    /// assert!(info.constant.is_none());
    /// ```
    pub fn value(ty: TypeId) -> Self {
        Self {
            ty,
            constant: None,
            member: None,
            boxing: BoxingKind::None,
            is_type: false,
        }
    }

    pub fn constant(ty: TypeId, value: ConstantValue) -> Self {
        Self {
            constant: Some(value),
            ..Self::value(ty)
        }
    }

    pub fn member(ty: TypeId, member: Member) -> Self {
        Self {
            member: Some(member),
            ..Self::value(ty)
        }
    }

    /// A type name used as the qualifier of a static access.
    pub fn type_name(ty: TypeId) -> Self {
        Self {
            is_type: true,
            ..Self::value(ty)
        }
    }

    pub fn with_boxing(mut self, boxing: BoxingKind) -> Self {
        self.boxing = boxing;
        self
    }

    pub fn is_constant(&self) -> bool {
        self.constant.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_only_their_field() {
        let info = ExpressionInfo::constant(TypeId::INT, ConstantValue::Int(3));
        assert!(info.is_constant());
        assert!(info.member.is_none());
        assert!(!info.is_type);
        assert!(ExpressionInfo::type_name(TypeId::INT).is_type);
    }
}
