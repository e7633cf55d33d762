//! Type registry and member model for the Kestrel compiler.
//!
//! [`TypeSystem`] owns the identity of every type value and answers
//! assignability, accessibility, substitution and erasure queries.
//! [`MemberModel`] layers cached, inheritance-aware member lookup on top.

mod access;
mod assignability;
mod constant;
mod definitions;
mod fingerprint;
mod ids;
mod member_model;
mod members;
mod platform;
mod substitution;
mod type_system;
mod types;

pub use constant::{AnnotationInstance, ConstantValue};
pub use definitions::{
    AccessorRole, FieldDef, MethodDef, MethodKind, ParamDef, TypeDef, TypeKind,
};
pub use fingerprint::{TypeFingerprint, requires_dependent_rebuild};
pub use ids::{FieldId, LocalId, MethodId, TypeDefId, TypeId, TypeParamId};
pub use member_model::MemberModel;
pub use members::Member;
pub use platform::{PlatformTypes, unbox_method_name};
pub use substitution::Bindings;
pub use type_system::{TypeSystem, TypeSystemError};
pub use types::{Type, TypeParamDef, TypeParamOwner, WildcardKind};
