//! Type, method and field definitions stored in the [`TypeSystem`](crate::TypeSystem).
//!
//! Definitions are created in stages: a [`TypeDef`] exists after type
//! definition, its base and interfaces are filled in once supertypes are
//! resolved, and its members are added during member definition.

use std::fmt;

use kestrel_core::{Modifiers, Visibility};

use crate::constant::{AnnotationInstance, ConstantValue};
use crate::ids::{FieldId, MethodId, TypeDefId, TypeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Class,
    Interface,
    Enum,
    Delegate,
    Annotation,
}

impl TypeKind {
    pub fn is_interface_like(self) -> bool {
        matches!(self, TypeKind::Interface | TypeKind::Annotation)
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKind::Class => write!(f, "class"),
            TypeKind::Interface => write!(f, "interface"),
            TypeKind::Enum => write!(f, "enum"),
            TypeKind::Delegate => write!(f, "delegate"),
            TypeKind::Annotation => write!(f, "annotation"),
        }
    }
}

/// A class, interface, enum, delegate or annotation definition.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDef {
    pub id: TypeDefId,
    /// Simple name.
    pub name: String,
    /// Dotted package name, empty for the default package.
    pub package: String,
    /// Dotted fully qualified name, nested types included (`app.Outer.Inner`).
    pub full_name: String,
    pub kind: TypeKind,
    pub modifiers: Modifiers,
    /// Enclosing type for nested types.
    pub enclosing: Option<TypeDefId>,
    /// `TypeParam` types, in declaration order.
    pub type_params: Vec<TypeId>,

    // === Inheritance ===
    pub base: Option<TypeId>,
    pub interfaces: Vec<TypeId>,

    // === Members ===
    pub fields: Vec<FieldId>,
    pub methods: Vec<MethodId>,
    pub nested: Vec<TypeDefId>,

    pub annotations: Vec<AnnotationInstance>,
    /// Loaded from the platform or a library rather than compiled from source.
    pub is_library: bool,
}

impl TypeDef {
    pub fn visibility(&self) -> Visibility {
        self.modifiers.visibility()
    }

    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }

    pub fn is_interface(&self) -> bool {
        self.kind.is_interface_like()
    }
}

/// The role an accessor method plays for a property or indexer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AccessorRole {
    PropertyGet(String),
    PropertySet(String),
    IndexerGet,
    IndexerSet,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MethodKind {
    Method,
    Constructor,
    /// `<clinit>`
    StaticInitializer,
    Accessor(AccessorRole),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamDef {
    pub name: String,
    pub ty: TypeId,
}

/// A method, constructor or accessor.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDef {
    pub id: MethodId,
    pub declaring: TypeDefId,
    pub name: String,
    pub kind: MethodKind,
    pub modifiers: Modifiers,
    pub type_params: Vec<TypeId>,
    pub params: Vec<ParamDef>,
    pub return_type: TypeId,
    /// A partial method with no implementing part. Calls to it are dropped.
    pub excluded: bool,
    /// Default value of an annotation element.
    pub default_value: Option<ConstantValue>,
    pub annotations: Vec<AnnotationInstance>,
    pub deprecated: bool,
}

impl MethodDef {
    pub fn is_static(&self) -> bool {
        self.modifiers.is_static()
    }

    pub fn is_constructor(&self) -> bool {
        self.kind == MethodKind::Constructor
    }

    pub fn accessor(&self) -> Option<&AccessorRole> {
        match &self.kind {
            MethodKind::Accessor(role) => Some(role),
            _ => None,
        }
    }

    /// A plain method: not a constructor, initializer or accessor.
    pub fn is_plain(&self) -> bool {
        self.kind == MethodKind::Method
    }

    /// Whether a derived type may override this method.
    pub fn is_overridable(&self) -> bool {
        !self.is_static()
            && !self.modifiers.contains(Modifiers::PRIVATE)
            && !self.modifiers.is_final()
            && self
                .modifiers
                .intersects(Modifiers::VIRTUAL | Modifiers::ABSTRACT | Modifiers::OVERRIDE)
    }

    pub fn param_types(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.params.iter().map(|p| p.ty)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub id: FieldId,
    pub declaring: TypeDefId,
    pub name: String,
    pub modifiers: Modifiers,
    pub ty: TypeId,
    /// Compile-time constant value of a `static final` field.
    pub constant: Option<ConstantValue>,
    pub annotations: Vec<AnnotationInstance>,
    pub deprecated: bool,
}

impl FieldDef {
    pub fn is_static(&self) -> bool {
        self.modifiers.is_static()
    }
}
