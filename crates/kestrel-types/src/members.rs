//! The uniform [`Member`] view over fields, methods, accessors, nested types and locals.

use kestrel_core::{Modifiers, Visibility};

use crate::definitions::AccessorRole;
use crate::ids::{FieldId, LocalId, MethodId, TypeDefId, TypeId};
use crate::type_system::TypeSystem;

/// A named member found by lookup.
///
/// `owner` is the (possibly generic) instance the member was found on, so
/// member types can be substituted with that instance's type arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Member {
    Field {
        id: FieldId,
        owner: TypeId,
    },
    Method {
        id: MethodId,
        owner: TypeId,
    },
    /// At least one accessor is always present.
    Property {
        name: String,
        getter: Option<MethodId>,
        setter: Option<MethodId>,
        owner: TypeId,
    },
    /// At least one accessor is always present.
    Indexer {
        getter: Option<MethodId>,
        setter: Option<MethodId>,
        owner: TypeId,
    },
    NestedType {
        def: TypeDefId,
        owner: TypeId,
    },
    Local {
        id: LocalId,
        name: String,
        ty: TypeId,
    },
}

impl Member {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Member::Field { .. } => "field",
            Member::Method { .. } => "method",
            Member::Property { .. } => "property",
            Member::Indexer { .. } => "indexer",
            Member::NestedType { .. } => "nested type",
            Member::Local { .. } => "local",
        }
    }

    pub fn owner(&self) -> Option<TypeId> {
        match self {
            Member::Field { owner, .. }
            | Member::Method { owner, .. }
            | Member::Property { owner, .. }
            | Member::Indexer { owner, .. }
            | Member::NestedType { owner, .. } => Some(*owner),
            Member::Local { .. } => None,
        }
    }

    /// The accessor that determines type and flags: the getter when present.
    pub fn primary_accessor(&self) -> Option<MethodId> {
        match self {
            Member::Property { getter, setter, .. } | Member::Indexer { getter, setter, .. } => {
                getter.or(*setter)
            }
            _ => None,
        }
    }

    pub fn name(&self, ts: &TypeSystem) -> String {
        match self {
            Member::Field { id, .. } => ts.field(*id).name.clone(),
            Member::Method { id, .. } => ts.method(*id).name.clone(),
            Member::Property { name, .. } => name.clone(),
            Member::Indexer { .. } => "this[]".to_string(),
            Member::NestedType { def, .. } => ts.def(*def).name.clone(),
            Member::Local { name, .. } => name.clone(),
        }
    }

    /// Definition that declares this member. `None` for locals.
    pub fn declaring_type(&self, ts: &TypeSystem) -> Option<TypeDefId> {
        match self {
            Member::Field { id, .. } => Some(ts.field(*id).declaring),
            Member::Method { id, .. } => Some(ts.method(*id).declaring),
            Member::Property { .. } | Member::Indexer { .. } => {
                self.primary_accessor().map(|m| ts.method(m).declaring)
            }
            Member::NestedType { def, .. } => ts.def(*def).enclosing,
            Member::Local { .. } => None,
        }
    }

    pub fn modifiers(&self, ts: &TypeSystem) -> Modifiers {
        match self {
            Member::Field { id, .. } => ts.field(*id).modifiers,
            Member::Method { id, .. } => ts.method(*id).modifiers,
            Member::Property { .. } | Member::Indexer { .. } => self
                .primary_accessor()
                .map(|m| ts.method(m).modifiers)
                .unwrap_or_default(),
            Member::NestedType { def, .. } => ts.def(*def).modifiers,
            Member::Local { .. } => Modifiers::empty(),
        }
    }

    pub fn is_static(&self, ts: &TypeSystem) -> bool {
        match self {
            // Nested types are always reachable without an instance.
            Member::NestedType { .. } => true,
            _ => self.modifiers(ts).is_static(),
        }
    }

    pub fn visibility(&self, ts: &TypeSystem) -> Visibility {
        match self {
            Member::Property { getter, setter, .. } | Member::Indexer { getter, setter, .. } => {
                // The most visible accessor decides whether the member is visible at all.
                [getter, setter]
                    .into_iter()
                    .flatten()
                    .map(|&m| ts.method(m).modifiers.visibility())
                    .max()
                    .unwrap_or_default()
            }
            Member::Local { .. } => Visibility::Private,
            _ => self.modifiers(ts).visibility(),
        }
    }

    /// The member's semantic type, substituted for its owner instance.
    ///
    /// Properties and indexers take the getter return type, or else the
    /// setter's last parameter. Methods report their return type.
    pub fn member_type(&self, ts: &TypeSystem) -> TypeId {
        let raw = match self {
            Member::Field { id, .. } => ts.field(*id).ty,
            Member::Method { id, .. } => ts.method(*id).return_type,
            Member::Property { getter, setter, .. } | Member::Indexer { getter, setter, .. } => {
                match (getter, setter) {
                    (Some(g), _) => ts.method(*g).return_type,
                    (None, Some(s)) => ts
                        .method(*s)
                        .params
                        .last()
                        .map(|p| p.ty)
                        .unwrap_or(TypeId::VOID),
                    (None, None) => TypeId::VOID,
                }
            }
            Member::NestedType { def, .. } => ts.raw_type(*def),
            Member::Local { ty, .. } => return *ty,
        };
        match self.owner() {
            Some(owner) => ts.substitute(raw, &ts.bindings_of(owner)),
            None => raw,
        }
    }

    /// Parameter types of a method or indexer getter, substituted for the owner.
    pub fn parameter_types(&self, ts: &TypeSystem) -> Vec<TypeId> {
        let (method, drop_value) = match self {
            Member::Method { id, .. } => (*id, false),
            Member::Indexer { getter: Some(g), .. } => (*g, false),
            Member::Indexer { setter: Some(s), .. } => (*s, true),
            _ => return Vec::new(),
        };
        let bindings = self.owner().map(|o| ts.bindings_of(o)).unwrap_or_default();
        let params = &ts.method(method).params;
        let count = if drop_value {
            params.len().saturating_sub(1)
        } else {
            params.len()
        };
        params[..count]
            .iter()
            .map(|p| ts.substitute(p.ty, &bindings))
            .collect()
    }

    pub fn is_deprecated(&self, ts: &TypeSystem) -> bool {
        match self {
            Member::Field { id, .. } => ts.field(*id).deprecated,
            Member::Method { id, .. } => ts.method(*id).deprecated,
            Member::Property { getter, setter, .. } | Member::Indexer { getter, setter, .. } => {
                [getter, setter]
                    .into_iter()
                    .flatten()
                    .any(|&m| ts.method(m).deprecated)
            }
            Member::NestedType { def, .. } => {
                let deprecated = ts.platform().deprecated;
                ts.def(*def).annotations.iter().any(|a| a.ty == deprecated)
            }
            Member::Local { .. } => false,
        }
    }
}

/// Property name for an accessor role, if it belongs to a property.
pub(crate) fn property_name(role: &AccessorRole) -> Option<&str> {
    match role {
        AccessorRole::PropertyGet(name) | AccessorRole::PropertySet(name) => Some(name),
        _ => None,
    }
}
