//! Structural fingerprints of type definitions.
//!
//! A fingerprint hashes everything a dependent type can observe: modifiers,
//! kind, base type, interfaces and every non-private member signature.
//! Member signatures are sorted first so declaration order does not matter.

use std::fmt;

use kestrel_core::Visibility;
use xxhash_rust::xxh64::Xxh64;

use crate::ids::TypeDefId;
use crate::type_system::TypeSystem;

const SEED: u64 = 0x6b65_7374_7265_6c00;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeFingerprint(pub u64);

impl TypeFingerprint {
    pub fn of(ts: &TypeSystem, def: TypeDefId) -> Self {
        let entry = ts.def(def);
        let mut hasher = Xxh64::new(SEED);

        hasher.update(entry.full_name.as_bytes());
        hasher.update(&entry.modifiers.bits().to_le_bytes());
        hasher.update(format!("{:?}", entry.kind).as_bytes());
        if let Some(base) = entry.base {
            hasher.update(b"extends ");
            hasher.update(ts.display(base).as_bytes());
        }
        for &interface in &entry.interfaces {
            hasher.update(b"implements ");
            hasher.update(ts.display(interface).as_bytes());
        }

        let mut members: Vec<String> = Vec::new();
        for &field in &entry.fields {
            let field = ts.field(field);
            if field.modifiers.visibility() != Visibility::Private {
                members.push(format!(
                    "field {} {} {:#x} {:?}",
                    field.name,
                    ts.display(field.ty),
                    field.modifiers.bits(),
                    field.constant
                ));
            }
        }
        for &method in &entry.methods {
            let m = ts.method(method);
            if m.modifiers.visibility() != Visibility::Private {
                members.push(format!(
                    "method {:?} {} {} {:#x}",
                    m.kind,
                    ts.method_signature(method),
                    ts.display(m.return_type),
                    m.modifiers.bits()
                ));
            }
        }
        for &nested in &entry.nested {
            if ts.def(nested).visibility() != Visibility::Private {
                members.push(format!("nested {}", TypeFingerprint::of(ts, nested)));
            }
        }
        members.sort_unstable();
        for member in &members {
            hasher.update(member.as_bytes());
            hasher.update(&[0]);
        }

        TypeFingerprint(hasher.digest())
    }
}

impl fmt::Display for TypeFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Whether types depending on a definition must be rebuilt.
///
/// Conservative: any observable change triggers a rebuild.
pub fn requires_dependent_rebuild(old: TypeFingerprint, new: TypeFingerprint) -> bool {
    old != new
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::{MethodKind, TypeKind};
    use crate::ids::TypeId;
    use kestrel_core::Modifiers;

    fn class(ts: &mut TypeSystem) -> TypeDefId {
        ts.define_type("Shape", "app", TypeKind::Class, Modifiers::PUBLIC, None)
            .unwrap()
    }

    #[test]
    fn private_members_do_not_affect_fingerprint() {
        let mut ts = TypeSystem::new();
        let def = class(&mut ts);
        let before = TypeFingerprint::of(&ts, def);
        ts.add_field(def, "cache", Modifiers::PRIVATE, TypeId::INT);
        ts.add_method(def, "helper", MethodKind::Method, Modifiers::PRIVATE, Vec::new(), TypeId::VOID);
        let after = TypeFingerprint::of(&ts, def);
        assert!(!requires_dependent_rebuild(before, after));
    }

    #[test]
    fn public_signature_change_requires_rebuild() {
        let mut ts = TypeSystem::new();
        let def = class(&mut ts);
        let before = TypeFingerprint::of(&ts, def);
        ts.add_method(def, "area", MethodKind::Method, Modifiers::PUBLIC, Vec::new(), TypeId::DOUBLE);
        let after = TypeFingerprint::of(&ts, def);
        assert!(requires_dependent_rebuild(before, after));
    }

    #[test]
    fn member_order_is_irrelevant() {
        let mut first = TypeSystem::new();
        let a = class(&mut first);
        first.add_field(a, "x", Modifiers::PUBLIC, TypeId::INT);
        first.add_field(a, "y", Modifiers::PUBLIC, TypeId::INT);

        let mut second = TypeSystem::new();
        let b = class(&mut second);
        second.add_field(b, "y", Modifiers::PUBLIC, TypeId::INT);
        second.add_field(b, "x", Modifiers::PUBLIC, TypeId::INT);

        assert_eq!(TypeFingerprint::of(&first, a), TypeFingerprint::of(&second, b));
    }
}
