//! Generic substitution and erasure.

use rustc_hash::FxHashMap;

use crate::ids::TypeId;
use crate::type_system::TypeSystem;
use crate::types::{Type, WildcardKind};

/// Type variable to type argument bindings of one generic instance.
pub type Bindings = FxHashMap<TypeId, TypeId>;

impl TypeSystem {
    /// Bindings introduced by a generic instance.
    ///
    /// Raw uses of a generic definition bind every parameter to its erasure.
    pub fn bindings_of(&self, instance: TypeId) -> Bindings {
        let Some(def) = self.def_of(instance) else {
            return Bindings::default();
        };
        let params = &self.def(def).type_params;
        let args = self.type_args(instance);
        if args.is_empty() {
            params.iter().map(|&p| (p, self.erasure(p))).collect()
        } else {
            params.iter().copied().zip(args).collect()
        }
    }

    /// Replace bound type variables in `ty`.
    pub fn substitute(&self, ty: TypeId, bindings: &Bindings) -> TypeId {
        if bindings.is_empty() {
            return ty;
        }
        match self.get(ty) {
            Type::TypeParam(_) => bindings.get(&ty).copied().unwrap_or(ty),
            Type::Array(element) => {
                let element = self.substitute(element, bindings);
                self.array_of(element)
            }
            Type::Reference { def, args } if !args.is_empty() => {
                let args = args.iter().map(|&a| self.substitute(a, bindings)).collect();
                self.reference(def, args)
            }
            Type::Wildcard(WildcardKind::Extends(bound)) => {
                let bound = self.substitute(bound, bindings);
                self.wildcard(WildcardKind::Extends(bound))
            }
            Type::Wildcard(WildcardKind::Super(bound)) => {
                let bound = self.substitute(bound, bindings);
                self.wildcard(WildcardKind::Super(bound))
            }
            _ => ty,
        }
    }

    /// The erased (runtime) type.
    ///
    /// Type variables erase to their first bound, or the root object when
    /// unbounded; generic instances erase to the raw definition.
    pub fn erasure(&self, ty: TypeId) -> TypeId {
        match self.get(ty) {
            Type::TypeParam(_) => match self.type_param_bounds(ty).first() {
                Some(&bound) => self.erasure(bound),
                None => self.object_type(),
            },
            Type::Reference { def, args } if !args.is_empty() => self.raw_type(def),
            Type::Array(element) => {
                let element = self.erasure(element);
                self.array_of(element)
            }
            Type::Wildcard(WildcardKind::Extends(bound)) => self.erasure(bound),
            Type::Wildcard(_) => self.object_type(),
            _ => ty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::TypeKind;
    use crate::types::TypeParamOwner;
    use kestrel_core::Modifiers;

    fn generic_box(ts: &mut TypeSystem, bound: Option<TypeId>) -> (crate::TypeDefId, TypeId) {
        let def = ts
            .define_type("Box", "app", TypeKind::Class, Modifiers::PUBLIC, None)
            .unwrap();
        let t = ts.new_type_param("T", TypeParamOwner::Type(def), 0);
        if let Some(bound) = bound {
            ts.set_type_param_bounds(t, vec![bound]);
        }
        ts.def_mut(def).type_params.push(t);
        (def, t)
    }

    #[test]
    fn substitute_replaces_nested_type_variables() {
        let mut ts = TypeSystem::new();
        let (def, t) = generic_box(&mut ts, None);
        let string = ts.string_type();
        let instance = ts.reference(def, vec![string]);
        let bindings = ts.bindings_of(instance);

        let array_of_t = ts.array_of(t);
        assert_eq!(ts.substitute(array_of_t, &bindings), ts.array_of(string));
        assert_eq!(ts.substitute(TypeId::INT, &bindings), TypeId::INT);
    }

    #[test]
    fn erasure_uses_first_bound() {
        let mut ts = TypeSystem::new();
        let string = ts.string_type();
        let (def, t) = generic_box(&mut ts, Some(string));
        assert_eq!(ts.erasure(t), string);
        let instance = ts.reference(def, vec![string]);
        assert_eq!(ts.erasure(instance), ts.raw_type(def));
    }

    #[test]
    fn unbounded_type_variable_erases_to_object() {
        let mut ts = TypeSystem::new();
        let (_, t) = generic_box(&mut ts, None);
        assert_eq!(ts.erasure(t), ts.object_type());
        assert_eq!(ts.erasure(ts.array_of(t)), ts.array_of(ts.object_type()));
    }

    #[test]
    fn raw_instance_binds_to_erasure() {
        let mut ts = TypeSystem::new();
        let (def, t) = generic_box(&mut ts, None);
        let raw = ts.raw_type(def);
        let bindings = ts.bindings_of(raw);
        assert_eq!(bindings.get(&t), Some(&ts.object_type()));
    }
}
