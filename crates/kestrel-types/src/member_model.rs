//! Cached, inheritance-walking member lookup.
//!
//! ## Lookup
//!
//! [`MemberModel::lookup_members`] walks a type and its transitive supertypes
//! breadth first. Each level contributes at most one field, at most one
//! property (getter and setter paired by property name) and every method or
//! nested type whose generic arity matches. The raw result is cached per
//! `(type, name, arity)`; accessibility filtering and override pruning run on
//! every call because they depend on the accessing scope.
//!
//! ## Caching
//!
//! Each cache is write-once-per-key, read-many behind an `RwLock`. A miss is
//! computed without holding the lock and inserted with `entry().or_insert`, so
//! a racing writer never replaces a populated key. Caches are never
//! invalidated during a run; [`MemberModel::reset`] clears them between runs.
//!
//! No overload resolution happens here.

use std::hash::Hash;
use std::sync::{Arc, PoisonError, RwLock};

use kestrel_core::{Modifiers, Visibility};
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::definitions::{AccessorRole, MethodDef, MethodKind};
use crate::ids::{MethodId, TypeDefId, TypeId};
use crate::members::{Member, property_name};
use crate::type_system::TypeSystem;

type MemberKey = (TypeId, String, u32);
type IndexerKey = (TypeId, u32);

#[derive(Debug, Default)]
pub struct MemberModel {
    members: RwLock<FxHashMap<MemberKey, Arc<[Member]>>>,
    indexers: RwLock<FxHashMap<IndexerKey, Arc<[Member]>>>,
    overrides: RwLock<FxHashMap<MethodId, Arc<[MethodId]>>>,
}

fn cached<K, V>(lock: &RwLock<FxHashMap<K, V>>, key: K, compute: impl FnOnce() -> V) -> V
where
    K: Eq + Hash,
    V: Clone,
{
    if let Some(value) = lock
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&key)
    {
        return value.clone();
    }
    let value = compute();
    lock.write()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(key)
        .or_insert(value)
        .clone()
}

impl MemberModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every cached result.
    pub fn reset(&self) {
        self.members
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.indexers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.overrides
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    // ========================================================================
    // Named members
    // ========================================================================

    /// Members named `name` visible from `scope` on `ty` and its supertypes.
    pub fn lookup_members(
        &self,
        ts: &TypeSystem,
        scope: TypeDefId,
        ty: TypeId,
        name: &str,
        type_argument_count: u32,
    ) -> Vec<Member> {
        let raw = self.raw_members(ts, ty, name, type_argument_count);
        self.filter_members(ts, scope, &raw)
    }

    /// Members named `name` on `ty` and its supertypes before any filtering.
    ///
    /// Lets callers tell "no such member" apart from "not accessible".
    pub fn raw_members(&self, ts: &TypeSystem, ty: TypeId, name: &str, type_argument_count: u32) -> Arc<[Member]> {
        cached(
            &self.members,
            (ty, name.to_string(), type_argument_count),
            || {
                trace!(ty = %ts.display(ty), name, "member cache miss");
                Arc::from(collect_members(ts, ty, name, type_argument_count))
            },
        )
    }

    /// Apply accessibility, override pruning and hiding to collected members.
    ///
    /// `members` must be ordered nearest level first.
    pub fn filter_members(&self, ts: &TypeSystem, scope: TypeDefId, members: &[Member]) -> Vec<Member> {
        let accessible: Vec<&Member> = members
            .iter()
            .filter(|m| is_accessible(ts, scope, m))
            .collect();

        let mut result = Vec::with_capacity(accessible.len());
        let mut found_non_method = false;
        for (i, member) in accessible.iter().enumerate() {
            match member {
                Member::Method { id, owner } => {
                    let overridden = accessible.iter().enumerate().any(|(j, other)| {
                        j != i
                            && matches!(other, Member::Method { id: o, .. }
                                if self.overridden_members(ts, *o).contains(id))
                    });
                    let hidden = accessible[..i].iter().any(|other| match other {
                        Member::Method { id: o, owner: o_owner } => {
                            same_erased_signature(ts, (*o, *o_owner), (*id, *owner))
                        }
                        _ => false,
                    });
                    if !overridden && !hidden {
                        result.push((*member).clone());
                    }
                }
                Member::Field { .. } | Member::Property { .. } | Member::NestedType { .. } => {
                    if !found_non_method {
                        found_non_method = true;
                        result.push((*member).clone());
                    }
                }
                Member::Indexer { .. } | Member::Local { .. } => result.push((*member).clone()),
            }
        }
        result
    }

    // ========================================================================
    // Indexers
    // ========================================================================

    /// Indexers taking `arity` index arguments visible from `scope` on `ty`.
    ///
    /// A getter and setter pair into one member only when their index types
    /// and value type match; unpaired accessors surface as get-only or
    /// set-only indexers.
    pub fn lookup_indexers(
        &self,
        ts: &TypeSystem,
        scope: TypeDefId,
        ty: TypeId,
        arity: u32,
    ) -> Vec<Member> {
        let raw = cached(&self.indexers, (ty, arity), || {
            trace!(ty = %ts.display(ty), arity, "indexer cache miss");
            Arc::from(collect_indexers(ts, ty, arity as usize))
        });

        let accessible: Vec<&Member> = raw.iter().filter(|m| is_accessible(ts, scope, m)).collect();
        let mut result: Vec<Member> = Vec::with_capacity(accessible.len());
        for (i, member) in accessible.iter().enumerate() {
            let Some(accessor) = member.primary_accessor() else {
                continue;
            };
            let overridden = accessible.iter().enumerate().any(|(j, other)| {
                j != i
                    && other
                        .primary_accessor()
                        .is_some_and(|o| self.overridden_members(ts, o).contains(&accessor))
            });
            let params: Vec<TypeId> = member
                .parameter_types(ts)
                .into_iter()
                .map(|t| ts.erasure(t))
                .collect();
            let hidden = accessible[..i].iter().any(|other| {
                let other_params: Vec<TypeId> = other
                    .parameter_types(ts)
                    .into_iter()
                    .map(|t| ts.erasure(t))
                    .collect();
                other_params == params
            });
            if !overridden && !hidden {
                result.push((*member).clone());
            }
        }
        result
    }

    // ========================================================================
    // Overrides
    // ========================================================================

    /// Every supertype method that `method` overrides or implements.
    ///
    /// Computed once per method and cached.
    pub fn overridden_members(&self, ts: &TypeSystem, method: MethodId) -> Arc<[MethodId]> {
        cached(&self.overrides, method, || {
            Arc::from(collect_overridden(ts, method))
        })
    }

    /// A method declared directly on `def` whose erased parameter types match `params`.
    pub fn find_method(
        &self,
        ts: &TypeSystem,
        def: TypeDefId,
        name: &str,
        params: &[TypeId],
    ) -> Option<MethodId> {
        let erased: Vec<TypeId> = params.iter().map(|&p| ts.erasure(p)).collect();
        ts.def(def).methods.iter().copied().find(|&m| {
            let entry = ts.method(m);
            entry.name == name
                && entry.params.len() == erased.len()
                && entry
                    .params
                    .iter()
                    .zip(&erased)
                    .all(|(p, &e)| ts.erasure(p.ty) == e)
        })
    }

    /// Constructors declared on `def`.
    pub fn lookup_constructors(&self, ts: &TypeSystem, def: TypeDefId) -> Vec<MethodId> {
        ts.constructors(def).map(|m| m.id).collect()
    }
}

fn is_accessible(ts: &TypeSystem, scope: TypeDefId, member: &Member) -> bool {
    match member.declaring_type(ts) {
        Some(declaring) => ts.can_access(scope, declaring, member.visibility(ts)),
        None => true,
    }
}

fn collect_members(ts: &TypeSystem, ty: TypeId, name: &str, arity: u32) -> Vec<Member> {
    let mut found = Vec::new();
    for level in ts.supertype_closure(ty) {
        let Some(def) = ts.def_of(level) else {
            continue;
        };
        let entry = ts.def(def);

        if arity == 0 {
            if let Some(&field) = entry.fields.iter().find(|&&f| ts.field(f).name == name) {
                found.push(Member::Field {
                    id: field,
                    owner: level,
                });
            }

            let mut getter = None;
            let mut setter = None;
            for &m in &entry.methods {
                match ts.method(m).accessor() {
                    Some(role @ AccessorRole::PropertyGet(_)) if property_name(role) == Some(name) => {
                        getter.get_or_insert(m);
                    }
                    Some(role @ AccessorRole::PropertySet(_)) if property_name(role) == Some(name) => {
                        setter.get_or_insert(m);
                    }
                    _ => {}
                }
            }
            if getter.is_some() || setter.is_some() {
                found.push(Member::Property {
                    name: name.to_string(),
                    getter,
                    setter,
                    owner: level,
                });
            }
        }

        for &m in &entry.methods {
            let method = ts.method(m);
            if method.is_plain()
                && !method.excluded
                && method.name == name
                && method.type_params.len() as u32 == arity
            {
                found.push(Member::Method { id: m, owner: level });
            }
        }

        for &nested in &entry.nested {
            let nested_def = ts.def(nested);
            if nested_def.name == name && nested_def.type_params.len() as u32 == arity {
                found.push(Member::NestedType {
                    def: nested,
                    owner: level,
                });
            }
        }
    }
    found
}

fn collect_indexers(ts: &TypeSystem, ty: TypeId, arity: usize) -> Vec<Member> {
    let mut found = Vec::new();
    for level in ts.supertype_closure(ty) {
        let Some(def) = ts.def_of(level) else {
            continue;
        };
        let methods = &ts.def(def).methods;
        let getters: Vec<MethodId> = methods
            .iter()
            .copied()
            .filter(|&m| {
                let method = ts.method(m);
                method.kind == MethodKind::Accessor(AccessorRole::IndexerGet)
                    && method.params.len() == arity
            })
            .collect();
        let mut setters: Vec<Option<MethodId>> = methods
            .iter()
            .copied()
            .filter(|&m| {
                let method = ts.method(m);
                method.kind == MethodKind::Accessor(AccessorRole::IndexerSet)
                    && method.params.len() == arity + 1
            })
            .map(Some)
            .collect();

        for getter in getters {
            let paired = setters
                .iter_mut()
                .find(|slot| slot.is_some_and(|s| accessors_pair(ts, ts.method(getter), ts.method(s))))
                .and_then(Option::take);
            found.push(Member::Indexer {
                getter: Some(getter),
                setter: paired,
                owner: level,
            });
        }
        for setter in setters.into_iter().flatten() {
            found.push(Member::Indexer {
                getter: None,
                setter: Some(setter),
                owner: level,
            });
        }
    }
    found
}

/// Structural match between an indexer getter and setter.
fn accessors_pair(ts: &TypeSystem, getter: &MethodDef, setter: &MethodDef) -> bool {
    let Some((value, indexes)) = setter.params.split_last() else {
        return false;
    };
    getter.params.len() == indexes.len()
        && types_match(ts, getter.return_type, value.ty)
        && getter
            .params
            .iter()
            .zip(indexes)
            .all(|(g, s)| types_match(ts, g.ty, s.ty))
}

/// Equal, or equal after erasure when either side is a type variable.
fn types_match(ts: &TypeSystem, a: TypeId, b: TypeId) -> bool {
    a == b || ((ts.is_type_param(a) || ts.is_type_param(b)) && ts.erasure(a) == ts.erasure(b))
}

fn erased_params(ts: &TypeSystem, method: MethodId, owner: TypeId) -> Vec<TypeId> {
    let bindings = ts.bindings_of(owner);
    ts.method(method)
        .params
        .iter()
        .map(|p| ts.erasure(ts.substitute(p.ty, &bindings)))
        .collect()
}

fn same_erased_signature(ts: &TypeSystem, a: (MethodId, TypeId), b: (MethodId, TypeId)) -> bool {
    ts.method(a.0).name == ts.method(b.0).name && erased_params(ts, a.0, a.1) == erased_params(ts, b.0, b.1)
}

fn collect_overridden(ts: &TypeSystem, method: MethodId) -> Vec<MethodId> {
    let entry = ts.method(method);
    if entry.is_static() || !matches!(entry.kind, MethodKind::Method | MethodKind::Accessor(_)) {
        return Vec::new();
    }
    let own_type = ts.this_type(entry.declaring);
    let own_params = erased_params(ts, method, own_type);

    let mut overridden = Vec::new();
    for level in ts.supertype_closure(own_type).into_iter().skip(1) {
        let Some(def) = ts.def_of(level) else {
            continue;
        };
        let on_interface = ts.def(def).is_interface();
        for &candidate in &ts.def(def).methods {
            let base = ts.method(candidate);
            if base.name != entry.name
                || base.kind != entry.kind
                || base.is_static()
                || base.modifiers.visibility() == Visibility::Private
                || base.params.len() != entry.params.len()
            {
                continue;
            }
            let implements = on_interface
                || (entry.modifiers.contains(Modifiers::OVERRIDE) && base.is_overridable());
            if implements && erased_params(ts, candidate, level) == own_params {
                overridden.push(candidate);
            }
        }
    }
    overridden
}
