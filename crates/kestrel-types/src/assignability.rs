//! Assignability, supertype walks, numeric promotion and boxing.

use kestrel_core::PrimitiveKind;
use rustc_hash::FxHashSet;

use crate::ids::TypeId;
use crate::type_system::TypeSystem;
use crate::types::{Type, WildcardKind};

impl TypeSystem {
    /// Immediate supertypes of `ty`, with generic arguments substituted.
    ///
    /// Interfaces and arrays report the root object as their supertype so that
    /// closure walks always terminate at it.
    pub fn direct_supertypes(&self, ty: TypeId) -> Vec<TypeId> {
        match self.get(ty) {
            Type::Reference { def, .. } => {
                if def == self.platform().object {
                    return Vec::new();
                }
                let bindings = self.bindings_of(ty);
                let entry = self.def(def);
                let mut supers = Vec::with_capacity(entry.interfaces.len() + 1);
                match entry.base {
                    Some(base) => supers.push(self.substitute(base, &bindings)),
                    None => supers.push(self.object_type()),
                }
                supers.extend(
                    entry
                        .interfaces
                        .iter()
                        .map(|&i| self.substitute(i, &bindings)),
                );
                supers
            }
            Type::Array(_) => vec![self.object_type()],
            Type::TypeParam(_) => {
                let bounds = self.type_param_bounds(ty);
                if bounds.is_empty() {
                    vec![self.object_type()]
                } else {
                    bounds.to_vec()
                }
            }
            _ => Vec::new(),
        }
    }

    /// `ty` followed by its transitive supertypes, breadth first, each once.
    ///
    /// An interface reachable along several paths appears only at its first
    /// (nearest) position.
    pub fn supertype_closure(&self, ty: TypeId) -> Vec<TypeId> {
        let mut order = vec![ty];
        let mut seen = FxHashSet::default();
        seen.insert(ty);
        let mut next = 0;
        while next < order.len() {
            for sup in self.direct_supertypes(order[next]) {
                if seen.insert(sup) {
                    order.push(sup);
                }
            }
            next += 1;
        }
        order
    }

    /// The instance of `def` that `ty` derives from, if any.
    pub fn as_super(&self, ty: TypeId, def: crate::TypeDefId) -> Option<TypeId> {
        self.supertype_closure(ty)
            .into_iter()
            .find(|&sup| self.def_of(sup) == Some(def))
    }

    /// Whether a value of type `source` may be assigned to `target` without conversion
    /// other than primitive widening.
    ///
    /// Boxing is not assignability; callers apply it separately.
    pub fn is_assignable_from(&self, target: TypeId, source: TypeId) -> bool {
        if target == source {
            return true;
        }
        let target_shape = self.get(target);
        let source_shape = self.get(source);
        match (&target_shape, &source_shape) {
            (Type::Primitive(t), Type::Primitive(s)) => {
                *t != PrimitiveKind::Void && *s != PrimitiveKind::Void && t.widens_from(*s)
            }
            (Type::Primitive(_), _) | (_, Type::Primitive(_)) => false,

            (_, Type::Null) => true,
            (Type::Null, _) => false,

            (Type::Wildcard(kind), _) => match *kind {
                WildcardKind::Unbounded => true,
                WildcardKind::Extends(bound) => self.is_assignable_from(bound, source),
                WildcardKind::Super(bound) => self.is_assignable_from(source, bound),
            },

            // A type variable accepts only itself and null.
            (Type::TypeParam(_), _) => false,
            (_, Type::TypeParam(_)) => {
                let bounds = self.type_param_bounds(source);
                if bounds.is_empty() {
                    self.is_object(target)
                } else {
                    bounds.iter().any(|&b| self.is_assignable_from(target, b))
                }
            }

            (_, Type::Wildcard(kind)) => match *kind {
                WildcardKind::Extends(bound) => self.is_assignable_from(target, bound),
                _ => self.is_object(target),
            },

            (Type::Array(t), Type::Array(s)) => {
                if t.is_primitive() || s.is_primitive() {
                    t == s
                } else {
                    self.is_assignable_from(*t, *s)
                }
            }
            (Type::Array(_), _) => false,
            (Type::Reference { .. }, Type::Array(_)) => self.is_object(target),

            (Type::Reference { def, args }, Type::Reference { .. }) => {
                if *def == self.platform().object {
                    return true;
                }
                let Some(sup) = self.as_super(source, *def) else {
                    return false;
                };
                let source_args = self.type_args(sup);
                if args.is_empty() {
                    return true;
                }
                if source_args.is_empty() {
                    return false;
                }
                args.len() == source_args.len()
                    && args
                        .iter()
                        .zip(&source_args)
                        .all(|(&t, &s)| self.contains_type_arg(t, s))
            }
        }
    }

    /// Type argument containment: identical, or admitted by a wildcard.
    fn contains_type_arg(&self, target: TypeId, source: TypeId) -> bool {
        target == source
            || (matches!(self.get(target), Type::Wildcard(_))
                && self.is_assignable_from(target, source))
    }

    // ========================================================================
    // Numeric promotion
    // ========================================================================

    /// Promotion of a single numeric operand: sub-int kinds promote to `int`.
    pub fn unary_numeric_promotion(&self, ty: TypeId) -> Option<TypeId> {
        let kind = ty.as_primitive().filter(|k| k.is_numeric())?;
        Some(TypeId::primitive(kind.computational()))
    }

    /// The common type of a binary numeric operation.
    pub fn binary_numeric_promotion(&self, left: TypeId, right: TypeId) -> Option<TypeId> {
        let left = self.unary_numeric_promotion(left)?;
        let right = self.unary_numeric_promotion(right)?;
        let promoted = [TypeId::DOUBLE, TypeId::FLOAT, TypeId::LONG]
            .into_iter()
            .find(|&wide| left == wide || right == wide)
            .unwrap_or(TypeId::INT);
        Some(promoted)
    }

    // ========================================================================
    // Boxing
    // ========================================================================

    /// The wrapper type of a primitive.
    pub fn boxed_type(&self, kind: PrimitiveKind) -> Option<TypeId> {
        self.platform().wrapper(kind).map(|def| self.raw_type(def))
    }

    /// The primitive a wrapper type unboxes to.
    pub fn unboxed_type(&self, ty: TypeId) -> Option<PrimitiveKind> {
        self.def_of(ty).and_then(|def| self.platform().unwrapped(def))
    }
}
