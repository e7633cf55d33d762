//! Resolution of source type references to interned types.
//!
//! A simple name is looked up, in order, among:
//!
//! 1. type parameters of the current method
//! 2. type parameters of the current type and its enclosing types
//! 3. nested types of the current type, its supertypes and its enclosing types
//! 4. types of the unit's package
//! 5. single-type imports
//! 6. on-demand imports
//! 7. the platform package `kestrel.lang`
//!
//! Dotted names resolve their head as above and walk nested types from there,
//! falling back to the longest fully qualified prefix.
//!
//! ## Example
//!
//! ```ignore
//! let resolver = TypeResolver::new(&session.types, &unit, def);
//! let list_of_string = resolver.resolve(&type_ref)?;
//! ```

use kestrel_core::ast::{CompilationUnit, TypeRef, TypeRefKind, WildcardBound};
use kestrel_core::{CompilationError, PLATFORM_PACKAGE};
use kestrel_types::{Bindings, MethodId, Type, TypeDefId, TypeId, TypeSystem, WildcardKind};
use tracing::trace;

/// Resolves type references in the context of one type (and optionally one method).
pub struct TypeResolver<'a> {
    ts: &'a TypeSystem,
    unit: &'a CompilationUnit,
    scope: TypeDefId,
    method: Option<MethodId>,
}

impl<'a> TypeResolver<'a> {
    pub fn new(ts: &'a TypeSystem, unit: &'a CompilationUnit, scope: TypeDefId) -> Self {
        Self {
            ts,
            unit,
            scope,
            method: None,
        }
    }

    /// Also consider the type parameters of `method`.
    pub fn in_method(mut self, method: MethodId) -> Self {
        self.method = Some(method);
        self
    }

    pub fn resolve(&self, type_ref: &TypeRef) -> Result<TypeId, CompilationError> {
        match &type_ref.kind {
            TypeRefKind::Primitive(kind) => Ok(TypeId::primitive(*kind)),
            TypeRefKind::Array(element) => {
                let element = self.resolve(element)?;
                if element.is_void() {
                    return Err(CompilationError::UnresolvedType {
                        name: type_ref.to_string(),
                    });
                }
                Ok(self.ts.array_of(element))
            }
            TypeRefKind::Wildcard(bound) => {
                let kind = match bound {
                    None => WildcardKind::Unbounded,
                    Some((WildcardBound::Extends, bound)) => WildcardKind::Extends(self.resolve(bound)?),
                    Some((WildcardBound::Super, bound)) => WildcardKind::Super(self.resolve(bound)?),
                };
                Ok(self.ts.wildcard(kind))
            }
            TypeRefKind::Named { name, type_args } => {
                let args = type_args
                    .iter()
                    .map(|arg| self.resolve(arg))
                    .collect::<Result<Vec<_>, _>>()?;

                if !name.contains('.') {
                    if let Some(param) = self.find_type_param(name) {
                        if !args.is_empty() {
                            return Err(CompilationError::TypeArgumentCount {
                                name: name.clone(),
                                expected: 0,
                                found: args.len(),
                            });
                        }
                        return Ok(param);
                    }
                }

                let def = self.resolve_name(name).ok_or_else(|| CompilationError::UnresolvedType {
                    name: name.clone(),
                })?;
                if !self.ts.can_access_type(self.scope, def) {
                    return Err(CompilationError::InaccessibleMember {
                        member: self.ts.def(def).full_name.clone(),
                        from: self.ts.def(self.scope).full_name.clone(),
                    });
                }
                self.instantiate(def, args)
            }
        }
    }

    /// Resolve a possibly dotted type name to its definition.
    pub fn resolve_name(&self, name: &str) -> Option<TypeDefId> {
        let segments: Vec<&str> = name.split('.').collect();
        let (head, rest) = segments.split_first()?;

        if let Some(def) = self.resolve_simple(head) {
            if let Some(found) = self.walk_nested(def, rest) {
                return Some(found);
            }
        }

        // Longest fully qualified prefix, then nested types.
        for split in (1..=segments.len()).rev() {
            let prefix = segments[..split].join(".");
            if let Some(def) = self.ts.find_type(&prefix) {
                return self.walk_nested(def, &segments[split..]);
            }
        }
        None
    }

    /// Bind type arguments to a definition, checking count and bounds.
    ///
    /// An empty argument list yields the raw type.
    pub fn instantiate(&self, def: TypeDefId, args: Vec<TypeId>) -> Result<TypeId, CompilationError> {
        let params = &self.ts.def(def).type_params;
        if args.is_empty() {
            return Ok(self.ts.raw_type(def));
        }
        if params.len() != args.len() {
            return Err(CompilationError::TypeArgumentCount {
                name: self.ts.def(def).full_name.clone(),
                expected: params.len(),
                found: args.len(),
            });
        }
        let bindings: Bindings = params.iter().copied().zip(args.iter().copied()).collect();
        for (&param, &arg) in params.iter().zip(&args) {
            if matches!(self.ts.get(arg), Type::Wildcard(_)) {
                continue;
            }
            for &bound in self.ts.type_param_bounds(param) {
                let bound = self.ts.substitute(bound, &bindings);
                if !self.ts.is_assignable_from(bound, arg) {
                    return Err(CompilationError::BoundViolation {
                        argument: self.ts.display(arg),
                        parameter: self.ts.display(param),
                    });
                }
            }
        }
        Ok(self.ts.reference(def, args))
    }

    // ==========================================================================
    // Lookup order
    // ==========================================================================

    fn find_type_param(&self, name: &str) -> Option<TypeId> {
        let named = |params: &[TypeId]| {
            params.iter().copied().find(|&p| match self.ts.get(p) {
                Type::TypeParam(id) => self.ts.type_param(id).name == name,
                _ => false,
            })
        };
        if let Some(method) = self.method {
            if let Some(found) = named(self.ts.method(method).type_params.as_slice()) {
                return Some(found);
            }
        }
        let mut current = Some(self.scope);
        while let Some(def) = current {
            let entry = self.ts.def(def);
            if let Some(found) = named(entry.type_params.as_slice()) {
                return Some(found);
            }
            // Static nested types cannot see their outer type's parameters.
            if entry.modifiers.is_static() {
                break;
            }
            current = entry.enclosing;
        }
        None
    }

    fn resolve_simple(&self, name: &str) -> Option<TypeDefId> {
        let found = self
            .find_member_type(name)
            .or_else(|| self.find_in_package(name))
            .or_else(|| self.find_single_import(name))
            .or_else(|| self.find_on_demand(name))
            .or_else(|| self.ts.find_type(&format!("{}.{}", PLATFORM_PACKAGE, name)));
        trace!(name, found = ?found, "resolve type name");
        found
    }

    /// Nested types of the scope, its supertypes and its enclosing types.
    fn find_member_type(&self, name: &str) -> Option<TypeDefId> {
        let mut current = Some(self.scope);
        while let Some(def) = current {
            if self.ts.def(def).name == name {
                return Some(def);
            }
            for level in self.ts.supertype_closure(self.ts.raw_type(def)) {
                if let Some(level_def) = self.ts.def_of(level) {
                    if let Some(nested) = self.ts.find_nested(level_def, name) {
                        return Some(nested);
                    }
                }
            }
            current = self.ts.def(def).enclosing;
        }
        None
    }

    fn find_in_package(&self, name: &str) -> Option<TypeDefId> {
        match &self.unit.package {
            Some(package) => self.ts.find_type(&format!("{}.{}", package, name)),
            None => self.ts.find_type(name),
        }
    }

    fn find_single_import(&self, name: &str) -> Option<TypeDefId> {
        self.unit
            .imports
            .iter()
            .filter(|import| !import.on_demand)
            .filter(|import| {
                import.path == name || import.path.rsplit('.').next() == Some(name)
            })
            .find_map(|import| self.ts.find_type(&import.path))
    }

    fn find_on_demand(&self, name: &str) -> Option<TypeDefId> {
        self.unit
            .imports
            .iter()
            .filter(|import| import.on_demand)
            .find_map(|import| self.ts.find_type(&format!("{}.{}", import.path, name)))
    }

    fn walk_nested(&self, mut def: TypeDefId, segments: &[&str]) -> Option<TypeDefId> {
        for segment in segments {
            def = self.ts.find_nested(def, segment)?;
        }
        Some(def)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_core::Modifiers;
    use kestrel_core::ast::AstBuilder;
    use kestrel_types::{TypeKind, TypeParamOwner};

    fn setup() -> (TypeSystem, TypeDefId, TypeDefId) {
        let mut ts = TypeSystem::new();
        let main = ts
            .define_type("Main", "app", TypeKind::Class, Modifiers::PUBLIC, None)
            .unwrap();
        let list = ts
            .define_type("List", "util", TypeKind::Interface, Modifiers::PUBLIC, None)
            .unwrap();
        let t = ts.new_type_param("T", TypeParamOwner::Type(list), 0);
        ts.def_mut(list).type_params.push(t);
        (ts, main, list)
    }

    #[test]
    fn platform_types_resolve_without_import() {
        let (ts, main, _) = setup();
        let b = AstBuilder::new();
        let unit = b.unit("Main.ks", Some("app"), vec![]);
        let resolver = TypeResolver::new(&ts, &unit, main);
        assert_eq!(resolver.resolve(&b.named("String")).unwrap(), ts.string_type());
    }

    #[test]
    fn imports_are_required_for_other_packages() {
        let (ts, main, list) = setup();
        let b = AstBuilder::new();
        let mut unit = b.unit("Main.ks", Some("app"), vec![]);
        let generic = b.generic("List", vec![b.named("String")]);
        assert!(matches!(
            TypeResolver::new(&ts, &unit, main).resolve(&generic),
            Err(CompilationError::UnresolvedType { .. })
        ));

        unit.imports.push(b.import("util", true));
        let resolved = TypeResolver::new(&ts, &unit, main).resolve(&generic).unwrap();
        assert_eq!(ts.def_of(resolved), Some(list));
        assert_eq!(ts.type_args(resolved), vec![ts.string_type()]);
    }

    #[test]
    fn wrong_type_argument_count_is_reported() {
        let (ts, main, _) = setup();
        let b = AstBuilder::new();
        let unit = b.unit("Main.ks", Some("app"), vec![]);
        let bad = b.generic("util.List", vec![b.int_type(), b.int_type()]);
        assert!(matches!(
            TypeResolver::new(&ts, &unit, main).resolve(&bad),
            Err(CompilationError::TypeArgumentCount {
                expected: 1,
                found: 2,
                ..
            })
        ));
    }

    #[test]
    fn bounds_are_checked_on_instantiation() {
        let mut ts = TypeSystem::new();
        let main = ts
            .define_type("Main", "app", TypeKind::Class, Modifiers::PUBLIC, None)
            .unwrap();
        let boxed = ts
            .define_type("Box", "app", TypeKind::Class, Modifiers::PUBLIC, None)
            .unwrap();
        let t = ts.new_type_param("T", TypeParamOwner::Type(boxed), 0);
        ts.def_mut(boxed).type_params.push(t);
        let string = ts.string_type();
        ts.set_type_param_bounds(t, vec![string]);

        let b = AstBuilder::new();
        let unit = b.unit("Main.ks", Some("app"), vec![]);
        let resolver = TypeResolver::new(&ts, &unit, main);
        assert!(resolver.resolve(&b.generic("Box", vec![b.named("String")])).is_ok());
        assert!(matches!(
            resolver.resolve(&b.generic("Box", vec![b.named("Object")])),
            Err(CompilationError::BoundViolation { .. })
        ));
    }

    #[test]
    fn nested_types_resolve_through_dotted_names() {
        let (mut ts, main, _) = setup();
        let inner = ts
            .define_type("Inner", "app", TypeKind::Class, Modifiers::PUBLIC, Some(main))
            .unwrap();
        let b = AstBuilder::new();
        let unit = b.unit("Main.ks", Some("app"), vec![]);
        let resolver = TypeResolver::new(&ts, &unit, main);
        assert_eq!(resolver.resolve_name("Inner"), Some(inner));
        assert_eq!(resolver.resolve_name("Main.Inner"), Some(inner));
        assert_eq!(resolver.resolve_name("app.Main.Inner"), Some(inner));
    }
}
