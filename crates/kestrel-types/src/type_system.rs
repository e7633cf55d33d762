//! The type registry: interned types plus type, method and field definitions.
//!
//! Types are interned, so every distinct shape (primitive, array, generic
//! instance, wildcard, type variable) is created exactly once per
//! [`TypeSystem`] and compared by [`TypeId`]. The interning table lives behind
//! a `RefCell` so that read-mostly operations like assignability can
//! create substituted instances through `&self`.

use std::cell::RefCell;

use kestrel_core::{Modifiers, PLATFORM_PACKAGE, PrimitiveKind};
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;
use tracing::trace;

use crate::definitions::{FieldDef, MethodDef, MethodKind, ParamDef, TypeDef, TypeKind};
use crate::ids::{FieldId, MethodId, TypeDefId, TypeId, TypeParamId};
use crate::platform::{self, PlatformTypes};
use crate::types::{Type, TypeParamDef, TypeParamOwner, WildcardKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeSystemError {
    #[error("the type '{name}' is already defined")]
    DuplicateType { name: String },
}

#[derive(Debug, Default)]
struct Interner {
    types: Vec<Type>,
    map: FxHashMap<Type, TypeId>,
}

impl Interner {
    fn intern(&mut self, ty: Type) -> TypeId {
        if let Some(&id) = self.map.get(&ty) {
            return id;
        }
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty.clone());
        self.map.insert(ty, id);
        id
    }
}

/// Registry of every type known to one compilation session.
#[derive(Debug)]
pub struct TypeSystem {
    interner: RefCell<Interner>,
    defs: Vec<TypeDef>,
    defs_by_name: FxHashMap<String, TypeDefId>,
    methods: Vec<MethodDef>,
    fields: Vec<FieldDef>,
    type_params: Vec<TypeParamDef>,
    packages: FxHashSet<String>,
    platform: PlatformTypes,
}

impl Default for TypeSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeSystem {
    /// Create a type system seeded with primitives and the platform library.
    pub fn new() -> Self {
        let mut interner = Interner::default();
        let reserved = [
            Type::Primitive(PrimitiveKind::Void),
            Type::Primitive(PrimitiveKind::Boolean),
            Type::Primitive(PrimitiveKind::Byte),
            Type::Primitive(PrimitiveKind::Char),
            Type::Primitive(PrimitiveKind::Short),
            Type::Primitive(PrimitiveKind::Int),
            Type::Primitive(PrimitiveKind::Long),
            Type::Primitive(PrimitiveKind::Float),
            Type::Primitive(PrimitiveKind::Double),
            Type::Null,
        ];
        for ty in reserved {
            interner.intern(ty);
        }
        debug_assert_eq!(interner.types.len() as u32, TypeId::FIRST_DYNAMIC);

        let mut ts = Self {
            interner: RefCell::new(interner),
            defs: Vec::new(),
            defs_by_name: FxHashMap::default(),
            methods: Vec::new(),
            fields: Vec::new(),
            type_params: Vec::new(),
            packages: FxHashSet::default(),
            platform: PlatformTypes::unseeded(),
        };
        ts.platform = platform::seed(&mut ts);
        ts
    }

    pub fn platform(&self) -> &PlatformTypes {
        &self.platform
    }

    // ========================================================================
    // Interning
    // ========================================================================

    pub fn intern(&self, ty: Type) -> TypeId {
        self.interner.borrow_mut().intern(ty)
    }

    /// The shape of an interned type.
    pub fn get(&self, id: TypeId) -> Type {
        self.interner.borrow().types[id.0 as usize].clone()
    }

    pub fn type_count(&self) -> usize {
        self.interner.borrow().types.len()
    }

    pub fn array_of(&self, element: TypeId) -> TypeId {
        self.intern(Type::Array(element))
    }

    pub fn reference(&self, def: TypeDefId, args: Vec<TypeId>) -> TypeId {
        self.intern(Type::Reference { def, args })
    }

    /// The non-generic (or raw) reference type of a definition.
    pub fn raw_type(&self, def: TypeDefId) -> TypeId {
        self.reference(def, Vec::new())
    }

    /// The type of `this` inside a definition: generic definitions are
    /// instantiated with their own type parameters.
    pub fn this_type(&self, def: TypeDefId) -> TypeId {
        let args = self.def(def).type_params.clone();
        self.reference(def, args)
    }

    pub fn wildcard(&self, kind: WildcardKind) -> TypeId {
        self.intern(Type::Wildcard(kind))
    }

    pub fn element_type(&self, ty: TypeId) -> Option<TypeId> {
        match self.get(ty) {
            Type::Array(element) => Some(element),
            _ => None,
        }
    }

    /// Definition of a reference type.
    pub fn def_of(&self, ty: TypeId) -> Option<TypeDefId> {
        match self.get(ty) {
            Type::Reference { def, .. } => Some(def),
            _ => None,
        }
    }

    pub fn type_args(&self, ty: TypeId) -> Vec<TypeId> {
        match self.get(ty) {
            Type::Reference { args, .. } => args,
            _ => Vec::new(),
        }
    }

    pub fn is_reference(&self, ty: TypeId) -> bool {
        self.get(ty).is_reference_like()
    }

    pub fn is_array(&self, ty: TypeId) -> bool {
        matches!(self.get(ty), Type::Array(_))
    }

    pub fn is_type_param(&self, ty: TypeId) -> bool {
        matches!(self.get(ty), Type::TypeParam(_))
    }

    // ========================================================================
    // Platform shortcuts
    // ========================================================================

    pub fn object_type(&self) -> TypeId {
        self.raw_type(self.platform.object)
    }

    pub fn string_type(&self) -> TypeId {
        self.raw_type(self.platform.string)
    }

    pub fn is_string(&self, ty: TypeId) -> bool {
        self.def_of(ty) == Some(self.platform.string)
    }

    pub fn is_object(&self, ty: TypeId) -> bool {
        self.def_of(ty) == Some(self.platform.object)
    }

    /// Whether `ty` is a delegate type (including the platform `Delegate` base).
    pub fn is_delegate(&self, ty: TypeId) -> bool {
        match self.def_of(ty) {
            Some(def) => def == self.platform.delegate || self.def(def).kind == TypeKind::Delegate,
            None => false,
        }
    }

    // ========================================================================
    // Type definitions
    // ========================================================================

    /// Register a new type definition.
    ///
    /// Fails if a type with the same fully qualified name already exists.
    pub fn define_type(
        &mut self,
        name: &str,
        package: &str,
        kind: TypeKind,
        modifiers: Modifiers,
        enclosing: Option<TypeDefId>,
    ) -> Result<TypeDefId, TypeSystemError> {
        let full_name = match enclosing {
            Some(outer) => format!("{}.{}", self.def(outer).full_name, name),
            None if package.is_empty() => name.to_string(),
            None => format!("{}.{}", package, name),
        };
        if self.defs_by_name.contains_key(&full_name) {
            return Err(TypeSystemError::DuplicateType { name: full_name });
        }
        Ok(self.insert_def(name, package, full_name, kind, modifiers, enclosing))
    }

    /// Register a pre-compiled library type.
    pub fn define_library_type(
        &mut self,
        name: &str,
        package: &str,
        kind: TypeKind,
        modifiers: Modifiers,
        enclosing: Option<TypeDefId>,
    ) -> Result<TypeDefId, TypeSystemError> {
        let id = self.define_type(name, package, kind, modifiers, enclosing)?;
        self.defs[id.index()].is_library = true;
        Ok(id)
    }

    pub(crate) fn insert_def(
        &mut self,
        name: &str,
        package: &str,
        full_name: String,
        kind: TypeKind,
        modifiers: Modifiers,
        enclosing: Option<TypeDefId>,
    ) -> TypeDefId {
        let id = TypeDefId(self.defs.len() as u32);
        trace!(%full_name, ?kind, "define type");
        self.defs.push(TypeDef {
            id,
            name: name.to_string(),
            package: package.to_string(),
            full_name: full_name.clone(),
            kind,
            modifiers,
            enclosing,
            type_params: Vec::new(),
            base: None,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            nested: Vec::new(),
            annotations: Vec::new(),
            is_library: false,
        });
        self.defs_by_name.insert(full_name, id);
        self.packages.insert(package.to_string());
        if let Some(outer) = enclosing {
            self.defs[outer.index()].nested.push(id);
        }
        id
    }

    pub fn def(&self, id: TypeDefId) -> &TypeDef {
        &self.defs[id.index()]
    }

    pub fn def_mut(&mut self, id: TypeDefId) -> &mut TypeDef {
        &mut self.defs[id.index()]
    }

    pub fn defs(&self) -> impl Iterator<Item = &TypeDef> {
        self.defs.iter()
    }

    /// Look up a type by fully qualified dotted name.
    pub fn find_type(&self, full_name: &str) -> Option<TypeDefId> {
        self.defs_by_name.get(full_name).copied()
    }

    pub fn find_nested(&self, outer: TypeDefId, name: &str) -> Option<TypeDefId> {
        self.def(outer)
            .nested
            .iter()
            .copied()
            .find(|&nested| self.def(nested).name == name)
    }

    pub fn has_package(&self, package: &str) -> bool {
        self.packages.contains(package)
    }

    /// Outermost enclosing definition of a (possibly nested) type.
    pub fn top_level(&self, mut def: TypeDefId) -> TypeDefId {
        while let Some(outer) = self.def(def).enclosing {
            def = outer;
        }
        def
    }

    /// Whether `def` is `ancestor` or transitively derives from it, by definition.
    pub fn derives_from(&self, def: TypeDefId, ancestor: TypeDefId) -> bool {
        let mut stack = vec![def];
        let mut seen = FxHashSet::default();
        while let Some(current) = stack.pop() {
            if current == ancestor {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            let entry = self.def(current);
            stack.extend(entry.base.iter().filter_map(|&b| self.def_of(b)));
            stack.extend(entry.interfaces.iter().filter_map(|&i| self.def_of(i)));
        }
        false
    }

    // ========================================================================
    // Type parameters
    // ========================================================================

    pub fn new_type_param(&mut self, name: &str, owner: TypeParamOwner, index: u32) -> TypeId {
        let id = TypeParamId(self.type_params.len() as u32);
        self.type_params.push(TypeParamDef {
            name: name.to_string(),
            owner,
            index,
            bounds: Vec::new(),
        });
        self.intern(Type::TypeParam(id))
    }

    pub fn type_param(&self, id: TypeParamId) -> &TypeParamDef {
        &self.type_params[id.index()]
    }

    /// Bounds of a type variable. Empty when unbounded or not a type variable.
    pub fn type_param_bounds(&self, ty: TypeId) -> &[TypeId] {
        match self.get(ty) {
            Type::TypeParam(id) => &self.type_params[id.index()].bounds,
            _ => &[],
        }
    }

    pub fn set_type_param_bounds(&mut self, ty: TypeId, bounds: Vec<TypeId>) {
        if let Type::TypeParam(id) = self.get(ty) {
            self.type_params[id.index()].bounds = bounds;
        }
    }

    // ========================================================================
    // Members
    // ========================================================================

    pub fn add_method(
        &mut self,
        declaring: TypeDefId,
        name: &str,
        kind: MethodKind,
        modifiers: Modifiers,
        params: Vec<ParamDef>,
        return_type: TypeId,
    ) -> MethodId {
        let id = MethodId(self.methods.len() as u32);
        self.methods.push(MethodDef {
            id,
            declaring,
            name: name.to_string(),
            kind,
            modifiers,
            type_params: Vec::new(),
            params,
            return_type,
            excluded: false,
            default_value: None,
            annotations: Vec::new(),
            deprecated: false,
        });
        self.defs[declaring.index()].methods.push(id);
        id
    }

    pub fn method(&self, id: MethodId) -> &MethodDef {
        &self.methods[id.index()]
    }

    pub fn method_mut(&mut self, id: MethodId) -> &mut MethodDef {
        &mut self.methods[id.index()]
    }

    pub fn add_field(
        &mut self,
        declaring: TypeDefId,
        name: &str,
        modifiers: Modifiers,
        ty: TypeId,
    ) -> FieldId {
        let id = FieldId(self.fields.len() as u32);
        self.fields.push(FieldDef {
            id,
            declaring,
            name: name.to_string(),
            modifiers,
            ty,
            constant: None,
            annotations: Vec::new(),
            deprecated: false,
        });
        self.defs[declaring.index()].fields.push(id);
        id
    }

    pub fn field(&self, id: FieldId) -> &FieldDef {
        &self.fields[id.index()]
    }

    pub fn field_mut(&mut self, id: FieldId) -> &mut FieldDef {
        &mut self.fields[id.index()]
    }

    /// Constructors declared directly on `def`.
    pub fn constructors(&self, def: TypeDefId) -> impl Iterator<Item = &MethodDef> {
        self.def(def)
            .methods
            .iter()
            .map(|&m| self.method(m))
            .filter(|m| m.is_constructor())
    }

    // ========================================================================
    // Naming
    // ========================================================================

    /// Source-style name of a type, for diagnostics.
    pub fn display(&self, ty: TypeId) -> String {
        match self.get(ty) {
            Type::Primitive(kind) => kind.name().to_string(),
            Type::Null => "null".to_string(),
            Type::Reference { def, args } => {
                let mut name = self.def(def).full_name.clone();
                if !args.is_empty() {
                    let args: Vec<String> = args.iter().map(|&a| self.display(a)).collect();
                    name.push('<');
                    name.push_str(&args.join(", "));
                    name.push('>');
                }
                name
            }
            Type::Array(element) => format!("{}[]", self.display(element)),
            Type::TypeParam(id) => self.type_param(id).name.clone(),
            Type::Wildcard(WildcardKind::Unbounded) => "?".to_string(),
            Type::Wildcard(WildcardKind::Extends(bound)) => {
                format!("? extends {}", self.display(bound))
            }
            Type::Wildcard(WildcardKind::Super(bound)) => format!("? super {}", self.display(bound)),
        }
    }

    /// Binary internal name: package segments joined by `/`, nesting by `$`.
    pub fn internal_name(&self, def: TypeDefId) -> String {
        let entry = self.def(def);
        match entry.enclosing {
            Some(outer) => format!("{}${}", self.internal_name(outer), entry.name),
            None if entry.package.is_empty() => entry.name.clone(),
            None => format!("{}/{}", entry.package.replace('.', "/"), entry.name),
        }
    }

    /// Binary name used as the key of emitted output (`app.Outer$Inner`).
    pub fn binary_name(&self, def: TypeDefId) -> String {
        self.internal_name(def).replace('/', ".")
    }

    /// Field or parameter descriptor of the erased type.
    pub fn descriptor(&self, ty: TypeId) -> String {
        let erased = self.erasure(ty);
        match self.get(erased) {
            Type::Primitive(kind) => kind.descriptor().to_string(),
            Type::Array(element) => format!("[{}", self.descriptor(element)),
            Type::Reference { def, .. } => format!("L{};", self.internal_name(def)),
            _ => format!("L{};", self.internal_name(self.platform.object)),
        }
    }

    pub fn method_descriptor(&self, method: MethodId) -> String {
        let entry = self.method(method);
        let params: String = entry.params.iter().map(|p| self.descriptor(p.ty)).collect();
        format!("({}){}", params, self.descriptor(entry.return_type))
    }

    /// Readable signature used in diagnostics, e.g. `m(int, kestrel.lang.String)`.
    pub fn method_signature(&self, method: MethodId) -> String {
        let entry = self.method(method);
        let params: Vec<String> = entry.params.iter().map(|p| self.display(p.ty)).collect();
        format!("{}({})", entry.name, params.join(", "))
    }

    /// Whether `package` is the platform package.
    pub fn is_platform_package(package: &str) -> bool {
        package == PLATFORM_PACKAGE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_identity_preserving() {
        let ts = TypeSystem::new();
        let a = ts.array_of(TypeId::INT);
        let b = ts.array_of(TypeId::INT);
        assert_eq!(a, b);
        assert_ne!(a, ts.array_of(TypeId::LONG));
    }

    #[test]
    fn generic_instances_are_memoized_by_arguments() {
        let mut ts = TypeSystem::new();
        let list = ts
            .define_type("List", "app", TypeKind::Interface, Modifiers::PUBLIC, None)
            .unwrap();
        let t = ts.new_type_param("T", TypeParamOwner::Type(list), 0);
        ts.def_mut(list).type_params.push(t);

        let string = ts.string_type();
        let first = ts.reference(list, vec![string]);
        let second = ts.reference(list, vec![string]);
        assert_eq!(first, second);
        assert_ne!(first, ts.reference(list, vec![ts.object_type()]));
        assert_eq!(ts.display(first), "app.List<kestrel.lang.String>");
    }

    #[test]
    fn duplicate_type_is_rejected() {
        let mut ts = TypeSystem::new();
        ts.define_type("Foo", "app", TypeKind::Class, Modifiers::PUBLIC, None)
            .unwrap();
        let err = ts
            .define_type("Foo", "app", TypeKind::Class, Modifiers::PUBLIC, None)
            .unwrap_err();
        assert_eq!(
            err,
            TypeSystemError::DuplicateType {
                name: "app.Foo".to_string()
            }
        );
    }

    #[test]
    fn nested_types_use_dollar_in_internal_name() {
        let mut ts = TypeSystem::new();
        let outer = ts
            .define_type("Outer", "app.model", TypeKind::Class, Modifiers::PUBLIC, None)
            .unwrap();
        let inner = ts
            .define_type("Inner", "app.model", TypeKind::Class, Modifiers::PUBLIC, Some(outer))
            .unwrap();
        assert_eq!(ts.def(inner).full_name, "app.model.Outer.Inner");
        assert_eq!(ts.internal_name(inner), "app/model/Outer$Inner");
        assert_eq!(ts.find_nested(outer, "Inner"), Some(inner));
        assert_eq!(ts.top_level(inner), outer);
    }

    #[test]
    fn descriptors_erase_and_nest() {
        let ts = TypeSystem::new();
        let strings = ts.array_of(ts.string_type());
        assert_eq!(ts.descriptor(strings), "[Lkestrel/lang/String;");
        assert_eq!(ts.descriptor(TypeId::LONG), "J");
    }
}
