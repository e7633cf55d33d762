//! The platform library seeded into every type system.
//!
//! Only the members the compiler itself depends on are declared: wrapper
//! boxing and unboxing, string building, enum and delegate support.

use kestrel_core::{Modifiers, PLATFORM_PACKAGE, PrimitiveKind};

use crate::definitions::{MethodKind, ParamDef, TypeKind};
use crate::ids::{TypeDefId, TypeId};
use crate::type_system::TypeSystem;

/// Definitions of the platform types in `kestrel.lang`.
#[derive(Debug, Clone)]
pub struct PlatformTypes {
    pub object: TypeDefId,
    pub string: TypeDefId,
    pub string_builder: TypeDefId,
    pub enum_base: TypeDefId,
    pub delegate: TypeDefId,
    pub annotation: TypeDefId,
    pub deprecated: TypeDefId,
    pub throwable: TypeDefId,
    pub illegal_argument: TypeDefId,
    wrappers: Vec<(PrimitiveKind, TypeDefId)>,
}

impl PlatformTypes {
    pub(crate) fn unseeded() -> Self {
        let none = TypeDefId(u32::MAX);
        Self {
            object: none,
            string: none,
            string_builder: none,
            enum_base: none,
            delegate: none,
            annotation: none,
            deprecated: none,
            throwable: none,
            illegal_argument: none,
            wrappers: Vec::new(),
        }
    }

    /// Wrapper type boxing `kind`.
    pub fn wrapper(&self, kind: PrimitiveKind) -> Option<TypeDefId> {
        self.wrappers
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, def)| *def)
    }

    /// Primitive kind a wrapper type unboxes to.
    pub fn unwrapped(&self, def: TypeDefId) -> Option<PrimitiveKind> {
        self.wrappers
            .iter()
            .find(|(_, d)| *d == def)
            .map(|(kind, _)| *kind)
    }
}

const WRAPPERS: [(PrimitiveKind, &str); 8] = [
    (PrimitiveKind::Boolean, "Boolean"),
    (PrimitiveKind::Byte, "Byte"),
    (PrimitiveKind::Char, "Character"),
    (PrimitiveKind::Short, "Short"),
    (PrimitiveKind::Int, "Integer"),
    (PrimitiveKind::Long, "Long"),
    (PrimitiveKind::Float, "Float"),
    (PrimitiveKind::Double, "Double"),
];

fn define(ts: &mut TypeSystem, name: &str, kind: TypeKind, modifiers: Modifiers) -> TypeDefId {
    let full_name = format!("{}.{}", PLATFORM_PACKAGE, name);
    let def = ts.insert_def(name, PLATFORM_PACKAGE, full_name, kind, modifiers, None);
    ts.def_mut(def).is_library = true;
    def
}

fn params(types: &[(&str, TypeId)]) -> Vec<ParamDef> {
    types
        .iter()
        .map(|(name, ty)| ParamDef {
            name: name.to_string(),
            ty: *ty,
        })
        .collect()
}

fn method(
    ts: &mut TypeSystem,
    def: TypeDefId,
    name: &str,
    modifiers: Modifiers,
    args: &[(&str, TypeId)],
    return_type: TypeId,
) {
    ts.add_method(
        def,
        name,
        MethodKind::Method,
        modifiers,
        params(args),
        return_type,
    );
}

fn constructor(ts: &mut TypeSystem, def: TypeDefId, modifiers: Modifiers, args: &[(&str, TypeId)]) {
    ts.add_method(
        def,
        "<init>",
        MethodKind::Constructor,
        modifiers,
        params(args),
        TypeId::VOID,
    );
}

pub(crate) fn seed(ts: &mut TypeSystem) -> PlatformTypes {
    let public = Modifiers::PUBLIC;
    let public_virtual = Modifiers::PUBLIC | Modifiers::VIRTUAL;
    let public_static = Modifiers::PUBLIC | Modifiers::STATIC;

    // === Object ===
    let object = define(ts, "Object", TypeKind::Class, public);
    let object_ty = ts.raw_type(object);

    let string = define(ts, "String", TypeKind::Class, public | Modifiers::FINAL);
    let string_ty = ts.raw_type(string);
    ts.def_mut(string).base = Some(object_ty);

    constructor(ts, object, public, &[]);
    method(ts, object, "toString", public_virtual, &[], string_ty);
    method(ts, object, "equals", public_virtual, &[("other", object_ty)], TypeId::BOOLEAN);
    method(ts, object, "hashCode", public_virtual, &[], TypeId::INT);

    // === String ===
    method(ts, string, "length", public, &[], TypeId::INT);
    method(ts, string, "concat", public, &[("other", string_ty)], string_ty);
    method(ts, string, "valueOf", public_static, &[("value", object_ty)], string_ty);

    // === StringBuilder ===
    let string_builder = define(ts, "StringBuilder", TypeKind::Class, public | Modifiers::FINAL);
    let builder_ty = ts.raw_type(string_builder);
    ts.def_mut(string_builder).base = Some(object_ty);
    constructor(ts, string_builder, public, &[]);
    constructor(ts, string_builder, public, &[("value", string_ty)]);
    let append_args = [
        string_ty,
        object_ty,
        TypeId::BOOLEAN,
        TypeId::CHAR,
        TypeId::INT,
        TypeId::LONG,
        TypeId::FLOAT,
        TypeId::DOUBLE,
    ];
    for arg in append_args {
        method(ts, string_builder, "append", public, &[("value", arg)], builder_ty);
    }
    method(
        ts,
        string_builder,
        "toString",
        public | Modifiers::OVERRIDE,
        &[],
        string_ty,
    );

    // === Enum ===
    let enum_base = define(ts, "Enum", TypeKind::Class, public | Modifiers::ABSTRACT);
    ts.def_mut(enum_base).base = Some(object_ty);
    constructor(
        ts,
        enum_base,
        Modifiers::PROTECTED,
        &[("name", string_ty), ("ordinal", TypeId::INT)],
    );
    method(ts, enum_base, "name", public | Modifiers::FINAL, &[], string_ty);
    method(ts, enum_base, "ordinal", public | Modifiers::FINAL, &[], TypeId::INT);

    // === Delegate ===
    let delegate = define(ts, "Delegate", TypeKind::Class, public | Modifiers::ABSTRACT);
    let delegate_ty = ts.raw_type(delegate);
    ts.def_mut(delegate).base = Some(object_ty);
    constructor(ts, delegate, Modifiers::PROTECTED, &[]);
    for name in ["combine", "remove"] {
        method(
            ts,
            delegate,
            name,
            public_static,
            &[("first", delegate_ty), ("second", delegate_ty)],
            delegate_ty,
        );
    }

    // === Annotations ===
    let annotation = define(ts, "Annotation", TypeKind::Interface, public);
    let annotation_ty = ts.raw_type(annotation);
    let deprecated = define(ts, "Deprecated", TypeKind::Annotation, public);
    ts.def_mut(deprecated).interfaces.push(annotation_ty);

    // === Throwables ===
    let throwable = define(ts, "Throwable", TypeKind::Class, public);
    let throwable_ty = ts.raw_type(throwable);
    ts.def_mut(throwable).base = Some(object_ty);
    constructor(ts, throwable, public, &[]);
    constructor(ts, throwable, public, &[("message", string_ty)]);
    method(ts, throwable, "getMessage", public_virtual, &[], string_ty);

    let illegal_argument = define(ts, "IllegalArgumentException", TypeKind::Class, public);
    ts.def_mut(illegal_argument).base = Some(throwable_ty);
    constructor(ts, illegal_argument, public, &[("message", string_ty)]);

    // === Wrappers ===
    let mut wrappers = Vec::with_capacity(WRAPPERS.len());
    for (kind, name) in WRAPPERS {
        let wrapper = define(ts, name, TypeKind::Class, public | Modifiers::FINAL);
        let wrapper_ty = ts.raw_type(wrapper);
        let primitive = TypeId::primitive(kind);
        ts.def_mut(wrapper).base = Some(object_ty);
        method(ts, wrapper, "valueOf", public_static, &[("value", primitive)], wrapper_ty);
        method(ts, wrapper, &unbox_method_name(kind), public, &[], primitive);
        wrappers.push((kind, wrapper));
    }

    PlatformTypes {
        object,
        string,
        string_builder,
        enum_base,
        delegate,
        annotation,
        deprecated,
        throwable,
        illegal_argument,
        wrappers,
    }
}

/// Name of the wrapper instance method returning the primitive value, e.g. `intValue`.
pub fn unbox_method_name(kind: PrimitiveKind) -> String {
    format!("{}Value", kind.name())
}
