//! MembersDefinition stage - fields, methods, accessors and constructors.
//!
//! ## Responsibilities
//!
//! - Define fields, methods, property accessor pairs (`getX`/`setX`),
//!   indexer accessor pairs (`getItem`/`setItem`) and constructors, resolving
//!   every parameter, return and field type
//! - Pair partial method parts; unimplemented ones are excluded with a warning
//! - Synthesize implicit constructors, enum members (constant fields, hidden
//!   `(name, ordinal)` constructor parameters, `values()`, `valueOf(String)`),
//!   delegate `invoke` methods and static initializers
//! - Check duplicate signatures and `override` usage
//! - Evaluate `static final` constant fields
//!
//! Members of every type exist before any override is checked, so base types
//! declared later in the input are seen.

use std::rc::Rc;

use kestrel_core::ast::{
    AccessorDecl, CompilationUnit, ConstructorDecl, Expr, FieldDecl, IndexerDecl, MemberDecl, MethodDecl,
    ParamDecl, PropertyDecl, TypeDecl, TypeDeclKind, TypeParamDecl, TypeRef,
};
use kestrel_core::{CompilationError, CompilationWarning, Modifiers, Span, Visibility};
use kestrel_types::{
    AccessorRole, FieldId, MethodId, MethodKind, ParamDef, TypeDefId, TypeId, TypeParamOwner, TypeSystem,
};
use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use super::partials::{PartialMethodInfo, PartialMethods};
use super::{PassOutput, type_decls};
use crate::constant_eval::{DeclarationConstants, convert_constant};
use crate::node_tables::Builder;
use crate::session::CompilationSession;
use crate::type_resolver::TypeResolver;

/// Names of the hidden leading parameters of every enum constructor.
pub const ENUM_NAME_PARAM: &str = "$name";
pub const ENUM_ORDINAL_PARAM: &str = "$ordinal";

struct PendingConstant {
    field: FieldId,
    unit: Rc<CompilationUnit>,
    def: TypeDefId,
    init: Expr,
}

pub struct MembersDefinitionPass<'s> {
    session: &'s mut CompilationSession,
    partial_methods: PartialMethods,
    pending_constants: Vec<PendingConstant>,
    /// Source methods and accessors, checked for overrides at the end.
    declared: Vec<(MethodId, String, Span)>,
    with_constructor: FxHashSet<TypeDefId>,
    needs_static_init: FxHashSet<TypeDefId>,
    synthesized: FxHashSet<TypeDefId>,
    defined: usize,
}

impl<'s> MembersDefinitionPass<'s> {
    pub fn new(session: &'s mut CompilationSession) -> Self {
        Self {
            session,
            partial_methods: PartialMethods::default(),
            pending_constants: Vec::new(),
            declared: Vec::new(),
            with_constructor: FxHashSet::default(),
            needs_static_init: FxHashSet::default(),
            synthesized: FxHashSet::default(),
            defined: 0,
        }
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run(mut self) -> PassOutput {
        let units = self.session.units();
        for unit in &units {
            for decl in type_decls(unit) {
                if let Some(def) = self.session.tables.type_builder(decl.id) {
                    self.define_members(unit, decl, def);
                }
            }
        }
        // Once every part of a partial type has been seen.
        for unit in &units {
            for decl in type_decls(unit) {
                if let Some(def) = self.session.tables.type_builder(decl.id) {
                    self.synthesize(decl.kind, def);
                }
            }
        }
        self.finish_partial_methods();
        self.check_overrides();
        self.evaluate_constants();
        // Lookups made while checking overrides saw a half-built model.
        self.session.members.reset();
        debug!(members = self.defined, "members defined");
        PassOutput {
            processed: self.defined,
        }
    }

    fn define_members(&mut self, unit: &Rc<CompilationUnit>, decl: &TypeDecl, def: TypeDefId) {
        for member in &decl.members {
            match member {
                MemberDecl::Field(field) => self.define_field(unit, decl.kind, def, field),
                MemberDecl::Method(method) => self.define_method(unit, decl.kind, def, method),
                MemberDecl::Property(property) => self.define_property(unit, decl.kind, def, property),
                MemberDecl::Indexer(indexer) => self.define_indexer(unit, decl.kind, def, indexer),
                MemberDecl::Constructor(ctor) => self.define_constructor(unit, decl.kind, def, ctor),
                MemberDecl::Type(_) => {}
            }
        }

        for constant in &decl.enum_constants {
            if self.field_exists(def, &constant.name) {
                self.duplicate(&unit.file, constant.span, def, constant.name.clone());
                continue;
            }
            let ty = self.session.types.this_type(def);
            let modifiers = Modifiers::PUBLIC | Modifiers::STATIC | Modifiers::FINAL | Modifiers::ENUM;
            let field = self.session.types.add_field(def, &constant.name, modifiers, ty);
            self.session.tables.set_builder(constant.id, Builder::Field(field));
            self.needs_static_init.insert(def);
            self.defined += 1;
        }

        if let Some(signature) = &decl.delegate {
            let ts = &mut self.session.types;
            let invoke = ts.add_method(
                def,
                "invoke",
                MethodKind::Method,
                Modifiers::PUBLIC | Modifiers::ABSTRACT,
                Vec::new(),
                TypeId::VOID,
            );
            let params = self.resolve_params(unit, def, Some(invoke), &signature.params);
            let return_type = self.resolve(unit, def, Some(invoke), &signature.return_type);
            let entry = self.session.types.method_mut(invoke);
            entry.params = params;
            entry.return_type = return_type;
            self.defined += 1;
        }
    }

    // ==========================================================================
    // Fields
    // ==========================================================================

    fn define_field(&mut self, unit: &Rc<CompilationUnit>, kind: TypeDeclKind, def: TypeDefId, decl: &FieldDecl) {
        let ty = self.resolve(unit, def, None, &decl.ty);
        let mut modifiers = decl.modifiers;
        if is_interface_like(kind) {
            modifiers = modifiers.with_visibility(Visibility::Public) | Modifiers::STATIC | Modifiers::FINAL;
        }
        if self.field_exists(def, &decl.name) {
            self.duplicate(&unit.file, decl.span, def, decl.name.clone());
            return;
        }
        let field = self.session.types.add_field(def, &decl.name, modifiers, ty);
        self.session.tables.set_builder(decl.id, Builder::Field(field));
        self.defined += 1;

        let Some(init) = &decl.init else {
            return;
        };
        if modifiers.is_static() {
            self.needs_static_init.insert(def);
            let constant_type = ty.is_primitive() || self.session.types.is_string(ty);
            if modifiers.is_final() && constant_type {
                self.pending_constants.push(PendingConstant {
                    field,
                    unit: Rc::clone(unit),
                    def,
                    init: init.clone(),
                });
            }
        }
    }

    fn field_exists(&self, def: TypeDefId, name: &str) -> bool {
        let ts = &self.session.types;
        ts.def(def).fields.iter().any(|&f| ts.field(f).name == name)
    }

    // ==========================================================================
    // Methods
    // ==========================================================================

    fn define_method(&mut self, unit: &Rc<CompilationUnit>, kind: TypeDeclKind, def: TypeDefId, decl: &MethodDecl) {
        let file = unit.file.as_str();
        let interface = is_interface_like(kind);
        let mut modifiers = decl.modifiers;
        if interface {
            modifiers = modifiers.with_visibility(Visibility::Public);
            if decl.body.is_none() && !modifiers.is_static() {
                modifiers |= Modifiers::ABSTRACT;
            }
        }

        let method = self
            .session
            .types
            .add_method(def, &decl.name, MethodKind::Method, modifiers, Vec::new(), TypeId::VOID);
        self.define_method_type_params(unit, def, method, &decl.type_params);
        let params = self.resolve_params(unit, def, Some(method), &decl.params);
        let return_type = self.resolve(unit, def, Some(method), &decl.return_type);
        let entry = self.session.types.method_mut(method);
        entry.params = params;
        entry.return_type = return_type;
        self.session.tables.set_builder(decl.id, Builder::Method(method));
        trace!(method = %self.session.types.method_signature(method), "method defined");

        let bodiless_allowed =
            interface || modifiers.intersects(Modifiers::ABSTRACT | Modifiers::NATIVE | Modifiers::PARTIAL);
        if decl.body.is_none() && !bodiless_allowed {
            self.session.diagnostics.error(
                file,
                decl.span,
                CompilationError::MissingBody {
                    method: decl.name.clone(),
                },
            );
        }

        if modifiers.contains(Modifiers::PARTIAL) {
            self.pair_partial(file, def, method, decl);
            return;
        }
        self.check_duplicate(file, decl.span, def, method);
        self.declared.push((method, file.to_string(), decl.span));
        self.defined += 1;
    }

    fn define_method_type_params(
        &mut self,
        unit: &CompilationUnit,
        def: TypeDefId,
        method: MethodId,
        params: &[TypeParamDecl],
    ) {
        for (index, param) in params.iter().enumerate() {
            let ts = &mut self.session.types;
            let ty = ts.new_type_param(&param.name, TypeParamOwner::Method(method), index as u32);
            ts.method_mut(method).type_params.push(ty);
        }
        for (index, param) in params.iter().enumerate() {
            let Some(bound) = &param.bound else {
                continue;
            };
            let bound = self.resolve(unit, def, Some(method), bound);
            let ty = self.session.types.method(method).type_params[index];
            self.session.types.set_type_param_bounds(ty, vec![bound]);
        }
    }

    /// Merge a partial method part into the part seen before it.
    ///
    /// The implementing part's definition survives; the other is dropped from
    /// its type and every part's node is pointed at the survivor.
    fn pair_partial(&mut self, file: &str, def: TypeDefId, method: MethodId, decl: &MethodDecl) {
        let ts = &self.session.types;
        let signature = partial_signature(ts, method);
        let implementing = decl.body.is_some();

        let Some(info) = self.partial_methods.get_mut(def, &signature) else {
            self.partial_methods.insert(
                def,
                signature,
                PartialMethodInfo {
                    method,
                    file: file.to_string(),
                    span: decl.span,
                    has_declaration: !implementing,
                    has_implementation: implementing,
                    nodes: vec![decl.id],
                },
            );
            self.declared.push((method, file.to_string(), decl.span));
            self.defined += 1;
            return;
        };

        let repeated = if implementing {
            info.has_implementation
        } else {
            info.has_declaration
        };
        info.nodes.push(decl.id);
        let dropped = if implementing {
            let previous = info.method;
            info.method = method;
            info.has_implementation = true;
            previous
        } else {
            info.has_declaration = true;
            method
        };
        let survivor = info.method;
        let nodes = info.nodes.clone();

        if repeated {
            let type_name = self.session.types.def(def).full_name.clone();
            let signature = self.session.types.method_signature(method);
            self.session
                .diagnostics
                .error(file, decl.span, CompilationError::DuplicateMember { type_name, signature });
        }
        self.session.types.def_mut(def).methods.retain(|&m| m != dropped);
        for node in nodes {
            self.session.tables.set_builder(node, Builder::Method(survivor));
        }
        for entry in &mut self.declared {
            if entry.0 == dropped {
                entry.0 = survivor;
            }
        }
    }

    fn finish_partial_methods(&mut self) {
        let unimplemented: Vec<PartialMethodInfo> = self.partial_methods.unimplemented().cloned().collect();
        for info in unimplemented {
            self.session.types.method_mut(info.method).excluded = true;
            let name = self.session.types.method_signature(info.method);
            self.session.diagnostics.warning(
                &info.file,
                info.span,
                CompilationWarning::PartialMethodNotImplemented { name },
            );
        }
    }

    // ==========================================================================
    // Properties and indexers
    // ==========================================================================

    fn define_property(
        &mut self,
        unit: &Rc<CompilationUnit>,
        kind: TypeDeclKind,
        def: TypeDefId,
        decl: &PropertyDecl,
    ) {
        let ty = self.resolve(unit, def, None, &decl.ty);
        let capitalized = capitalize(&decl.name);
        let getter = decl.getter.as_ref().map(|accessor| {
            self.define_accessor(
                unit,
                kind,
                def,
                decl.modifiers,
                accessor,
                &format!("get{}", capitalized),
                AccessorRole::PropertyGet(decl.name.clone()),
                Vec::new(),
                ty,
            )
        });
        let setter = decl.setter.as_ref().map(|accessor| {
            self.define_accessor(
                unit,
                kind,
                def,
                decl.modifiers,
                accessor,
                &format!("set{}", capitalized),
                AccessorRole::PropertySet(decl.name.clone()),
                vec![value_param(ty)],
                TypeId::VOID,
            )
        });
        self.session
            .tables
            .set_builder(decl.id, Builder::Property { getter, setter });
    }

    fn define_indexer(&mut self, unit: &Rc<CompilationUnit>, kind: TypeDeclKind, def: TypeDefId, decl: &IndexerDecl) {
        let ty = self.resolve(unit, def, None, &decl.ty);
        let params = self.resolve_params(unit, def, None, &decl.params);
        let getter = decl.getter.as_ref().map(|accessor| {
            self.define_accessor(
                unit,
                kind,
                def,
                decl.modifiers,
                accessor,
                "getItem",
                AccessorRole::IndexerGet,
                params.clone(),
                ty,
            )
        });
        let setter = decl.setter.as_ref().map(|accessor| {
            let mut setter_params = params.clone();
            setter_params.push(value_param(ty));
            self.define_accessor(
                unit,
                kind,
                def,
                decl.modifiers,
                accessor,
                "setItem",
                AccessorRole::IndexerSet,
                setter_params,
                TypeId::VOID,
            )
        });
        self.session
            .tables
            .set_builder(decl.id, Builder::Indexer { getter, setter });
    }

    #[allow(clippy::too_many_arguments)]
    fn define_accessor(
        &mut self,
        unit: &CompilationUnit,
        kind: TypeDeclKind,
        def: TypeDefId,
        owner_modifiers: Modifiers,
        accessor: &AccessorDecl,
        name: &str,
        role: AccessorRole,
        params: Vec<ParamDef>,
        return_type: TypeId,
    ) -> MethodId {
        let interface = is_interface_like(kind);
        let mut modifiers = owner_modifiers;
        if accessor.modifiers.intersects(Modifiers::VISIBILITY) {
            modifiers = modifiers.with_visibility(accessor.modifiers.visibility());
        }
        if interface {
            modifiers = modifiers.with_visibility(Visibility::Public);
            if accessor.body.is_none() && !modifiers.is_static() {
                modifiers |= Modifiers::ABSTRACT;
            }
        }
        let method = self.session.types.add_method(
            def,
            name,
            MethodKind::Accessor(role),
            modifiers,
            params,
            return_type,
        );
        self.session.tables.set_builder(accessor.id, Builder::Method(method));

        if accessor.body.is_none() && !interface && !modifiers.intersects(Modifiers::ABSTRACT | Modifiers::NATIVE) {
            self.session.diagnostics.error(
                &unit.file,
                accessor.span,
                CompilationError::MissingBody {
                    method: name.to_string(),
                },
            );
        }
        self.check_duplicate(&unit.file, accessor.span, def, method);
        self.declared.push((method, unit.file.clone(), accessor.span));
        self.defined += 1;
        method
    }

    // ==========================================================================
    // Constructors
    // ==========================================================================

    fn define_constructor(
        &mut self,
        unit: &Rc<CompilationUnit>,
        kind: TypeDeclKind,
        def: TypeDefId,
        decl: &ConstructorDecl,
    ) {
        let mut params = self.resolve_params(unit, def, None, &decl.params);
        let mut modifiers = decl.modifiers;
        if kind == TypeDeclKind::Enum {
            params.splice(0..0, self.hidden_enum_params());
            modifiers = modifiers.with_visibility(Visibility::Private);
        }
        let ctor = self
            .session
            .types
            .add_method(def, "<init>", MethodKind::Constructor, modifiers, params, TypeId::VOID);
        self.session.tables.set_builder(decl.id, Builder::Method(ctor));
        self.with_constructor.insert(def);
        self.check_duplicate(&unit.file, decl.span, def, ctor);
        self.defined += 1;
    }

    fn hidden_enum_params(&self) -> Vec<ParamDef> {
        vec![
            ParamDef {
                name: ENUM_NAME_PARAM.to_string(),
                ty: self.session.types.string_type(),
            },
            ParamDef {
                name: ENUM_ORDINAL_PARAM.to_string(),
                ty: TypeId::INT,
            },
        ]
    }

    // ==========================================================================
    // Synthesized members
    // ==========================================================================

    fn synthesize(&mut self, kind: TypeDeclKind, def: TypeDefId) {
        if !self.synthesized.insert(def) {
            return;
        }
        let synthetic = Modifiers::SYNTHETIC;

        if matches!(kind, TypeDeclKind::Class | TypeDeclKind::Enum) && !self.with_constructor.contains(&def) {
            let modifiers = self.session.types.def(def).modifiers;
            let visibility = if kind == TypeDeclKind::Enum || modifiers.is_static() {
                Visibility::Private
            } else if modifiers.is_final() {
                Visibility::Public
            } else if modifiers.is_abstract() {
                Visibility::Protected
            } else {
                Visibility::Public
            };
            let params = if kind == TypeDeclKind::Enum {
                self.hidden_enum_params()
            } else {
                Vec::new()
            };
            self.session.types.add_method(
                def,
                "<init>",
                MethodKind::Constructor,
                visibility.modifier() | synthetic,
                params,
                TypeId::VOID,
            );
            self.defined += 1;
        }

        if kind == TypeDeclKind::Enum {
            let ts = &mut self.session.types;
            let this = ts.this_type(def);
            let array = ts.array_of(this);
            let string = ts.string_type();
            let public_static = Modifiers::PUBLIC | Modifiers::STATIC | synthetic;
            ts.add_method(def, "values", MethodKind::Method, public_static, Vec::new(), array);
            ts.add_method(
                def,
                "valueOf",
                MethodKind::Method,
                public_static,
                vec![ParamDef {
                    name: "name".to_string(),
                    ty: string,
                }],
                this,
            );
            self.defined += 2;
        }

        let ts = &mut self.session.types;
        let has_static_init = ts
            .def(def)
            .methods
            .iter()
            .any(|&m| ts.method(m).kind == MethodKind::StaticInitializer);
        if self.needs_static_init.contains(&def) && !has_static_init {
            ts.add_method(
                def,
                "<clinit>",
                MethodKind::StaticInitializer,
                Modifiers::STATIC | synthetic,
                Vec::new(),
                TypeId::VOID,
            );
        }
    }

    // ==========================================================================
    // Checks
    // ==========================================================================

    fn check_duplicate(&mut self, file: &str, span: Span, def: TypeDefId, method: MethodId) {
        let ts = &self.session.types;
        let entry = ts.method(method);
        let params: Vec<TypeId> = entry.param_types().collect();
        let first = self.session.members.find_method(ts, def, &entry.name, &params);
        if first.is_some_and(|m| m != method) {
            let signature = ts.method_signature(method);
            self.duplicate(file, span, def, signature);
        }
    }

    fn duplicate(&mut self, file: &str, span: Span, def: TypeDefId, signature: String) {
        let type_name = self.session.types.def(def).full_name.clone();
        self.session
            .diagnostics
            .error(file, span, CompilationError::DuplicateMember { type_name, signature });
    }

    fn check_overrides(&mut self) {
        let declared = std::mem::take(&mut self.declared);
        for (method, file, span) in declared {
            let ts = &self.session.types;
            let entry = ts.method(method);
            if entry.is_static() || entry.excluded || ts.def(entry.declaring).is_interface() {
                continue;
            }
            let name = ts.method_signature(method);
            if entry.modifiers.contains(Modifiers::OVERRIDE) {
                let overridden = self.session.members.overridden_members(ts, method);
                let overrides_class = overridden
                    .iter()
                    .any(|&o| !ts.def(ts.method(o).declaring).is_interface());
                if !overrides_class {
                    self.session
                        .diagnostics
                        .error(&file, span, CompilationError::NothingToOverride { name });
                }
            } else if hides_overridable(ts, method) {
                self.session
                    .diagnostics
                    .warning(&file, span, CompilationWarning::MissingOverride { name });
            }
        }
    }

    // ==========================================================================
    // Constants
    // ==========================================================================

    /// Evaluate pending constant fields until no further one resolves, so a
    /// constant may refer to one declared after it.
    fn evaluate_constants(&mut self) {
        let mut pending = std::mem::take(&mut self.pending_constants);
        loop {
            let before = pending.len();
            let mut unresolved = Vec::with_capacity(before);
            for constant in pending {
                let ts = &self.session.types;
                let value = DeclarationConstants::new(ts, &constant.unit, constant.def)
                    .evaluate(&constant.init)
                    .and_then(|(value, ty)| convert_constant(ts, &value, ty, ts.field(constant.field).ty).ok());
                match value {
                    Some(value) => self.session.types.field_mut(constant.field).constant = Some(value),
                    None => unresolved.push(constant),
                }
            }
            pending = unresolved;
            if pending.is_empty() || pending.len() == before {
                break;
            }
        }
    }

    // ==========================================================================
    // Resolution helpers
    // ==========================================================================

    fn resolve(&mut self, unit: &CompilationUnit, def: TypeDefId, method: Option<MethodId>, ty: &TypeRef) -> TypeId {
        let mut resolver = TypeResolver::new(&self.session.types, unit, def);
        if let Some(method) = method {
            resolver = resolver.in_method(method);
        }
        match resolver.resolve(ty) {
            Ok(resolved) => resolved,
            Err(error) => {
                self.session.diagnostics.error(&unit.file, ty.span, error);
                self.session.types.object_type()
            }
        }
    }

    fn resolve_params(
        &mut self,
        unit: &CompilationUnit,
        def: TypeDefId,
        method: Option<MethodId>,
        params: &[ParamDecl],
    ) -> Vec<ParamDef> {
        params
            .iter()
            .map(|param| ParamDef {
                name: param.name.clone(),
                ty: self.resolve(unit, def, method, &param.ty),
            })
            .collect()
    }
}

fn is_interface_like(kind: TypeDeclKind) -> bool {
    matches!(kind, TypeDeclKind::Interface | TypeDeclKind::Annotation)
}

fn value_param(ty: TypeId) -> ParamDef {
    ParamDef {
        name: "value".to_string(),
        ty,
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Name plus erased parameter descriptors; the return type does not count.
fn partial_signature(ts: &TypeSystem, method: MethodId) -> String {
    let entry = ts.method(method);
    let params: String = entry.params.iter().map(|p| ts.descriptor(p.ty)).collect();
    format!("{}({})", entry.name, params)
}

/// Whether `method` has the signature of an overridable base class method
/// without saying `override`.
fn hides_overridable(ts: &TypeSystem, method: MethodId) -> bool {
    let entry = ts.method(method);
    let own_type = ts.this_type(entry.declaring);
    let own = erased_params(ts, method, own_type);
    ts.supertype_closure(own_type).into_iter().skip(1).any(|level| {
        let Some(def) = ts.def_of(level) else {
            return false;
        };
        if ts.def(def).is_interface() {
            return false;
        }
        ts.def(def).methods.iter().any(|&candidate| {
            let base = ts.method(candidate);
            base.name == entry.name
                && base.kind == entry.kind
                && base.is_overridable()
                && erased_params(ts, candidate, level) == own
        })
    })
}

fn erased_params(ts: &TypeSystem, method: MethodId, owner: TypeId) -> Vec<TypeId> {
    let bindings = ts.bindings_of(owner);
    ts.method(method)
        .params
        .iter()
        .map(|p| ts.erasure(ts.substitute(p.ty, &bindings)))
        .collect()
}
