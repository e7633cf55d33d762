//! BytecodeGeneration stage - emits the code of every body.
//!
//! Declarations of a partial type are gathered first so that the type is
//! generated once, with the field initializers and enum constants of all its
//! parts. Bodies are then emitted in member definition order.

use std::rc::Rc;

use kestrel_core::ast::{Block, CompilationUnit, ConstructorDecl, MemberDecl, NodeId, TypeDecl, TypeDeclKind};
use kestrel_core::{InternalError, Modifiers, Span};
use kestrel_types::{FieldId, MethodId, MethodKind, TypeDefId};
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use super::type_decls;
use crate::codegen::{BodyGenerator, ConstructorChain, EnumConstantInit, FieldInit};
use crate::emit::Code;
use crate::scope::LocalTable;
use crate::session::CompilationSession;

/// A generated method: its signature plus code, `None` when bodiless.
#[derive(Debug, Clone)]
pub struct GeneratedMethod {
    pub method: MethodId,
    pub name: String,
    pub descriptor: String,
    pub modifiers: Modifiers,
    pub code: Option<Code>,
}

/// All generated methods of one compiled type.
#[derive(Debug, Clone)]
pub struct GeneratedType {
    pub def: TypeDefId,
    /// Fully qualified name, the key of the binary map.
    pub name: String,
    pub methods: Vec<GeneratedMethod>,
}

/// What the declarations of one type contribute to its bodies.
#[derive(Default)]
struct TypeParts<'u> {
    /// Node the implicit constructor was validated under.
    first_decl: Option<NodeId>,
    is_enum: bool,
    instance_inits: Vec<FieldInit<'u>>,
    static_inits: Vec<FieldInit<'u>>,
    constants: Vec<EnumConstantInit<'u>>,
    bodies: FxHashMap<MethodId, &'u Block>,
    constructors: FxHashMap<MethodId, &'u ConstructorDecl>,
}

pub struct BytecodeGenerationPass<'s> {
    session: &'s CompilationSession,
}

impl<'s> BytecodeGenerationPass<'s> {
    pub fn new(session: &'s CompilationSession) -> Self {
        Self { session }
    }

    /// Generate every compiled type. Fails on the first internal fault.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run(self) -> Result<Vec<GeneratedType>, InternalError> {
        let units: Vec<Rc<CompilationUnit>> = self.session.units();
        let mut order: Vec<TypeDefId> = Vec::new();
        let mut parts: FxHashMap<TypeDefId, TypeParts<'_>> = FxHashMap::default();
        for unit in &units {
            for decl in type_decls(unit) {
                let Some(def) = self.session.tables.type_builder(decl.id) else {
                    continue;
                };
                let entry = parts.entry(def).or_insert_with(|| {
                    order.push(def);
                    TypeParts::default()
                });
                self.collect(decl, entry)?;
            }
        }

        let mut generated = Vec::with_capacity(order.len());
        for def in order {
            if let Some(parts) = parts.get(&def) {
                generated.push(self.generate_type(def, parts)?);
            }
        }
        debug!(types = generated.len(), "bytecode generated");
        Ok(generated)
    }

    fn collect<'u>(&self, decl: &'u TypeDecl, parts: &mut TypeParts<'u>) -> Result<(), InternalError> {
        let tables = &self.session.tables;
        let ts = &self.session.types;
        parts.first_decl.get_or_insert(decl.id);
        parts.is_enum |= decl.kind == TypeDeclKind::Enum;

        for member in &decl.members {
            match member {
                MemberDecl::Field(field) => {
                    let (Some(init), Some(id)) = (&field.init, tables.field_builder(field.id)) else {
                        continue;
                    };
                    let entry = ts.field(id);
                    let init = FieldInit { field: id, init };
                    if !entry.is_static() {
                        parts.instance_inits.push(init);
                    } else if entry.constant.is_none() {
                        // Constants are stored as attributes of the field instead.
                        parts.static_inits.push(init);
                    }
                }
                MemberDecl::Method(method) => {
                    if let (Some(body), Some(id)) = (&method.body, tables.method_builder(method.id)) {
                        parts.bodies.insert(id, body);
                    }
                }
                MemberDecl::Property(property) => {
                    for accessor in property.getter.iter().chain(&property.setter) {
                        if let (Some(body), Some(id)) = (&accessor.body, tables.method_builder(accessor.id)) {
                            parts.bodies.insert(id, body);
                        }
                    }
                }
                MemberDecl::Indexer(indexer) => {
                    for accessor in indexer.getter.iter().chain(&indexer.setter) {
                        if let (Some(body), Some(id)) = (&accessor.body, tables.method_builder(accessor.id)) {
                            parts.bodies.insert(id, body);
                        }
                    }
                }
                MemberDecl::Constructor(ctor) => {
                    let id = tables.require_method(ctor.id)?;
                    parts.constructors.insert(id, ctor);
                }
                MemberDecl::Type(_) => {}
            }
        }

        for constant in &decl.enum_constants {
            let field = tables
                .field_builder(constant.id)
                .ok_or(InternalError::MissingBuilder { node: constant.id.index() })?;
            let ordinal = i32::try_from(parts.constants.len())
                .map_err(|_| InternalError::other("too many enum constants"))?;
            parts.constants.push(EnumConstantInit {
                field,
                node: constant.id,
                ordinal,
                args: &constant.args,
            });
        }
        Ok(())
    }

    fn generate_type(&self, def: TypeDefId, parts: &TypeParts<'_>) -> Result<GeneratedType, InternalError> {
        let ts = &self.session.types;
        let entry = ts.def(def);
        let mut methods = Vec::with_capacity(entry.methods.len());
        for &id in &entry.methods {
            let method = ts.method(id);
            if method.excluded {
                continue;
            }
            let code = self.method_code(def, id, parts)?;
            trace!(
                method = %ts.method_signature(id),
                instructions = code.as_ref().map_or(0, |c| c.instructions.len()),
                "method generated"
            );
            methods.push(GeneratedMethod {
                method: id,
                name: method.name.clone(),
                descriptor: ts.method_descriptor(id),
                modifiers: method.modifiers,
                code,
            });
        }
        Ok(GeneratedType {
            def,
            name: entry.full_name.clone(),
            methods,
        })
    }

    fn method_code(&self, def: TypeDefId, id: MethodId, parts: &TypeParts<'_>) -> Result<Option<Code>, InternalError> {
        let ts = &self.session.types;
        let tables = &self.session.tables;
        let method = ts.method(id);
        let synthetic = method.modifiers.contains(Modifiers::SYNTHETIC);
        let generator =
            |locals: Option<&LocalTable>| BodyGenerator::new(ts, tables, def, method.name.clone(), method.return_type, locals, method.is_static());

        let code = match method.kind {
            MethodKind::StaticInitializer => {
                let mut body = generator(None);
                body.static_initializer(&parts.static_inits, &parts.constants)?;
                body.finish()?
            }
            MethodKind::Constructor => {
                let hidden = if parts.is_enum { 2 } else { 0 };
                let (chain, block, table_node) = match parts.constructors.get(&id) {
                    Some(ctor) => {
                        let (node, args) = match &ctor.initializer {
                            Some(init) => (init.id, init.args.as_slice()),
                            None => (ctor.id, &[][..]),
                        };
                        (
                            ConstructorChain {
                                node,
                                args,
                                hidden,
                                field_inits: &parts.instance_inits,
                            },
                            Some(&ctor.body),
                            ctor.body.id,
                        )
                    }
                    None if synthetic => {
                        let node = parts
                            .first_decl
                            .ok_or_else(|| InternalError::other("implicit constructor without a declaration"))?;
                        (
                            ConstructorChain {
                                node,
                                args: &[],
                                hidden,
                                field_inits: &parts.instance_inits,
                            },
                            None,
                            node,
                        )
                    }
                    None => return Ok(None),
                };
                let mut body = generator(tables.body(table_node));
                body.constructor_body(&chain, block)?;
                body.finish()?
            }
            MethodKind::Method if synthetic && parts.is_enum && method.name == "values" => {
                let constants: Vec<FieldId> = parts.constants.iter().map(|c| c.field).collect();
                let mut body = generator(None);
                body.enum_values(&constants)?;
                body.finish()?
            }
            MethodKind::Method if synthetic && parts.is_enum && method.name == "valueOf" => {
                let constants: Vec<FieldId> = parts.constants.iter().map(|c| c.field).collect();
                let mut locals = LocalTable::new(false);
                locals.declare("name", ts.string_type(), Span::default(), NodeId(0), true);
                let mut body = generator(Some(&locals));
                body.enum_value_of(&constants)?;
                body.finish()?
            }
            MethodKind::Method | MethodKind::Accessor(_) => {
                let Some(block) = parts.bodies.get(&id) else {
                    return Ok(None);
                };
                let mut body = generator(tables.body(block.id));
                body.method_body(block)?;
                body.finish()?
            }
        };
        Ok(Some(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Opcode;
    use crate::passes::CodeValidationPass;
    use crate::validate::test_support::define;
    use kestrel_core::ast::{AstBuilder, ConstructorInitializerKind};

    fn generate(units: Vec<CompilationUnit>) -> (CompilationSession, Vec<GeneratedType>) {
        let mut session = define(units);
        CodeValidationPass::new(&mut session).run();
        assert!(
            !session.has_errors(),
            "{:?}",
            session.diagnostics.iter().map(|d| d.message.clone()).collect::<Vec<_>>()
        );
        let generated = BytecodeGenerationPass::new(&session).run().unwrap();
        (session, generated)
    }

    fn method<'a>(generated: &'a GeneratedType, name: &str) -> &'a GeneratedMethod {
        generated.methods.iter().find(|m| m.name == name).unwrap()
    }

    fn listing(method: &GeneratedMethod) -> Vec<String> {
        method
            .code
            .as_ref()
            .unwrap()
            .instructions
            .iter()
            .map(|i| i.to_string())
            .collect()
    }

    #[test]
    fn implicit_constructors_run_field_initializers() {
        let b = AstBuilder::new();
        let mut class = b.class("Counter");
        class
            .members
            .push(MemberDecl::Field(b.field(b.int_type(), "start", Some(b.int(7)))));
        let (_, generated) = generate(vec![b.unit("Counter.ks", Some("app"), vec![class])]);
        let ctor = method(&generated[0], "<init>");
        assert_eq!(listing(ctor), vec![
            "aload 0",
            "invokespecial kestrel/lang/Object.<init>()V",
            "aload 0",
            "bipush 7",
            "putfield app/Counter.start:I",
            "return",
        ]);
    }

    #[test]
    fn sibling_constructor_calls_skip_field_initializers() {
        let b = AstBuilder::new();
        let mut class = b.class("Point");
        class
            .members
            .push(MemberDecl::Field(b.field(b.int_type(), "x", Some(b.int(1)))));
        class.members.push(MemberDecl::Constructor(b.constructor(
            vec![b.param(b.int_type(), "x")],
            None,
            b.block(vec![b.expr_stmt(b.assign(b.member(b.this(), "x"), b.ident("x")))]),
        )));
        class.members.push(MemberDecl::Constructor(b.constructor(
            vec![],
            Some(b.ctor_init(ConstructorInitializerKind::This, vec![b.int(5)])),
            b.block(vec![]),
        )));
        let (_, generated) = generate(vec![b.unit("Point.ks", Some("app"), vec![class])]);
        let ctors: Vec<&GeneratedMethod> = generated[0].methods.iter().filter(|m| m.name == "<init>").collect();
        assert_eq!(ctors.len(), 2);
        let with_arg = ctors.iter().find(|m| m.descriptor == "(I)V").unwrap();
        let chained = ctors.iter().find(|m| m.descriptor == "()V").unwrap();
        assert_eq!(listing(with_arg)[..4], [
            "aload 0".to_string(),
            "invokespecial kestrel/lang/Object.<init>()V".to_string(),
            "aload 0".to_string(),
            "iconst_1".to_string(),
        ]);
        assert_eq!(listing(chained), vec![
            "aload 0",
            "iconst_5",
            "invokespecial app/Point.<init>(I)V",
            "return",
        ]);
    }

    #[test]
    fn enums_construct_their_constants_in_the_static_initializer() {
        let b = AstBuilder::new();
        let color = b.enum_type("Color", &["RED", "GREEN"]);
        let (_, generated) = generate(vec![b.unit("Color.ks", Some("app"), vec![color])]);
        let ty = &generated[0];

        let clinit = listing(method(ty, "<clinit>"));
        assert_eq!(&clinit[..6], &[
            "new app/Color".to_string(),
            "dup".to_string(),
            "ldc \"RED\"".to_string(),
            "iconst_0".to_string(),
            "invokespecial app/Color.<init>(Lkestrel/lang/String;I)V".to_string(),
            "putstatic app/Color.RED:Lapp/Color;".to_string(),
        ]);

        let ctor = listing(method(ty, "<init>"));
        assert_eq!(ctor, vec![
            "aload 0",
            "aload 1",
            "iload 2",
            "invokespecial kestrel/lang/Enum.<init>(Lkestrel/lang/String;I)V",
            "return",
        ]);

        let values = method(ty, "values");
        let code = values.code.as_ref().unwrap();
        assert_eq!(code.opcodes().first(), Some(&Opcode::Iconst2));
        assert_eq!(code.opcodes().last(), Some(&Opcode::Areturn));

        let value_of = method(ty, "valueOf");
        let code = value_of.code.as_ref().unwrap();
        assert_eq!(code.max_locals, 1);
        assert_eq!(code.opcodes().last(), Some(&Opcode::Athrow));
    }

    #[test]
    fn abstract_and_excluded_methods_have_no_code() {
        let b = AstBuilder::new();
        let mut shape = b.class("Shape");
        shape.modifiers |= Modifiers::ABSTRACT;
        let mut area = b.method("area", b.prim(kestrel_core::PrimitiveKind::Double), vec![], None);
        area.modifiers |= Modifiers::ABSTRACT | Modifiers::PUBLIC;
        shape.members.push(MemberDecl::Method(area));
        let mut hook = b.method("hook", b.void_type(), vec![], None);
        hook.modifiers = Modifiers::PARTIAL | Modifiers::PRIVATE;
        shape.members.push(MemberDecl::Method(hook));
        shape.modifiers |= Modifiers::PARTIAL;
        let (_, generated) = generate(vec![b.unit("Shape.ks", Some("app"), vec![shape])]);
        let ty = &generated[0];
        assert!(method(ty, "area").code.is_none());
        assert!(ty.methods.iter().all(|m| m.name != "hook"));
    }
}
