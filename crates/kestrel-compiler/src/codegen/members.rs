//! Constructor, static initializer and synthesized enum bodies.

use kestrel_core::InternalError;
use kestrel_core::ast::{Block, Expr, NodeId};
use kestrel_types::{FieldId, LocalId};

use super::{BodyGenerator, Result};
use crate::bytecode::Opcode;

/// An instance or static field initializer.
#[derive(Debug, Clone, Copy)]
pub struct FieldInit<'e> {
    pub field: FieldId,
    pub init: &'e Expr,
}

/// Construction of one enum constant inside `<clinit>`.
#[derive(Debug, Clone, Copy)]
pub struct EnumConstantInit<'e> {
    pub field: FieldId,
    /// Node the selected constructor is recorded under.
    pub node: NodeId,
    pub ordinal: i32,
    pub args: &'e [Expr],
}

/// The base or sibling constructor call opening a constructor body.
#[derive(Debug, Clone, Copy)]
pub struct ConstructorChain<'e> {
    /// Node the called constructor is recorded under.
    pub node: NodeId,
    pub args: &'e [Expr],
    /// Leading parameters forwarded unchanged (`$name`, `$ordinal`).
    pub hidden: usize,
    /// Instance field initializers, run after a base constructor call.
    pub field_inits: &'e [FieldInit<'e>],
}

impl<'a> BodyGenerator<'a> {
    /// `super(...)` or `this(...)`, field initializers, then `block`.
    pub fn constructor_body(&mut self, chain: &ConstructorChain<'_>, block: Option<&Block>) -> Result<()> {
        let ts = self.ts;
        let chains_to_sibling = match self.tables.constructor_target(chain.node) {
            Some(target) => {
                self.emitter.emit_local(Opcode::Aload, 0);
                for index in 0..chain.hidden {
                    let id = LocalId::new(index as u32);
                    let ty = self.local_type(id)?;
                    let slot = self.slot(id)?;
                    self.load(ty, slot);
                }
                self.args(target, chain.hidden, chain.args)?;
                self.invoke(target, false);
                ts.method(target).declaring == self.def
            }
            // Only a root type has nothing to chain to.
            None if ts.def(self.def).base.is_none() => false,
            None => return Err(InternalError::MissingBuilder { node: chain.node.0 }),
        };
        // A sibling constructor already ran the initializers.
        if !chains_to_sibling {
            for init in chain.field_inits {
                self.emitter.emit_local(Opcode::Aload, 0);
                self.expr_to(init.init, ts.field(init.field).ty)?;
                self.put_field(init.field);
                self.release_temps();
            }
        }
        if let Some(block) = block {
            self.block(block)?;
        }
        if self.emitter.is_reachable() {
            self.emitter.emit(Opcode::Return);
        }
        Ok(())
    }

    /// `<clinit>`: enum constants first, then static field initializers.
    pub fn static_initializer(&mut self, statics: &[FieldInit<'_>], constants: &[EnumConstantInit<'_>]) -> Result<()> {
        let ts = self.ts;
        for constant in constants {
            let ctor = self
                .tables
                .constructor_target(constant.node)
                .ok_or(InternalError::MissingBuilder { node: constant.node.0 })?;
            self.emitter.emit_type(Opcode::New, ts.internal_name(self.def));
            self.emitter.emit(Opcode::Dup);
            self.emitter.emit_string(&ts.field(constant.field).name);
            self.emitter.emit_int(constant.ordinal);
            self.args(ctor, 2, constant.args)?;
            self.invoke(ctor, false);
            self.put_field(constant.field);
            self.release_temps();
        }
        for init in statics {
            self.expr_to(init.init, ts.field(init.field).ty)?;
            self.put_field(init.field);
            self.release_temps();
        }
        self.emitter.emit(Opcode::Return);
        Ok(())
    }

    /// `values()`: a fresh array of the constants in declaration order.
    pub fn enum_values(&mut self, constants: &[FieldId]) -> Result<()> {
        let ts = self.ts;
        let count = i32::try_from(constants.len()).map_err(|_| InternalError::other("too many enum constants"))?;
        self.emitter.emit_int(count);
        self.emitter.emit_type(Opcode::Anewarray, ts.internal_name(self.def));
        for (index, &field) in (0..count).zip(constants) {
            self.emitter.emit(Opcode::Dup);
            self.emitter.emit_int(index);
            self.get_field(field);
            self.emitter.emit(Opcode::Aastore);
        }
        self.emitter.emit(Opcode::Areturn);
        Ok(())
    }

    /// `valueOf(String name)`: the constant with that name, or an
    /// `IllegalArgumentException` carrying the name.
    pub fn enum_value_of(&mut self, constants: &[FieldId]) -> Result<()> {
        let ts = self.ts;
        let platform = ts.platform();
        let name_slot = self.slot(LocalId::new(0))?;
        let name = self.find_method(platform.enum_base, "name", &[])?;
        let equals = self.find_method(platform.object, "equals", &[ts.object_type()])?;
        for &field in constants {
            let next = self.emitter.new_label();
            self.get_field(field);
            self.invoke(name, false);
            self.emitter.emit_local(Opcode::Aload, name_slot);
            self.invoke(equals, false);
            self.emitter.emit_jump(Opcode::Ifeq, next);
            self.get_field(field);
            self.emitter.emit(Opcode::Areturn);
            self.emitter.bind(next);
        }
        let exception = platform.illegal_argument;
        let ctor = self.find_method(exception, "<init>", &[ts.string_type()])?;
        self.emitter.emit_type(Opcode::New, ts.internal_name(exception));
        self.emitter.emit(Opcode::Dup);
        self.emitter.emit_local(Opcode::Aload, name_slot);
        self.invoke(ctor, false);
        self.emitter.emit(Opcode::Athrow);
        Ok(())
    }
}
