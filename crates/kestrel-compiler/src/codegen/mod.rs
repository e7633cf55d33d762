//! Code generation for validated bodies.
//!
//! A [`BodyGenerator`] turns one body into [`Code`] using only what
//! validation recorded in the [`NodeTables`]: expression infos, resolved
//! locals and constructor targets. Anything missing or inconsistent is an
//! [`InternalError`], never a user diagnostic.
//!
//! - `expr` - values, calls, object creation and operators
//! - `branch` - conditions compiled straight to jumps
//! - `assignment` - assignments, compound assignments and increments
//! - `strings` - string concatenation through a string builder
//! - `conversion` - primitive, boxing and reference conversions
//! - `stmt` - statements
//! - `members` - method, constructor and static initializer bodies

mod assignment;
mod branch;
mod conversion;
mod expr;
mod members;
mod stmt;
mod strings;

use kestrel_core::InternalError;
use kestrel_core::ast::Expr;
use kestrel_types::{LocalId, MethodId, TypeDefId, TypeId, TypeSystem};

use crate::bytecode::Opcode;
use crate::emit::{Code, CodeEmitter, JumpTargets};
use crate::expr_info::ExpressionInfo;
use crate::node_tables::NodeTables;
use crate::scope::LocalTable;

pub use members::{ConstructorChain, EnumConstantInit, FieldInit};

pub type Result<T> = std::result::Result<T, InternalError>;

/// Emits the code of one body.
pub struct BodyGenerator<'a> {
    ts: &'a TypeSystem,
    tables: &'a NodeTables,
    emitter: CodeEmitter,
    def: TypeDefId,
    return_type: TypeId,
    /// Slot of each local by index; `None` for unused locals.
    slots: Vec<Option<u16>>,
    local_types: Vec<TypeId>,
    /// First slot past the locals; statement temporaries start here.
    first_temp: u16,
    next_temp: u16,
    max_locals: u16,
    jumps: JumpTargets,
}

impl<'a> BodyGenerator<'a> {
    /// `locals` is the body's table; bodies without one (static
    /// initializers, synthesized methods) only have `this` when not static.
    pub fn new(
        ts: &'a TypeSystem,
        tables: &'a NodeTables,
        def: TypeDefId,
        name: impl Into<String>,
        return_type: TypeId,
        locals: Option<&LocalTable>,
        is_static: bool,
    ) -> Self {
        let (slots, first_temp) = match locals {
            Some(locals) => locals.assign_slots(),
            None => (Vec::new(), u16::from(!is_static)),
        };
        let local_types = locals.map(|l| l.iter().map(|local| local.ty).collect()).unwrap_or_default();
        Self {
            ts,
            tables,
            emitter: CodeEmitter::new(name),
            def,
            return_type,
            slots,
            local_types,
            first_temp,
            next_temp: first_temp,
            max_locals: first_temp,
            jumps: JumpTargets::new(),
        }
    }

    pub fn finish(self) -> Result<Code> {
        self.emitter.finish(self.max_locals)
    }

    pub(crate) fn info(&self, expr: &Expr) -> Result<&'a ExpressionInfo> {
        let tables = self.tables;
        tables.require_expression(expr.id)
    }

    pub(crate) fn slot(&self, local: LocalId) -> Result<u16> {
        self.slots
            .get(local.index())
            .copied()
            .flatten()
            .ok_or_else(|| InternalError::other(format!("local {} has no slot", local.index())))
    }

    pub(crate) fn local_type(&self, local: LocalId) -> Result<TypeId> {
        self.local_types
            .get(local.index())
            .copied()
            .ok_or_else(|| InternalError::other(format!("local {} is not declared", local.index())))
    }

    /// The method `name` of `def` taking exactly `params`.
    pub(crate) fn find_method(&self, def: TypeDefId, name: &str, params: &[TypeId]) -> Result<MethodId> {
        let ts = self.ts;
        ts.def(def)
            .methods
            .iter()
            .copied()
            .find(|&id| {
                let method = ts.method(id);
                method.name == name && method.param_types().eq(params.iter().copied())
            })
            .ok_or_else(|| InternalError::other(format!("{}.{} is not defined", ts.def(def).full_name, name)))
    }

    // ==========================================================================
    // Temporaries
    // ==========================================================================

    /// Allocate a temporary slot for a value of type `ty`.
    pub(crate) fn temp(&mut self, ty: TypeId) -> u16 {
        let slot = self.next_temp;
        self.next_temp += ty.slots().max(1);
        self.max_locals = self.max_locals.max(self.next_temp);
        slot
    }

    /// Release every temporary; called between statements.
    pub(crate) fn release_temps(&mut self) {
        self.next_temp = self.first_temp;
    }

    // ==========================================================================
    // Typed instruction selection
    // ==========================================================================

    /// The erased type used on the operand stack.
    pub(crate) fn erased(&self, ty: TypeId) -> TypeId {
        self.ts.erasure(ty)
    }

    /// Class name or array descriptor naming `ty` in type operands.
    pub(crate) fn type_operand(&self, ty: TypeId) -> String {
        let ts = self.ts;
        let erased = ts.erasure(ty);
        if ts.is_array(erased) {
            return ts.descriptor(erased);
        }
        match ts.def_of(erased) {
            Some(def) => ts.internal_name(def),
            None => ts.internal_name(ts.platform().object),
        }
    }

    pub(crate) fn load(&mut self, ty: TypeId, slot: u16) {
        self.emitter.emit_local(load_opcode(ty), slot);
    }

    pub(crate) fn store(&mut self, ty: TypeId, slot: u16) {
        self.emitter.emit_local(store_opcode(ty), slot);
    }

    /// Discard a value of type `ty`.
    pub(crate) fn pop(&mut self, ty: TypeId) {
        match ty.slots() {
            0 => {}
            1 => self.emitter.emit(Opcode::Pop),
            _ => self.emitter.emit(Opcode::Pop2),
        }
    }

    /// Duplicate a value of type `ty`, inserting the copy below `under` slots.
    pub(crate) fn dup_under(&mut self, ty: TypeId, under: u16) -> Result<()> {
        let opcode = match (ty.slots(), under) {
            (1, 0) => Opcode::Dup,
            (1, 1) => Opcode::DupX1,
            (1, 2) => Opcode::DupX2,
            (2, 0) => Opcode::Dup2,
            (2, 1) => Opcode::Dup2X1,
            (2, 2) => Opcode::Dup2X2,
            (slots, under) => {
                return Err(InternalError::other(format!(
                    "cannot duplicate {} slots under {}",
                    slots, under
                )));
            }
        };
        self.emitter.emit(opcode);
        Ok(())
    }

    /// Duplicate the top `slots` slots in place.
    pub(crate) fn dup_slots(&mut self, slots: u16) -> Result<()> {
        match slots {
            0 => {}
            1 => self.emitter.emit(Opcode::Dup),
            2 => self.emitter.emit(Opcode::Dup2),
            n => return Err(InternalError::other(format!("cannot duplicate {} slots", n))),
        }
        Ok(())
    }
}

pub(crate) fn load_opcode(ty: TypeId) -> Opcode {
    match computational(ty) {
        TypeId::INT => Opcode::Iload,
        TypeId::LONG => Opcode::Lload,
        TypeId::FLOAT => Opcode::Fload,
        TypeId::DOUBLE => Opcode::Dload,
        _ => Opcode::Aload,
    }
}

pub(crate) fn store_opcode(ty: TypeId) -> Opcode {
    match computational(ty) {
        TypeId::INT => Opcode::Istore,
        TypeId::LONG => Opcode::Lstore,
        TypeId::FLOAT => Opcode::Fstore,
        TypeId::DOUBLE => Opcode::Dstore,
        _ => Opcode::Astore,
    }
}

pub(crate) fn return_opcode(ty: TypeId) -> Opcode {
    if ty.is_void() {
        return Opcode::Return;
    }
    match computational(ty) {
        TypeId::INT => Opcode::Ireturn,
        TypeId::LONG => Opcode::Lreturn,
        TypeId::FLOAT => Opcode::Freturn,
        TypeId::DOUBLE => Opcode::Dreturn,
        _ => Opcode::Areturn,
    }
}

pub(crate) fn array_load_opcode(element: TypeId) -> Opcode {
    match element {
        TypeId::BOOLEAN | TypeId::BYTE => Opcode::Baload,
        TypeId::CHAR => Opcode::Caload,
        TypeId::SHORT => Opcode::Saload,
        TypeId::INT => Opcode::Iaload,
        TypeId::LONG => Opcode::Laload,
        TypeId::FLOAT => Opcode::Faload,
        TypeId::DOUBLE => Opcode::Daload,
        _ => Opcode::Aaload,
    }
}

pub(crate) fn array_store_opcode(element: TypeId) -> Opcode {
    match element {
        TypeId::BOOLEAN | TypeId::BYTE => Opcode::Bastore,
        TypeId::CHAR => Opcode::Castore,
        TypeId::SHORT => Opcode::Sastore,
        TypeId::INT => Opcode::Iastore,
        TypeId::LONG => Opcode::Lastore,
        TypeId::FLOAT => Opcode::Fastore,
        TypeId::DOUBLE => Opcode::Dastore,
        _ => Opcode::Aastore,
    }
}

/// The type a value of `ty` has on the operand stack: sub-int primitives are `int`.
pub(crate) fn computational(ty: TypeId) -> TypeId {
    match ty.as_primitive() {
        Some(kind) => TypeId::primitive(kind.computational()),
        None => ty,
    }
}
