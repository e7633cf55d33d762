//! Instruction emitter for one method body.
//!
//! The [`CodeEmitter`] appends [`Instruction`]s, allocates and binds
//! [`Label`]s and tracks operand-stack depth in slots so that every body
//! records its `max_stack`.
//!
//! # Example
//!
//! ```ignore
//! let mut emitter = CodeEmitter::new("app.Counter.bump");
//! emitter.emit_local(Opcode::Iload, 1);
//! emitter.emit_int(1);
//! emitter.emit(Opcode::Iadd);
//! emitter.emit_local(Opcode::Istore, 1);
//! emitter.emit(Opcode::Return);
//! let code = emitter.finish(2)?;
//! assert_eq!(code.max_stack, 2);
//! ```

mod jumps;

use kestrel_core::InternalError;
use ordered_float::OrderedFloat;
use tracing::trace;

use crate::bytecode::{
    FieldRef, Instruction, Label, MethodRef, Opcode, Operand, PoolConstant, SwitchTable,
};
pub use jumps::JumpTargets;

/// Finished code of one method body.
#[derive(Debug, Clone, PartialEq)]
pub struct Code {
    pub instructions: Vec<Instruction>,
    /// Instruction index each label is bound to.
    pub labels: Vec<usize>,
    pub max_stack: u16,
    pub max_locals: u16,
}

impl Code {
    pub fn label_position(&self, label: Label) -> Option<usize> {
        self.labels.get(label.index() as usize).copied()
    }

    /// Opcodes only, convenient for assertions.
    pub fn opcodes(&self) -> Vec<Opcode> {
        self.instructions.iter().map(|i| i.opcode).collect()
    }
}

/// Emits instructions for a single method body.
#[derive(Debug)]
pub struct CodeEmitter {
    method: String,
    instructions: Vec<Instruction>,
    labels: Vec<Option<usize>>,
    /// Stack depth expected at each label by the branches targeting it.
    label_depths: Vec<Option<u16>>,
    depth: u16,
    max_stack: u16,
    reachable: bool,
    error: Option<InternalError>,
}

impl CodeEmitter {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            instructions: Vec::new(),
            labels: Vec::new(),
            label_depths: Vec::new(),
            depth: 0,
            max_stack: 0,
            reachable: true,
            error: None,
        }
    }

    /// Current operand stack depth in slots.
    pub fn depth(&self) -> u16 {
        self.depth
    }

    pub fn max_stack(&self) -> u16 {
        self.max_stack
    }

    /// Whether the next instruction can be reached by falling through.
    pub fn is_reachable(&self) -> bool {
        self.reachable
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    // ==========================================================================
    // Basic Emission
    // ==========================================================================

    pub fn push(&mut self, instruction: Instruction) {
        let (pop, push) = instruction.stack_effect();
        if self.depth < pop {
            if self.error.is_none() {
                self.error = Some(InternalError::StackUnderflow {
                    method: self.method.clone(),
                });
            }
            self.depth = 0;
        } else {
            self.depth -= pop;
        }
        match &instruction.operand {
            Operand::Label(label) => self.record_depth(*label),
            Operand::Switch(table) => {
                self.record_depth(table.default);
                for &(_, label) in &table.cases {
                    self.record_depth(label);
                }
            }
            _ => {}
        }
        self.depth += push;
        self.max_stack = self.max_stack.max(self.depth);
        trace!(depth = self.depth, "{}", instruction);
        if instruction.opcode.ends_flow() {
            self.reachable = false;
        }
        self.instructions.push(instruction);
    }

    pub fn emit(&mut self, opcode: Opcode) {
        self.push(Instruction::simple(opcode));
    }

    pub fn emit_local(&mut self, opcode: Opcode, slot: u16) {
        self.push(Instruction::new(opcode, Operand::Local(slot)));
    }

    pub fn emit_iinc(&mut self, slot: u16, delta: i16) {
        self.push(Instruction::new(
            Opcode::Iinc,
            Operand::Increment { local: slot, delta },
        ));
    }

    pub fn emit_field(&mut self, opcode: Opcode, field: FieldRef) {
        self.push(Instruction::new(opcode, Operand::Field(field)));
    }

    pub fn emit_invoke(&mut self, opcode: Opcode, method: MethodRef) {
        let opcode = if method.interface && opcode == Opcode::Invokevirtual {
            Opcode::Invokeinterface
        } else {
            opcode
        };
        self.push(Instruction::new(opcode, Operand::Method(method)));
    }

    pub fn emit_type(&mut self, opcode: Opcode, type_name: impl Into<String>) {
        self.push(Instruction::new(opcode, Operand::Type(type_name.into())));
    }

    // ==========================================================================
    // Constants
    // ==========================================================================

    /// Push an `int`, choosing the shortest encoding.
    pub fn emit_int(&mut self, value: i32) {
        match value {
            -1 => self.emit(Opcode::IconstM1),
            0 => self.emit(Opcode::Iconst0),
            1 => self.emit(Opcode::Iconst1),
            2 => self.emit(Opcode::Iconst2),
            3 => self.emit(Opcode::Iconst3),
            4 => self.emit(Opcode::Iconst4),
            5 => self.emit(Opcode::Iconst5),
            v if i8::try_from(v).is_ok() => self.push(Instruction::new(Opcode::Bipush, Operand::Int(v))),
            v if i16::try_from(v).is_ok() => self.push(Instruction::new(Opcode::Sipush, Operand::Int(v))),
            v => self.emit_constant(PoolConstant::Int(v)),
        }
    }

    pub fn emit_long(&mut self, value: i64) {
        match value {
            0 => self.emit(Opcode::Lconst0),
            1 => self.emit(Opcode::Lconst1),
            v => self.emit_constant(PoolConstant::Long(v)),
        }
    }

    pub fn emit_float(&mut self, value: f32) {
        if value == 0.0 && value.is_sign_positive() {
            self.emit(Opcode::Fconst0);
        } else if value == 1.0 {
            self.emit(Opcode::Fconst1);
        } else if value == 2.0 {
            self.emit(Opcode::Fconst2);
        } else {
            self.emit_constant(PoolConstant::Float(OrderedFloat(value)));
        }
    }

    pub fn emit_double(&mut self, value: f64) {
        if value == 0.0 && value.is_sign_positive() {
            self.emit(Opcode::Dconst0);
        } else if value == 1.0 {
            self.emit(Opcode::Dconst1);
        } else {
            self.emit_constant(PoolConstant::Double(OrderedFloat(value)));
        }
    }

    pub fn emit_string(&mut self, value: &str) {
        self.emit_constant(PoolConstant::String(value.to_string()));
    }

    pub fn emit_null(&mut self) {
        self.emit(Opcode::AconstNull);
    }

    fn emit_constant(&mut self, constant: PoolConstant) {
        let opcode = if constant.slots() == 2 {
            Opcode::Ldc2W
        } else {
            Opcode::Ldc
        };
        self.push(Instruction::new(opcode, Operand::Constant(constant)));
    }

    // ==========================================================================
    // Labels and Jumps
    // ==========================================================================

    pub fn new_label(&mut self) -> Label {
        let label = Label(self.labels.len() as u32);
        self.labels.push(None);
        self.label_depths.push(None);
        label
    }

    /// Bind `label` to the next instruction.
    ///
    /// After an unconditional transfer the stack depth is restored to the
    /// depth recorded by the branches targeting the label.
    pub fn bind(&mut self, label: Label) {
        let idx = label.index() as usize;
        if let Some(slot) = self.labels.get_mut(idx) {
            *slot = Some(self.instructions.len());
        }
        if !self.reachable {
            if let Some(Some(depth)) = self.label_depths.get(idx) {
                self.depth = *depth;
            }
        }
        self.reachable = true;
    }

    pub fn emit_jump(&mut self, opcode: Opcode, label: Label) {
        self.push(Instruction::new(opcode, Operand::Label(label)));
    }

    pub fn emit_switch(&mut self, table: SwitchTable) {
        let opcode = if table.is_dense() {
            Opcode::Tableswitch
        } else {
            Opcode::Lookupswitch
        };
        self.push(Instruction::new(opcode, Operand::Switch(table)));
    }

    fn record_depth(&mut self, label: Label) {
        if let Some(slot) = self.label_depths.get_mut(label.index() as usize) {
            slot.get_or_insert(self.depth);
        }
    }

    // ==========================================================================
    // Finish
    // ==========================================================================

    /// Finish the body. Fails on stack underflow or a referenced label that
    /// was never bound.
    pub fn finish(self, max_locals: u16) -> Result<Code, InternalError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let mut labels = Vec::with_capacity(self.labels.len());
        for (idx, position) in self.labels.iter().enumerate() {
            match position {
                Some(position) => labels.push(*position),
                None if self.is_referenced(Label(idx as u32)) => {
                    return Err(InternalError::UnboundLabel { label: idx as u32 });
                }
                None => labels.push(usize::MAX),
            }
        }
        Ok(Code {
            instructions: self.instructions,
            labels,
            max_stack: self.max_stack,
            max_locals,
        })
    }

    fn is_referenced(&self, label: Label) -> bool {
        self.instructions.iter().any(|i| match &i.operand {
            Operand::Label(l) => *l == label,
            Operand::Switch(table) => {
                table.default == label || table.cases.iter().any(|&(_, l)| l == label)
            }
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_depth_and_max_stack() {
        let mut emitter = CodeEmitter::new("test");
        emitter.emit_long(5);
        emitter.emit_long(7);
        emitter.emit(Opcode::Ladd);
        assert_eq!(emitter.depth(), 2);
        emitter.emit_local(Opcode::Lstore, 1);
        emitter.emit(Opcode::Return);
        let code = emitter.finish(3).unwrap();
        assert_eq!(code.max_stack, 4);
        assert_eq!(code.max_locals, 3);
    }

    #[test]
    fn int_constants_use_short_forms() {
        let mut emitter = CodeEmitter::new("test");
        for value in [-1, 3, 100, 1000, 100_000] {
            emitter.emit_int(value);
        }
        let ops: Vec<Opcode> = emitter.instructions().iter().map(|i| i.opcode).collect();
        assert_eq!(
            ops,
            vec![
                Opcode::IconstM1,
                Opcode::Iconst3,
                Opcode::Bipush,
                Opcode::Sipush,
                Opcode::Ldc
            ]
        );
    }

    #[test]
    fn underflow_is_an_internal_error() {
        let mut emitter = CodeEmitter::new("broken");
        emitter.emit(Opcode::Pop);
        assert!(matches!(
            emitter.finish(0),
            Err(InternalError::StackUnderflow { .. })
        ));
    }

    #[test]
    fn unbound_label_is_an_internal_error() {
        let mut emitter = CodeEmitter::new("broken");
        let label = emitter.new_label();
        emitter.emit_jump(Opcode::Goto, label);
        assert_eq!(
            emitter.finish(0),
            Err(InternalError::UnboundLabel { label: 0 })
        );
    }

    #[test]
    fn binding_after_goto_restores_branch_depth() {
        let mut emitter = CodeEmitter::new("test");
        let else_label = emitter.new_label();
        let end = emitter.new_label();
        emitter.emit_int(1);
        emitter.emit_jump(Opcode::Ifeq, else_label);
        emitter.emit_int(10);
        emitter.emit_jump(Opcode::Goto, end);
        emitter.bind(else_label);
        assert_eq!(emitter.depth(), 0);
        emitter.emit_int(20);
        emitter.bind(end);
        assert_eq!(emitter.depth(), 1);
        emitter.emit(Opcode::Ireturn);
        let code = emitter.finish(0).unwrap();
        assert_eq!(code.label_position(end), Some(5));
    }
}
