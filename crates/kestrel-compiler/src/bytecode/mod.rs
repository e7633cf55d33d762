//! Instruction model of the target stack machine.
//!
//! - [`Opcode`] - the closed instruction set
//! - [`Instruction`] - an opcode plus one typed [`Operand`]
//! - [`ConstantPool`] - per-class constant storage used by the class writer

mod constant;
mod instruction;
mod opcode;

pub use constant::{ConstantPool, PoolEntry};
pub use instruction::{FieldRef, Instruction, Label, MethodRef, Operand, PoolConstant, SwitchTable};
pub use opcode::Opcode;
