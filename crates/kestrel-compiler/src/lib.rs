//! Kestrel Compiler
//!
//! The staged pipeline that turns parsed compilation units into binaries.
//!
//! ## Architecture
//!
//! - **Declarations**: types, supertypes, members and annotations are
//!   registered into the [`TypeSystem`](kestrel_types::TypeSystem) one stage
//!   at a time.
//! - **Validation**: every body is type checked, annotated in the
//!   [`NodeTables`] and flow analysed.
//! - **Generation**: annotated bodies are lowered to stack-machine
//!   instructions and written out by a [`BinaryEmitter`].
//!
//! ## Modules
//!
//! - [`bytecode`]: Instruction model (Opcode, Instruction, ConstantPool)
//! - [`class_writer`]: Binary output (BinaryEmitter, ClassWriter)
//! - [`codegen`]: Lowering of validated bodies
//! - [`conversion`]: Assignment and cast conversions
//! - [`emit`]: Instruction emitter with stack depth tracking
//! - [`flow`]: Definite assignment and reachability
//! - [`node_tables`]: Per-node side tables written by the passes
//! - [`operators`]: Operator typing and constant folding
//! - [`passes`]: The compilation stages
//! - [`scope`]: Local variables of one body
//! - [`session`]: State owned by a run
//! - [`type_resolver`]: Type references to semantic types
//! - [`validate`]: Statement and expression validation

pub mod bytecode;
pub mod class_writer;
pub mod codegen;
mod constant_eval;
pub mod conversion;
pub mod emit;
mod expr_info;
pub mod flow;
pub mod node_tables;
pub mod operators;
pub mod passes;
pub mod scope;
pub mod session;
pub mod type_resolver;
pub mod validate;

pub use class_writer::{BinaryEmitter, ClassWriter};
pub use codegen::BodyGenerator;
pub use conversion::{Conversion, assignment_conversion, cast_conversion};
pub use emit::{Code, CodeEmitter};
pub use expr_info::{BoxingKind, ExpressionInfo};
pub use flow::FlowAnalysis;
pub use node_tables::{Builder, NodeTables};
pub use passes::{
    AnnotationsPass, BytecodeGenerationPass, CodeValidationPass, CompilationStage, GeneratedMethod,
    GeneratedType, MembersDefinitionPass, PassOutput, SuperTypesPass, TypesDefinitionPass,
};
pub use scope::{LocalInfo, LocalTable, ScopeStack};
pub use session::CompilationSession;
pub use type_resolver::TypeResolver;
pub use validate::{BodyRef, BodyValidator, ConstructorCall, DefaultValidator, MethodContext, ValidationEnv};

// Re-export error types from core for convenience
pub use kestrel_core::{CompilationError, CompilationWarning, InternalError};
