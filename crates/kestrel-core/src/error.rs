//! Error and warning types for the Kestrel compiler.
//!
//! ## Error Hierarchy
//!
//! ```text
//! CompilationError    - user code errors, reported as error diagnostics
//! CompilationWarning  - suspicious but valid code, reported as warnings
//! InternalError       - compiler defects, never shown as user diagnostics
//! IngestError         - failures while reading a declaration source
//! ```
//!
//! Every user-facing variant carries a stable numeric id (see [`CompilationError::id`]),
//! which is what a [`Diagnostic`](crate::Diagnostic) records alongside the rendered
//! message.

use thiserror::Error;

// ============================================================================
// Compilation Errors
// ============================================================================

/// Errors in user code detected by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompilationError {
    #[error("{message}")]
    ParseFailure { message: String },

    #[error("the type '{name}' is already defined")]
    DuplicateType { name: String },

    #[error("'{name}' cannot be resolved to a type")]
    UnresolvedType { name: String },

    #[error("'{name}' is not an interface")]
    NotAnInterface { name: String },

    #[error("'{name}' cannot have more than one base class")]
    MultipleBaseClasses { name: String },

    #[error("the base class '{base}' must be listed before any interface")]
    BaseClassNotFirst { base: String },

    #[error("'{name}' cannot derive from final type '{base}'")]
    FinalBaseType { name: String, base: String },

    #[error("inconsistent accessibility: base type '{base}' is less accessible than '{name}'")]
    InconsistentAccessibility { name: String, base: String },

    #[error("cyclic inheritance involving '{name}'")]
    CyclicInheritance { name: String },

    #[error("illegal combination of modifiers '{first}' and '{second}' on '{name}'")]
    IllegalModifiers {
        name: String,
        first: &'static str,
        second: &'static str,
    },

    #[error("partial declarations of '{name}' must all be of the same kind")]
    PartialKindMismatch { name: String },

    #[error("'{signature}' is already defined in '{type_name}'")]
    DuplicateMember { type_name: String, signature: String },

    #[error("'{name}' is marked override but no overridable method was found")]
    NothingToOverride { name: String },

    #[error("'{name}' is not an annotation type")]
    NotAnAnnotationType { name: String },

    #[error("the annotation '{annotation}' has no element named '{element}'")]
    UnknownAnnotationElement { annotation: String, element: String },

    #[error("missing value for element '{element}' of annotation '{annotation}'")]
    MissingAnnotationElement { annotation: String, element: String },

    #[error("the value for annotation element '{element}' must be a constant")]
    NonConstantAnnotationValue { element: String },

    #[error("'{ty}' is not a valid type for annotation element '{element}'")]
    InvalidAnnotationElementType { element: String, ty: String },

    #[error("constant value {value} cannot be converted to '{target}'")]
    ConstantOutOfRange { value: String, target: String },

    #[error("use of unassigned local variable '{name}'")]
    UnassignedLocal { name: String },

    #[error("'{name}' cannot be resolved")]
    UnresolvedName { name: String },

    #[error("cannot implicitly convert from '{from}' to '{to}'")]
    TypeMismatch { from: String, to: String },

    #[error("'{member}' is not accessible from '{from}'")]
    InaccessibleMember { member: String, from: String },

    #[error("no applicable method '{name}' taking {arity} argument(s)")]
    NoApplicableMethod { name: String, arity: usize },

    #[error("operator '{op}' cannot be applied to operands of type '{left}' and '{right}'")]
    InvalidBinaryOperands {
        op: &'static str,
        left: String,
        right: String,
    },

    #[error("operator '{op}' cannot be applied to an operand of type '{operand}'")]
    InvalidUnaryOperand { op: &'static str, operand: String },

    #[error("the left-hand side of an assignment must be a variable, field, property or indexer")]
    NotAssignable,

    #[error("'{name}' is read-only")]
    ReadOnly { name: String },

    #[error("a local variable named '{name}' is already defined in this scope")]
    DuplicateLocal { name: String },

    #[error("not all code paths return a value in '{method}'")]
    MissingReturn { method: String },

    #[error("'{keyword}' is only valid inside a loop")]
    JumpOutsideLoop { keyword: &'static str },

    #[error("'{base}' has no accessible constructor taking {arity} argument(s)")]
    NoAccessibleConstructor { base: String, arity: usize },

    #[error("cannot reference instance member '{name}' from a static context")]
    InstanceMemberFromStatic { name: String },

    #[error("cannot instantiate abstract type '{name}'")]
    AbstractInstantiation { name: String },

    #[error("{message}")]
    InvalidReturn { message: String },

    #[error("duplicate case label {value}")]
    DuplicateCaseLabel { value: String },

    #[error("'{name}' expects {expected} type argument(s) but {found} were supplied")]
    TypeArgumentCount {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("'{argument}' does not satisfy the bound of type parameter '{parameter}'")]
    BoundViolation { argument: String, parameter: String },

    #[error("'{method}' must declare a body because it is not abstract, native or partial")]
    MissingBody { method: String },

    #[error("a switch expression of type '{ty}' is not supported")]
    InvalidSwitchType { ty: String },
}

impl CompilationError {
    /// Stable numeric identifier for this error kind.
    pub fn id(&self) -> u32 {
        match self {
            CompilationError::ParseFailure { .. } => 1,
            CompilationError::DuplicateType { .. } => 2,
            CompilationError::UnresolvedType { .. } => 3,
            CompilationError::NotAnInterface { .. } => 4,
            CompilationError::MultipleBaseClasses { .. } => 5,
            CompilationError::BaseClassNotFirst { .. } => 6,
            CompilationError::FinalBaseType { .. } => 7,
            CompilationError::InconsistentAccessibility { .. } => 8,
            CompilationError::CyclicInheritance { .. } => 9,
            CompilationError::IllegalModifiers { .. } => 10,
            CompilationError::PartialKindMismatch { .. } => 11,
            CompilationError::DuplicateMember { .. } => 12,
            CompilationError::NothingToOverride { .. } => 13,
            CompilationError::NotAnAnnotationType { .. } => 14,
            CompilationError::UnknownAnnotationElement { .. } => 15,
            CompilationError::MissingAnnotationElement { .. } => 16,
            CompilationError::NonConstantAnnotationValue { .. } => 17,
            CompilationError::InvalidAnnotationElementType { .. } => 18,
            CompilationError::ConstantOutOfRange { .. } => 19,
            CompilationError::UnassignedLocal { .. } => 20,
            CompilationError::UnresolvedName { .. } => 21,
            CompilationError::TypeMismatch { .. } => 22,
            CompilationError::InaccessibleMember { .. } => 23,
            CompilationError::NoApplicableMethod { .. } => 24,
            CompilationError::InvalidBinaryOperands { .. } => 25,
            CompilationError::InvalidUnaryOperand { .. } => 26,
            CompilationError::NotAssignable => 27,
            CompilationError::ReadOnly { .. } => 28,
            CompilationError::DuplicateLocal { .. } => 29,
            CompilationError::MissingReturn { .. } => 30,
            CompilationError::JumpOutsideLoop { .. } => 31,
            CompilationError::NoAccessibleConstructor { .. } => 32,
            CompilationError::InstanceMemberFromStatic { .. } => 33,
            CompilationError::AbstractInstantiation { .. } => 34,
            CompilationError::InvalidReturn { .. } => 35,
            CompilationError::DuplicateCaseLabel { .. } => 36,
            CompilationError::TypeArgumentCount { .. } => 37,
            CompilationError::BoundViolation { .. } => 38,
            CompilationError::MissingBody { .. } => 39,
            CompilationError::InvalidSwitchType { .. } => 40,
        }
    }
}

// ============================================================================
// Compilation Warnings
// ============================================================================

/// Suspicious but valid code. Warnings never stop the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompilationWarning {
    #[error("the local variable '{name}' is declared but never used")]
    LocalNeverUsed { name: String },

    #[error("the local variable '{name}' is assigned but its value is never read")]
    LocalNeverRead { name: String },

    #[error("the partial method '{name}' has no implementation and calls to it are removed")]
    PartialMethodNotImplemented { name: String },

    #[error("'{name}' hides an inherited overridable method; add 'override' to override it")]
    MissingOverride { name: String },

    #[error("'{name}' is deprecated")]
    DeprecatedUsage { name: String },

    #[error("unreachable code detected")]
    UnreachableCode,
}

impl CompilationWarning {
    /// Stable numeric identifier for this warning kind.
    pub fn id(&self) -> u32 {
        match self {
            CompilationWarning::LocalNeverUsed { .. } => 100,
            CompilationWarning::LocalNeverRead { .. } => 101,
            CompilationWarning::PartialMethodNotImplemented { .. } => 102,
            CompilationWarning::MissingOverride { .. } => 103,
            CompilationWarning::DeprecatedUsage { .. } => 104,
            CompilationWarning::UnreachableCode => 105,
        }
    }
}

// ============================================================================
// Internal Errors
// ============================================================================

/// Compiler defects: states a validated program should never reach.
///
/// These surface as `Err` from the code generator and are converted by the
/// facade into a single diagnostic with id 0.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InternalError {
    #[error("internal error: no expression info recorded for node {node}")]
    MissingExpressionInfo { node: u32 },

    #[error("internal error: no builder attached to node {node}")]
    MissingBuilder { node: u32 },

    #[error("internal error: '{kind}' is not a valid assignment target")]
    UnsupportedTarget { kind: &'static str },

    #[error("internal error: operator '{op}' is not supported on '{ty}'")]
    UnsupportedOperator { op: &'static str, ty: String },

    #[error("internal error: operand stack underflow in '{method}'")]
    StackUnderflow { method: String },

    #[error("internal error: label {label} was never bound")]
    UnboundLabel { label: u32 },

    #[error("internal error: {message}")]
    Other { message: String },
}

impl InternalError {
    pub const ID: u32 = 0;

    pub fn other(message: impl Into<String>) -> Self {
        InternalError::Other {
            message: message.into(),
        }
    }
}

// ============================================================================
// Ingest Errors
// ============================================================================

/// Failures reported by a declaration source while it is read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    /// The file could not be parsed; its declarations are skipped.
    #[error("{file}:{line}:{col}: {message}")]
    Recoverable {
        file: String,
        line: u32,
        col: u32,
        message: String,
    },

    /// Ingestion cannot continue; the whole compilation is aborted.
    #[error("fatal error reading '{file}': {message}")]
    Fatal { file: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashSet;

    #[test]
    fn error_messages_render_names() {
        let err = CompilationError::DuplicateType {
            name: "app.Foo".to_string(),
        };
        assert_eq!(err.to_string(), "the type 'app.Foo' is already defined");
    }

    #[test]
    fn warning_and_error_ids_do_not_collide() {
        let errors = [
            CompilationError::NotAssignable.id(),
            CompilationError::ParseFailure {
                message: String::new(),
            }
            .id(),
            CompilationError::BoundViolation {
                argument: String::new(),
                parameter: String::new(),
            }
            .id(),
        ];
        let warnings = [
            CompilationWarning::UnreachableCode.id(),
            CompilationWarning::LocalNeverUsed {
                name: String::new(),
            }
            .id(),
        ];
        let all: FxHashSet<u32> = errors.iter().chain(warnings.iter()).copied().collect();
        assert_eq!(all.len(), errors.len() + warnings.len());
        assert!(!all.contains(&InternalError::ID));
    }

    #[test]
    fn internal_error_is_marked_internal() {
        let err = InternalError::UnsupportedTarget { kind: "literal" };
        assert!(err.to_string().starts_with("internal error"));
    }
}
