//! Core types shared across the Kestrel compiler crates.
//!
//! This crate provides the foundational pieces every compilation stage uses:
//!
//! - [`Span`] - source locations
//! - [`PrimitiveKind`] - built-in value types
//! - [`Modifiers`] and [`Visibility`] - declaration modifiers
//! - [`Diagnostic`] and [`Diagnostics`] - user-facing messages
//! - [`CompilationError`], [`CompilationWarning`], [`InternalError`], [`IngestError`]
//! - [`ast`] - the declaration trees the pipeline consumes

pub mod ast;
pub mod diagnostics;
pub mod error;
pub mod modifiers;
pub mod primitive;
pub mod span;

pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::{CompilationError, CompilationWarning, IngestError, InternalError};
pub use modifiers::{Modifiers, Visibility};
pub use primitive::PrimitiveKind;
pub use span::Span;

/// Name of the platform package seeded into every type system.
pub const PLATFORM_PACKAGE: &str = "kestrel.lang";
