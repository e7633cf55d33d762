//! Declaration trees consumed by the compiler.
//!
//! Trees are produced by an external parser and are never mutated by the
//! pipeline. Every node that a stage needs to annotate carries a [`NodeId`];
//! stages record their results in side tables keyed by that id.
//!
//! ## Layout
//!
//! ```text
//! CompilationUnit
//! └── TypeDecl (class / interface / enum / delegate / annotation)
//!     ├── MemberDecl (field, method, property, indexer, constructor, nested type)
//!     │   └── Block → Stmt → Expr
//!     └── EnumConstantDecl
//! ```

mod builder;
mod decl;
mod expr;
mod stmt;
mod types;

pub use builder::AstBuilder;
pub use decl::*;
pub use expr::*;
pub use stmt::*;
pub use types::*;

use std::fmt;

/// Identity of a node within one compilation.
///
/// Ids are unique across all compilation units of a run; [`AstBuilder`]
/// allocates them from a shared counter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
