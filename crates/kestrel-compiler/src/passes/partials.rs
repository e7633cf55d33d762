//! Bookkeeping for partial types and partial methods.
//!
//! Lives only while the defining stages run: partial type parts are merged by
//! qualified name during types definition, and partial method parts are paired
//! during members definition.

use kestrel_core::ast::{NodeId, TypeDeclKind};
use kestrel_core::{CompilationError, Span};
use kestrel_types::{MethodId, TypeDefId};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy)]
pub(crate) struct PartialTypeInfo {
    pub kind: TypeDeclKind,
    pub parts: usize,
}

#[derive(Debug, Default)]
pub(crate) struct PartialTypes {
    types: FxHashMap<TypeDefId, PartialTypeInfo>,
}

impl PartialTypes {
    pub fn register(&mut self, def: TypeDefId, kind: TypeDeclKind) {
        self.types.insert(def, PartialTypeInfo { kind, parts: 1 });
    }

    pub fn is_partial(&self, def: TypeDefId) -> bool {
        self.types.contains_key(&def)
    }

    /// Merge another part into `def`. Parts must agree on their kind.
    pub fn merge(&mut self, def: TypeDefId, kind: TypeDeclKind, name: &str) -> Result<(), CompilationError> {
        match self.types.get_mut(&def) {
            Some(info) if info.kind == kind => {
                info.parts += 1;
                Ok(())
            }
            _ => Err(CompilationError::PartialKindMismatch {
                name: name.to_string(),
            }),
        }
    }

    pub fn parts(&self, def: TypeDefId) -> usize {
        self.types.get(&def).map_or(1, |info| info.parts)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct PartialMethodInfo {
    /// The surviving definition: the implementing part once one is seen.
    pub method: MethodId,
    pub file: String,
    pub span: Span,
    pub has_declaration: bool,
    pub has_implementation: bool,
    /// Declaration nodes of every part, re-pointed when the surviving definition changes.
    pub nodes: Vec<NodeId>,
}

/// Partial methods keyed by declaring type and erased signature.
#[derive(Debug, Default)]
pub(crate) struct PartialMethods {
    methods: FxHashMap<(TypeDefId, String), PartialMethodInfo>,
}

impl PartialMethods {
    pub fn get_mut(&mut self, def: TypeDefId, signature: &str) -> Option<&mut PartialMethodInfo> {
        self.methods.get_mut(&(def, signature.to_string()))
    }

    pub fn insert(&mut self, def: TypeDefId, signature: String, info: PartialMethodInfo) {
        self.methods.insert((def, signature), info);
    }

    /// Partial methods declared but never implemented.
    pub fn unimplemented(&self) -> impl Iterator<Item = &PartialMethodInfo> {
        self.methods.values().filter(|info| !info.has_implementation)
    }
}
