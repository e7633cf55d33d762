//! Locals of one body and the lexical scopes used to resolve their names.
//!
//! - [`LocalTable`] owns every local and parameter of a body, with the read
//!   and write counts flow analysis collects. Slots are assigned only when
//!   code is generated and locals marked unused never receive one.
//! - [`ScopeStack`] maps names to locals while a body is validated, with
//!   nested block scopes and shadowing detection.

use kestrel_core::ast::NodeId;
use kestrel_core::{CompilationError, Span};
use kestrel_types::{LocalId, TypeId};
use rustc_hash::FxHashMap;

// ============================================================================
// LocalTable
// ============================================================================

/// A local variable or parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalInfo {
    pub id: LocalId,
    pub name: String,
    pub ty: TypeId,
    pub span: Span,
    pub is_parameter: bool,
    pub reads: u32,
    pub writes: u32,
    /// Never read nor written; no slot is assigned.
    pub unused: bool,
    /// The declaring statement or parameter node.
    pub decl: NodeId,
}

/// Locals of a single body in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalTable {
    locals: Vec<LocalInfo>,
    /// Slot 0 holds `this`.
    has_this: bool,
}

impl LocalTable {
    pub fn new(has_this: bool) -> Self {
        Self {
            locals: Vec::new(),
            has_this,
        }
    }

    pub fn declare(
        &mut self,
        name: &str,
        ty: TypeId,
        span: Span,
        decl: NodeId,
        is_parameter: bool,
    ) -> LocalId {
        let id = LocalId::new(self.locals.len() as u32);
        self.locals.push(LocalInfo {
            id,
            name: name.to_string(),
            ty,
            span,
            is_parameter,
            reads: 0,
            writes: 0,
            unused: false,
            decl,
        });
        id
    }

    pub fn get(&self, id: LocalId) -> &LocalInfo {
        &self.locals[id.index()]
    }

    pub fn get_mut(&mut self, id: LocalId) -> &mut LocalInfo {
        &mut self.locals[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &LocalInfo> {
        self.locals.iter()
    }

    pub fn len(&self) -> usize {
        self.locals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locals.is_empty()
    }

    pub fn has_this(&self) -> bool {
        self.has_this
    }

    /// Assign slots to every used local.
    ///
    /// Returns the slot of each local (`None` for unused ones) and the first
    /// free slot. Parameters are always assigned, in order, right after `this`.
    pub fn assign_slots(&self) -> (Vec<Option<u16>>, u16) {
        let mut next: u16 = if self.has_this { 1 } else { 0 };
        let mut slots = Vec::with_capacity(self.locals.len());
        for local in &self.locals {
            if local.unused && !local.is_parameter {
                slots.push(None);
                continue;
            }
            slots.push(Some(next));
            next += local.ty.slots().max(1);
        }
        (slots, next)
    }
}

// ============================================================================
// ScopeStack
// ============================================================================

/// Name resolution for locals during validation.
#[derive(Debug, Default)]
pub struct ScopeStack {
    scopes: Vec<FxHashMap<String, LocalId>>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self {
            scopes: vec![FxHashMap::default()],
        }
    }

    pub fn push(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    pub fn pop(&mut self) {
        self.scopes.pop();
    }

    /// Bind `name` in the innermost scope.
    ///
    /// A local may not shadow another local of any enclosing scope.
    pub fn bind(&mut self, name: &str, id: LocalId) -> Result<(), CompilationError> {
        if self.lookup(name).is_some() {
            return Err(CompilationError::DuplicateLocal {
                name: name.to_string(),
            });
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), id);
        }
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<LocalId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declare(table: &mut LocalTable, name: &str, ty: TypeId, param: bool) -> LocalId {
        table.declare(name, ty, Span::default(), NodeId(0), param)
    }

    #[test]
    fn slots_skip_unused_locals_and_widen_for_category2() {
        let mut table = LocalTable::new(true);
        let p = declare(&mut table, "p", TypeId::LONG, true);
        let unused = declare(&mut table, "unused", TypeId::INT, false);
        let x = declare(&mut table, "x", TypeId::INT, false);
        table.get_mut(unused).unused = true;

        let (slots, next) = table.assign_slots();
        assert_eq!(slots[p.index()], Some(1));
        assert_eq!(slots[unused.index()], None);
        assert_eq!(slots[x.index()], Some(3));
        assert_eq!(next, 4);
    }

    #[test]
    fn static_bodies_start_at_slot_zero() {
        let mut table = LocalTable::new(false);
        let a = declare(&mut table, "a", TypeId::DOUBLE, true);
        let (slots, next) = table.assign_slots();
        assert_eq!(slots[a.index()], Some(0));
        assert_eq!(next, 2);
    }

    #[test]
    fn inner_scope_cannot_shadow_outer_local() {
        let mut scopes = ScopeStack::new();
        scopes.bind("i", LocalId::new(0)).unwrap();
        scopes.push();
        assert!(matches!(
            scopes.bind("i", LocalId::new(1)),
            Err(CompilationError::DuplicateLocal { .. })
        ));
        scopes.bind("j", LocalId::new(2)).unwrap();
        scopes.pop();
        assert_eq!(scopes.lookup("j"), None);
        assert_eq!(scopes.lookup("i"), Some(LocalId::new(0)));
    }
}
