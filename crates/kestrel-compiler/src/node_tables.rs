//! Side tables attaching stage results to declaration nodes.
//!
//! Trees are never mutated. Each stage records what it learned about a node
//! here, keyed by [`NodeId`], and later stages read it back:
//!
//! ```text
//! TypesDefinition     → builders (Type)
//! MembersDefinition   → builders (Method, Field, Property, Indexer)
//! CodeValidation      → expressions, locals, bodies, constructor targets
//! BytecodeGeneration  → reads everything above
//! ```

use kestrel_core::InternalError;
use kestrel_core::ast::NodeId;
use kestrel_types::{FieldId, LocalId, MethodId, TypeDefId};
use rustc_hash::FxHashMap;

use crate::expr_info::ExpressionInfo;
use crate::scope::LocalTable;

/// The definition a declaration node was turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builder {
    Type(TypeDefId),
    Method(MethodId),
    Field(FieldId),
    Property {
        getter: Option<MethodId>,
        setter: Option<MethodId>,
    },
    Indexer {
        getter: Option<MethodId>,
        setter: Option<MethodId>,
    },
}

#[derive(Debug, Default)]
pub struct NodeTables {
    builders: FxHashMap<NodeId, Builder>,
    expressions: FxHashMap<NodeId, ExpressionInfo>,
    /// Declared locals: variable declaration statements and parameters.
    locals: FxHashMap<NodeId, LocalId>,
    bodies: FxHashMap<NodeId, LocalTable>,
    /// Constructor invoked by a constructor declaration (its `super`/`this`
    /// call, explicit or implicit), by a type's implicit constructor, or by
    /// an enum constant.
    constructor_targets: FxHashMap<NodeId, MethodId>,
}

impl NodeTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.builders.clear();
        self.expressions.clear();
        self.locals.clear();
        self.bodies.clear();
        self.constructor_targets.clear();
    }

    // ========================================================================
    // Builders
    // ========================================================================

    pub fn set_builder(&mut self, node: NodeId, builder: Builder) {
        self.builders.insert(node, builder);
    }

    pub fn builder(&self, node: NodeId) -> Option<Builder> {
        self.builders.get(&node).copied()
    }

    pub fn type_builder(&self, node: NodeId) -> Option<TypeDefId> {
        match self.builder(node)? {
            Builder::Type(def) => Some(def),
            _ => None,
        }
    }

    pub fn method_builder(&self, node: NodeId) -> Option<MethodId> {
        match self.builder(node)? {
            Builder::Method(method) => Some(method),
            _ => None,
        }
    }

    pub fn field_builder(&self, node: NodeId) -> Option<FieldId> {
        match self.builder(node)? {
            Builder::Field(field) => Some(field),
            _ => None,
        }
    }

    /// Like [`method_builder`](Self::method_builder) for stages that require it.
    pub fn require_method(&self, node: NodeId) -> Result<MethodId, InternalError> {
        self.method_builder(node)
            .ok_or(InternalError::MissingBuilder { node: node.index() })
    }

    pub fn require_type(&self, node: NodeId) -> Result<TypeDefId, InternalError> {
        self.type_builder(node)
            .ok_or(InternalError::MissingBuilder { node: node.index() })
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    pub fn set_expression(&mut self, node: NodeId, info: ExpressionInfo) {
        self.expressions.insert(node, info);
    }

    pub fn expression(&self, node: NodeId) -> Option<&ExpressionInfo> {
        self.expressions.get(&node)
    }

    pub fn expression_mut(&mut self, node: NodeId) -> Option<&mut ExpressionInfo> {
        self.expressions.get_mut(&node)
    }

    pub fn require_expression(&self, node: NodeId) -> Result<&ExpressionInfo, InternalError> {
        self.expression(node)
            .ok_or(InternalError::MissingExpressionInfo { node: node.index() })
    }

    // ========================================================================
    // Locals and bodies
    // ========================================================================

    pub fn set_local(&mut self, node: NodeId, local: LocalId) {
        self.locals.insert(node, local);
    }

    pub fn local(&self, node: NodeId) -> Option<LocalId> {
        self.locals.get(&node).copied()
    }

    pub fn set_body(&mut self, node: NodeId, table: LocalTable) {
        self.bodies.insert(node, table);
    }

    pub fn body(&self, node: NodeId) -> Option<&LocalTable> {
        self.bodies.get(&node)
    }

    pub fn body_mut(&mut self, node: NodeId) -> Option<&mut LocalTable> {
        self.bodies.get_mut(&node)
    }

    pub fn set_constructor_target(&mut self, node: NodeId, target: MethodId) {
        self.constructor_targets.insert(node, target);
    }

    pub fn constructor_target(&self, node: NodeId) -> Option<MethodId> {
        self.constructor_targets.get(&node).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_types::TypeId;

    #[test]
    fn missing_entries_are_internal_errors() {
        let tables = NodeTables::new();
        assert_eq!(
            tables.require_expression(NodeId(7)),
            Err(InternalError::MissingExpressionInfo { node: 7 })
        );
        assert_eq!(
            tables.require_method(NodeId(3)),
            Err(InternalError::MissingBuilder { node: 3 })
        );
    }

    #[test]
    fn clear_drops_every_table() {
        let mut tables = NodeTables::new();
        tables.set_expression(NodeId(1), ExpressionInfo::value(TypeId::INT));
        tables.set_local(NodeId(2), LocalId::new(0));
        tables.clear();
        assert!(tables.expression(NodeId(1)).is_none());
        assert!(tables.local(NodeId(2)).is_none());
    }
}
