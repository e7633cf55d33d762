//! State owned by one compilation run.

use std::rc::Rc;

use kestrel_core::Diagnostics;
use kestrel_core::ast::CompilationUnit;
use kestrel_types::{MemberModel, TypeSystem};

use crate::node_tables::NodeTables;

/// Everything a run accumulates: the type registry, the member lookup cache,
/// the node side tables, the diagnostic bag and the ingested units.
///
/// Units are held behind `Rc` so passes can iterate over a clone of the list
/// while mutating the rest of the session.
#[derive(Debug, Default)]
pub struct CompilationSession {
    pub types: TypeSystem,
    pub members: MemberModel,
    pub tables: NodeTables,
    pub diagnostics: Diagnostics,
    pub units: Vec<Rc<CompilationUnit>>,
}

impl CompilationSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_unit(&mut self, unit: CompilationUnit) {
        self.units.push(Rc::new(unit));
    }

    /// A snapshot of the unit list for iteration.
    pub fn units(&self) -> Vec<Rc<CompilationUnit>> {
        self.units.clone()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }

    /// Return the session to the state of a fresh one.
    pub fn reset(&mut self) {
        self.types = TypeSystem::new();
        self.members.reset();
        self.tables.clear();
        self.diagnostics.clear();
        self.units.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_core::ast::AstBuilder;
    use kestrel_core::{CompilationError, Span};

    #[test]
    fn reset_clears_units_and_diagnostics() {
        let b = AstBuilder::new();
        let mut session = CompilationSession::new();
        session.add_unit(b.unit("A.ks", Some("app"), vec![b.class("A")]));
        session
            .diagnostics
            .error("A.ks", Span::default(), CompilationError::NotAssignable);
        session.reset();
        assert!(session.units.is_empty());
        assert!(!session.has_errors());
        assert!(session.types.find_type("kestrel.lang.Object").is_some());
    }
}
