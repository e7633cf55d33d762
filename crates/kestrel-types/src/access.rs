//! Package and nesting aware accessibility.

use kestrel_core::Visibility;

use crate::ids::TypeDefId;
use crate::type_system::TypeSystem;

impl TypeSystem {
    /// Whether code in `from` may access a member declared in `declaring`
    /// with the given visibility flags.
    ///
    /// Never fails: an inaccessible member simply yields `false` and the caller
    /// decides which diagnostic to raise.
    pub fn can_access_member(
        &self,
        from: TypeDefId,
        declaring: TypeDefId,
        is_public: bool,
        is_protected: bool,
        is_private: bool,
    ) -> bool {
        if from == declaring {
            return true;
        }
        if is_public {
            return true;
        }
        if is_private {
            return self.top_level(from) == self.top_level(declaring);
        }
        if self.def(from).package == self.def(declaring).package {
            return true;
        }
        if is_protected {
            let mut current = Some(from);
            while let Some(def) = current {
                if self.derives_from(def, declaring) {
                    return true;
                }
                current = self.def(def).enclosing;
            }
        }
        false
    }

    /// [`can_access_member`](Self::can_access_member) driven by a [`Visibility`].
    pub fn can_access(&self, from: TypeDefId, declaring: TypeDefId, visibility: Visibility) -> bool {
        self.can_access_member(
            from,
            declaring,
            visibility == Visibility::Public,
            visibility == Visibility::Protected,
            visibility == Visibility::Private,
        )
    }

    /// Whether `from` may name the type `def`.
    ///
    /// A nested type must also be reachable through each enclosing type.
    pub fn can_access_type(&self, from: TypeDefId, def: TypeDefId) -> bool {
        let entry = self.def(def);
        let visible = match entry.enclosing {
            Some(outer) => self.can_access(from, outer, entry.visibility()),
            None => {
                entry.visibility() == Visibility::Public
                    || self.def(from).package == entry.package
                    || self.top_level(from) == def
            }
        };
        visible
            && entry
                .enclosing
                .is_none_or(|outer| self.can_access_type(from, outer))
    }

    /// The less accessible of two visibilities, taking enclosing types into account.
    pub fn effective_visibility(&self, def: TypeDefId) -> Visibility {
        let entry = self.def(def);
        let own = entry.visibility();
        match entry.enclosing {
            Some(outer) => own.min(self.effective_visibility(outer)),
            None => own,
        }
    }
}
