//! Declaration modifiers and member visibility.

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Modifiers written on a type or member declaration.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u32 {
        const PUBLIC = 1 << 0;
        const PROTECTED = 1 << 1;
        const PRIVATE = 1 << 2;
        const STATIC = 1 << 3;
        const FINAL = 1 << 4;
        const ABSTRACT = 1 << 5;
        const VIRTUAL = 1 << 6;
        const OVERRIDE = 1 << 7;
        const PARTIAL = 1 << 8;
        const NATIVE = 1 << 9;
        const SYNCHRONIZED = 1 << 10;
        const TRANSIENT = 1 << 11;
        const VOLATILE = 1 << 12;
        const STRICTFP = 1 << 13;
        /// Set on members the pipeline synthesized.
        const SYNTHETIC = 1 << 14;
        /// Set on enum types and enum constant fields.
        const ENUM = 1 << 15;

        const VISIBILITY = Self::PUBLIC.bits() | Self::PROTECTED.bits() | Self::PRIVATE.bits();
    }
}

impl Modifiers {
    /// The visibility these modifiers declare.
    pub fn visibility(self) -> Visibility {
        if self.contains(Modifiers::PUBLIC) {
            Visibility::Public
        } else if self.contains(Modifiers::PROTECTED) {
            Visibility::Protected
        } else if self.contains(Modifiers::PRIVATE) {
            Visibility::Private
        } else {
            Visibility::Package
        }
    }

    /// Replace the visibility bits.
    pub fn with_visibility(self, visibility: Visibility) -> Modifiers {
        (self - Modifiers::VISIBILITY) | visibility.modifier()
    }

    pub fn is_static(self) -> bool {
        self.contains(Modifiers::STATIC)
    }

    pub fn is_final(self) -> bool {
        self.contains(Modifiers::FINAL)
    }

    pub fn is_abstract(self) -> bool {
        self.contains(Modifiers::ABSTRACT)
    }

    /// Keyword list in canonical order, for diagnostics.
    pub fn keywords(self) -> Vec<&'static str> {
        const NAMES: [(Modifiers, &str); 14] = [
            (Modifiers::PUBLIC, "public"),
            (Modifiers::PROTECTED, "protected"),
            (Modifiers::PRIVATE, "private"),
            (Modifiers::STATIC, "static"),
            (Modifiers::FINAL, "final"),
            (Modifiers::ABSTRACT, "abstract"),
            (Modifiers::VIRTUAL, "virtual"),
            (Modifiers::OVERRIDE, "override"),
            (Modifiers::PARTIAL, "partial"),
            (Modifiers::NATIVE, "native"),
            (Modifiers::SYNCHRONIZED, "synchronized"),
            (Modifiers::TRANSIENT, "transient"),
            (Modifiers::VOLATILE, "volatile"),
            (Modifiers::STRICTFP, "strictfp"),
        ];
        NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

/// Visibility of a type or member.
///
/// `Package` is the default when no visibility keyword is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub enum Visibility {
    Private,
    #[default]
    Package,
    Protected,
    Public,
}

impl Visibility {
    pub fn modifier(self) -> Modifiers {
        match self {
            Visibility::Public => Modifiers::PUBLIC,
            Visibility::Protected => Modifiers::PROTECTED,
            Visibility::Private => Modifiers::PRIVATE,
            Visibility::Package => Modifiers::empty(),
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Public => write!(f, "public"),
            Visibility::Protected => write!(f, "protected"),
            Visibility::Private => write!(f, "private"),
            Visibility::Package => write!(f, "package-private"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_visibility_is_package() {
        assert_eq!(Modifiers::STATIC.visibility(), Visibility::Package);
    }

    #[test]
    fn with_visibility_replaces_existing_bits() {
        let mods = (Modifiers::PRIVATE | Modifiers::FINAL).with_visibility(Visibility::Public);
        assert_eq!(mods, Modifiers::PUBLIC | Modifiers::FINAL);
    }

    #[test]
    fn keywords_are_canonically_ordered() {
        let mods = Modifiers::FINAL | Modifiers::PUBLIC | Modifiers::STATIC;
        assert_eq!(mods.keywords(), vec!["public", "static", "final"]);
    }

    #[test]
    fn visibility_ordering_widens_towards_public() {
        assert!(Visibility::Public > Visibility::Protected);
        assert!(Visibility::Protected > Visibility::Package);
        assert!(Visibility::Package > Visibility::Private);
    }
}
