//! Type references as written in source.

use std::fmt;

use super::NodeId;
use crate::primitive::PrimitiveKind;
use crate::span::Span;

/// A type reference as written in source, resolved during the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeRef {
    pub id: NodeId,
    pub span: Span,
    pub kind: TypeRefKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeRefKind {
    Primitive(PrimitiveKind),
    /// A possibly dotted name (`List`, `kestrel.lang.String`, `Outer.Inner`)
    /// with optional type arguments on its last segment.
    Named {
        name: String,
        type_args: Vec<TypeRef>,
    },
    Array(Box<TypeRef>),
    /// `?`, `? extends B` or `? super B`. Only valid as a type argument.
    Wildcard(Option<(WildcardBound, Box<TypeRef>)>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WildcardBound {
    Extends,
    Super,
}

impl TypeRef {
    pub fn is_void(&self) -> bool {
        matches!(self.kind, TypeRefKind::Primitive(PrimitiveKind::Void))
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeRefKind::Primitive(kind) => write!(f, "{}", kind),
            TypeRefKind::Named { name, type_args } => {
                write!(f, "{}", name)?;
                if !type_args.is_empty() {
                    write!(f, "<")?;
                    for (i, arg) in type_args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
            TypeRefKind::Array(element) => write!(f, "{}[]", element),
            TypeRefKind::Wildcard(None) => write!(f, "?"),
            TypeRefKind::Wildcard(Some((WildcardBound::Extends, bound))) => {
                write!(f, "? extends {}", bound)
            }
            TypeRefKind::Wildcard(Some((WildcardBound::Super, bound))) => {
                write!(f, "? super {}", bound)
            }
        }
    }
}
