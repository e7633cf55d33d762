//! Type and member declarations.

use std::fmt;

use super::{Block, Expr, NodeId, TypeRef};
use crate::modifiers::Modifiers;
use crate::span::Span;

/// One parsed source file.
#[derive(Debug, Clone, PartialEq)]
pub struct CompilationUnit {
    /// File name used in diagnostics.
    pub file: String,
    /// Dotted package name; `None` for the default package.
    pub package: Option<String>,
    pub imports: Vec<ImportDecl>,
    pub types: Vec<TypeDecl>,
}

/// `import a.b.C;` or `import a.b.*;`
#[derive(Debug, Clone, PartialEq)]
pub struct ImportDecl {
    pub id: NodeId,
    pub span: Span,
    pub path: String,
    pub on_demand: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeDeclKind {
    Class,
    Interface,
    Enum,
    Delegate,
    Annotation,
}

impl fmt::Display for TypeDeclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDeclKind::Class => write!(f, "class"),
            TypeDeclKind::Interface => write!(f, "interface"),
            TypeDeclKind::Enum => write!(f, "enum"),
            TypeDeclKind::Delegate => write!(f, "delegate"),
            TypeDeclKind::Annotation => write!(f, "annotation"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub id: NodeId,
    pub span: Span,
    pub kind: TypeDeclKind,
    pub name: String,
    pub modifiers: Modifiers,
    pub annotations: Vec<AnnotationUse>,
    pub type_params: Vec<TypeParamDecl>,
    /// `extends`/`implements` list in source order.
    pub bases: Vec<TypeRef>,
    pub members: Vec<MemberDecl>,
    pub enum_constants: Vec<EnumConstantDecl>,
    /// Signature of a delegate declaration.
    pub delegate: Option<DelegateSignature>,
}

impl TypeDecl {
    pub fn nested_types(&self) -> impl Iterator<Item = &TypeDecl> {
        self.members.iter().filter_map(|m| match m {
            MemberDecl::Type(nested) => Some(nested),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeParamDecl {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    pub bound: Option<TypeRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DelegateSignature {
    pub return_type: TypeRef,
    pub params: Vec<ParamDecl>,
}

/// `@Name(args)` applied to a declaration or used as an annotation value.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationUse {
    pub id: NodeId,
    pub span: Span,
    pub ty: TypeRef,
    pub args: Vec<AnnotationArg>,
}

/// `name = value`, or a bare `value` for the single-element shorthand.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationArg {
    pub id: NodeId,
    pub span: Span,
    pub name: Option<String>,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumConstantDecl {
    pub id: NodeId,
    pub span: Span,
    pub annotations: Vec<AnnotationUse>,
    pub name: String,
    /// Arguments passed to a user-declared enum constructor.
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberDecl {
    Field(FieldDecl),
    Method(MethodDecl),
    Property(PropertyDecl),
    Indexer(IndexerDecl),
    Constructor(ConstructorDecl),
    Type(TypeDecl),
}

impl MemberDecl {
    pub fn id(&self) -> NodeId {
        match self {
            MemberDecl::Field(d) => d.id,
            MemberDecl::Method(d) => d.id,
            MemberDecl::Property(d) => d.id,
            MemberDecl::Indexer(d) => d.id,
            MemberDecl::Constructor(d) => d.id,
            MemberDecl::Type(d) => d.id,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            MemberDecl::Field(d) => d.span,
            MemberDecl::Method(d) => d.span,
            MemberDecl::Property(d) => d.span,
            MemberDecl::Indexer(d) => d.span,
            MemberDecl::Constructor(d) => d.span,
            MemberDecl::Type(d) => d.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub id: NodeId,
    pub span: Span,
    pub modifiers: Modifiers,
    pub annotations: Vec<AnnotationUse>,
    pub ty: TypeRef,
    pub name: String,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
    pub id: NodeId,
    pub span: Span,
    pub annotations: Vec<AnnotationUse>,
    pub ty: TypeRef,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub id: NodeId,
    pub span: Span,
    pub modifiers: Modifiers,
    pub annotations: Vec<AnnotationUse>,
    pub name: String,
    pub type_params: Vec<TypeParamDecl>,
    pub params: Vec<ParamDecl>,
    pub return_type: TypeRef,
    /// `None` for abstract, interface, native and defining-part partial methods.
    pub body: Option<Block>,
    /// Default value of an annotation type element.
    pub default_value: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccessorDecl {
    pub id: NodeId,
    pub span: Span,
    /// Accessor-level modifiers, typically a narrower visibility.
    pub modifiers: Modifiers,
    pub body: Option<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDecl {
    pub id: NodeId,
    pub span: Span,
    pub modifiers: Modifiers,
    pub annotations: Vec<AnnotationUse>,
    pub ty: TypeRef,
    pub name: String,
    pub getter: Option<AccessorDecl>,
    pub setter: Option<AccessorDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexerDecl {
    pub id: NodeId,
    pub span: Span,
    pub modifiers: Modifiers,
    pub annotations: Vec<AnnotationUse>,
    pub ty: TypeRef,
    pub params: Vec<ParamDecl>,
    pub getter: Option<AccessorDecl>,
    pub setter: Option<AccessorDecl>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructorInitializerKind {
    Super,
    This,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorInitializer {
    pub id: NodeId,
    pub span: Span,
    pub kind: ConstructorInitializerKind,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorDecl {
    pub id: NodeId,
    pub span: Span,
    pub modifiers: Modifiers,
    pub annotations: Vec<AnnotationUse>,
    pub params: Vec<ParamDecl>,
    pub initializer: Option<ConstructorInitializer>,
    pub body: Block,
}
