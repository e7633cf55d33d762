//! Programmatic construction of declaration trees.
//!
//! Parsers and tests use [`AstBuilder`] to allocate unique [`NodeId`]s. The
//! builder also tracks a current source position that is stamped on every node
//! it creates, so callers can place nodes with [`AstBuilder::at`].

use std::cell::Cell;

use ordered_float::OrderedFloat;

use super::*;
use crate::modifiers::Modifiers;
use crate::primitive::PrimitiveKind;
use crate::span::Span;

/// Allocates node ids and builds tree nodes.
#[derive(Debug)]
pub struct AstBuilder {
    next_id: Cell<u32>,
    span: Cell<Span>,
}

impl Default for AstBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AstBuilder {
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(1),
            span: Cell::new(Span::new(1, 1, 1)),
        }
    }

    /// Continue numbering after ids already handed out by another builder.
    pub fn starting_at(first_id: u32) -> Self {
        let builder = Self::new();
        builder.next_id.set(first_id);
        builder
    }

    pub fn id(&self) -> NodeId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        NodeId(id)
    }

    /// Stamp subsequently built nodes with this position.
    pub fn at(&self, line: u32, col: u32) -> &Self {
        self.span.set(Span::new(line, col, 1));
        self
    }

    pub fn span(&self) -> Span {
        self.span.get()
    }

    // ========================================================================
    // Types
    // ========================================================================

    pub fn type_ref(&self, kind: TypeRefKind) -> TypeRef {
        TypeRef {
            id: self.id(),
            span: self.span(),
            kind,
        }
    }

    pub fn prim(&self, kind: PrimitiveKind) -> TypeRef {
        self.type_ref(TypeRefKind::Primitive(kind))
    }

    pub fn int_type(&self) -> TypeRef {
        self.prim(PrimitiveKind::Int)
    }

    pub fn void_type(&self) -> TypeRef {
        self.prim(PrimitiveKind::Void)
    }

    pub fn named(&self, name: &str) -> TypeRef {
        self.generic(name, Vec::new())
    }

    pub fn generic(&self, name: &str, type_args: Vec<TypeRef>) -> TypeRef {
        self.type_ref(TypeRefKind::Named {
            name: name.to_string(),
            type_args,
        })
    }

    pub fn array_of(&self, element: TypeRef) -> TypeRef {
        self.type_ref(TypeRefKind::Array(Box::new(element)))
    }

    pub fn wildcard(&self, bound: Option<(WildcardBound, TypeRef)>) -> TypeRef {
        self.type_ref(TypeRefKind::Wildcard(
            bound.map(|(kind, ty)| (kind, Box::new(ty))),
        ))
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    pub fn expr(&self, kind: ExprKind) -> Expr {
        Expr {
            id: self.id(),
            span: self.span(),
            kind,
        }
    }

    pub fn int(&self, value: i32) -> Expr {
        self.expr(ExprKind::Literal(Literal::Int(value)))
    }

    pub fn long(&self, value: i64) -> Expr {
        self.expr(ExprKind::Literal(Literal::Long(value)))
    }

    pub fn double(&self, value: f64) -> Expr {
        self.expr(ExprKind::Literal(Literal::Double(OrderedFloat(value))))
    }

    pub fn boolean(&self, value: bool) -> Expr {
        self.expr(ExprKind::Literal(Literal::Bool(value)))
    }

    pub fn string(&self, value: &str) -> Expr {
        self.expr(ExprKind::Literal(Literal::String(value.to_string())))
    }

    pub fn character(&self, value: char) -> Expr {
        let mut buf = [0u16; 2];
        let unit = value.encode_utf16(&mut buf)[0];
        self.expr(ExprKind::Literal(Literal::Char(unit)))
    }

    pub fn null(&self) -> Expr {
        self.expr(ExprKind::Literal(Literal::Null))
    }

    pub fn ident(&self, name: &str) -> Expr {
        self.expr(ExprKind::Ident {
            name: name.to_string(),
            type_args: Vec::new(),
        })
    }

    pub fn member(&self, object: Expr, name: &str) -> Expr {
        self.expr(ExprKind::Member {
            object: Box::new(object),
            name: name.to_string(),
            type_args: Vec::new(),
        })
    }

    pub fn index(&self, object: Expr, indexes: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Index {
            object: Box::new(object),
            indexes,
        })
    }

    pub fn call(&self, callee: Expr, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Call {
            callee: Box::new(callee),
            args,
        })
    }

    pub fn new_object(&self, ty: TypeRef, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::New { ty, args })
    }

    pub fn new_array(&self, element: TypeRef, size: Expr) -> Expr {
        self.expr(ExprKind::NewArray {
            element,
            size: Box::new(size),
        })
    }

    pub fn array_init(&self, elements: Vec<Expr>) -> Expr {
        self.expr(ExprKind::ArrayInit(elements))
    }

    pub fn assign(&self, target: Expr, value: Expr) -> Expr {
        self.compound(AssignOp::Assign, target, value)
    }

    pub fn compound(&self, op: AssignOp, target: Expr, value: Expr) -> Expr {
        self.expr(ExprKind::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    pub fn unary(&self, op: UnaryOp, operand: Expr) -> Expr {
        self.expr(ExprKind::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    pub fn postfix(&self, op: PostfixOp, operand: Expr) -> Expr {
        self.expr(ExprKind::Postfix {
            op,
            operand: Box::new(operand),
        })
    }

    pub fn binary(&self, op: BinaryOp, left: Expr, right: Expr) -> Expr {
        self.expr(ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn cast(&self, ty: TypeRef, expr: Expr) -> Expr {
        self.expr(ExprKind::Cast {
            ty,
            expr: Box::new(expr),
        })
    }

    pub fn this(&self) -> Expr {
        self.expr(ExprKind::This)
    }

    // ========================================================================
    // Statements
    // ========================================================================

    pub fn stmt(&self, kind: StmtKind) -> Stmt {
        Stmt {
            id: self.id(),
            span: self.span(),
            kind,
        }
    }

    pub fn local(&self, ty: TypeRef, name: &str, init: Option<Expr>) -> Stmt {
        self.stmt(StmtKind::VarDecl(VarDecl {
            ty,
            name: name.to_string(),
            init,
        }))
    }

    pub fn expr_stmt(&self, expr: Expr) -> Stmt {
        self.stmt(StmtKind::Expr(expr))
    }

    pub fn ret(&self, value: Option<Expr>) -> Stmt {
        self.stmt(StmtKind::Return(value))
    }

    pub fn block(&self, stmts: Vec<Stmt>) -> Block {
        Block {
            id: self.id(),
            span: self.span(),
            stmts,
        }
    }

    pub fn block_stmt(&self, stmts: Vec<Stmt>) -> Stmt {
        let block = self.block(stmts);
        self.stmt(StmtKind::Block(block))
    }

    pub fn if_stmt(&self, condition: Expr, then_branch: Stmt, else_branch: Option<Stmt>) -> Stmt {
        self.stmt(StmtKind::If {
            condition,
            then_branch: Box::new(then_branch),
            else_branch: else_branch.map(Box::new),
        })
    }

    pub fn while_stmt(&self, condition: Expr, body: Stmt) -> Stmt {
        self.stmt(StmtKind::While {
            condition,
            body: Box::new(body),
        })
    }

    pub fn switch_stmt(&self, selector: Expr, sections: Vec<SwitchSection>) -> Stmt {
        self.stmt(StmtKind::Switch { selector, sections })
    }

    pub fn section(&self, labels: Vec<SwitchLabel>, stmts: Vec<Stmt>) -> SwitchSection {
        SwitchSection {
            id: self.id(),
            span: self.span(),
            labels,
            stmts,
        }
    }

    pub fn break_stmt(&self) -> Stmt {
        self.stmt(StmtKind::Break)
    }

    pub fn continue_stmt(&self) -> Stmt {
        self.stmt(StmtKind::Continue)
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    pub fn unit(&self, file: &str, package: Option<&str>, types: Vec<TypeDecl>) -> CompilationUnit {
        CompilationUnit {
            file: file.to_string(),
            package: package.map(str::to_string),
            imports: Vec::new(),
            types,
        }
    }

    pub fn import(&self, path: &str, on_demand: bool) -> ImportDecl {
        ImportDecl {
            id: self.id(),
            span: self.span(),
            path: path.to_string(),
            on_demand,
        }
    }

    pub fn type_decl(&self, kind: TypeDeclKind, name: &str) -> TypeDecl {
        TypeDecl {
            id: self.id(),
            span: self.span(),
            kind,
            name: name.to_string(),
            modifiers: Modifiers::PUBLIC,
            annotations: Vec::new(),
            type_params: Vec::new(),
            bases: Vec::new(),
            members: Vec::new(),
            enum_constants: Vec::new(),
            delegate: None,
        }
    }

    pub fn class(&self, name: &str) -> TypeDecl {
        self.type_decl(TypeDeclKind::Class, name)
    }

    pub fn interface(&self, name: &str) -> TypeDecl {
        self.type_decl(TypeDeclKind::Interface, name)
    }

    pub fn annotation_type(&self, name: &str) -> TypeDecl {
        self.type_decl(TypeDeclKind::Annotation, name)
    }

    pub fn enum_type(&self, name: &str, constants: &[&str]) -> TypeDecl {
        let mut decl = self.type_decl(TypeDeclKind::Enum, name);
        decl.enum_constants = constants
            .iter()
            .map(|constant| EnumConstantDecl {
                id: self.id(),
                span: self.span(),
                annotations: Vec::new(),
                name: constant.to_string(),
                args: Vec::new(),
            })
            .collect();
        decl
    }

    pub fn delegate(&self, name: &str, return_type: TypeRef, params: Vec<ParamDecl>) -> TypeDecl {
        let mut decl = self.type_decl(TypeDeclKind::Delegate, name);
        decl.delegate = Some(DelegateSignature {
            return_type,
            params,
        });
        decl
    }

    pub fn type_param(&self, name: &str, bound: Option<TypeRef>) -> TypeParamDecl {
        TypeParamDecl {
            id: self.id(),
            span: self.span(),
            name: name.to_string(),
            bound,
        }
    }

    pub fn field(&self, ty: TypeRef, name: &str, init: Option<Expr>) -> FieldDecl {
        FieldDecl {
            id: self.id(),
            span: self.span(),
            modifiers: Modifiers::PUBLIC,
            annotations: Vec::new(),
            ty,
            name: name.to_string(),
            init,
        }
    }

    pub fn param(&self, ty: TypeRef, name: &str) -> ParamDecl {
        ParamDecl {
            id: self.id(),
            span: self.span(),
            annotations: Vec::new(),
            ty,
            name: name.to_string(),
        }
    }

    pub fn method(
        &self,
        name: &str,
        return_type: TypeRef,
        params: Vec<ParamDecl>,
        body: Option<Block>,
    ) -> MethodDecl {
        MethodDecl {
            id: self.id(),
            span: self.span(),
            modifiers: Modifiers::PUBLIC,
            annotations: Vec::new(),
            name: name.to_string(),
            type_params: Vec::new(),
            params,
            return_type,
            body,
            default_value: None,
        }
    }

    pub fn accessor(&self, body: Option<Block>) -> AccessorDecl {
        AccessorDecl {
            id: self.id(),
            span: self.span(),
            modifiers: Modifiers::empty(),
            body,
        }
    }

    pub fn property(
        &self,
        ty: TypeRef,
        name: &str,
        getter: Option<AccessorDecl>,
        setter: Option<AccessorDecl>,
    ) -> PropertyDecl {
        PropertyDecl {
            id: self.id(),
            span: self.span(),
            modifiers: Modifiers::PUBLIC,
            annotations: Vec::new(),
            ty,
            name: name.to_string(),
            getter,
            setter,
        }
    }

    pub fn indexer(
        &self,
        ty: TypeRef,
        params: Vec<ParamDecl>,
        getter: Option<AccessorDecl>,
        setter: Option<AccessorDecl>,
    ) -> IndexerDecl {
        IndexerDecl {
            id: self.id(),
            span: self.span(),
            modifiers: Modifiers::PUBLIC,
            annotations: Vec::new(),
            ty,
            params,
            getter,
            setter,
        }
    }

    pub fn constructor(
        &self,
        params: Vec<ParamDecl>,
        initializer: Option<ConstructorInitializer>,
        body: Block,
    ) -> ConstructorDecl {
        ConstructorDecl {
            id: self.id(),
            span: self.span(),
            modifiers: Modifiers::PUBLIC,
            annotations: Vec::new(),
            params,
            initializer,
            body,
        }
    }

    pub fn ctor_init(
        &self,
        kind: ConstructorInitializerKind,
        args: Vec<Expr>,
    ) -> ConstructorInitializer {
        ConstructorInitializer {
            id: self.id(),
            span: self.span(),
            kind,
            args,
        }
    }

    pub fn annotation(&self, ty: TypeRef, args: Vec<AnnotationArg>) -> AnnotationUse {
        AnnotationUse {
            id: self.id(),
            span: self.span(),
            ty,
            args,
        }
    }

    pub fn annotation_arg(&self, name: Option<&str>, value: Expr) -> AnnotationArg {
        AnnotationArg {
            id: self.id(),
            span: self.span(),
            name: name.map(str::to_string),
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_increasing() {
        let b = AstBuilder::new();
        let first = b.int(1);
        let second = b.int(2);
        assert!(second.id > first.id);
    }

    #[test]
    fn position_is_stamped_on_new_nodes() {
        let b = AstBuilder::new();
        let expr = b.at(7, 3).ident("x");
        assert_eq!(expr.span, Span::new(7, 3, 1));
    }

    #[test]
    fn enum_type_builds_constants() {
        let b = AstBuilder::new();
        let decl = b.enum_type("Color", &["RED", "GREEN"]);
        assert_eq!(decl.kind, TypeDeclKind::Enum);
        let names: Vec<_> = decl.enum_constants.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["RED", "GREEN"]);
    }

    #[test]
    fn starting_at_continues_numbering() {
        let b = AstBuilder::starting_at(100);
        assert_eq!(b.id(), NodeId(100));
    }
}
