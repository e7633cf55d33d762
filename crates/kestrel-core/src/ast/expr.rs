//! Expression nodes and operators.

use std::fmt;

use ordered_float::OrderedFloat;

use super::{AnnotationUse, NodeId, TypeRef};
use crate::span::Span;

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: NodeId,
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    /// A simple name: local, parameter, field, property or type.
    Ident {
        name: String,
        type_args: Vec<TypeRef>,
    },
    /// `object.name`
    Member {
        object: Box<Expr>,
        name: String,
        type_args: Vec<TypeRef>,
    },
    /// `object[i]` or `object[i, j]`
    Index {
        object: Box<Expr>,
        indexes: Vec<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    New {
        ty: TypeRef,
        args: Vec<Expr>,
    },
    NewArray {
        element: TypeRef,
        size: Box<Expr>,
    },
    /// `{a, b, c}`, only valid as an annotation argument.
    ArrayInit(Vec<Expr>),
    /// A nested annotation used as an annotation argument.
    Annotation(Box<AnnotationUse>),
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Postfix {
        op: PostfixOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Cast {
        ty: TypeRef,
        expr: Box<Expr>,
    },
    This,
    Super,
}

impl ExprKind {
    /// Short description used by diagnostics and internal errors.
    pub fn describe(&self) -> &'static str {
        match self {
            ExprKind::Literal(_) => "literal",
            ExprKind::Ident { .. } => "name",
            ExprKind::Member { .. } => "member access",
            ExprKind::Index { .. } => "element access",
            ExprKind::Call { .. } => "invocation",
            ExprKind::New { .. } => "object creation",
            ExprKind::NewArray { .. } => "array creation",
            ExprKind::ArrayInit(_) => "array initializer",
            ExprKind::Annotation(_) => "annotation",
            ExprKind::Assign { .. } => "assignment",
            ExprKind::Unary { .. } => "unary expression",
            ExprKind::Postfix { .. } => "postfix expression",
            ExprKind::Binary { .. } => "binary expression",
            ExprKind::Cast { .. } => "cast",
            ExprKind::This => "this",
            ExprKind::Super => "super",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(OrderedFloat<f32>),
    Double(OrderedFloat<f64>),
    Char(u16),
    String(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "null"),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Long(l) => write!(f, "{}L", l),
            Literal::Float(v) => write!(f, "{}f", v),
            Literal::Double(v) => write!(f, "{}", v),
            Literal::Char(c) => match char::from_u32(u32::from(*c)) {
                Some(ch) => write!(f, "'{}'", ch),
                None => write!(f, "'\\u{:04x}'", c),
            },
            Literal::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

// ============================================================================
// Operators
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    LogicalOr,
    LogicalAnd,
    BitwiseOr,
    BitwiseXor,
    BitwiseAnd,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    ShiftLeft,
    ShiftRight,
    ShiftRightUnsigned,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::LogicalOr => "||",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::BitwiseOr => "|",
            BinaryOp::BitwiseXor => "^",
            BinaryOp::BitwiseAnd => "&",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::ShiftLeft => "<<",
            BinaryOp::ShiftRight => ">>",
            BinaryOp::ShiftRightUnsigned => ">>>",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::Less
                | BinaryOp::LessEqual
                | BinaryOp::Greater
                | BinaryOp::GreaterEqual
        )
    }

    pub fn is_shift(self) -> bool {
        matches!(
            self,
            BinaryOp::ShiftLeft | BinaryOp::ShiftRight | BinaryOp::ShiftRightUnsigned
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::LogicalOr | BinaryOp::LogicalAnd)
    }

    pub fn is_bitwise(self) -> bool {
        matches!(
            self,
            BinaryOp::BitwiseOr | BinaryOp::BitwiseXor | BinaryOp::BitwiseAnd
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Plus,
    LogicalNot,
    BitwiseNot,
    PreInc,
    PreDec,
}

impl UnaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Plus => "+",
            UnaryOp::LogicalNot => "!",
            UnaryOp::BitwiseNot => "~",
            UnaryOp::PreInc => "++",
            UnaryOp::PreDec => "--",
        }
    }

    pub fn is_increment(self) -> bool {
        matches!(self, UnaryOp::PreInc | UnaryOp::PreDec)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostfixOp {
    PostInc,
    PostDec,
}

impl PostfixOp {
    pub fn as_str(self) -> &'static str {
        match self {
            PostfixOp::PostInc => "++",
            PostfixOp::PostDec => "--",
        }
    }
}

/// Assignment operators. Every operator except `Assign` is compound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    ShlAssign,
    ShrAssign,
    UshrAssign,
}

impl AssignOp {
    /// The binary operator a compound assignment performs.
    pub fn binary_op(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::AddAssign => Some(BinaryOp::Add),
            AssignOp::SubAssign => Some(BinaryOp::Sub),
            AssignOp::MulAssign => Some(BinaryOp::Mul),
            AssignOp::DivAssign => Some(BinaryOp::Div),
            AssignOp::ModAssign => Some(BinaryOp::Mod),
            AssignOp::AndAssign => Some(BinaryOp::BitwiseAnd),
            AssignOp::OrAssign => Some(BinaryOp::BitwiseOr),
            AssignOp::XorAssign => Some(BinaryOp::BitwiseXor),
            AssignOp::ShlAssign => Some(BinaryOp::ShiftLeft),
            AssignOp::ShrAssign => Some(BinaryOp::ShiftRight),
            AssignOp::UshrAssign => Some(BinaryOp::ShiftRightUnsigned),
        }
    }

    pub fn is_compound(self) -> bool {
        self != AssignOp::Assign
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::AddAssign => "+=",
            AssignOp::SubAssign => "-=",
            AssignOp::MulAssign => "*=",
            AssignOp::DivAssign => "/=",
            AssignOp::ModAssign => "%=",
            AssignOp::AndAssign => "&=",
            AssignOp::OrAssign => "|=",
            AssignOp::XorAssign => "^=",
            AssignOp::ShlAssign => "<<=",
            AssignOp::ShrAssign => ">>=",
            AssignOp::UshrAssign => ">>>=",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compound_ops_map_to_binary_ops() {
        assert_eq!(AssignOp::Assign.binary_op(), None);
        assert_eq!(AssignOp::AddAssign.binary_op(), Some(BinaryOp::Add));
        assert_eq!(
            AssignOp::UshrAssign.binary_op(),
            Some(BinaryOp::ShiftRightUnsigned)
        );
        assert!(AssignOp::XorAssign.is_compound());
    }

    #[test]
    fn literal_display() {
        assert_eq!(Literal::Long(5).to_string(), "5L");
        assert_eq!(Literal::Char(u16::from(b'a')).to_string(), "'a'");
        assert_eq!(Literal::String("hi".into()).to_string(), "\"hi\"");
    }
}
