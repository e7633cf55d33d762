//! Compile-time evaluation of declaration-level expressions.
//!
//! Field initializers of `static final` fields and annotation arguments are
//! evaluated before any body is validated, so this works directly on the
//! tree: literals, operators, casts and references to other constant fields.

use kestrel_core::CompilationError;
use kestrel_core::ast::{CompilationUnit, Expr, ExprKind};
use kestrel_types::{ConstantValue, TypeDefId, TypeId, TypeSystem};

use crate::operators::{binary_types, cast_constant, fold_binary, fold_unary, literal_constant, literal_type, unary_types};
use crate::type_resolver::TypeResolver;

pub(crate) struct DeclarationConstants<'a> {
    ts: &'a TypeSystem,
    unit: &'a CompilationUnit,
    scope: TypeDefId,
}

impl<'a> DeclarationConstants<'a> {
    pub fn new(ts: &'a TypeSystem, unit: &'a CompilationUnit, scope: TypeDefId) -> Self {
        Self { ts, unit, scope }
    }

    /// The constant value and type of `expr`, or `None` if it is not constant
    /// (yet: a referenced field may still be pending).
    pub fn evaluate(&self, expr: &Expr) -> Option<(ConstantValue, TypeId)> {
        let ts = self.ts;
        match &expr.kind {
            ExprKind::Literal(literal) => Some((literal_constant(literal), literal_type(ts, literal))),
            ExprKind::Ident { name, type_args } if type_args.is_empty() => self.named_constant(name),
            ExprKind::Member { object, name, .. } => {
                let qualifier = dotted_name(object)?;
                let def = TypeResolver::new(ts, self.unit, self.scope).resolve_name(&qualifier)?;
                self.field_constant(def, name)
            }
            ExprKind::Unary { op, operand } => {
                let (value, ty) = self.evaluate(operand)?;
                let types = unary_types(ts, *op, ty)?;
                fold_unary(*op, &value, types).map(|v| (v, types.result))
            }
            ExprKind::Binary { op, left, right } => {
                let (l, lt) = self.evaluate(left)?;
                let (r, rt) = self.evaluate(right)?;
                let types = binary_types(ts, *op, lt, rt)?;
                fold_binary(ts, *op, &l, &r, types).map(|v| (v, types.result))
            }
            ExprKind::Cast { ty, expr } => {
                let target = TypeResolver::new(ts, self.unit, self.scope).resolve(ty).ok()?;
                let (value, source) = self.evaluate(expr)?;
                if ts.is_string(target) && ts.is_string(source) {
                    return Some((value, target));
                }
                let kind = target.as_primitive()?;
                source.as_primitive()?;
                cast_constant(&value, kind).map(|v| (v, target))
            }
            _ => None,
        }
    }

    /// A simple name: a constant field of the scope, its supertypes or an enclosing type.
    fn named_constant(&self, name: &str) -> Option<(ConstantValue, TypeId)> {
        let mut current = Some(self.scope);
        while let Some(def) = current {
            if let Some(found) = self.find_field(def, name) {
                return found;
            }
            current = self.ts.def(def).enclosing;
        }
        None
    }

    fn field_constant(&self, def: TypeDefId, name: &str) -> Option<(ConstantValue, TypeId)> {
        self.find_field(def, name).flatten()
    }

    /// `Some(None)` when the field exists but has no constant value.
    fn find_field(&self, def: TypeDefId, name: &str) -> Option<Option<(ConstantValue, TypeId)>> {
        let ts = self.ts;
        for level in ts.supertype_closure(ts.this_type(def)) {
            let Some(level_def) = ts.def_of(level) else {
                continue;
            };
            if let Some(&field) = ts.def(level_def).fields.iter().find(|&&f| ts.field(f).name == name) {
                let entry = ts.field(field);
                return Some(entry.constant.clone().map(|c| (c, entry.ty)));
            }
        }
        None
    }
}

/// `a.b.C` for a chain of simple names.
pub(crate) fn dotted_name(expr: &Expr) -> Option<String> {
    match &expr.kind {
        ExprKind::Ident { name, type_args } if type_args.is_empty() => Some(name.clone()),
        ExprKind::Member { object, name, type_args } if type_args.is_empty() => {
            Some(format!("{}.{}", dotted_name(object)?, name))
        }
        _ => None,
    }
}

/// Convert a constant of type `source` for storage in `target`.
///
/// Widening always succeeds; `int`-like constants narrow to `byte`, `short`
/// and `char` when in range.
pub(crate) fn convert_constant(
    ts: &TypeSystem,
    value: &ConstantValue,
    source: TypeId,
    target: TypeId,
) -> Result<ConstantValue, CompilationError> {
    let mismatch = || CompilationError::TypeMismatch {
        from: ts.display(source),
        to: ts.display(target),
    };
    if ts.is_string(target) {
        return if ts.is_string(source) || source.is_null() {
            Ok(value.clone())
        } else {
            Err(mismatch())
        };
    }
    let (Some(to), Some(from)) = (target.as_primitive(), source.as_primitive()) else {
        return Err(mismatch());
    };
    if to.widens_from(from) {
        return value.narrow_to(to).ok_or_else(mismatch);
    }
    let narrowable = to.is_integral() && to != kestrel_core::PrimitiveKind::Long && from.is_integral();
    if !narrowable || from == kestrel_core::PrimitiveKind::Long {
        return Err(mismatch());
    }
    value.narrow_to(to).ok_or_else(|| CompilationError::ConstantOutOfRange {
        value: value.to_string(),
        target: ts.display(target),
    })
}
