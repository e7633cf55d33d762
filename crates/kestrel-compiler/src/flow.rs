//! Reachability and definite assignment over a validated body.
//!
//! Runs after [`crate::validate`] has recorded expression infos and locals.
//! The walk tracks, per program point, whether it is reachable and which
//! locals are definitely assigned:
//!
//! - reading a local that is not definitely assigned is an error, reported
//!   once per local
//! - the first dead statement of a block gets an unreachable-code warning
//! - a non-void body whose end is reachable is missing a `return`
//! - locals never read, or neither read nor written, get a warning and are
//!   left without a slot
//!
//! A dead state counts every local as assigned, so merging with it keeps
//! the other side unchanged.

use kestrel_core::ast::{AssignOp, BinaryOp, Block, Expr, ExprKind, Stmt, StmtKind, SwitchLabel, UnaryOp};
use kestrel_core::{CompilationError, CompilationWarning, Diagnostics, Span};
use kestrel_types::{ConstantValue, LocalId, Member, TypeId};
use rustc_hash::FxHashSet;

use crate::node_tables::NodeTables;
use crate::scope::LocalTable;
use crate::validate::BodyRef;

#[derive(Debug, Clone, PartialEq)]
struct State {
    reachable: bool,
    assigned: Vec<bool>,
}

impl State {
    fn dead(locals: usize) -> Self {
        Self {
            reachable: false,
            assigned: vec![true; locals],
        }
    }

    fn merge(self, other: State) -> State {
        State {
            reachable: self.reachable || other.reachable,
            assigned: self
                .assigned
                .iter()
                .zip(&other.assigned)
                .map(|(&a, &b)| a && b)
                .collect(),
        }
    }
}

/// A `while` or `switch` that `break` (and, for loops, `continue`) can target.
struct Frame {
    is_loop: bool,
    breaks: Option<State>,
}

pub struct FlowAnalysis<'a> {
    tables: &'a NodeTables,
    diagnostics: &'a mut Diagnostics,
    file: &'a str,
    locals: &'a mut LocalTable,
    frames: Vec<Frame>,
    reported: FxHashSet<LocalId>,
}

impl<'a> FlowAnalysis<'a> {
    pub fn new(
        tables: &'a NodeTables,
        diagnostics: &'a mut Diagnostics,
        file: &'a str,
        locals: &'a mut LocalTable,
    ) -> Self {
        Self {
            tables,
            diagnostics,
            file,
            locals,
            frames: Vec::new(),
            reported: FxHashSet::default(),
        }
    }

    /// Analyze `body` of the method `name` returning `return_type`.
    ///
    /// `name` is `None` for bodies that cannot return (initializers).
    pub fn run(mut self, body: BodyRef<'_>, name: Option<&str>, return_type: TypeId, span: Span) {
        let initial = State {
            reachable: true,
            assigned: self.locals.iter().map(|local| local.is_parameter).collect(),
        };
        let end = match body {
            BodyRef::Block(block) => self.block(block, initial),
            BodyRef::Initializer { expr, .. } => self.expr(expr, initial),
            BodyRef::Call(call) => self.exprs(call.args, initial),
            BodyRef::Constructor { call, block } => {
                let state = self.exprs(call.args, initial);
                self.block(block, state)
            }
        };
        if let Some(name) = name {
            if end.reachable && !return_type.is_void() {
                self.error(
                    span,
                    CompilationError::MissingReturn {
                        method: name.to_string(),
                    },
                );
            }
        }
        self.report_unused();
    }

    fn error(&mut self, span: Span, error: CompilationError) {
        self.diagnostics.error(self.file, span, error);
    }

    fn warning(&mut self, span: Span, warning: CompilationWarning) {
        self.diagnostics.warning(self.file, span, warning);
    }

    fn dead(&self) -> State {
        State::dead(self.locals.len())
    }

    fn report_unused(&mut self) {
        let mut warnings = Vec::new();
        for local in self.locals.iter().filter(|l| !l.is_parameter) {
            let name = local.name.clone();
            match (local.reads, local.writes) {
                (0, 0) => warnings.push((local.id, local.span, CompilationWarning::LocalNeverUsed { name })),
                (0, _) => warnings.push((local.id, local.span, CompilationWarning::LocalNeverRead { name })),
                _ => {}
            }
        }
        for (id, span, warning) in warnings {
            if matches!(warning, CompilationWarning::LocalNeverUsed { .. }) {
                self.locals.get_mut(id).unused = true;
            }
            self.warning(span, warning);
        }
    }

    // ==========================================================================
    // Statements
    // ==========================================================================

    fn block(&mut self, block: &Block, state: State) -> State {
        self.stmts(&block.stmts, state)
    }

    fn stmts(&mut self, stmts: &[Stmt], mut state: State) -> State {
        let mut warned = false;
        for stmt in stmts {
            if !state.reachable && !warned && !matches!(stmt.kind, StmtKind::Empty) {
                self.warning(stmt.span, CompilationWarning::UnreachableCode);
                warned = true;
            }
            state = self.stmt(stmt, state);
        }
        state
    }

    fn stmt(&mut self, stmt: &Stmt, state: State) -> State {
        match &stmt.kind {
            StmtKind::Block(block) => self.block(block, state),
            StmtKind::VarDecl(decl) => {
                let Some(init) = &decl.init else {
                    return state;
                };
                let mut state = self.expr(init, state);
                if let Some(id) = self.tables.local(stmt.id) {
                    self.write(id, &mut state);
                }
                state
            }
            StmtKind::Expr(expr) => self.expr(expr, state),
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let (when_true, when_false) = self.condition(condition, state);
                let then_state = self.stmt(then_branch, when_true);
                let else_state = match else_branch {
                    Some(else_branch) => self.stmt(else_branch, when_false),
                    None => when_false,
                };
                then_state.merge(else_state)
            }
            StmtKind::While { condition, body } => {
                let (when_true, when_false) = self.condition(condition, state);
                let infinite = self.is_constant_true(condition);
                self.frames.push(Frame {
                    is_loop: true,
                    breaks: None,
                });
                self.stmt(body, when_true);
                let frame = self.frames.pop();
                let breaks = frame.and_then(|f| f.breaks).unwrap_or_else(|| self.dead());
                if infinite {
                    breaks
                } else {
                    when_false.merge(breaks)
                }
            }
            StmtKind::Switch { selector, sections } => {
                let state = self.expr(selector, state);
                self.frames.push(Frame {
                    is_loop: false,
                    breaks: None,
                });
                let mut out = self.dead();
                let mut has_default = false;
                for section in sections {
                    has_default |= section.labels.iter().any(|l| matches!(l, SwitchLabel::Default));
                    let end = self.stmts(&section.stmts, state.clone());
                    // A section whose end is reachable leaves the switch.
                    if end.reachable {
                        out = out.merge(end);
                    }
                }
                if let Some(breaks) = self.frames.pop().and_then(|f| f.breaks) {
                    out = out.merge(breaks);
                }
                if !has_default {
                    out = out.merge(state);
                }
                out
            }
            StmtKind::Break => {
                match self.frames.last_mut() {
                    Some(frame) => {
                        frame.breaks = Some(match frame.breaks.take() {
                            Some(breaks) => breaks.merge(state),
                            None => state,
                        });
                    }
                    None => self.error(stmt.span, CompilationError::JumpOutsideLoop { keyword: "break" }),
                }
                self.dead()
            }
            StmtKind::Continue => {
                if !self.frames.iter().any(|f| f.is_loop) {
                    self.error(stmt.span, CompilationError::JumpOutsideLoop { keyword: "continue" });
                }
                self.dead()
            }
            StmtKind::Return(value) => {
                if let Some(value) = value {
                    self.expr(value, state);
                }
                self.dead()
            }
            StmtKind::Empty => state,
        }
    }

    fn is_constant_true(&self, condition: &Expr) -> bool {
        self.tables
            .expression(condition.id)
            .is_some_and(|info| info.constant == Some(ConstantValue::Bool(true)))
    }

    // ==========================================================================
    // Expressions
    // ==========================================================================

    fn exprs(&mut self, exprs: &[Expr], state: State) -> State {
        exprs.iter().fold(state, |state, expr| self.expr(expr, state))
    }

    fn local_of(&self, expr: &Expr) -> Option<LocalId> {
        match self.tables.expression(expr.id)?.member.as_ref()? {
            Member::Local { id, .. } => Some(*id),
            _ => None,
        }
    }

    fn expr(&mut self, expr: &Expr, state: State) -> State {
        match &expr.kind {
            ExprKind::Ident { .. } => {
                if let Some(id) = self.local_of(expr) {
                    self.read(id, expr.span, &state);
                }
                state
            }
            ExprKind::Member { object, .. } => self.expr(object, state),
            ExprKind::Index { object, indexes } => {
                let state = self.expr(object, state);
                self.exprs(indexes, state)
            }
            ExprKind::Call { callee, args } => {
                let state = self.expr(callee, state);
                self.exprs(args, state)
            }
            ExprKind::New { args, .. } => self.exprs(args, state),
            ExprKind::NewArray { size, .. } => self.expr(size, state),
            ExprKind::ArrayInit(elements) => self.exprs(elements, state),
            ExprKind::Assign { op, target, value } => self.assign(*op, target, value, state),
            ExprKind::Unary { op, operand } if op.is_increment() => self.increment(operand, state),
            ExprKind::Postfix { operand, .. } => self.increment(operand, state),
            ExprKind::Unary { operand, .. } => self.expr(operand, state),
            ExprKind::Cast { expr, .. } => self.expr(expr, state),
            ExprKind::Binary {
                op: BinaryOp::LogicalAnd | BinaryOp::LogicalOr,
                ..
            } => {
                let (when_true, when_false) = self.condition(expr, state);
                when_true.merge(when_false)
            }
            ExprKind::Binary { left, right, .. } => {
                let state = self.expr(left, state);
                self.expr(right, state)
            }
            ExprKind::Literal(_) | ExprKind::Annotation(_) | ExprKind::This | ExprKind::Super => state,
        }
    }

    /// The states after `condition` evaluates to `true` and to `false`.
    ///
    /// The right operand of `&&` runs only on the left's true edge, so its
    /// assignments count on the true edge of the whole and nowhere on the
    /// left's false edge. `||` mirrors this.
    fn condition(&mut self, condition: &Expr, state: State) -> (State, State) {
        match &condition.kind {
            ExprKind::Binary {
                op: BinaryOp::LogicalAnd,
                left,
                right,
            } => {
                let (left_true, left_false) = self.condition(left, state);
                let (right_true, right_false) = self.condition(right, left_true);
                (right_true, left_false.merge(right_false))
            }
            ExprKind::Binary {
                op: BinaryOp::LogicalOr,
                left,
                right,
            } => {
                let (left_true, left_false) = self.condition(left, state);
                let (right_true, right_false) = self.condition(right, left_false);
                (left_true.merge(right_true), right_false)
            }
            ExprKind::Unary {
                op: UnaryOp::LogicalNot,
                operand,
            } => {
                let (when_true, when_false) = self.condition(operand, state);
                (when_false, when_true)
            }
            _ => {
                let state = self.expr(condition, state);
                (state.clone(), state)
            }
        }
    }

    fn assign(&mut self, op: AssignOp, target: &Expr, value: &Expr, state: State) -> State {
        match self.local_of(target) {
            Some(id) => {
                if op.is_compound() {
                    self.read(id, target.span, &state);
                }
                let mut state = self.expr(value, state);
                self.write(id, &mut state);
                state
            }
            None => {
                let state = self.target_operands(target, state);
                self.expr(value, state)
            }
        }
    }

    fn increment(&mut self, operand: &Expr, state: State) -> State {
        match self.local_of(operand) {
            Some(id) => {
                self.read(id, operand.span, &state);
                let mut state = state;
                self.write(id, &mut state);
                state
            }
            None => self.target_operands(operand, state),
        }
    }

    /// The subexpressions evaluated before a non-local target is stored to.
    fn target_operands(&mut self, target: &Expr, state: State) -> State {
        match &target.kind {
            ExprKind::Member { object, .. } => self.expr(object, state),
            ExprKind::Index { object, indexes } => {
                let state = self.expr(object, state);
                self.exprs(indexes, state)
            }
            _ => state,
        }
    }

    fn read(&mut self, id: LocalId, span: Span, state: &State) {
        let local = self.locals.get_mut(id);
        local.reads += 1;
        let assigned = state.assigned.get(id.index()).copied().unwrap_or(true);
        if !assigned && self.reported.insert(id) {
            let name = local.name.clone();
            self.error(span, CompilationError::UnassignedLocal { name });
        }
    }

    fn write(&mut self, id: LocalId, state: &mut State) {
        self.locals.get_mut(id).writes += 1;
        if let Some(slot) = state.assigned.get_mut(id.index()) {
            *slot = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::passes::CodeValidationPass;
    use crate::validate::test_support::{define, method_class};
    use kestrel_core::PrimitiveKind;
    use kestrel_core::ast::{AstBuilder, BinaryOp, SwitchLabel, UnaryOp};

    fn ids(session: &crate::session::CompilationSession) -> (Vec<u32>, Vec<u32>) {
        let errors = session.diagnostics.errors().map(|d| d.id).collect();
        let warnings = session.diagnostics.warnings().map(|d| d.id).collect();
        (errors, warnings)
    }

    #[test]
    fn reading_an_unassigned_local_is_an_error() {
        let b = AstBuilder::new();
        let class = method_class(
            &b,
            b.int_type(),
            vec![b.local(b.int_type(), "i", None), b.ret(Some(b.ident("i")))],
        );
        let mut session = define(vec![b.unit("T.ks", Some("app"), vec![class])]);
        CodeValidationPass::new(&mut session).run();
        assert_eq!(ids(&session), (vec![20], vec![]));
    }

    #[test]
    fn unused_locals_are_warned_and_left_without_a_slot() {
        let b = AstBuilder::new();
        let decl = b.local(b.int_type(), "i", None);
        let decl_id = decl.id;
        let class = method_class(&b, b.void_type(), vec![decl]);
        let body_id = match &class.members[0] {
            kestrel_core::ast::MemberDecl::Method(m) => m.body.as_ref().unwrap().id,
            _ => unreachable!(),
        };
        let mut session = define(vec![b.unit("T.ks", Some("app"), vec![class])]);
        CodeValidationPass::new(&mut session).run();
        assert_eq!(ids(&session), (vec![], vec![100]));

        let local = session.tables.local(decl_id).unwrap();
        let body = session.tables.body(body_id).unwrap();
        assert!(body.get(local).unused);
        assert_eq!(body.assign_slots().0[local.index()], None);
    }

    #[test]
    fn assigned_but_never_read() {
        let b = AstBuilder::new();
        let class = method_class(&b, b.void_type(), vec![b.local(b.int_type(), "i", Some(b.int(1)))]);
        let mut session = define(vec![b.unit("T.ks", Some("app"), vec![class])]);
        CodeValidationPass::new(&mut session).run();
        assert_eq!(ids(&session), (vec![], vec![101]));
    }

    #[test]
    fn both_branches_must_assign() {
        let b = AstBuilder::new();
        let only_then = b.if_stmt(
            b.boolean(true),
            b.expr_stmt(b.assign(b.ident("x"), b.int(1))),
            None,
        );
        let class = method_class(
            &b,
            b.int_type(),
            vec![b.local(b.int_type(), "x", None), only_then, b.ret(Some(b.ident("x")))],
        );
        let mut session = define(vec![b.unit("T.ks", Some("app"), vec![class])]);
        CodeValidationPass::new(&mut session).run();
        assert_eq!(ids(&session).0, vec![20]);

        let b = AstBuilder::new();
        let both = b.if_stmt(
            b.boolean(true),
            b.expr_stmt(b.assign(b.ident("x"), b.int(1))),
            Some(b.expr_stmt(b.assign(b.ident("x"), b.int(2)))),
        );
        let class = method_class(
            &b,
            b.int_type(),
            vec![b.local(b.int_type(), "x", None), both, b.ret(Some(b.ident("x")))],
        );
        let mut session = define(vec![b.unit("T.ks", Some("app"), vec![class])]);
        CodeValidationPass::new(&mut session).run();
        assert!(!session.has_errors());
    }

    #[test]
    fn conditional_operands_do_not_assign() {
        let b = AstBuilder::new();
        let condition = b.binary(
            BinaryOp::LogicalAnd,
            b.boolean(false),
            b.binary(BinaryOp::Equal, b.assign(b.ident("x"), b.int(1)), b.int(1)),
        );
        let class = method_class(
            &b,
            b.int_type(),
            vec![
                b.local(b.int_type(), "x", None),
                b.expr_stmt(condition),
                b.ret(Some(b.ident("x"))),
            ],
        );
        let mut session = define(vec![b.unit("T.ks", Some("app"), vec![class])]);
        CodeValidationPass::new(&mut session).run();
        assert_eq!(ids(&session).0, vec![20]);
    }

    /// `boolean flag = true; int x; if (<condition>) return x; return 0;`
    fn read_on_true_edge(b: &AstBuilder, condition: kestrel_core::ast::Expr) -> Vec<u32> {
        let class = method_class(
            b,
            b.int_type(),
            vec![
                b.local(b.prim(PrimitiveKind::Boolean), "flag", Some(b.boolean(true))),
                b.local(b.int_type(), "x", None),
                b.if_stmt(condition, b.ret(Some(b.ident("x"))), None),
                b.ret(Some(b.int(0))),
            ],
        );
        let mut session = define(vec![b.unit("T.ks", Some("app"), vec![class])]);
        CodeValidationPass::new(&mut session).run();
        ids(&session).0
    }

    #[test]
    fn right_operand_assigns_on_the_edge_where_it_ran() {
        let b = AstBuilder::new();
        let and = b.binary(
            BinaryOp::LogicalAnd,
            b.ident("flag"),
            b.binary(BinaryOp::Greater, b.assign(b.ident("x"), b.int(1)), b.int(0)),
        );
        assert_eq!(read_on_true_edge(&b, and), Vec::<u32>::new());

        // !(flag || x = ..) is true only when both operands were false.
        let b = AstBuilder::new();
        let or = b.binary(
            BinaryOp::LogicalOr,
            b.ident("flag"),
            b.binary(BinaryOp::Greater, b.assign(b.ident("x"), b.int(1)), b.int(0)),
        );
        assert_eq!(read_on_true_edge(&b, b.unary(UnaryOp::LogicalNot, or)), Vec::<u32>::new());

        let b = AstBuilder::new();
        let or = b.binary(
            BinaryOp::LogicalOr,
            b.ident("flag"),
            b.binary(BinaryOp::Greater, b.assign(b.ident("x"), b.int(1)), b.int(0)),
        );
        assert_eq!(read_on_true_edge(&b, or), vec![20]);
    }

    #[test]
    fn loop_exit_sees_assignments_from_a_failed_or() {
        // while (flag || (x = 1) > 0) flag = false; return x;
        let b = AstBuilder::new();
        let condition = b.binary(
            BinaryOp::LogicalOr,
            b.ident("flag"),
            b.binary(BinaryOp::Greater, b.assign(b.ident("x"), b.int(1)), b.int(0)),
        );
        let class = method_class(
            &b,
            b.int_type(),
            vec![
                b.local(b.prim(PrimitiveKind::Boolean), "flag", Some(b.boolean(true))),
                b.local(b.int_type(), "x", None),
                b.while_stmt(condition, b.expr_stmt(b.assign(b.ident("flag"), b.boolean(false)))),
                b.ret(Some(b.ident("x"))),
            ],
        );
        let mut session = define(vec![b.unit("T.ks", Some("app"), vec![class])]);
        CodeValidationPass::new(&mut session).run();
        assert!(!session.has_errors());
    }

    #[test]
    fn missing_return_and_unreachable_code() {
        let b = AstBuilder::new();
        let class = method_class(&b, b.int_type(), vec![b.expr_stmt(b.int(1))]);
        let mut session = define(vec![b.unit("T.ks", Some("app"), vec![class])]);
        CodeValidationPass::new(&mut session).run();
        assert_eq!(ids(&session).0, vec![30]);

        let b = AstBuilder::new();
        let class = method_class(&b, b.int_type(), vec![b.ret(Some(b.int(1))), b.ret(Some(b.int(2)))]);
        let mut session = define(vec![b.unit("T.ks", Some("app"), vec![class])]);
        CodeValidationPass::new(&mut session).run();
        assert_eq!(ids(&session), (vec![], vec![105]));
    }

    #[test]
    fn infinite_loops_end_only_through_break() {
        let b = AstBuilder::new();
        let forever = b.while_stmt(b.boolean(true), b.block_stmt(vec![]));
        let class = method_class(&b, b.int_type(), vec![forever]);
        let mut session = define(vec![b.unit("T.ks", Some("app"), vec![class])]);
        CodeValidationPass::new(&mut session).run();
        assert!(!session.has_errors());

        let b = AstBuilder::new();
        let with_break = b.while_stmt(b.boolean(true), b.block_stmt(vec![b.break_stmt()]));
        let class = method_class(&b, b.int_type(), vec![with_break]);
        let mut session = define(vec![b.unit("T.ks", Some("app"), vec![class])]);
        CodeValidationPass::new(&mut session).run();
        assert_eq!(ids(&session).0, vec![30]);
    }

    #[test]
    fn jumps_need_a_target() {
        let b = AstBuilder::new();
        let switch = b.switch_stmt(
            b.int(1),
            vec![b.section(vec![SwitchLabel::Default], vec![b.continue_stmt()])],
        );
        let class = method_class(&b, b.void_type(), vec![b.break_stmt(), switch]);
        let mut session = define(vec![b.unit("T.ks", Some("app"), vec![class])]);
        CodeValidationPass::new(&mut session).run();
        assert_eq!(ids(&session).0, vec![31, 31]);
    }
}
