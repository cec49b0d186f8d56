//! Static single assignment lowering.
//!
//! The pass rewrites a module into a new arena in which every operand of
//! a `BinOp`/`UnaryOp`/`Call`/`Attribute` (and friends) is a `Name` or a
//! `Constant`: compound sub-expressions are hoisted into fresh
//! `AnnAssign` temporaries named `<hint>_#<n>`, inserted immediately
//! before their use. Tuple unpacking becomes per-element `__getitem__`
//! assignments and `x += e` becomes `x_#n = x + e`.
//!
//! Straight-line stores are renamed to fresh versions so each temporary
//! is assigned exactly once; stores inside branch and loop bodies keep
//! their names (re-execution reuses the same slot). Full phi-style
//! merging is a later pass.

use std::collections::HashMap;

use crate::ast::{
    Arguments, ClassDef, Comprehension, ExceptHandler, Expr, ExprContext, ExprId, ExprKind,
    FunctionDef, MatchCase, Pattern, PatId, Span, Stmt, StmtId, StmtKind, WithItem,
};
use crate::module::Ast;

/// Lower a module body; the result lives in a fresh arena.
pub fn lower_module(src: &Ast, body: &[StmtId]) -> (Ast, Vec<StmtId>) {
    let mut ssa = StaticSingleAssignment::new(src);
    ssa.bodies.push(Vec::new());
    for &stmt in body {
        ssa.exec_stmt(stmt);
    }
    let body = ssa.bodies.pop().unwrap();
    (ssa.out, body)
}

pub struct StaticSingleAssignment<'a> {
    src: &'a Ast,
    out: Ast,
    unique_count: usize,
    /// Statement lists currently under construction; hoisted assignments
    /// are appended to the innermost one.
    bodies: Vec<Vec<StmtId>>,
    /// Current version of every renamed variable.
    renames: HashMap<String, String>,
    /// Renaming is only sound in straight-line code; inside a branch or a
    /// loop body stores keep their original slot.
    control_depth: usize,
}

impl<'a> StaticSingleAssignment<'a> {
    fn new(src: &'a Ast) -> Self {
        Self {
            src,
            out: Ast::new(),
            unique_count: 0,
            bodies: Vec::new(),
            renames: HashMap::new(),
            control_depth: 0,
        }
    }

    fn body_append(&mut self, stmt: StmtId) {
        self.bodies.last_mut().unwrap().push(stmt);
    }

    fn alloc_expr(&mut self, kind: ExprKind, span: Span) -> ExprId {
        self.out.alloc_expr(Expr::new(kind, span))
    }

    fn alloc_stmt(&mut self, kind: StmtKind, span: Span) -> StmtId {
        self.out.alloc_stmt(Stmt::new(kind, span))
    }

    fn fresh_name(&mut self, hint: &str) -> String {
        let name = format!("{}_#{}", hint, self.unique_count);
        self.unique_count += 1;
        name
    }

    /// Hoist `value` into a fresh temporary unless it is already a leaf.
    fn maybe_new_assign(&mut self, value: ExprId) -> ExprId {
        let span = self.src.expr(value).span;
        if self.src.expr(value).kind.is_atom() {
            return self.exec_expr(value);
        }

        let lowered = self.exec_expr(value);
        let fresh = self.fresh_name("var");
        let target = self.alloc_expr(ExprKind::name(fresh.clone(), ExprContext::Store), span);
        let assign = self.alloc_stmt(
            StmtKind::AnnAssign {
                target,
                annotation: None,
                value: Some(lowered),
            },
            span,
        );
        self.body_append(assign);
        self.alloc_expr(ExprKind::name(fresh, ExprContext::Load), span)
    }

    /// Variables a statement list (re)assigns, nested control flow
    /// included; function and struct bodies have their own scopes and do
    /// not count.
    fn collect_stores(&self, body: &[StmtId], out: &mut std::collections::BTreeSet<String>) {
        for &stmt in body {
            match &self.src.stmt(stmt).kind {
                StmtKind::Assign { targets, .. } => {
                    for &target in targets {
                        self.collect_target(target, out);
                    }
                }
                StmtKind::AnnAssign { target, .. } | StmtKind::AugAssign { target, .. } => {
                    self.collect_target(*target, out);
                }
                StmtKind::For {
                    target,
                    body,
                    orelse,
                    ..
                } => {
                    self.collect_target(*target, out);
                    self.collect_stores(body, out);
                    self.collect_stores(orelse, out);
                }
                StmtKind::While { body, orelse, .. } | StmtKind::If { body, orelse, .. } => {
                    self.collect_stores(body, out);
                    self.collect_stores(orelse, out);
                }
                StmtKind::With { items, body } => {
                    for item in items {
                        if let Some(vars) = item.optional_vars {
                            self.collect_target(vars, out);
                        }
                    }
                    self.collect_stores(body, out);
                }
                StmtKind::Try {
                    body,
                    handlers,
                    orelse,
                    finalbody,
                } => {
                    self.collect_stores(body, out);
                    for handler in handlers {
                        self.collect_stores(&handler.body, out);
                    }
                    self.collect_stores(orelse, out);
                    self.collect_stores(finalbody, out);
                }
                StmtKind::Match { cases, .. } => {
                    for case in cases {
                        self.collect_stores(&case.body, out);
                    }
                }
                _ => {}
            }
        }
    }

    fn collect_target(&self, target: ExprId, out: &mut std::collections::BTreeSet<String>) {
        match &self.src.expr(target).kind {
            ExprKind::Name { id, .. } => {
                out.insert(id.clone());
            }
            ExprKind::TupleExpr { elts, .. } | ExprKind::ListExpr { elts, .. } => {
                for &elt in elts {
                    self.collect_target(elt, out);
                }
            }
            _ => {}
        }
    }

    /// Before a branch or loop stores into renamed variables, copy the
    /// current version back into the original slot so every path reads
    /// and writes the same location.
    fn bridge_renames(&mut self, bodies: &[&[StmtId]]) {
        let mut stored = std::collections::BTreeSet::new();
        for body in bodies {
            self.collect_stores(body, &mut stored);
        }
        for name in stored {
            if let Some(current) = self.renames.remove(&name) {
                let span = Span::unknown();
                let load = self.alloc_expr(ExprKind::name(current, ExprContext::Load), span);
                let store = self.alloc_expr(ExprKind::name(name, ExprContext::Store), span);
                let assign = self.alloc_stmt(
                    StmtKind::AnnAssign {
                        target: store,
                        annotation: None,
                        value: Some(load),
                    },
                    span,
                );
                self.body_append(assign);
            }
        }
    }

    /// Build the store target for an assignment to `name`, renaming to a
    /// fresh version in straight-line code.
    fn new_store(&mut self, name: &str, span: Span) -> ExprId {
        let stored = if self.control_depth == 0 {
            let fresh = self.fresh_name(name);
            self.renames.insert(name.to_string(), fresh.clone());
            fresh
        } else {
            self.renames.remove(name);
            name.to_string()
        };
        self.alloc_expr(ExprKind::name(stored, ExprContext::Store), span)
    }

    fn lower_body(&mut self, body: &[StmtId]) -> Vec<StmtId> {
        self.bodies.push(Vec::new());
        for &stmt in body {
            self.exec_stmt(stmt);
        }
        self.bodies.pop().unwrap()
    }

    fn lower_control_body(&mut self, body: &[StmtId]) -> Vec<StmtId> {
        self.control_depth += 1;
        let lowered = self.lower_body(body);
        self.control_depth -= 1;
        lowered
    }

    // ── statements ─────────────────────────────────────────────────────

    fn exec_stmt(&mut self, id: StmtId) {
        let span = self.src.stmt(id).span;
        let kind = self.src.stmt(id).kind.clone();

        match kind {
            StmtKind::FunctionDef(def) => {
                // a function body is a fresh straight-line scope
                let saved = std::mem::take(&mut self.renames);
                let saved_depth = std::mem::replace(&mut self.control_depth, 0);
                let lowered = FunctionDef {
                    name: def.name.clone(),
                    args: self.lower_arguments(&def.args),
                    body: self.lower_body(&def.body),
                    returns: def.returns.clone(),
                    docstring: def.docstring.clone(),
                    is_async: def.is_async,
                    ty: None,
                    scope_start: None,
                };
                self.control_depth = saved_depth;
                self.renames = saved;
                let stmt = self.alloc_stmt(StmtKind::FunctionDef(lowered), span);
                self.body_append(stmt);
            }
            StmtKind::ClassDef(def) => {
                // attribute declarations keep their names, so the class
                // body is never rename-eligible
                let saved = std::mem::take(&mut self.renames);
                let lowered = ClassDef {
                    name: def.name.clone(),
                    body: self.lower_control_body(&def.body),
                    docstring: def.docstring.clone(),
                    // attribute slots are re-mined on the new arena
                    attrs: Vec::new(),
                };
                self.renames = saved;
                let stmt = self.alloc_stmt(StmtKind::ClassDef(lowered), span);
                self.body_append(stmt);
            }
            StmtKind::Return { value } => {
                let value = value.map(|v| self.exec_expr(v));
                let stmt = self.alloc_stmt(StmtKind::Return { value }, span);
                self.body_append(stmt);
            }
            StmtKind::Delete { targets } => {
                let targets = targets.into_iter().map(|t| self.exec_expr(t)).collect();
                let stmt = self.alloc_stmt(StmtKind::Delete { targets }, span);
                self.body_append(stmt);
            }
            StmtKind::Assign { targets, value } => {
                self.lower_assignment(&targets, None, Some(value), span);
            }
            StmtKind::AnnAssign {
                target,
                annotation,
                value,
            } => {
                self.lower_assignment(&[target], annotation, value, span);
            }
            StmtKind::AugAssign { target, op, value } => {
                // x += e  ==>  x_#n = x + e
                let value = self.exec_expr(value);
                let load = self.load_of(target);
                let span_t = self.src.expr(target).span;
                let binop = self.alloc_expr(
                    ExprKind::BinOp {
                        left: load,
                        op,
                        right: value,
                    },
                    span_t,
                );
                let store = self.store_of(target);
                let stmt = self.alloc_stmt(
                    StmtKind::AnnAssign {
                        target: store,
                        annotation: None,
                        value: Some(binop),
                    },
                    span,
                );
                self.body_append(stmt);
            }
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
            } => {
                self.bridge_renames(&[std::slice::from_ref(&id)]);
                let iter = self.exec_expr(iter);

                // a tuple target loops over a fresh scalar and unpacks it
                // at the top of the body, element by element
                let (target, unpack) = self.lower_for_target(target);
                let body = {
                    self.control_depth += 1;
                    self.bodies.push(unpack);
                    for &stmt in &body {
                        self.exec_stmt(stmt);
                    }
                    self.control_depth -= 1;
                    self.bodies.pop().unwrap()
                };
                let orelse = self.lower_control_body(&orelse);
                let stmt = self.alloc_stmt(
                    StmtKind::For {
                        target,
                        iter,
                        body,
                        orelse,
                    },
                    span,
                );
                self.body_append(stmt);
            }
            StmtKind::While { test, body, orelse } => {
                self.bridge_renames(&[&body, &orelse]);
                let test = self.exec_expr(test);
                let body = self.lower_control_body(&body);
                let orelse = self.lower_control_body(&orelse);
                let stmt = self.alloc_stmt(StmtKind::While { test, body, orelse }, span);
                self.body_append(stmt);
            }
            StmtKind::If { test, body, orelse } => {
                self.bridge_renames(&[&body, &orelse]);
                let test = self.exec_expr(test);
                let body = self.lower_control_body(&body);
                let orelse = self.lower_control_body(&orelse);
                let stmt = self.alloc_stmt(StmtKind::If { test, body, orelse }, span);
                self.body_append(stmt);
            }
            StmtKind::With { items, body } => {
                self.bridge_renames(&[&body]);
                let items = items
                    .into_iter()
                    .map(|item| WithItem {
                        context_expr: self.exec_expr(item.context_expr),
                        optional_vars: item.optional_vars.map(|v| self.exec_expr(v)),
                    })
                    .collect();
                let body = self.lower_control_body(&body);
                let stmt = self.alloc_stmt(StmtKind::With { items, body }, span);
                self.body_append(stmt);
            }
            StmtKind::Raise { exc, cause } => {
                let exc = exc.map(|e| self.exec_expr(e));
                let cause = cause.map(|c| self.exec_expr(c));
                let stmt = self.alloc_stmt(StmtKind::Raise { exc, cause }, span);
                self.body_append(stmt);
            }
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => {
                self.bridge_renames(&[std::slice::from_ref(&id)]);
                let body = self.lower_control_body(&body);
                let handlers = handlers
                    .into_iter()
                    .map(|handler| ExceptHandler {
                        typ: handler.typ.map(|t| self.exec_expr(t)),
                        name: handler.name.clone(),
                        body: self.lower_control_body(&handler.body),
                    })
                    .collect();
                let orelse = self.lower_control_body(&orelse);
                let finalbody = self.lower_control_body(&finalbody);
                let stmt = self.alloc_stmt(
                    StmtKind::Try {
                        body,
                        handlers,
                        orelse,
                        finalbody,
                    },
                    span,
                );
                self.body_append(stmt);
            }
            StmtKind::Assert { test, msg } => {
                let test = self.exec_expr(test);
                let msg = msg.map(|m| self.exec_expr(m));
                let stmt = self.alloc_stmt(StmtKind::Assert { test, msg }, span);
                self.body_append(stmt);
            }
            StmtKind::Import { names } => {
                let stmt = self.alloc_stmt(StmtKind::Import { names }, span);
                self.body_append(stmt);
            }
            StmtKind::ImportFrom { module, names } => {
                let stmt = self.alloc_stmt(StmtKind::ImportFrom { module, names }, span);
                self.body_append(stmt);
            }
            StmtKind::Global { names } => {
                let stmt = self.alloc_stmt(StmtKind::Global { names }, span);
                self.body_append(stmt);
            }
            StmtKind::Nonlocal { names } => {
                let stmt = self.alloc_stmt(StmtKind::Nonlocal { names }, span);
                self.body_append(stmt);
            }
            StmtKind::Expr { value } => {
                let value = self.exec_expr(value);
                let stmt = self.alloc_stmt(StmtKind::Expr { value }, span);
                self.body_append(stmt);
            }
            StmtKind::Pass => {
                let stmt = self.alloc_stmt(StmtKind::Pass, span);
                self.body_append(stmt);
            }
            StmtKind::Break => {
                let stmt = self.alloc_stmt(StmtKind::Break, span);
                self.body_append(stmt);
            }
            StmtKind::Continue => {
                let stmt = self.alloc_stmt(StmtKind::Continue, span);
                self.body_append(stmt);
            }
            StmtKind::Match { subject, cases } => {
                self.bridge_renames(&[std::slice::from_ref(&id)]);
                let subject = self.maybe_new_assign(subject);
                let cases = cases
                    .into_iter()
                    .map(|case| MatchCase {
                        pattern: self.lower_pattern(case.pattern),
                        guard: case.guard.map(|g| self.exec_expr(g)),
                        body: self.lower_control_body(&case.body),
                    })
                    .collect();
                let stmt = self.alloc_stmt(StmtKind::Match { subject, cases }, span);
                self.body_append(stmt);
            }
            StmtKind::Jump { .. }
            | StmtKind::CondJump { .. }
            | StmtKind::IterJump { .. }
            | StmtKind::IterEnd { .. }
            | StmtKind::NativeFunction { .. } => {
                // VM-only nodes only exist after this pass
            }
        }
    }

    /// Shared tail of Assign/AnnAssign: scalar stores are renamed, tuple
    /// targets unpack through `__getitem__`.
    fn lower_assignment(
        &mut self,
        targets: &[ExprId],
        annotation: Option<crate::ast::TypeExpr>,
        value: Option<ExprId>,
        span: Span,
    ) {
        let Some(value) = value else {
            // bare annotation: `x: Float`
            let target = self.store_of(targets[0]);
            let stmt = self.alloc_stmt(
                StmtKind::AnnAssign {
                    target,
                    annotation,
                    value: None,
                },
                span,
            );
            self.body_append(stmt);
            return;
        };

        // tuple unpacking first, it needs the value in a temporary
        if let ExprKind::TupleExpr { elts, .. } | ExprKind::ListExpr { elts, .. } =
            self.src.expr(targets[0]).kind.clone()
        {
            let tmp = self.maybe_new_assign(value);
            for (i, &elt) in elts.iter().enumerate() {
                let elt_span = self.src.expr(elt).span;
                let getitem_fn =
                    self.alloc_expr(ExprKind::name("__getitem__", ExprContext::Load), elt_span);
                let index = self.alloc_expr(
                    ExprKind::Constant(crate::ast::ConstantValue::Int(i as i64)),
                    elt_span,
                );
                let call = self.alloc_expr(
                    ExprKind::Call {
                        func: getitem_fn,
                        args: vec![tmp, index],
                        keywords: Vec::new(),
                    },
                    elt_span,
                );
                let target = self.store_of(elt);
                let stmt = self.alloc_stmt(
                    StmtKind::AnnAssign {
                        target,
                        annotation: None,
                        value: Some(call),
                    },
                    elt_span,
                );
                self.body_append(stmt);
            }
            return;
        }

        let value = self.exec_expr(value);

        // chained `a = b = v` stores the same value into each target
        for &target in targets {
            let store = self.store_of(target);
            let stmt = self.alloc_stmt(
                StmtKind::AnnAssign {
                    target: store,
                    annotation: annotation.clone(),
                    value: Some(value),
                },
                span,
            );
            self.body_append(stmt);
        }
    }

    /// Loop target for a `for` statement. A plain name passes through; a
    /// tuple or list target is replaced by a fresh scalar plus per-element
    /// `__getitem__` assignments to prepend to the loop body.
    fn lower_for_target(&mut self, target: ExprId) -> (ExprId, Vec<StmtId>) {
        let span = self.src.expr(target).span;
        let elts = match self.src.expr(target).kind.clone() {
            ExprKind::TupleExpr { elts, .. } | ExprKind::ListExpr { elts, .. } => elts,
            _ => return (self.exec_expr(target), Vec::new()),
        };

        let fresh = self.fresh_name("var");
        let loop_target =
            self.alloc_expr(ExprKind::name(fresh.clone(), ExprContext::Store), span);

        let mut unpack = Vec::new();
        for (i, &elt) in elts.iter().enumerate() {
            let elt_span = self.src.expr(elt).span;
            let item = self.alloc_expr(ExprKind::name(fresh.clone(), ExprContext::Load), elt_span);
            let getitem_fn =
                self.alloc_expr(ExprKind::name("__getitem__", ExprContext::Load), elt_span);
            let index = self.alloc_expr(
                ExprKind::Constant(crate::ast::ConstantValue::Int(i as i64)),
                elt_span,
            );
            let call = self.alloc_expr(
                ExprKind::Call {
                    func: getitem_fn,
                    args: vec![item, index],
                    keywords: Vec::new(),
                },
                elt_span,
            );
            // element stores keep their slot, like any other loop-body store
            let store = match self.src.expr(elt).kind.clone() {
                ExprKind::Name { id, .. } => {
                    self.renames.remove(&id);
                    self.alloc_expr(ExprKind::name(id, ExprContext::Store), elt_span)
                }
                _ => self.exec_expr(elt),
            };
            unpack.push(self.alloc_stmt(
                StmtKind::AnnAssign {
                    target: store,
                    annotation: None,
                    value: Some(call),
                },
                elt_span,
            ));
        }

        (loop_target, unpack)
    }

    /// Store target for an arbitrary target expression.
    fn store_of(&mut self, target: ExprId) -> ExprId {
        let span = self.src.expr(target).span;
        match self.src.expr(target).kind.clone() {
            ExprKind::Name { id, .. } => self.new_store(&id, span),
            _ => {
                // attribute / subscript stores keep their shape
                self.exec_expr(target)
            }
        }
    }

    /// Load of a target as it reads before the statement executes.
    fn load_of(&mut self, target: ExprId) -> ExprId {
        let span = self.src.expr(target).span;
        match self.src.expr(target).kind.clone() {
            ExprKind::Name { id, .. } => {
                let current = self.renames.get(&id).cloned().unwrap_or(id);
                self.alloc_expr(ExprKind::name(current, ExprContext::Load), span)
            }
            _ => self.exec_expr(target),
        }
    }

    fn lower_arguments(&mut self, args: &Arguments) -> Arguments {
        Arguments {
            args: args.args.clone(),
            defaults: args.defaults.iter().map(|&d| self.exec_expr(d)).collect(),
        }
    }

    fn lower_pattern(&mut self, id: PatId) -> PatId {
        let span = self.src.pattern(id).span;
        let kind = self.src.pattern(id).kind.clone();
        let kind = match kind {
            crate::ast::PatternKind::MatchValue(v) => {
                crate::ast::PatternKind::MatchValue(self.exec_expr(v))
            }
            crate::ast::PatternKind::MatchSingleton(c) => {
                crate::ast::PatternKind::MatchSingleton(c)
            }
            crate::ast::PatternKind::MatchSequence(pats) => crate::ast::PatternKind::MatchSequence(
                pats.into_iter().map(|p| self.lower_pattern(p)).collect(),
            ),
            crate::ast::PatternKind::MatchMapping {
                keys,
                patterns,
                rest,
            } => crate::ast::PatternKind::MatchMapping {
                keys: keys.into_iter().map(|k| self.exec_expr(k)).collect(),
                patterns: patterns
                    .into_iter()
                    .map(|p| self.lower_pattern(p))
                    .collect(),
                rest,
            },
            crate::ast::PatternKind::MatchClass {
                cls,
                patterns,
                kwd_attrs,
                kwd_patterns,
            } => crate::ast::PatternKind::MatchClass {
                cls: self.exec_expr(cls),
                patterns: patterns
                    .into_iter()
                    .map(|p| self.lower_pattern(p))
                    .collect(),
                kwd_attrs,
                kwd_patterns: kwd_patterns
                    .into_iter()
                    .map(|p| self.lower_pattern(p))
                    .collect(),
            },
            crate::ast::PatternKind::MatchStar(name) => crate::ast::PatternKind::MatchStar(name),
            crate::ast::PatternKind::MatchAs { pattern, name } => {
                crate::ast::PatternKind::MatchAs {
                    pattern: pattern.map(|p| self.lower_pattern(p)),
                    name,
                }
            }
            crate::ast::PatternKind::MatchOr(pats) => crate::ast::PatternKind::MatchOr(
                pats.into_iter().map(|p| self.lower_pattern(p)).collect(),
            ),
        };
        self.out.alloc_pattern(Pattern { kind, span })
    }

    // ── expressions ────────────────────────────────────────────────────

    fn exec_expr(&mut self, id: ExprId) -> ExprId {
        let span = self.src.expr(id).span;
        let kind = self.src.expr(id).kind.clone();

        let kind = match kind {
            ExprKind::Name { id, ctx, varid } => {
                let current = match ctx {
                    ExprContext::Load => self.renames.get(&id).cloned().unwrap_or(id),
                    _ => id,
                };
                ExprKind::Name {
                    id: current,
                    ctx,
                    varid,
                }
            }
            ExprKind::Constant(value) => ExprKind::Constant(value),
            ExprKind::BinOp { left, op, right } => ExprKind::BinOp {
                left: self.maybe_new_assign(left),
                op,
                right: self.maybe_new_assign(right),
            },
            ExprKind::UnaryOp { op, operand } => ExprKind::UnaryOp {
                op,
                operand: self.maybe_new_assign(operand),
            },
            ExprKind::BoolOp { op, values } => ExprKind::BoolOp {
                op,
                values: values
                    .into_iter()
                    .map(|v| self.maybe_new_assign(v))
                    .collect(),
            },
            ExprKind::Compare {
                left,
                ops,
                comparators,
            } => ExprKind::Compare {
                left: self.maybe_new_assign(left),
                ops,
                comparators: comparators
                    .into_iter()
                    .map(|c| self.maybe_new_assign(c))
                    .collect(),
            },
            ExprKind::Call {
                func,
                args,
                keywords,
            } => ExprKind::Call {
                func: self.maybe_new_assign(func),
                args: args
                    .into_iter()
                    .map(|a| self.maybe_new_assign(a))
                    .collect(),
                keywords: keywords
                    .into_iter()
                    .map(|kw| crate::ast::Keyword {
                        arg: kw.arg,
                        value: self.maybe_new_assign(kw.value),
                    })
                    .collect(),
            },
            ExprKind::Attribute { value, attr, ctx } => ExprKind::Attribute {
                value: self.maybe_new_assign(value),
                attr,
                ctx,
            },
            ExprKind::Subscript { value, slice, ctx } => ExprKind::Subscript {
                value: self.maybe_new_assign(value),
                slice: self.maybe_new_assign(slice),
                ctx,
            },
            ExprKind::IfExp { test, body, orelse } => ExprKind::IfExp {
                test: self.maybe_new_assign(test),
                body: self.exec_expr(body),
                orelse: self.exec_expr(orelse),
            },
            ExprKind::NamedExpr { target, value } => ExprKind::NamedExpr {
                target: self.exec_expr(target),
                value: self.exec_expr(value),
            },
            ExprKind::Lambda { args, body } => {
                let saved = std::mem::take(&mut self.renames);
                let body = self.exec_expr(body);
                self.renames = saved;
                ExprKind::Lambda { args, body }
            }
            ExprKind::DictExpr { keys, values } => ExprKind::DictExpr {
                keys: keys.into_iter().map(|k| self.exec_expr(k)).collect(),
                values: values.into_iter().map(|v| self.exec_expr(v)).collect(),
            },
            ExprKind::SetExpr { elts } => ExprKind::SetExpr {
                elts: elts.into_iter().map(|e| self.exec_expr(e)).collect(),
            },
            ExprKind::ListExpr { elts, ctx } => ExprKind::ListExpr {
                elts: elts.into_iter().map(|e| self.exec_expr(e)).collect(),
                ctx,
            },
            ExprKind::TupleExpr { elts, ctx } => ExprKind::TupleExpr {
                elts: elts.into_iter().map(|e| self.exec_expr(e)).collect(),
                ctx,
            },
            ExprKind::ListComp { elt, generators } => ExprKind::ListComp {
                elt: self.exec_expr(elt),
                generators: self.lower_generators(generators),
            },
            ExprKind::SetComp { elt, generators } => ExprKind::SetComp {
                elt: self.exec_expr(elt),
                generators: self.lower_generators(generators),
            },
            ExprKind::DictComp {
                key,
                value,
                generators,
            } => ExprKind::DictComp {
                key: self.exec_expr(key),
                value: self.exec_expr(value),
                generators: self.lower_generators(generators),
            },
            ExprKind::GeneratorExp { elt, generators } => ExprKind::GeneratorExp {
                elt: self.exec_expr(elt),
                generators: self.lower_generators(generators),
            },
            ExprKind::Await { value } => ExprKind::Await {
                value: self.exec_expr(value),
            },
            ExprKind::Yield { value } => ExprKind::Yield {
                value: value.map(|v| self.exec_expr(v)),
            },
            ExprKind::YieldFrom { value } => ExprKind::YieldFrom {
                value: self.exec_expr(value),
            },
            ExprKind::JoinedStr { values } => ExprKind::JoinedStr {
                values: values.into_iter().map(|v| self.exec_expr(v)).collect(),
            },
            ExprKind::FormattedValue { value } => ExprKind::FormattedValue {
                value: self.exec_expr(value),
            },
            ExprKind::Starred { value, ctx } => ExprKind::Starred {
                value: self.exec_expr(value),
                ctx,
            },
            ExprKind::Slice { lower, upper, step } => ExprKind::Slice {
                lower: lower.map(|l| self.exec_expr(l)),
                upper: upper.map(|u| self.exec_expr(u)),
                step: step.map(|s| self.exec_expr(s)),
            },
        };

        self.alloc_expr(kind, span)
    }

    fn lower_generators(&mut self, generators: Vec<Comprehension>) -> Vec<Comprehension> {
        generators
            .into_iter()
            .map(|gen| Comprehension {
                target: self.exec_expr(gen.target),
                iter: self.exec_expr(gen.iter),
                ifs: gen.ifs.into_iter().map(|g| self.exec_expr(g)).collect(),
                is_async: gen.is_async,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOperator, ConstantValue};
    use crate::buffer::StringBuffer;
    use crate::lexer::Lexer;
    use crate::module::Module;
    use crate::parser::Parser;

    fn lower(source: &str) -> (Ast, Vec<StmtId>) {
        let mut module = Module::new();
        let lexer = Lexer::new(Box::new(StringBuffer::new(source)));
        let mut parser = Parser::new(lexer, &mut module);
        let body = parser.parse_module();
        assert!(parser.errors.is_empty(), "{:?}", parser.errors);
        lower_module(&module.ast, &body)
    }

    fn assert_operands_flat(ast: &Ast) {
        for i in 0..ast.expr_count() {
            let id = crate::ast::ExprId(i as u32);
            match &ast.expr(id).kind {
                ExprKind::BinOp { left, right, .. } => {
                    assert!(ast.expr(*left).kind.is_atom(), "binop lhs not flat");
                    assert!(ast.expr(*right).kind.is_atom(), "binop rhs not flat");
                }
                ExprKind::UnaryOp { operand, .. } => {
                    assert!(ast.expr(*operand).kind.is_atom());
                }
                ExprKind::Call { func, args, .. } => {
                    assert!(ast.expr(*func).kind.is_atom());
                    for arg in args {
                        assert!(ast.expr(*arg).kind.is_atom(), "call arg not flat");
                    }
                }
                ExprKind::Attribute { value, .. } => {
                    assert!(ast.expr(*value).kind.is_atom());
                }
                _ => {}
            }
        }
    }

    #[test]
    fn augmented_assign_becomes_a_fresh_binop_assign() {
        let (ast, body) = lower("x = 0\nx += 1\n");
        // second statement: x_#n = x_#m + 1
        let stmt = body[1];
        match &ast.stmt(stmt).kind {
            StmtKind::AnnAssign { target, value, .. } => {
                match &ast.expr(*target).kind {
                    ExprKind::Name { id, .. } => {
                        assert!(id.starts_with("x_#"), "target is {}", id);
                    }
                    other => panic!("expected a name target, got {:?}", other),
                }
                let value = value.unwrap();
                match &ast.expr(value).kind {
                    ExprKind::BinOp { left, op, .. } => {
                        assert_eq!(*op, BinaryOperator::Add);
                        assert!(matches!(
                            &ast.expr(*left).kind,
                            ExprKind::Name { ctx: ExprContext::Load, .. }
                        ));
                    }
                    other => panic!("expected a binop, got {:?}", other),
                }
            }
            other => panic!("expected an annotated assign, got {:?}", other),
        }
    }

    #[test]
    fn nested_expressions_hoist_into_temporaries() {
        let (ast, body) = lower("y = (1 + 2) * (3 + 4)\n");
        // two hoisted temporaries before the final assignment
        assert_eq!(body.len(), 3);
        assert_operands_flat(&ast);
    }

    #[test]
    fn call_arguments_are_flattened() {
        let (ast, _) = lower("z = max(1.0 + 2.0, min(3.0, 4.0))\n");
        assert_operands_flat(&ast);
    }

    #[test]
    fn atoms_are_left_alone() {
        let (_, body) = lower("y = x\n");
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn tuple_unpacking_uses_getitem() {
        let (ast, body) = lower("a, b = f()\n");
        // one temp for f(), then one __getitem__ assign per element
        assert_eq!(body.len(), 3);
        for &stmt in &body[1..] {
            match &ast.stmt(stmt).kind {
                StmtKind::AnnAssign { value, .. } => {
                    let value = value.unwrap();
                    match &ast.expr(value).kind {
                        ExprKind::Call { func, args, .. } => {
                            assert!(matches!(
                                &ast.expr(*func).kind,
                                ExprKind::Name { id, .. } if id == "__getitem__"
                            ));
                            assert_eq!(args.len(), 2);
                            assert!(matches!(
                                &ast.expr(args[1]).kind,
                                ExprKind::Constant(ConstantValue::Int(_))
                            ));
                        }
                        other => panic!("expected a __getitem__ call, got {:?}", other),
                    }
                }
                other => panic!("expected an annotated assign, got {:?}", other),
            }
        }
    }

    #[test]
    fn straight_line_loads_follow_the_rename() {
        let (ast, body) = lower("x = 1\ny = x + 1\n");
        let stmt = body[1];
        match &ast.stmt(stmt).kind {
            StmtKind::AnnAssign { value, .. } => {
                let value = value.unwrap();
                match &ast.expr(value).kind {
                    ExprKind::BinOp { left, .. } => match &ast.expr(*left).kind {
                        ExprKind::Name { id, .. } => assert!(id.starts_with("x_#")),
                        other => panic!("expected a name, got {:?}", other),
                    },
                    other => panic!("expected a binop, got {:?}", other),
                }
            }
            other => panic!("expected an assign, got {:?}", other),
        }
    }

    #[test]
    fn loop_bodies_keep_their_slots() {
        let (ast, body) = lower("x = 0\nwhile x < 10:\n    x += 1\n");
        // x = 0 renames to x_#0, the loop bridges it back into x
        let while_stmt = *body.last().unwrap();
        match &ast.stmt(while_stmt).kind {
            StmtKind::While { body, .. } => match &ast.stmt(body[0]).kind {
                StmtKind::AnnAssign { target, .. } => match &ast.expr(*target).kind {
                    ExprKind::Name { id, .. } => assert_eq!(id, "x"),
                    other => panic!("expected a name, got {:?}", other),
                },
                other => panic!("expected an assign, got {:?}", other),
            },
            other => panic!("expected a while, got {:?}", other),
        }
    }

    #[test]
    fn branch_stores_are_bridged_back() {
        let (ast, body) = lower("x = 1\nif c:\n    x = 2\ny = x\n");
        // the value of x flows back into its original slot before the
        // branch, so the load after the if reads plain `x`
        let last = *body.last().unwrap();
        match &ast.stmt(last).kind {
            StmtKind::AnnAssign { value, .. } => match &ast.expr(value.unwrap()).kind {
                ExprKind::Name { id, .. } => assert_eq!(id, "x"),
                other => panic!("expected a name, got {:?}", other),
            },
            other => panic!("expected an assign, got {:?}", other),
        }

        let bridged = body.iter().any(|&stmt| {
            matches!(
                &ast.stmt(stmt).kind,
                StmtKind::AnnAssign { target, value: Some(value), .. }
                    if matches!(&ast.expr(*target).kind, ExprKind::Name { id, .. } if id == "x")
                        && matches!(&ast.expr(*value).kind, ExprKind::Name { id, .. } if id.starts_with("x_#"))
            )
        });
        assert!(bridged, "expected a bridging copy of x before the branch");
    }

    #[test]
    fn block_structure_is_preserved() {
        let (ast, body) = lower("if c:\n    a = 1\nelse:\n    a = 2\n");
        assert_eq!(body.len(), 1);
        match &ast.stmt(body[0]).kind {
            StmtKind::If { body, orelse, .. } => {
                assert_eq!(body.len(), 1);
                assert_eq!(orelse.len(), 1);
            }
            other => panic!("expected an if, got {:?}", other),
        }
    }
}
