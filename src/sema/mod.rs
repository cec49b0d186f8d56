//! Semantic analysis.
//!
//! The analyser runs after parsing and before lowering. It binds every
//! name to a stable varid, deduces a type for every expression, checks
//! deduced types against annotations, and records (never throws) the
//! errors it finds, so one run reports as many problems as possible.
//!
//! Type deduction is weaker than inference: types flow from children to
//! parents only, and the user is expected to annotate function arguments.
//! A quick forward pass over a module's top-level definitions makes
//! mutually recursive references resolve.

pub mod bindings;
pub mod builtin;
pub mod errors;
pub mod import;

use std::path::PathBuf;

use crate::ast::{
    types, Arguments, BinaryOperator, BoolOperator, ClassDef, Comprehension, ConstantValue,
    ExceptHandler, ExprContext, ExprId, ExprKind, FunctionDef, MatchCase, PatId, PatternKind,
    Span, StmtId, StmtKind, TypeExpr, WithItem,
};
use crate::module::{Ast, Module};

use bindings::{BindingValue, Bindings};
use errors::SemaError;

/// An imported module after its own pipeline run: arena, top-level body
/// and surviving bindings, kept so `from m import n` and `m.attr` can be
/// typed without re-analysing.
pub struct AnalysedImport {
    pub name: String,
    pub module: Module,
    pub body: Vec<StmtId>,
    pub bindings: Bindings,
    pub errors: Vec<SemaError>,
}

pub struct SemanticAnalyser<'a> {
    ast: &'a mut Ast,
    pub bindings: Bindings,
    pub errors: Vec<SemaError>,
    /// Enclosing definitions, innermost last; used to type `self`.
    nested: Vec<StmtId>,
    paths: Vec<PathBuf>,
    pub modules: Vec<AnalysedImport>,
}

impl<'a> SemanticAnalyser<'a> {
    pub fn new(ast: &'a mut Ast) -> Self {
        let mut root = Bindings::new();
        builtin::install_prelude(&mut root);
        Self {
            ast,
            bindings: root,
            errors: Vec::new(),
            nested: Vec::new(),
            paths: import::python_paths(),
            modules: Vec::new(),
        }
    }

    /// Analyse a whole module in two phases: first insert every top-level
    /// definition with its declared signature so mutually recursive
    /// references resolve, then visit the bodies in source order.
    pub fn analyse_module(&mut self, body: &[StmtId]) {
        for &stmt in body {
            match &self.ast.stmt(stmt).kind {
                StmtKind::FunctionDef(def) => {
                    let name = def.name.clone();
                    let signature = declared_signature(def);
                    self.bindings
                        .add(name, Some(BindingValue::Stmt(stmt)), Some(signature));
                }
                StmtKind::ClassDef(def) => {
                    let name = def.name.clone();
                    self.bindings
                        .add(name, Some(BindingValue::Stmt(stmt)), Some(TypeExpr::Type));
                }
                _ => {}
            }
        }

        for &stmt in body {
            self.exec_stmt(stmt);
        }
    }

    // ── shared helpers ─────────────────────────────────────────────────

    fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.bindings.enter_scope();
        let result = f(self);
        self.bindings.exit_scope();
        result
    }

    fn oneof(types: Vec<TypeExpr>) -> Option<TypeExpr> {
        types.into_iter().next()
    }

    /// Structural typecheck; a missing side is not an error (best effort).
    fn typecheck(
        &mut self,
        expected: Option<&TypeExpr>,
        got: Option<&TypeExpr>,
        span: Span,
    ) -> bool {
        let (Some(expected), Some(got)) = (expected, got) else {
            return true;
        };
        log::debug!("typecheck {} against {}", expected, got);
        if types::equal(expected, got) {
            return true;
        }
        self.errors.push(SemaError::TypeError {
            expected: expected.to_string(),
            got: got.to_string(),
            span,
        });
        false
    }

    /// Bind a definition name, reusing the slot of a forward declaration
    /// for the same statement.
    fn bind_definition(&mut self, name: &str, stmt: StmtId, ty: Option<TypeExpr>) -> usize {
        if let Some((varid, entry)) = self.bindings.lookup(name) {
            if matches!(entry.value, Some(BindingValue::Stmt(s)) if s == stmt) {
                if let Some(ty) = ty {
                    self.bindings.set_type(varid, ty);
                }
                return varid;
            }
        }
        self.bindings.add(name, Some(BindingValue::Stmt(stmt)), ty)
    }

    /// Store a name: rebinding inside the same scope reuses the slot, a
    /// first assignment appends a new one.
    fn bind_name(
        &mut self,
        name: &str,
        value: Option<BindingValue>,
        ty: Option<TypeExpr>,
    ) -> usize {
        let scope_start = self.bindings.current_scope_start();
        if let Some((varid, _)) = self.bindings.lookup(name) {
            if varid >= scope_start {
                if let Some(ty) = ty {
                    self.bindings.set_type(varid, ty);
                }
                return varid;
            }
        }
        self.bindings.add(name.to_string(), value, ty)
    }

    /// Turn an assignment target into a binding when it is a plain name.
    fn add_name(
        &mut self,
        target: ExprId,
        value: Option<BindingValue>,
        ty: Option<TypeExpr>,
    ) -> bool {
        let name = match &self.ast.expr(target).kind {
            ExprKind::Name { id, .. } => id.clone(),
            _ => return false,
        };
        let varid = self.bind_name(&name, value, ty);
        if let ExprKind::Name { ctx, varid: v, .. } = &mut self.ast.expr_mut(target).kind {
            *ctx = ExprContext::Store;
            *v = varid as i32;
        }
        true
    }

    /// The `ClassDef` statement behind a class type, when there is one.
    fn get_class(&self, ty: &TypeExpr) -> Option<StmtId> {
        let TypeExpr::Class(name) = ty else {
            return None;
        };
        let (_, entry) = self.bindings.lookup(name)?;
        let BindingValue::Stmt(stmt) = entry.value.as_ref()? else {
            return None;
        };
        matches!(self.ast.stmt(*stmt).kind, StmtKind::ClassDef(_)).then_some(*stmt)
    }

    fn class_name(&self, stmt: StmtId) -> Option<String> {
        match &self.ast.stmt(stmt).kind {
            StmtKind::ClassDef(def) => Some(def.name.clone()),
            _ => None,
        }
    }

    fn insert_class_attr(
        &mut self,
        class_id: StmtId,
        name: &str,
        stmt: StmtId,
        ty: Option<TypeExpr>,
    ) {
        if let StmtKind::ClassDef(def) = &mut self.ast.stmt_mut(class_id).kind {
            def.insert_attribute(name, stmt, ty);
        }
    }

    // ── statements ─────────────────────────────────────────────────────

    pub fn exec_stmt(&mut self, id: StmtId) -> Option<TypeExpr> {
        let span = self.ast.stmt(id).span;
        let kind = self.ast.stmt(id).kind.clone();

        match kind {
            StmtKind::FunctionDef(def) => self.functiondef(id, def, span),
            StmtKind::ClassDef(def) => self.classdef(id, def, span),
            StmtKind::Return { value } => match value {
                Some(v) => self.exec_expr(v),
                None => Some(TypeExpr::none()),
            },
            StmtKind::Delete { targets } => {
                for target in targets {
                    self.exec_expr(target);
                }
                None
            }
            StmtKind::Assign { targets, value } => self.assign(&targets, value, span),
            StmtKind::AugAssign { target, op, value } => self.augassign(target, op, value, span),
            StmtKind::AnnAssign {
                target,
                annotation,
                value,
            } => self.annassign(target, annotation, value, span),
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
            } => self.forstmt(target, iter, &body, &orelse),
            StmtKind::While { test, body, orelse } => {
                self.exec_expr(test);
                self.exec_body(&body);
                let types = self.exec_body(&orelse);
                Self::oneof(types)
            }
            StmtKind::If { test, body, orelse } => {
                self.exec_expr(test);
                let types = self.exec_body(&body);
                self.exec_body(&orelse);
                Self::oneof(types)
            }
            StmtKind::With { items, body } => self.with(&items, &body),
            StmtKind::Raise { exc, cause } => {
                if let Some(exc) = exc {
                    self.exec_expr(exc);
                }
                if let Some(cause) = cause {
                    self.exec_expr(cause);
                }
                None
            }
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => self.trystmt(&body, &handlers, &orelse, &finalbody),
            StmtKind::Assert { test, msg } => {
                self.exec_expr(test);
                if let Some(msg) = msg {
                    self.exec_expr(msg);
                }
                None
            }
            StmtKind::Import { names } => self.import(&names, span),
            StmtKind::ImportFrom { module, names } => self.importfrom(module, &names, span),
            StmtKind::Global { names } | StmtKind::Nonlocal { names } => {
                for name in names {
                    if self.bindings.get_varid(&name) == -1 {
                        self.errors.push(SemaError::NameError { name, span });
                    }
                }
                None
            }
            StmtKind::Expr { value } => self.exec_expr(value),
            StmtKind::Pass => Some(TypeExpr::none()),
            StmtKind::Break | StmtKind::Continue => None,
            StmtKind::Match { subject, cases } => self.matchstmt(subject, &cases),

            // VM-only nodes never reach the analyser on the way down; the
            // condition of a lowered jump is still typed when revisited.
            StmtKind::CondJump { test, .. } => self.exec_expr(test),
            StmtKind::IterJump { .. }
            | StmtKind::IterEnd { .. }
            | StmtKind::Jump { .. }
            | StmtKind::NativeFunction { .. } => None,
        }
    }

    /// Visit a body and harvest the types that can leave the enclosing
    /// function through a `return`.
    fn exec_body(&mut self, body: &[StmtId]) -> Vec<TypeExpr> {
        let mut types = Vec::new();
        for &stmt in body {
            let on_return_path = matches!(
                self.ast.stmt(stmt).kind,
                StmtKind::Return { .. }
                    | StmtKind::If { .. }
                    | StmtKind::While { .. }
                    | StmtKind::For { .. }
                    | StmtKind::With { .. }
                    | StmtKind::Try { .. }
                    | StmtKind::Match { .. }
            );
            let ty = self.exec_stmt(stmt);
            if on_return_path {
                if let Some(ty) = ty {
                    types.push(ty);
                }
            }
        }
        types
    }

    fn functiondef(&mut self, id: StmtId, def: FunctionDef, span: Span) -> Option<TypeExpr> {
        // sema already ran on this function
        if let Some(cached) = def.ty {
            log::debug!("cached type {}", cached);
            return Some(cached);
        }

        let fun_varid = self.bind_definition(&def.name, id, None);

        let enclosing_class = self
            .nested
            .last()
            .copied()
            .and_then(|enclosing| self.class_name(enclosing));

        self.nested.push(id);
        let scope_start = self.bindings.enter_scope();

        let arg_types = self.add_arguments(&def.args, enclosing_class.as_deref());

        // recursive calls inside the body resolve against the declared
        // signature until the deduced one replaces it
        let provisional = TypeExpr::Arrow {
            args: arg_types.clone(),
            returns: Box::new(def.returns.clone().unwrap_or(TypeExpr::Unknown)),
        };
        self.bindings.set_type(fun_varid, provisional);

        let effective = {
            let types = self.exec_body(&def.body);
            Self::oneof(types)
        };

        self.bindings.exit_scope();
        self.nested.pop();

        if let (Some(declared), Some(effective)) = (&def.returns, &effective) {
            // Annotated type takes precedence, but both must agree.
            self.typecheck(Some(declared), Some(effective), span);
        }

        let returns = def
            .returns
            .clone()
            .or(effective)
            .unwrap_or_else(TypeExpr::none);
        let arrow = TypeExpr::Arrow {
            args: arg_types,
            returns: Box::new(returns),
        };

        self.bindings.set_type(fun_varid, arrow.clone());
        if let StmtKind::FunctionDef(def) = &mut self.ast.stmt_mut(id).kind {
            def.ty = Some(arrow.clone());
            def.scope_start = Some(scope_start);
        }

        Some(arrow)
    }

    /// Bind the parameters, defaults back-filling missing annotations and
    /// the first parameter of a method taking the class type.
    fn add_arguments(&mut self, args: &Arguments, class_name: Option<&str>) -> Vec<TypeExpr> {
        let n = args.args.len();
        let mut arg_types = Vec::with_capacity(n);

        for (i, arg) in args.args.iter().enumerate() {
            let d = args.defaults.len() as i64 - (n - i) as i64;
            let default_t = if d >= 0 {
                self.exec_expr(args.defaults[d as usize])
            } else {
                None
            };

            let mut ty = arg.annotation.clone();
            if ty.is_some() && default_t.is_some() {
                self.typecheck(ty.as_ref(), default_t.as_ref(), arg.span);
            }
            if ty.is_none() {
                ty = default_t;
            }
            if i == 0 {
                if let Some(class_name) = class_name {
                    ty = Some(TypeExpr::Class(class_name.to_string()));
                }
            }

            self.bindings.add(arg.name.clone(), None, ty.clone());
            arg_types.push(ty.unwrap_or(TypeExpr::Unknown));
        }

        arg_types
    }

    fn classdef(&mut self, id: StmtId, def: ClassDef, span: Span) -> Option<TypeExpr> {
        self.bind_definition(&def.name, id, Some(TypeExpr::Type));
        let class_t = TypeExpr::Class(def.name.clone());
        self.nested.push(id);

        // First pass: record direct attributes and find __init__.
        let mut ctor = None;
        let mut methods = Vec::new();
        for &stmt in &def.body {
            let kind = self.ast.stmt(stmt).kind.clone();
            match kind {
                StmtKind::FunctionDef(fun) => {
                    self.insert_class_attr(id, &fun.name, stmt, fun.ty.clone());
                    if fun.name == "__init__" {
                        log::debug!("found ctor for {}", def.name);
                        ctor = Some(stmt);
                    } else {
                        methods.push(stmt);
                    }
                }
                StmtKind::Assign { targets, value } => {
                    let target = targets[0];
                    if let ExprKind::Name { id: attr_name, .. } = self.ast.expr(target).kind.clone()
                    {
                        let value_t = self.scoped(|this| this.exec_expr(value));
                        self.insert_class_attr(id, &attr_name, stmt, value_t);
                    }
                }
                StmtKind::AnnAssign {
                    target,
                    annotation,
                    value,
                } => {
                    if let ExprKind::Name { id: attr_name, .. } = self.ast.expr(target).kind.clone()
                    {
                        let value_t =
                            value.and_then(|v| self.scoped(|this| this.exec_expr(v)));
                        if annotation.is_some() && value_t.is_some() {
                            self.typecheck(annotation.as_ref(), value_t.as_ref(), span);
                        }
                        self.insert_class_attr(id, &attr_name, stmt, annotation.or(value_t));
                    }
                }
                _ => {
                    log::debug!("unhandled struct member");
                }
            }
        }

        // Second pass: mine `self.x = ...` out of the constructor, then
        // analyse it and pin its arrow to the class.
        if let Some(ctor_id) = ctor {
            self.record_ctor_attributes(id, ctor_id, &def.name);
            let ctor_t = self.scoped(|this| this.exec_stmt(ctor_id));
            if let Some(TypeExpr::Arrow { mut args, .. }) = ctor_t {
                if !args.is_empty() {
                    args[0] = class_t.clone();
                }
                let fixed = TypeExpr::Arrow {
                    args,
                    returns: Box::new(class_t.clone()),
                };
                if let StmtKind::FunctionDef(fun) = &mut self.ast.stmt_mut(ctor_id).kind {
                    fun.ty = Some(fixed.clone());
                }
                self.insert_class_attr(id, "__init__", ctor_id, Some(fixed));
            }
        }

        // Remaining methods; `self` resolves through the nested stack.
        for method in methods {
            let method_t = self.scoped(|this| this.exec_stmt(method));
            if let Some(arrow @ TypeExpr::Arrow { .. }) = method_t {
                let name = match &self.ast.stmt(method).kind {
                    StmtKind::FunctionDef(fun) => fun.name.clone(),
                    _ => continue,
                };
                self.insert_class_attr(id, &name, method, Some(arrow));
            }
        }

        self.nested.pop();
        Some(TypeExpr::Type)
    }

    fn record_ctor_attributes(&mut self, class_id: StmtId, ctor_id: StmtId, class_name: &str) {
        let ctor = match self.ast.stmt(ctor_id).kind.clone() {
            StmtKind::FunctionDef(fun) => fun,
            _ => return,
        };
        if ctor.args.args.is_empty() {
            log::warn!("__init__ without self");
            return;
        }
        let self_name = ctor.args.args[0].name.clone();

        self.scoped(|this| {
            // arguments must be in scope so attribute values can be typed
            this.add_arguments(&ctor.args, Some(class_name));

            for &stmt in &ctor.body {
                let (attr_expr, value, annotation) = match this.ast.stmt(stmt).kind.clone() {
                    StmtKind::Assign { targets, value } => (targets[0], Some(value), None),
                    StmtKind::AnnAssign {
                        target,
                        annotation,
                        value,
                    } => (target, value, annotation),
                    _ => continue,
                };

                let ExprKind::Attribute {
                    value: base, attr, ..
                } = this.ast.expr(attr_expr).kind.clone()
                else {
                    continue;
                };
                let ExprKind::Name { id: base_name, .. } = this.ast.expr(base).kind.clone() else {
                    continue;
                };
                if base_name != self_name {
                    continue;
                }

                let ty = annotation.or_else(|| value.and_then(|v| this.exec_expr(v)));
                this.insert_class_attr(class_id, &attr, stmt, ty);
            }
        });
    }

    fn assign(&mut self, targets: &[ExprId], value: ExprId, span: Span) -> Option<TypeExpr> {
        let value_t = self.exec_expr(value);

        if targets.len() == 1 {
            let target = targets[0];
            match self.ast.expr(target).kind.clone() {
                ExprKind::Name { .. } => {
                    self.add_name(target, None, value_t.clone());
                }
                ExprKind::Attribute {
                    value: base, attr, ..
                } => {
                    let target_t = self.attribute_assign(base, &attr, value_t.clone(), span);
                    self.typecheck(target_t.as_ref(), value_t.as_ref(), span);
                }
                ExprKind::TupleExpr { elts, .. } | ExprKind::ListExpr { elts, .. } => {
                    match &value_t {
                        Some(TypeExpr::Tuple(types)) if types.len() == elts.len() => {
                            for (elt, ty) in elts.iter().zip(types.clone()) {
                                self.add_name(*elt, None, Some(ty));
                            }
                        }
                        _ => {
                            for elt in elts {
                                self.add_name(elt, None, Some(TypeExpr::Unknown));
                            }
                        }
                    }
                }
                ExprKind::Subscript { .. } => {
                    self.exec_expr(target);
                }
                other => {
                    log::warn!("assignment to an unsupported expression {:?}", other);
                }
            }
        } else {
            for &target in targets {
                self.add_name(target, None, value_t.clone());
            }
        }

        value_t
    }

    fn augassign(
        &mut self,
        target: ExprId,
        _op: BinaryOperator,
        value: ExprId,
        span: Span,
    ) -> Option<TypeExpr> {
        // The target must already be bound; reading and writing the same
        // slot keeps the varid stable.
        let expected_t = match self.ast.expr(target).kind.clone() {
            ExprKind::Name { id: name, .. } => {
                let varid = self.bindings.get_varid(&name);
                if varid == -1 {
                    self.errors.push(SemaError::NameError { name, span });
                    None
                } else {
                    if let ExprKind::Name { varid: v, .. } = &mut self.ast.expr_mut(target).kind {
                        *v = varid;
                    }
                    self.bindings.get_type(varid)
                }
            }
            ExprKind::Attribute {
                value: base, attr, ..
            } => self.attribute(base, &attr, span),
            _ => {
                self.exec_expr(target);
                None
            }
        };

        let value_t = self.exec_expr(value);
        self.typecheck(expected_t.as_ref(), value_t.as_ref(), span);
        value_t
    }

    /// Annotation takes priority over the deduced type; that lets the
    /// annotation double as a debugging probe.
    fn annassign(
        &mut self,
        target: ExprId,
        annotation: Option<TypeExpr>,
        value: Option<ExprId>,
        span: Span,
    ) -> Option<TypeExpr> {
        let value_t = value.and_then(|v| self.exec_expr(v));

        if annotation.is_some() && value_t.is_some() {
            self.typecheck(annotation.as_ref(), value_t.as_ref(), span);
        }

        let bound_t = annotation.clone().or_else(|| value_t.clone());

        match self.ast.expr(target).kind.clone() {
            ExprKind::Name { .. } => {
                self.add_name(target, None, bound_t.clone());
            }
            ExprKind::Attribute {
                value: base, attr, ..
            } => {
                let attr_t = self.attribute_assign(base, &attr, bound_t.clone(), span);
                self.typecheck(attr_t.as_ref(), bound_t.as_ref(), span);
            }
            other => {
                log::warn!("annotated assignment to {:?}", other);
            }
        }

        bound_t
    }

    fn forstmt(
        &mut self,
        target: ExprId,
        iter: ExprId,
        body: &[StmtId],
        orelse: &[StmtId],
    ) -> Option<TypeExpr> {
        let iter_t = self.exec_expr(iter);

        // element type flows into the loop target
        let elem_t = match &iter_t {
            Some(TypeExpr::Array(elem)) | Some(TypeExpr::Set(elem)) => Some((**elem).clone()),
            Some(TypeExpr::Dict { key, .. }) => Some((**key).clone()),
            Some(TypeExpr::Builtin(name)) if name == "Str" => Some(TypeExpr::str()),
            _ => Some(TypeExpr::Unknown),
        };

        match self.ast.expr(target).kind.clone() {
            ExprKind::TupleExpr { elts, .. } => {
                for elt in elts {
                    self.add_name(elt, None, Some(TypeExpr::Unknown));
                }
            }
            _ => {
                self.add_name(target, None, elem_t);
            }
        }

        let types = self.exec_body(body);
        self.exec_body(orelse);
        Self::oneof(types)
    }

    fn with(&mut self, items: &[WithItem], body: &[StmtId]) -> Option<TypeExpr> {
        for item in items {
            let context_t = self.exec_expr(item.context_expr);
            if let Some(vars) = item.optional_vars {
                if !self.add_name(vars, None, context_t) {
                    self.exec_expr(vars);
                }
            }
        }
        let types = self.exec_body(body);
        Self::oneof(types)
    }

    fn trystmt(
        &mut self,
        body: &[StmtId],
        handlers: &[ExceptHandler],
        orelse: &[StmtId],
        finalbody: &[StmtId],
    ) -> Option<TypeExpr> {
        let types = self.exec_body(body);
        for handler in handlers {
            self.scoped(|this| {
                if let Some(typ) = handler.typ {
                    this.exec_expr(typ);
                }
                if let Some(ref name) = handler.name {
                    this.bindings.add(name.clone(), None, None);
                }
                this.exec_body(&handler.body);
            });
        }
        self.exec_body(orelse);
        self.exec_body(finalbody);
        Self::oneof(types)
    }

    fn matchstmt(&mut self, subject: ExprId, cases: &[MatchCase]) -> Option<TypeExpr> {
        self.exec_expr(subject);

        let mut types = Vec::new();
        for case in cases {
            let case_t = self.scoped(|this| {
                this.exec_pattern(case.pattern);
                if let Some(guard) = case.guard {
                    this.exec_expr(guard);
                }
                this.exec_body(&case.body)
            });
            types.extend(case_t);
        }
        Self::oneof(types)
    }

    fn exec_pattern(&mut self, id: PatId) {
        let kind = self.ast.pattern(id).kind.clone();
        match kind {
            PatternKind::MatchValue(value) => {
                self.exec_expr(value);
            }
            PatternKind::MatchSingleton(_) => {}
            PatternKind::MatchSequence(patterns) | PatternKind::MatchOr(patterns) => {
                for pattern in patterns {
                    self.exec_pattern(pattern);
                }
            }
            PatternKind::MatchMapping { patterns, rest, .. } => {
                for pattern in patterns {
                    self.exec_pattern(pattern);
                }
                if let Some(rest) = rest {
                    self.bindings.add(rest, None, None);
                }
            }
            PatternKind::MatchClass {
                cls,
                patterns,
                kwd_patterns,
                ..
            } => {
                self.exec_expr(cls);
                for pattern in patterns.into_iter().chain(kwd_patterns) {
                    self.exec_pattern(pattern);
                }
            }
            PatternKind::MatchStar(name) => {
                if let Some(name) = name {
                    self.bindings.add(name, None, None);
                }
            }
            PatternKind::MatchAs { pattern, name } => {
                if let Some(name) = name {
                    self.bindings.add(name, None, None);
                }
                if let Some(pattern) = pattern {
                    self.exec_pattern(pattern);
                }
            }
        }
    }

    // ── expressions ────────────────────────────────────────────────────

    pub fn exec_expr(&mut self, id: ExprId) -> Option<TypeExpr> {
        let span = self.ast.expr(id).span;
        let kind = self.ast.expr(id).kind.clone();

        match kind {
            ExprKind::BoolOp { op, values } => self.boolop(op, &values, span),
            ExprKind::NamedExpr { target, value } => {
                let value_t = self.exec_expr(value);
                self.add_name(target, None, value_t.clone());
                value_t
            }
            ExprKind::BinOp { left, right, .. } => {
                let lhs_t = self.exec_expr(left);
                let rhs_t = self.exec_expr(right);
                self.binop_type(lhs_t, rhs_t, span)
            }
            ExprKind::UnaryOp { operand, .. } => self.exec_expr(operand),
            ExprKind::Lambda { args, body } => self.scoped(|this| {
                let mut arg_types = Vec::with_capacity(args.len());
                for arg in &args {
                    this.bindings.add(arg.clone(), None, None);
                    arg_types.push(TypeExpr::Unknown);
                }
                let body_t = this.exec_expr(body);
                Some(TypeExpr::Arrow {
                    args: arg_types,
                    returns: Box::new(body_t.unwrap_or(TypeExpr::Unknown)),
                })
            }),
            ExprKind::IfExp { test, body, orelse } => {
                let test_t = self.exec_expr(test);
                self.typecheck(test_t.as_ref(), Some(&TypeExpr::bool()), span);
                let body_t = self.exec_expr(body);
                let orelse_t = self.exec_expr(orelse);
                self.typecheck(body_t.as_ref(), orelse_t.as_ref(), span);
                body_t
            }
            ExprKind::DictExpr { keys, values } => {
                let mut key_t = None;
                let mut val_t = None;
                for (key, value) in keys.iter().zip(&values) {
                    let kt = self.exec_expr(*key);
                    let vt = self.exec_expr(*value);
                    if key_t.is_some() {
                        self.typecheck(key_t.as_ref(), kt.as_ref(), span);
                        self.typecheck(val_t.as_ref(), vt.as_ref(), span);
                    } else {
                        key_t = kt;
                        val_t = vt;
                    }
                }
                Some(TypeExpr::Dict {
                    key: Box::new(key_t.unwrap_or(TypeExpr::Unknown)),
                    value: Box::new(val_t.unwrap_or(TypeExpr::Unknown)),
                })
            }
            ExprKind::SetExpr { elts } => {
                let elem_t = self.unify_elements(&elts, span);
                Some(TypeExpr::Set(Box::new(elem_t)))
            }
            ExprKind::ListExpr { elts, .. } => {
                let elem_t = self.unify_elements(&elts, span);
                Some(TypeExpr::Array(Box::new(elem_t)))
            }
            ExprKind::TupleExpr { elts, .. } => {
                let mut types = Vec::with_capacity(elts.len());
                for elt in elts {
                    types.push(self.exec_expr(elt).unwrap_or(TypeExpr::Unknown));
                }
                Some(TypeExpr::Tuple(types))
            }
            ExprKind::ListComp { elt, generators } | ExprKind::GeneratorExp { elt, generators } => {
                self.scoped(|this| {
                    this.exec_generators(&generators);
                    let elem_t = this.exec_expr(elt).unwrap_or(TypeExpr::Unknown);
                    Some(TypeExpr::Array(Box::new(elem_t)))
                })
            }
            ExprKind::SetComp { elt, generators } => self.scoped(|this| {
                this.exec_generators(&generators);
                let elem_t = this.exec_expr(elt).unwrap_or(TypeExpr::Unknown);
                Some(TypeExpr::Set(Box::new(elem_t)))
            }),
            ExprKind::DictComp {
                key,
                value,
                generators,
            } => self.scoped(|this| {
                this.exec_generators(&generators);
                let key_t = this.exec_expr(key).unwrap_or(TypeExpr::Unknown);
                let val_t = this.exec_expr(value).unwrap_or(TypeExpr::Unknown);
                Some(TypeExpr::Dict {
                    key: Box::new(key_t),
                    value: Box::new(val_t),
                })
            }),
            ExprKind::Await { value } => self.exec_expr(value),
            ExprKind::Yield { value } => value.and_then(|v| self.exec_expr(v)),
            ExprKind::YieldFrom { value } => self.exec_expr(value),
            ExprKind::Compare {
                left, comparators, ..
            } => {
                self.exec_expr(left);
                for comparator in comparators {
                    self.exec_expr(comparator);
                }
                Some(TypeExpr::bool())
            }
            ExprKind::Call {
                func,
                args,
                keywords,
            } => self.call(func, &args, &keywords, span),
            ExprKind::JoinedStr { values } => {
                for value in values {
                    self.exec_expr(value);
                }
                Some(TypeExpr::str())
            }
            ExprKind::FormattedValue { value } => {
                self.exec_expr(value);
                Some(TypeExpr::str())
            }
            ExprKind::Constant(value) => Some(constant_type(&value)),
            ExprKind::Attribute {
                value, attr, ctx, ..
            } => {
                if ctx == ExprContext::Store {
                    self.attribute_assign(value, &attr, None, span)
                } else {
                    self.attribute(value, &attr, span)
                }
            }
            ExprKind::Subscript { value, slice, .. } => self.subscript(value, slice),
            ExprKind::Starred { value, .. } => {
                self.exec_expr(value);
                None
            }
            ExprKind::Name { id: name, ctx, .. } => self.name(id, &name, ctx, span),
            ExprKind::Slice { lower, upper, step } => {
                for part in [lower, upper, step].into_iter().flatten() {
                    self.exec_expr(part);
                }
                None
            }
        }
    }

    /// Operands must agree, except that Int quietly widens to Float when
    /// the two numeric types mix.
    fn binop_type(
        &mut self,
        lhs_t: Option<TypeExpr>,
        rhs_t: Option<TypeExpr>,
        span: Span,
    ) -> Option<TypeExpr> {
        fn is_numeric(ty: &TypeExpr) -> bool {
            matches!(ty, TypeExpr::Builtin(name) if name == "Int" || name == "Float")
        }

        if let (Some(lhs), Some(rhs)) = (&lhs_t, &rhs_t) {
            if is_numeric(lhs) && is_numeric(rhs) {
                if types::equal(lhs, &TypeExpr::float()) || types::equal(rhs, &TypeExpr::float()) {
                    return Some(TypeExpr::float());
                }
                return Some(TypeExpr::int());
            }
        }

        self.typecheck(lhs_t.as_ref(), rhs_t.as_ref(), span);
        lhs_t
    }

    fn unify_elements(&mut self, elts: &[ExprId], span: Span) -> TypeExpr {
        let mut elem_t = None;
        for &elt in elts {
            let ty = self.exec_expr(elt);
            if elem_t.is_some() {
                self.typecheck(elem_t.as_ref(), ty.as_ref(), span);
            } else {
                elem_t = ty;
            }
        }
        elem_t.unwrap_or(TypeExpr::Unknown)
    }

    fn exec_generators(&mut self, generators: &[Comprehension]) {
        for gen in generators {
            let iter_t = self.exec_expr(gen.iter);
            let elem_t = match &iter_t {
                Some(TypeExpr::Array(elem)) | Some(TypeExpr::Set(elem)) => Some((**elem).clone()),
                Some(TypeExpr::Dict { key, .. }) => Some((**key).clone()),
                _ => Some(TypeExpr::Unknown),
            };
            match self.ast.expr(gen.target).kind.clone() {
                ExprKind::TupleExpr { elts, .. } => {
                    for elt in elts {
                        self.add_name(elt, None, Some(TypeExpr::Unknown));
                    }
                }
                _ => {
                    self.add_name(gen.target, None, elem_t);
                }
            }
            for &guard in &gen.ifs {
                self.exec_expr(guard);
            }
        }
    }

    fn name(
        &mut self,
        expr: ExprId,
        name: &str,
        ctx: ExprContext,
        span: Span,
    ) -> Option<TypeExpr> {
        match ctx {
            ExprContext::Store => {
                let varid = self.bind_name(name, None, None);
                if let ExprKind::Name { varid: v, .. } = &mut self.ast.expr_mut(expr).kind {
                    *v = varid as i32;
                }
                log::debug!("storing value for {} ({})", name, varid);
                None
            }
            ExprContext::Load | ExprContext::Del => {
                // both require the variable to be defined first
                let varid = self.bindings.get_varid(name);
                if let ExprKind::Name { varid: v, .. } = &mut self.ast.expr_mut(expr).kind {
                    *v = varid;
                }
                if varid == -1 {
                    log::debug!("value {} not found", name);
                    self.errors.push(SemaError::NameError {
                        name: name.to_string(),
                        span,
                    });
                    return None;
                }
                self.bindings.get_type(varid)
            }
        }
    }

    fn boolop(&mut self, op: BoolOperator, values: &[ExprId], span: Span) -> Option<TypeExpr> {
        let bool_t = TypeExpr::bool();
        let (magic, _rmagic) = match op {
            BoolOperator::And => ("__and__", "__rand__"),
            BoolOperator::Or => ("__or__", "__ror__"),
        };
        let op_name = match op {
            BoolOperator::And => "and",
            BoolOperator::Or => "or",
        };

        let mut lhs_t = self.exec_expr(values[0]);
        for &value in &values[1..] {
            let rhs_t = self.exec_expr(value);
            let Some(lhs) = lhs_t.clone() else {
                lhs_t = rhs_t;
                continue;
            };
            if types::equal(&lhs, &bool_t) {
                lhs_t = rhs_t;
                continue;
            }

            // Not a bool: the class has to implement the boolean magic
            // method, and the call must typecheck like any other call.
            let Some(class_id) = self.get_class(&lhs) else {
                self.errors.push(SemaError::UnsupportedOperand {
                    op: op_name.to_string(),
                    lhs: lhs.to_string(),
                    rhs: rhs_t.map(|t| t.to_string()).unwrap_or_default(),
                    span,
                });
                return None;
            };

            let method_t = match &self.ast.stmt(class_id).kind {
                StmtKind::ClassDef(def) => {
                    def.get_attribute(magic).and_then(|attr| attr.ty.clone())
                }
                _ => None,
            };
            let Some(TypeExpr::Arrow { returns, .. }) = method_t.clone() else {
                self.errors.push(SemaError::UnsupportedOperand {
                    op: op_name.to_string(),
                    lhs: lhs.to_string(),
                    rhs: rhs_t.map(|t| t.to_string()).unwrap_or_default(),
                    span,
                });
                return None;
            };

            let got = TypeExpr::Arrow {
                args: vec![lhs.clone(), rhs_t.unwrap_or(TypeExpr::Unknown)],
                returns: returns.clone(),
            };
            self.typecheck(method_t.as_ref(), Some(&got), span);
            lhs_t = Some(*returns);
        }

        Some(bool_t)
    }

    fn call(
        &mut self,
        func: ExprId,
        args: &[ExprId],
        keywords: &[crate::ast::Keyword],
        span: Span,
    ) -> Option<TypeExpr> {
        let func_t = self.exec_expr(func);
        let (arrow, ctor_class) = self.get_arrow(func, func_t.as_ref(), span);

        if arrow.is_none() {
            let printed = crate::ast::pretty::pretty_expr(self.ast, func);
            self.errors.push(SemaError::NotCallable {
                what: printed,
                span,
            });
        }

        // Build the arrow this call site provides.
        let mut got_args = Vec::new();
        if let Some(class_name) = &ctor_class {
            got_args.push(TypeExpr::Class(class_name.clone()));
        }
        for &arg in args {
            got_args.push(self.exec_expr(arg).unwrap_or(TypeExpr::Unknown));
        }
        for keyword in keywords {
            self.exec_expr(keyword.value);
        }

        if let Some(TypeExpr::Arrow { args: _, returns }) = &arrow {
            let got = TypeExpr::Arrow {
                args: got_args,
                returns: returns.clone(),
            };
            self.typecheck(arrow.as_ref(), Some(&got), span);
            return Some((**returns).clone());
        }

        None
    }

    /// Resolve the callable's arrow. A class reference (its type is
    /// `Type`) calls the constructor: `__init__` when defined, otherwise a
    /// synthesised `(Cls) -> Cls` default.
    fn get_arrow(
        &mut self,
        func: ExprId,
        func_t: Option<&TypeExpr>,
        _span: Span,
    ) -> (Option<TypeExpr>, Option<String>) {
        match func_t {
            Some(arrow @ TypeExpr::Arrow { .. }) => (Some(arrow.clone()), None),
            Some(TypeExpr::Type) => {
                let class_id = match self.ast.expr(func).kind.clone() {
                    ExprKind::Name { varid, .. } => match self.bindings.get_value(varid) {
                        Some(BindingValue::Stmt(stmt)) => Some(*stmt),
                        _ => None,
                    },
                    _ => None,
                };
                let Some(class_id) = class_id else {
                    return (None, None);
                };
                let Some(class_name) = self.class_name(class_id) else {
                    return (None, None);
                };

                let init_t = match &self.ast.stmt(class_id).kind {
                    StmtKind::ClassDef(def) => def
                        .get_attribute("__init__")
                        .and_then(|attr| attr.ty.clone()),
                    _ => None,
                };

                match init_t {
                    Some(arrow @ TypeExpr::Arrow { .. }) => {
                        log::debug!("custom ctor {}", arrow);
                        (Some(arrow), Some(class_name))
                    }
                    _ => {
                        log::debug!("default ctor for {}", class_name);
                        let class_t = TypeExpr::Class(class_name.clone());
                        (
                            Some(TypeExpr::arrow(vec![class_t.clone()], class_t)),
                            Some(class_name),
                        )
                    }
                }
            }
            _ => (None, None),
        }
    }

    fn attribute(&mut self, value: ExprId, attr: &str, span: Span) -> Option<TypeExpr> {
        let value_t = self.exec_expr(value);

        // module member access resolves through the imported bindings
        if let Some(TypeExpr::Module(module_name)) = &value_t {
            let module_idx = match self.ast.expr(value).kind.clone() {
                ExprKind::Name { varid, .. } => match self.bindings.get_value(varid) {
                    Some(BindingValue::Module(idx)) => Some(*idx),
                    _ => None,
                },
                _ => None,
            };
            let member_t = module_idx.and_then(|idx| {
                self.modules[idx]
                    .bindings
                    .lookup(attr)
                    .and_then(|(_, entry)| entry.ty.clone())
            });
            if member_t.is_none() {
                self.errors.push(SemaError::AttributeError {
                    class_name: module_name.clone(),
                    attr: attr.to_string(),
                    span,
                });
            }
            return member_t;
        }

        let Some(class_id) = value_t.as_ref().and_then(|t| self.get_class(t)) else {
            let printed = crate::ast::pretty::pretty_expr(self.ast, value);
            self.errors.push(SemaError::NameError {
                name: printed,
                span,
            });
            return None;
        };

        let (class_name, attr_t, found) = match &self.ast.stmt(class_id).kind {
            StmtKind::ClassDef(def) => match def.get_attribute(attr) {
                Some(slot) => (def.name.clone(), slot.ty.clone(), true),
                None => (def.name.clone(), None, false),
            },
            _ => return None,
        };

        if !found {
            self.errors.push(SemaError::AttributeError {
                class_name,
                attr: attr.to_string(),
                span,
            });
        }

        attr_t
    }

    /// Attribute in assignment position: a still-untyped slot takes the
    /// expected type.
    fn attribute_assign(
        &mut self,
        value: ExprId,
        attr: &str,
        expected: Option<TypeExpr>,
        span: Span,
    ) -> Option<TypeExpr> {
        let value_t = self.exec_expr(value);

        let Some(class_id) = value_t.as_ref().and_then(|t| self.get_class(t)) else {
            let printed = crate::ast::pretty::pretty_expr(self.ast, value);
            self.errors.push(SemaError::NameError {
                name: printed,
                span,
            });
            return None;
        };

        let (class_name, slot) = match &self.ast.stmt(class_id).kind {
            StmtKind::ClassDef(def) => (
                def.name.clone(),
                def.get_attribute(attr).map(|a| a.ty.clone()),
            ),
            _ => return None,
        };

        match slot {
            None => {
                self.errors.push(SemaError::AttributeError {
                    class_name,
                    attr: attr.to_string(),
                    span,
                });
                None
            }
            Some(Some(ty)) => Some(ty),
            Some(None) => {
                // install the deduced type into the attribute slot
                if let StmtKind::ClassDef(def) = &mut self.ast.stmt_mut(class_id).kind {
                    if let Some(slot) = def.attrs.iter_mut().find(|a| a.name == attr) {
                        slot.ty = expected.clone();
                    }
                }
                expected
            }
        }
    }

    fn subscript(&mut self, value: ExprId, slice: ExprId) -> Option<TypeExpr> {
        let value_t = self.exec_expr(value);
        self.exec_expr(slice);

        match value_t {
            Some(TypeExpr::Array(elem)) => Some(*elem),
            Some(TypeExpr::Dict { value, .. }) => Some(*value),
            Some(TypeExpr::Builtin(name)) if name == "Str" => Some(TypeExpr::str()),
            Some(TypeExpr::Tuple(types)) => {
                if let ExprKind::Constant(ConstantValue::Int(i)) = self.ast.expr(slice).kind {
                    types.get(i as usize).cloned()
                } else {
                    Some(TypeExpr::Unknown)
                }
            }
            _ => None,
        }
    }
}

fn constant_type(value: &ConstantValue) -> TypeExpr {
    match value {
        ConstantValue::Int(_) => TypeExpr::int(),
        ConstantValue::Float(_) => TypeExpr::float(),
        ConstantValue::Str(_) => TypeExpr::str(),
        ConstantValue::Bool(_) => TypeExpr::bool(),
        ConstantValue::None => TypeExpr::none(),
    }
}

/// Arrow a definition promises before its body is analysed: annotated
/// argument types with unknowns where annotations are missing.
fn declared_signature(def: &FunctionDef) -> TypeExpr {
    let args = def
        .args
        .args
        .iter()
        .map(|arg| arg.annotation.clone().unwrap_or(TypeExpr::Unknown))
        .collect();
    TypeExpr::Arrow {
        args,
        returns: Box::new(def.returns.clone().unwrap_or(TypeExpr::Unknown)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::StringBuffer;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    struct Analysed {
        module: Module,
        body: Vec<StmtId>,
        bindings: Bindings,
        errors: Vec<SemaError>,
    }

    fn analyse(source: &str) -> Analysed {
        let mut module = Module::new();
        let lexer = Lexer::new(Box::new(StringBuffer::new(source)));
        let mut parser = Parser::new(lexer, &mut module);
        let body = parser.parse_module();
        assert!(
            parser.errors.is_empty(),
            "parse errors: {:?}",
            parser.errors
        );

        let mut sema = SemanticAnalyser::new(&mut module.ast);
        sema.analyse_module(&body);
        let bindings = std::mem::take(&mut sema.bindings);
        let errors = std::mem::take(&mut sema.errors);
        drop(sema);

        Analysed {
            module,
            body,
            bindings,
            errors,
        }
    }

    #[test]
    fn function_arrow_is_deduced_from_annotations() {
        let analysed = analyse(
            "def mid(a: Float, b: Float) -> Float:\n    return (a + b) / 2\n",
        );
        assert!(analysed.errors.is_empty(), "{:?}", analysed.errors);

        let varid = analysed.bindings.get_varid("mid");
        assert!(varid >= 0);
        let arrow = analysed.bindings.get_type(varid).unwrap();
        assert_eq!(arrow.to_string(), "(Float, Float) -> Float");
    }

    #[test]
    fn struct_attributes_are_recorded() {
        let analysed = analyse("struct Point:\n    x: Float\n    y: Float\n");
        assert!(analysed.errors.is_empty(), "{:?}", analysed.errors);

        let point = analysed.module.find("Point").unwrap();
        match &analysed.module.ast.stmt(point).kind {
            StmtKind::ClassDef(def) => {
                let x = def.get_attribute("x").unwrap();
                assert_eq!(x.ty.clone().unwrap(), TypeExpr::float());
            }
            other => panic!("expected a struct, got {:?}", other),
        }
    }

    #[test]
    fn undefined_name_records_exactly_one_name_error() {
        let analysed = analyse("def f() -> Float:\n    return undeclared\n");
        let name_errors: Vec<_> = analysed
            .errors
            .iter()
            .filter(|e| matches!(e, SemaError::NameError { name, .. } if name == "undeclared"))
            .collect();
        assert_eq!(name_errors.len(), 1);
    }

    #[test]
    fn loads_resolve_or_error_after_sema() {
        let analysed = analyse("x = 1.0\ny = x\nz = missing\n");
        // every Load name either has varid >= 0 or a NameError on record
        assert!(analysed
            .errors
            .iter()
            .any(|e| matches!(e, SemaError::NameError { name, .. } if name == "missing")));

        let y_stmt = analysed.body[1];
        if let StmtKind::Assign { value, .. } = analysed.module.ast.stmt(y_stmt).kind.clone() {
            match analysed.module.ast.expr(value).kind {
                ExprKind::Name { varid, .. } => assert!(varid >= 0),
                ref other => panic!("expected a name, got {:?}", other),
            }
        }
    }

    #[test]
    fn builtin_max_resolves_to_the_prelude_arrow() {
        let analysed = analyse("m = max(1.0, 2.0)\n");
        assert!(analysed.errors.is_empty(), "{:?}", analysed.errors);
        let varid = analysed.bindings.get_varid("m");
        assert_eq!(analysed.bindings.get_type(varid), Some(TypeExpr::float()));
    }

    #[test]
    fn binop_operand_mismatch_is_a_type_error() {
        let analysed = analyse("x = 1 + \"two\"\n");
        assert!(analysed
            .errors
            .iter()
            .any(|e| matches!(e, SemaError::TypeError { .. })));
    }

    #[test]
    fn call_arity_mismatch_is_a_type_error() {
        let analysed = analyse(
            "def f(a: Float) -> Float:\n    return a\nx = f(1.0, 2.0)\n",
        );
        assert!(analysed
            .errors
            .iter()
            .any(|e| matches!(e, SemaError::TypeError { .. })));
    }

    #[test]
    fn calling_a_non_callable_is_reported() {
        let analysed = analyse("x = 1\ny = x(2)\n");
        assert!(analysed
            .errors
            .iter()
            .any(|e| matches!(e, SemaError::NotCallable { .. })));
    }

    #[test]
    fn forward_references_between_functions_resolve() {
        let source = "def even(n: Int) -> Bool:\n    return odd(n)\ndef odd(n: Int) -> Bool:\n    return even(n)\n";
        let analysed = analyse(source);
        assert!(analysed
            .errors
            .iter()
            .all(|e| !matches!(e, SemaError::NameError { .. })));
    }

    #[test]
    fn ctor_assignments_install_attribute_types() {
        let source = "struct Vec2:\n    def __init__(self, x: Float) -> None:\n        self.x = x\n";
        let analysed = analyse(source);

        let vec2 = analysed.module.find("Vec2").unwrap();
        match &analysed.module.ast.stmt(vec2).kind {
            StmtKind::ClassDef(def) => {
                let x = def.get_attribute("x").expect("attribute x mined from ctor");
                assert_eq!(x.ty.clone().unwrap(), TypeExpr::float());
            }
            other => panic!("expected a struct, got {:?}", other),
        }
    }

    #[test]
    fn missing_attribute_is_an_attribute_error() {
        let source = "struct Point:\n    x: Float\ndef f(p: Point) -> Float:\n    return p.z\n";
        let analysed = analyse(source);
        assert!(analysed
            .errors
            .iter()
            .any(|e| matches!(e, SemaError::AttributeError { attr, .. } if attr == "z")));
    }

    #[test]
    fn function_locals_do_not_leak() {
        let analysed = analyse("def f(a: Float) -> Float:\n    return a\n");
        assert_eq!(analysed.bindings.get_varid("a"), -1);
    }

    #[test]
    fn scope_start_is_recorded_for_the_executor() {
        let analysed = analyse("def f(a: Float) -> Float:\n    return a\n");
        let f = analysed.module.find("f").unwrap();
        match &analysed.module.ast.stmt(f).kind {
            StmtKind::FunctionDef(def) => {
                assert!(def.scope_start.is_some());
                assert!(def.ty.is_some());
            }
            other => panic!("expected a function, got {:?}", other),
        }
    }

    #[test]
    fn pi_is_preinserted() {
        let analysed = analyse("x = pi\n");
        assert!(analysed.errors.is_empty(), "{:?}", analysed.errors);
        let varid = analysed.bindings.get_varid("x");
        assert_eq!(analysed.bindings.get_type(varid), Some(TypeExpr::float()));
    }

    #[test]
    fn annotation_mismatch_is_reported() {
        let analysed = analyse("x: Int = 1.5\n");
        assert!(analysed
            .errors
            .iter()
            .any(|e| matches!(e, SemaError::TypeError { .. })));
    }

    #[test]
    fn missing_module_is_recorded_not_thrown() {
        let analysed = analyse("import does.not.exist\n");
        assert!(analysed
            .errors
            .iter()
            .any(|e| matches!(e, SemaError::ModuleNotFoundError { .. })));
    }
}
