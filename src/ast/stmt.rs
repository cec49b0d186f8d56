use super::constant::ConstantValue;
use super::expr::Span;
use super::types::TypeExpr;
use super::{ExprId, PatId, StmtId};

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone)]
pub struct Arg {
    pub name: String,
    pub annotation: Option<TypeExpr>,
    pub span: Span,
}

#[derive(Debug, Clone, Default)]
pub struct Arguments {
    pub args: Vec<Arg>,
    /// Default values for the trailing arguments, aligned to the tail of
    /// `args` the way the Python grammar does it.
    pub defaults: Vec<ExprId>,
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub args: Arguments,
    pub body: Vec<StmtId>,
    pub returns: Option<TypeExpr>,
    pub docstring: Option<String>,
    pub is_async: bool,

    /// Arrow cached by the semantic analyser so revisits are idempotent.
    pub ty: Option<TypeExpr>,
    /// First binding slot of this function's parameters, written by the
    /// semantic analyser; the executor derives local stack offsets from it.
    pub scope_start: Option<usize>,
}

impl FunctionDef {
    pub fn new(name: String) -> Self {
        Self {
            name,
            args: Arguments::default(),
            body: Vec::new(),
            returns: None,
            docstring: None,
            is_async: false,
            ty: None,
            scope_start: None,
        }
    }
}

/// An attribute slot of a struct; the type may be installed late, by an
/// assignment inside `__init__`.
#[derive(Debug, Clone)]
pub struct ClassAttr {
    pub name: String,
    pub stmt: StmtId,
    pub ty: Option<TypeExpr>,
}

#[derive(Debug, Clone)]
pub struct ClassDef {
    pub name: String,
    pub body: Vec<StmtId>,
    pub docstring: Option<String>,
    pub attrs: Vec<ClassAttr>,
}

impl ClassDef {
    pub fn new(name: String) -> Self {
        Self {
            name,
            body: Vec::new(),
            docstring: None,
            attrs: Vec::new(),
        }
    }

    pub fn get_attribute(&self, name: &str) -> Option<&ClassAttr> {
        self.attrs.iter().find(|a| a.name == name)
    }

    /// Insert or update an attribute slot; later inserts only fill a type
    /// that is still missing.
    pub fn insert_attribute(&mut self, name: &str, stmt: StmtId, ty: Option<TypeExpr>) {
        if let Some(attr) = self.attrs.iter_mut().find(|a| a.name == name) {
            if attr.ty.is_none() {
                attr.ty = ty;
            }
            return;
        }
        self.attrs.push(ClassAttr {
            name: name.to_string(),
            stmt,
            ty,
        });
    }
}

#[derive(Debug, Clone)]
pub struct ExceptHandler {
    pub typ: Option<ExprId>,
    pub name: Option<String>,
    pub body: Vec<StmtId>,
}

#[derive(Debug, Clone)]
pub struct WithItem {
    pub context_expr: ExprId,
    pub optional_vars: Option<ExprId>,
}

#[derive(Debug, Clone)]
pub struct Alias {
    pub name: String,
    pub asname: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MatchCase {
    pub pattern: PatId,
    pub guard: Option<ExprId>,
    pub body: Vec<StmtId>,
}

#[derive(Debug, Clone)]
pub struct Pattern {
    pub kind: PatternKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum PatternKind {
    MatchValue(ExprId),
    MatchSingleton(ConstantValue),
    MatchSequence(Vec<PatId>),
    MatchMapping {
        keys: Vec<ExprId>,
        patterns: Vec<PatId>,
        rest: Option<String>,
    },
    MatchClass {
        cls: ExprId,
        patterns: Vec<PatId>,
        kwd_attrs: Vec<String>,
        kwd_patterns: Vec<PatId>,
    },
    MatchStar(Option<String>),
    MatchAs {
        pattern: Option<PatId>,
        name: Option<String>,
    },
    MatchOr(Vec<PatId>),
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    FunctionDef(FunctionDef),
    ClassDef(ClassDef),
    Return {
        value: Option<ExprId>,
    },
    Delete {
        targets: Vec<ExprId>,
    },
    Assign {
        targets: Vec<ExprId>,
        value: ExprId,
    },
    AugAssign {
        target: ExprId,
        op: super::expr::BinaryOperator,
        value: ExprId,
    },
    AnnAssign {
        target: ExprId,
        annotation: Option<TypeExpr>,
        value: Option<ExprId>,
    },
    For {
        target: ExprId,
        iter: ExprId,
        body: Vec<StmtId>,
        orelse: Vec<StmtId>,
    },
    While {
        test: ExprId,
        body: Vec<StmtId>,
        orelse: Vec<StmtId>,
    },
    If {
        test: ExprId,
        body: Vec<StmtId>,
        orelse: Vec<StmtId>,
    },
    With {
        items: Vec<WithItem>,
        body: Vec<StmtId>,
    },
    Raise {
        exc: Option<ExprId>,
        cause: Option<ExprId>,
    },
    Try {
        body: Vec<StmtId>,
        handlers: Vec<ExceptHandler>,
        orelse: Vec<StmtId>,
        finalbody: Vec<StmtId>,
    },
    Assert {
        test: ExprId,
        msg: Option<ExprId>,
    },
    Import {
        names: Vec<Alias>,
    },
    ImportFrom {
        module: Option<String>,
        names: Vec<Alias>,
    },
    Global {
        names: Vec<String>,
    },
    Nonlocal {
        names: Vec<String>,
    },
    Expr {
        value: ExprId,
    },
    Pass,
    Break,
    Continue,
    Match {
        subject: ExprId,
        cases: Vec<MatchCase>,
    },

    // VM-only pseudo-statements, produced by the lowering generator.
    /// Unconditional jump to an absolute instruction index.
    Jump {
        destination: usize,
    },
    /// Branch on a test: true goes to `then_jmp`, false to `else_jmp`.
    CondJump {
        test: ExprId,
        then_jmp: usize,
        else_jmp: usize,
    },
    /// For-loop head: store the next element of `iter` into `target` and
    /// fall through to `body_jmp`, or leave the loop to `else_jmp` once
    /// exhausted.
    IterJump {
        target: ExprId,
        iter: ExprId,
        body_jmp: usize,
        else_jmp: usize,
    },
    /// Release the iterator opened by the `IterJump` at `start`. Every
    /// exit path of a for-loop passes through this, `break` included, so
    /// re-entering the loop starts a fresh iteration.
    IterEnd {
        start: usize,
    },
    /// Entry point of a builtin implemented by the interpreter itself.
    NativeFunction {
        name: String,
    },
}
