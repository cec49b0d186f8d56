use super::constant::ConstantValue;
use super::ExprId;

/// Source location for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    pub fn unknown() -> Self {
        Self { line: 0, column: 0 }
    }
}

/// Expression node; children are arena handles.
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprContext {
    Load,
    Store,
    Del,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mult,
    MatMult,
    Div,
    Mod,
    Pow,
    LShift,
    RShift,
    BitOr,
    BitXor,
    BitAnd,
    FloorDiv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOperator {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Invert,
    Not,
    UAdd,
    USub,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOperator {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

#[derive(Debug, Clone)]
pub struct Comprehension {
    pub target: ExprId,
    pub iter: ExprId,
    pub ifs: Vec<ExprId>,
    pub is_async: bool,
}

/// A keyword argument at a call site (`f(x=1)`).
#[derive(Debug, Clone)]
pub struct Keyword {
    pub arg: Option<String>,
    pub value: ExprId,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    BoolOp {
        op: BoolOperator,
        values: Vec<ExprId>,
    },
    NamedExpr {
        target: ExprId,
        value: ExprId,
    },
    BinOp {
        left: ExprId,
        op: BinaryOperator,
        right: ExprId,
    },
    UnaryOp {
        op: UnaryOperator,
        operand: ExprId,
    },
    Lambda {
        args: Vec<String>,
        body: ExprId,
    },
    IfExp {
        test: ExprId,
        body: ExprId,
        orelse: ExprId,
    },
    DictExpr {
        keys: Vec<ExprId>,
        values: Vec<ExprId>,
    },
    SetExpr {
        elts: Vec<ExprId>,
    },
    ListComp {
        elt: ExprId,
        generators: Vec<Comprehension>,
    },
    SetComp {
        elt: ExprId,
        generators: Vec<Comprehension>,
    },
    DictComp {
        key: ExprId,
        value: ExprId,
        generators: Vec<Comprehension>,
    },
    GeneratorExp {
        elt: ExprId,
        generators: Vec<Comprehension>,
    },
    Await {
        value: ExprId,
    },
    Yield {
        value: Option<ExprId>,
    },
    YieldFrom {
        value: ExprId,
    },

    /// `a < b <= c` keeps the whole chain so chained and parenthesised
    /// comparisons stay distinguishable.
    Compare {
        left: ExprId,
        ops: Vec<CmpOperator>,
        comparators: Vec<ExprId>,
    },
    Call {
        func: ExprId,
        args: Vec<ExprId>,
        keywords: Vec<Keyword>,
    },
    JoinedStr {
        values: Vec<ExprId>,
    },
    FormattedValue {
        value: ExprId,
    },
    Constant(ConstantValue),

    Attribute {
        value: ExprId,
        attr: String,
        ctx: ExprContext,
    },
    Subscript {
        value: ExprId,
        slice: ExprId,
        ctx: ExprContext,
    },
    Starred {
        value: ExprId,
        ctx: ExprContext,
    },

    /// A symbolic reference. `varid` is written by the semantic analyser:
    /// the absolute binding slot, `-1` while unresolved.
    Name {
        id: String,
        ctx: ExprContext,
        varid: i32,
    },

    ListExpr {
        elts: Vec<ExprId>,
        ctx: ExprContext,
    },
    TupleExpr {
        elts: Vec<ExprId>,
        ctx: ExprContext,
    },
    Slice {
        lower: Option<ExprId>,
        upper: Option<ExprId>,
        step: Option<ExprId>,
    },
}

impl ExprKind {
    pub fn name(id: impl Into<String>, ctx: ExprContext) -> Self {
        ExprKind::Name {
            id: id.into(),
            ctx,
            varid: -1,
        }
    }

    /// SSA-form leaves: operands that never need hoisting.
    pub fn is_atom(&self) -> bool {
        matches!(self, ExprKind::Name { .. } | ExprKind::Constant(_))
    }
}
