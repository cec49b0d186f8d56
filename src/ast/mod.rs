pub mod constant;
pub mod expr;
pub mod pretty;
pub mod stmt;
pub mod types;

pub use constant::ConstantValue;
pub use expr::{
    BinaryOperator, BoolOperator, CmpOperator, Comprehension, Expr, ExprContext, ExprKind,
    Keyword, Span, UnaryOperator,
};
pub use stmt::{
    Alias, Arg, Arguments, ClassAttr, ClassDef, ExceptHandler, FunctionDef, MatchCase, Pattern,
    PatternKind, Stmt, StmtKind, WithItem,
};
pub use types::TypeExpr;

/// Handle to an expression owned by an [`crate::module::Ast`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(pub u32);

/// Handle to a statement owned by an [`crate::module::Ast`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StmtId(pub u32);

/// Handle to a match pattern owned by an [`crate::module::Ast`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PatId(pub u32);
