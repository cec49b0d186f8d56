use thiserror::Error;

use crate::ast::Span;
use crate::errors::ErrorCategory;

/// Semantic errors are collected, never thrown: the analyser records one
/// and keeps going with a best-effort type so a run reports every problem
/// it can find.
#[derive(Debug, Clone, Error)]
pub enum SemaError {
    #[error("name '{name}' is not defined")]
    NameError { name: String, span: Span },

    #[error("'{class_name}' has no attribute '{attr}'")]
    AttributeError {
        class_name: String,
        attr: String,
        span: Span,
    },

    #[error("type mismatch: expected `{expected}`, got `{got}`")]
    TypeError {
        expected: String,
        got: String,
        span: Span,
    },

    #[error("unsupported operand type(s) for {op}: `{lhs}` and `{rhs}`")]
    UnsupportedOperand {
        op: String,
        lhs: String,
        rhs: String,
        span: Span,
    },

    #[error("`{what}` is not callable")]
    NotCallable { what: String, span: Span },

    #[error("cannot import name '{name}' from '{module}'")]
    ImportError {
        module: String,
        name: String,
        span: Span,
    },

    #[error("no module named '{module}'")]
    ModuleNotFoundError { module: String, span: Span },
}

impl SemaError {
    pub fn span(&self) -> Span {
        match self {
            SemaError::NameError { span, .. }
            | SemaError::AttributeError { span, .. }
            | SemaError::TypeError { span, .. }
            | SemaError::UnsupportedOperand { span, .. }
            | SemaError::NotCallable { span, .. }
            | SemaError::ImportError { span, .. }
            | SemaError::ModuleNotFoundError { span, .. } => *span,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            SemaError::NameError { .. } => ErrorCategory::NameError,
            SemaError::AttributeError { .. } => ErrorCategory::AttributeError,
            SemaError::TypeError { .. } | SemaError::NotCallable { .. } => {
                ErrorCategory::TypeError
            }
            SemaError::UnsupportedOperand { .. } => ErrorCategory::UnsupportedOperand,
            SemaError::ImportError { .. } => ErrorCategory::ImportError,
            SemaError::ModuleNotFoundError { .. } => ErrorCategory::ModuleNotFoundError,
        }
    }
}
