//! Precedence-climbing expression parsing.
//!
//! `parse_expression` parses a primary and then, while the lookahead is a
//! binary operator whose precedence clears the caller's minimum, consumes
//! it and recurses with `min' = prec + 1` for left-associative operators
//! (`min' = prec` for right-associative ones such as `^`).

use crate::ast::{
    BinaryOperator, BoolOperator, CmpOperator, Comprehension, ConstantValue, ExprContext, ExprId,
    ExprKind, Keyword, UnaryOperator,
};
use crate::lexer::{OpKind, TokenKind};

use super::{ParseError, ParseResult, Parser};

/// Binary AST operator for an operator spelling, when it has one.
pub fn binary_operator(name: &str) -> Option<BinaryOperator> {
    let op = match name {
        "+" => BinaryOperator::Add,
        "-" => BinaryOperator::Sub,
        "*" => BinaryOperator::Mult,
        "/" => BinaryOperator::Div,
        ".*" => BinaryOperator::MatMult,
        "./" => BinaryOperator::Div,
        "%" => BinaryOperator::Mod,
        "^" => BinaryOperator::Pow,
        _ => return None,
    };
    Some(op)
}

fn binary_op_of(kind: OpKind) -> Option<BinaryOperator> {
    let op = match kind {
        OpKind::Add => BinaryOperator::Add,
        OpKind::Sub => BinaryOperator::Sub,
        OpKind::Mul => BinaryOperator::Mult,
        OpKind::Div => BinaryOperator::Div,
        OpKind::EltMul => BinaryOperator::MatMult,
        OpKind::EltDiv => BinaryOperator::Div,
        OpKind::Mod => BinaryOperator::Mod,
        OpKind::Pow => BinaryOperator::Pow,
        _ => return None,
    };
    Some(op)
}

fn cmp_op_of(kind: OpKind) -> Option<CmpOperator> {
    let op = match kind {
        OpKind::Eq => CmpOperator::Eq,
        OpKind::NotEq => CmpOperator::NotEq,
        OpKind::Lt => CmpOperator::Lt,
        OpKind::LtE => CmpOperator::LtE,
        OpKind::Gt => CmpOperator::Gt,
        OpKind::GtE => CmpOperator::GtE,
        OpKind::In => CmpOperator::In,
        OpKind::Is => CmpOperator::Is,
        _ => return None,
    };
    Some(op)
}

fn is_binary(kind: OpKind) -> bool {
    !matches!(kind, OpKind::Arrow | OpKind::Not)
}

impl<'m> Parser<'m> {
    /// `expr [if expr else test]` — the conditional expression sits above
    /// the climbing loop.
    pub(super) fn parse_test(&mut self) -> ParseResult<ExprId> {
        let span = self.span();
        let body = self.parse_expression(0)?;
        if self.at(&TokenKind::If) {
            self.next_token();
            let test = self.parse_expression(0)?;
            self.expect(&TokenKind::Else, "`else`")?;
            let orelse = self.parse_test()?;
            return Ok(self.alloc_expr(ExprKind::IfExp { test, body, orelse }, span));
        }
        Ok(body)
    }

    /// `test {',' test}` — a bare comma builds a tuple.
    pub(super) fn parse_testlist(&mut self) -> ParseResult<ExprId> {
        let span = self.span();
        let first = self.parse_test()?;
        if !self.at_symbol(',') {
            return Ok(first);
        }

        let mut elts = vec![first];
        while self.eat_symbol(',') {
            if self.at_end_of_statement() || self.at_symbol('=') || self.at_symbol(':') {
                break;
            }
            elts.push(self.parse_test()?);
        }
        Ok(self.alloc_expr(
            ExprKind::TupleExpr {
                elts,
                ctx: ExprContext::Load,
            },
            span,
        ))
    }

    pub(super) fn parse_expression(&mut self, min_prec: i32) -> ParseResult<ExprId> {
        let mut lhs = self.parse_primary()?;

        loop {
            // `not in` spells a single comparison operator.
            if matches!(&self.token().kind, TokenKind::Operator(name) if name == "not")
                && matches!(&self.peek_token().kind, TokenKind::Operator(name) if name == "in")
            {
                let config = self.lexer.operators().config("in").unwrap();
                if config.precedence < min_prec {
                    break;
                }
                self.next_token();
                self.next_token();
                let rhs = self.parse_expression(config.precedence + 1)?;
                lhs = self.push_compare(lhs, CmpOperator::NotIn, rhs);
                continue;
            }

            let (config, _name) = match &self.token().kind {
                TokenKind::Operator(name) => match self.lexer.operators().config(name) {
                    Some(c) if c.precedence >= min_prec && is_binary(c.kind) => (c, name.clone()),
                    _ => break,
                },
                _ => break,
            };

            self.next_token();
            let next_min = config.precedence + i32::from(config.left_associative);

            if let Some(op) = binary_op_of(config.kind) {
                let span = self.module.ast.expr(lhs).span;
                let rhs = self.parse_expression(next_min)?;
                lhs = self.alloc_expr(
                    ExprKind::BinOp {
                        left: lhs,
                        op,
                        right: rhs,
                    },
                    span,
                );
                continue;
            }

            if let Some(mut op) = cmp_op_of(config.kind) {
                // `is not`
                if op == CmpOperator::Is
                    && matches!(&self.token().kind, TokenKind::Operator(name) if name == "not")
                {
                    self.next_token();
                    op = CmpOperator::IsNot;
                }
                let rhs = self.parse_expression(next_min)?;
                lhs = self.push_compare(lhs, op, rhs);
                continue;
            }

            match config.kind {
                OpKind::And => {
                    let rhs = self.parse_expression(next_min)?;
                    lhs = self.push_boolop(lhs, BoolOperator::And, rhs);
                }
                OpKind::Or => {
                    let rhs = self.parse_expression(next_min)?;
                    lhs = self.push_boolop(lhs, BoolOperator::Or, rhs);
                }
                _ => {
                    return Err(ParseError::Message {
                        message: "operator is not binary".to_string(),
                        line: self.token().line,
                        col: self.token().col,
                    })
                }
            }
        }

        Ok(lhs)
    }

    /// Extend an existing comparison chain (`a < b < c`) or start one.
    fn push_compare(&mut self, lhs: ExprId, op: CmpOperator, rhs: ExprId) -> ExprId {
        if let ExprKind::Compare {
            ops, comparators, ..
        } = &mut self.module.ast.expr_mut(lhs).kind
        {
            ops.push(op);
            comparators.push(rhs);
            return lhs;
        }
        let span = self.module.ast.expr(lhs).span;
        self.alloc_expr(
            ExprKind::Compare {
                left: lhs,
                ops: vec![op],
                comparators: vec![rhs],
            },
            span,
        )
    }

    /// Merge same-operator boolean chains into one `BoolOp` node.
    fn push_boolop(&mut self, lhs: ExprId, op: BoolOperator, rhs: ExprId) -> ExprId {
        if let ExprKind::BoolOp {
            op: existing,
            values,
        } = &mut self.module.ast.expr_mut(lhs).kind
        {
            if *existing == op {
                values.push(rhs);
                return lhs;
            }
        }
        let span = self.module.ast.expr(lhs).span;
        self.alloc_expr(
            ExprKind::BoolOp {
                op,
                values: vec![lhs, rhs],
            },
            span,
        )
    }

    pub(super) fn parse_primary(&mut self) -> ParseResult<ExprId> {
        let span = self.span();

        let mut expr = match self.token().kind.clone() {
            TokenKind::Int(v) => {
                self.next_token();
                self.alloc_expr(ExprKind::Constant(ConstantValue::Int(v)), span)
            }
            TokenKind::Float(v) => {
                self.next_token();
                self.alloc_expr(ExprKind::Constant(ConstantValue::Float(v)), span)
            }
            TokenKind::Str(s) | TokenKind::Docstring(s) => {
                self.next_token();
                self.alloc_expr(ExprKind::Constant(ConstantValue::Str(s)), span)
            }
            TokenKind::True => {
                self.next_token();
                self.alloc_expr(ExprKind::Constant(ConstantValue::Bool(true)), span)
            }
            TokenKind::False => {
                self.next_token();
                self.alloc_expr(ExprKind::Constant(ConstantValue::Bool(false)), span)
            }
            TokenKind::None => {
                self.next_token();
                self.alloc_expr(ExprKind::Constant(ConstantValue::None), span)
            }
            TokenKind::Identifier(name) => {
                self.next_token();
                self.alloc_expr(ExprKind::name(name, ExprContext::Load), span)
            }
            TokenKind::Lambda => {
                self.next_token();
                let mut args = Vec::new();
                while let TokenKind::Identifier(name) = self.token().kind.clone() {
                    self.next_token();
                    args.push(name);
                    if !self.eat_symbol(',') {
                        break;
                    }
                }
                self.expect_symbol(':')?;
                let body = self.parse_test()?;
                self.alloc_expr(ExprKind::Lambda { args, body }, span)
            }
            TokenKind::Await => {
                self.next_token();
                let value = self.parse_primary()?;
                self.alloc_expr(ExprKind::Await { value }, span)
            }
            TokenKind::Yield => {
                self.next_token();
                if self.eat(&TokenKind::From) {
                    let value = self.parse_expression(0)?;
                    self.alloc_expr(ExprKind::YieldFrom { value }, span)
                } else if self.at_end_of_statement() || self.at_symbol(')') {
                    self.alloc_expr(ExprKind::Yield { value: None }, span)
                } else {
                    let value = self.parse_expression(0)?;
                    self.alloc_expr(ExprKind::Yield { value: Some(value) }, span)
                }
            }
            TokenKind::Operator(name) => {
                let op = match name.as_str() {
                    "-" => UnaryOperator::USub,
                    "+" => UnaryOperator::UAdd,
                    "~" => UnaryOperator::Invert,
                    "not" => UnaryOperator::Not,
                    _ => return Err(self.unexpected("an expression")),
                };
                self.next_token();
                let operand = if op == UnaryOperator::Not {
                    // `not` binds looser than comparisons, tighter than `and`.
                    self.parse_expression(5)?
                } else {
                    self.parse_primary()?
                };
                self.alloc_expr(ExprKind::UnaryOp { op, operand }, span)
            }
            TokenKind::Symbol('(') => {
                self.next_token();
                if self.eat_symbol(')') {
                    self.alloc_expr(
                        ExprKind::TupleExpr {
                            elts: Vec::new(),
                            ctx: ExprContext::Load,
                        },
                        span,
                    )
                } else {
                    let first = self.parse_test()?;
                    if self.at(&TokenKind::For) || self.at(&TokenKind::Async) {
                        let generators = self.parse_comprehensions()?;
                        self.expect_symbol(')')?;
                        self.alloc_expr(
                            ExprKind::GeneratorExp {
                                elt: first,
                                generators,
                            },
                            span,
                        )
                    } else if self.at_symbol(',') {
                        let mut elts = vec![first];
                        while self.eat_symbol(',') {
                            if self.at_symbol(')') {
                                break;
                            }
                            elts.push(self.parse_test()?);
                        }
                        self.expect_symbol(')')?;
                        self.alloc_expr(
                            ExprKind::TupleExpr {
                                elts,
                                ctx: ExprContext::Load,
                            },
                            span,
                        )
                    } else {
                        self.expect_symbol(')')?;
                        first
                    }
                }
            }
            TokenKind::Symbol('[') => {
                self.next_token();
                if self.eat_symbol(']') {
                    self.alloc_expr(
                        ExprKind::ListExpr {
                            elts: Vec::new(),
                            ctx: ExprContext::Load,
                        },
                        span,
                    )
                } else {
                    let first = self.parse_test()?;
                    if self.at(&TokenKind::For) || self.at(&TokenKind::Async) {
                        let generators = self.parse_comprehensions()?;
                        self.expect_symbol(']')?;
                        self.alloc_expr(
                            ExprKind::ListComp {
                                elt: first,
                                generators,
                            },
                            span,
                        )
                    } else {
                        let mut elts = vec![first];
                        while self.eat_symbol(',') {
                            if self.at_symbol(']') {
                                break;
                            }
                            elts.push(self.parse_test()?);
                        }
                        self.expect_symbol(']')?;
                        self.alloc_expr(
                            ExprKind::ListExpr {
                                elts,
                                ctx: ExprContext::Load,
                            },
                            span,
                        )
                    }
                }
            }
            TokenKind::Symbol('{') => {
                self.next_token();
                self.parse_braced(span)?
            }
            TokenKind::Incorrect(c) => {
                return Err(ParseError::Message {
                    message: format!("unknown character `{}`", c),
                    line: span.line,
                    col: span.column,
                })
            }
            _ => return Err(self.unexpected("an expression")),
        };

        // Postfix chain: calls, attribute access, subscripts.
        loop {
            if self.at_symbol('(') {
                expr = self.parse_call(expr)?;
            } else if self.at_symbol('.') {
                self.next_token();
                let attr = self.expect_identifier("an attribute name")?;
                let attr_span = self.module.ast.expr(expr).span;
                expr = self.alloc_expr(
                    ExprKind::Attribute {
                        value: expr,
                        attr,
                        ctx: ExprContext::Load,
                    },
                    attr_span,
                );
            } else if self.at_symbol('[') {
                self.next_token();
                let slice = self.parse_subscript_index()?;
                self.expect_symbol(']')?;
                let sub_span = self.module.ast.expr(expr).span;
                expr = self.alloc_expr(
                    ExprKind::Subscript {
                        value: expr,
                        slice,
                        ctx: ExprContext::Load,
                    },
                    sub_span,
                );
            } else {
                break;
            }
        }

        Ok(expr)
    }

    /// Zero or more comma-separated arguments terminated by `)`; keyword
    /// arguments and a trailing comma are allowed.
    fn parse_call(&mut self, func: ExprId) -> ParseResult<ExprId> {
        let span = self.module.ast.expr(func).span;
        self.expect_symbol('(')?;

        let mut args = Vec::new();
        let mut keywords = Vec::new();
        while !self.at_symbol(')') {
            if let TokenKind::Identifier(name) = self.token().kind.clone() {
                if self.peek_token().is_symbol('=') {
                    self.next_token();
                    self.next_token();
                    let value = self.parse_test()?;
                    keywords.push(Keyword {
                        arg: Some(name),
                        value,
                    });
                    if !self.eat_symbol(',') {
                        break;
                    }
                    continue;
                }
            }
            args.push(self.parse_test()?);
            if !self.eat_symbol(',') {
                break;
            }
        }
        self.expect_symbol(')')?;

        Ok(self.alloc_expr(
            ExprKind::Call {
                func,
                args,
                keywords,
            },
            span,
        ))
    }

    fn parse_subscript_index(&mut self) -> ParseResult<ExprId> {
        let span = self.span();

        let lower = if self.at_symbol(':') {
            None
        } else {
            Some(self.parse_test()?)
        };

        if !self.at_symbol(':') {
            return lower.ok_or_else(|| self.unexpected("a subscript"));
        }
        self.next_token();

        let upper = if self.at_symbol(':') || self.at_symbol(']') {
            None
        } else {
            Some(self.parse_test()?)
        };
        let step = if self.eat_symbol(':') {
            if self.at_symbol(']') {
                None
            } else {
                Some(self.parse_test()?)
            }
        } else {
            None
        };

        Ok(self.alloc_expr(ExprKind::Slice { lower, upper, step }, span))
    }

    /// `{}` dict and set displays plus their comprehensions.
    fn parse_braced(&mut self, span: crate::ast::Span) -> ParseResult<ExprId> {
        if self.eat_symbol('}') {
            return Ok(self.alloc_expr(
                ExprKind::DictExpr {
                    keys: Vec::new(),
                    values: Vec::new(),
                },
                span,
            ));
        }

        let first = self.parse_test()?;

        if self.at_symbol(':') {
            self.next_token();
            let first_value = self.parse_test()?;

            if self.at(&TokenKind::For) || self.at(&TokenKind::Async) {
                let generators = self.parse_comprehensions()?;
                self.expect_symbol('}')?;
                return Ok(self.alloc_expr(
                    ExprKind::DictComp {
                        key: first,
                        value: first_value,
                        generators,
                    },
                    span,
                ));
            }

            let mut keys = vec![first];
            let mut values = vec![first_value];
            while self.eat_symbol(',') {
                if self.at_symbol('}') {
                    break;
                }
                keys.push(self.parse_test()?);
                self.expect_symbol(':')?;
                values.push(self.parse_test()?);
            }
            self.expect_symbol('}')?;
            return Ok(self.alloc_expr(ExprKind::DictExpr { keys, values }, span));
        }

        if self.at(&TokenKind::For) || self.at(&TokenKind::Async) {
            let generators = self.parse_comprehensions()?;
            self.expect_symbol('}')?;
            return Ok(self.alloc_expr(
                ExprKind::SetComp {
                    elt: first,
                    generators,
                },
                span,
            ));
        }

        let mut elts = vec![first];
        while self.eat_symbol(',') {
            if self.at_symbol('}') {
                break;
            }
            elts.push(self.parse_test()?);
        }
        self.expect_symbol('}')?;
        Ok(self.alloc_expr(ExprKind::SetExpr { elts }, span))
    }

    /// `for target in iter [if guard]*`, repeated.
    fn parse_comprehensions(&mut self) -> ParseResult<Vec<Comprehension>> {
        let mut generators = Vec::new();
        loop {
            let is_async = self.eat(&TokenKind::Async);
            if !self.eat(&TokenKind::For) {
                if is_async {
                    return Err(self.unexpected("`for`"));
                }
                break;
            }
            let target = self.parse_target_list()?;
            if !matches!(&self.token().kind, TokenKind::Operator(op) if op == "in") {
                return Err(self.unexpected("`in`"));
            }
            self.next_token();
            let iter = self.parse_expression(0)?;

            let mut ifs = Vec::new();
            while self.eat(&TokenKind::If) {
                ifs.push(self.parse_expression(0)?);
            }

            generators.push(Comprehension {
                target,
                iter,
                ifs,
                is_async,
            });
        }

        if generators.is_empty() {
            return Err(self.unexpected("`for`"));
        }
        Ok(generators)
    }
}
