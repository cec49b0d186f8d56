//! Recursive-descent parser.
//!
//! Statements are parsed by hand; expressions go through the
//! precedence-climbing loop in [`expressions`]. Every node lands in the
//! arena of the [`Module`] handed to the parser, and top-level definitions
//! are registered in its symbol table.
//!
//! A failure inside one top-level definition does not stop the parse: the
//! error is recorded and the parser resynchronises at the next statement
//! boundary.

pub mod expressions;

use thiserror::Error;

use crate::ast::{
    Alias, Arg, ClassDef, ExceptHandler, Expr, ExprContext, ExprId, ExprKind, FunctionDef,
    MatchCase, Pattern, PatternKind, Span, Stmt, StmtId, StmtKind, TypeExpr, WithItem,
};
use crate::lexer::{Lexer, Token, TokenKind};
use crate::module::Module;

#[derive(Debug, Clone, Error)]
pub enum ParseError {
    #[error("expected {expected}, got {got}")]
    Unexpected {
        expected: String,
        got: String,
        line: usize,
        col: usize,
    },
    #[error("{message}")]
    Message {
        message: String,
        line: usize,
        col: usize,
    },
}

impl ParseError {
    pub fn line(&self) -> usize {
        match self {
            ParseError::Unexpected { line, .. } => *line,
            ParseError::Message { line, .. } => *line,
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

pub struct Parser<'m> {
    lexer: Lexer,
    module: &'m mut Module,
    pub errors: Vec<ParseError>,
}

impl<'m> Parser<'m> {
    pub fn new(lexer: Lexer, module: &'m mut Module) -> Self {
        let mut parser = Self {
            lexer,
            module,
            errors: Vec::new(),
        };
        parser.lexer.next_token();
        parser
    }

    pub fn file_name(&self) -> &str {
        self.lexer.file_name()
    }

    // ── token plumbing ─────────────────────────────────────────────────

    fn token(&self) -> &Token {
        self.lexer.token()
    }

    fn next_token(&mut self) -> Token {
        self.lexer.next_token()
    }

    fn peek_token(&mut self) -> Token {
        self.lexer.peek_token()
    }

    fn span(&self) -> Span {
        Span::new(self.token().line, self.token().col)
    }

    fn at(&self, kind: &TokenKind) -> bool {
        &self.token().kind == kind
    }

    fn at_symbol(&self, c: char) -> bool {
        self.token().is_symbol(c)
    }

    /// Consume the current token when it matches.
    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.next_token();
            return true;
        }
        false
    }

    fn eat_symbol(&mut self, c: char) -> bool {
        if self.at_symbol(c) {
            self.next_token();
            return true;
        }
        false
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        ParseError::Unexpected {
            expected: expected.to_string(),
            got: self.token().kind.describe(),
            line: self.token().line,
            col: self.token().col,
        }
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> ParseResult<Token> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_symbol(&mut self, c: char) -> ParseResult<()> {
        if self.eat_symbol(c) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("`{}`", c)))
        }
    }

    /// Return the current token and step past it.
    fn advance(&mut self) -> Token {
        let tok = self.token().clone();
        self.next_token();
        tok
    }

    fn expect_identifier(&mut self, what: &str) -> ParseResult<String> {
        match self.token().kind.clone() {
            TokenKind::Identifier(name) => {
                self.next_token();
                Ok(name)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn expect_newline(&mut self) -> ParseResult<()> {
        match self.token().kind {
            TokenKind::Newline => {
                self.next_token();
                Ok(())
            }
            // A block or file can end without a final physical newline.
            TokenKind::Eof | TokenKind::Dedent => Ok(()),
            _ => Err(self.unexpected("newline")),
        }
    }

    fn skip_blank(&mut self) {
        while matches!(
            self.token().kind,
            TokenKind::Newline | TokenKind::Incorrect(_)
        ) {
            if let TokenKind::Incorrect(c) = self.token().kind {
                log::debug!("skipping incorrect character `{}`", c);
            }
            self.next_token();
        }
    }

    /// Skip to the next statement boundary after an error.
    fn synchronise(&mut self) {
        loop {
            match self.token().kind {
                TokenKind::Eof => return,
                TokenKind::Newline | TokenKind::Dedent => {
                    self.next_token();
                    return;
                }
                _ => {
                    self.next_token();
                }
            }
        }
    }

    fn alloc_expr(&mut self, kind: ExprKind, span: Span) -> ExprId {
        self.module.ast.alloc_expr(Expr::new(kind, span))
    }

    fn alloc_stmt(&mut self, kind: StmtKind, span: Span) -> StmtId {
        self.module.ast.alloc_stmt(Stmt::new(kind, span))
    }

    // ── module level ───────────────────────────────────────────────────

    /// Parse until end of file, collecting recoverable errors in
    /// `self.errors`.
    pub fn parse_module(&mut self) -> Vec<StmtId> {
        let mut body = Vec::new();

        loop {
            self.skip_blank();
            if self.at(&TokenKind::Eof) {
                break;
            }

            match self.parse_statement() {
                Ok(stmt) => {
                    self.register_definition(stmt);
                    body.push(stmt);
                }
                Err(error) => {
                    log::debug!("parse error: {}", error);
                    self.errors.push(error);
                    self.synchronise();
                }
            }
        }

        body
    }

    fn register_definition(&mut self, stmt: StmtId) {
        let name = match &self.module.ast.stmt(stmt).kind {
            StmtKind::FunctionDef(def) => def.name.clone(),
            StmtKind::ClassDef(def) => def.name.clone(),
            _ => return,
        };
        self.module.insert(&name, stmt);
    }

    // ── statements ─────────────────────────────────────────────────────

    pub fn parse_statement(&mut self) -> ParseResult<StmtId> {
        let span = self.span();

        match self.token().kind.clone() {
            TokenKind::Def => self.parse_function(false),
            TokenKind::Async => {
                self.next_token();
                self.expect(&TokenKind::Def, "`def` after `async`")?;
                // parse_function expects to still see `def`; rebuild the
                // small prefix by dispatching past it.
                self.parse_function_after_def(true, span)
            }
            TokenKind::Struct => self.parse_struct(),
            TokenKind::Return => {
                self.next_token();
                let value = if self.at_end_of_statement() {
                    None
                } else {
                    Some(self.parse_testlist()?)
                };
                self.expect_newline()?;
                Ok(self.alloc_stmt(StmtKind::Return { value }, span))
            }
            TokenKind::Del => {
                self.next_token();
                let mut targets = vec![self.parse_expression(0)?];
                while self.eat_symbol(',') {
                    targets.push(self.parse_expression(0)?);
                }
                for target in &targets {
                    self.set_context(*target, ExprContext::Del);
                }
                self.expect_newline()?;
                Ok(self.alloc_stmt(StmtKind::Delete { targets }, span))
            }
            TokenKind::Pass => {
                self.next_token();
                self.expect_newline()?;
                Ok(self.alloc_stmt(StmtKind::Pass, span))
            }
            TokenKind::Break => {
                self.next_token();
                self.expect_newline()?;
                Ok(self.alloc_stmt(StmtKind::Break, span))
            }
            TokenKind::Continue => {
                self.next_token();
                self.expect_newline()?;
                Ok(self.alloc_stmt(StmtKind::Continue, span))
            }
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::With => self.parse_with(),
            TokenKind::Try => self.parse_try(),
            TokenKind::Match => self.parse_match(),
            TokenKind::Raise => {
                self.next_token();
                let mut exc = None;
                let mut cause = None;
                if !self.at_end_of_statement() {
                    exc = Some(self.parse_expression(0)?);
                    if self.eat(&TokenKind::From) {
                        cause = Some(self.parse_expression(0)?);
                    }
                }
                self.expect_newline()?;
                Ok(self.alloc_stmt(StmtKind::Raise { exc, cause }, span))
            }
            TokenKind::Assert => {
                self.next_token();
                let test = self.parse_expression(0)?;
                let msg = if self.eat_symbol(',') {
                    Some(self.parse_expression(0)?)
                } else {
                    None
                };
                self.expect_newline()?;
                Ok(self.alloc_stmt(StmtKind::Assert { test, msg }, span))
            }
            TokenKind::Import => self.parse_import(),
            TokenKind::From => self.parse_import_from(),
            TokenKind::Global => {
                self.next_token();
                let names = self.parse_name_list()?;
                self.expect_newline()?;
                Ok(self.alloc_stmt(StmtKind::Global { names }, span))
            }
            TokenKind::Nonlocal => {
                self.next_token();
                let names = self.parse_name_list()?;
                self.expect_newline()?;
                Ok(self.alloc_stmt(StmtKind::Nonlocal { names }, span))
            }
            _ => self.parse_simple_statement(),
        }
    }

    fn at_end_of_statement(&self) -> bool {
        matches!(
            self.token().kind,
            TokenKind::Newline | TokenKind::Eof | TokenKind::Dedent
        )
    }

    fn parse_name_list(&mut self) -> ParseResult<Vec<String>> {
        let mut names = vec![self.expect_identifier("a name")?];
        while self.eat_symbol(',') {
            names.push(self.expect_identifier("a name")?);
        }
        Ok(names)
    }

    /// Expression statement, assignment, annotated assignment or augmented
    /// assignment; the dispatch happens after the first expression.
    fn parse_simple_statement(&mut self) -> ParseResult<StmtId> {
        let span = self.span();
        let first = self.parse_testlist()?;

        // x: Type = value
        if self.at_symbol(':') {
            self.next_token();
            let annotation = self.parse_type_expression()?;
            let value = if self.eat_symbol('=') {
                Some(self.parse_testlist()?)
            } else {
                None
            };
            self.set_context(first, ExprContext::Store);
            self.expect_newline()?;
            return Ok(self.alloc_stmt(
                StmtKind::AnnAssign {
                    target: first,
                    annotation: Some(annotation),
                    value,
                },
                span,
            ));
        }

        // x += value
        if let TokenKind::Operator(op_name) = self.token().kind.clone() {
            if self.peek_token().is_symbol('=') {
                let op = expressions::binary_operator(&op_name)
                    .ok_or_else(|| self.unexpected("an augmentable operator"))?;
                self.next_token();
                self.next_token();
                let value = self.parse_testlist()?;
                self.set_context(first, ExprContext::Store);
                self.expect_newline()?;
                return Ok(self.alloc_stmt(
                    StmtKind::AugAssign {
                        target: first,
                        op,
                        value,
                    },
                    span,
                ));
            }
        }

        // x = y = value
        if self.at_symbol('=') {
            let mut chain = vec![first];
            while self.eat_symbol('=') {
                chain.push(self.parse_testlist()?);
            }
            let value = chain.pop().unwrap();
            for target in &chain {
                self.set_context(*target, ExprContext::Store);
            }
            self.expect_newline()?;
            return Ok(self.alloc_stmt(
                StmtKind::Assign {
                    targets: chain,
                    value,
                },
                span,
            ));
        }

        self.expect_newline()?;
        Ok(self.alloc_stmt(StmtKind::Expr { value: first }, span))
    }

    /// `: NEWLINE INDENT body DEDENT`, optionally capturing a leading
    /// docstring.
    fn parse_block(&mut self, docstring: Option<&mut Option<String>>) -> ParseResult<Vec<StmtId>> {
        self.expect_symbol(':')?;
        self.expect(&TokenKind::Newline, "newline")?;
        self.skip_blank();
        self.expect(&TokenKind::Indent, "an indented block")?;
        self.skip_blank();

        if let Some(slot) = docstring {
            if let TokenKind::Docstring(text) = self.token().kind.clone() {
                *slot = Some(text);
                self.next_token();
                self.expect_newline()?;
                self.skip_blank();
            }
        }

        let mut body = Vec::new();
        while !self.at(&TokenKind::Dedent) && !self.at(&TokenKind::Eof) {
            let stmt = self.parse_statement()?;
            body.push(stmt);
            self.skip_blank();
        }
        self.eat(&TokenKind::Dedent);
        Ok(body)
    }

    fn parse_function(&mut self, is_async: bool) -> ParseResult<StmtId> {
        let span = self.span();
        self.expect(&TokenKind::Def, "`def`")?;
        self.parse_function_after_def(is_async, span)
    }

    fn parse_function_after_def(&mut self, is_async: bool, span: Span) -> ParseResult<StmtId> {
        let name = self.expect_identifier("a function name")?;
        let mut def = FunctionDef::new(name);
        def.is_async = is_async;

        self.expect_symbol('(')?;
        while !self.at_symbol(')') {
            let arg_span = self.span();
            let arg_name = self.expect_identifier("a parameter name")?;
            let annotation = if self.eat_symbol(':') {
                Some(self.parse_type_expression()?)
            } else {
                None
            };
            def.args.args.push(Arg {
                name: arg_name,
                annotation,
                span: arg_span,
            });
            if self.eat_symbol('=') {
                let default = self.parse_expression(0)?;
                def.args.defaults.push(default);
            } else if !def.args.defaults.is_empty() {
                return Err(ParseError::Message {
                    message: "parameter without a default follows one with a default".to_string(),
                    line: arg_span.line,
                    col: arg_span.column,
                });
            }
            if !self.eat_symbol(',') {
                break;
            }
        }
        self.expect_symbol(')')?;

        if let TokenKind::Operator(name) = self.token().kind.clone() {
            if name == "->" {
                self.next_token();
                def.returns = Some(self.parse_type_expression()?);
            }
        }

        let mut docstring = None;
        def.body = self.parse_block(Some(&mut docstring))?;
        def.docstring = docstring;

        Ok(self.alloc_stmt(StmtKind::FunctionDef(def), span))
    }

    /// `struct name : NEWLINE INDENT [docstring] {attr | method}* DEDENT`
    fn parse_struct(&mut self) -> ParseResult<StmtId> {
        let span = self.span();
        self.expect(&TokenKind::Struct, "`struct`")?;
        let name = self.expect_identifier("a struct name")?;
        let mut def = ClassDef::new(name);

        let mut docstring = None;
        def.body = self.parse_block(Some(&mut docstring))?;
        def.docstring = docstring;

        // Attribute slots declared directly in the body are recorded right
        // away; the analyser mines `__init__` for the rest later.
        for &stmt in def.body.clone().iter() {
            if let StmtKind::AnnAssign {
                target, annotation, ..
            } = &self.module.ast.stmt(stmt).kind
            {
                if let ExprKind::Name { id, .. } = &self.module.ast.expr(*target).kind {
                    let id = id.clone();
                    let annotation = annotation.clone();
                    def.insert_attribute(&id, stmt, annotation);
                }
            }
        }

        Ok(self.alloc_stmt(StmtKind::ClassDef(def), span))
    }

    fn parse_if(&mut self) -> ParseResult<StmtId> {
        let span = self.span();
        self.expect(&TokenKind::If, "`if`")?;
        let test = self.parse_expression(0)?;
        let body = self.parse_block(None)?;

        let mut orelse = Vec::new();
        self.skip_blank_before_block_tail();
        if self.at(&TokenKind::Elif) {
            // An elif chain nests as `if` statements in the orelse.
            orelse = vec![self.parse_elif_chain()?];
        } else if self.at(&TokenKind::Else) {
            self.next_token();
            orelse = self.parse_block(None)?;
        }

        Ok(self.alloc_stmt(StmtKind::If { test, body, orelse }, span))
    }

    fn parse_elif_chain(&mut self) -> ParseResult<StmtId> {
        let span = self.span();
        self.expect(&TokenKind::Elif, "`elif`")?;
        let test = self.parse_expression(0)?;
        let body = self.parse_block(None)?;
        let mut orelse = Vec::new();
        self.skip_blank_before_block_tail();
        if self.at(&TokenKind::Elif) {
            orelse = vec![self.parse_elif_chain()?];
        } else if self.at(&TokenKind::Else) {
            self.next_token();
            orelse = self.parse_block(None)?;
        }
        Ok(self.alloc_stmt(StmtKind::If { test, body, orelse }, span))
    }

    // else/elif/except/finally appear at the same indentation as their
    // opening statement, after the block's dedent.
    fn skip_blank_before_block_tail(&mut self) {
        while matches!(self.token().kind, TokenKind::Newline) {
            self.next_token();
        }
    }

    fn parse_while(&mut self) -> ParseResult<StmtId> {
        let span = self.span();
        self.expect(&TokenKind::While, "`while`")?;
        let test = self.parse_expression(0)?;
        let body = self.parse_block(None)?;
        let mut orelse = Vec::new();
        self.skip_blank_before_block_tail();
        if self.eat(&TokenKind::Else) {
            orelse = self.parse_block(None)?;
        }
        Ok(self.alloc_stmt(StmtKind::While { test, body, orelse }, span))
    }

    fn parse_for(&mut self) -> ParseResult<StmtId> {
        let span = self.span();
        self.expect(&TokenKind::For, "`for`")?;
        let target = self.parse_target_list()?;
        let in_op = matches!(&self.token().kind, TokenKind::Operator(op) if op == "in");
        if !in_op {
            return Err(self.unexpected("`in`"));
        }
        self.next_token();
        let iter = self.parse_expression(0)?;
        let body = self.parse_block(None)?;
        let mut orelse = Vec::new();
        self.skip_blank_before_block_tail();
        if self.eat(&TokenKind::Else) {
            orelse = self.parse_block(None)?;
        }
        Ok(self.alloc_stmt(
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
            },
            span,
        ))
    }

    /// Loop targets: `a` or `a, b` (stored in Store context).
    fn parse_target_list(&mut self) -> ParseResult<ExprId> {
        let span = self.span();
        let mut elts = vec![self.parse_primary()?];
        while self.eat_symbol(',') {
            elts.push(self.parse_primary()?);
        }
        let target = if elts.len() == 1 {
            elts[0]
        } else {
            self.alloc_expr(
                ExprKind::TupleExpr {
                    elts,
                    ctx: ExprContext::Store,
                },
                span,
            )
        };
        self.set_context(target, ExprContext::Store);
        Ok(target)
    }

    fn parse_with(&mut self) -> ParseResult<StmtId> {
        let span = self.span();
        self.expect(&TokenKind::With, "`with`")?;
        let mut items = Vec::new();
        loop {
            let context_expr = self.parse_expression(0)?;
            let optional_vars = if self.eat(&TokenKind::As) {
                let target = self.parse_primary()?;
                self.set_context(target, ExprContext::Store);
                Some(target)
            } else {
                None
            };
            items.push(WithItem {
                context_expr,
                optional_vars,
            });
            if !self.eat_symbol(',') {
                break;
            }
        }
        let body = self.parse_block(None)?;
        Ok(self.alloc_stmt(StmtKind::With { items, body }, span))
    }

    fn parse_try(&mut self) -> ParseResult<StmtId> {
        let span = self.span();
        self.expect(&TokenKind::Try, "`try`")?;
        let body = self.parse_block(None)?;

        let mut handlers = Vec::new();
        self.skip_blank_before_block_tail();
        while self.at(&TokenKind::Except) {
            self.next_token();
            let typ = if self.at_symbol(':') {
                None
            } else {
                Some(self.parse_expression(0)?)
            };
            let name = if self.eat(&TokenKind::As) {
                Some(self.expect_identifier("a handler name")?)
            } else {
                None
            };
            let handler_body = self.parse_block(None)?;
            handlers.push(ExceptHandler {
                typ,
                name,
                body: handler_body,
            });
            self.skip_blank_before_block_tail();
        }

        let mut orelse = Vec::new();
        if self.eat(&TokenKind::Else) {
            orelse = self.parse_block(None)?;
            self.skip_blank_before_block_tail();
        }

        let mut finalbody = Vec::new();
        if self.eat(&TokenKind::Finally) {
            finalbody = self.parse_block(None)?;
        }

        Ok(self.alloc_stmt(
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            },
            span,
        ))
    }

    fn parse_match(&mut self) -> ParseResult<StmtId> {
        let span = self.span();
        self.expect(&TokenKind::Match, "`match`")?;
        let subject = self.parse_testlist()?;

        self.expect_symbol(':')?;
        self.expect(&TokenKind::Newline, "newline")?;
        self.skip_blank();
        self.expect(&TokenKind::Indent, "an indented block")?;
        self.skip_blank();

        let mut cases = Vec::new();
        while self.at(&TokenKind::Case) {
            self.next_token();
            let pattern = self.parse_pattern()?;
            let guard = if self.eat(&TokenKind::If) {
                Some(self.parse_expression(0)?)
            } else {
                None
            };
            let body = self.parse_block(None)?;
            cases.push(MatchCase {
                pattern,
                guard,
                body,
            });
            self.skip_blank();
        }
        self.eat(&TokenKind::Dedent);

        if cases.is_empty() {
            return Err(ParseError::Message {
                message: "match statement without any case".to_string(),
                line: span.line,
                col: span.column,
            });
        }

        Ok(self.alloc_stmt(StmtKind::Match { subject, cases }, span))
    }

    fn parse_import(&mut self) -> ParseResult<StmtId> {
        let span = self.span();
        self.expect(&TokenKind::Import, "`import`")?;
        let mut names = Vec::new();
        loop {
            let name = self.parse_dotted_name()?;
            let asname = if self.eat(&TokenKind::As) {
                Some(self.expect_identifier("an alias")?)
            } else {
                None
            };
            names.push(Alias { name, asname });
            if !self.eat_symbol(',') {
                break;
            }
        }
        self.expect_newline()?;
        Ok(self.alloc_stmt(StmtKind::Import { names }, span))
    }

    fn parse_import_from(&mut self) -> ParseResult<StmtId> {
        let span = self.span();
        self.expect(&TokenKind::From, "`from`")?;
        let module = self.parse_dotted_name()?;
        self.expect(&TokenKind::Import, "`import`")?;
        let mut names = Vec::new();
        loop {
            let name = self.expect_identifier("an imported name")?;
            let asname = if self.eat(&TokenKind::As) {
                Some(self.expect_identifier("an alias")?)
            } else {
                None
            };
            names.push(Alias { name, asname });
            if !self.eat_symbol(',') {
                break;
            }
        }
        self.expect_newline()?;
        Ok(self.alloc_stmt(
            StmtKind::ImportFrom {
                module: Some(module),
                names,
            },
            span,
        ))
    }

    fn parse_dotted_name(&mut self) -> ParseResult<String> {
        let mut name = self.expect_identifier("a module name")?;
        while self.at_symbol('.') {
            self.next_token();
            name.push('.');
            name.push_str(&self.expect_identifier("a module name")?);
        }
        Ok(name)
    }

    // ── patterns ───────────────────────────────────────────────────────

    fn parse_pattern(&mut self) -> ParseResult<crate::ast::PatId> {
        let span = self.span();
        let first = self.parse_closed_pattern()?;

        if self.at_symbol('|') {
            let mut patterns = vec![first];
            while self.eat_symbol('|') {
                patterns.push(self.parse_closed_pattern()?);
            }
            return Ok(self
                .module
                .ast
                .alloc_pattern(Pattern {
                    kind: PatternKind::MatchOr(patterns),
                    span,
                }));
        }

        if self.eat(&TokenKind::As) {
            let name = self.expect_identifier("a capture name")?;
            return Ok(self.module.ast.alloc_pattern(Pattern {
                kind: PatternKind::MatchAs {
                    pattern: Some(first),
                    name: Some(name),
                },
                span,
            }));
        }

        Ok(first)
    }

    fn parse_closed_pattern(&mut self) -> ParseResult<crate::ast::PatId> {
        let span = self.span();

        let kind = match self.token().kind.clone() {
            TokenKind::Int(v) => {
                self.next_token();
                let value = self.alloc_expr(
                    ExprKind::Constant(crate::ast::ConstantValue::Int(v)),
                    span,
                );
                PatternKind::MatchValue(value)
            }
            TokenKind::Float(v) => {
                self.next_token();
                let value = self.alloc_expr(
                    ExprKind::Constant(crate::ast::ConstantValue::Float(v)),
                    span,
                );
                PatternKind::MatchValue(value)
            }
            TokenKind::Str(s) => {
                self.next_token();
                let value = self.alloc_expr(
                    ExprKind::Constant(crate::ast::ConstantValue::Str(s)),
                    span,
                );
                PatternKind::MatchValue(value)
            }
            TokenKind::True => {
                self.next_token();
                PatternKind::MatchSingleton(crate::ast::ConstantValue::Bool(true))
            }
            TokenKind::False => {
                self.next_token();
                PatternKind::MatchSingleton(crate::ast::ConstantValue::Bool(false))
            }
            TokenKind::None => {
                self.next_token();
                PatternKind::MatchSingleton(crate::ast::ConstantValue::None)
            }
            TokenKind::Operator(op) if op == "*" => {
                self.next_token();
                let name = self.expect_identifier("a star pattern name")?;
                let name = if name == "_" { Option::None } else { Some(name) };
                PatternKind::MatchStar(name)
            }
            TokenKind::Symbol('[') => {
                self.next_token();
                let mut patterns = Vec::new();
                while !self.at_symbol(']') {
                    patterns.push(self.parse_pattern()?);
                    if !self.eat_symbol(',') {
                        break;
                    }
                }
                self.expect_symbol(']')?;
                PatternKind::MatchSequence(patterns)
            }
            TokenKind::Symbol('{') => {
                self.next_token();
                let mut keys = Vec::new();
                let mut patterns = Vec::new();
                let mut rest = Option::None;
                while !self.at_symbol('}') {
                    if matches!(&self.token().kind, TokenKind::Operator(op) if op == "*") {
                        // `**rest` arrives as two `*` operator tokens
                        self.next_token();
                        if matches!(&self.token().kind, TokenKind::Operator(op) if op == "*") {
                            self.next_token();
                        }
                        rest = Some(self.expect_identifier("a rest name")?);
                        break;
                    }
                    let key = self.parse_expression(0)?;
                    self.expect_symbol(':')?;
                    keys.push(key);
                    patterns.push(self.parse_pattern()?);
                    if !self.eat_symbol(',') {
                        break;
                    }
                }
                self.expect_symbol('}')?;
                PatternKind::MatchMapping {
                    keys,
                    patterns,
                    rest,
                }
            }
            TokenKind::Identifier(name) => {
                self.next_token();
                if self.at_symbol('(') {
                    // Class pattern: Cls(p1, attr=p2)
                    let cls = self.alloc_expr(ExprKind::name(name, ExprContext::Load), span);
                    self.next_token();
                    let mut patterns = Vec::new();
                    let mut kwd_attrs = Vec::new();
                    let mut kwd_patterns = Vec::new();
                    while !self.at_symbol(')') {
                        if let TokenKind::Identifier(attr) = self.token().kind.clone() {
                            if self.peek_token().is_symbol('=') {
                                self.next_token();
                                self.next_token();
                                kwd_attrs.push(attr);
                                kwd_patterns.push(self.parse_pattern()?);
                                if !self.eat_symbol(',') {
                                    break;
                                }
                                continue;
                            }
                        }
                        patterns.push(self.parse_pattern()?);
                        if !self.eat_symbol(',') {
                            break;
                        }
                    }
                    self.expect_symbol(')')?;
                    PatternKind::MatchClass {
                        cls,
                        patterns,
                        kwd_attrs,
                        kwd_patterns,
                    }
                } else if self.at_symbol('.') {
                    // Dotted value pattern: Color.RED
                    let mut value = self.alloc_expr(ExprKind::name(name, ExprContext::Load), span);
                    while self.eat_symbol('.') {
                        let attr = self.expect_identifier("an attribute")?;
                        value = self.alloc_expr(
                            ExprKind::Attribute {
                                value,
                                attr,
                                ctx: ExprContext::Load,
                            },
                            span,
                        );
                    }
                    PatternKind::MatchValue(value)
                } else if name == "_" {
                    PatternKind::MatchAs {
                        pattern: Option::None,
                        name: Option::None,
                    }
                } else {
                    PatternKind::MatchAs {
                        pattern: Option::None,
                        name: Some(name),
                    }
                }
            }
            _ => return Err(self.unexpected("a pattern")),
        };

        Ok(self.module.ast.alloc_pattern(Pattern { kind, span }))
    }

    // ── shared helpers ─────────────────────────────────────────────────

    /// Rewrite the load/store/del context of an assignment target.
    fn set_context(&mut self, target: ExprId, new_ctx: ExprContext) {
        let nested = match &mut self.module.ast.expr_mut(target).kind {
            ExprKind::Name { ctx, .. }
            | ExprKind::Attribute { ctx, .. }
            | ExprKind::Subscript { ctx, .. }
            | ExprKind::Starred { ctx, .. } => {
                *ctx = new_ctx;
                None
            }
            ExprKind::TupleExpr { ctx, elts } | ExprKind::ListExpr { ctx, elts } => {
                *ctx = new_ctx;
                Some(elts.clone())
            }
            _ => None,
        };
        if let Some(elts) = nested {
            for elt in elts {
                self.set_context(elt, new_ctx);
            }
        }
    }

    /// Parse a type annotation into a type expression.
    fn parse_type_expression(&mut self) -> ParseResult<TypeExpr> {
        match self.token().kind.clone() {
            TokenKind::None => {
                self.next_token();
                Ok(TypeExpr::none())
            }
            TokenKind::Identifier(name) => {
                self.next_token();
                match name.as_str() {
                    "list" => {
                        self.expect_symbol('[')?;
                        let elem = self.parse_type_expression()?;
                        self.expect_symbol(']')?;
                        Ok(TypeExpr::Array(Box::new(elem)))
                    }
                    "set" => {
                        self.expect_symbol('[')?;
                        let elem = self.parse_type_expression()?;
                        self.expect_symbol(']')?;
                        Ok(TypeExpr::Set(Box::new(elem)))
                    }
                    "dict" => {
                        self.expect_symbol('[')?;
                        let key = self.parse_type_expression()?;
                        self.expect_symbol(',')?;
                        let value = self.parse_type_expression()?;
                        self.expect_symbol(']')?;
                        Ok(TypeExpr::Dict {
                            key: Box::new(key),
                            value: Box::new(value),
                        })
                    }
                    "tuple" => {
                        self.expect_symbol('[')?;
                        let mut elems = vec![self.parse_type_expression()?];
                        while self.eat_symbol(',') {
                            elems.push(self.parse_type_expression()?);
                        }
                        self.expect_symbol(']')?;
                        Ok(TypeExpr::Tuple(elems))
                    }
                    "Type" => Ok(TypeExpr::Type),
                    "Float" | "Int" | "Bool" | "Str" => Ok(TypeExpr::Builtin(name)),
                    _ => Ok(TypeExpr::Class(name)),
                }
            }
            TokenKind::Symbol('(') => {
                // (T1, ..., Tn) -> R
                self.next_token();
                let mut args = Vec::new();
                while !self.at_symbol(')') {
                    args.push(self.parse_type_expression()?);
                    if !self.eat_symbol(',') {
                        break;
                    }
                }
                self.expect_symbol(')')?;
                match self.token().kind.clone() {
                    TokenKind::Operator(op) if op == "->" => {
                        self.next_token();
                    }
                    _ => return Err(self.unexpected("`->`")),
                }
                let returns = self.parse_type_expression()?;
                Ok(TypeExpr::arrow(args, returns))
            }
            _ => Err(self.unexpected("a type expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::pretty::pretty_module;
    use crate::buffer::StringBuffer;

    fn parse(source: &str) -> (Module, Vec<StmtId>, Vec<ParseError>) {
        let mut module = Module::new();
        let lexer = Lexer::new(Box::new(StringBuffer::new(source)));
        let mut parser = Parser::new(lexer, &mut module);
        let body = parser.parse_module();
        let errors = parser.errors.clone();
        (module, body, errors)
    }

    fn parse_clean(source: &str) -> (Module, Vec<StmtId>) {
        let (module, body, errors) = parse(source);
        assert!(errors.is_empty(), "unexpected parse errors: {:?}", errors);
        (module, body)
    }

    #[test]
    fn multiplication_binds_tighter() {
        let (module, body) = parse_clean("1 + 2 * 3\n");
        let printed = pretty_module(&module.ast, &body);
        assert_eq!(printed.trim(), "1 + (2 * 3)");
    }

    #[test]
    fn power_is_right_associative() {
        let (module, body) = parse_clean("2 ^ 3 ^ 4\n");
        let printed = pretty_module(&module.ast, &body);
        assert_eq!(printed.trim(), "2 ^ (3 ^ 4)");
    }

    #[test]
    fn parenthesised_grouping_survives() {
        let (module, body) = parse_clean("(1 + 2) * 3\n");
        let printed = pretty_module(&module.ast, &body);
        assert_eq!(printed.trim(), "(1 + 2) * 3");
    }

    #[test]
    fn struct_and_function_register_in_the_module() {
        let source = "struct Point:\n    x: Float\n    y: Float\ndef mid(a: Float, b: Float) -> Float:\n    return (a + b) / 2\n";
        let (module, _) = parse_clean(source);
        assert!(module.find("Point").is_some());
        assert!(module.find("mid").is_some());

        let point = module.find("Point").unwrap();
        match &module.ast.stmt(point).kind {
            StmtKind::ClassDef(def) => {
                assert!(def.get_attribute("x").is_some());
                assert!(def.get_attribute("y").is_some());
            }
            other => panic!("expected a struct, got {:?}", other),
        }
    }

    #[test]
    fn function_docstring_is_captured_out_of_the_body() {
        let source = "def f() -> Float:\n    \"\"\"adds things\"\"\"\n    return 1.0\n";
        let (module, body) = parse_clean(source);
        match &module.ast.stmt(body[0]).kind {
            StmtKind::FunctionDef(def) => {
                assert_eq!(def.docstring.as_deref(), Some("adds things"));
                assert_eq!(def.body.len(), 1);
            }
            other => panic!("expected a function, got {:?}", other),
        }
    }

    #[test]
    fn call_with_trailing_comma() {
        let (module, body) = parse_clean("f(1, 2,)\n");
        match &module.ast.stmt(body[0]).kind {
            StmtKind::Expr { value } => match &module.ast.expr(*value).kind {
                ExprKind::Call { args, .. } => assert_eq!(args.len(), 2),
                other => panic!("expected a call, got {:?}", other),
            },
            other => panic!("expected an expression statement, got {:?}", other),
        }
    }

    #[test]
    fn augmented_assignment() {
        let (module, body) = parse_clean("x += 1\n");
        match &module.ast.stmt(body[0]).kind {
            StmtKind::AugAssign { op, .. } => {
                assert_eq!(*op, crate::ast::BinaryOperator::Add)
            }
            other => panic!("expected an augmented assignment, got {:?}", other),
        }
    }

    #[test]
    fn annotated_assignment() {
        let (module, body) = parse_clean("x: Float = 1.0\n");
        match &module.ast.stmt(body[0]).kind {
            StmtKind::AnnAssign { annotation, .. } => {
                assert_eq!(annotation.clone().unwrap(), TypeExpr::float());
            }
            other => panic!("expected an annotated assignment, got {:?}", other),
        }
    }

    #[test]
    fn one_bad_definition_does_not_sink_the_next() {
        let source = "def broken(:\n    pass\ndef ok() -> Float:\n    return 1.0\n";
        let (module, _, errors) = parse(source);
        assert!(!errors.is_empty());
        assert!(module.find("ok").is_some());
    }

    #[test]
    fn elif_chains_nest_in_orelse() {
        let source = "if a:\n    pass\nelif b:\n    pass\nelse:\n    pass\n";
        let (module, body) = parse_clean(source);
        match &module.ast.stmt(body[0]).kind {
            StmtKind::If { orelse, .. } => {
                assert_eq!(orelse.len(), 1);
                assert!(matches!(
                    module.ast.stmt(orelse[0]).kind,
                    StmtKind::If { .. }
                ));
            }
            other => panic!("expected an if, got {:?}", other),
        }
    }

    #[test]
    fn comparison_chains_stay_flat() {
        let (module, body) = parse_clean("a < b < c\n");
        match &module.ast.stmt(body[0]).kind {
            StmtKind::Expr { value } => match &module.ast.expr(*value).kind {
                ExprKind::Compare {
                    ops, comparators, ..
                } => {
                    assert_eq!(ops.len(), 2);
                    assert_eq!(comparators.len(), 2);
                }
                other => panic!("expected a comparison, got {:?}", other),
            },
            other => panic!("expected an expression statement, got {:?}", other),
        }
    }

    #[test]
    fn match_statement_with_patterns() {
        let source = "match x:\n    case 1:\n        pass\n    case [a, *rest]:\n        pass\n    case Point(x=0) | None:\n        pass\n    case other:\n        pass\n";
        let (module, body) = parse_clean(source);
        match &module.ast.stmt(body[0]).kind {
            StmtKind::Match { cases, .. } => assert_eq!(cases.len(), 4),
            other => panic!("expected a match, got {:?}", other),
        }
    }

    #[test]
    fn pretty_output_reparses_to_the_same_tree() {
        let source = "struct Point:\n    x: Float\n    y: Float\ndef mid(a: Float, b: Float) -> Float:\n    if a < b:\n        return (a + b) / 2\n    return a\nz = mid(1.0, 3.0)\n";
        let (module, body) = parse_clean(source);
        let printed = pretty_module(&module.ast, &body);

        let (module2, body2) = parse_clean(&printed);
        let reprinted = pretty_module(&module2.ast, &body2);
        assert_eq!(printed, reprinted);
    }

    #[test]
    fn list_comprehension_with_guard() {
        let (module, body) = parse_clean("[x * 2 for x in xs if x > 0]\n");
        match &module.ast.stmt(body[0]).kind {
            StmtKind::Expr { value } => match &module.ast.expr(*value).kind {
                ExprKind::ListComp { generators, .. } => {
                    assert_eq!(generators.len(), 1);
                    assert_eq!(generators[0].ifs.len(), 1);
                }
                other => panic!("expected a list comprehension, got {:?}", other),
            },
            other => panic!("expected an expression statement, got {:?}", other),
        }
    }

    #[test]
    fn tuple_unpacking_assignment() {
        let (module, body) = parse_clean("a, b = f()\n");
        match &module.ast.stmt(body[0]).kind {
            StmtKind::Assign { targets, .. } => {
                assert_eq!(targets.len(), 1);
                match &module.ast.expr(targets[0]).kind {
                    ExprKind::TupleExpr { elts, ctx } => {
                        assert_eq!(elts.len(), 2);
                        assert_eq!(*ctx, ExprContext::Store);
                    }
                    other => panic!("expected a tuple target, got {:?}", other),
                }
            }
            other => panic!("expected an assignment, got {:?}", other),
        }
    }
}
