//! Render a module back to source text.
//!
//! The output is parseable again and parses to an equivalent tree; it is
//! also what `--dump-ast` prints. Nested operands are parenthesised
//! explicitly so the reconstructed precedence is visible.

use super::{
    BinaryOperator, BoolOperator, CmpOperator, ExprId, ExprKind, PatternKind, StmtId, StmtKind,
    UnaryOperator,
};
use crate::module::Ast;

pub fn pretty_module(ast: &Ast, body: &[StmtId]) -> String {
    let mut printer = Printer {
        ast,
        out: String::new(),
        depth: 0,
    };
    for &stmt in body {
        printer.stmt(stmt);
    }
    printer.out
}

pub fn pretty_expr(ast: &Ast, expr: ExprId) -> String {
    Printer {
        ast,
        out: String::new(),
        depth: 0,
    }
    .expr(expr)
}

struct Printer<'a> {
    ast: &'a Ast,
    out: String,
    depth: usize,
}

impl<'a> Printer<'a> {
    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn block(&mut self, body: &[StmtId]) {
        self.depth += 1;
        if body.is_empty() {
            self.line("pass");
        }
        for &stmt in body {
            self.stmt(stmt);
        }
        self.depth -= 1;
    }

    fn stmt(&mut self, id: StmtId) {
        match &self.ast.stmt(id).kind {
            StmtKind::FunctionDef(def) => {
                let mut header = String::new();
                if def.is_async {
                    header.push_str("async ");
                }
                header.push_str("def ");
                header.push_str(&def.name);
                header.push('(');
                let defaults_from = def.args.args.len() - def.args.defaults.len();
                for (i, arg) in def.args.args.iter().enumerate() {
                    if i > 0 {
                        header.push_str(", ");
                    }
                    header.push_str(&arg.name);
                    if let Some(ref ann) = arg.annotation {
                        header.push_str(": ");
                        header.push_str(&ann.to_string());
                    }
                    if i >= defaults_from {
                        header.push_str(" = ");
                        header.push_str(&self.expr(def.args.defaults[i - defaults_from]));
                    }
                }
                header.push(')');
                if let Some(ref ret) = def.returns {
                    header.push_str(" -> ");
                    header.push_str(&ret.to_string());
                }
                header.push(':');
                self.line(&header);

                self.depth += 1;
                if let Some(ref doc) = def.docstring {
                    let doc = format!("\"\"\"{}\"\"\"", doc);
                    self.line(&doc);
                }
                self.depth -= 1;
                self.block(&def.body);
            }
            StmtKind::ClassDef(def) => {
                let header = format!("struct {}:", def.name);
                self.line(&header);
                self.depth += 1;
                if let Some(ref doc) = def.docstring {
                    let doc = format!("\"\"\"{}\"\"\"", doc);
                    self.line(&doc);
                }
                self.depth -= 1;
                self.block(&def.body);
            }
            StmtKind::Return { value } => match value {
                Some(v) => {
                    let text = format!("return {}", self.expr(*v));
                    self.line(&text);
                }
                None => self.line("return"),
            },
            StmtKind::Delete { targets } => {
                let text = format!("del {}", self.expr_list(targets));
                self.line(&text);
            }
            StmtKind::Assign { targets, value } => {
                let mut text = String::new();
                for target in targets {
                    text.push_str(&self.expr(*target));
                    text.push_str(" = ");
                }
                text.push_str(&self.expr(*value));
                self.line(&text);
            }
            StmtKind::AugAssign { target, op, value } => {
                let text = format!(
                    "{} {}= {}",
                    self.expr(*target),
                    binop_str(*op),
                    self.expr(*value)
                );
                self.line(&text);
            }
            StmtKind::AnnAssign {
                target,
                annotation,
                value,
            } => {
                let mut text = self.expr(*target);
                if let Some(ann) = annotation {
                    text.push_str(": ");
                    text.push_str(&ann.to_string());
                }
                if let Some(v) = value {
                    text.push_str(" = ");
                    text.push_str(&self.expr(*v));
                }
                self.line(&text);
            }
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
            } => {
                let text = format!("for {} in {}:", self.expr(*target), self.expr(*iter));
                self.line(&text);
                self.block(body);
                if !orelse.is_empty() {
                    self.line("else:");
                    self.block(orelse);
                }
            }
            StmtKind::While { test, body, orelse } => {
                let text = format!("while {}:", self.expr(*test));
                self.line(&text);
                self.block(body);
                if !orelse.is_empty() {
                    self.line("else:");
                    self.block(orelse);
                }
            }
            StmtKind::If { test, body, orelse } => {
                let text = format!("if {}:", self.expr(*test));
                self.line(&text);
                self.block(body);
                if !orelse.is_empty() {
                    self.line("else:");
                    self.block(orelse);
                }
            }
            StmtKind::With { items, body } => {
                let mut text = String::from("with ");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        text.push_str(", ");
                    }
                    text.push_str(&self.expr(item.context_expr));
                    if let Some(vars) = item.optional_vars {
                        text.push_str(" as ");
                        text.push_str(&self.expr(vars));
                    }
                }
                text.push(':');
                self.line(&text);
                self.block(body);
            }
            StmtKind::Raise { exc, cause } => {
                let mut text = String::from("raise");
                if let Some(e) = exc {
                    text.push(' ');
                    text.push_str(&self.expr(*e));
                }
                if let Some(c) = cause {
                    text.push_str(" from ");
                    text.push_str(&self.expr(*c));
                }
                self.line(&text);
            }
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => {
                self.line("try:");
                self.block(body);
                for handler in handlers {
                    let mut text = String::from("except");
                    if let Some(t) = handler.typ {
                        text.push(' ');
                        text.push_str(&self.expr(t));
                    }
                    if let Some(ref name) = handler.name {
                        text.push_str(" as ");
                        text.push_str(name);
                    }
                    text.push(':');
                    self.line(&text);
                    self.block(&handler.body);
                }
                if !orelse.is_empty() {
                    self.line("else:");
                    self.block(orelse);
                }
                if !finalbody.is_empty() {
                    self.line("finally:");
                    self.block(finalbody);
                }
            }
            StmtKind::Assert { test, msg } => {
                let mut text = format!("assert {}", self.expr(*test));
                if let Some(m) = msg {
                    text.push_str(", ");
                    text.push_str(&self.expr(*m));
                }
                self.line(&text);
            }
            StmtKind::Import { names } => {
                let mut text = String::from("import ");
                for (i, alias) in names.iter().enumerate() {
                    if i > 0 {
                        text.push_str(", ");
                    }
                    text.push_str(&alias.name);
                    if let Some(ref asname) = alias.asname {
                        text.push_str(" as ");
                        text.push_str(asname);
                    }
                }
                self.line(&text);
            }
            StmtKind::ImportFrom { module, names } => {
                let mut text = String::from("from ");
                text.push_str(module.as_deref().unwrap_or("."));
                text.push_str(" import ");
                for (i, alias) in names.iter().enumerate() {
                    if i > 0 {
                        text.push_str(", ");
                    }
                    text.push_str(&alias.name);
                    if let Some(ref asname) = alias.asname {
                        text.push_str(" as ");
                        text.push_str(asname);
                    }
                }
                self.line(&text);
            }
            StmtKind::Global { names } => {
                let text = format!("global {}", names.join(", "));
                self.line(&text);
            }
            StmtKind::Nonlocal { names } => {
                let text = format!("nonlocal {}", names.join(", "));
                self.line(&text);
            }
            StmtKind::Expr { value } => {
                let text = self.expr(*value);
                self.line(&text);
            }
            StmtKind::Pass => self.line("pass"),
            StmtKind::Break => self.line("break"),
            StmtKind::Continue => self.line("continue"),
            StmtKind::Match { subject, cases } => {
                let text = format!("match {}:", self.expr(*subject));
                self.line(&text);
                self.depth += 1;
                for case in cases {
                    let mut text = format!("case {}", self.pattern(case.pattern));
                    if let Some(guard) = case.guard {
                        text.push_str(" if ");
                        text.push_str(&self.expr(guard));
                    }
                    text.push(':');
                    self.line(&text);
                    self.block(&case.body);
                }
                self.depth -= 1;
            }
            StmtKind::Jump { destination } => {
                let text = format!("jump {}", destination);
                self.line(&text);
            }
            StmtKind::CondJump {
                test,
                then_jmp,
                else_jmp,
            } => {
                let text = format!(
                    "condjump {} then {} else {}",
                    self.expr(*test),
                    then_jmp,
                    else_jmp
                );
                self.line(&text);
            }
            StmtKind::IterJump {
                target,
                iter,
                body_jmp,
                else_jmp,
            } => {
                let text = format!(
                    "iterjump {} in {} body {} else {}",
                    self.expr(*target),
                    self.expr(*iter),
                    body_jmp,
                    else_jmp
                );
                self.line(&text);
            }
            StmtKind::IterEnd { start } => {
                let text = format!("iterend {}", start);
                self.line(&text);
            }
            StmtKind::NativeFunction { name } => {
                let text = format!("native {}", name);
                self.line(&text);
            }
        }
    }

    fn pattern(&self, id: super::PatId) -> String {
        match &self.ast.pattern(id).kind {
            PatternKind::MatchValue(v) => self.expr(*v),
            PatternKind::MatchSingleton(c) => c.to_string(),
            PatternKind::MatchSequence(pats) => {
                let inner: Vec<String> = pats.iter().map(|p| self.pattern(*p)).collect();
                format!("[{}]", inner.join(", "))
            }
            PatternKind::MatchMapping {
                keys,
                patterns,
                rest,
            } => {
                let mut parts: Vec<String> = keys
                    .iter()
                    .zip(patterns)
                    .map(|(k, p)| format!("{}: {}", self.expr(*k), self.pattern(*p)))
                    .collect();
                if let Some(rest) = rest {
                    parts.push(format!("**{}", rest));
                }
                format!("{{{}}}", parts.join(", "))
            }
            PatternKind::MatchClass {
                cls,
                patterns,
                kwd_attrs,
                kwd_patterns,
            } => {
                let mut parts: Vec<String> = patterns.iter().map(|p| self.pattern(*p)).collect();
                parts.extend(
                    kwd_attrs
                        .iter()
                        .zip(kwd_patterns)
                        .map(|(a, p)| format!("{}={}", a, self.pattern(*p))),
                );
                format!("{}({})", self.expr(*cls), parts.join(", "))
            }
            PatternKind::MatchStar(name) => {
                format!("*{}", name.as_deref().unwrap_or("_"))
            }
            PatternKind::MatchAs { pattern, name } => match (pattern, name) {
                (Some(p), Some(n)) => format!("{} as {}", self.pattern(*p), n),
                (None, Some(n)) => n.clone(),
                _ => "_".to_string(),
            },
            PatternKind::MatchOr(pats) => {
                let inner: Vec<String> = pats.iter().map(|p| self.pattern(*p)).collect();
                inner.join(" | ")
            }
        }
    }

    fn expr_list(&self, exprs: &[ExprId]) -> String {
        let parts: Vec<String> = exprs.iter().map(|e| self.expr(*e)).collect();
        parts.join(", ")
    }

    /// Parenthesise operands that are not atoms so precedence survives the
    /// round trip.
    fn operand(&self, id: ExprId) -> String {
        let text = self.expr(id);
        match &self.ast.expr(id).kind {
            ExprKind::BinOp { .. }
            | ExprKind::BoolOp { .. }
            | ExprKind::Compare { .. }
            | ExprKind::IfExp { .. }
            | ExprKind::Lambda { .. } => format!("({})", text),
            _ => text,
        }
    }

    fn expr(&self, id: ExprId) -> String {
        match &self.ast.expr(id).kind {
            ExprKind::BoolOp { op, values } => {
                let joiner = match op {
                    BoolOperator::And => " and ",
                    BoolOperator::Or => " or ",
                };
                let parts: Vec<String> = values.iter().map(|v| self.operand(*v)).collect();
                parts.join(joiner)
            }
            ExprKind::NamedExpr { target, value } => {
                format!("({} := {})", self.expr(*target), self.expr(*value))
            }
            ExprKind::BinOp { left, op, right } => {
                format!(
                    "{} {} {}",
                    self.operand(*left),
                    binop_str(*op),
                    self.operand(*right)
                )
            }
            ExprKind::UnaryOp { op, operand } => {
                let spelled = match op {
                    UnaryOperator::Invert => "~",
                    UnaryOperator::Not => "not ",
                    UnaryOperator::UAdd => "+",
                    UnaryOperator::USub => "-",
                };
                format!("{}{}", spelled, self.operand(*operand))
            }
            ExprKind::Lambda { args, body } => {
                format!("lambda {}: {}", args.join(", "), self.expr(*body))
            }
            ExprKind::IfExp { test, body, orelse } => {
                format!(
                    "{} if {} else {}",
                    self.operand(*body),
                    self.operand(*test),
                    self.operand(*orelse)
                )
            }
            ExprKind::DictExpr { keys, values } => {
                let parts: Vec<String> = keys
                    .iter()
                    .zip(values)
                    .map(|(k, v)| format!("{}: {}", self.expr(*k), self.expr(*v)))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            ExprKind::SetExpr { elts } => format!("{{{}}}", self.expr_list(elts)),
            ExprKind::ListComp { elt, generators } => {
                format!("[{}{}]", self.expr(*elt), self.generators(generators))
            }
            ExprKind::SetComp { elt, generators } => {
                format!("{{{}{}}}", self.expr(*elt), self.generators(generators))
            }
            ExprKind::DictComp {
                key,
                value,
                generators,
            } => {
                format!(
                    "{{{}: {}{}}}",
                    self.expr(*key),
                    self.expr(*value),
                    self.generators(generators)
                )
            }
            ExprKind::GeneratorExp { elt, generators } => {
                format!("({}{})", self.expr(*elt), self.generators(generators))
            }
            ExprKind::Await { value } => format!("await {}", self.operand(*value)),
            ExprKind::Yield { value } => match value {
                Some(v) => format!("yield {}", self.expr(*v)),
                None => "yield".to_string(),
            },
            ExprKind::YieldFrom { value } => format!("yield from {}", self.expr(*value)),
            ExprKind::Compare {
                left,
                ops,
                comparators,
            } => {
                let mut text = self.operand(*left);
                for (op, cmp) in ops.iter().zip(comparators) {
                    text.push(' ');
                    text.push_str(cmpop_str(*op));
                    text.push(' ');
                    text.push_str(&self.operand(*cmp));
                }
                text
            }
            ExprKind::Call {
                func,
                args,
                keywords,
            } => {
                let mut parts: Vec<String> = args.iter().map(|a| self.expr(*a)).collect();
                for kw in keywords {
                    match &kw.arg {
                        Some(name) => parts.push(format!("{}={}", name, self.expr(kw.value))),
                        None => parts.push(format!("**{}", self.expr(kw.value))),
                    }
                }
                format!("{}({})", self.operand(*func), parts.join(", "))
            }
            ExprKind::JoinedStr { values } => {
                let parts: Vec<String> = values.iter().map(|v| self.expr(*v)).collect();
                format!("f\"{}\"", parts.join(""))
            }
            ExprKind::FormattedValue { value } => format!("{{{}}}", self.expr(*value)),
            ExprKind::Constant(value) => value.to_string(),
            ExprKind::Attribute { value, attr, .. } => {
                format!("{}.{}", self.operand(*value), attr)
            }
            ExprKind::Subscript { value, slice, .. } => {
                format!("{}[{}]", self.operand(*value), self.expr(*slice))
            }
            ExprKind::Starred { value, .. } => format!("*{}", self.expr(*value)),
            ExprKind::Name { id, .. } => id.clone(),
            ExprKind::ListExpr { elts, .. } => format!("[{}]", self.expr_list(elts)),
            ExprKind::TupleExpr { elts, .. } => {
                if elts.len() == 1 {
                    format!("({},)", self.expr(elts[0]))
                } else {
                    format!("({})", self.expr_list(elts))
                }
            }
            ExprKind::Slice { lower, upper, step } => {
                let mut text = String::new();
                if let Some(l) = lower {
                    text.push_str(&self.expr(*l));
                }
                text.push(':');
                if let Some(u) = upper {
                    text.push_str(&self.expr(*u));
                }
                if let Some(s) = step {
                    text.push(':');
                    text.push_str(&self.expr(*s));
                }
                text
            }
        }
    }

    fn generators(&self, generators: &[super::Comprehension]) -> String {
        let mut text = String::new();
        for gen in generators {
            text.push_str(" for ");
            text.push_str(&self.expr(gen.target));
            text.push_str(" in ");
            text.push_str(&self.expr(gen.iter));
            for guard in &gen.ifs {
                text.push_str(" if ");
                text.push_str(&self.expr(*guard));
            }
        }
        text
    }
}

fn binop_str(op: BinaryOperator) -> &'static str {
    match op {
        BinaryOperator::Add => "+",
        BinaryOperator::Sub => "-",
        BinaryOperator::Mult => "*",
        BinaryOperator::MatMult => ".*",
        BinaryOperator::Div => "/",
        BinaryOperator::Mod => "%",
        BinaryOperator::Pow => "^",
        BinaryOperator::LShift => "<<",
        BinaryOperator::RShift => ">>",
        BinaryOperator::BitOr => "|",
        BinaryOperator::BitXor => "xor",
        BinaryOperator::BitAnd => "&",
        BinaryOperator::FloorDiv => "//",
    }
}

fn cmpop_str(op: CmpOperator) -> &'static str {
    match op {
        CmpOperator::Eq => "==",
        CmpOperator::NotEq => "!=",
        CmpOperator::Lt => "<",
        CmpOperator::LtE => "<=",
        CmpOperator::Gt => ">",
        CmpOperator::GtE => ">=",
        CmpOperator::Is => "is",
        CmpOperator::IsNot => "is not",
        CmpOperator::In => "in",
        CmpOperator::NotIn => "not in",
    }
}
