//! Linearisation of a (SSA-lowered) module into a program vector.
//!
//! Structural statements expand into `CondJump`/`Jump`/`IterJump`
//! pseudo-statements whose destinations are patched once the extent of
//! each block is known. `Break` and `Continue` emit unpatched jumps
//! registered with the innermost `LoopContext` and get their destinations
//! when the loop finishes lowering.

use crate::ast::{FunctionDef, Span, Stmt, StmtId, StmtKind};
use crate::module::Ast;
use crate::sema::bindings::{BindingValue, Bindings};

use super::{Instruction, Label, Program};

/// Name of the synthetic function wrapping module-level statements.
pub const MAIN: &str = "__main__";

/// Move module-level non-definition statements into a synthetic
/// `__main__` so every instruction belongs to a labelled function and
/// execution has a well-defined entry point. Run before semantic
/// analysis so the wrapper gets a scope of its own.
pub fn wrap_main(ast: &mut Ast, body: Vec<StmtId>) -> Vec<StmtId> {
    let mut definitions = Vec::new();
    let mut toplevel = Vec::new();

    for stmt in body {
        match &ast.stmt(stmt).kind {
            StmtKind::FunctionDef(_)
            | StmtKind::ClassDef(_)
            | StmtKind::Import { .. }
            | StmtKind::ImportFrom { .. } => definitions.push(stmt),
            _ => toplevel.push(stmt),
        }
    }

    if !toplevel.is_empty() {
        let mut main = FunctionDef::new(MAIN.to_string());
        main.body = toplevel;
        let stmt = ast.alloc_stmt(Stmt::new(StmtKind::FunctionDef(main), Span::unknown()));
        definitions.push(stmt);
    }

    definitions
}

#[derive(Default)]
struct LoopContext {
    break_jmps: Vec<StmtId>,
    continue_jmps: Vec<StmtId>,
}

pub struct VmGen<'a> {
    ast: &'a mut Ast,
    program: Program,
    loop_ctx: Vec<LoopContext>,
    current_class: Option<String>,
    depth: usize,
}

impl<'a> VmGen<'a> {
    pub fn new(ast: &'a mut Ast) -> Self {
        Self {
            ast,
            program: Program::default(),
            loop_ctx: Vec::new(),
            current_class: None,
            depth: 0,
        }
    }

    /// Lower a module body. Native builtins from the prelude get their
    /// entry instructions first so calls can resolve them by label.
    pub fn lower_module(mut self, body: &[StmtId], bindings: &Bindings) -> Program {
        for (_, entry) in bindings.iter() {
            if let Some(BindingValue::Native(name)) = &entry.value {
                let stmt = self.ast.alloc_stmt(Stmt::new(
                    StmtKind::NativeFunction { name: name.clone() },
                    Span::unknown(),
                ));
                self.add_label(name.clone(), stmt);
                self.add_instruction(stmt);
            }
        }

        for &stmt in body {
            self.exec_stmt(stmt);
        }
        self.program
    }

    fn instruction_counter(&self) -> usize {
        self.program.instructions.len()
    }

    fn add_instruction(&mut self, stmt: StmtId) -> usize {
        let index = self.program.instructions.len();
        self.program.instructions.push(Instruction { stmt });
        index
    }

    fn add_label(&mut self, name: String, stmt: StmtId) {
        let label = Label {
            name,
            stmt,
            index: self.program.instructions.len(),
            depth: self.depth,
        };
        log::debug!("label {} at {}", label.name, label.index);
        self.program.labels.push(label);
    }

    fn add_body(&mut self, body: &[StmtId]) {
        self.depth += 1;
        for &stmt in body {
            self.exec_stmt(stmt);
        }
        self.depth -= 1;
    }

    fn alloc_stmt(&mut self, kind: StmtKind, span: Span) -> StmtId {
        self.ast.alloc_stmt(Stmt::new(kind, span))
    }

    fn exec_stmt(&mut self, id: StmtId) {
        let span = self.ast.stmt(id).span;
        let kind = self.ast.stmt(id).kind.clone();

        match kind {
            // plain statements become one instruction each
            StmtKind::Return { .. }
            | StmtKind::Delete { .. }
            | StmtKind::Assign { .. }
            | StmtKind::AugAssign { .. }
            | StmtKind::AnnAssign { .. }
            | StmtKind::Expr { .. }
            | StmtKind::Raise { .. }
            | StmtKind::Global { .. }
            | StmtKind::Nonlocal { .. } => {
                self.add_instruction(id);
            }

            StmtKind::Pass => {}
            StmtKind::Import { .. } | StmtKind::ImportFrom { .. } => {}

            StmtKind::Break => {
                let jmp = self.alloc_stmt(StmtKind::Jump { destination: 0 }, span);
                self.add_instruction(jmp);
                if let Some(ctx) = self.loop_ctx.last_mut() {
                    ctx.break_jmps.push(jmp);
                } else {
                    log::warn!("break outside of a loop");
                }
            }
            StmtKind::Continue => {
                let jmp = self.alloc_stmt(StmtKind::Jump { destination: 0 }, span);
                self.add_instruction(jmp);
                if let Some(ctx) = self.loop_ctx.last_mut() {
                    ctx.continue_jmps.push(jmp);
                } else {
                    log::warn!("continue outside of a loop");
                }
            }

            StmtKind::Assert { test, msg } => {
                // condjump over a raise
                let jmp = self.alloc_stmt(
                    StmtKind::CondJump {
                        test,
                        then_jmp: 0,
                        else_jmp: 0,
                    },
                    span,
                );
                self.add_instruction(jmp);

                let raise = self.alloc_stmt(StmtKind::Raise { exc: msg, cause: None }, span);
                let raise_idx = self.instruction_counter();
                self.add_instruction(raise);

                self.patch_condjump(jmp, raise_idx + 1, raise_idx);
            }

            StmtKind::If { test, body, orelse } => {
                let jmp = self.alloc_stmt(
                    StmtKind::CondJump {
                        test,
                        then_jmp: 0,
                        else_jmp: 0,
                    },
                    span,
                );
                self.add_instruction(jmp);

                let then_jmp = self.instruction_counter();
                self.add_body(&body);

                // skip the orelse once the body ran
                let skip = if orelse.is_empty() {
                    None
                } else {
                    let skip = self.alloc_stmt(StmtKind::Jump { destination: 0 }, span);
                    self.add_instruction(skip);
                    Some(skip)
                };

                let else_jmp = self.instruction_counter();
                self.add_body(&orelse);
                let end = self.instruction_counter();

                self.patch_condjump(jmp, then_jmp, else_jmp);
                if let Some(skip) = skip {
                    self.patch_jump(skip, end);
                }
            }

            StmtKind::While { test, body, orelse } => {
                self.loop_ctx.push(LoopContext::default());

                let start = self.instruction_counter();
                let jmp = self.alloc_stmt(
                    StmtKind::CondJump {
                        test,
                        then_jmp: 0,
                        else_jmp: 0,
                    },
                    span,
                );
                self.add_instruction(jmp);

                let then_jmp = self.instruction_counter();
                self.add_body(&body);

                // back to the condition
                let back = self.alloc_stmt(StmtKind::Jump { destination: start }, span);
                self.add_instruction(back);

                let else_jmp = self.instruction_counter();
                self.add_body(&orelse);
                let end = self.instruction_counter();

                self.patch_condjump(jmp, then_jmp, else_jmp);

                let ctx = self.loop_ctx.pop().unwrap();
                for brk in ctx.break_jmps {
                    // skip the orelse
                    self.patch_jump(brk, end);
                }
                for cont in ctx.continue_jmps {
                    // back to the top of the loop
                    self.patch_jump(cont, start);
                }
            }

            StmtKind::For {
                target,
                iter,
                body,
                orelse,
            } => {
                self.loop_ctx.push(LoopContext::default());

                let start = self.instruction_counter();
                let jmp = self.alloc_stmt(
                    StmtKind::IterJump {
                        target,
                        iter,
                        body_jmp: 0,
                        else_jmp: 0,
                    },
                    span,
                );
                self.add_instruction(jmp);

                let body_jmp = self.instruction_counter();
                self.add_body(&body);

                let back = self.alloc_stmt(StmtKind::Jump { destination: start }, span);
                self.add_instruction(back);

                let else_jmp = self.instruction_counter();
                self.add_body(&orelse);

                // every exit path releases the iterator; a break would
                // otherwise leave it mid-way for the next entry
                let cleanup = self.instruction_counter();
                let iter_end = self.alloc_stmt(StmtKind::IterEnd { start }, span);
                self.add_instruction(iter_end);

                if let StmtKind::IterJump {
                    body_jmp: b,
                    else_jmp: e,
                    ..
                } = &mut self.ast.stmt_mut(jmp).kind
                {
                    *b = body_jmp;
                    *e = else_jmp;
                }

                let ctx = self.loop_ctx.pop().unwrap();
                for brk in ctx.break_jmps {
                    // skip the orelse, release the iterator
                    self.patch_jump(brk, cleanup);
                }
                for cont in ctx.continue_jmps {
                    self.patch_jump(cont, start);
                }
            }

            StmtKind::FunctionDef(def) => {
                let label_name = match &self.current_class {
                    Some(class_name) => format!("{}.{}", class_name, def.name),
                    None => def.name.clone(),
                };
                self.add_label(label_name, id);
                self.add_body(&def.body);

                // a function that falls off its body still returns
                let implicit = self.alloc_stmt(StmtKind::Return { value: None }, span);
                self.add_instruction(implicit);
            }

            StmtKind::ClassDef(def) => {
                // only methods end up in the program; attributes are
                // compile-time only
                let saved = self.current_class.replace(def.name.clone());
                for &stmt in &def.body {
                    if matches!(self.ast.stmt(stmt).kind, StmtKind::FunctionDef(_)) {
                        self.exec_stmt(stmt);
                    }
                }
                self.current_class = saved;
            }

            // TODO: lower with/try to explicit enter/exit calls and jump
            // tables once exceptions carry through the interpreter
            StmtKind::With { body, .. } => {
                self.add_body(&body);
            }
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => {
                self.add_body(&body);
                for handler in &handlers {
                    self.add_body(&handler.body);
                }
                self.add_body(&orelse);
                self.add_body(&finalbody);
            }

            StmtKind::Match { .. } => {
                log::warn!("match lowering is not implemented; statement skipped");
            }

            StmtKind::Jump { .. }
            | StmtKind::CondJump { .. }
            | StmtKind::IterJump { .. }
            | StmtKind::IterEnd { .. }
            | StmtKind::NativeFunction { .. } => {
                self.add_instruction(id);
            }
        }
    }

    fn patch_condjump(&mut self, stmt: StmtId, then_target: usize, else_target: usize) {
        if let StmtKind::CondJump {
            then_jmp, else_jmp, ..
        } = &mut self.ast.stmt_mut(stmt).kind
        {
            *then_jmp = then_target;
            *else_jmp = else_target;
        }
    }

    fn patch_jump(&mut self, stmt: StmtId, target: usize) {
        if let StmtKind::Jump { destination } = &mut self.ast.stmt_mut(stmt).kind {
            *destination = target;
        }
    }
}
