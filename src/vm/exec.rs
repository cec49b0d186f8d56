//! Program execution.
//!
//! `ic` walks the instruction vector; every instruction re-dispatches on
//! the statement it points at and advances `ic` by one unless it writes
//! `ic` itself (jumps compensate by targeting `destination - 1`).
//! Execution halts when `ic` leaves the program, and the result is the
//! `ReturnValue` register.
//!
//! Calls push the evaluated arguments onto the variable stack (they
//! become the callee's first locals), recurse into the callee's entry
//! label and truncate the stack back to its pre-call length on return.

use std::collections::HashMap;

use anyhow::{anyhow, bail, Result};

use crate::ast::{ExprContext, ExprId, ExprKind, StmtId, StmtKind};
use crate::module::Ast;
use crate::sema::bindings::{BindingValue, Bindings};

use super::value::Value;
use super::{Program, Register, Registers};

struct Frame {
    base: usize,
    scope_start: usize,
}

pub struct VmExec<'a> {
    ast: &'a Ast,
    program: &'a Program,
    ic: i64,
    variables: Vec<Value>,
    registers: Registers,
    /// varid → value for bindings outside the current frame: function
    /// labels, native builtins and prelude constants.
    globals: HashMap<i32, Value>,
    /// live iterator state per (frame depth, instruction index)
    iters: HashMap<(usize, usize), (Vec<Value>, usize)>,
    frames: Vec<Frame>,
}

impl<'a> VmExec<'a> {
    pub fn new(ast: &'a Ast, program: &'a Program, bindings: &Bindings) -> Self {
        let mut globals = HashMap::new();

        for label in &program.labels {
            if let Some((varid, _)) = bindings.lookup(&label.name) {
                globals.insert(varid as i32, Value::Label(label.index));
            }
        }
        for (varid, entry) in bindings.iter() {
            if let Some(BindingValue::Constant(constant)) = &entry.value {
                globals.insert(varid as i32, Value::from_constant(constant));
            }
        }

        Self {
            ast,
            program,
            ic: 0,
            variables: Vec::new(),
            registers: Registers::default(),
            globals,
            iters: HashMap::new(),
            frames: Vec::new(),
        }
    }

    /// Execute a named entry point to completion.
    pub fn execute_label(&mut self, name: &str) -> Result<Value> {
        let label = self
            .program
            .label(name)
            .ok_or_else(|| anyhow!("no entry point named `{}`", name))?;
        let scope_start = self.scope_start_of(label.stmt);
        let index = label.index as i64;

        self.frames.push(Frame {
            base: self.variables.len(),
            scope_start,
        });
        self.registers.set(Register::ReturnAddress, Value::Int(-1));
        let result = self.execute(index);
        self.frames.pop();
        self.drop_dead_iterators();
        result
    }

    /// Iterator state belonging to frames that no longer exist (a `break`
    /// can leave a loop with its iterator still live).
    fn drop_dead_iterators(&mut self) {
        let depth = self.frames.len();
        self.iters.retain(|(frame, _), _| *frame <= depth);
    }

    fn execute(&mut self, entry: i64) -> Result<Value> {
        self.ic = entry;
        loop {
            if self.ic < 0 || self.ic as usize >= self.program.size() {
                return Ok(self.registers.get(Register::ReturnValue));
            }
            let instruction = self.program.instructions[self.ic as usize];
            self.exec_instruction(instruction.stmt)?;
            self.ic += 1;
        }
    }

    fn scope_start_of(&self, stmt: StmtId) -> usize {
        match &self.ast.stmt(stmt).kind {
            StmtKind::FunctionDef(def) => def.scope_start.unwrap_or(0),
            _ => 0,
        }
    }

    fn frame(&self) -> &Frame {
        self.frames.last().expect("no active frame")
    }

    /// Stack slot for a varid of the current frame, or `None` when the
    /// binding lives outside it.
    fn slot_of(&self, varid: i32) -> Option<usize> {
        if varid < 0 {
            return None;
        }
        let frame = self.frame();
        let varid = varid as usize;
        (varid >= frame.scope_start).then(|| frame.base + (varid - frame.scope_start))
    }

    fn store(&mut self, varid: i32, value: Value) {
        match self.slot_of(varid) {
            Some(slot) => {
                if slot >= self.variables.len() {
                    self.variables.resize(slot + 1, Value::None);
                }
                self.variables[slot] = value;
            }
            None => {
                self.globals.insert(varid, value);
            }
        }
    }

    fn load(&self, varid: i32, name: &str) -> Result<Value> {
        if let Some(slot) = self.slot_of(varid) {
            if let Some(value) = self.variables.get(slot) {
                return Ok(value.clone());
            }
            bail!("variable `{}` read before assignment", name);
        }
        self.globals
            .get(&varid)
            .cloned()
            .ok_or_else(|| anyhow!("name `{}` is not defined at run time", name))
    }

    // ── instructions ───────────────────────────────────────────────────

    fn exec_instruction(&mut self, stmt: StmtId) -> Result<()> {
        let kind = self.ast.stmt(stmt).kind.clone();

        match kind {
            StmtKind::AnnAssign { target, value, .. } => {
                let value = match value {
                    Some(v) => self.exec_expr(v)?,
                    None => Value::None,
                };
                self.assign_to(target, value)
            }
            StmtKind::Assign { targets, value } => {
                let value = self.exec_expr(value)?;
                for target in targets {
                    self.assign_to(target, value.clone())?;
                }
                Ok(())
            }
            StmtKind::AugAssign { target, op, value } => {
                let rhs = self.exec_expr(value)?;
                let (varid, name) = match &self.ast.expr(target).kind {
                    ExprKind::Name { id, varid, .. } => (*varid, id.clone()),
                    _ => bail!("augmented assignment to a non-name target"),
                };
                let current = self.load(varid, &name)?;
                let value = current
                    .binary_op(op, &rhs)
                    .ok_or_else(|| anyhow!("unsupported operand for augmented assignment"))?;
                self.store(varid, value);
                Ok(())
            }
            StmtKind::Expr { value } => {
                // evaluated for its side effects
                self.exec_expr(value)?;
                Ok(())
            }
            StmtKind::Return { value } => {
                let result = match value {
                    Some(v) => self.exec_expr(v)?,
                    None => Value::None,
                };
                self.registers.set(Register::ReturnValue, result);
                let address = match self.registers.get(Register::ReturnAddress) {
                    Value::Int(address) => address,
                    _ => -1,
                };
                // land on the return address after the implicit increment
                self.ic = address - 1;
                Ok(())
            }
            StmtKind::Delete { targets } => {
                // deleted slots become unusable
                for target in targets {
                    if let ExprKind::Name { varid, .. } = &self.ast.expr(target).kind {
                        self.store(*varid, Value::None);
                    }
                }
                Ok(())
            }
            StmtKind::CondJump {
                test,
                then_jmp,
                else_jmp,
            } => {
                let value = self.exec_expr(test)?;
                self.ic = if value.truthy() {
                    then_jmp as i64 - 1
                } else {
                    else_jmp as i64 - 1
                };
                Ok(())
            }
            StmtKind::Jump { destination } => {
                self.ic = destination as i64 - 1;
                Ok(())
            }
            StmtKind::IterJump {
                target,
                iter,
                else_jmp,
                ..
            } => self.iter_jump(target, iter, else_jmp),
            StmtKind::IterEnd { start } => {
                self.iters.remove(&(self.frames.len(), start));
                Ok(())
            }
            StmtKind::Raise { exc, .. } => {
                let message = match exc {
                    Some(exc) => self.exec_expr(exc)?.to_string(),
                    None => "exception raised".to_string(),
                };
                bail!("AssertionError: {}", message)
            }
            StmtKind::Global { .. } | StmtKind::Nonlocal { .. } => Ok(()),
            StmtKind::NativeFunction { name } => {
                bail!("native function `{}` executed outside a call", name)
            }
            other => bail!("statement should have been lowered to jumps: {:?}", other),
        }
    }

    fn assign_to(&mut self, target: ExprId, value: Value) -> Result<()> {
        match &self.ast.expr(target).kind {
            ExprKind::Name { varid, id, .. } => {
                if *varid < 0 {
                    bail!("store to unresolved name `{}`", id);
                }
                self.store(*varid, value);
                Ok(())
            }
            other => bail!("unsupported assignment target: {:?}", other),
        }
    }

    fn iter_jump(&mut self, target: ExprId, iter: ExprId, else_jmp: usize) -> Result<()> {
        let key = (self.frames.len(), self.ic as usize);

        if !self.iters.contains_key(&key) {
            let items = match self.exec_expr(iter)? {
                Value::List(items) | Value::Tuple(items) => items,
                Value::Str(s) => s.chars().map(|c| Value::Str(c.to_string())).collect(),
                other => bail!("`{}` is not iterable", other),
            };
            self.iters.insert(key, (items, 0));
        }

        let (items, position) = self.iters.get_mut(&key).unwrap();
        if *position >= items.len() {
            self.iters.remove(&key);
            self.ic = else_jmp as i64 - 1;
            return Ok(());
        }

        let item = items[*position].clone();
        *position += 1;
        self.assign_to(target, item)
    }

    // ── expressions ────────────────────────────────────────────────────

    fn exec_expr(&mut self, id: ExprId) -> Result<Value> {
        let kind = self.ast.expr(id).kind.clone();

        match kind {
            ExprKind::Constant(value) => Ok(Value::from_constant(&value)),
            ExprKind::Name { id: name, varid, ctx } => {
                if ctx == ExprContext::Store {
                    bail!("store-context name `{}` evaluated as a value", name);
                }
                self.load(varid, &name)
            }
            ExprKind::BinOp { left, op, right } => {
                let lhs = self.exec_expr(left)?;
                let rhs = self.exec_expr(right)?;
                lhs.binary_op(op, &rhs).ok_or_else(|| {
                    anyhow!("unsupported operand types for {:?}: {} and {}", op, lhs, rhs)
                })
            }
            ExprKind::UnaryOp { op, operand } => {
                let value = self.exec_expr(operand)?;
                value
                    .unary_op(op)
                    .ok_or_else(|| anyhow!("unsupported operand for {:?}: {}", op, value))
            }
            ExprKind::BoolOp { op, values } => {
                let mut result = false;
                for value in values {
                    let truthy = self.exec_expr(value)?.truthy();
                    match op {
                        crate::ast::BoolOperator::And => {
                            result = truthy;
                            if !truthy {
                                return Ok(Value::Bool(false));
                            }
                        }
                        crate::ast::BoolOperator::Or => {
                            result = truthy;
                            if truthy {
                                return Ok(Value::Bool(true));
                            }
                        }
                    }
                }
                Ok(Value::Bool(result))
            }
            ExprKind::Compare {
                left,
                ops,
                comparators,
            } => {
                let mut prev = self.exec_expr(left)?;
                for (op, comparator) in ops.into_iter().zip(comparators) {
                    let next = self.exec_expr(comparator)?;
                    let holds = prev.compare_op(op, &next).ok_or_else(|| {
                        anyhow!("cannot compare {} with {}", prev, next)
                    })?;
                    if !holds {
                        return Ok(Value::Bool(false));
                    }
                    prev = next;
                }
                Ok(Value::Bool(true))
            }
            ExprKind::IfExp { test, body, orelse } => {
                if self.exec_expr(test)?.truthy() {
                    self.exec_expr(body)
                } else {
                    self.exec_expr(orelse)
                }
            }
            ExprKind::Call { func, args, .. } => self.call(func, &args),
            ExprKind::ListExpr { elts, .. } => {
                let mut items = Vec::with_capacity(elts.len());
                for elt in elts {
                    items.push(self.exec_expr(elt)?);
                }
                Ok(Value::List(items))
            }
            ExprKind::TupleExpr { elts, .. } => {
                let mut items = Vec::with_capacity(elts.len());
                for elt in elts {
                    items.push(self.exec_expr(elt)?);
                }
                Ok(Value::Tuple(items))
            }
            ExprKind::Subscript { value, slice, .. } => {
                let container = self.exec_expr(value)?;
                let index = self.exec_expr(slice)?;
                index_value(&container, &index)
            }
            ExprKind::NamedExpr { target, value } => {
                let value = self.exec_expr(value)?;
                self.assign_to(target, value.clone())?;
                Ok(value)
            }
            ExprKind::JoinedStr { values } => {
                let mut text = String::new();
                for value in values {
                    text.push_str(&self.exec_expr(value)?.to_string());
                }
                Ok(Value::Str(text))
            }
            ExprKind::FormattedValue { value } => {
                Ok(Value::Str(self.exec_expr(value)?.to_string()))
            }
            other => bail!("expression is not executable yet: {:?}", other),
        }
    }

    /// Function call protocol: resolve the callee to a label index,
    /// dispatch natives directly, otherwise push the arguments as the
    /// callee's first locals and recurse.
    fn call(&mut self, func: ExprId, args: &[ExprId]) -> Result<Value> {
        let callee = self.exec_expr(func)?;
        let Value::Label(index) = callee else {
            bail!("`{}` is not callable at run time", callee);
        };

        let entry = self
            .program
            .instructions
            .get(index)
            .ok_or_else(|| anyhow!("call target {} is out of bounds", index))?;

        // native functions take their evaluated arguments directly
        if let StmtKind::NativeFunction { name } = &self.ast.stmt(entry.stmt).kind {
            let name = name.clone();
            let mut values = Vec::with_capacity(args.len());
            for &arg in args {
                values.push(self.exec_expr(arg)?);
            }
            return call_native(&name, &values);
        }

        let label = self
            .program
            .label_at(index)
            .ok_or_else(|| anyhow!("call target {} has no label", index))?;
        let scope_start = self.scope_start_of(label.stmt);

        let old_size = self.variables.len();
        for &arg in args {
            let value = self.exec_expr(arg)?;
            self.variables.push(value);
        }

        self.frames.push(Frame {
            base: old_size,
            scope_start,
        });
        let saved_ic = self.ic;
        let saved_address = self.registers.get(Register::ReturnAddress);
        self.registers.set(Register::ReturnAddress, Value::Int(-1));

        let result = self.execute(index as i64);

        self.ic = saved_ic;
        self.registers.set(Register::ReturnAddress, saved_address);
        self.frames.pop();
        self.variables.truncate(old_size);
        self.drop_dead_iterators();

        result
    }
}

fn index_value(container: &Value, index: &Value) -> Result<Value> {
    match (container, index) {
        (Value::List(items), Value::Int(i)) | (Value::Tuple(items), Value::Int(i)) => {
            let len = items.len() as i64;
            let i = if *i < 0 { i + len } else { *i };
            items
                .get(i as usize)
                .cloned()
                .ok_or_else(|| anyhow!("index {} out of range", i))
        }
        (Value::Str(s), Value::Int(i)) => {
            let chars: Vec<char> = s.chars().collect();
            let len = chars.len() as i64;
            let i = if *i < 0 { i + len } else { *i };
            chars
                .get(i as usize)
                .map(|c| Value::Str(c.to_string()))
                .ok_or_else(|| anyhow!("string index {} out of range", i))
        }
        _ => bail!("`{}` cannot be indexed with `{}`", container, index),
    }
}

fn call_native(name: &str, args: &[Value]) -> Result<Value> {
    fn as_f64(value: &Value) -> Result<f64> {
        match value {
            Value::Int(v) => Ok(*v as f64),
            Value::Float(v) => Ok(*v),
            other => bail!("expected a number, got {}", other),
        }
    }

    match name {
        "min" | "max" => {
            if args.len() != 2 {
                bail!("{} takes exactly two arguments", name);
            }
            let (a, b) = (as_f64(&args[0])?, as_f64(&args[1])?);
            let picked = if (name == "min") == (a <= b) { a } else { b };
            Ok(Value::Float(picked))
        }
        "sin" => {
            if args.len() != 1 {
                bail!("sin takes exactly one argument");
            }
            Ok(Value::Float(as_f64(&args[0])?.sin()))
        }
        "__getitem__" => {
            if args.len() != 2 {
                bail!("__getitem__ takes exactly two arguments");
            }
            index_value(&args[0], &args[1])
        }
        other => bail!("unknown native function `{}`", other),
    }
}
