//! The pipeline driver: lex → parse → sema → SSA → VM lowering.
//!
//! Each pass consumes its predecessor's output; when the front half
//! collects errors the executable image is not built and the caller
//! reports the diagnostics instead.

use std::path::Path;

use anyhow::{anyhow, Result};

use crate::ast::StmtId;
use crate::buffer::{Buffer, FileBuffer, StringBuffer};
use crate::lexer::Lexer;
use crate::lowering::ssa;
use crate::module::{Ast, Module};
use crate::parser::{ParseError, Parser};
use crate::sema::bindings::Bindings;
use crate::sema::errors::SemaError;
use crate::sema::SemanticAnalyser;
use crate::vm::gen::{self, VmGen};
use crate::vm::{Program, Value, VmExec};

/// Everything the executor needs: the SSA-form arena, its body, the
/// binding table of the second analysis and the lowered program.
pub struct ExecImage {
    pub ast: Ast,
    pub body: Vec<StmtId>,
    pub bindings: Bindings,
    pub program: Program,
}

pub struct Compiled {
    pub file_name: String,
    pub source_lines: Vec<String>,
    /// The parsed module (pre-SSA) and its body, for inspection.
    pub module: Module,
    pub body: Vec<StmtId>,
    pub parse_errors: Vec<ParseError>,
    pub sema_errors: Vec<SemaError>,
    /// Present only when the front half was clean.
    pub image: Option<ExecImage>,
}

impl Compiled {
    pub fn has_errors(&self) -> bool {
        !self.parse_errors.is_empty() || !self.sema_errors.is_empty()
    }
}

pub fn compile_file(path: &Path) -> Result<Compiled> {
    let source = std::fs::read_to_string(path)?;
    let buffer = FileBuffer::open(path)?;
    compile_buffer(Box::new(buffer), &source)
}

pub fn compile_source(source: &str) -> Result<Compiled> {
    compile_buffer(Box::new(StringBuffer::new(source)), source)
}

fn compile_buffer(buffer: Box<dyn Buffer>, source: &str) -> Result<Compiled> {
    let source_lines: Vec<String> = source.lines().map(String::from).collect();
    let mut module = Module::new();

    let lexer = Lexer::new(buffer);
    let file_name = lexer.file_name().to_string();

    let mut parser = Parser::new(lexer, &mut module);
    let parsed_body = parser.parse_module();
    let parse_errors = parser.errors.clone();

    // module-level statements move into a synthetic __main__ before the
    // analyser runs, so they get a scope of their own
    let body = gen::wrap_main(&mut module.ast, parsed_body);

    let mut sema = SemanticAnalyser::new(&mut module.ast);
    sema.analyse_module(&body);
    let sema_errors = std::mem::take(&mut sema.errors);
    drop(sema);

    let mut compiled = Compiled {
        file_name,
        source_lines,
        module,
        body,
        parse_errors,
        sema_errors,
        image: None,
    };

    // downstream passes need resolved names and known types
    if compiled.has_errors() {
        return Ok(compiled);
    }

    let (mut ssa_ast, ssa_body) = ssa::lower_module(&compiled.module.ast, &compiled.body);

    // the SSA pass mints fresh temporaries; re-run the analyser on the
    // new arena so they get varids and scope offsets too
    let mut sema = SemanticAnalyser::new(&mut ssa_ast);
    sema.analyse_module(&ssa_body);
    let bindings = std::mem::take(&mut sema.bindings);
    let late_errors = std::mem::take(&mut sema.errors);
    drop(sema);
    for error in &late_errors {
        log::warn!("post-ssa analysis: {}", error);
    }

    let program = VmGen::new(&mut ssa_ast).lower_module(&ssa_body, &bindings);

    compiled.image = Some(ExecImage {
        ast: ssa_ast,
        body: ssa_body,
        bindings,
        program,
    });
    Ok(compiled)
}

/// Run the module-level code of a compiled image.
pub fn execute_main(image: &ExecImage) -> Result<Option<Value>> {
    if image.program.label(gen::MAIN).is_none() {
        return Ok(None);
    }
    let mut vm = VmExec::new(&image.ast, &image.program, &image.bindings);
    vm.execute_label(gen::MAIN).map(Some)
}

/// Run a named function without arguments.
pub fn execute_entry(image: &ExecImage, entry: &str) -> Result<Value> {
    if image.program.label(entry).is_none() {
        return Err(anyhow!("no entry point named `{}`", entry));
    }
    let mut vm = VmExec::new(&image.ast, &image.program, &image.bindings);
    vm.execute_label(entry)
}

/// Convert collected diagnostics into printable errors.
pub fn collect_diagnostics(compiled: &Compiled) -> Vec<crate::errors::LythonError> {
    let mut diagnostics = Vec::new();

    for error in &compiled.parse_errors {
        diagnostics.push(crate::errors::LythonError {
            category: crate::errors::ErrorCategory::SyntaxError,
            message: error.to_string(),
            file: compiled.file_name.clone(),
            line: error.line(),
            source_line: source_line(compiled, error.line()),
            function_name: None,
        });
    }
    for error in &compiled.sema_errors {
        diagnostics.push(crate::errors::LythonError {
            category: error.category(),
            message: error.to_string(),
            file: compiled.file_name.clone(),
            line: error.span().line,
            source_line: source_line(compiled, error.span().line),
            function_name: None,
        });
    }

    diagnostics
}

fn source_line(compiled: &Compiled, line: usize) -> Option<String> {
    compiled.source_lines.get(line.wrapping_sub(1)).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> Value {
        let compiled = compile_source(source).expect("pipeline failed");
        assert!(
            !compiled.has_errors(),
            "unexpected diagnostics: parse {:?}, sema {:?}",
            compiled.parse_errors,
            compiled.sema_errors
        );
        let image = compiled.image.expect("no executable image");
        execute_main(&image)
            .expect("execution failed")
            .expect("no module-level code")
    }

    #[test]
    fn shunting_yard_precedence_evaluates_to_seven() {
        assert_eq!(run("x = 1 + 2 * 3\nreturn x\n"), Value::Int(7));
    }

    #[test]
    fn struct_function_and_call() {
        let source = "struct Point:\n    x: Float\n    y: Float\ndef mid(a: Float, b: Float) -> Float:\n    return (a + b) / 2\nreturn mid(1.0, 3.0)\n";
        assert_eq!(run(source), Value::Float(2.0));
    }

    #[test]
    fn builtin_max_returns_the_larger_value() {
        assert_eq!(run("return max(1.0, 2.0)\n"), Value::Float(2.0));
    }

    #[test]
    fn builtin_min_and_sin() {
        assert_eq!(run("return min(1.0, 2.0)\n"), Value::Float(1.0));
        assert_eq!(run("return sin(0.0)\n"), Value::Float(0.0));
    }

    #[test]
    fn undefined_name_skips_execution() {
        let compiled = compile_source("return undeclared\n").unwrap();
        assert!(compiled.has_errors());
        assert!(compiled.image.is_none());
    }

    #[test]
    fn if_else_branches() {
        let source = "x = 10\nif x > 5:\n    y = 1\nelse:\n    y = 2\nreturn y\n";
        assert_eq!(run(source), Value::Int(1));
    }

    #[test]
    fn while_loop_accumulates() {
        let source = "total = 0\nn = 0\nwhile n < 5:\n    total += n\n    n += 1\nreturn total\n";
        assert_eq!(run(source), Value::Int(10));
    }

    #[test]
    fn while_loop_with_break() {
        let source = "n = 0\nwhile True:\n    n += 1\n    if n == 3:\n        break\nreturn n\n";
        assert_eq!(run(source), Value::Int(3));
    }

    #[test]
    fn for_loop_over_a_list() {
        let source = "total = 0\nfor x in [1, 2, 3, 4]:\n    total += x\nreturn total\n";
        assert_eq!(run(source), Value::Int(10));
    }

    #[test]
    fn broken_out_of_for_loop_restarts_on_reentry() {
        // the break releases the iterator, so the second pass of the
        // while loop sees a fresh one instead of resuming mid-way
        let source = "total = 0\ni = 0\nwhile i < 2:\n    for x in [1, 2]:\n        if x == 2:\n            break\n        total = total + x\n    i = i + 1\nreturn total\n";
        assert_eq!(run(source), Value::Int(2));
    }

    #[test]
    fn for_loop_with_tuple_target() {
        let source = "total = 0\nfor a, b in [(1, 2), (3, 4)]:\n    total = total + a + b\nreturn total\n";
        assert_eq!(run(source), Value::Int(10));
    }

    #[test]
    fn recursive_calls_restore_the_stack() {
        let source = "def fact(n: Int) -> Int:\n    if n < 2:\n        return 1\n    return n * fact(n - 1)\nreturn fact(5)\n";
        assert_eq!(run(source), Value::Int(120));
    }

    #[test]
    fn failed_assert_raises() {
        let compiled = compile_source("assert False, \"boom\"\n").unwrap();
        let image = compiled.image.expect("image");
        let result = execute_main(&image);
        assert!(result.is_err());
        let message = result.unwrap_err().to_string();
        assert!(message.contains("boom"), "message was: {}", message);
    }

    #[test]
    fn passing_assert_is_silent() {
        assert_eq!(run("assert True\nreturn 1\n"), Value::Int(1));
    }

    #[test]
    fn tuple_unpacking_executes_via_getitem() {
        let source = "a, b = (1, 2)\nreturn a + b\n";
        assert_eq!(run(source), Value::Int(3));
    }

    #[test]
    fn pi_is_available_at_run_time() {
        let source = "return pi\n";
        assert_eq!(run(source), Value::Float(3.14));
    }

    #[test]
    fn jump_targets_stay_in_bounds() {
        let source = "x = 0\nwhile x < 3:\n    if x == 1:\n        x += 2\n    else:\n        x += 1\nfor y in [1, 2]:\n    x += y\nreturn x\n";
        let compiled = compile_source(source).unwrap();
        let image = compiled.image.expect("image");
        let size = image.program.size();
        for instruction in &image.program.instructions {
            match &image.ast.stmt(instruction.stmt).kind {
                crate::ast::StmtKind::Jump { destination } => {
                    assert!(*destination <= size);
                }
                crate::ast::StmtKind::CondJump {
                    then_jmp, else_jmp, ..
                } => {
                    assert!(*then_jmp <= size);
                    assert!(*else_jmp <= size);
                }
                crate::ast::StmtKind::IterJump {
                    body_jmp, else_jmp, ..
                } => {
                    assert!(*body_jmp <= size);
                    assert!(*else_jmp <= size);
                }
                _ => {}
            }
        }
    }

    #[test]
    fn variable_stack_length_is_restored_after_calls() {
        // the callee's frame is truncated on return, so repeated calls
        // keep producing the same result
        let source = "def inc(n: Int) -> Int:\n    m = n + 1\n    return m\nreturn inc(inc(inc(0)))\n";
        assert_eq!(run(source), Value::Int(3));
    }

    #[test]
    fn named_entry_point_can_be_executed() {
        let source = "def answer() -> Int:\n    return 42\n";
        let compiled = compile_source(source).unwrap();
        let image = compiled.image.expect("image");
        assert_eq!(execute_entry(&image, "answer").unwrap(), Value::Int(42));
        assert!(execute_entry(&image, "missing").is_err());
    }

    #[test]
    fn boolean_operators_short_circuit() {
        let source = "x = 1\nreturn True and x > 0\n";
        assert_eq!(run(source), Value::Bool(true));
    }

    #[test]
    fn string_values_flow_through() {
        let source = "a = \"foo\"\nb = \"bar\"\nreturn a + b\n";
        assert_eq!(run(source), Value::Str("foobar".into()));
    }
}
